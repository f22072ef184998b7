//! Distribution families: named column generators with parameter bounds.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use edolab_core::errors::{ErrorInfo, LabError};
use edolab_core::{Bounds, Cell, ColumnKind, RngHandle};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Parameter name to interval mapping used for both soft and hard limits.
pub type Limits = BTreeMap<String, Bounds>;

/// A single sampled parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Scalar parameter such as a mean or a rate.
    Scalar(f64),
    /// Interval parameter such as the support of a uniform column.
    Interval([f64; 2]),
}

/// Concrete parameters drawn for one column.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(pub BTreeMap<String, ParamValue>);

impl Params {
    /// Returns a scalar parameter.
    pub fn scalar(&self, name: &str) -> Result<f64, LabError> {
        match self.0.get(name) {
            Some(ParamValue::Scalar(value)) => Ok(*value),
            Some(ParamValue::Interval(_)) => Err(param_error(name, "expected a scalar")),
            None => Err(param_error(name, "parameter missing")),
        }
    }

    /// Returns an interval parameter.
    pub fn interval(&self, name: &str) -> Result<[f64; 2], LabError> {
        match self.0.get(name) {
            Some(ParamValue::Interval(pair)) => Ok(*pair),
            Some(ParamValue::Scalar(_)) => Err(param_error(name, "expected an interval")),
            None => Err(param_error(name, "parameter missing")),
        }
    }
}

fn param_error(name: &str, message: &str) -> LabError {
    LabError::Configuration(ErrorInfo::new("family-param", message).with_context("param", name))
}

/// Pluggable sampling capability attached to a [`DistributionFamily`].
pub trait Sampler: Send + Sync + fmt::Debug {
    /// Draws concrete parameters within `limits`.
    ///
    /// The default draws every parameter as a scalar uniformly inside its
    /// bounds.
    fn draw_params(&self, limits: &Limits, rng: &mut RngHandle) -> Params {
        Params(
            limits
                .iter()
                .map(|(name, bounds)| (name.clone(), ParamValue::Scalar(draw_within(bounds, rng))))
                .collect(),
        )
    }

    /// Draws `nrows` values for a column with the given parameters.
    fn sample(
        &self,
        params: &Params,
        nrows: usize,
        rng: &mut RngHandle,
    ) -> Result<Vec<Cell>, LabError>;
}

// Infinite limits are narrowed so parameter draws stay finite.
const PARAM_SPAN: f64 = 1.0e6;

fn draw_within(bounds: &Bounds, rng: &mut RngHandle) -> f64 {
    let low = bounds.low.max(-PARAM_SPAN);
    let high = bounds.high.min(PARAM_SPAN);
    if high <= low {
        return low;
    }
    rng.gen_range(low..=high)
}

/// Families shipped with edolab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BuiltinFamily {
    /// Continuous uniform over a sampled interval.
    Uniform,
    /// Gaussian with sampled mean and standard deviation.
    Normal,
    /// Exponential with a sampled rate.
    Exponential,
    /// Poisson counts with a sampled rate.
    Poisson,
    /// Booleans with a sampled success probability.
    Bernoulli,
}

impl BuiltinFamily {
    /// All built-in families in declaration order.
    pub const ALL: [BuiltinFamily; 5] = [
        BuiltinFamily::Uniform,
        BuiltinFamily::Normal,
        BuiltinFamily::Exponential,
        BuiltinFamily::Poisson,
        BuiltinFamily::Bernoulli,
    ];

    /// Looks up a built-in family by its declared name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|family| family.name() == name)
    }

    /// Declared family name.
    pub fn name(self) -> &'static str {
        match self {
            BuiltinFamily::Uniform => "Uniform",
            BuiltinFamily::Normal => "Normal",
            BuiltinFamily::Exponential => "Exponential",
            BuiltinFamily::Poisson => "Poisson",
            BuiltinFamily::Bernoulli => "Bernoulli",
        }
    }

    /// Storage class of columns produced by this family.
    pub fn kind(self) -> ColumnKind {
        match self {
            BuiltinFamily::Uniform | BuiltinFamily::Normal | BuiltinFamily::Exponential => {
                ColumnKind::Float
            }
            BuiltinFamily::Poisson => ColumnKind::Integer,
            BuiltinFamily::Bernoulli => ColumnKind::Boolean,
        }
    }

    /// Default user-tunable limits.
    pub fn default_param_limits(self) -> Limits {
        let pairs: &[(&str, Bounds)] = match self {
            BuiltinFamily::Uniform => &[("bounds", Bounds::new(-10.0, 10.0))],
            BuiltinFamily::Normal => &[
                ("mean", Bounds::new(-10.0, 10.0)),
                ("std", Bounds::new(0.0, 10.0)),
            ],
            BuiltinFamily::Exponential | BuiltinFamily::Poisson => {
                &[("lam", Bounds::new(0.0, 10.0))]
            }
            BuiltinFamily::Bernoulli => &[("prob", Bounds::new(0.0, 1.0))],
        };
        to_limits(pairs)
    }

    /// Absolute limits enforced by the sampler.
    pub fn hard_limits(self) -> Limits {
        let pairs: &[(&str, Bounds)] = match self {
            BuiltinFamily::Uniform => &[("bounds", Bounds::new(f64::NEG_INFINITY, f64::INFINITY))],
            BuiltinFamily::Normal => &[
                ("mean", Bounds::new(f64::NEG_INFINITY, f64::INFINITY)),
                ("std", Bounds::new(0.0, f64::INFINITY)),
            ],
            BuiltinFamily::Exponential | BuiltinFamily::Poisson => {
                &[("lam", Bounds::new(0.0, f64::INFINITY))]
            }
            BuiltinFamily::Bernoulli => &[("prob", Bounds::new(0.0, 1.0))],
        };
        to_limits(pairs)
    }

    /// Sampler implementing this family.
    pub fn sampler(self) -> Arc<dyn Sampler> {
        match self {
            BuiltinFamily::Uniform => Arc::new(UniformSampler),
            BuiltinFamily::Normal => Arc::new(NormalSampler),
            BuiltinFamily::Exponential => Arc::new(ExponentialSampler),
            BuiltinFamily::Poisson => Arc::new(PoissonSampler),
            BuiltinFamily::Bernoulli => Arc::new(BernoulliSampler),
        }
    }
}

fn to_limits(pairs: &[(&str, Bounds)]) -> Limits {
    pairs
        .iter()
        .map(|(name, bounds)| ((*name).to_string(), *bounds))
        .collect()
}

#[derive(Debug)]
struct UniformSampler;

impl Sampler for UniformSampler {
    fn draw_params(&self, limits: &Limits, rng: &mut RngHandle) -> Params {
        let mut params = BTreeMap::new();
        for (name, bounds) in limits {
            let a = draw_within(bounds, rng);
            let b = draw_within(bounds, rng);
            params.insert(name.clone(), ParamValue::Interval([a.min(b), a.max(b)]));
        }
        Params(params)
    }

    fn sample(
        &self,
        params: &Params,
        nrows: usize,
        rng: &mut RngHandle,
    ) -> Result<Vec<Cell>, LabError> {
        let [low, high] = params.interval("bounds")?;
        Ok((0..nrows)
            .map(|_| {
                if high > low {
                    Cell::Float(rng.gen_range(low..high))
                } else {
                    Cell::Float(low)
                }
            })
            .collect())
    }
}

#[derive(Debug)]
struct NormalSampler;

impl Sampler for NormalSampler {
    fn sample(
        &self,
        params: &Params,
        nrows: usize,
        rng: &mut RngHandle,
    ) -> Result<Vec<Cell>, LabError> {
        let mean = params.scalar("mean")?;
        let std = params.scalar("std")?.max(0.0);
        Ok((0..nrows)
            .map(|_| Cell::Float(mean + std * standard_normal(rng)))
            .collect())
    }
}

// Box-Muller transform; `1 - u` keeps the logarithm away from zero.
fn standard_normal(rng: &mut RngHandle) -> f64 {
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

#[derive(Debug)]
struct ExponentialSampler;

impl Sampler for ExponentialSampler {
    fn sample(
        &self,
        params: &Params,
        nrows: usize,
        rng: &mut RngHandle,
    ) -> Result<Vec<Cell>, LabError> {
        let lam = params.scalar("lam")?.max(f64::MIN_POSITIVE);
        Ok((0..nrows)
            .map(|_| {
                let u: f64 = 1.0 - rng.gen::<f64>();
                Cell::Float(-u.ln() / lam)
            })
            .collect())
    }
}

#[derive(Debug)]
struct PoissonSampler;

// Above this rate Knuth's product method underflows; switch to a rounded normal.
const POISSON_KNUTH_LIMIT: f64 = 30.0;

impl Sampler for PoissonSampler {
    fn sample(
        &self,
        params: &Params,
        nrows: usize,
        rng: &mut RngHandle,
    ) -> Result<Vec<Cell>, LabError> {
        let lam = params.scalar("lam")?.max(0.0);
        Ok((0..nrows)
            .map(|_| {
                if lam < POISSON_KNUTH_LIMIT {
                    let threshold = (-lam).exp();
                    let mut count = 0_i64;
                    let mut product: f64 = rng.gen();
                    while product > threshold {
                        count += 1;
                        product *= rng.gen::<f64>();
                    }
                    Cell::Integer(count)
                } else {
                    let draw = lam + lam.sqrt() * standard_normal(rng);
                    Cell::Integer(draw.round().max(0.0) as i64)
                }
            })
            .collect())
    }
}

#[derive(Debug)]
struct BernoulliSampler;

impl Sampler for BernoulliSampler {
    fn sample(
        &self,
        params: &Params,
        nrows: usize,
        rng: &mut RngHandle,
    ) -> Result<Vec<Cell>, LabError> {
        let prob = params.scalar("prob")?.clamp(0.0, 1.0);
        Ok((0..nrows).map(|_| Cell::Boolean(rng.gen_bool(prob))).collect())
    }
}

/// A named column generator with soft and hard parameter limits.
///
/// Families are immutable once constructed and are shared read-only by every
/// trial of an experiment.
#[derive(Clone)]
pub struct DistributionFamily {
    name: String,
    base: BuiltinFamily,
    param_limits: Limits,
    hard_limits: Limits,
    sampler: Arc<dyn Sampler>,
}

impl DistributionFamily {
    /// A built-in family with its default limits.
    pub fn builtin(base: BuiltinFamily) -> Self {
        Self {
            name: base.name().to_string(),
            base,
            param_limits: base.default_param_limits(),
            hard_limits: base.hard_limits(),
            sampler: base.sampler(),
        }
    }

    /// Builds a family derived from `base`, validating its limits.
    pub fn derived(
        name: impl Into<String>,
        base: BuiltinFamily,
        param_limits: Limits,
        hard_limits: Limits,
    ) -> Result<Self, LabError> {
        let family = Self {
            name: name.into(),
            base,
            param_limits,
            hard_limits,
            sampler: base.sampler(),
        };
        family.validate()?;
        Ok(family)
    }

    /// Replaces the sampling capability.
    pub fn with_sampler(mut self, sampler: Arc<dyn Sampler>) -> Self {
        self.sampler = sampler;
        self
    }

    /// Family identifier referenced by subtype records.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Built-in family this one derives from.
    pub fn base(&self) -> BuiltinFamily {
        self.base
    }

    /// Storage class of the columns this family produces.
    pub fn kind(&self) -> ColumnKind {
        self.base.kind()
    }

    /// User-tunable limits.
    pub fn param_limits(&self) -> &Limits {
        &self.param_limits
    }

    /// Absolute limits.
    pub fn hard_limits(&self) -> &Limits {
        &self.hard_limits
    }

    /// Checks that every soft limit is ordered and contained in its hard limit.
    pub fn validate(&self) -> Result<(), LabError> {
        for (param, soft) in &self.param_limits {
            let context = |info: ErrorInfo| {
                info.with_context("family", self.name.clone())
                    .with_context("param", param.clone())
            };
            let Some(hard) = self.hard_limits.get(param) else {
                return Err(LabError::Configuration(context(ErrorInfo::new(
                    "family-limits-unbounded",
                    "param_limits entry has no matching hard_limits entry",
                ))));
            };
            if !soft.is_ordered() || !hard.is_ordered() {
                return Err(LabError::Configuration(context(ErrorInfo::new(
                    "family-limits-order",
                    "limits must satisfy low <= high",
                ))));
            }
            if !soft.within(hard) {
                return Err(LabError::Configuration(
                    context(ErrorInfo::new(
                        "family-limits-exceed",
                        format!(
                            "param_limits [{}, {}] outside hard_limits [{}, {}]",
                            soft.low, soft.high, hard.low, hard.high
                        ),
                    ))
                    .with_hint("narrow param_limits or widen hard_limits"),
                ));
            }
        }
        Ok(())
    }

    /// Draws concrete parameters within the soft limits.
    pub fn sample_params(&self, rng: &mut RngHandle) -> Params {
        self.sampler.draw_params(&self.param_limits, rng)
    }

    /// Draws a column of `nrows` values.
    pub fn sample(
        &self,
        params: &Params,
        nrows: usize,
        rng: &mut RngHandle,
    ) -> Result<Vec<Cell>, LabError> {
        self.sampler.sample(params, nrows, rng)
    }
}

impl fmt::Debug for DistributionFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributionFamily")
            .field("name", &self.name)
            .field("base", &self.base)
            .field("param_limits", &self.param_limits)
            .field("hard_limits", &self.hard_limits)
            .finish_non_exhaustive()
    }
}

/// Serializable description of a family, used by introspection output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyDescriptor {
    /// Family name.
    pub name: String,
    /// Built-in family the sampler comes from.
    pub base: BuiltinFamily,
    /// Column storage class.
    pub kind: ColumnKind,
    /// Soft limits.
    pub param_limits: Limits,
    /// Hard limits.
    pub hard_limits: Limits,
}

impl From<&DistributionFamily> for FamilyDescriptor {
    fn from(family: &DistributionFamily) -> Self {
        Self {
            name: family.name.clone(),
            base: family.base,
            kind: family.kind(),
            param_limits: family.param_limits.clone(),
            hard_limits: family.hard_limits.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_defaults_validate() {
        for base in BuiltinFamily::ALL {
            DistributionFamily::builtin(base)
                .validate()
                .expect("builtin limits are consistent");
        }
    }

    #[test]
    fn derived_rejects_soft_outside_hard() {
        let err = DistributionFamily::derived(
            "Broken",
            BuiltinFamily::Uniform,
            to_limits(&[("bounds", Bounds::new(-200.0, 0.0))]),
            to_limits(&[("bounds", Bounds::new(-100.0, 0.0))]),
        )
        .expect_err("soft limits exceed hard limits");
        assert_eq!(err.info().code, "family-limits-exceed");
    }

    #[test]
    fn derived_rejects_unknown_hard_param() {
        let err = DistributionFamily::derived(
            "Broken",
            BuiltinFamily::Normal,
            to_limits(&[("scale", Bounds::new(0.0, 1.0))]),
            BuiltinFamily::Normal.hard_limits(),
        )
        .expect_err("scale has no hard limit");
        assert_eq!(err.info().code, "family-limits-unbounded");
    }

    #[test]
    fn samples_respect_drawn_params() {
        let mut rng = RngHandle::from_seed(7);
        let family = DistributionFamily::derived(
            "NegativeUniform",
            BuiltinFamily::Uniform,
            to_limits(&[("bounds", Bounds::new(-1.0, 0.0))]),
            to_limits(&[("bounds", Bounds::new(-100.0, 0.0))]),
        )
        .expect("valid family");
        let params = family.sample_params(&mut rng);
        let [low, high] = params.interval("bounds").expect("interval");
        assert!(-1.0 <= low && low <= high && high <= 0.0);
        let values = family.sample(&params, 32, &mut rng).expect("sample");
        assert_eq!(values.len(), 32);
        assert!(values
            .iter()
            .all(|cell| matches!(cell, Cell::Float(v) if *v <= 0.0 && *v >= -1.0)));
    }

    #[test]
    fn kinds_follow_base() {
        let mut rng = RngHandle::from_seed(1);
        for base in BuiltinFamily::ALL {
            let family = DistributionFamily::builtin(base);
            let params = family.sample_params(&mut rng);
            let cells = family.sample(&params, 8, &mut rng).expect("sample");
            for cell in cells {
                let matches = matches!(
                    (family.kind(), cell),
                    (ColumnKind::Float, Cell::Float(_))
                        | (ColumnKind::Integer, Cell::Integer(_))
                        | (ColumnKind::Boolean, Cell::Boolean(_))
                );
                assert!(matches, "{base:?} produced {cell:?}");
            }
        }
    }
}
