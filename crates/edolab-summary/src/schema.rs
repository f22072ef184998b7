//! Experiment configuration and distribution schema resolution.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use edolab_core::errors::{ErrorInfo, LabError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::family::{BuiltinFamily, DistributionFamily, FamilyDescriptor, Limits};

/// One entry of an experiment's `distributions` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FamilyDecl {
    /// A built-in family used with its default limits, e.g. `Uniform`.
    Builtin(String),
    /// A built-in family with overridden limits, or a named family extending one.
    Custom(CustomFamilyDecl),
}

/// Declaration of a family that overrides limits of a built-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFamilyDecl {
    /// Name written into subtype records.
    pub name: String,
    /// Built-in family providing the sampler; defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    /// Entries replacing the base family's soft limits.
    #[serde(default)]
    pub param_limits: Limits,
    /// Entries replacing the base family's hard limits.
    #[serde(default)]
    pub hard_limits: Limits,
}

/// Keyword arguments handed to the external optimiser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimiserArgs {
    /// Population size per generation.
    #[serde(default)]
    pub size: Option<usize>,
    /// Inclusive bounds on the number of rows of an individual.
    #[serde(default)]
    pub row_limits: Option<[usize; 2]>,
    /// Inclusive bounds on the number of columns of an individual.
    #[serde(default)]
    pub col_limits: Option<[usize; 2]>,
    /// Sampling weights for the families, in declaration order.
    #[serde(default)]
    pub weights: Option<Vec<f64>>,
    /// Generation cap.
    #[serde(default = "OptimiserArgs::default_max_iter")]
    pub max_iter: usize,
    /// Fraction of the best individuals kept as parents.
    #[serde(default = "OptimiserArgs::default_best_prop")]
    pub best_prop: f64,
    /// Fraction of other individuals kept as parents.
    #[serde(default)]
    pub lucky_prop: f64,
    /// Probability of taking a column from the first parent.
    #[serde(default = "OptimiserArgs::default_crossover_prob")]
    pub crossover_prob: f64,
    /// Per-component mutation probability.
    #[serde(default = "OptimiserArgs::default_mutation_prob")]
    pub mutation_prob: f64,
    /// Rate at which the search space shrinks.
    #[serde(default)]
    pub shrinkage: Option<f64>,
    /// Whether larger fitness is better.
    #[serde(default)]
    pub maximise: bool,
}

impl OptimiserArgs {
    const fn default_max_iter() -> usize {
        100
    }

    const fn default_best_prop() -> f64 {
        0.25
    }

    const fn default_crossover_prob() -> f64 {
        0.5
    }

    const fn default_mutation_prob() -> f64 {
        0.01
    }

    /// The optimiser's own defaults.
    pub fn defaults() -> Self {
        Self {
            size: None,
            row_limits: None,
            col_limits: None,
            weights: None,
            max_iter: Self::default_max_iter(),
            best_prop: Self::default_best_prop(),
            lucky_prop: 0.0,
            crossover_prob: Self::default_crossover_prob(),
            mutation_prob: Self::default_mutation_prob(),
            shrinkage: None,
            maximise: false,
        }
    }
}

impl Default for OptimiserArgs {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Statically typed experiment definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Experiment name; output lands under `<root>/<name>/`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Ordered family declarations.
    #[serde(default)]
    pub distributions: Vec<FamilyDecl>,
    /// Optimiser keyword arguments.
    #[serde(flatten)]
    pub optimiser: OptimiserArgs,
    /// Extra arguments forwarded to the fitness function.
    #[serde(default)]
    pub fitness_kwargs: BTreeMap<String, serde_yaml::Value>,
    /// Extra arguments forwarded to the stopping rule.
    #[serde(default)]
    pub stop_kwargs: BTreeMap<String, serde_yaml::Value>,
    /// Extra arguments forwarded to the dwindling rule.
    #[serde(default)]
    pub dwindle_kwargs: BTreeMap<String, serde_yaml::Value>,
}

impl ExperimentConfig {
    /// Parses a YAML experiment definition.
    pub fn from_yaml_str(text: &str) -> Result<Self, LabError> {
        serde_yaml::from_str(text).map_err(|err| {
            LabError::Configuration(ErrorInfo::new("experiment-parse", err.to_string()))
        })
    }

    /// Loads an experiment definition, naming it after the file stem when
    /// the document carries no `name`.
    pub fn from_path(path: &Path) -> Result<Self, LabError> {
        let text = fs::read_to_string(path).map_err(|err| {
            LabError::Configuration(
                ErrorInfo::new("experiment-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        let mut config = Self::from_yaml_str(&text).map_err(|err| match err {
            LabError::Configuration(info) => {
                LabError::Configuration(info.with_context("path", path.display().to_string()))
            }
            other => other,
        })?;
        if config.name.is_none() {
            config.name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned());
        }
        Ok(config)
    }

    /// Experiment name, falling back to `experiment`.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("experiment")
    }

    /// Optimiser arguments with the resolved families attached.
    pub fn optimiser_params(&self) -> Result<OptimiserParams, LabError> {
        let families = resolve(self)?;
        Ok(OptimiserParams {
            args: self.optimiser.clone(),
            families: families.iter().map(FamilyDescriptor::from).collect(),
            fitness_kwargs: self.fitness_kwargs.clone(),
        })
    }
}

/// Everything the optimiser needs to be started for this experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimiserParams {
    /// Keyword arguments after applying the experiment's overrides.
    #[serde(flatten)]
    pub args: OptimiserArgs,
    /// Resolved families in declaration order.
    pub families: Vec<FamilyDescriptor>,
    /// Arguments forwarded to the fitness function.
    pub fitness_kwargs: BTreeMap<String, serde_yaml::Value>,
}

/// Resolves the experiment's declarations into ordered families.
///
/// Overrides are applied to fresh copies of the built-in defaults, so calling
/// this twice with the same configuration yields equal families.
pub fn resolve(config: &ExperimentConfig) -> Result<Vec<DistributionFamily>, LabError> {
    if config.distributions.is_empty() {
        return Err(LabError::Configuration(
            ErrorInfo::new(
                "distributions-missing",
                "experiment declares no distributions",
            )
            .with_context("experiment", config.name().to_string())
            .with_hint("add a `distributions` list such as [Uniform, Normal]"),
        ));
    }
    let mut seen = BTreeSet::new();
    let mut families = Vec::with_capacity(config.distributions.len());
    for decl in &config.distributions {
        let family = resolve_decl(decl)?;
        if !seen.insert(family.name().to_string()) {
            return Err(LabError::Configuration(
                ErrorInfo::new("family-duplicate", "family declared twice")
                    .with_context("family", family.name().to_string()),
            ));
        }
        debug!(family = family.name(), base = ?family.base(), "resolved family");
        families.push(family);
    }
    Ok(families)
}

fn resolve_decl(decl: &FamilyDecl) -> Result<DistributionFamily, LabError> {
    match decl {
        FamilyDecl::Builtin(name) => Ok(DistributionFamily::builtin(lookup_builtin(name)?)),
        FamilyDecl::Custom(custom) => {
            let base = lookup_builtin(custom.extends.as_deref().unwrap_or(&custom.name))?;
            let mut param_limits = base.default_param_limits();
            param_limits.extend(custom.param_limits.clone());
            let mut hard_limits = base.hard_limits();
            hard_limits.extend(custom.hard_limits.clone());
            DistributionFamily::derived(custom.name.clone(), base, param_limits, hard_limits)
        }
    }
}

fn lookup_builtin(name: &str) -> Result<BuiltinFamily, LabError> {
    BuiltinFamily::from_name(name).ok_or_else(|| {
        let known: Vec<_> = BuiltinFamily::ALL.iter().map(|family| family.name()).collect();
        LabError::Configuration(
            ErrorInfo::new("family-unknown", "no built-in family with this name")
                .with_context("family", name.to_string())
                .with_hint(format!("custom families must `extends` one of {known:?}")),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use edolab_core::Bounds;

    const EXPERIMENT: &str = r#"
size: 5
row_limits: [1, 5]
col_limits: [1, 2]
max_iter: 3
best_prop: 0.5
mutation_prob: 0.5
distributions:
  - name: Uniform
    param_limits:
      bounds: [0, 1]
  - name: NegativeUniform
    extends: Uniform
    param_limits:
      bounds: [-1, 0]
    hard_limits:
      bounds: [-100, 0]
fitness_kwargs:
  size: 3
stop_kwargs:
  tol: 0.001
"#;

    #[test]
    fn resolves_families_in_order() {
        let config = ExperimentConfig::from_yaml_str(EXPERIMENT).expect("config");
        let families = resolve(&config).expect("families");
        let names: Vec<_> = families.iter().map(|family| family.name()).collect();
        assert_eq!(names, ["Uniform", "NegativeUniform"]);
        assert_eq!(
            families[0].param_limits()["bounds"],
            Bounds::new(0.0, 1.0)
        );
        assert_eq!(
            families[0].hard_limits()["bounds"],
            Bounds::new(f64::NEG_INFINITY, f64::INFINITY)
        );
        assert_eq!(
            families[1].hard_limits()["bounds"],
            Bounds::new(-100.0, 0.0)
        );
        assert_eq!(families[1].base(), BuiltinFamily::Uniform);
    }

    #[test]
    fn resolution_is_idempotent() {
        let config = ExperimentConfig::from_yaml_str(EXPERIMENT).expect("config");
        let first: Vec<FamilyDescriptor> = resolve(&config)
            .expect("first")
            .iter()
            .map(FamilyDescriptor::from)
            .collect();
        let second: Vec<FamilyDescriptor> = resolve(&config)
            .expect("second")
            .iter()
            .map(FamilyDescriptor::from)
            .collect();
        assert_eq!(first, second);
        let plain = DistributionFamily::builtin(BuiltinFamily::Uniform);
        assert_eq!(plain.param_limits()["bounds"], Bounds::new(-10.0, 10.0));
    }

    #[test]
    fn optimiser_defaults_are_overridden() {
        let config = ExperimentConfig::from_yaml_str(EXPERIMENT).expect("config");
        let params = config.optimiser_params().expect("params");
        assert_eq!(params.args.size, Some(5));
        assert_eq!(params.args.max_iter, 3);
        assert_eq!(params.args.best_prop, 0.5);
        assert_eq!(params.args.lucky_prop, 0.0);
        assert_eq!(params.args.crossover_prob, 0.5);
        assert_eq!(params.args.mutation_prob, 0.5);
        assert_eq!(params.args.shrinkage, None);
        assert!(!params.args.maximise);
        assert_eq!(params.families.len(), 2);
    }

    #[test]
    fn empty_distributions_is_configuration_error() {
        let config = ExperimentConfig::from_yaml_str("size: 3\n").expect("config");
        let err = resolve(&config).expect_err("no distributions");
        assert!(matches!(err, LabError::Configuration(_)));
        assert_eq!(err.info().code, "distributions-missing");
    }

    #[test]
    fn unknown_builtin_is_configuration_error() {
        let config =
            ExperimentConfig::from_yaml_str("distributions: [Uniform, Gamma]\n").expect("config");
        let err = resolve(&config).expect_err("Gamma is not built in");
        assert_eq!(err.info().code, "family-unknown");
    }

    #[test]
    fn invalid_limits_are_configuration_error() {
        let text = r#"
distributions:
  - name: Wide
    extends: Bernoulli
    param_limits:
      prob: [0, 2]
"#;
        let config = ExperimentConfig::from_yaml_str(text).expect("config");
        let err = resolve(&config).expect_err("prob above hard limit");
        assert_eq!(err.info().code, "family-limits-exceed");
    }

    #[test]
    fn duplicate_names_rejected() {
        let config =
            ExperimentConfig::from_yaml_str("distributions: [Normal, Normal]\n").expect("config");
        let err = resolve(&config).expect_err("duplicate");
        assert_eq!(err.info().code, "family-duplicate");
    }
}
