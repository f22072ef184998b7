use edolab_core::errors::{ErrorInfo, LabError};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("trial", "0")
        .with_context("generation", "2")
}

#[test]
fn configuration_error_surface() {
    let err = LabError::Configuration(sample_info("distributions-empty", "no families"));
    assert_eq!(err.info().code, "distributions-empty");
    assert!(err.info().context.contains_key("trial"));
}

#[test]
fn corrupt_trial_error_surface() {
    let err = LabError::CorruptTrial(sample_info("fitness-missing", "fitness.csv not found"));
    assert_eq!(err.info().code, "fitness-missing");
    assert!(err.to_string().starts_with("corrupt trial: fitness.csv not found"));
}

#[test]
fn schema_mismatch_error_surface() {
    let err = LabError::SchemaMismatch(sample_info("unknown-family", "Gamma"));
    assert_eq!(err.info().context["generation"], "2");
}

#[test]
fn display_includes_context_and_hint() {
    let err = LabError::MissingIndividual(
        ErrorInfo::new("individual-missing", "gone")
            .with_context("quantile", "0.5")
            .with_hint("was the data directory archived?"),
    );
    let text = err.to_string();
    assert!(text.contains("quantile=0.5"));
    assert!(text.contains("hint: was the data directory archived?"));
}

#[test]
fn errors_serialize_with_kind_tag() {
    let err = LabError::InvalidQuantile(ErrorInfo::new("quantile-range", "1.5"));
    let json = serde_json::to_value(&err).expect("json");
    assert_eq!(json["kind"], "InvalidQuantile");
    let back: LabError = serde_json::from_value(json).expect("decode");
    assert_eq!(back, err);
}
