use super::*;
use indoc::indoc;
use pretty_assertions::assert_eq;

#[test]
fn test_empty_toml_yields_defaults() {
    let config = AnalyzerConfig::from_toml_str("").unwrap();
    assert_eq!(config, AnalyzerConfig::default());
    assert_eq!(config.comparison.similarity_threshold, 0.5);
    assert!(config.comparison.match_nodes);
    assert_eq!(config.comparison.strictness, Strictness::Lenient);
    assert_eq!(
        config.comparison.senses.max_blocks_hit,
        ImprovementSense::HigherIsBetter
    );
    assert_eq!(
        config.comparison.senses.max_blocks_read,
        ImprovementSense::LowerIsBetter
    );
}

#[test]
fn test_parse_full_toml() {
    let source = indoc! {r#"
        ids = "random"

        [comparison]
        similarity_threshold = 0.75
        match_nodes = false
        strictness = "strict"

        [comparison.senses]
        max_cost = "higher_is_better"
    "#};

    let config = AnalyzerConfig::from_toml_str(source).unwrap();
    assert_eq!(config.ids, IdStrategy::Random);
    assert_eq!(config.comparison.similarity_threshold, 0.75);
    assert!(!config.comparison.match_nodes);
    assert_eq!(config.comparison.strictness, Strictness::Strict);
    assert_eq!(
        config.comparison.senses.max_cost,
        ImprovementSense::HigherIsBetter
    );
    // unspecified senses keep their defaults
    assert_eq!(
        config.comparison.senses.max_blocks_hit,
        ImprovementSense::HigherIsBetter
    );
}

#[test]
fn test_threshold_out_of_range_is_rejected() {
    let source = indoc! {r#"
        [comparison]
        similarity_threshold = 1.5
    "#};

    let error = AnalyzerConfig::from_toml_str(source).unwrap_err();
    assert!(matches!(error, PlanError::InvalidConfig(_)));
    assert!(error.to_string().contains("similarity_threshold"));
}

#[test]
fn test_malformed_toml_is_a_config_error() {
    let error = AnalyzerConfig::from_toml_str("ids = [").unwrap_err();
    assert!(matches!(error, PlanError::InvalidConfig(_)));

    let error = AnalyzerConfig::from_toml_str(r#"ids = "incrementing""#).unwrap_err();
    assert!(matches!(error, PlanError::InvalidConfig(_)));
}

#[test]
fn test_improvement_sense() {
    assert!(ImprovementSense::LowerIsBetter.has_improved(10.0, 5.0));
    assert!(!ImprovementSense::LowerIsBetter.has_improved(5.0, 5.0));
    assert!(ImprovementSense::HigherIsBetter.has_improved(5.0, 10.0));
    assert!(!ImprovementSense::HigherIsBetter.has_improved(10.0, 5.0));
}

#[test]
fn test_id_strategy_sources() {
    let mut sequential = IdStrategy::Sequential.source();
    assert_eq!(sequential.next_id().as_str(), "1");

    let mut random = IdStrategy::Random.source();
    assert_eq!(random.next_id().as_str().len(), 36);
}
