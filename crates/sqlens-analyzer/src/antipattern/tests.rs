use super::*;
use crate::inventory::extract;
use crate::sql::parse;
use pretty_assertions::assert_eq;

fn inventory(sql: &str) -> ClauseInventory {
    extract(&parse(sql).unwrap())
}

fn rule_ids(findings: &[Finding]) -> Vec<&str> {
    findings.iter().map(|f| f.rule.as_str()).collect()
}

struct AlwaysFires;

impl AntiPatternRule for AlwaysFires {
    fn id(&self) -> &'static str {
        "X001"
    }

    fn name(&self) -> &'static str {
        "Always fires on set operations"
    }

    fn required_clauses(&self) -> &'static [ClauseKind] {
        &[ClauseKind::SetOperation]
    }

    fn check(&self, inventory: &ClauseInventory, _ctx: &DetectionContext<'_>) -> Vec<Finding> {
        let root = inventory.root().unwrap();
        vec![Finding::new(
            self.id(),
            Severity::Info,
            root.id,
            root.span,
            "fired",
            FindingPayload::OrAcrossColumns {
                group: 0,
                columns: Vec::new(),
            },
        )]
    }
}

#[test]
fn test_severity_serialization() {
    assert_eq!(serde_json::to_string(&Severity::Critical).unwrap(), "\"critical\"");
    assert_eq!(Severity::Warning.as_str(), "warning");
    assert!(Severity::Critical > Severity::Warning);
    assert!(Severity::Warning.is_warning_or_above());
    assert!(!Severity::Info.is_warning_or_above());
    assert_eq!(Severity::Info.rank(), 1);
}

#[test]
fn test_function_wrapped_example() {
    let findings = detect(&inventory("SELECT * FROM orders WHERE UPPER(status) = 'PAID'"));

    assert_eq!(rule_ids(&findings), vec!["AP001", "AP002"]);
    assert!(findings.iter().all(|f| f.severity == Severity::Warning));
    assert_eq!(findings[1].column(), Some("orders.status"));
}

#[test]
fn test_findings_ordered_by_position_then_rule() {
    let sql = "SELECT * FROM orders WHERE UPPER(status) = 'PAID' OR note LIKE '%x%'";
    let inv = inventory(sql);
    let findings = detect(&inv);

    assert_eq!(rule_ids(&findings), vec!["AP001", "AP002", "AP008", "AP005"]);
    for _ in 0..5 {
        assert_eq!(detect(&inv), findings);
    }
}

#[test]
fn test_disabled_rules_are_skipped() {
    let detector = AntiPatternDetector::with_config(DetectorConfig::new().with_disabled("ap001"));
    let findings = detector.detect(&inventory("SELECT * FROM t"), None);
    assert!(findings.is_empty());
}

#[test]
fn test_rules_without_required_clauses_are_skipped() {
    let detector = AntiPatternDetector::new().with_rule(AlwaysFires);

    let plain = detector.detect(&inventory("SELECT a FROM t"), None);
    assert!(plain.iter().all(|f| f.rule != "X001"));

    let union = detector.detect(&inventory("SELECT a FROM t UNION ALL SELECT a FROM u"), None);
    assert!(union.iter().any(|f| f.rule == "X001"));
}

#[test]
fn test_builtin_registry() {
    let detector = AntiPatternDetector::new();
    let ids: Vec<_> = detector.rules().map(|r| r.id()).collect();
    assert_eq!(
        ids,
        vec!["AP001", "AP002", "AP003", "AP004", "AP005", "AP006", "AP007", "AP008"]
    );
}

#[test]
fn test_config_deserializes_with_defaults() {
    let config: DetectorConfig =
        serde_json::from_str(r#"{"correlated_in_where":"warning"}"#).unwrap();
    assert_eq!(config.correlated_in_where, Severity::Warning);
    assert_eq!(config.correlated_elsewhere, Severity::Info);
    assert!(config.assume_distinct_sources);
}
