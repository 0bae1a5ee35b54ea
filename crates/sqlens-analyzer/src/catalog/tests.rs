use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_declared_type_mapping() {
    assert_eq!(SemanticType::from_declared("INTEGER"), Some(SemanticType::Integer));
    assert_eq!(SemanticType::from_declared("bigint"), Some(SemanticType::Integer));
    assert_eq!(SemanticType::from_declared("VARCHAR(255)"), Some(SemanticType::Text));
    assert_eq!(SemanticType::from_declared("DECIMAL(10,2)"), Some(SemanticType::Numeric));
    assert_eq!(SemanticType::from_declared("TIMESTAMP"), Some(SemanticType::Temporal));
    assert_eq!(SemanticType::from_declared("boolean"), Some(SemanticType::Boolean));
    assert_eq!(SemanticType::from_declared("BLOB"), None);
    assert_eq!(SemanticType::from_declared(""), None);
}

#[test]
fn test_name_inference() {
    assert_eq!(SemanticType::infer_from_name("user_id"), Some(SemanticType::Integer));
    assert_eq!(SemanticType::infer_from_name("ID"), Some(SemanticType::Integer));
    assert_eq!(SemanticType::infer_from_name("created_at"), Some(SemanticType::Temporal));
    assert_eq!(SemanticType::infer_from_name("is_active"), Some(SemanticType::Boolean));
    assert_eq!(SemanticType::infer_from_name("status"), None);
}

#[test]
fn test_lookups_are_case_insensitive() {
    let catalog = SchemaCatalog::new().with_table(
        TableSchema::new("Orders")
            .with_column("Status", SemanticType::Text)
            .with_row_count(1_000),
    );
    assert_eq!(
        catalog.column_type("orders", "STATUS"),
        Some(SemanticType::Text)
    );
    assert_eq!(catalog.row_count("ORDERS"), Some(1_000));
    assert!(catalog.table("payments").is_none());
}

#[test]
fn test_deserialize() {
    let json = r#"{"tables":{"users":{"name":"users","columns":{"email":"text"},"row_count":50}}}"#;
    let catalog: SchemaCatalog = serde_json::from_str(json).unwrap();
    assert_eq!(catalog.column_type("users", "email"), Some(SemanticType::Text));
}
