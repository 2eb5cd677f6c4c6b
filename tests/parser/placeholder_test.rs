//! Placeholder styles: positional `?`/`%s` and named `:name`.

use std::collections::BTreeMap;

use twosql::{
    compile_sql, CompileOptions, Dialect, Params, PlaceholderStyle, SqlTemplate, TemplateError,
    Value,
};

fn params(entries: &[(&str, Value)]) -> Params {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn with_style(sql: &str, style: PlaceholderStyle) -> SqlTemplate {
    SqlTemplate::with_options(sql, CompileOptions::default().with_placeholder(style)).unwrap()
}

#[test]
fn test_percent_s_single_param() {
    let template = with_style(
        "SELECT * FROM users WHERE name = /* $name */'default'",
        PlaceholderStyle::Percent,
    );
    let result = template.compile(&params(&[("name", Value::from("Alice"))])).unwrap();
    assert_eq!(result.sql, "SELECT * FROM users WHERE name = %s");
    assert_eq!(result.params, vec![Value::from("Alice")]);
}

#[test]
fn test_percent_s_multiple_params() {
    let template = with_style(
        "SELECT * FROM users\nWHERE\n    name = /* $name */'default'\n    AND age = /* $age */20",
        PlaceholderStyle::Percent,
    );
    let result = template
        .compile(&params(&[("name", Value::from("Alice")), ("age", Value::Int(30))]))
        .unwrap();
    assert!(result.sql.contains("name = %s"));
    assert!(result.sql.contains("age = %s"));
    assert_eq!(result.params, vec![Value::from("Alice"), Value::Int(30)]);
}

#[test]
fn test_percent_s_in_clause() {
    let template = with_style(
        "SELECT * FROM users WHERE id IN /* $ids */(1, 2, 3)",
        PlaceholderStyle::Percent,
    );
    let result = template
        .compile(&params(&[("ids", Value::from(vec![10i64, 20, 30]))]))
        .unwrap();
    assert!(result.sql.contains("IN (%s, %s, %s)"));
    assert_eq!(
        result.params,
        vec![Value::Int(10), Value::Int(20), Value::Int(30)]
    );
}

#[test]
fn test_percent_s_named_params_mirror_input() {
    let template = with_style(
        "SELECT * FROM users WHERE name = /* $name */'default'",
        PlaceholderStyle::Percent,
    );
    let input = params(&[("name", Value::from("Alice")), ("extra", Value::Int(123))]);
    let result = template.compile(&input).unwrap();
    assert_eq!(result.named_params, input);
}

#[test]
fn test_named_single_param() {
    let template = with_style(
        "SELECT * FROM users WHERE name = /* $name */'default'",
        PlaceholderStyle::Named,
    );
    let result = template.compile(&params(&[("name", Value::from("Alice"))])).unwrap();
    assert_eq!(result.sql, "SELECT * FROM users WHERE name = :name");
    assert_eq!(
        result.named_params,
        params(&[("name", Value::from("Alice"))])
    );
    assert!(result.params.is_empty());
}

#[test]
fn test_named_multiple_params() {
    let template = with_style(
        "SELECT * FROM users\nWHERE\n    name = /* $name */'default'\n    AND age = /* $age */20",
        PlaceholderStyle::Named,
    );
    let result = template
        .compile(&params(&[("name", Value::from("Alice")), ("age", Value::Int(30))]))
        .unwrap();
    assert!(result.sql.contains("name = :name"));
    assert!(result.sql.contains("age = :age"));
    assert_eq!(
        result.named_params,
        params(&[("name", Value::from("Alice")), ("age", Value::Int(30))])
    );
}

#[test]
fn test_named_non_removable_binds_null() {
    let template = with_style(
        "SELECT * FROM users WHERE deleted_at = /* deleted_at */NULL",
        PlaceholderStyle::Named,
    );
    let result = template.compile(&params(&[("deleted_at", Value::Null)])).unwrap();
    assert_eq!(
        result.sql,
        "SELECT * FROM users WHERE deleted_at = :deleted_at"
    );
    assert_eq!(result.named_params, params(&[("deleted_at", Value::Null)]));
}

#[test]
fn test_named_in_clause_expansion() {
    let template = with_style(
        "SELECT * FROM users WHERE id IN /* $ids */(1, 2, 3)",
        PlaceholderStyle::Named,
    );
    let result = template
        .compile(&params(&[("ids", Value::from(vec![10i64, 20, 30]))]))
        .unwrap();
    assert!(result.sql.contains("IN (:ids_0, :ids_1, :ids_2)"));
    assert_eq!(
        result.named_params,
        params(&[
            ("ids_0", Value::Int(10)),
            ("ids_1", Value::Int(20)),
            ("ids_2", Value::Int(30)),
        ])
    );
}

#[test]
fn test_named_in_clause_empty_and_scalar() {
    let template = with_style(
        "SELECT * FROM users WHERE id IN /* ids */(1, 2, 3)",
        PlaceholderStyle::Named,
    );
    let result = template.compile(&params(&[("ids", Value::List(vec![]))])).unwrap();
    assert!(result.sql.contains("IN (NULL)"));
    assert_eq!(result.named_params, BTreeMap::new());

    let result = template.compile(&params(&[("ids", Value::Null)])).unwrap();
    assert!(result.sql.contains("IN (:ids)"));
    assert_eq!(result.named_params, params(&[("ids", Value::Null)]));
}

#[test]
fn test_named_removable_empty_list_stays_as_null_list() {
    let template = with_style(
        "SELECT * FROM users WHERE id IN /* $ids */(1, 2, 3)",
        PlaceholderStyle::Named,
    );
    let result = template.compile(&params(&[("ids", Value::List(vec![]))])).unwrap();
    assert!(result.sql.contains("IN (NULL)"));
    assert!(result.named_params.is_empty());
}

#[test]
fn test_named_removal() {
    let template = with_style(
        "SELECT * FROM users\nWHERE\n    name = /* $name */'default'",
        PlaceholderStyle::Named,
    );
    let result = template.compile(&params(&[("name", Value::Null)])).unwrap();
    assert_eq!(result.sql, "SELECT * FROM users");
    assert!(result.named_params.is_empty());
    assert!(result.params.is_empty());
}

#[test]
fn test_named_partial_removal() {
    let template = with_style(
        "SELECT * FROM users\nWHERE\n    id = /* $id */1\n    AND name = /* $name */'test'",
        PlaceholderStyle::Named,
    );
    let result = template
        .compile(&params(&[("id", Value::Null), ("name", Value::from("Alice"))]))
        .unwrap();
    assert_eq!(result.sql, "SELECT * FROM users\nWHERE\n    name = :name");
    assert_eq!(result.named_params, params(&[("name", Value::from("Alice"))]));
}

#[test]
fn test_named_mixed_regular_and_in_clause() {
    let template = with_style(
        "SELECT * FROM users\nWHERE name = /* $name */'default'\n  AND id IN /* $ids */(1, 2)",
        PlaceholderStyle::Named,
    );
    let result = template
        .compile(&params(&[
            ("name", Value::from("Alice")),
            ("ids", Value::from(vec![10i64, 20])),
        ]))
        .unwrap();
    assert!(result.sql.contains("name = :name"));
    assert!(result.sql.contains("IN (:ids_0, :ids_1)"));
    assert_eq!(
        result.named_params,
        params(&[
            ("name", Value::from("Alice")),
            ("ids_0", Value::Int(10)),
            ("ids_1", Value::Int(20)),
        ])
    );
    assert!(result.params.is_empty());
}

#[test]
fn test_dialects_pick_their_placeholder() {
    let cases = [
        (Dialect::Sqlite, "SELECT * FROM t WHERE id = ?"),
        (Dialect::PostgreSql, "SELECT * FROM t WHERE id = %s"),
        (Dialect::MySql, "SELECT * FROM t WHERE id = %s"),
        (Dialect::Oracle, "SELECT * FROM t WHERE id = :id"),
    ];
    for (dialect, expected) in cases {
        let result = compile_sql(
            "SELECT * FROM t WHERE id = /* $id */0",
            &params(&[("id", Value::Int(1))]),
            CompileOptions::default().with_dialect(dialect),
        )
        .unwrap();
        assert_eq!(result.sql, expected, "dialect {dialect:?}");
    }
}

#[test]
fn test_dialect_and_non_default_placeholder_conflict() {
    let err = SqlTemplate::with_options(
        "SELECT * FROM t",
        CompileOptions::default()
            .with_placeholder(PlaceholderStyle::Percent)
            .with_dialect(Dialect::PostgreSql),
    )
    .unwrap_err();
    assert!(matches!(err, TemplateError::Configuration(_)));
}

#[test]
fn test_dialect_with_default_placeholder_is_allowed() {
    let template = SqlTemplate::with_options(
        "SELECT * FROM t WHERE id = /* $id */0",
        CompileOptions::default()
            .with_placeholder(PlaceholderStyle::Question)
            .with_dialect(Dialect::PostgreSql),
    )
    .unwrap();
    let result = template.compile(&params(&[("id", Value::Int(1))])).unwrap();
    assert_eq!(result.sql, "SELECT * FROM t WHERE id = %s");
}

#[test]
fn test_dialect_in_clause_expansion() {
    let result = compile_sql(
        "SELECT * FROM t WHERE id IN /* $ids */(0)",
        &params(&[("ids", Value::from(vec![1i64, 2, 3]))]),
        CompileOptions::default().with_dialect(Dialect::PostgreSql),
    )
    .unwrap();
    assert_eq!(result.sql, "SELECT * FROM t WHERE id IN (%s, %s, %s)");
    assert_eq!(result.params, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
}

#[test]
fn test_no_dialect_defaults_to_question() {
    let result = compile_sql(
        "SELECT * FROM t WHERE id = /* $id */0",
        &params(&[("id", Value::Int(1))]),
        CompileOptions::default(),
    )
    .unwrap();
    assert_eq!(result.sql, "SELECT * FROM t WHERE id = ?");
}
