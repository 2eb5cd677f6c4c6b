//! End-to-end compile scenarios and cross-cutting invariants.

use insta::assert_snapshot;
use twosql::parser::clean::clean_sql;
use twosql::{CompileOptions, Dialect, Params, SqlTemplate, Value};

fn params(entries: &[(&str, Value)]) -> Params {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

const PRUNING_TEMPLATE: &str =
    "SELECT * FROM users\nWHERE\n    dept_id = /* $dept_id */999\n    AND name = /* $name */'default'";

#[test]
fn test_partial_pruning() {
    let template = SqlTemplate::new(PRUNING_TEMPLATE);
    let result = template
        .compile(&params(&[("dept_id", Value::Int(10)), ("name", Value::Null)]))
        .unwrap();
    assert_eq!(result.sql, "SELECT * FROM users\nWHERE\n    dept_id = ?");
    assert_eq!(result.params, vec![Value::Int(10)]);
}

#[test]
fn test_all_none_collapse() {
    let template = SqlTemplate::new(PRUNING_TEMPLATE);
    let result = template
        .compile(&params(&[("dept_id", Value::Null), ("name", Value::Null)]))
        .unwrap();
    assert_eq!(result.sql, "SELECT * FROM users");
    assert!(result.params.is_empty());
}

#[test]
fn test_in_expansion() {
    let template = SqlTemplate::new("SELECT * FROM u WHERE id IN /* $ids */(1, 2)");
    let result = template
        .compile(&params(&[("ids", Value::from(vec![10i64, 20, 30]))]))
        .unwrap();
    assert_snapshot!(result.sql, @"SELECT * FROM u WHERE id IN (?, ?, ?)");
    assert_eq!(
        result.params,
        vec![Value::Int(10), Value::Int(20), Value::Int(30)]
    );
}

#[test]
fn test_oracle_in_chunking() {
    let template = SqlTemplate::with_options(
        "SELECT * FROM t WHERE id IN /* $ids */(1)",
        CompileOptions::default().with_dialect(Dialect::Oracle),
    )
    .unwrap();
    let ids = Value::List((1..=1003).map(Value::Int).collect());
    let result = template.compile(&params(&[("ids", ids)])).unwrap();
    assert_eq!(result.sql.matches("id IN (").count(), 2);
    assert_eq!(result.sql.matches(" OR ").count(), 1);
    assert!(result.sql.contains("WHERE (id IN ("));
    assert!(result.sql.trim_end().ends_with("))"));
    assert_eq!(result.named_params.len(), 1003);
}

#[test]
fn test_smart_operator_scenarios() {
    let template = SqlTemplate::new("SELECT * FROM t WHERE dept /* name */= 'x'");

    let result = template.compile(&params(&[("name", Value::Null)])).unwrap();
    assert_snapshot!(result.sql, @"SELECT * FROM t WHERE dept IS NULL");

    let result = template
        .compile(&params(&[("name", Value::from(vec![1i64, 2]))]))
        .unwrap();
    assert_snapshot!(result.sql, @"SELECT * FROM t WHERE dept IN (?, ?)");

    let result = template.compile(&params(&[("name", Value::Int(5))])).unwrap();
    assert_snapshot!(result.sql, @"SELECT * FROM t WHERE dept = ?");
    assert_eq!(result.params, vec![Value::Int(5)]);
}

#[test]
fn test_like_escape_helper_scenario() {
    let template =
        SqlTemplate::new("SELECT * FROM t WHERE msg LIKE /*%L '%' kw '%' */'%x%'");
    let result = template.compile(&params(&[("kw", Value::from("100%"))])).unwrap();
    assert_snapshot!(result.sql, @"SELECT * FROM t WHERE msg LIKE ? escape '#'");
    assert_eq!(result.params, vec![Value::from("%100#%%")]);
}

#[test]
fn test_positional_length_matches_placeholder_count() {
    let template = SqlTemplate::new(
        "SELECT * FROM t\nWHERE\n    a = /* $a */1\n    AND b IN /* $b */(1, 2)\n    AND c /* c */= 'x'",
    );
    let result = template
        .compile(&params(&[
            ("a", Value::Int(1)),
            ("b", Value::from(vec![1i64, 2, 3])),
            ("c", Value::from("v")),
        ]))
        .unwrap();
    assert_eq!(result.sql.matches('?').count(), result.params.len());
    assert_eq!(result.params.len(), 5);
}

#[test]
fn test_named_mapping_keys_match_produced_sql() {
    let template = SqlTemplate::with_options(
        "SELECT * FROM t\nWHERE\n    a = /* $a */1\n    AND b IN /* $b */(1, 2)",
        CompileOptions::default().with_dialect(Dialect::Oracle),
    )
    .unwrap();
    let result = template
        .compile(&params(&[("a", Value::Int(1)), ("b", Value::from(vec![7i64, 8]))]))
        .unwrap();
    for key in result.named_params.keys() {
        assert!(
            result.sql.contains(&format!(":{key}")),
            "named key {key} missing from SQL"
        );
    }
    assert_eq!(result.named_params.len(), 3);
}

#[test]
fn test_cleanup_idempotent_across_scenarios() {
    let template = SqlTemplate::new(PRUNING_TEMPLATE);
    for p in [
        params(&[("dept_id", Value::Int(10)), ("name", Value::Null)]),
        params(&[("dept_id", Value::Null), ("name", Value::Null)]),
        params(&[("dept_id", Value::Int(1)), ("name", Value::from("x"))]),
    ] {
        let result = template.compile(&p).unwrap();
        assert_eq!(clean_sql(&result.sql), result.sql);
    }
}

#[test]
fn test_removal_decision_ignores_default_text() {
    // The same modifier + value must prune identically whatever the
    // default literal looks like.
    for default in ["'x'", "999", "NULL", "ident"] {
        let sql = format!("SELECT * FROM t\nWHERE\n    col = /* $v */{default}");
        let template = SqlTemplate::new(sql);
        let removed = template.compile(&params(&[("v", Value::Null)])).unwrap();
        assert_eq!(removed.sql, "SELECT * FROM t");
        let kept = template.compile(&params(&[("v", Value::Int(1))])).unwrap();
        assert!(kept.sql.contains("col = ?"));
    }
}

#[test]
fn test_compile_is_repeatable_on_one_template() {
    let template = SqlTemplate::new(PRUNING_TEMPLATE);
    let first = template
        .compile(&params(&[("dept_id", Value::Int(10)), ("name", Value::Null)]))
        .unwrap();
    let second = template
        .compile(&params(&[("dept_id", Value::Int(10)), ("name", Value::Null)]))
        .unwrap();
    assert_eq!(first, second);

    // A different parameter map on the same template is independent.
    let other = template
        .compile(&params(&[("dept_id", Value::Null), ("name", Value::from("n"))]))
        .unwrap();
    assert_eq!(other.sql, "SELECT * FROM users\nWHERE\n    name = ?");
}

#[test]
fn test_blank_lines_pass_through() {
    let template = SqlTemplate::new("SELECT *\n\nFROM users");
    let result = template.compile(&Params::new()).unwrap();
    assert_eq!(result.sql, "SELECT *\n\nFROM users");
}
