//! Cleanup behaviour, directly and through full compiles.

use twosql::parser::clean::clean_sql;
use twosql::{Params, SqlTemplate, Value};

fn params(entries: &[(&str, Value)]) -> Params {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn test_leading_conjunction_after_where() {
    assert_eq!(clean_sql("WHERE\n    AND name = ?"), "WHERE\n    name = ?");
    assert_eq!(clean_sql("WHERE\n    OR name = ?"), "WHERE\n    name = ?");
    assert_eq!(
        clean_sql("WHERE\n    AND name = ?\n    AND age = ?"),
        "WHERE\n    name = ?\n    AND age = ?"
    );
    assert_eq!(clean_sql("HAVING\n    AND count > 0"), "HAVING\n    count > 0");
}

#[test]
fn test_unmatched_paren_lines_removed() {
    assert_eq!(clean_sql("WHERE\n    )\n    AND name = ?"), "WHERE\n    name = ?");
    assert_eq!(
        clean_sql("WHERE\n    (\n        name = ?\n    )"),
        "WHERE\n    (\n        name = ?\n    )"
    );
}

#[test]
fn test_dangling_where_removed() {
    assert_eq!(clean_sql("SELECT * FROM users\nWHERE"), "SELECT * FROM users");
    assert_eq!(
        clean_sql("SELECT * FROM users\nWHERE\nORDER BY id"),
        "SELECT * FROM users\nORDER BY id"
    );
    assert_eq!(
        clean_sql("SELECT * FROM users\nWHERE\nLIMIT 10"),
        "SELECT * FROM users\nLIMIT 10"
    );
}

#[test]
fn test_plain_sql_untouched() {
    assert_eq!(clean_sql("SELECT * FROM users"), "SELECT * FROM users");
    assert_eq!(
        clean_sql("SELECT * FROM users\nWHERE\n    name = ?"),
        "SELECT * FROM users\nWHERE\n    name = ?"
    );
}

#[test]
fn test_compile_strips_leading_and() {
    let sql = "WHERE\n    id = /* $id */1\n    AND name = /* $name */'太郎'";
    let template = SqlTemplate::new(sql);
    let result = template
        .compile(&params(&[("id", Value::Null), ("name", Value::from("花子"))]))
        .unwrap();
    assert_eq!(result.sql, "WHERE\n    name = ?");
    assert_eq!(result.params, vec![Value::from("花子")]);
}

#[test]
fn test_compile_collapses_empty_paren_group() {
    let sql = "WHERE\n    AND (\n        status = /* $status1 */'active'\n        OR status = /* $status2 */'pending'\n    )\n    AND name = /* $name */'test'";
    let template = SqlTemplate::new(sql);
    let result = template
        .compile(&params(&[
            ("status1", Value::Null),
            ("status2", Value::Null),
            ("name", Value::from("Alice")),
        ]))
        .unwrap();
    assert_eq!(result.sql, "WHERE\n    name = ?");
    assert_eq!(result.params, vec![Value::from("Alice")]);
}

#[test]
fn test_compile_removes_where_when_all_conditions_gone() {
    let sql = "SELECT * FROM users\nWHERE\n    AND name = /* $name */'default'";
    let template = SqlTemplate::new(sql);
    let result = template.compile(&params(&[("name", Value::Null)])).unwrap();
    assert_eq!(result.sql, "SELECT * FROM users");
    assert!(result.params.is_empty());
}

#[test]
fn test_compile_partial_removal_keeps_conjunctions() {
    let sql = "SELECT * FROM users\nWHERE\n    id = /* $id */1\n    AND name = /* $name */'test'\n    AND age = /* $age */20";
    let template = SqlTemplate::new(sql);
    let result = template
        .compile(&params(&[
            ("id", Value::Null),
            ("name", Value::from("Alice")),
            ("age", Value::Int(30)),
        ]))
        .unwrap();
    assert_eq!(
        result.sql,
        "SELECT * FROM users\nWHERE\n    name = ?\n    AND age = ?"
    );
    assert_eq!(result.params, vec![Value::from("Alice"), Value::Int(30)]);
}

#[test]
fn test_cleanup_is_idempotent_on_compiled_output() {
    let sql = "SELECT * FROM users\nWHERE\n    id = /* $id */1\n    AND name = /* $name */'test'\n    AND age = /* $age */20";
    let template = SqlTemplate::new(sql);
    for p in [
        params(&[("id", Value::Null), ("name", Value::from("A")), ("age", Value::Int(1))]),
        params(&[("id", Value::Null), ("name", Value::Null), ("age", Value::Null)]),
        params(&[("id", Value::Int(1)), ("name", Value::Null), ("age", Value::Int(2))]),
    ] {
        let result = template.compile(&p).unwrap();
        assert_eq!(clean_sql(&result.sql), result.sql);
    }
}
