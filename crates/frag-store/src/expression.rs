//! The query subset understood by the in-memory store.
//!
//! ```text
//! expr   := clause ( " and " clause )*
//! clause := path op '<literal>'
//! path   := fragmentName ( "." field )*
//! op     := eq | ne
//! ```
//!
//! Anything else is rejected the way a remote store would reject it.

use frag_types::ManagedObject;
use serde_json::Value;

use crate::error::{StoreError, StoreResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Op {
    Eq,
    Ne,
}

#[derive(Clone, Debug, PartialEq)]
struct Clause {
    path: Vec<String>,
    op: Op,
    literal: String,
}

/// A parsed query expression.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Expression {
    clauses: Vec<Clause>,
}

impl Expression {
    pub(crate) fn parse(input: &str) -> StoreResult<Self> {
        let clauses = split_and(input)
            .into_iter()
            .map(parse_clause)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(Self { clauses })
    }

    pub(crate) fn matches(&self, object: &ManagedObject) -> bool {
        self.clauses.iter().all(|clause| {
            let found = lookup(object, &clause.path).is_some_and(|value| equals(value, &clause.literal));
            match clause.op {
                Op::Eq => found,
                Op::Ne => !found,
            }
        })
    }
}

fn rejected(input: &str, reason: &str) -> StoreError {
    StoreError::Remote(format!("invalid query {input:?}: {reason}"))
}

/// Split on ` and ` outside quoted literals.
fn split_and(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quoted = false;
    let mut start = 0;
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => quoted = !quoted,
            b' ' if !quoted && input[i..].starts_with(" and ") => {
                parts.push(&input[start..i]);
                i += " and ".len();
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&input[start..]);
    parts
}

fn parse_clause(clause: &str) -> StoreResult<Clause> {
    let clause = clause.trim();
    let mut words = clause.splitn(3, ' ');
    let (Some(path), Some(op), Some(literal)) = (words.next(), words.next(), words.next()) else {
        return Err(rejected(clause, "expected `<path> <op> '<value>'`"));
    };

    let op = match op {
        "eq" => Op::Eq,
        "ne" => Op::Ne,
        other => return Err(rejected(clause, &format!("unsupported operator {other:?}"))),
    };

    let literal = literal.trim();
    let literal = literal
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
        .filter(|inner| !inner.contains('\''))
        .ok_or_else(|| rejected(clause, "value must be a single-quoted literal"))?;

    let path: Vec<String> = path.split('.').map(str::to_string).collect();
    if path.iter().any(String::is_empty) {
        return Err(rejected(clause, "empty path segment"));
    }

    Ok(Clause {
        path,
        op,
        literal: literal.to_string(),
    })
}

fn lookup<'a>(object: &'a ManagedObject, path: &[String]) -> Option<&'a Value> {
    let (fragment, fields) = path.split_first()?;
    fields
        .iter()
        .try_fold(object.get(fragment)?, |value, field| value.get(field.as_str()))
}

fn equals(value: &Value, literal: &str) -> bool {
    match value {
        Value::String(s) => s == literal,
        Value::Number(n) => n.to_string() == literal,
        Value::Bool(b) => b.to_string() == literal,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn device(manufacturer: &str, model: &str) -> ManagedObject {
        let mut mo = ManagedObject::new();
        mo.set(
            "@cookbook_CustomDevice",
            json!({"@type": "cookbook.CustomDevice", "manufacturer": manufacturer, "model": model}),
        )
        .unwrap();
        mo.set("type", json!("device")).unwrap();
        mo.set("c8y_Position", json!({"alt": 12})).unwrap();
        mo
    }

    #[test]
    fn eq_on_nested_field() {
        let expr = Expression::parse("@cookbook_CustomDevice.manufacturer eq 'Acme Corp'").unwrap();
        assert!(expr.matches(&device("Acme Corp", "x")));
        assert!(!expr.matches(&device("Globex", "x")));
    }

    #[test]
    fn ne_and_conjunction() {
        let expr =
            Expression::parse("@cookbook_CustomDevice.manufacturer eq 'Acme Corp' and type ne 'sensor'")
                .unwrap();
        assert!(expr.matches(&device("Acme Corp", "x")));
    }

    #[test]
    fn and_inside_literal_is_not_a_separator() {
        let expr = Expression::parse("@cookbook_CustomDevice.manufacturer eq 'Black and Decker'").unwrap();
        assert!(expr.matches(&device("Black and Decker", "x")));
    }

    #[test]
    fn numbers_compare_by_text() {
        let expr = Expression::parse("c8y_Position.alt eq '12'").unwrap();
        assert!(expr.matches(&device("a", "b")));
    }

    #[test]
    fn missing_path_is_not_equal() {
        let eq = Expression::parse("c8y_Missing.x eq 'y'").unwrap();
        let ne = Expression::parse("c8y_Missing.x ne 'y'").unwrap();
        assert!(!eq.matches(&device("a", "b")));
        assert!(ne.matches(&device("a", "b")));
    }

    #[test]
    fn rejects_unsupported_syntax() {
        for bad in [
            "type gt '3'",
            "type eq 3",
            "type",
            "type eq 'a' or type eq 'b'",
            "a..b eq 'x'",
        ] {
            assert!(
                matches!(Expression::parse(bad), Err(StoreError::Remote(_))),
                "accepted {bad:?}"
            );
        }
    }
}
