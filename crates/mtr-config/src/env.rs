//! `REPORTING_OPERATOR_*` environment overlay.
//!
//! Each recognised variable maps to one leaf of the config document. Unknown
//! variables with the prefix are an error so typos do not silently fall back
//! to defaults.

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};

pub const ENV_PREFIX: &str = "REPORTING_OPERATOR";

#[derive(Clone, Copy)]
enum Scalar {
    Str,
    Bool,
    UInt,
}

const VARS: &[(&str, &str, Scalar)] = &[
    ("NAMESPACE", "/namespace", Scalar::Str),
    ("LOG_LEVEL", "/log/level", Scalar::Str),
    ("DISABLE_TIMESTAMP", "/log/disable_timestamp", Scalar::Bool),
    ("PRESTO_HOST", "/presto/host", Scalar::Str),
    ("PRESTO_USER", "/presto/user", Scalar::Str),
    ("PRESTO_CATALOG", "/presto/catalog", Scalar::Str),
    ("PRESTO_SCHEMA", "/presto/schema", Scalar::Str),
    ("PRESTO_PASSWORD_ENV", "/presto/password_env", Scalar::Str),
    ("LOG_DDL_QUERIES", "/presto/log_ddl_queries", Scalar::Bool),
    ("LISTEN_ADDR", "/api/listen_addr", Scalar::Str),
    ("REQUEUE_BASE_DELAY_MS", "/requeue/base_delay_ms", Scalar::UInt),
    ("REQUEUE_MAX_DELAY_MS", "/requeue/max_delay_ms", Scalar::UInt),
    ("DEPENDENCY_DEFER_MS", "/requeue/dependency_defer_ms", Scalar::UInt),
    ("GENERATION_QUERY_WORKERS", "/workers/generation_queries", Scalar::UInt),
    ("REPORT_WORKERS", "/workers/reports", Scalar::UInt),
    ("SCHEDULED_REPORT_WORKERS", "/workers/scheduled_reports", Scalar::UInt),
    ("DATA_SOURCE_WORKERS", "/workers/data_sources", Scalar::UInt),
    ("GENERATION_QUERY_MAX_REQUEUES", "/max_requeues/generation_queries", Scalar::UInt),
    ("REPORT_MAX_REQUEUES", "/max_requeues/reports", Scalar::UInt),
    ("SCHEDULED_REPORT_MAX_REQUEUES", "/max_requeues/scheduled_reports", Scalar::UInt),
    ("DATA_SOURCE_MAX_REQUEUES", "/max_requeues/data_sources", Scalar::UInt),
];

/// Build a config overlay from `(name, value)` pairs.
///
/// Pairs without the `REPORTING_OPERATOR_` prefix are ignored.
pub fn env_overlay<I>(vars: I) -> Result<Value>
where
    I: IntoIterator<Item = (String, String)>,
{
    let prefix = format!("{ENV_PREFIX}_");
    let mut overlay = Value::Object(Map::new());

    let mut pairs: Vec<(String, String)> = vars
        .into_iter()
        .filter(|(k, _)| k.starts_with(&prefix))
        .collect();
    pairs.sort();

    for (name, raw) in pairs {
        let suffix = &name[prefix.len()..];
        let Some((_, pointer, scalar)) = VARS.iter().find(|(s, _, _)| *s == suffix) else {
            bail!("CONFIG_ENV_UNKNOWN: {name} is not a recognised setting");
        };
        let value = parse_scalar(&name, &raw, *scalar)?;
        set_pointer(&mut overlay, pointer, value);
    }
    Ok(overlay)
}

pub fn env_overlay_from_process() -> Result<Value> {
    env_overlay(std::env::vars())
}

fn parse_scalar(name: &str, raw: &str, scalar: Scalar) -> Result<Value> {
    let t = raw.trim();
    Ok(match scalar {
        Scalar::Str => Value::String(t.to_string()),
        Scalar::Bool => match t.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Value::Bool(true),
            "0" | "false" | "no" | "off" | "" => Value::Bool(false),
            _ => bail!("CONFIG_ENV_INVALID: {name} expects a boolean, got {t:?}"),
        },
        Scalar::UInt => {
            let n: u64 = t
                .parse()
                .with_context(|| format!("CONFIG_ENV_INVALID: {name} expects an integer"))?;
            Value::from(n)
        }
    })
}

fn set_pointer(root: &mut Value, pointer: &str, value: Value) {
    let mut cur = root;
    let mut tokens = pointer.trim_start_matches('/').split('/').peekable();
    while let Some(tok) = tokens.next() {
        if !cur.is_object() {
            *cur = Value::Object(Map::new());
        }
        let Value::Object(map) = cur else { return };
        if tokens.peek().is_none() {
            map.insert(tok.to_string(), value);
            return;
        }
        cur = map
            .entry(tok.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn maps_prefixed_vars_to_nested_keys() {
        let v = env_overlay(vars(&[
            ("REPORTING_OPERATOR_PRESTO_HOST", "presto.metering:8080"),
            ("REPORTING_OPERATOR_LOG_DDL_QUERIES", "true"),
            ("REPORTING_OPERATOR_REPORT_WORKERS", "4"),
            ("PATH", "/usr/bin"),
        ]))
        .unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "presto": {"host": "presto.metering:8080", "log_ddl_queries": true},
                "workers": {"reports": 4}
            })
        );
    }

    #[test]
    fn numeric_namespace_stays_a_string() {
        let v = env_overlay(vars(&[("REPORTING_OPERATOR_NAMESPACE", "1234")])).unwrap();
        assert_eq!(v["namespace"], serde_json::json!("1234"));
    }

    #[test]
    fn unknown_prefixed_var_is_rejected() {
        let err = env_overlay(vars(&[("REPORTING_OPERATOR_PRESTO_HOTS", "x")])).unwrap_err();
        assert!(err.to_string().contains("REPORTING_OPERATOR_PRESTO_HOTS"));
    }

    #[test]
    fn bad_integer_is_rejected() {
        assert!(env_overlay(vars(&[("REPORTING_OPERATOR_REPORT_WORKERS", "many")])).is_err());
    }
}
