//! Presto credential resolution.
//!
//! The config holds the NAME of the env var carrying the password
//! (`presto.password_env`). It is read once at startup and handed to the
//! view creator. `Debug` never prints the value, and errors mention only the
//! variable name.

use anyhow::{bail, Result};

use crate::PrestoConfig;

#[derive(Clone, PartialEq, Eq)]
pub struct PrestoPassword(String);

impl PrestoPassword {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for PrestoPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrestoPassword(<REDACTED>)")
    }
}

/// Resolve the Presto password from the process environment.
///
/// `Ok(None)` when no `password_env` is configured. A configured but unset
/// or empty variable is an error.
pub fn resolve_presto_password(cfg: &PrestoConfig) -> Result<Option<PrestoPassword>> {
    resolve_with(cfg, |name| std::env::var(name).ok())
}

fn resolve_with<F>(cfg: &PrestoConfig, lookup: F) -> Result<Option<PrestoPassword>>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(name) = cfg.password_env.as_deref() else {
        return Ok(None);
    };
    match lookup(name) {
        Some(v) if !v.trim().is_empty() => Ok(Some(PrestoPassword(v))),
        _ => bail!("SECRET_MISSING: env var {name} named by presto.password_env is not set"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(name: Option<&str>) -> PrestoConfig {
        PrestoConfig {
            password_env: name.map(str::to_string),
            ..PrestoConfig::default()
        }
    }

    #[test]
    fn no_env_name_means_no_password() {
        let got = resolve_with(&cfg(None), |_| panic!("lookup must not run")).unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn missing_var_names_the_var_not_the_value() {
        let err = resolve_with(&cfg(Some("PRESTO_PW")), |_| None).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("PRESTO_PW"));
        assert!(msg.contains("SECRET_MISSING"));
    }

    #[test]
    fn debug_is_redacted() {
        let pw = resolve_with(&cfg(Some("PRESTO_PW")), |_| Some("hunter2".to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(pw.expose(), "hunter2");
        assert!(!format!("{pw:?}").contains("hunter2"));
    }
}
