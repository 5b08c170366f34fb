use std::fmt;

use async_trait::async_trait;
use mtr_config::{PrestoConfig, PrestoPassword};
use serde::Deserialize;

use crate::is_valid_identifier;

/// The query engine, as far as materialization needs it.
///
/// Repeating a call with identical arguments must leave the engine in the
/// same state.
#[async_trait]
pub trait ViewCreator: Send + Sync {
    async fn create_or_replace_view(&self, name: &str, query: &str) -> Result<(), ViewError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewError {
    /// The view name is not a plain identifier; nothing was sent.
    InvalidName(String),
    /// Network or transport failure.
    Transport(String),
    /// Non-success HTTP status from the engine.
    Http { status: u16, body: String },
    /// The engine accepted the request but failed the statement.
    Rejected {
        error_name: Option<String>,
        message: String,
    },
    /// A response payload could not be decoded.
    Decode(String),
}

impl fmt::Display for ViewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewError::InvalidName(name) => write!(f, "invalid view name {name:?}"),
            ViewError::Transport(msg) => write!(f, "transport error: {msg}"),
            ViewError::Http { status, body } => write!(f, "presto http error status={status}: {body}"),
            ViewError::Rejected {
                error_name: Some(n),
                message,
            } => write!(f, "presto rejected statement ({n}): {message}"),
            ViewError::Rejected {
                error_name: None,
                message,
            } => write!(f, "presto rejected statement: {message}"),
            ViewError::Decode(msg) => write!(f, "decode error: {msg}"),
        }
    }
}

impl std::error::Error for ViewError {}

/// Presto-backed [`ViewCreator`] speaking the HTTP statement protocol.
///
/// The statement is POSTed to `/v1/statement`; the client then follows
/// `nextUri` until the engine stops returning one. An `error` object in any
/// response fails the call.
#[derive(Clone)]
pub struct PrestoViewCreator {
    http: reqwest::Client,
    base_url: String,
    user: String,
    catalog: String,
    schema: String,
    password: Option<PrestoPassword>,
    log_ddl_queries: bool,
}

impl fmt::Debug for PrestoViewCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrestoViewCreator")
            .field("base_url", &self.base_url)
            .field("user", &self.user)
            .field("catalog", &self.catalog)
            .field("schema", &self.schema)
            .field("password", &self.password)
            .finish()
    }
}

impl PrestoViewCreator {
    pub fn new(cfg: &PrestoConfig, password: Option<PrestoPassword>) -> Self {
        Self::new_with_base_url(cfg, password, cfg.base_url())
    }

    pub fn new_with_base_url(
        cfg: &PrestoConfig,
        password: Option<PrestoPassword>,
        base_url: String,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            user: cfg.user.clone(),
            catalog: cfg.catalog.clone(),
            schema: cfg.schema.clone(),
            password,
            log_ddl_queries: cfg.log_ddl_queries,
        }
    }

    fn statement_url(&self) -> String {
        format!("{}/v1/statement", self.base_url)
    }

    fn request(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let req = req
            .header("X-Presto-User", &self.user)
            .header("X-Presto-Catalog", &self.catalog)
            .header("X-Presto-Schema", &self.schema);
        match &self.password {
            Some(pw) => req.basic_auth(&self.user, Some(pw.expose())),
            None => req,
        }
    }

    /// Run one statement to completion.
    pub async fn execute(&self, sql: &str) -> Result<(), ViewError> {
        let first = self
            .request(self.http.post(self.statement_url()))
            .body(sql.to_string())
            .send()
            .await;
        let mut page = decode(first).await?;

        loop {
            if let Some(err) = page.error {
                return Err(ViewError::Rejected {
                    error_name: err.error_name,
                    message: err.message.unwrap_or_else(|| "unknown".to_string()),
                });
            }
            let Some(next) = page.next_uri else {
                return Ok(());
            };
            tracing::trace!(next_uri = %next, state = ?page.stats.map(|s| s.state), "presto poll");
            let resp = self.request(self.http.get(&next)).send().await;
            page = decode(resp).await?;
        }
    }
}

async fn decode(resp: reqwest::Result<reqwest::Response>) -> Result<QueryResults, ViewError> {
    let resp = resp.map_err(|e| ViewError::Transport(e.to_string()))?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ViewError::Http {
            status: status.as_u16(),
            body,
        });
    }
    resp.json::<QueryResults>()
        .await
        .map_err(|e| ViewError::Decode(e.to_string()))
}

#[async_trait]
impl ViewCreator for PrestoViewCreator {
    async fn create_or_replace_view(&self, name: &str, query: &str) -> Result<(), ViewError> {
        if !is_valid_identifier(name) {
            return Err(ViewError::InvalidName(name.to_string()));
        }
        let sql = format!("CREATE OR REPLACE VIEW {name} AS {query}");
        if self.log_ddl_queries {
            tracing::debug!(view_name = %name, ddl = %sql, "creating view");
        }
        self.execute(&sql).await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResults {
    #[serde(default)]
    next_uri: Option<String>,
    #[serde(default)]
    stats: Option<QueryStats>,
    #[serde(default)]
    error: Option<QueryError>,
}

#[derive(Debug, Deserialize)]
struct QueryStats {
    #[serde(default)]
    state: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_name: Option<String>,
}
