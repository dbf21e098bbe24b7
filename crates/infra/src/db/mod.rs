use std::sync::Arc;
use std::time::Duration;

use forum_domain::DomainResult;
use forum_domain::error::DomainError;
use surrealdb::{
    Surreal,
    engine::remote::ws::{Client, Ws},
    opt::auth::Root,
};
use tokio::net::TcpStream;
use tokio::time::timeout;
use url::Url;

use crate::config::AppConfig;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub endpoint: String,
    pub namespace: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl DbConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            endpoint: config.surreal_endpoint.clone(),
            namespace: config.surreal_ns.clone(),
            database: config.surreal_db.clone(),
            username: config.surreal_user.clone(),
            password: config.surreal_pass.clone(),
        }
    }
}

/// Probes the endpoint, then opens an authenticated session shared by the
/// ledger and metric store.
pub async fn connect(config: &DbConfig) -> anyhow::Result<Arc<Surreal<Client>>> {
    health_check(&config.endpoint).await?;

    let db = Surreal::<Client>::init();
    db.connect::<Ws>(config.endpoint.as_str()).await?;
    db.signin(Root {
        username: &config.username,
        password: &config.password,
    })
    .await?;
    db.use_ns(&config.namespace).use_db(&config.database).await?;
    tracing::info!(
        endpoint = %config.endpoint,
        namespace = %config.namespace,
        database = %config.database,
        "surreal session opened"
    );
    Ok(Arc::new(db))
}

/// Schema backing the uniqueness guarantee of the relation ledger and the
/// one-record-per-metric layout of the metric store.
pub async fn ensure_schema(client: &Surreal<Client>) -> DomainResult<()> {
    client
        .query(
            "DEFINE TABLE IF NOT EXISTS content_relation SCHEMALESS; \
             DEFINE INDEX IF NOT EXISTS content_relation_key ON content_relation \
                FIELDS user_id, content_id, kind UNIQUE; \
             DEFINE INDEX IF NOT EXISTS content_relation_content ON content_relation \
                FIELDS content_id, kind; \
             DEFINE INDEX IF NOT EXISTS content_relation_user ON content_relation \
                FIELDS user_id, kind; \
             DEFINE TABLE IF NOT EXISTS content_metric SCHEMALESS; \
             DEFINE INDEX IF NOT EXISTS content_metric_key ON content_metric \
                FIELDS content_id, metric UNIQUE;",
        )
        .await
        .map_err(|err| DomainError::Storage(format!("schema setup failed: {err}")))?
        .check()
        .map_err(|err| DomainError::Storage(format!("schema setup failed: {err}")))?;
    Ok(())
}

pub async fn health_check(endpoint: &str) -> DomainResult<()> {
    let address = parse_socket_address(endpoint)?;
    let connect = timeout(CONNECT_TIMEOUT, TcpStream::connect(address))
        .await
        .map_err(|_| DomainError::Storage("surreal endpoint connect timed out".to_string()))?;
    connect.map_err(|err| {
        DomainError::Storage(format!("surreal endpoint connect failed: {err}"))
    })?;
    tracing::debug!(endpoint, "surreal health check succeeded");
    Ok(())
}

fn parse_socket_address(endpoint: &str) -> DomainResult<String> {
    let normalized = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("ws://{endpoint}")
    };
    let parsed = Url::parse(&normalized).map_err(|err| {
        DomainError::InvalidArgument(format!("invalid surreal endpoint '{endpoint}': {err}"))
    })?;

    let host = parsed.host_str().ok_or_else(|| {
        DomainError::InvalidArgument(format!("missing surreal host in endpoint '{endpoint}'"))
    })?;
    let port = parsed.port_or_known_default().unwrap_or(8000);
    Ok(format!("{host}:{port}"))
}
