//! HTTP adapter for the preflight signal feed.
//!
//! Reads the operations plane's `/signals/{environment}/...` endpoints
//! and maps them onto the [`SignalSource`] port.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use slipway_core::Environment;
use slipway_preflight::{DependencyStatus, ResourceUsage, SecurityPosture, SignalSource};

use crate::client::HttpClient;

#[derive(Debug, Deserialize)]
struct HealthBody {
    score: f64,
}

#[derive(Debug, Deserialize)]
struct BackupBody {
    age_secs: u64,
}

/// Signal source backed by an operations endpoint.
#[derive(Debug, Clone)]
pub struct HttpSignalSource {
    client: HttpClient,
}

impl HttpSignalSource {
    /// `address` is the operations plane authority, `host:port`.
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: HttpClient::new(address, timeout),
        }
    }

    fn path(environment: Environment, kind: &str) -> String {
        format!("/signals/{environment}/{kind}")
    }
}

#[async_trait]
impl SignalSource for HttpSignalSource {
    async fn health_score(&self, environment: Environment) -> anyhow::Result<f64> {
        let body: HealthBody = self
            .client
            .get_json(&Self::path(environment, "health"))
            .await?;
        Ok(body.score)
    }

    async fn resource_usage(&self, environment: Environment) -> anyhow::Result<ResourceUsage> {
        self.client
            .get_json(&Self::path(environment, "resources"))
            .await
    }

    async fn dependencies(
        &self,
        environment: Environment,
    ) -> anyhow::Result<Vec<DependencyStatus>> {
        self.client
            .get_json(&Self::path(environment, "dependencies"))
            .await
    }

    async fn security_posture(&self, environment: Environment) -> anyhow::Result<SecurityPosture> {
        self.client
            .get_json(&Self::path(environment, "security"))
            .await
    }

    async fn last_backup_age(&self, environment: Environment) -> anyhow::Result<Duration> {
        let body: BackupBody = self
            .client
            .get_json(&Self::path(environment, "backup"))
            .await?;
        Ok(Duration::from_secs(body.age_secs))
    }
}
