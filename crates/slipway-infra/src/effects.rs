//! HTTP adapter for rollout effects.
//!
//! Translates each effect into a webhook against the deployment
//! gateway. Holds pass real wall-clock time locally; the monitor
//! effect sleeps its window, then samples the metrics endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use slipway_core::{Environment, ReleaseVersion};
use slipway_rollout::{EffectDriver, RolloutMetrics, SlotLayout, SmokeReport};
use tracing::debug;

use crate::client::HttpClient;

#[derive(Serialize)]
struct SlotDeployBody<'a> {
    slot: &'a str,
    version: &'a str,
}

#[derive(Serialize)]
struct SlotBody<'a> {
    slot: &'a str,
}

#[derive(Serialize)]
struct TrafficBody<'a> {
    slot: &'a str,
    percent: u32,
}

#[derive(Serialize)]
struct PercentBody {
    percent: u32,
}

#[derive(Serialize)]
struct InstanceUpdateBody<'a> {
    instances: &'a [String],
    version: &'a str,
}

#[derive(Serialize)]
struct InstanceListBody<'a> {
    instances: &'a [String],
}

#[derive(Serialize)]
struct EnvironmentBody {
    environment: Environment,
}

#[derive(Serialize)]
struct BuildBody<'a> {
    environment: Environment,
    version: &'a str,
}

#[derive(Serialize)]
struct EmptyBody {}

#[derive(Debug, Deserialize)]
struct HealthyBody {
    healthy: bool,
}

/// Effect driver backed by the deployment gateway's webhook surface.
#[derive(Debug, Clone)]
pub struct WebhookDriver {
    client: HttpClient,
}

impl WebhookDriver {
    /// `address` is the deployment gateway authority, `host:port`.
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: HttpClient::new(address, timeout),
        }
    }
}

#[async_trait]
impl EffectDriver for WebhookDriver {
    async fn slot_layout(&self, environment: Environment) -> anyhow::Result<SlotLayout> {
        self.client
            .get_json(&format!("/effects/{environment}/slots"))
            .await
    }

    async fn deploy_to_slot(&self, slot: &str, version: &ReleaseVersion) -> anyhow::Result<()> {
        self.client
            .post_ok(
                "/effects/slot/deploy",
                &SlotDeployBody {
                    slot,
                    version: version.as_str(),
                },
            )
            .await
    }

    async fn run_smoke_tests(&self, slot: &str) -> anyhow::Result<SmokeReport> {
        self.client.post_json("/effects/smoke", &SlotBody { slot }).await
    }

    async fn shift_traffic(&self, slot: &str, percent: u32) -> anyhow::Result<()> {
        self.client
            .post_ok("/effects/traffic", &TrafficBody { slot, percent })
            .await
    }

    async fn route_canary(&self, percent: u32) -> anyhow::Result<()> {
        self.client
            .post_ok("/effects/canary/route", &PercentBody { percent })
            .await
    }

    async fn remove_canary(&self) -> anyhow::Result<()> {
        self.client.post_ok("/effects/canary/remove", &EmptyBody {}).await
    }

    async fn fleet(&self, environment: Environment) -> anyhow::Result<Vec<String>> {
        self.client
            .get_json(&format!("/effects/{environment}/fleet"))
            .await
    }

    async fn update_instances(
        &self,
        instances: &[String],
        version: &ReleaseVersion,
    ) -> anyhow::Result<()> {
        self.client
            .post_ok(
                "/effects/instances/update",
                &InstanceUpdateBody {
                    instances,
                    version: version.as_str(),
                },
            )
            .await
    }

    async fn instances_healthy(&self, instances: &[String]) -> anyhow::Result<bool> {
        let body: HealthyBody = self
            .client
            .post_json("/effects/instances/health", &InstanceListBody { instances })
            .await?;
        Ok(body.healthy)
    }

    async fn revert_fleet(&self, environment: Environment) -> anyhow::Result<()> {
        self.client
            .post_ok("/effects/fleet/revert", &EnvironmentBody { environment })
            .await
    }

    async fn deploy_build(
        &self,
        environment: Environment,
        version: &ReleaseVersion,
    ) -> anyhow::Result<()> {
        self.client
            .post_ok(
                "/effects/deploy",
                &BuildBody {
                    environment,
                    version: version.as_str(),
                },
            )
            .await
    }

    async fn verify_health(&self, environment: Environment) -> anyhow::Result<bool> {
        let body: HealthyBody = self
            .client
            .get_json(&format!("/effects/{environment}/health"))
            .await?;
        Ok(body.healthy)
    }

    async fn revert_release(&self, environment: Environment) -> anyhow::Result<()> {
        self.client
            .post_ok("/effects/release/revert", &EnvironmentBody { environment })
            .await
    }

    async fn monitor(&self, window: Duration) -> anyhow::Result<RolloutMetrics> {
        // Let the window pass, then sample the collector.
        debug!(window_secs = window.as_secs(), "monitoring window open");
        tokio::time::sleep(window).await;
        self.client.get_json("/effects/metrics").await
    }

    async fn hold(&self, pause: Duration) -> anyhow::Result<()> {
        tokio::time::sleep(pause).await;
        Ok(())
    }
}
