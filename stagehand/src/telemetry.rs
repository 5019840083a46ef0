//! Deploy completion telemetry

use std::time::Duration;

use async_trait::async_trait;
use platform_models::{DeployEvent, HostInfo};
use secrecy::SecretString;
use sysinfo::System;
use tracing::{debug, warn};

use crate::errors::DeployError;
use crate::http::client::{HttpClient, JSON_ACCEPT};

/// Upper bound on the time spent delivering the completion event
pub const SEND_TIMEOUT: Duration = Duration::from_secs(5);

pub const EVENT_NAME: &str = "staging_deploy";

/// Telemetry sink trait for testability
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn send_event(&self, event: &DeployEvent) -> Result<(), DeployError>;
}

/// Telemetry endpoint client
pub struct TelemetryClient {
    http: HttpClient,
}

impl TelemetryClient {
    pub fn new(url: &str, token: Option<SecretString>) -> Result<Self, DeployError> {
        let http = match token {
            Some(token) => HttpClient::with_token(url, JSON_ACCEPT, token)?,
            None => HttpClient::new(url, JSON_ACCEPT)?,
        };
        Ok(Self { http })
    }
}

#[async_trait]
impl TelemetrySink for TelemetryClient {
    async fn send_event(&self, event: &DeployEvent) -> Result<(), DeployError> {
        self.http.post_discard("", event).await
    }
}

/// Describe the host the deploy runs on
pub fn host_info() -> HostInfo {
    let mut sys = System::new();
    sys.refresh_cpu_all();
    sys.refresh_memory();

    HostInfo {
        hostname: System::host_name().unwrap_or_else(|| "unknown".to_string()),
        os: System::long_os_version().unwrap_or_else(|| std::env::consts::OS.to_string()),
        cpu_count: sys.cpus().len(),
        memory_total: sys.total_memory(),
    }
}

/// Fire-and-forget delivery, bounded by `SEND_TIMEOUT`
pub async fn emit_event<T>(sink: &T, event: &DeployEvent)
where
    T: TelemetrySink + ?Sized,
{
    match tokio::time::timeout(SEND_TIMEOUT, sink.send_event(event)).await {
        Ok(Ok(())) => debug!("Telemetry event sent for run {}", event.run_id),
        Ok(Err(e)) => warn!("Failed to send telemetry event: {}", e),
        Err(_) => warn!("Telemetry event timed out after {:?}", SEND_TIMEOUT),
    }
}
