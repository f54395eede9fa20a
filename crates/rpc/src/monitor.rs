//! Background health monitor for registered services.
//!
//! Probes each service's `/health` endpoint on an interval, records outcomes
//! into the [`ServiceRegistry`], and derives alerts from the accumulated
//! bookkeeping.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use adx_core::{HealthStatus, MonitorConfig};

use crate::registry::ServiceRegistry;

/// Commands to control the monitor loop.
#[derive(Debug, Clone)]
pub enum MonitorCommand {
    /// Force an immediate check of all services
    CheckNow,
    /// Gracefully shutdown the monitor
    Shutdown,
}

/// Alert categories derived from registry state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    SlowResponse,
    ConsecutiveFailures,
    HighFailureRate,
}

/// A condition worth surfacing to operators.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub service: String,
    pub kind: AlertKind,
    pub message: String,
}

/// Periodic health prober over a shared [`ServiceRegistry`].
pub struct HealthMonitor {
    registry: Arc<ServiceRegistry>,
    config: MonitorConfig,
    http: reqwest::Client,
}

impl HealthMonitor {
    /// Creates a monitor over the given registry.
    ///
    /// # Errors
    /// Returns an error if the probe HTTP client cannot be built.
    pub fn new(registry: Arc<ServiceRegistry>, config: MonitorConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.response_time_alert_ms))
            .build()?;
        Ok(Self {
            registry,
            config,
            http,
        })
    }

    /// Probes every registered service concurrently and records the outcomes.
    pub async fn check_all(&self) {
        let entries = self.registry.list();
        let mut set = JoinSet::new();
        for entry in entries {
            let http = self.http.clone();
            let threshold = self.config.response_time_alert_ms;
            set.spawn(async move {
                let (status, response_time_ms, error) =
                    probe(&http, &entry.base_url, threshold).await;
                (entry.name, status, response_time_ms, error)
            });
        }
        while let Some(joined) = set.join_next().await {
            if let Ok((name, status, response_time_ms, error)) = joined {
                tracing::debug!(service = %name, status = %status, "health check recorded");
                self.registry.record_check(&name, status, response_time_ms, error);
            }
        }
    }

    /// Alerts derived from current registry state.
    #[must_use]
    pub fn alerts(&self) -> Vec<Alert> {
        let mut alerts = Vec::new();
        for entry in self.registry.list() {
            if let Some(rt) = entry.response_time_ms {
                if rt > self.config.response_time_alert_ms {
                    alerts.push(Alert {
                        service: entry.name.clone(),
                        kind: AlertKind::SlowResponse,
                        message: format!("response time {rt}ms over threshold"),
                    });
                }
            }
            if entry.consecutive_failures >= self.config.consecutive_failure_alert {
                alerts.push(Alert {
                    service: entry.name.clone(),
                    kind: AlertKind::ConsecutiveFailures,
                    message: format!("{} consecutive failed checks", entry.consecutive_failures),
                });
            }
            let rate = entry.failure_rate();
            if !entry.history.is_empty() && rate >= self.config.failure_rate_alert {
                alerts.push(Alert {
                    service: entry.name,
                    kind: AlertKind::HighFailureRate,
                    message: format!("failure rate {rate:.2} over recent checks"),
                });
            }
        }
        alerts
    }

    /// Spawns the background check loop and returns a command channel.
    ///
    /// The task runs until a `Shutdown` command is received or the channel
    /// closes.
    pub fn spawn(self) -> mpsc::Sender<MonitorCommand> {
        let (tx, mut rx) = mpsc::channel(8);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.check_interval());

            tracing::info!(
                interval_secs = self.config.check_interval_secs,
                "health monitor started"
            );

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        self.check_all().await;
                        for alert in self.alerts() {
                            tracing::warn!(
                                service = %alert.service,
                                kind = ?alert.kind,
                                "{}", alert.message
                            );
                        }
                    }
                    Some(cmd) = rx.recv() => {
                        match cmd {
                            MonitorCommand::CheckNow => {
                                tracing::debug!("received CheckNow command");
                                self.check_all().await;
                            }
                            MonitorCommand::Shutdown => {
                                tracing::info!("health monitor shutting down");
                                break;
                            }
                        }
                    }
                    else => {
                        tracing::info!("command channel closed, monitor shutting down");
                        break;
                    }
                }
            }
        });

        tx
    }
}

async fn probe(
    http: &reqwest::Client,
    base_url: &str,
    degraded_threshold_ms: u64,
) -> (HealthStatus, Option<u64>, Option<String>) {
    let url = format!("{}/health", base_url.trim_end_matches('/'));
    let started = Instant::now();
    match http.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => {
            let elapsed = started.elapsed().as_millis() as u64;
            let status = if elapsed > degraded_threshold_ms {
                HealthStatus::Degraded
            } else {
                HealthStatus::Healthy
            };
            (status, Some(elapsed), None)
        }
        Ok(resp) => {
            let elapsed = started.elapsed().as_millis() as u64;
            (
                HealthStatus::Unhealthy,
                Some(elapsed),
                Some(format!("HTTP {}", resp.status().as_u16())),
            )
        }
        Err(e) => (HealthStatus::Unhealthy, None, Some(e.to_string())),
    }
}
