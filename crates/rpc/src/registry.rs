//! In-memory registry of peer services and their observed health.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;

use adx_core::HealthStatus;

/// Health checks retained per service.
const HISTORY_CAP: usize = 100;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("service {0} not found")]
    UnknownService(String),
}

/// One recorded health check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckRecord {
    pub at: DateTime<Utc>,
    pub status: HealthStatus,
    pub response_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A registered service and its health bookkeeping.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceEntry {
    pub name: String,
    pub base_url: String,
    pub status: HealthStatus,
    pub last_check: Option<DateTime<Utc>>,
    pub response_time_ms: Option<u64>,
    pub consecutive_failures: u32,
    #[serde(skip)]
    pub history: VecDeque<CheckRecord>,
}

impl ServiceEntry {
    fn new(name: String, base_url: String) -> Self {
        Self {
            name,
            base_url,
            status: HealthStatus::Unknown,
            last_check: None,
            response_time_ms: None,
            consecutive_failures: 0,
            history: VecDeque::new(),
        }
    }

    /// Share of failed checks in the retained history.
    #[must_use]
    pub fn failure_rate(&self) -> f64 {
        if self.history.is_empty() {
            return 0.0;
        }
        let failures = self
            .history
            .iter()
            .filter(|r| r.status == HealthStatus::Unhealthy)
            .count();
        failures as f64 / self.history.len() as f64
    }
}

/// Thread-safe service registry.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: RwLock<HashMap<String, ServiceEntry>>,
}

impl ServiceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a service, replacing any previous entry and resetting its
    /// health to unknown.
    pub fn register(&self, name: impl Into<String>, base_url: impl Into<String>) {
        let name = name.into();
        let entry = ServiceEntry::new(name.clone(), base_url.into());
        self.services.write().insert(name.clone(), entry);
        tracing::info!(service = %name, "service registered");
    }

    /// Removes a service. Returns true if it was present.
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.services.write().remove(name).is_some();
        if removed {
            tracing::info!(service = %name, "service unregistered");
        }
        removed
    }

    /// Base URL for a registered service.
    ///
    /// # Errors
    /// Returns `RegistryError::UnknownService` for unregistered names.
    pub fn url_for(&self, name: &str) -> Result<String, RegistryError> {
        self.services
            .read()
            .get(name)
            .map(|e| e.base_url.clone())
            .ok_or_else(|| RegistryError::UnknownService(name.to_string()))
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<ServiceEntry> {
        self.services.read().get(name).cloned()
    }

    #[must_use]
    pub fn list(&self) -> Vec<ServiceEntry> {
        let mut entries: Vec<_> = self.services.read().values().cloned().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    /// Services whose last check reported healthy or degraded.
    #[must_use]
    pub fn healthy_services(&self) -> Vec<ServiceEntry> {
        self.list()
            .into_iter()
            .filter(|e| matches!(e.status, HealthStatus::Healthy | HealthStatus::Degraded))
            .collect()
    }

    /// Records the outcome of a health check for a service. Unknown names are
    /// ignored (the service may have been unregistered mid-check).
    pub fn record_check(
        &self,
        name: &str,
        status: HealthStatus,
        response_time_ms: Option<u64>,
        error: Option<String>,
    ) {
        let mut services = self.services.write();
        let Some(entry) = services.get_mut(name) else {
            return;
        };
        entry.status = status;
        entry.last_check = Some(Utc::now());
        entry.response_time_ms = response_time_ms;
        if status == HealthStatus::Unhealthy {
            entry.consecutive_failures += 1;
        } else {
            entry.consecutive_failures = 0;
        }
        entry.history.push_back(CheckRecord {
            at: Utc::now(),
            status,
            response_time_ms,
            error,
        });
        while entry.history.len() > HISTORY_CAP {
            entry.history.pop_front();
        }
    }
}
