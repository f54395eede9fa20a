pub mod breaker;
pub mod client;
pub mod error;
pub mod monitor;
pub mod registry;

pub use breaker::{BreakerConfig, CircuitBreaker, CircuitState};
pub use client::PeerClient;
pub use error::RpcError;
pub use monitor::{Alert, AlertKind, HealthMonitor, MonitorCommand};
pub use registry::{CheckRecord, RegistryError, ServiceEntry, ServiceRegistry};
