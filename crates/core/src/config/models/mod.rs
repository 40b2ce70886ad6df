pub mod app_config;
pub mod node_command;
pub mod plugins_observability;
pub mod storage;
pub mod transport;

// Re-export main types for easier imports
pub use app_config::AppConfig;
pub use node_command::{CommandConfig, MembershipPolicy, NodeConfig};
pub use plugins_observability::{JobsConfig, ObservabilityConfig, PluginsConfig};
pub use storage::{RegistryConfig, RegistryType, StorageConfig, StorageType};
pub use transport::{RedisConfig, TransportConfig, TransportType};
