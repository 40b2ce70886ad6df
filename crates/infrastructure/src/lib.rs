//! 传输、存储、注册表与插件包的具体实现

pub mod database;
pub mod plugin_packages;
pub mod registry;
pub mod transport;

pub use database::{InMemoryDocumentStore, SqliteDocumentStore, StoreFactory};
pub use plugin_packages::FileSystemPluginPackages;
pub use registry::{RegistryFactory, StaticProcessRegistry, StoreProcessRegistry};
pub use transport::{
    InMemoryCommandBroker, RedisCommandBroker, StoragePollingCommandBroker, TransportFactory,
};
