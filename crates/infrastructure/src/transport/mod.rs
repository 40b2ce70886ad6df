//! 命令传输后端

pub mod factory;
pub mod in_memory;
pub mod redis_broker;
pub mod storage_polling;

pub use factory::TransportFactory;
pub use in_memory::InMemoryCommandBroker;
pub use redis_broker::RedisCommandBroker;
pub use storage_polling::StoragePollingCommandBroker;
