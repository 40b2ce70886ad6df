//! 集群命令服务：广播命令、收集回复、执行本地处理器

pub mod handler;
pub mod reply_cache;
pub mod round;
pub mod service;

pub use handler::CommandHandler;
pub use round::CommandRoundResult;
pub use service::CommandService;
