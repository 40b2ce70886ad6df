pub mod plugin_package;
pub mod registry;
pub mod store;
pub mod transport;

pub use plugin_package::*;
pub use registry::*;
pub use store::*;
pub use transport::*;
