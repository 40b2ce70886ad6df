pub mod command;
pub mod document;
pub mod plugin;
pub mod process;
pub mod site;

pub use command::{Command, CommandReply, Envelope, RoundKey};
pub use document::{normalize_site, object_types, Document, DocumentKey, DocumentQuery, GLOBAL_SITE};
pub use plugin::{HookContext, MainModule, PluginDetails, PluginSetting, ThemeBlock};
pub use process::ProcessInfo;
pub use site::SiteDescriptor;
