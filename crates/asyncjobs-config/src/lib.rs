//! KDL configuration parsing for asyncjobs.
//!
//! System configuration is read once at process start from an optional KDL
//! file, then overridden by environment variables. It is immutable afterwards.

pub mod error;
pub mod system;

pub use error::{ConfigError, ConfigResult};
pub use system::{
    DispatchConfig, ExecutorConfig, ServerConfig, StoreBackend, StoreConfig, SystemConfig,
    parse_system_config,
};
