pub mod config;
pub mod config_loader;
pub mod error;
pub mod retry;
pub mod traits;

pub use config::{ClientConfig, RetryConfig};
pub use config_loader::{ConfigLoadOptions, ConfigLoader};
pub use error::*;
pub use retry::*;
pub use traits::*;
