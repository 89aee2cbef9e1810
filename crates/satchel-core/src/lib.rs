pub mod config;
pub mod error;
pub mod types;

pub use config::SatchelConfig;
pub use error::{Result, SatchelError};
pub use types::*;
