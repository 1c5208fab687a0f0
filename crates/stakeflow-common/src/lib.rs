pub mod config;
pub mod errors;
pub mod types;
pub mod utils;

pub use config::{ChainParams, StakeflowConfig};
pub use errors::{Error, ProviderError, Result};
pub use types::*;
