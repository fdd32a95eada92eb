pub mod config;
pub mod error;
pub mod types;

pub use config::{IndexPaths, RevmatchConfig};
pub use error::{Result, RevmatchError};
pub use types::*;
