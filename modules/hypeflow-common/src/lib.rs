pub mod config;
pub mod error;
pub mod symbols;
pub mod types;

pub use config::Config;
pub use error::HypeflowError;
pub use symbols::SymbolDirectory;
pub use types::*;
