pub mod config;
pub mod error;
pub mod types;

pub use config::StockistConfig;
pub use error::{Result, StockistError};
pub use types::*;
