pub mod config;
pub mod error;
pub mod identity;
pub mod types;
pub mod window;

pub use config::{QueryConfig, TidingsConfig};
pub use error::{Result, TidingsError, WindowError};
pub use types::*;
pub use window::{DateExpr, QueryWindowResolver};
