pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, ScheduleConfig};
pub use error::RevealError;
pub use types::*;
