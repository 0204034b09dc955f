pub mod collapse;
pub mod config;
pub mod dump;
pub mod error;
pub mod log_sanitize;
pub mod logging;
pub mod report;
pub mod tool;

pub use error::{Error, Result};
