pub mod categorize;
pub mod config;
pub mod error;
pub mod features;
pub mod importance;
pub mod indicators;
pub mod model;
pub mod pipeline;
pub mod schema;
pub mod sentiment;
pub mod util;
pub mod xgb_runtime;

pub use error::{CentseekError, Result};
