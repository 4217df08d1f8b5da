pub mod client;
pub mod error;

pub use client::HttpActivityClient;
pub use error::{ActivityError, Result};
