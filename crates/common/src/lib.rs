//! Shared types for the YouTube delegated gateway workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
