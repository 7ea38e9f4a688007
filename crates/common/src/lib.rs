//! Common types shared by the CCB client crates

mod secret;
mod error;

pub use secret::Secret;
pub use error::{Error, Result};
