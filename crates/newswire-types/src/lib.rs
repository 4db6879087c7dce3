//! Newswire Types - Pure type definitions shared across the workspace
//!
//! This crate contains only data types and the domain error enum, with no
//! async runtime or database dependencies.

pub mod error;
pub mod news;
pub mod user;

pub use error::{Error, Result};
pub use news::*;
pub use user::*;
