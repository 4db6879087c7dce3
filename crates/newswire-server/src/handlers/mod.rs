//! HTTP handlers

pub mod auth;
pub mod health;
pub mod news;

pub use health::health;
