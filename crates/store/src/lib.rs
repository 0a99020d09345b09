//! SQLite persistence for the attendance service.

pub mod cache;
pub mod client;
pub mod config;
pub mod health;
mod helpers;
pub mod ops;
pub mod schema;

pub use cache::LectureCache;
pub use client::*;
pub use config::*;
