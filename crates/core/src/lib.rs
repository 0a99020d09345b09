//! Core types, token codec, and the attendance tracker.

pub mod clock;
pub mod config;
pub mod error;
pub mod lecture;
pub mod memory;
pub mod records;
pub mod registry;
pub mod token;
pub mod tracker;

pub use clock::*;
pub use config::*;
pub use error::{AttendanceErrorKind, Error, Result, StorageErrorCode};
pub use lecture::*;
pub use memory::MemoryStore;
pub use records::*;
pub use registry::*;
pub use token::{TokenClaims, TokenCodec};
pub use tracker::*;
