//! Background workers for the attendance service.
//!
//! - Finalization (classify lectures once they end)

pub mod finalization;
pub mod scheduler;

pub use finalization::*;
pub use scheduler::*;
