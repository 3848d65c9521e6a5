//! Core types for the task store document.

pub mod entry;
pub mod store;

pub use entry::*;
pub use store::*;
