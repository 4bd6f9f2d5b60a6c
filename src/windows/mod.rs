//! Windows shared memory access
//!
//! The simulator publishes its snapshot in a named file mapping. This module
//! maps it read-only; polling and decoding live in [`crate::source`].

mod mapping;

pub use mapping::MappedRegion;
