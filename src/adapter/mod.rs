//! # Adapter Module
//!
//! The storage seam. The router sequences calls into a [`CollectionAdapter`]
//! but never owns its state. [`MemoryAdapter`] is the reference backend used
//! by the binary and the tests.

mod core;
mod memory;

pub use core::CollectionAdapter;
pub use memory::MemoryAdapter;
