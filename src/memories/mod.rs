//! Memories: the media gallery catalogue.
//!
//! Records describe files that already sit under `uploads/memories`; writing
//! the bytes and rendering thumbnails happen outside this service.

pub mod api;
pub mod models;
pub mod store;

pub use models::{MediaType, Memory};
pub use store::{DuplicateFilename, MemoryStore};
