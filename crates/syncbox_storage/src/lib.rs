//! # syncbox storage
//!
//! Durable byte stores for the syncbox outbox and record collections.
//!
//! Backends are **opaque append-only byte stores**. They know nothing about
//! queue items or records; the [`frame`] module adds checksummed framing on
//! top so that higher layers can replay a log of rows after a restart.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For tests and ephemeral outboxes
//! - [`FileBackend`] - For persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use syncbox_storage::{frame, InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! frame::append_frame(&mut backend, b"row one").unwrap();
//! let scan = frame::scan_frames(&backend).unwrap();
//! assert_eq!(scan.frames, vec![b"row one".to_vec()]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
pub mod frame;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
