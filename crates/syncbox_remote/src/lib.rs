//! # syncbox remote
//!
//! In-process remote authority for syncbox.
//!
//! This crate provides:
//! - [`RemoteAuthority`], which accepts batches and keeps the authoritative
//!   copy of every record
//! - Request routing for the batch and health endpoints
//! - Fault injection: unreachability, whole-batch failures, per-record
//!   rejections and concurrent remote edits
//!
//! # Protocol
//!
//! - `GET /sync/health` answers while the authority is reachable
//! - `POST /sync/batch` takes a CBOR [`BatchRequest`](syncbox_protocol::BatchRequest)
//!   and answers with one outcome per item, in order
//!
//! Pushes are idempotent per queue item id: a resent item gets the outcome
//! it got the first time.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod authority;
mod config;
mod error;
mod handler;

pub use authority::{RemoteAuthority, RemoteRecord};
pub use config::RemoteConfig;
pub use error::{RemoteError, RemoteResult};
pub use handler::{BATCH_PATH, HEALTH_PATH};
