//! Last-write-wins conflict rule.
//!
//! The rule compares only `updated_at`. A strictly newer local version wins;
//! anything else, including an exact tie, goes to the remote. The tie-break
//! is an arbitrary but fixed policy kept for compatibility with existing
//! remote authorities.

use crate::record::RecordVersion;

/// Which side of a conflict prevails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    /// The local version prevails.
    Local,
    /// The remote version prevails.
    Remote,
}

impl Winner {
    /// Returns the winning version.
    pub fn pick<'a>(self, local: &'a RecordVersion, remote: &'a RecordVersion) -> &'a RecordVersion {
        match self {
            Winner::Local => local,
            Winner::Remote => remote,
        }
    }
}

/// Decides between a local and a remote version of the same record.
///
/// Pure: persisting the winner is the caller's job.
pub fn resolve(local: &RecordVersion, remote: &RecordVersion) -> Winner {
    if local.updated_at > remote.updated_at {
        Winner::Local
    } else {
        Winner::Remote
    }
}
