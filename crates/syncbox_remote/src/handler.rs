//! Request routing for the sync endpoints.

use crate::authority::RemoteAuthority;
use crate::error::{RemoteError, RemoteResult};
use syncbox_protocol::BatchRequest;

/// Path of the batch endpoint.
pub const BATCH_PATH: &str = "/sync/batch";

/// Path of the health endpoint.
pub const HEALTH_PATH: &str = "/sync/health";

impl RemoteAuthority {
    /// Handles a POST request.
    ///
    /// # Errors
    ///
    /// [`RemoteError::NotFound`] for an unknown path, a codec error for a
    /// malformed body, or whatever [`RemoteAuthority::handle_batch`] fails
    /// with.
    pub fn handle_post(&self, path: &str, body: &[u8]) -> RemoteResult<Vec<u8>> {
        match path {
            BATCH_PATH => {
                let request = BatchRequest::decode(body)?;
                let items = request.items.len();
                let response = self.handle_batch(request).inspect_err(|e| {
                    tracing::debug!(items, error = %e, "batch rejected");
                })?;
                tracing::debug!(items, "batch applied");
                Ok(response.encode()?)
            }
            other => Err(RemoteError::NotFound(other.to_string())),
        }
    }

    /// Handles a GET request.
    ///
    /// # Errors
    ///
    /// [`RemoteError::Unavailable`] from the health endpoint while
    /// unreachable, [`RemoteError::NotFound`] for an unknown path.
    pub fn handle_get(&self, path: &str) -> RemoteResult<Vec<u8>> {
        match path {
            HEALTH_PATH if self.is_reachable() => Ok(b"ok".to_vec()),
            HEALTH_PATH => Err(RemoteError::Unavailable),
            other => Err(RemoteError::NotFound(other.to_string())),
        }
    }
}
