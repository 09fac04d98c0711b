pub mod core;
pub mod courses;
pub mod students;

use std::sync::Arc;

use super::error::ApiError;
use super::types::AppState;
use crate::store::StudentStore;

/// Runs a store call on the blocking pool; both backends do synchronous I/O
/// or take std locks.
pub(crate) async fn with_store<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&dyn StudentStore) -> T + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(&state.store);
    tokio::task::spawn_blocking(move || f(store.as_ref()))
        .await
        .map_err(|e| ApiError::internal(format!("store task failed: {e}")))
}
