//! Live state probe.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use crate::application::ports::InstanceInspector;
use crate::domain::InfrastructureState;

/// Authoritative current state of the backend's instance.
///
/// Never fails: a missing instance, a failed query or an unexpected answer
/// all normalize to `NotCreated`, so an unreachable backend can never be
/// mistaken for a running instance.
pub async fn current_state(backend: &impl InstanceInspector) -> InfrastructureState {
    let id = backend.handle().id();
    match backend.query_state().await {
        Ok(state) if state.is_transient() => {
            tracing::debug!(instance = id, %state, "transient state from backend, treating as not created");
            InfrastructureState::NotCreated
        }
        Ok(state) => {
            tracing::debug!(instance = id, %state, "probed state");
            state
        }
        Err(e) => {
            tracing::debug!(instance = id, error = %e, "state query failed, treating as not created");
            InfrastructureState::NotCreated
        }
    }
}
