//! `/health` endpoint.

use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"healthy"` when the server is running.
    pub status: String,
    /// Users with at least one plan on record.
    pub users: usize,
}

pub fn health_check(users: usize) -> HealthResponse {
    HealthResponse {
        status: "healthy".into(),
        users,
    }
}
