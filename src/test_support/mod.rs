//! Container-backed helpers for database tests.
//!
//! Tests that exercise real SQL start a throwaway Postgres container via
//! testcontainers and skip themselves when no container runtime is reachable.

pub(crate) mod postgres;
pub(crate) mod runtime;

use uuid::Uuid;

#[derive(Debug, Clone)]
pub(crate) struct TestNetwork {
    name: String,
}

impl TestNetwork {
    pub(crate) fn new(prefix: &str) -> Self {
        Self {
            name: unique_name(prefix),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }
}

pub(crate) fn unique_name(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}
