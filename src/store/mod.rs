//! Transactional persistence for every entity in `crate::domain`.
//!
//! Grounded on the teacher's `server/services/chat_database.rs` (query_as!
//! plus `RETURNING`) and `server/services/solver/mod.rs` (manual row
//! mapping for JSONB columns), generalized to the full schema in
//! `migrations/`.

pub mod analyses;
pub mod epics;
pub mod projects;
pub mod prompt_versions;
pub mod proposals;
pub mod quality;
pub mod sessions;
pub mod tasks;
pub mod tests;

use sqlx::PgPool;

/// A thin handle around the connection pool. Every method acquires and
/// releases a connection for the duration of one operation; the only
/// multi-statement transaction is prompt-version activation (§3: "activating
/// a version deactivates siblings atomically").
#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
