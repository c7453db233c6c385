// Repository layer: each table lives in its own file with `impl MemoryRepository`.

use sqlx::sqlite::SqlitePool;

mod profiles;
mod search;
mod sessions;
mod turns;

#[cfg(test)]
pub(crate) mod test_helpers;

#[derive(Clone)]
pub struct MemoryRepository {
    pub(crate) pool: SqlitePool,
}

impl MemoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}
