use sqlx::sqlite::SqlitePoolOptions;

/// Fresh MemoryRepository backed by an isolated in-memory SQLite database.
pub async fn test_repository() -> super::MemoryRepository {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory SQLite pool");

    crate::db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    super::MemoryRepository::new(pool)
}
