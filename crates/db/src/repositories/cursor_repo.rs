//! Repository for the single-row `assignment_cursor` table.

use sqlx::PgPool;

/// Reads and writes the persisted round-robin cursor.
pub struct CursorRepo;

impl CursorRepo {
    /// Load the persisted cursor.
    pub async fn load(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let position: Option<i64> =
            sqlx::query_scalar("SELECT position FROM assignment_cursor WHERE id = 1")
                .fetch_optional(pool)
                .await?;
        Ok(position.unwrap_or(0))
    }

    /// Persist a new cursor value.
    pub async fn store(pool: &PgPool, position: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO assignment_cursor (id, position) VALUES (1, $1) \
             ON CONFLICT (id) DO UPDATE SET position = EXCLUDED.position, updated_at = NOW()",
        )
        .bind(position)
        .execute(pool)
        .await?;
        Ok(())
    }
}
