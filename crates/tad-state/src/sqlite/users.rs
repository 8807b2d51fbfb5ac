use anyhow::Result;
use tad_core::models::User;
use uuid::Uuid;

use super::core::SqliteDatabase;

impl SqliteDatabase {
    pub(super) async fn upsert_user_by_email_impl(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<User> {
        // The no-op DO UPDATE keeps RETURNING populated on conflict.
        let user = sqlx::query_as::<_, User>(
            r#"INSERT INTO users (id, email, password_hash)
            VALUES (?, ?, ?)
            ON CONFLICT(email) DO UPDATE SET email = excluded.email
            RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }
}
