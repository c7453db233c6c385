use anyhow::{Context, Result};
use chrono::Utc;

use crate::models::UserProfile;

use super::MemoryRepository;

impl MemoryRepository {
    /// Fetch the profile, creating it on first contact, and bump `last_seen`.
    pub async fn touch_profile(&self, user_name: &str) -> Result<UserProfile> {
        let now = Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO user_profiles (user_name, created_at, last_seen)
            VALUES (?, ?, ?)
            ON CONFLICT(user_name) DO UPDATE SET last_seen = excluded.last_seen
            "#,
        )
        .bind(user_name)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to upsert user profile")?;

        self.get_profile(user_name)
            .await?
            .context("Profile missing right after upsert")
    }

    pub async fn get_profile(&self, user_name: &str) -> Result<Option<UserProfile>> {
        let profile = sqlx::query_as(
            "SELECT id, user_name, preferences_json, created_at, last_seen FROM user_profiles WHERE user_name = ?",
        )
        .bind(user_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    /// Shallow-merge `updates` into the stored preferences object.
    pub async fn update_preferences(
        &self,
        user_name: &str,
        updates: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let profile = self.touch_profile(user_name).await?;
        let mut prefs = match profile.preferences() {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        for (key, value) in updates {
            prefs.insert(key.clone(), value.clone());
        }
        let merged = serde_json::Value::Object(prefs);

        sqlx::query("UPDATE user_profiles SET preferences_json = ? WHERE user_name = ?")
            .bind(merged.to_string())
            .bind(user_name)
            .execute(&self.pool)
            .await
            .context("Failed to update preferences")?;

        Ok(merged)
    }
}
