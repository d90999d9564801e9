use anyhow::Result;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{ContactInfo, PersonalInfo, UpdateProfileRequest, User};

#[derive(Clone)]
pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        name: &str,
    ) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, name, role, personal_info, contact_info)
            VALUES ($1, $2, $3, 'user', $4, $5)
            RETURNING id, email, password_hash, name, avatar, role, personal_info, contact_info, created_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(name)
        .bind(Json(PersonalInfo::default()))
        .bind(Json(ContactInfo::default()))
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, name, avatar, role, personal_info, contact_info, created_at
             FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, name, avatar, role, personal_info, contact_info, created_at
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Applies only the fields present in the request; absent fields keep
    /// their stored values.
    pub async fn update_user_profile(
        &self,
        id: Uuid,
        update: UpdateProfileRequest,
    ) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                personal_info = COALESCE($3, personal_info),
                contact_info = COALESCE($4, contact_info)
            WHERE id = $1
            RETURNING id, email, password_hash, name, avatar, role, personal_info, contact_info, created_at
            "#,
        )
        .bind(id)
        .bind(update.name)
        .bind(update.personal_info.map(Json))
        .bind(update.contact_info.map(Json))
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn update_user_avatar(&self, id: Uuid, avatar: &str) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET avatar = $2
            WHERE id = $1
            RETURNING id, email, password_hash, name, avatar, role, personal_info, contact_info, created_at
            "#,
        )
        .bind(id)
        .bind(avatar)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }
}
