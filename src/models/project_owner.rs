use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

/// One per user; owns projects and project blocks
/// Maps to `project_owners` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ProjectOwner {
    pub id: i64,
    pub user_id: i64,
    pub added: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl ProjectOwner {
    pub async fn create(pool: &PgPool, user_id: i64) -> Result<ProjectOwner, sqlx::Error> {
        sqlx::query_as::<_, ProjectOwner>(
            r#"
            INSERT INTO project_owners (user_id)
            VALUES ($1)
            RETURNING id, user_id, added, updated
            "#,
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<ProjectOwner>, sqlx::Error> {
        sqlx::query_as::<_, ProjectOwner>(
            "SELECT id, user_id, added, updated FROM project_owners WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_user(pool: &PgPool, user_id: i64) -> Result<Option<ProjectOwner>, sqlx::Error> {
        sqlx::query_as::<_, ProjectOwner>(
            "SELECT id, user_id, added, updated FROM project_owners WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_or_create_for_user(pool: &PgPool, user_id: i64) -> Result<ProjectOwner, sqlx::Error> {
        match Self::find_by_user(pool, user_id).await? {
            Some(owner) => Ok(owner),
            None => Self::create(pool, user_id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;

    #[sqlx::test(migrator = "crate::database::MIGRATOR")]
    async fn test_one_owner_per_user(pool: PgPool) -> sqlx::Result<()> {
        let user = User::create(&pool, "owner", "owner@example.com").await?;
        let owner = ProjectOwner::find_or_create_for_user(&pool, user.id).await?;
        let again = ProjectOwner::find_or_create_for_user(&pool, user.id).await?;
        assert_eq!(owner.id, again.id);

        assert!(ProjectOwner::create(&pool, user.id).await.is_err());
        assert_eq!(
            ProjectOwner::find_by_id(&pool, owner.id).await?.map(|o| o.user_id),
            Some(user.id)
        );
        Ok(())
    }
}
