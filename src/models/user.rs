use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

/// Account that owns projects and API tokens
/// Maps to `users` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub date_joined: DateTime<Utc>,
}

impl User {
    pub async fn create(pool: &PgPool, username: &str, email: &str) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email)
            VALUES ($1, $2)
            RETURNING id, username, email, date_joined
            "#,
        )
        .bind(username)
        .bind(email)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_username(pool: &PgPool, username: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT id, username, email, date_joined FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_or_create(pool: &PgPool, username: &str, email: &str) -> Result<User, sqlx::Error> {
        match Self::find_by_username(pool, username).await? {
            Some(user) => Ok(user),
            None => Self::create(pool, username, email).await,
        }
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Bearer token granting API access with a space separated scope list
/// Maps to `access_tokens` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AccessToken {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub scope: String,
    pub expires: DateTime<Utc>,
    pub created: DateTime<Utc>,
}

impl AccessToken {
    /// Random opaque token string
    pub fn generate_token() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    pub async fn create(
        pool: &PgPool,
        user_id: i64,
        token: &str,
        scope: &str,
        valid_for: Duration,
    ) -> Result<AccessToken, sqlx::Error> {
        sqlx::query_as::<_, AccessToken>(
            r#"
            INSERT INTO access_tokens (user_id, token, scope, expires)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, token, scope, expires, created
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(scope)
        .bind(Utc::now() + valid_for)
        .fetch_one(pool)
        .await
    }

    /// Find a token that exists and has not expired
    pub async fn authenticate(pool: &PgPool, token: &str) -> Result<Option<AccessToken>, sqlx::Error> {
        let found = sqlx::query_as::<_, AccessToken>(
            r#"
            SELECT id, user_id, token, scope, expires, created
            FROM access_tokens
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(pool)
        .await?;

        Ok(found.filter(|t| !t.is_expired(Utc::now())))
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires <= now
    }

    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scope.split_whitespace()
    }

    pub fn has_scope(&self, required: &str) -> bool {
        self.scopes().any(|scope| scope == required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_with_scope(scope: &str, expires: DateTime<Utc>) -> AccessToken {
        AccessToken {
            id: 1,
            user_id: 1,
            token: "tokstr".to_string(),
            scope: scope.to_string(),
            expires,
            created: Utc::now(),
        }
    }

    #[test]
    fn test_scopes() {
        let token = token_with_scope("read write", Utc::now() + Duration::days(1));
        assert!(token.has_scope("read"));
        assert!(token.has_scope("write"));
        assert!(!token.has_scope("admin"));

        let empty = token_with_scope("", Utc::now() + Duration::days(1));
        assert!(!empty.has_scope("read"));
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        assert!(token_with_scope("read", now - Duration::seconds(1)).is_expired(now));
        assert!(!token_with_scope("read", now + Duration::days(365)).is_expired(now));
    }

    #[test]
    fn test_generated_tokens_are_unique() {
        let a = AccessToken::generate_token();
        let b = AccessToken::generate_token();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }

    #[sqlx::test(migrator = "crate::database::MIGRATOR")]
    async fn test_authenticate(pool: PgPool) -> sqlx::Result<()> {
        let user = User::create(&pool, "user", "test@user.com").await?;
        AccessToken::create(&pool, user.id, "tokstr", "read write", Duration::days(365)).await?;
        AccessToken::create(&pool, user.id, "stale", "read write", Duration::days(-1)).await?;

        let found = AccessToken::authenticate(&pool, "tokstr").await?.expect("token");
        assert_eq!(found.user_id, user.id);
        assert!(AccessToken::authenticate(&pool, "stale").await?.is_none());
        assert!(AccessToken::authenticate(&pool, "badtoken").await?.is_none());
        Ok(())
    }
}
