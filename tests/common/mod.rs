//! Shared fixtures for integration tests

#![allow(dead_code)]

use chrono::Duration;
use sqlx::PgPool;

use oeem_datastore::config::DatastoreConfig;
use oeem_datastore::models::{AccessToken, ProjectOwner, User};
use oeem_datastore::web::{create_app, AppState};

pub struct Fixture {
    pub user: User,
    pub project_owner: ProjectOwner,
    pub token: String,
}

/// A user, their project owner and a token carrying `scope`
pub async fn fixture(pool: &PgPool, scope: &str) -> Fixture {
    let user = User::create(pool, "demo", "demo@example.com").await.unwrap();
    let project_owner = ProjectOwner::create(pool, user.id).await.unwrap();
    let token = AccessToken::generate_token();
    AccessToken::create(pool, user.id, &token, scope, Duration::days(1))
        .await
        .unwrap();

    Fixture {
        user,
        project_owner,
        token,
    }
}

pub fn app(pool: PgPool) -> axum::Router {
    create_app(AppState::new(pool, DatastoreConfig::default()))
}
