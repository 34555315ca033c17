//! Postgres credential store tests
//!
//! Need a running Postgres reachable with `configuration.yaml`; run with
//! `cargo test -- --ignored`.

use sqlx::{Connection, Executor, PgConnection, PgPool};
use videotube::auth::fingerprint;
use videotube::configuration::{get_configuration, DatabaseSettings};
use videotube::error::{AppError, DatabaseError};
use videotube::models::NewUser;
use videotube::store::{CredentialStore, PgCredentialStore};

pub async fn configure_database(config: &DatabaseSettings) -> PgPool {
    let mut connection = PgConnection::connect(&config.connection_string_without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, config.database_name))
        .await
        .expect("Failed to create database.");

    let connection_pool = PgPool::connect(&config.connection_string())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database.");
    connection_pool
}

async fn spawn_store() -> PgCredentialStore {
    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.database.database_name = uuid::Uuid::new_v4().to_string();
    PgCredentialStore::new(configure_database(&configuration.database).await)
}

fn alice() -> NewUser {
    NewUser {
        username: "alice".to_string(),
        email: "alice@example.com".to_string(),
        fullname: "Alice Liddell".to_string(),
        avatar: "https://media.test/avatar.png".to_string(),
        cover_image: String::new(),
        password_hash: "$2b$04$placeholder".to_string(),
    }
}

#[tokio::test]
#[ignore]
async fn insert_and_find_by_login() {
    let store = spawn_store().await;
    let created = store.insert(alice()).await.expect("insert failed");

    let by_username = store.find_by_login(Some("alice"), None).await.unwrap();
    let by_email = store
        .find_by_login(None, Some("alice@example.com"))
        .await
        .unwrap();

    assert_eq!(by_username.map(|u| u.id), Some(created.id));
    assert_eq!(by_email.map(|u| u.id), Some(created.id));
    assert!(created.refresh_token_hash.is_none());
}

#[tokio::test]
#[ignore]
async fn duplicate_email_is_a_conflict() {
    let store = spawn_store().await;
    store.insert(alice()).await.expect("insert failed");

    let mut twin = alice();
    twin.username = "alice2".to_string();
    let err = store.insert(twin).await.unwrap_err();

    assert!(matches!(
        err,
        AppError::Database(DatabaseError::UniqueConstraintViolation(_))
    ));
}

#[tokio::test]
#[ignore]
async fn refresh_token_swap_happens_once() {
    let store = spawn_store().await;
    let user = store.insert(alice()).await.expect("insert failed");

    let old = fingerprint("token-a");
    let new = fingerprint("token-b");
    store.set_refresh_token(user.id, Some(&old)).await.unwrap();

    assert!(store.replace_refresh_token(user.id, &old, &new).await.unwrap());
    assert!(!store.replace_refresh_token(user.id, &old, &new).await.unwrap());

    let stored = store.find_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(stored.refresh_token_hash, Some(new));
}
