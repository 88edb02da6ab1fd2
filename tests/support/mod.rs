//! Shared harness for HTTP integration tests: an agendum server on an ephemeral
//! port backed by a fresh in-memory store.
#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use serde_json::{json, Value};

use agendum::config::AppConfig;
use agendum::identity::PasswordHasher;
use agendum::server::{router, AppState};
use agendum::storage::{Item, KeyValueStore, MemoryStore, SharedStore, StoreError, StoreResult};

pub struct TestServer {
    pub base: String,
    pub store: SharedStore,
    pub config: AppConfig,
    pub client: reqwest::Client,
}

pub async fn spawn() -> Result<TestServer> {
    let config = AppConfig { sweep_interval: None, ..AppConfig::default() };
    let store: SharedStore = Arc::new(MemoryStore::for_config(&config));
    start(config, store).await
}

/// Same server over a caller-supplied backend.
pub async fn spawn_with_store(store: SharedStore) -> Result<TestServer> {
    start(AppConfig { sweep_interval: None, ..AppConfig::default() }, store).await
}

async fn start(config: AppConfig, store: SharedStore) -> Result<TestServer> {
    // Cheap Argon2 cost keeps unoptimised test builds fast
    let state = AppState::new(config.clone(), store.clone(), PasswordHasher::with_cost(64, 1)?);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router(state)).await;
    });
    Ok(TestServer { base: format!("http://{}", addr), store, config, client: reqwest::Client::new() })
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<reqwest::Response> {
        Ok(self.client.post(self.url("/users"))
            .json(&json!({"username": username, "email": email, "password": password, "firstName": username, "lastName": "Test", "userType": "member"}))
            .send().await?)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<reqwest::Response> {
        Ok(self.client.post(self.url("/login")).json(&json!({"email": email, "password": password})).send().await?)
    }

    /// Register then log in, returning the bearer token.
    pub async fn user_with_token(&self, username: &str) -> Result<String> {
        let email = format!("{username}@x.com");
        let r = self.register(username, &email, "pw-123").await?;
        assert_eq!(r.status(), 201, "register {username}");
        let body: Value = self.login(&email, "pw-123").await?.json().await?;
        Ok(body["token"].as_str().unwrap_or_default().to_string())
    }

    pub fn seed_team(&self, team_id: &str, admins: &str, members: &str) {
        let mut team = Item::new();
        team.insert("team_id".into(), json!(team_id));
        team.insert("name".into(), json!(format!("Team {team_id}")));
        team.insert("admins".into(), json!(admins));
        team.insert("members".into(), json!(members));
        self.store.put_item(&self.config.teams_table, team).expect("seed team");
    }
}

/// Backend whose every call fails, as an unreachable database would.
pub struct DownStore;

fn down<T>() -> StoreResult<T> {
    Err(StoreError::Unavailable("10.0.0.7:8000 connection refused".into()))
}

impl KeyValueStore for DownStore {
    fn get_item(&self, _: &str, _: &str) -> StoreResult<Option<Item>> { down() }
    fn put_item(&self, _: &str, _: Item) -> StoreResult<()> { down() }
    fn put_item_if_absent(&self, _: &str, _: Item) -> StoreResult<()> { down() }
    fn query_eq(&self, _: &str, _: &str, _: &str) -> StoreResult<Vec<Item>> { down() }
    fn append_to_list(&self, _: &str, _: &str, _: &str, _: &str) -> StoreResult<()> { down() }
    fn sweep(&self, _: &str, _: &dyn Fn(&Item) -> bool) -> StoreResult<usize> { down() }
}
