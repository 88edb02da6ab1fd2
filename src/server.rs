//!
//! agendum HTTP server
//! -------------------
//! Axum routes for the task-scheduling backend. Every protected route takes a
//! `Principal` extractor, which runs the request gate (bearer header, session
//! validation) before the handler body sees the request. Task creation adds the
//! team-admin check on top.
//!
//! Responses always carry permissive CORS headers so the separately hosted
//! front end can call the API; `OPTIONS` preflights are answered by the CORS layer.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::{FromRef, State};
use axum::http::{header, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::identity::{generate_id, require_team_admin, PasswordHasher, Principal, SessionManager, TeamAuthorizer};
use crate::models::{LoginRequest, LoginResponse, NewTask, NewTeam, NewUser, TeamView};
use crate::storage::{attr_str_list, shared_store, SharedStore, StoreError};

const CORS_ALLOW_HEADERS: &str = "Content-Type,X-Amz-Date,Authorization,X-Api-Key,X-Amz-Security-Token";
const CORS_ALLOW_METHODS: &str = "GET,POST,OPTIONS";

/// Shared server state injected into all handlers. Cloning is cheap; every
/// field is a reference-counted handle to the single process-wide instance.
#[derive(Clone, FromRef)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: SharedStore,
    pub sessions: Arc<SessionManager>,
    pub authz: Arc<TeamAuthorizer>,
}

impl AppState {
    pub fn new(config: AppConfig, store: SharedStore, hasher: PasswordHasher) -> Self {
        let sessions = Arc::new(SessionManager::new(store.clone(), &config, hasher));
        let authz = Arc::new(TeamAuthorizer::new(store.clone(), &config));
        Self { config: Arc::new(config), store, sessions, authz }
    }
}

/// Build the router with all routes and the CORS response layer.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "agendum ok" }))
        .route("/login", post(login))
        .route("/users", post(create_user))
        .route("/teams", get(list_teams).post(create_team))
        .route("/tasks", post(create_task))
        .layer(cors_layer())
        // Allow lists go on every response, not only on preflights
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(CORS_ALLOW_HEADERS),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(CORS_ALLOW_METHODS),
        ))
        .with_state(state)
}

/// Any origin; preflights for the listed methods and request headers are answered here.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-amz-date"),
            header::AUTHORIZATION,
            HeaderName::from_static("x-api-key"),
            HeaderName::from_static("x-amz-security-token"),
        ])
}

/// Start the HTTP server on the configured port and run until the listener fails.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let store = shared_store(&config);
    let port = config.http_port;
    let sweep = config.sweep_interval;
    let state = AppState::new(config, store, PasswordHasher::default());

    match sweep {
        Some(every) => spawn_session_sweeper(state.sessions.clone(), every),
        None => info!(target: "agendum::server", "session sweeper disabled"),
    }

    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;
    info!(target: "agendum::server", "Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("While binding HTTP listener on {}", addr))?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Periodically drop session records that can no longer validate.
fn spawn_session_sweeper(sessions: Arc<SessionManager>, every: Duration) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(every).await;
            match sessions.sweep_expired(Utc::now()) {
                Ok(0) => {}
                Ok(removed) => debug!(target: "agendum::server", removed, "session_sweep"),
                Err(e) => warn!(target: "agendum::server", "session sweep failed: {e}"),
            }
        }
    });
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> AppResult<T> {
    serde_json::from_slice(body).map_err(|e| {
        debug!(target: "agendum::server", "rejecting body: {e}");
        AppError::validation("Invalid request body")
    })
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Run a CPU-heavy closure (password hashing) off the async workers.
async fn blocking<T, F>(f: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::internal(format!("blocking worker failed: {e}")))?
}

async fn login(State(state): State<AppState>, body: Bytes) -> AppResult<Json<LoginResponse>> {
    let req: LoginRequest = parse_body(&body)?;
    let sessions = state.sessions.clone();
    let outcome = blocking(move || sessions.login(&req.email, &req.password)).await?;
    Ok(Json(LoginResponse { message: "Login successful".to_string(), token: outcome.token }))
}

async fn create_user(State(state): State<AppState>, body: Bytes) -> AppResult<impl IntoResponse> {
    let user: NewUser = parse_body(&body)?;
    user.check()?;
    let users = state.config.users_table.clone();
    // Early out before the hash; the conditional create below is authoritative
    if state.store.get_item(&users, &user.username)?.is_some() {
        return Err(AppError::conflict("Username already exists"));
    }
    let sessions = state.sessions.clone();
    let password = user.password.clone();
    let digest = blocking(move || Ok(sessions.hasher().hash(&password)?)).await?;
    let username = user.username.clone();
    match state.store.put_item_if_absent(&users, user.into_item(digest)) {
        Ok(()) => {}
        Err(StoreError::AlreadyExists { .. }) => {
            return Err(AppError::conflict("Username already exists"));
        }
        Err(StoreError::Conflict { field, .. }) if field == "email" => {
            return Err(AppError::conflict("Email already registered"));
        }
        Err(e) => return Err(e.into()),
    }
    info!(target: "agendum::server", user = %username, "user registered");
    Ok((StatusCode::CREATED, Json(json!({"message": "User created successfully"}))))
}

async fn create_team(principal: Principal, State(state): State<AppState>, body: Bytes) -> AppResult<impl IntoResponse> {
    let team: NewTeam = parse_body(&body)?;
    if team.name.trim().is_empty() {
        return Err(AppError::validation("name is required"));
    }
    if team.admins.iter().chain(team.members.iter()).any(|u| u.contains(',')) {
        return Err(AppError::validation("usernames may not contain ','"));
    }
    let team_id = generate_id()?;
    let mut people: Vec<String> = team.admins.iter().chain(team.members.iter()).map(|u| u.trim().to_string()).collect();
    people.sort();
    people.dedup();
    state.store.put_item(&state.config.teams_table, team.into_item(&team_id, &now_rfc3339()))?;

    for username in people.iter().filter(|u| !u.is_empty()) {
        if let Err(e) = state.store.append_to_list(&state.config.users_table, username, "teamIds", &team_id) {
            warn!(target: "agendum::server", team = %team_id, user = %username, "could not link user to team: {e}");
        }
    }
    info!(target: "agendum::server", team = %team_id, by = %principal.username, "team created");
    Ok((StatusCode::CREATED, Json(json!({"message": "Team created successfully", "team_id": team_id}))))
}

async fn list_teams(principal: Principal, State(state): State<AppState>) -> AppResult<Json<Vec<TeamView>>> {
    let Some(user) = state.store.get_item(&state.config.users_table, &principal.username)? else {
        return Err(AppError::not_found("User not found"));
    };
    let mut teams = Vec::new();
    for team_id in attr_str_list(&user, "teamIds") {
        match state.store.get_item(&state.config.teams_table, &team_id) {
            Ok(Some(item)) => teams.extend(TeamView::from_item(&item)),
            Ok(None) => {}
            Err(e) => warn!(target: "agendum::server", team = %team_id, "skipping team: {e}"),
        }
    }
    Ok(Json(teams))
}

async fn create_task(principal: Principal, State(state): State<AppState>, body: Bytes) -> AppResult<impl IntoResponse> {
    let mut task: NewTask = parse_body(&body)?;
    task.requester = principal.username.clone();
    require_team_admin(&state.authz, &principal, &task.team_id)?;
    task.check()?;

    let task_id = generate_id()?;
    let team_id = task.team_id.clone();
    state.store.put_item(&state.config.tasks_table, task.into_item(&task_id, &now_rfc3339()))?;
    info!(target: "agendum::server", task = %task_id, team = %team_id, by = %principal.username, "task created");
    Ok((StatusCode::CREATED, Json(json!({"message": "Task created successfully", "task_id": task_id}))))
}
