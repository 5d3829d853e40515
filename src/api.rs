use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::accounts::AccountStore;
use crate::config::news::{FilterMode, StoreKind};
use crate::config::NewsConfig;
use crate::error::{ApiError, AuthError};
use crate::filter::{
    FilterEnvelope, FilterService, LocalFilter, PreferenceFilter, RemoteFilter, FILTER_TOKEN_HEADER,
};
use crate::ingest::cache::SnapshotCache;
use crate::ingest::providers::NytNewswire;
use crate::ingest::types::{FeedItem, FeedSource};
use crate::pipeline::NewsPipeline;
use crate::publish::SnapshotPublisher;
use crate::store::{InMemoryObjectStore, LocalFsObjectStore, ObjectStore};

pub const CACHE_HEADER: &str = "X-News-Cache";
pub const FILTER_HEADER: &str = "X-News-Filter";

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<NewsPipeline>,
    pub accounts: Arc<AccountStore>,
    pub filter_service: Arc<FilterService>,
}

impl AppState {
    pub fn new(pipeline: NewsPipeline, accounts: AccountStore, filter_service: FilterService) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            accounts: Arc::new(accounts),
            filter_service: Arc::new(filter_service),
        }
    }

    /// Wire the production collaborators described by `cfg`.
    pub fn from_config(cfg: &NewsConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn ObjectStore> = match cfg.store.kind {
            StoreKind::Memory => Arc::new(InMemoryObjectStore::new(cfg.store.bucket.clone())),
            StoreKind::Fs => Arc::new(LocalFsObjectStore::new(&cfg.store.root, cfg.store.bucket.clone())?),
        };
        let publisher = SnapshotPublisher::new(store, cfg.publish_timeout());

        let source: Arc<dyn FeedSource> = Arc::new(NytNewswire::new(
            cfg.provider.url.clone(),
            cfg.provider.api_key.clone(),
            cfg.provider_timeout(),
        )?);

        let filter: Arc<dyn PreferenceFilter> = match cfg.filter.mode {
            FilterMode::Local => Arc::new(LocalFilter),
            FilterMode::Remote => {
                let url = cfg.filter.remote_url.clone().unwrap_or_default();
                Arc::new(
                    RemoteFilter::new(url, cfg.filter_timeout())?
                        .with_token(cfg.filter.service_token.clone()),
                )
            }
        };

        let pipeline = NewsPipeline::new(
            Arc::new(SnapshotCache::with_window(cfg.cache_window())),
            source,
            publisher.clone(),
            filter,
            cfg.publish.policy,
        );
        let filter_service = FilterService::new(publisher, cfg.filter.write_processed)
            .with_token(cfg.filter.service_token.clone());

        tracing::info!(
            store = ?cfg.store.kind,
            bucket = %cfg.store.bucket,
            filter = ?cfg.filter.mode,
            policy = ?cfg.publish.policy,
            window_secs = cfg.cache.window_secs,
            filter_endpoint = filter_service.is_enabled(),
            "news pipeline wired"
        );
        let accounts = AccountStore::with_session_lifetime(cfg.session_lifetime());
        Ok(Self::new(pipeline, accounts, filter_service))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/", get(health))
        .route("/api/raw", get(raw_feed))
        .route("/api/news-galore", get(news_galore))
        .route("/api/processed", get(latest_processed))
        .route("/api/signup", post(signup))
        .route("/api/login", post(login))
        .route("/api/logout", get(logout))
        .route("/api/user", get(current_user))
        .route("/api/preferences", post(update_preferences))
        .route("/internal/filter", post(internal_filter))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn raw_feed(State(state): State<AppState>) -> Result<Json<Vec<FeedItem>>, ApiError> {
    let (snapshot, _) = state.pipeline.obtain_raw().await?;
    Ok(Json(snapshot.items))
}

async fn news_galore(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let principal = state
        .accounts
        .current_principal(&headers)
        .ok_or(AuthError::LoginRequired)?;
    let preferences = state.accounts.preferences_for(&principal)?;
    tracing::info!(
        target: "pipeline",
        email = principal.email(),
        preferences = ?preferences,
        "personalized feed requested"
    );

    let feed = state.pipeline.personalized(&preferences).await?;
    Ok((
        [
            (CACHE_HEADER, feed.cache.as_str()),
            (FILTER_HEADER, feed.filter.as_str()),
        ],
        Json(feed.items),
    ))
}

async fn latest_processed(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<FeedItem>>, ApiError> {
    state
        .accounts
        .current_principal(&headers)
        .ok_or(AuthError::LoginRequired)?;
    let items = state.pipeline.publisher().fetch_latest_processed().await?;
    Ok(Json(items))
}

#[derive(serde::Deserialize)]
struct CredentialsReq {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

impl CredentialsReq {
    fn parts(&self) -> (&str, &str) {
        (
            self.email.as_deref().unwrap_or_default(),
            self.password.as_deref().unwrap_or_default(),
        )
    }
}

async fn signup(
    State(state): State<AppState>,
    Json(body): Json<CredentialsReq>,
) -> Result<impl IntoResponse, ApiError> {
    let (email, password) = body.parts();
    state.accounts.signup(email, password)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Signup successful" })),
    ))
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<CredentialsReq>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (email, password) = body.parts();
    let token = state.accounts.login(email, password)?;
    Ok(Json(json!({ "message": "Login successful", "token": token })))
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Json<serde_json::Value> {
    state.accounts.logout(&headers);
    Json(json!({ "message": "Logout successful" }))
}

async fn current_user(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let principal = state
        .accounts
        .current_principal(&headers)
        .ok_or(AuthError::NotLoggedIn)?;
    let profile = state.accounts.profile(&principal)?;
    Ok(Json(profile))
}

#[derive(serde::Deserialize)]
struct PreferencesReq {
    #[serde(default)]
    preferences: Vec<String>,
}

async fn update_preferences(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<PreferencesReq>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let principal = state
        .accounts
        .current_principal(&headers)
        .ok_or(AuthError::LoginRequired)?;
    tracing::info!(
        target: "auth",
        email = principal.email(),
        preferences = ?body.preferences,
        "updating preferences"
    );
    state
        .accounts
        .update_preferences(&principal, body.preferences)?;
    Ok(Json(json!({ "message": "Preferences updated" })))
}

async fn internal_filter(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<PreferencesReq>,
) -> Result<Json<FilterEnvelope>, ApiError> {
    let service = &state.filter_service;
    if !service.is_enabled() {
        return Err(ApiError::new(StatusCode::NOT_FOUND, "Not found"));
    }
    let presented = headers
        .get(FILTER_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());
    if !service.accepts(presented) {
        tracing::warn!(target: "filter", "filter request with bad service token");
        return Err(AuthError::ServiceToken.into());
    }
    Ok(Json(service.handle(&body.preferences).await))
}
