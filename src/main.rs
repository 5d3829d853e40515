//! News Galore service: binary entrypoint.
//! Boots the Axum HTTP server with the personalized news pipeline and `/metrics`.

use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    // This enables NYT_API_KEY / NEWS_* overrides for the config loader.
    let _ = dotenvy::dotenv();

    news_galore::telemetry::init_tracing();

    let router = news_galore::app().await?;
    Ok(router.into())
}
