use anyhow::Context;
use axum::Router;
use compasschat::{contacts, db, profiles, relay::Relay, requests, rooms, AppState};
use sqlx::sqlite::SqlitePoolOptions;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let database_url = dotenv::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://compasschat.db?mode=rwc".to_owned());
    let db_pool = SqlitePoolOptions::new()
        .max_connections(16)
        .connect(&database_url)
        .await
        .context("connecting to sqlite")?;
    db::setup(&db_pool).await.context("creating schema")?;

    let app_state = AppState {
        db_pool,
        relay: Relay::new(),
    };

    let chat = requests::router()
        .merge(rooms::router())
        .nest("/contacts", contacts::router());

    let app = Router::new()
        .nest("/api/chat", chat)
        .nest("/api/profiles", profiles::router())
        .with_state(app_state)
        .layer(CorsLayer::permissive());

    let bind_addr = dotenv::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:5002".to_owned());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    tracing::info!(%bind_addr, "compasschat listening");
    axum::serve(listener, app).await?;

    Ok(())
}
