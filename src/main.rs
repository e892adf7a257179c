use std::net::{IpAddr, SocketAddr};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use foodgram_api::{
    app::build_app,
    config::AppConfig,
    db::{create_pool, run_migrations},
    pdf::BodyFont,
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,foodgram_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    // A missing font would only surface on the first download, so load it now.
    let font = BodyFont::load(&config.font_path)?;
    tracing::info!(font = %config.font_path.display(), "body font loaded");

    let pool = create_pool(&config.database_url).await?;
    let state = AppState::new(pool, font);
    run_migrations(&state.orm).await?;

    let app = build_app(state);

    let addr = SocketAddr::from((config.host.parse::<IpAddr>()?, config.port));
    tracing::info!("listening on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;

    Ok(())
}
