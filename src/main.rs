use std::{net::SocketAddr, sync::Arc};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use handcraft_store_api::{
    config::AppConfig,
    create_app,
    db::{create_pool, orm_from_pool, run_migrations},
    error::expose_error_details,
    media::LocalMediaStore,
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,handcraft_store_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    expose_error_details(config.environment.is_development());

    let pool = create_pool(&config.database_url).await?;
    let orm = orm_from_pool(pool.clone());
    run_migrations(&orm).await?;

    tokio::fs::create_dir_all(&config.media_dir).await?;
    let media = LocalMediaStore::new(&config.media_dir, config.media_base_url.clone());

    let addr = SocketAddr::from((config.host.parse::<std::net::IpAddr>()?, config.port));
    let state = AppState {
        pool,
        orm,
        media: Arc::new(media),
        config: Arc::new(config),
    };
    let app = create_app(state);

    tracing::info!("listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;

    Ok(())
}
