use std::net::SocketAddr;

use axum::{middleware, routing::get};
use tower_http::trace::TraceLayer;

use vetcase_api::{
    ApiConfig, ApiState,
    metrics::{init_metrics, metrics_handler, track_metrics},
    middleware::{
        cors::create_cors_layer, rate_limit::rate_limit_middleware,
        request_id::request_id_middleware, security_headers::security_headers_middleware,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment variables
    dotenvy::dotenv().ok();
    let config = ApiConfig::from_env()?;

    vetcase_api::tracing::init_tracing(&config.env);
    let metrics_handle = init_metrics()?;

    // Database pool and migrations
    let pool = vetcase_db::create_pool(&config.database_url, 10).await?;
    vetcase_db::ensure_db_and_migrate(&config.database_url, &pool).await?;

    // Application state and background jobs
    let state = ApiState::new(&config, pool.clone());
    let _jobs = vetcase_api::jobs::start_background_jobs(pool, state.rate_limiter.clone());

    let environment = config.env;
    let app = vetcase_api::router::router()
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(state, rate_limit_middleware))
        .layer(middleware::from_fn(move |req, next| {
            security_headers_middleware(environment, req, next)
        }))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(middleware::from_fn(track_metrics))
        .layer(create_cors_layer(config.allowed_origins.clone()))
        .layer(TraceLayer::new_for_http())
        .route("/metrics", get(metrics_handler).with_state(metrics_handle));

    // Start the server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
