/*
 * Solicitud Scanner - Autogeneracion portal scanning service
 * Copyright (c) 2025 Solicitud Scanner Project
 *
 * This work is licensed under CC BY-NC-SA 4.0
 * https://creativecommons.org/licenses/by-nc-sa/4.0/
 */

use axum::http::Method;
use solicitud_scanner::{
    config::Config,
    error::AppResult,
    handlers::AppState,
    models::Operator,
    routes::create_api_routes,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> AppResult<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "solicitud_scanner=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_file(CONFIG_PATH) {
        Ok(config) => {
            tracing::info!("loaded configuration from {}", CONFIG_PATH);
            config
        }
        Err(e) => {
            tracing::warn!("could not load {} ({}), using defaults", CONFIG_PATH, e);
            let default_config = Config::default();
            if let Err(e) = default_config.save_to_file(CONFIG_PATH) {
                tracing::warn!("failed to write default configuration: {}", e);
            }
            default_config
        }
    };
    config.validate()?;

    let addr = config.server_addr();
    let app_state = AppState::from_config(&config)?;
    for operator in Operator::ALL {
        match app_state.sites.site_for(operator) {
            Ok(site) => tracing::info!("serving {} at {}{}", operator, site.base_url, site.root_path),
            Err(_) => tracing::info!("{} is disabled", operator),
        }
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let app = create_api_routes()
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on http://{}", addr);
    tracing::info!("OpenAPI document at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
