use std::io;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};

use crate::config::Cli;
use crate::handlers;
use crate::state::AppState;

/// Route table, shared between the real server and tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(handlers::health::handler))
        .route("/health", web::get().to(handlers::health::handler))
        .route("/chat", web::post().to(handlers::chat::handler))
        .route(
            "/sessions/{session_id}",
            web::delete().to(handlers::sessions::delete_handler),
        );
}

fn build_cors(origins: &[String]) -> Cors {
    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        return Cors::permissive();
    }

    let mut cors = Cors::default()
        .allow_any_method()
        .allow_any_header()
        .max_age(3600);
    for origin in origins {
        cors = cors.allowed_origin(origin);
    }
    cors
}

pub async fn run_server(cli: Cli) -> io::Result<()> {
    let state = web::Data::new(AppState::from_cli(&cli).await);
    let origins = cli.cors_origins.clone();

    log::info!(
        "Listening on 0.0.0.0:{} (model: {})",
        cli.port,
        cli.model_name
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(build_cors(&origins))
            .configure(configure)
    })
    .bind(("0.0.0.0", cli.port))?
    .run()
    .await
}
