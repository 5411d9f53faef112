use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::path::Path;
use std::sync::Arc;

mod ai;
mod config;
mod controllers;
mod ingest;
mod models;
mod rag;
mod session;
mod store;
mod tools;

use config::Config;
use rag::RagSystem;

pub struct AppState {
    pub rag: Arc<RagSystem>,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env();
    config.validate_and_log();
    let port = config.port;

    log::info!("Initializing course index at {}", config.database_url);
    let rag = Arc::new(RagSystem::new(&config).expect("Failed to initialize RAG system"));

    // Index course documents found on disk at startup
    let docs_dir = Path::new(&config.docs_dir);
    match rag.add_course_folder(docs_dir, false) {
        Ok((courses, chunks)) => {
            log::info!("Loaded {} new course(s), {} chunk(s) from {}", courses, chunks, config.docs_dir);
        }
        Err(e) => {
            log::error!("Failed to load course documents: {}", e);
        }
    }

    log::info!("Starting coursebot server on port {}", port);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(AppState {
                rag: Arc::clone(&rag),
            }))
            .wrap(Logger::default())
            .wrap(cors)
            .configure(controllers::health::config)
            .configure(controllers::query::config)
            .configure(controllers::courses::config)
            .configure(controllers::sessions::config)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
