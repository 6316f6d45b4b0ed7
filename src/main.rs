// src/main.rs

use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{http, middleware::Logger, web, App, HttpServer};
use env_logger::Env;
use log::{info, warn};

use tasklist::config::{Config, StoreBackend};
use tasklist::db::MongoDB;
use tasklist::mailer::LogMailer;
use tasklist::{configure, AppState};

async fn build_state(config: &Config) -> io::Result<AppState> {
    match config.store {
        StoreBackend::Memory => {
            warn!("STORE=memory: data lives only as long as this process");
            Ok(AppState::in_memory(config.clone(), Arc::new(LogMailer)))
        }
        StoreBackend::Mongo => {
            let mongodb = MongoDB::init(&config.mongo_uri, &config.database_name)
                .await
                .map_err(io::Error::other)?;
            let (tasks, users) = mongodb.stores().await.map_err(io::Error::other)?;
            Ok(AppState {
                tasks: Arc::new(tasks),
                users: Arc::new(users),
                mailer: Arc::new(LogMailer),
                config: config.clone(),
            })
        }
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::from_env().map_err(io::Error::other)?;
    let state = web::Data::new(build_state(&config).await?);

    let frontend_origin = config.frontend_origin.clone();
    info!("Server running at http://{}:{}", config.host, config.port);
    info!("Allowed CORS Origin: {}", frontend_origin);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                http::header::CONTENT_TYPE,
                http::header::ACCEPT,
                http::header::AUTHORIZATION,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
