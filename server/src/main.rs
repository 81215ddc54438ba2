use std::sync::Arc;

use clap::Parser;
use presence_server::actix_web::{web, App, HttpServer};
use presence_server::auth::OpaqueCredentialVerifier;
use presence_server::config::ServerConfig;
use presence_server::server::spawn_server;
use presence_server::{cors, handlers};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let config = ServerConfig::parse();
    let srv_tx = spawn_server(&config, Arc::new(OpaqueCredentialVerifier));

    log::info!("Listening on {}", config.bind);
    let allowed_origin = config.allowed_origin.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(cors(allowed_origin.as_deref()))
            .app_data(web::Data::new(srv_tx.clone()))
            .configure(handlers::root)
    })
    .bind(&config.bind)?
    .run()
    .await
}
