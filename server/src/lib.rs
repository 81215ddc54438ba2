pub extern crate actix_web;

use actix_cors::Cors;

pub mod admin;
pub mod auth;
pub mod config;
pub mod connection;
mod connection_tx_storage;
pub mod handlers;
mod room;
pub mod server;
mod server_state;

pub use room::PALETTE;

/// CORS policy for the HTTP surface. Browsers open the websocket from the
/// editor's origin, so that origin must be allowed; without one configured
/// any origin is.
pub fn cors(allowed_origin: Option<&str>) -> Cors {
    match allowed_origin {
        Some(origin) => Cors::default()
            .allowed_origin(origin)
            .allowed_methods(vec!["GET"])
            .allow_any_header()
            .max_age(3600),
        None => Cors::permissive(),
    }
}
