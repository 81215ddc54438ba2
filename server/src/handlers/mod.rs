use crate::connection::ws_index;
use crate::handlers::admin::configure_admin_handlers;
use actix_web::web;

mod admin;

pub fn root(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/ws").route(web::get().to(ws_index)));

    configure_admin_handlers(cfg);
}
