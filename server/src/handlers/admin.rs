use crate::actix_web::Responder;
use crate::admin::{AdminCommand, RoomDescription};
use crate::server::{ServerCommand, ServerTx};
use actix_web::{error, web, HttpResponse};

pub fn configure_admin_handlers(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin").service(
            web::resource("/rooms")
                .name("admin_rooms")
                .route(web::get().to(list_rooms)),
        ),
    );
}

async fn list_rooms(srv_tx: web::Data<ServerTx>) -> Result<impl Responder, error::Error> {
    let (tx, rx) = tokio::sync::oneshot::channel::<Vec<RoomDescription>>();

    srv_tx
        .get_ref()
        .send(ServerCommand::Admin(AdminCommand::DescribeRooms { tx }))
        .await
        .map_err(|_| error::ErrorInternalServerError("Room broker is not running"))?;

    let rooms = rx
        .await
        .map_err(|_| error::ErrorInternalServerError("Receiver await error"))?;

    Ok(HttpResponse::Ok().json(rooms))
}
