use actix_web::{http::StatusCode, test, web, App, HttpServer};
use presence_client::{open, ChannelConfig, ChannelStatus, PresenceView};
use presence_server::admin::AdminCommand;
use presence_server::auth::OpaqueCredentialVerifier;
use presence_server::config::ServerConfig;
use presence_server::connection::{ConnectionCommand, ConnectionEvent};
use presence_server::handlers;
use presence_server::server::{spawn_server, ServerCommand, ServerTx};
use presence_system::serde_json::{json, Value};
use presence_system::{ClientMessage, DiagramId, Position};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

fn broker() -> ServerTx {
    spawn_server(&ServerConfig::default(), Arc::new(OpaqueCredentialVerifier))
}

fn start_server() -> SocketAddr {
    start_server_with(broker())
}

fn start_server_with(srv_tx: ServerTx) -> SocketAddr {
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(srv_tx.clone()))
            .configure(handlers::root)
    })
    .workers(1)
    .disable_signals()
    .bind("127.0.0.1:0")
    .unwrap();
    let addr = server.addrs()[0];
    actix_web::rt::spawn(server.run());
    addr
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..300 {
        if condition() {
            return;
        }
        actix_web::rt::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

fn names(view: &PresenceView) -> Vec<String> {
    let mut names = view
        .participants()
        .into_iter()
        .map(|participant| participant.display_name)
        .collect::<Vec<_>>();
    names.sort();
    names
}

#[actix_web::test]
async fn two_viewers_see_each_other_and_their_cursors() {
    let addr = start_server();
    let config = ChannelConfig::with_server_url(format!("ws://{}/ws", addr));

    let alice = open(&config, Some("d1"), &|| Some("u-a:Alice".to_string())).await;
    let alice_view = alice.view();
    wait_until(|| alice_view.status() == ChannelStatus::Joined).await;
    assert!(alice_view.participants().is_empty());

    let mut bob = open(&config, Some("d1"), &|| Some("u-b:Bob".to_string())).await;
    let bob_view = bob.view();
    wait_until(|| bob_view.status() == ChannelStatus::Joined).await;
    assert_eq!(names(&bob_view), vec!["Alice"]);
    wait_until(|| names(&alice_view) == vec!["Bob"]).await;

    let bob_id = bob_view.self_id().unwrap();
    assert_eq!(
        alice_view.participant(&bob_id).map(|p| p.position),
        Some(Position::ORIGIN)
    );

    bob.publish(10.0, 20.0);
    wait_until(|| {
        alice_view.participant(&bob_id).map(|p| p.position) == Some(Position::new(10.0, 20.0))
    })
    .await;

    bob.close();
    wait_until(|| alice_view.participants().is_empty()).await;
    assert_eq!(alice_view.status(), ChannelStatus::Joined);
}

#[actix_web::test]
async fn viewers_of_other_diagrams_stay_apart() {
    let addr = start_server();
    let config = ChannelConfig::with_server_url(format!("ws://{}/ws", addr));

    let alice = open(&config, Some("d1"), &|| Some("alice".to_string())).await;
    let carol = open(&config, Some("d2"), &|| Some("carol".to_string())).await;
    let alice_view = alice.view();
    let carol_view = carol.view();
    wait_until(|| alice_view.status() == ChannelStatus::Joined).await;
    wait_until(|| carol_view.status() == ChannelStatus::Joined).await;

    carol.publish(3.0, 4.0);
    actix_web::rt::time::sleep(Duration::from_millis(200)).await;
    assert!(alice_view.participants().is_empty());
    assert!(carol_view.participants().is_empty());
}

#[actix_web::test]
async fn handshake_without_credential_is_unauthorized() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(broker()))
            .configure(handlers::root),
    )
    .await;
    let req = test::TestRequest::get().uri("/ws").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn admin_rooms_starts_empty() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(broker()))
            .configure(handlers::root),
    )
    .await;
    let req = test::TestRequest::get().uri("/admin/rooms").to_request();
    let rooms: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(rooms, json!([]));
}

#[actix_web::test]
async fn connection_waits_for_a_busy_broker() {
    let (srv_tx, mut srv_rx) = tokio::sync::mpsc::channel::<ServerCommand>(1);
    let (filler, _filler_rx) = tokio::sync::oneshot::channel();
    srv_tx
        .try_send(ServerCommand::Admin(AdminCommand::DescribeRooms { tx: filler }))
        .unwrap();
    let addr = start_server_with(srv_tx);
    let config = ChannelConfig::with_server_url(format!("ws://{}/ws", addr));

    let _handle = open(&config, Some("d1"), &|| Some("alice".to_string())).await;
    assert!(matches!(srv_rx.recv().await, Some(ServerCommand::Admin(_))));

    let next = tokio::time::timeout(Duration::from_secs(2), srv_rx.recv())
        .await
        .expect("connection was never registered");
    let tx = match next {
        Some(ServerCommand::Connection(ConnectionCommand::Connect { tx, credential })) => {
            assert_eq!(credential, "alice");
            tx
        }
        other => panic!("expected Connect, got {:?}", other),
    };

    tx.send(ConnectionEvent::Connected { connection_id: 7 })
        .await
        .unwrap();
    let next = tokio::time::timeout(Duration::from_secs(2), srv_rx.recv())
        .await
        .expect("join was never forwarded");
    match next {
        Some(ServerCommand::Connection(ConnectionCommand::ClientMessage { from, message })) => {
            assert_eq!(from, 7);
            assert_eq!(
                message,
                ClientMessage::Join {
                    diagram_id: DiagramId::parse("d1").unwrap()
                }
            );
        }
        other => panic!("expected the join, got {:?}", other),
    }
}
