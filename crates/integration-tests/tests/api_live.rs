//! The live dialog feed over a real socket.

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::StatusCode;
use futures_util::{SinkExt, StreamExt};
use integration_tests::{spawn_app, TestApp};
use serde_json::{json, Value};
use services::AccountSettings;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn serve(app: &TestApp) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn open_dialog(app: &TestApp) -> (Uuid, String, String, String) {
    let (_, alice_token) = app.signed_up("alice@example.com", "Alice").await;
    let (bob_id, bob_token) = app.signed_up("bob@example.com", "Bob").await;
    let (status, created) = app
        .post("/dialogs", Some(&alice_token), json!({ "partner": bob_id, "text": "hi" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let dialog_id = created["dialog"]["id"].as_str().unwrap().parse().unwrap();
    (dialog_id, alice_token, bob_id, bob_token)
}

/// Next text frame as JSON, skipping pings.
async fn next_json(client: &mut Client) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .expect("frame in time")
            .expect("socket open")
            .expect("valid frame");
        if let WsMessage::Text(_) = &frame {
            return serde_json::from_str(frame.to_text().unwrap()).unwrap();
        }
    }
}

#[tokio::test]
async fn participant_receives_new_messages_live() {
    let app = spawn_app(AccountSettings::default());
    let (dialog_id, alice_token, _, bob_token) = open_dialog(&app).await;
    let addr = serve(&app).await;

    let (mut bob, response) =
        connect_async(format!("ws://{addr}/dialogs/{dialog_id}/live?token={bob_token}"))
            .await
            .unwrap();
    assert_eq!(response.status(), StatusCode::SWITCHING_PROTOCOLS);

    let (status, _) = app
        .post(
            "/messages",
            Some(&alice_token),
            json!({ "dialog_id": dialog_id, "text": "live one" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let event = loop {
        let event = next_json(&mut bob).await;
        // The opening message may still be queued ahead of this one.
        if event["message"]["text"] == "live one" {
            break event;
        }
    };
    assert_eq!(event["type"], "new_message");
    assert_eq!(event["message"]["dialog_id"], dialog_id.to_string());
}

#[tokio::test]
async fn outsider_handshake_is_forbidden() {
    let app = spawn_app(AccountSettings::default());
    let (dialog_id, ..) = open_dialog(&app).await;
    let (_, eve_token) = app.signed_up("eve@example.com", "Eve").await;
    let addr = serve(&app).await;

    let err = connect_async(format!("ws://{addr}/dialogs/{dialog_id}/live?token={eve_token}"))
        .await
        .unwrap_err();
    match err {
        WsError::Http(response) => assert_eq!(response.status(), StatusCode::FORBIDDEN),
        other => panic!("expected an HTTP rejection, got {other:?}"),
    }

    let err = connect_async(format!("ws://{addr}/dialogs/{dialog_id}/live"))
        .await
        .unwrap_err();
    match err {
        WsError::Http(response) => assert_eq!(response.status(), StatusCode::UNAUTHORIZED),
        other => panic!("expected an HTTP rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn closing_the_socket_prunes_the_topic() {
    let app = spawn_app(AccountSettings::default());
    let (dialog_id, _, _, bob_token) = open_dialog(&app).await;
    let addr = serve(&app).await;

    let (mut bob, _) =
        connect_async(format!("ws://{addr}/dialogs/{dialog_id}/live?token={bob_token}"))
            .await
            .unwrap();
    assert_eq!(app.hub.subscribers(dialog_id), 1);

    bob.send(WsMessage::Close(None)).await.unwrap();
    for _ in 0..200 {
        if app.hub.topic_count() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("dialog topic outlived its last session");
}
