//! Dialogs, messages, read receipts and the real-time feed.

use axum::http::StatusCode;
use domains::ChatEvent;
use integration_tests::{spawn_app, TestApp};
use serde_json::json;
use services::AccountSettings;
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

struct Pair {
    alice: (String, String),
    bob: (String, String),
}

async fn pair(app: &TestApp) -> Pair {
    Pair {
        alice: app.signed_up("alice@example.com", "Alice").await,
        bob: app.signed_up("bob@example.com", "Bob").await,
    }
}

async fn next_event(rx: &mut broadcast::Receiver<ChatEvent>) -> ChatEvent {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("event in time")
        .expect("topic open")
}

#[tokio::test]
async fn message_flow_reaches_subscribers() {
    let app = spawn_app(AccountSettings::default());
    let Pair { alice, bob } = pair(&app).await;

    let (status, created) = app
        .post(
            "/dialogs",
            Some(&alice.1),
            json!({ "partner": bob.0, "text": "hi bob" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let dialog_id: Uuid = created["dialog"]["id"].as_str().unwrap().parse().unwrap();
    assert_eq!(created["message"]["unchecked"], true);

    let mut feed = app.hub.subscribe(dialog_id);

    let (status, message) = app
        .post(
            "/messages",
            Some(&alice.1),
            json!({ "dialog_id": dialog_id, "text": "are you there?" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(message["unchecked"], true);
    let message_id: Uuid = message["id"].as_str().unwrap().parse().unwrap();

    // The dialog's opening message may still be in flight; skip past it.
    loop {
        match next_event(&mut feed).await {
            ChatEvent::NewMessage { message } if message.id == message_id => {
                assert!(message.unchecked);
                break;
            }
            ChatEvent::NewMessage { .. } => continue,
            other => panic!("unexpected event {other:?}"),
        }
    }

    let uri = format!("/messages/{message_id}/read");
    let (status, read) = app.post(&uri, Some(&bob.1), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(read["unchecked"], false);

    match next_event(&mut feed).await {
        ChatEvent::MessagesRead {
            dialog_id: id,
            message_ids,
            ..
        } => {
            assert_eq!(id, dialog_id);
            assert_eq!(message_ids, vec![message_id]);
        }
        other => panic!("unexpected event {other:?}"),
    }

    // Second receipt is a no-op and publishes nothing.
    let (status, again) = app.post(&uri, Some(&bob.1), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["unchecked"], false);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(feed.try_recv().is_err());

    let (_, listed) = app
        .get(&format!("/messages?dialog={dialog_id}"), Some(&bob.1))
        .await;
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0]["text"], "hi bob");
    assert_eq!(listed[1]["unchecked"], false);
}

#[tokio::test]
async fn sender_cannot_mark_own_message_read() {
    let app = spawn_app(AccountSettings::default());
    let Pair { alice, bob } = pair(&app).await;
    let (_, created) = app
        .post("/dialogs", Some(&alice.1), json!({ "partner": bob.0, "text": "hello" }))
        .await;
    let message_id = created["message"]["id"].as_str().unwrap();

    let (status, message) = app
        .post(&format!("/messages/{message_id}/read"), Some(&alice.1), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(message["unchecked"], true);
}

#[tokio::test]
async fn dialog_read_marks_partner_messages() {
    let app = spawn_app(AccountSettings::default());
    let Pair { alice, bob } = pair(&app).await;
    let (_, created) = app
        .post("/dialogs", Some(&alice.1), json!({ "partner": bob.0, "text": "one" }))
        .await;
    let dialog_id = created["dialog"]["id"].as_str().unwrap().to_string();
    app.post(
        "/messages",
        Some(&alice.1),
        json!({ "dialog_id": dialog_id, "text": "two" }),
    )
    .await;
    app.post(
        "/messages",
        Some(&bob.1),
        json!({ "dialog_id": dialog_id, "text": "reply" }),
    )
    .await;

    let (status, body) = app
        .post(&format!("/dialogs/{dialog_id}/read"), Some(&bob.1), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["message_ids"].as_array().unwrap().len(), 2);

    let (_, body) = app
        .post(&format!("/dialogs/{dialog_id}/read"), Some(&bob.1), json!({}))
        .await;
    assert!(body["message_ids"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn outsiders_are_kept_out() {
    let app = spawn_app(AccountSettings::default());
    let Pair { alice, bob } = pair(&app).await;
    let (_, eve_token) = app.signed_up("eve@example.com", "Eve").await;
    let (_, created) = app
        .post("/dialogs", Some(&alice.1), json!({ "partner": bob.0, "text": "private" }))
        .await;
    let dialog_id = created["dialog"]["id"].as_str().unwrap();

    let (status, _) = app
        .get(&format!("/messages?dialog={dialog_id}"), Some(&eve_token))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .post(
            "/messages",
            Some(&eve_token),
            json!({ "dialog_id": dialog_id, "text": "let me in" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .get(&format!("/messages?dialog={}", Uuid::new_v4()), Some(&eve_token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn dialog_creation_rules() {
    let app = spawn_app(AccountSettings::default());
    let Pair { alice, bob } = pair(&app).await;

    let (status, _) = app
        .post("/dialogs", Some(&alice.1), json!({ "partner": alice.0, "text": "me" }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = app
        .post(
            "/dialogs",
            Some(&alice.1),
            json!({ "partner": Uuid::new_v4(), "text": "ghost" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .post("/dialogs", Some(&alice.1), json!({ "partner": bob.0, "text": "first" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .post("/dialogs", Some(&bob.1), json!({ "partner": alice.0, "text": "again" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, dialogs) = app.get("/dialogs", Some(&bob.1)).await;
    assert_eq!(dialogs.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn attachments_and_sent_listing() {
    let app = spawn_app(AccountSettings::default());
    let Pair { alice, bob } = pair(&app).await;
    let (_, created) = app
        .post("/dialogs", Some(&alice.1), json!({ "partner": bob.0, "text": "see file" }))
        .await;
    let message_id = created["message"]["id"].as_str().unwrap();
    let file = Uuid::new_v4();

    let uri = format!("/messages/{message_id}/attachments");
    let (status, _) = app.post(&uri, Some(&bob.1), json!({ "file": file })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, message) = app.post(&uri, Some(&alice.1), json!({ "file": file })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(message["attachments"], json!([file]));

    let (_, sent) = app.get("/messages/sent", Some(&alice.1)).await;
    assert_eq!(sent.as_array().unwrap().len(), 1);
    let (_, sent) = app.get("/messages/sent", Some(&bob.1)).await;
    assert!(sent.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn malformed_dialog_query_is_a_json_error() {
    let app = spawn_app(AccountSettings::default());
    let (_, token) = app.signed_up("alice@example.com", "Alice").await;

    let (status, body) = app
        .get("/messages?dialog=not-a-uuid", Some(&token))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["status"], "error");
    assert_eq!(body["errors"][0]["field"], "query");
}

#[tokio::test]
async fn deleted_account_takes_its_dialogs_along() {
    let app = spawn_app(AccountSettings::default());
    let Pair { alice, bob } = pair(&app).await;
    let (_, created) = app
        .post("/dialogs", Some(&alice.1), json!({ "partner": bob.0, "text": "bye soon" }))
        .await;
    let dialog_id = created["dialog"]["id"].as_str().unwrap().to_string();

    let (status, _) = app.delete(&format!("/user/{}", alice.0), Some(&alice.1)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, dialogs) = app.get("/dialogs", Some(&bob.1)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(dialogs.as_array().unwrap().is_empty());
    let (status, _) = app
        .get(&format!("/messages?dialog={dialog_id}"), Some(&bob.1))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
