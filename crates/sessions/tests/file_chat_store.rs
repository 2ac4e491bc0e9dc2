//! The on-disk store as the chat runtime sees it.

use serde_json::json;
use tc_domain::chat::ChatMessage;
use tc_domain::error::Error;
use tc_domain::tool::Role;
use tc_sessions::{ChatStore, FileChatStore};

#[tokio::test]
async fn messages_persist_with_session_scoped_ids() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileChatStore::open(dir.path()).unwrap();
    let session = store.create_session("ana", Some("lisa".into()), None).await.unwrap();

    let mut user = ChatMessage::new(Role::User, "how are views?");
    user.json_name = Some("chan.json".into());
    store.append_message(&session.id, &user).await.unwrap();
    store
        .append_message(&session.id, &ChatMessage::new(Role::Model, "Views are up."))
        .await
        .unwrap();

    let reopened = FileChatStore::open(dir.path()).unwrap();
    let msgs = reopened.list_messages(&session.id).await.unwrap();
    assert_eq!(msgs.len(), 2);
    assert_eq!(msgs[0].id, format!("{}-0", session.id));
    assert_eq!(msgs[0].json_name.as_deref(), Some("chan.json"));
    assert_eq!(msgs[1].content, "Views are up.");

    let listed = reopened.list_sessions("ana").await.unwrap();
    assert_eq!(listed[0].message_count, 2);
    assert_eq!(reopened.session_count().await, 1);
}

#[tokio::test]
async fn appending_to_unknown_session_fails() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileChatStore::open(dir.path()).unwrap();
    let err = store
        .append_message("missing", &ChatMessage::new(Role::User, "x"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn deleting_removes_session_and_transcript() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileChatStore::open(dir.path()).unwrap();
    let s = store.create_session("ana", None, None).await.unwrap();
    store.append_message(&s.id, &ChatMessage::new(Role::User, "x")).await.unwrap();
    store.delete_session(&s.id).await.unwrap();
    assert!(store.list_sessions("ana").await.unwrap().is_empty());
    assert!(store.list_messages(&s.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn json_blobs_and_images_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileChatStore::open(dir.path()).unwrap();
    let id = store.upload_json_blob(&json!({"videos": []})).await.unwrap();
    assert_eq!(store.fetch_json_blob(&id).await.unwrap(), json!({"videos": []}));

    let image = store.put_image("image/png", "AQID").await.unwrap();
    assert!(image.url.starts_with("/api/images/"));
    let file = image.url.rsplit('/').next().unwrap();
    let (bytes, mime) = store.fetch_image(file).await.unwrap();
    assert_eq!(bytes, vec![1, 2, 3]);
    assert_eq!(mime, "image/png");
}
