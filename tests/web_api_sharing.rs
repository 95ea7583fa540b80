//! Web API Sharing Tests
//!
//! Integration tests for per-user shares and public links on files and
//! folders.

mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{names, spawn_app};

#[tokio::test]
async fn test_share_file_by_email() {
    let app = spawn_app().await;
    let alice = app.register("alice@example.com").await;
    let bob = app.register("bob@example.com").await;
    let file = app.upload(&alice, "plan.txt", b"data", None).await;
    let id = file["id"].as_i64().unwrap();

    let response = app
        .post(&format!("/api/files/{id}/share"), &alice)
        .json(&json!({ "user_email": "BOB@example.com", "permission": "viewer" }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["message"], "File shared");
    let shares = &body["data"]["file"]["shared_with"];
    assert_eq!(shares.as_array().unwrap().len(), 1);
    assert_eq!(shares[0]["user_id"], bob.id);
    assert_eq!(shares[0]["email"], "bob@example.com");
    assert_eq!(shares[0]["permission"], "viewer");

    let shared: Value = app.get("/api/files/shared/me", &bob).await.json();
    assert_eq!(names(&shared["data"]), vec!["plan.txt"]);
    assert_eq!(shared["data"][0]["owner"]["id"], alice.id);
    assert_eq!(shared["data"][0]["owner"]["email"], "alice@example.com");

    // The owner's own shared list is unaffected.
    let shared: Value = app.get("/api/files/shared/me", &alice).await.json();
    assert!(shared["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_viewer_reads_but_cannot_rename() {
    let app = spawn_app().await;
    let alice = app.register("alice@example.com").await;
    let bob = app.register("bob@example.com").await;
    let file = app.upload(&alice, "plan.txt", b"data", None).await;
    let id = file["id"].as_i64().unwrap();
    app.share(&alice, "files", id, &bob, "viewer").await;

    app.get(&format!("/api/files/{id}"), &bob)
        .await
        .assert_status_ok();
    app.get(&format!("/api/files/{id}/download"), &bob)
        .await
        .assert_status_ok();

    app.put(&format!("/api/files/{id}/rename"), &bob)
        .json(&json!({ "name": "mine.txt" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_editor_can_rename() {
    let app = spawn_app().await;
    let alice = app.register("alice@example.com").await;
    let bob = app.register("bob@example.com").await;
    let file = app.upload(&alice, "plan.txt", b"data", None).await;
    let id = file["id"].as_i64().unwrap();
    app.share(&alice, "files", id, &bob, "editor").await;

    let body: Value = app
        .put(&format!("/api/files/{id}/rename"), &bob)
        .json(&json!({ "name": "plan-v2.txt" }))
        .await
        .json();
    assert_eq!(body["data"]["file"]["name"], "plan-v2.txt");
    assert_eq!(body["data"]["file"]["owner_id"], alice.id);

    // Editors still cannot trash, move or reshare.
    app.put(&format!("/api/files/{id}/trash"), &bob)
        .await
        .assert_status(StatusCode::NOT_FOUND);
    app.post(&format!("/api/files/{id}/share"), &bob)
        .json(&json!({ "user_email": "alice@example.com", "permission": "viewer" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reshare_updates_permission() {
    let app = spawn_app().await;
    let alice = app.register("alice@example.com").await;
    let bob = app.register("bob@example.com").await;
    let file = app.upload(&alice, "plan.txt", b"data", None).await;
    let id = file["id"].as_i64().unwrap();

    app.share(&alice, "files", id, &bob, "viewer").await;
    app.share(&alice, "files", id, &bob, "editor").await;

    let body: Value = app.get(&format!("/api/files/{id}"), &alice).await.json();
    let shares = body["data"]["shared_with"].as_array().unwrap();
    assert_eq!(shares.len(), 1);
    assert_eq!(shares[0]["permission"], "editor");
}

#[tokio::test]
async fn test_share_by_user_id() {
    let app = spawn_app().await;
    let alice = app.register("alice@example.com").await;
    let bob = app.register("bob@example.com").await;
    let file = app.upload(&alice, "plan.txt", b"data", None).await;
    let id = file["id"].as_i64().unwrap();

    app.post(&format!("/api/files/{id}/share"), &alice)
        .json(&json!({ "user_id": bob.id, "permission": "viewer" }))
        .await
        .assert_status_ok();

    app.get(&format!("/api/files/{id}"), &bob)
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_share_errors() {
    let app = spawn_app().await;
    let alice = app.register("alice@example.com").await;
    let file = app.upload(&alice, "plan.txt", b"data", None).await;
    let id = file["id"].as_i64().unwrap();

    // With yourself.
    app.post(&format!("/api/files/{id}/share"), &alice)
        .json(&json!({ "user_email": "alice@example.com", "permission": "viewer" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    // Unknown user.
    app.post(&format!("/api/files/{id}/share"), &alice)
        .json(&json!({ "user_email": "ghost@example.com", "permission": "viewer" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    // No target.
    app.post(&format!("/api/files/{id}/share"), &alice)
        .json(&json!({ "permission": "viewer" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    // Unknown permission.
    let response = app
        .post(&format!("/api/files/{id}/share"), &alice)
        .json(&json!({ "user_email": "bob@example.com", "permission": "owner" }))
        .await;
    assert!(response.status_code().is_client_error());
}

#[tokio::test]
async fn test_unshare_file() {
    let app = spawn_app().await;
    let alice = app.register("alice@example.com").await;
    let bob = app.register("bob@example.com").await;
    let file = app.upload(&alice, "plan.txt", b"data", None).await;
    let id = file["id"].as_i64().unwrap();
    app.share(&alice, "files", id, &bob, "viewer").await;

    let response = app
        .delete(&format!("/api/files/{id}/share/{}", bob.id), &alice)
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["message"], "Share removed");
    assert_eq!(body["data"]["file"]["shared_with"], json!([]));

    app.get(&format!("/api/files/{id}"), &bob)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    // A second removal finds nothing.
    app.delete(&format!("/api/files/{id}/share/{}", bob.id), &alice)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_public_file_link() {
    let app = spawn_app().await;
    let alice = app.register("alice@example.com").await;
    let file = app.upload(&alice, "flyer.pdf", b"%PDF", None).await;
    let id = file["id"].as_i64().unwrap();

    let response = app.post(&format!("/api/files/{id}/public"), &alice).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["message"], "Public link created");
    assert_eq!(body["data"]["file"]["is_public"], true);
    assert_eq!(
        body["data"]["file"]["public_link"],
        format!("http://drive.test/shared/file/{id}")
    );

    // Anyone can read it now.
    let response = app.server.get(&format!("/api/files/public/{id}")).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["name"], "flyer.pdf");
    assert_eq!(body["data"]["owner"]["name"], "alice");

    let response = app
        .server
        .get(&format!("/api/files/public/{id}/download"))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["filename"], "flyer.pdf");

    app.server
        .get(&format!("/api/files/{id}"))
        .await
        .assert_status_ok();

    let response = app.delete(&format!("/api/files/{id}/public"), &alice).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["message"], "Public link removed");
    assert_eq!(body["data"]["file"]["is_public"], false);
    assert!(body["data"]["file"].get("public_link").is_none());

    app.server
        .get(&format!("/api/files/public/{id}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    app.server
        .get(&format!("/api/files/{id}"))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_trashed_public_file_is_hidden() {
    let app = spawn_app().await;
    let alice = app.register("alice@example.com").await;
    let file = app.upload(&alice, "flyer.pdf", b"%PDF", None).await;
    let id = file["id"].as_i64().unwrap();
    app.post(&format!("/api/files/{id}/public"), &alice)
        .await
        .assert_status_ok();

    app.put(&format!("/api/files/{id}/trash"), &alice)
        .await
        .assert_status_ok();

    app.server
        .get(&format!("/api/files/public/{id}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_only_owner_publishes() {
    let app = spawn_app().await;
    let alice = app.register("alice@example.com").await;
    let bob = app.register("bob@example.com").await;
    let file = app.upload(&alice, "plan.txt", b"data", None).await;
    let id = file["id"].as_i64().unwrap();
    app.share(&alice, "files", id, &bob, "editor").await;

    app.post(&format!("/api/files/{id}/public"), &bob)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_share_folder() {
    let app = spawn_app().await;
    let alice = app.register("alice@example.com").await;
    let bob = app.register("bob@example.com").await;
    let carol = app.register("carol@example.com").await;
    let folder = app.create_folder(&alice, "Team", None).await;
    app.create_folder(&alice, "Specs", Some(folder)).await;
    app.upload(&alice, "roadmap.txt", b"r", Some(folder)).await;

    let response = app
        .post(&format!("/api/folders/{folder}/share"), &alice)
        .json(&json!({ "user_email": bob.email, "permission": "editor" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["message"], "Folder shared");
    assert_eq!(body["data"]["folder"]["shared_with"][0]["user_id"], bob.id);

    let shared: Value = app.get("/api/folders/shared/me", &bob).await.json();
    assert_eq!(names(&shared["data"]), vec!["Team"]);

    // The share target sees the owner's children.
    let contents: Value = app
        .get(&format!("/api/folders/{folder}/contents"), &bob)
        .await
        .json();
    assert_eq!(names(&contents["data"]["folders"]), vec!["Specs"]);
    assert_eq!(names(&contents["data"]["files"]), vec!["roadmap.txt"]);

    // Editors may rename.
    app.put(&format!("/api/folders/{folder}/rename"), &bob)
        .json(&json!({ "name": "Team Space" }))
        .await
        .assert_status_ok();

    // Others may not look.
    app.get(&format!("/api/folders/{folder}/contents"), &carol)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let body: Value = app
        .delete(&format!("/api/folders/{folder}/share/{}", bob.id), &alice)
        .await
        .json();
    assert_eq!(body["data"]["message"], "Share removed");
    app.get(&format!("/api/folders/{folder}"), &bob)
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_public_folder() {
    let app = spawn_app().await;
    let alice = app.register("alice@example.com").await;
    let folder = app.create_folder(&alice, "Gallery", None).await;

    let body: Value = app
        .post(&format!("/api/folders/{folder}/public"), &alice)
        .await
        .json();
    assert_eq!(body["data"]["message"], "Public link created");
    assert_eq!(
        body["data"]["folder"]["public_link"],
        format!("http://drive.test/shared/folder/{folder}")
    );

    let response = app.server.get(&format!("/api/folders/{folder}")).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["name"], "Gallery");

    let body: Value = app
        .delete(&format!("/api/folders/{folder}/public"), &alice)
        .await
        .json();
    assert_eq!(body["data"]["message"], "Public link removed");
    assert_eq!(body["data"]["folder"]["is_public"], false);

    app.server
        .get(&format!("/api/folders/{folder}"))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_trashed_file_download_is_owner_only() {
    let app = spawn_app().await;
    let alice = app.register("alice@example.com").await;
    let bob = app.register("bob@example.com").await;

    let flyer = app.upload(&alice, "flyer.pdf", b"%PDF", None).await;
    let flyer_id = flyer["id"].as_i64().unwrap();
    app.post(&format!("/api/files/{flyer_id}/public"), &alice)
        .await
        .assert_status_ok();
    app.put(&format!("/api/files/{flyer_id}/trash"), &alice)
        .await
        .assert_status_ok();

    let secret = app.upload(&alice, "secret.pdf", b"%PDF", None).await;
    let secret_id = secret["id"].as_i64().unwrap();
    app.share(&alice, "files", secret_id, &bob, "viewer").await;
    app.put(&format!("/api/files/{secret_id}/trash"), &alice)
        .await
        .assert_status_ok();

    // Anonymous downloads go through the public route only.
    app.server
        .get(&format!("/api/files/public/{flyer_id}/download"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    app.server
        .get(&format!("/api/files/{flyer_id}/download"))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    // A share target loses the download once the file is trashed.
    app.get(&format!("/api/files/{secret_id}/download"), &bob)
        .await
        .assert_status(StatusCode::NOT_FOUND);
    app.get(&format!("/api/files/{flyer_id}/download"), &bob)
        .await
        .assert_status(StatusCode::NOT_FOUND);

    // The owner still can.
    let body: Value = app
        .get(&format!("/api/files/{secret_id}/download"), &alice)
        .await
        .json();
    assert_eq!(body["data"]["filename"], "secret.pdf");
}
