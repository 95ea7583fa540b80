//! Web API File Tests
//!
//! Integration tests for upload, listing, the trash and star lifecycle,
//! search and storage accounting.

mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{names, spawn_app, spawn_app_with};

#[tokio::test]
async fn test_upload_and_list_root() {
    let app = spawn_app().await;
    let user = app.register("alice@example.com").await;

    let file = app.upload(&user, "Photo.JPG", b"jpeg bytes", None).await;
    assert_eq!(file["name"], "Photo.JPG");
    assert_eq!(file["kind"], "image");
    assert_eq!(file["extension"], "jpg");
    assert_eq!(file["size"], 10);
    assert!(file["folder_id"].is_null());
    assert!(file["url"]
        .as_str()
        .unwrap()
        .starts_with("http://localhost/objects/"));

    let response = app.get("/api/files", &user).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(names(&body["data"]), vec!["Photo.JPG"]);

    // `root` is the same as no folder.
    let body: Value = app.get("/api/files?folder=root", &user).await.json();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_upload_into_folder() {
    let app = spawn_app().await;
    let user = app.register("alice@example.com").await;
    let folder_id = app.create_folder(&user, "Docs", None).await;

    let file = app
        .upload(&user, "report.pdf", b"%PDF-1.4", Some(folder_id))
        .await;
    assert_eq!(file["folder_id"], folder_id);
    assert_eq!(file["kind"], "pdf");

    let body: Value = app
        .get(&format!("/api/files?folder={folder_id}"), &user)
        .await
        .json();
    assert_eq!(names(&body["data"]), vec!["report.pdf"]);

    // The root listing does not include it.
    let body: Value = app.get("/api/files", &user).await.json();
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_stores_object_on_disk() {
    let app = spawn_app().await;
    let user = app.register("alice@example.com").await;

    let file = app.upload(&user, "notes.txt", b"hello drive", None).await;
    let url = file["url"].as_str().unwrap();
    let object_id = url.rsplit('/').next().unwrap();

    let stored = std::fs::read(app.store.object_path(object_id)).unwrap();
    assert_eq!(stored, b"hello drive");
}

#[tokio::test]
async fn test_upload_without_file_field() {
    let app = spawn_app().await;
    let user = app.register("alice@example.com").await;

    let form = axum_test::multipart::MultipartForm::new().add_text("folder_id", "root");
    let response = app.post("/api/files/upload", &user).multipart(form).await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_requires_auth() {
    let app = spawn_app().await;

    let form = axum_test::multipart::MultipartForm::new().add_part(
        "file",
        axum_test::multipart::Part::bytes(b"data".to_vec()).file_name("a.txt"),
    );
    let response = app.server.post("/api/files/upload").multipart(form).await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_upload_into_foreign_folder_is_not_found() {
    let app = spawn_app().await;
    let alice = app.register("alice@example.com").await;
    let bob = app.register("bob@example.com").await;
    let folder_id = app.create_folder(&alice, "Private", None).await;

    let response = app
        .upload_request(&bob, "sneaky.txt", b"x", Some(folder_id))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_invalid_name() {
    let app = spawn_app().await;
    let user = app.register("alice@example.com").await;

    let response = app.upload_request(&user, "bad:name.txt", b"x", None).await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_over_quota() {
    let app = spawn_app_with(|config| config.drive.default_storage_limit = 10).await;
    let user = app.register("alice@example.com").await;

    app.upload(&user, "small.txt", b"12345", None).await;
    let response = app.upload_request(&user, "big.txt", b"123456", None).await;

    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    let body: Value = response.json();
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .starts_with("Storage quota exceeded"));

    // Exactly filling the quota is fine.
    app.upload(&user, "exact.txt", b"12345", None).await;
}

#[tokio::test]
async fn test_upload_body_limit() {
    let app = spawn_app_with(|config| config.drive.max_upload_size_mb = 1).await;
    let user = app.register("alice@example.com").await;

    let content = vec![0u8; 2 * 1024 * 1024];
    let response = app.upload_request(&user, "huge.bin", &content, None).await;

    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_get_file_and_download() {
    let app = spawn_app().await;
    let user = app.register("alice@example.com").await;
    let file = app.upload(&user, "clip.mp4", b"video", None).await;
    let id = file["id"].as_i64().unwrap();

    let body: Value = app.get(&format!("/api/files/{id}"), &user).await.json();
    assert_eq!(body["data"]["name"], "clip.mp4");
    assert_eq!(body["data"]["kind"], "video");

    let response = app.get(&format!("/api/files/{id}/download"), &user).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["filename"], "clip.mp4");
    assert_eq!(body["data"]["kind"], "video");
    assert_eq!(body["data"]["url"], file["url"]);
}

#[tokio::test]
async fn test_get_missing_file() {
    let app = spawn_app().await;
    let user = app.register("alice@example.com").await;

    let response = app.get("/api/files/9999", &user).await;

    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"]["message"], "File not found");
}

#[tokio::test]
async fn test_rename_updates_kind() {
    let app = spawn_app().await;
    let user = app.register("alice@example.com").await;
    let file = app.upload(&user, "scan.pdf", b"data", None).await;
    let id = file["id"].as_i64().unwrap();

    let response = app
        .put(&format!("/api/files/{id}/rename"), &user)
        .json(&json!({ "name": "  scan.png  " }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["message"], "File renamed");
    assert_eq!(body["data"]["file"]["name"], "scan.png");
    assert_eq!(body["data"]["file"]["kind"], "image");
    assert_eq!(body["data"]["file"]["extension"], "png");
}

#[tokio::test]
async fn test_rename_rejects_invalid_names() {
    let app = spawn_app().await;
    let user = app.register("alice@example.com").await;
    let file = app.upload(&user, "a.txt", b"data", None).await;
    let id = file["id"].as_i64().unwrap();

    for name in ["", "   ", "a/b.txt", "what?.txt"] {
        let response = app
            .put(&format!("/api/files/{id}/rename"), &user)
            .json(&json!({ "name": name }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    let long = "x".repeat(256);
    app.put(&format!("/api/files/{id}/rename"), &user)
        .json(&json!({ "name": long }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_move_file_between_folders() {
    let app = spawn_app().await;
    let user = app.register("alice@example.com").await;
    let folder_id = app.create_folder(&user, "Archive", None).await;
    let file = app.upload(&user, "old.txt", b"data", None).await;
    let id = file["id"].as_i64().unwrap();

    let body: Value = app
        .put(&format!("/api/files/{id}/move"), &user)
        .json(&json!({ "folder_id": folder_id }))
        .await
        .json();
    assert_eq!(body["data"]["file"]["folder_id"], folder_id);

    let body: Value = app
        .put(&format!("/api/files/{id}/move"), &user)
        .json(&json!({ "folder_id": null }))
        .await
        .json();
    assert!(body["data"]["file"]["folder_id"].is_null());
}

#[tokio::test]
async fn test_move_file_to_missing_folder() {
    let app = spawn_app().await;
    let user = app.register("alice@example.com").await;
    let file = app.upload(&user, "a.txt", b"data", None).await;
    let id = file["id"].as_i64().unwrap();

    app.put(&format!("/api/files/{id}/move"), &user)
        .json(&json!({ "folder_id": 4242 }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_trash_and_restore() {
    let app = spawn_app().await;
    let user = app.register("alice@example.com").await;
    let file = app.upload(&user, "draft.txt", b"data", None).await;
    let id = file["id"].as_i64().unwrap();

    let body: Value = app
        .put(&format!("/api/files/{id}/trash"), &user)
        .await
        .json();
    assert_eq!(body["data"]["file"]["is_deleted"], true);
    assert!(body["data"]["file"]["deleted_at"].is_string());

    // Hidden from listings but still reachable by id.
    let listing: Value = app.get("/api/files", &user).await.json();
    assert!(listing["data"].as_array().unwrap().is_empty());
    let trash: Value = app.get("/api/files/trash/all", &user).await.json();
    assert_eq!(names(&trash["data"]), vec!["draft.txt"]);
    app.get(&format!("/api/files/{id}"), &user)
        .await
        .assert_status_ok();

    // Trashing twice is not possible.
    app.put(&format!("/api/files/{id}/trash"), &user)
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let body: Value = app
        .put(&format!("/api/files/{id}/restore"), &user)
        .await
        .json();
    assert_eq!(body["data"]["file"]["is_deleted"], false);
    assert!(body["data"]["file"]["deleted_at"].is_null());

    let listing: Value = app.get("/api/files", &user).await.json();
    assert_eq!(names(&listing["data"]), vec!["draft.txt"]);

    // Restoring an active file is not possible.
    app.put(&format!("/api/files/{id}/restore"), &user)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_is_soft() {
    let app = spawn_app().await;
    let user = app.register("alice@example.com").await;
    let file = app.upload(&user, "a.txt", b"data", None).await;
    let id = file["id"].as_i64().unwrap();

    app.delete(&format!("/api/files/{id}"), &user)
        .await
        .assert_status_ok();

    let trash: Value = app.get("/api/files/trash/all", &user).await.json();
    assert_eq!(names(&trash["data"]), vec!["a.txt"]);
}

#[tokio::test]
async fn test_permanent_delete() {
    let app = spawn_app().await;
    let user = app.register("alice@example.com").await;
    let file = app.upload(&user, "gone.txt", b"data", None).await;
    let id = file["id"].as_i64().unwrap();
    let object_id = file["url"].as_str().unwrap().rsplit('/').next().unwrap().to_string();

    // Only trashed files can be purged.
    app.delete(&format!("/api/files/{id}/permanent"), &user)
        .await
        .assert_status(StatusCode::NOT_FOUND);

    app.put(&format!("/api/files/{id}/trash"), &user)
        .await
        .assert_status_ok();
    app.delete(&format!("/api/files/{id}/permanent"), &user)
        .await
        .assert_status_ok();

    app.get(&format!("/api/files/{id}"), &user)
        .await
        .assert_status(StatusCode::NOT_FOUND);
    assert!(!app.store.object_path(&object_id).exists());
}

#[tokio::test]
async fn test_empty_trash() {
    let app = spawn_app().await;
    let user = app.register("alice@example.com").await;
    let keep = app.upload(&user, "keep.txt", b"k", None).await;
    for name in ["one.txt", "two.txt"] {
        let file = app.upload(&user, name, b"x", None).await;
        let id = file["id"].as_i64().unwrap();
        app.put(&format!("/api/files/{id}/trash"), &user)
            .await
            .assert_status_ok();
    }

    let response = app.delete("/api/files/trash/empty", &user).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["deleted"], 2);

    let trash: Value = app.get("/api/files/trash/all", &user).await.json();
    assert!(trash["data"].as_array().unwrap().is_empty());
    app.get(&format!("/api/files/{}", keep["id"]), &user)
        .await
        .assert_status_ok();

    // Emptying an empty trash is fine.
    let body: Value = app.delete("/api/files/trash/empty", &user).await.json();
    assert_eq!(body["data"]["deleted"], 0);
}

#[tokio::test]
async fn test_star_toggle() {
    let app = spawn_app().await;
    let user = app.register("alice@example.com").await;
    let file = app.upload(&user, "fav.txt", b"data", None).await;
    let id = file["id"].as_i64().unwrap();

    let body: Value = app
        .put(&format!("/api/files/{id}/star"), &user)
        .await
        .json();
    assert_eq!(body["data"]["message"], "File starred");
    assert_eq!(body["data"]["file"]["is_starred"], true);
    assert!(body["data"]["file"]["starred_at"].is_string());

    let starred: Value = app.get("/api/files/starred/all", &user).await.json();
    assert_eq!(names(&starred["data"]), vec!["fav.txt"]);

    let body: Value = app
        .put(&format!("/api/files/{id}/star"), &user)
        .await
        .json();
    assert_eq!(body["data"]["message"], "File unstarred");
    assert_eq!(body["data"]["file"]["is_starred"], false);
    assert!(body["data"]["file"]["starred_at"].is_null());

    let starred: Value = app.get("/api/files/starred/all", &user).await.json();
    assert!(starred["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_recent_excludes_trash() {
    let app = spawn_app().await;
    let user = app.register("alice@example.com").await;
    app.upload(&user, "first.txt", b"1", None).await;
    let second = app.upload(&user, "second.txt", b"2", None).await;
    app.upload(&user, "third.txt", b"3", None).await;

    app.put(&format!("/api/files/{}/trash", second["id"]), &user)
        .await
        .assert_status_ok();

    let recent: Value = app.get("/api/files/recent/all", &user).await.json();
    assert_eq!(names(&recent["data"]), vec!["third.txt", "first.txt"]);
}

#[tokio::test]
async fn test_search() {
    let app = spawn_app().await;
    let alice = app.register("alice@example.com").await;
    let bob = app.register("bob@example.com").await;

    let older = app.upload(&alice, "Quarterly Report.pdf", b"1", None).await;
    app.upload(&alice, "report-draft.txt", b"2", None).await;
    let trashed = app.upload(&alice, "old report.txt", b"3", None).await;
    app.upload(&alice, "holiday.jpg", b"4", None).await;
    app.upload(&bob, "bob report.txt", b"5", None).await;

    app.put(&format!("/api/files/{}/trash", trashed["id"]), &alice)
        .await
        .assert_status_ok();
    // Touch the older file so it becomes the most recently updated.
    app.put(&format!("/api/files/{}/rename", older["id"]), &alice)
        .json(&json!({ "name": "Quarterly REPORT.pdf" }))
        .await
        .assert_status_ok();

    let response = app.get("/api/files/search/query?q=report", &alice).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(
        names(&body["data"]),
        vec!["Quarterly REPORT.pdf", "report-draft.txt"]
    );
}

#[tokio::test]
async fn test_search_requires_query() {
    let app = spawn_app().await;
    let user = app.register("alice@example.com").await;

    app.get("/api/files/search/query?q=", &user)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    app.get("/api/files/search/query", &user)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_usage() {
    let app = spawn_app().await;
    let user = app.register("alice@example.com").await;
    app.upload(&user, "a.txt", b"12345", None).await;
    let b = app.upload(&user, "b.txt", b"123", None).await;
    app.put(&format!("/api/files/{}/trash", b["id"]), &user)
        .await
        .assert_status_ok();

    let response = app.get("/api/files/usage/me", &user).await;
    response.assert_status_ok();
    let body: Value = response.json();
    let limit = 5_i64 * 1024 * 1024 * 1024;
    // Trashed files still count.
    assert_eq!(body["data"]["used"], 8);
    assert_eq!(body["data"]["trashed"], 3);
    assert_eq!(body["data"]["limit"], limit);
    assert_eq!(body["data"]["available"], limit - 8);
}

#[tokio::test]
async fn test_other_users_file_is_forbidden() {
    let app = spawn_app().await;
    let alice = app.register("alice@example.com").await;
    let bob = app.register("bob@example.com").await;
    let file = app.upload(&alice, "secret.txt", b"data", None).await;
    let id = file["id"].as_i64().unwrap();

    app.get(&format!("/api/files/{id}"), &bob)
        .await
        .assert_status(StatusCode::FORBIDDEN);
    app.server
        .get(&format!("/api/files/{id}"))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    // Owner-only operations do not reveal the file.
    app.put(&format!("/api/files/{id}/trash"), &bob)
        .await
        .assert_status(StatusCode::NOT_FOUND);
    app.put(&format!("/api/files/{id}/star"), &bob)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
