//! Router tests against an in-memory database

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use serde_json::{json, Value};
use tempfile::TempDir;

use paperdesk::api::{build_router, AppState};
use paperdesk::config::Config;
use paperdesk::db::{create_test_pool, migrations};

const ADMIN_PASSWORD: &str = "correct-horse-battery";

struct TestApp {
    server: TestServer,
    _store_dir: TempDir,
}

async fn spawn_app() -> TestApp {
    let store_dir = TempDir::new().unwrap();

    let mut config = Config::default();
    config.storage.path = store_dir.path().to_path_buf();
    config.admin.password = ADMIN_PASSWORD.to_string();
    config.newsletter.secret = "test-secret".to_string();

    let pool = create_test_pool().await.unwrap();
    migrations::run_migrations(&pool).await.unwrap();

    let state = AppState::new(config, pool).await.unwrap();
    let server = TestServer::new(build_router(state)).unwrap();
    TestApp {
        server,
        _store_dir: store_dir,
    }
}

async fn login(app: &TestApp) -> String {
    let response = app
        .server
        .post("/api/v1/auth/login")
        .json(&json!({ "username": "admin", "password": ADMIN_PASSWORD }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    body["token"].as_str().unwrap().to_string()
}

/// One-page PDF showing `label`
fn pdf_with_text(label: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 18.into()]),
            Operation::new("Td", vec![72.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal(label)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

fn pdf_data_uri(bytes: &[u8]) -> String {
    format!("data:application/pdf;base64,{}", STANDARD.encode(bytes))
}

fn decode_data_uri(uri: &str) -> Vec<u8> {
    let (_, payload) = uri.split_once(";base64,").unwrap();
    STANDARD.decode(payload).unwrap()
}

// ============================================================================
// Health and errors
// ============================================================================

#[tokio::test]
async fn test_health() {
    let app = spawn_app().await;
    let response = app.server.get("/api/v1/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "ok");
}

#[tokio::test]
async fn test_boots_from_default_config() {
    let store_dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.storage.path = store_dir.path().to_path_buf();

    let pool = create_test_pool().await.unwrap();
    migrations::run_migrations(&pool).await.unwrap();

    let state = AppState::new(config, pool).await.unwrap();
    let server = TestServer::new(build_router(state)).unwrap();
    server.get("/api/v1/health").await.assert_status_ok();
}

#[tokio::test]
async fn test_errors_are_flat_json() {
    let app = spawn_app().await;
    let response = app.server.get("/api/v1/does-not-exist").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    let keys: Vec<&String> = body.as_object().unwrap().keys().collect();
    assert_eq!(keys.len(), 2, "unexpected body: {}", body);
    assert_eq!(body["code"], "NOT_FOUND");
    assert!(body["error"].is_string());
}

// ============================================================================
// Tools
// ============================================================================

#[tokio::test]
async fn test_tool_list() {
    let app = spawn_app().await;
    let response = app.server.get("/api/v1/tools").await;
    response.assert_status_ok();
    let body: Value = response.json();

    assert_eq!(body["ai_available"], false);
    let tools = body["tools"].as_array().unwrap();
    let merge = tools.iter().find(|t| t["slug"] == "merge-pdf").unwrap();
    assert_eq!(merge["min_files"], 2);
    assert_eq!(merge["enabled"], true);
    let ai = tools.iter().find(|t| t["slug"] == "ai-ocr").unwrap();
    assert_eq!(ai["enabled"], false);
}

#[tokio::test]
async fn test_merge_pdf_with_data_uris() {
    let app = spawn_app().await;
    let files = vec![
        pdf_data_uri(&pdf_with_text("First")),
        pdf_data_uri(&pdf_with_text("Second")),
    ];

    let response = app
        .server
        .post("/api/v1/tools/merge-pdf")
        .json(&json!({ "files": files }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();

    assert_eq!(body["tool"], "merge-pdf");
    let result = body["result"].as_str().unwrap();
    assert!(result.starts_with("data:application/pdf;base64,"));
    assert_eq!(body["files"][0]["name"], "merged.pdf");

    let merged = Document::load_mem(&decode_data_uri(result)).unwrap();
    assert_eq!(merged.get_pages().len(), 2);
    assert!(body["stats"]["input_bytes"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_tool_rejects_bad_input() {
    let app = spawn_app().await;

    let response = app
        .server
        .post("/api/v1/tools/pdf-info")
        .json(&json!({ "files": ["not a data uri"] }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALIDATION_ERROR");

    // Too few files
    let response = app
        .server
        .post("/api/v1/tools/merge-pdf")
        .json(&json!({ "files": [pdf_data_uri(&pdf_with_text("Only"))] }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = app
        .server
        .post("/api/v1/tools/fax-pdf")
        .json(&json!({ "files": [] }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_voter_extract_multipart() {
    let app = spawn_app().await;
    let roll = "1 ABC1234567\nName : Ravi Kumar\nFather's Name : Mohan Kumar\nHouse Number : 12\nAge : 34 Gender : Male\n";

    let form = MultipartForm::new()
        .add_part(
            "file",
            Part::bytes(roll.as_bytes().to_vec())
                .file_name("roll.txt")
                .mime_type("text/plain"),
        )
        .add_text("options", "{}");

    let response = app.server.post("/api/v1/tools/voter-extract").multipart(form).await;
    response.assert_status_ok();
    let body: Value = response.json();

    assert_eq!(body["data"]["count"], 1);
    let record = &body["data"]["records"][0];
    assert_eq!(record["epic"], "ABC1234567");
    assert_eq!(record["name"], "Ravi Kumar");
    assert_eq!(record["relative_name"], "Mohan Kumar");
    assert_eq!(record["age"], 34);
}

#[tokio::test]
async fn test_disabled_tool_is_forbidden() {
    let app = spawn_app().await;
    let token = login(&app).await;

    app.server
        .put("/api/v1/admin/settings/tools")
        .authorization_bearer(&token)
        .json(&json!({ "disabled": ["pdf-info"] }))
        .await
        .assert_status_ok();

    let response = app
        .server
        .post("/api/v1/tools/pdf-info")
        .json(&json!({ "files": [pdf_data_uri(&pdf_with_text("x"))] }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    // Unknown slugs cannot be saved
    app.server
        .put("/api/v1/admin/settings/tools")
        .authorization_bearer(&token)
        .json(&json!({ "disabled": ["fax-pdf"] }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_tool_runs_are_counted() {
    let app = spawn_app().await;
    app.server
        .post("/api/v1/tools/pdf-info")
        .json(&json!({ "files": [pdf_data_uri(&pdf_with_text("x"))] }))
        .await
        .assert_status_ok();

    let token = login(&app).await;
    let response = app
        .server
        .get("/api/v1/admin/dashboard")
        .authorization_bearer(&token)
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["tool_runs_30d"], 1);

    let response = app
        .server
        .get("/api/v1/admin/stats")
        .add_query_param("days", 7)
        .authorization_bearer(&token)
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["usage"]["total"], 1);
    assert!(body["system"]["total_requests"].as_u64().unwrap() >= 1);
}

// ============================================================================
// Auth
// ============================================================================

#[tokio::test]
async fn test_admin_requires_session() {
    let app = spawn_app().await;

    let response = app.server.get("/api/v1/admin/dashboard").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["code"], "UNAUTHORIZED");

    app.server
        .get("/api/v1/admin/posts")
        .authorization_bearer("not-a-session")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_me_logout() {
    let app = spawn_app().await;

    app.server
        .post("/api/v1/auth/login")
        .json(&json!({ "username": "admin", "password": "wrong-password" }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let response = app
        .server
        .post("/api/v1/auth/login")
        .json(&json!({ "username": "admin", "password": ADMIN_PASSWORD }))
        .await;
    response.assert_status_ok();
    let cookie = response.header("set-cookie");
    assert!(cookie.to_str().unwrap().starts_with("session="));
    let token = response.json::<Value>()["token"].as_str().unwrap().to_string();

    let response = app.server.get("/api/v1/auth/me").authorization_bearer(&token).await;
    response.assert_status_ok();
    let me: Value = response.json();
    assert_eq!(me["username"], "admin");
    assert_eq!(me["role"], "superadmin");

    app.server
        .post("/api/v1/auth/logout")
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    app.server
        .get("/api/v1/auth/me")
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

// ============================================================================
// CMS
// ============================================================================

#[tokio::test]
async fn test_blog_publish_flow() {
    let app = spawn_app().await;
    let token = login(&app).await;

    let response = app
        .server
        .post("/api/v1/admin/posts")
        .authorization_bearer(&token)
        .json(&json!({
            "title": "How to Merge PDFs",
            "content": "Use the **merge** tool.",
            "tags": ["PDF", "Guides"]
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let post: Value = response.json();
    let id = post["id"].as_i64().unwrap();
    let slug = post["slug"].as_str().unwrap().to_string();
    assert_eq!(slug, "how-to-merge-pdfs");
    assert_eq!(post["status"], "draft");

    // Drafts are invisible
    app.server
        .get(&format!("/api/v1/blog/{}", slug))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    // Duplicate slug
    app.server
        .post("/api/v1/admin/posts")
        .authorization_bearer(&token)
        .json(&json!({ "title": "How to merge PDFs", "content": "Again" }))
        .await
        .assert_status(StatusCode::CONFLICT);

    app.server
        .put(&format!("/api/v1/admin/posts/{}/status", id))
        .authorization_bearer(&token)
        .json(&json!({ "status": "published" }))
        .await
        .assert_status_ok();

    let response = app.server.get(&format!("/api/v1/blog/{}", slug)).await;
    response.assert_status_ok();
    let public: Value = response.json();
    assert_eq!(public["view_count"], 1);
    assert!(public["content_html"].as_str().unwrap().contains("<strong>merge</strong>"));

    // Served from cache, counter still current
    let again: Value = app.server.get(&format!("/api/v1/blog/{}", slug)).await.json();
    assert_eq!(again["view_count"], 2);

    let response = app.server.get("/api/v1/blog").add_query_param("tag", "pdf").await;
    response.assert_status_ok();
    let list: Value = response.json();
    assert_eq!(list["total"], 1);
}

#[tokio::test]
async fn test_scheduling_needs_a_future_time() {
    let app = spawn_app().await;
    let token = login(&app).await;

    let post: Value = app
        .server
        .post("/api/v1/admin/pages")
        .authorization_bearer(&token)
        .json(&json!({ "title": "Privacy", "content": "We keep nothing." }))
        .await
        .json();

    app.server
        .put(&format!("/api/v1/admin/pages/{}/status", post["id"]))
        .authorization_bearer(&token)
        .json(&json!({ "status": "scheduled" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_comments_wait_for_moderation() {
    let app = spawn_app().await;
    let token = login(&app).await;

    let post: Value = app
        .server
        .post("/api/v1/admin/posts")
        .authorization_bearer(&token)
        .json(&json!({ "title": "Compressing images", "content": "Body", "status": "published" }))
        .await
        .json();
    let slug = post["slug"].as_str().unwrap();

    let response = app
        .server
        .post(&format!("/api/v1/blog/{}/comments", slug))
        .json(&json!({
            "author_name": "Asha",
            "author_email": "asha@example.com",
            "content": "Very useful, thanks!"
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let created: Value = response.json();
    assert_eq!(created["status"], "pending");
    assert_eq!(created["visible"], false);

    let list: Value = app.server.get(&format!("/api/v1/blog/{}/comments", slug)).await.json();
    assert_eq!(list["total"], 0);

    app.server
        .put(&format!("/api/v1/admin/comments/{}/status", created["id"]))
        .authorization_bearer(&token)
        .json(&json!({ "status": "approved" }))
        .await
        .assert_status_ok();

    let list: Value = app.server.get(&format!("/api/v1/blog/{}/comments", slug)).await.json();
    assert_eq!(list["total"], 1);
    assert_eq!(list["comments"][0]["author_name"], "Asha");
}

#[tokio::test]
async fn test_newsletter_subscribe() {
    let app = spawn_app().await;

    let response = app
        .server
        .post("/api/v1/newsletter/subscribe")
        .json(&json!({ "email": "  Reader@Example.com ", "source": "footer" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["email"], "reader@example.com");
    assert_eq!(body["status"], "subscribed");

    app.server
        .post("/api/v1/newsletter/subscribe")
        .json(&json!({ "email": "not-an-email" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    app.server
        .get("/api/v1/newsletter/unsubscribe")
        .add_query_param("email", "reader@example.com")
        .add_query_param("token", "forged")
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let token = login(&app).await;
    let response = app
        .server
        .get("/api/v1/admin/subscribers/export")
        .authorization_bearer(&token)
        .await;
    response.assert_status_ok();
    assert!(response.header("content-type").to_str().unwrap().starts_with("text/csv"));
    assert!(response.text().contains("reader@example.com,subscribed,footer"));
}

#[tokio::test]
async fn test_site_settings_roundtrip() {
    let app = spawn_app().await;
    let token = login(&app).await;

    app.server
        .put("/api/v1/admin/settings/site")
        .authorization_bearer(&token)
        .json(&json!({ "site_name": "" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    app.server
        .put("/api/v1/admin/settings/site")
        .authorization_bearer(&token)
        .json(&json!({ "site_name": "PDF Desk", "tagline": "Tools that work" }))
        .await
        .assert_status_ok();
    app.server
        .put("/api/v1/admin/settings/tools")
        .authorization_bearer(&token)
        .json(&json!({ "featured": ["merge-pdf", "compress-image"] }))
        .await
        .assert_status_ok();

    let site: Value = app.server.get("/api/v1/site").await.json();
    assert_eq!(site["site_name"], "PDF Desk");
    assert_eq!(site["featured_tools"][0]["slug"], "merge-pdf");
    assert_eq!(site["featured_tools"].as_array().unwrap().len(), 2);
}
