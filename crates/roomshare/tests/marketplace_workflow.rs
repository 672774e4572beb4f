use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::Duration;
use roomshare::marketplace::{
    marketplace_router, ApiState, LocalImageStore, PasswordHasher, SqliteStore, TokenIssuer,
    WaivedPayments,
};
use serde_json::{json, Value};
use tower::ServiceExt;

struct App {
    router: Router,
    upload_dir: PathBuf,
}

async fn app() -> App {
    let store = Arc::new(SqliteStore::in_memory().await.expect("in-memory store"));
    let upload_dir = std::env::temp_dir().join(format!(
        "roomshare-workflow-{}-{}",
        std::process::id(),
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));
    let state = ApiState::assemble(
        store,
        Arc::new(TokenIssuer::new("workflow-secret", Duration::hours(1))),
        PasswordHasher::with_cost(1024, 1).expect("argon2 params"),
        Arc::new(LocalImageStore::new(&upload_dir)),
        Arc::new(WaivedPayments),
        5,
    );
    App {
        router: marketplace_router(state),
        upload_dir,
    }
}

async fn call(
    app: &App,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request builds");

    let response = app
        .router
        .clone()
        .oneshot(request)
        .await
        .expect("route executes");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    let payload = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json payload")
    };
    (status, payload)
}

async fn register(app: &App, username: &str) -> String {
    let (status, payload) = call(
        app,
        Method::POST,
        "/api/users/register",
        None,
        Some(json!({
            "username": username,
            "password": "correct horse",
            "email": format!("{username}@example.com"),
            "name": username.to_uppercase(),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register {username}: {payload}");
    payload["token"].as_str().expect("token").to_string()
}

async fn create_listing(app: &App, token: &str, location: &str, rent: u32) -> i64 {
    let (status, payload) = call(
        app,
        Method::POST,
        "/api/listings",
        Some(token),
        Some(json!({
            "location": location,
            "rent_amount": rent,
            "room_type": "private",
            "available_date": "2025-11-01",
            "roommates_needed": 1,
            "amenities": ["Wi-Fi", "AC"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create listing: {payload}");
    payload["listing_id"].as_i64().expect("listing id")
}

#[tokio::test]
async fn accepted_application_is_visible_to_the_applicant() {
    let app = app().await;
    let owner = register(&app, "asha").await;
    let applicant = register(&app, "bilal").await;
    let listing = create_listing(&app, &owner, "Lavasa, Dasve", 5000).await;

    let (status, submitted) = call(
        &app,
        Method::POST,
        &format!("/api/applications/listings/{listing}"),
        Some(&applicant),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let application_id = submitted["application_id"].as_i64().expect("application id");

    let (status, received) = call(
        &app,
        Method::GET,
        &format!("/api/applications/listings/{listing}"),
        Some(&owner),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let received = received.as_array().expect("array");
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["applicant_name"], "BILAL");
    assert_eq!(received[0]["status"], "pending");

    let (status, _) = call(
        &app,
        Method::PUT,
        &format!("/api/applications/{application_id}"),
        Some(&owner),
        Some(json!({ "status": "accepted" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, mine) = call(&app, Method::GET, "/api/applications/me", Some(&applicant), None).await;
    assert_eq!(mine[0]["id"], application_id);
    assert_eq!(mine[0]["status"], "accepted");
    assert_eq!(mine[0]["location"], "Lavasa, Dasve");
    assert_eq!(mine[0]["owner_name"], "ASHA");
}

#[tokio::test]
async fn soft_deleted_listing_disappears_but_applications_remain() {
    let app = app().await;
    let owner = register(&app, "asha").await;
    let applicant = register(&app, "bilal").await;
    let listing = create_listing(&app, &owner, "Lavasa", 5000).await;
    let other = create_listing(&app, &owner, "Baner", 900).await;

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/api/applications/listings/{listing}"),
        Some(&applicant),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = call(
        &app,
        Method::DELETE,
        &format!("/api/listings/{listing}"),
        Some(&applicant),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(
        &app,
        Method::DELETE,
        &format!("/api/listings/{listing}"),
        Some(&owner),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, payload) =
        call(&app, Method::GET, &format!("/api/listings/{listing}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(payload["kind"], "not_found");

    let (_, active) = call(&app, Method::GET, "/api/listings", None, None).await;
    let ids: Vec<i64> = active
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|listing| listing["id"].as_i64())
        .collect();
    assert_eq!(ids, vec![other]);

    let (_, mine) = call(&app, Method::GET, "/api/applications/me", Some(&applicant), None).await;
    assert_eq!(mine.as_array().map(Vec::len), Some(1));
    assert_eq!(mine[0]["listing_id"], listing);
    assert_eq!(mine[0]["status"], "pending");
    assert_eq!(mine[0]["listing_status"], "inactive");
}

#[tokio::test]
async fn uploaded_images_land_on_disk_in_order() {
    let app = app().await;
    let owner = register(&app, "asha").await;
    let listing = create_listing(&app, &owner, "Lavasa", 5000).await;

    let boundary = "workflow-boundary";
    let mut body = Vec::new();
    for (name, bytes) in [("first.png", &b"first"[..]), ("second.png", &b"second"[..])] {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\n\
                 Content-Disposition: form-data; name=\"images\"; filename=\"{name}\"\r\n\
                 Content-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("/api/listings/{listing}/images"))
        .header(header::AUTHORIZATION, format!("Bearer {owner}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .expect("request builds");
    let response = app.router.clone().oneshot(request).await.expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);

    let (_, details) =
        call(&app, Method::GET, &format!("/api/listings/{listing}"), None, None).await;
    let images = details["images"].as_array().expect("images");
    assert_eq!(images.len(), 2);

    let mut contents = Vec::new();
    for image in images {
        let public = image["image_path"].as_str().expect("path");
        let relative = public.strip_prefix("uploads/").expect("public prefix");
        contents.push(tokio::fs::read(app.upload_dir.join(relative)).await.expect("file on disk"));
    }
    assert_eq!(contents, vec![b"first".to_vec(), b"second".to_vec()]);

    let (_, listings) = call(&app, Method::GET, "/api/listings", None, None).await;
    assert_eq!(listings[0]["featured_image"], images[0]["image_path"]);

    tokio::fs::remove_dir_all(&app.upload_dir).await.expect("cleanup");
}
