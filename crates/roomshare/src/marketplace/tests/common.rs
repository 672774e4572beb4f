use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{header, Method, Request};
use axum::response::Response;
use axum::Router;
use chrono::Duration;
use serde_json::Value;

use crate::marketplace::accounts::{PasswordHasher, Registration, Session, TokenIssuer};
use crate::marketplace::domain::{ListingDraft, ListingId, UserId};
use crate::marketplace::http::{marketplace_router, ApiState};
use crate::marketplace::media::{ImageStore, MediaError, UploadedImage};
use crate::marketplace::payments::{PaymentGate, PaymentOutcome, WaivedPayments};
use crate::marketplace::sqlite::SqliteStore;

pub(super) const MAX_IMAGES: usize = 5;
pub(super) const BOUNDARY: &str = "roomshare-test-boundary";

pub(super) struct Harness {
    pub(super) store: Arc<SqliteStore>,
    pub(super) state: ApiState<SqliteStore>,
    pub(super) images: Arc<MemoryImages>,
}

impl Harness {
    pub(super) fn router(&self) -> Router {
        marketplace_router(self.state.clone())
    }
}

pub(super) async fn harness() -> Harness {
    harness_with(MemoryImages::default(), Arc::new(WaivedPayments)).await
}

pub(super) async fn harness_with(images: MemoryImages, payments: Arc<dyn PaymentGate>) -> Harness {
    let store = Arc::new(SqliteStore::in_memory().await.expect("in-memory store"));
    let images = Arc::new(images);
    let state = ApiState::assemble(
        store.clone(),
        Arc::new(TokenIssuer::new("test-secret", Duration::hours(1))),
        PasswordHasher::with_cost(1024, 1).expect("argon2 params"),
        images.clone(),
        payments,
        MAX_IMAGES,
    );
    Harness {
        store,
        state,
        images,
    }
}

pub(super) async fn register(harness: &Harness, username: &str) -> Session {
    harness
        .state
        .accounts
        .register(Registration {
            username: Some(username.to_string()),
            password: Some(format!("{username}-password")),
            email: Some(format!("{username}@example.com")),
            name: Some(format!("{username} tester")),
            phone: Some("555-0100".to_string()),
        })
        .await
        .expect("registration succeeds")
}

pub(super) fn draft(location: &str, rent: f64) -> ListingDraft {
    ListingDraft {
        location: Some(location.to_string()),
        rent_amount: Some(rent),
        room_type: Some("private".to_string()),
        available_date: Some("2025-11-01".to_string()),
        roommates_needed: Some(1),
        amenities: Some(vec!["Wi-Fi".to_string(), "AC".to_string()]),
        house_rules: Some("No smoking".to_string()),
        contact_preferences: Some("email".to_string()),
        payment_token: None,
    }
}

pub(super) async fn create_listing(
    harness: &Harness,
    owner: UserId,
    location: &str,
    rent: f64,
) -> ListingId {
    harness
        .state
        .listings
        .create(owner, &draft(location, rent))
        .await
        .expect("listing created")
}

pub(super) fn png(name: &str) -> UploadedImage {
    UploadedImage {
        file_name: Some(name.to_string()),
        content_type: Some("image/png".to_string()),
        bytes: Bytes::from_static(b"\x89PNG\r\n\x1a\n"),
    }
}

/// Records image writes instead of touching disk. `fail_on` makes the n-th store fail.
#[derive(Default)]
pub(super) struct MemoryImages {
    stored: Mutex<Vec<String>>,
    removed: Mutex<Vec<String>>,
    fail_on: Option<usize>,
}

impl MemoryImages {
    pub(super) fn failing_on(attempt: usize) -> Self {
        Self {
            fail_on: Some(attempt),
            ..Self::default()
        }
    }

    pub(super) fn stored(&self) -> Vec<String> {
        self.stored.lock().expect("images mutex poisoned").clone()
    }

    pub(super) fn removed(&self) -> Vec<String> {
        self.removed.lock().expect("images mutex poisoned").clone()
    }
}

#[async_trait]
impl ImageStore for MemoryImages {
    async fn store(
        &self,
        listing: ListingId,
        image: &UploadedImage,
    ) -> Result<String, MediaError> {
        let extension = image.validate()?;
        let mut stored = self.stored.lock().expect("images mutex poisoned");
        let attempt = stored.len() + 1;
        if self.fail_on == Some(attempt) {
            return Err(MediaError::Io(std::io::Error::other("disk full")));
        }
        let path = format!("uploads/listings/{listing}-{attempt}.{extension}");
        stored.push(path.clone());
        Ok(path)
    }

    async fn remove(&self, path: &str) -> Result<(), MediaError> {
        self.removed
            .lock()
            .expect("images mutex poisoned")
            .push(path.to_string());
        Ok(())
    }
}

pub(super) struct DecliningPayments;

#[async_trait]
impl PaymentGate for DecliningPayments {
    async fn confirm(&self, token: Option<&str>) -> PaymentOutcome {
        match token {
            Some("tok_paid") => PaymentOutcome::Settled,
            _ => PaymentOutcome::Failed("card declined".to_string()),
        }
    }
}

pub(super) fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::from(serde_json::to_vec(&body).expect("serialize body")))
        .expect("request builds")
}

pub(super) fn bare_request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request builds")
}

/// Builds a multipart body with one `images` part per `(file name, content type, bytes)`.
pub(super) fn multipart_request(
    uri: &str,
    token: &str,
    parts: &[(&str, &str, &[u8])],
) -> Request<Body> {
    multipart_field_request(uri, token, "images", parts)
}

/// Same as [`multipart_request`] with every part sent under `field`.
pub(super) fn multipart_field_request(
    uri: &str,
    token: &str,
    field: &str,
    parts: &[(&str, &str, &[u8])],
) -> Request<Body> {
    let mut body = Vec::new();
    for (file_name, content_type, bytes) in parts {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\n\
                 Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
                 Content-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(body))
        .expect("request builds")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
