use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use super::service::parse_max_rent;
use crate::marketplace::domain::{ListingDraft, ListingId};
use crate::marketplace::error::MarketplaceError;
use crate::marketplace::http::{ApiState, CurrentUser};
use crate::marketplace::media::UploadedImage;
use crate::marketplace::repository::MarketplaceStore;

/// Multipart field that carries listing images.
pub const IMAGE_FIELD: &str = "images";

const UPLOAD_BODY_LIMIT: usize = 25 * 1024 * 1024;

pub fn listing_router<S>() -> Router<ApiState<S>>
where
    S: MarketplaceStore,
{
    Router::new()
        .route("/listings", post(create_handler::<S>).get(list_handler::<S>))
        .route("/listings/search", get(search_handler::<S>))
        .route(
            "/listings/{id}",
            get(get_handler::<S>)
                .put(update_handler::<S>)
                .delete(delete_handler::<S>),
        )
        .route(
            "/listings/{id}/images",
            post(images_handler::<S>).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SearchParams {
    #[serde(default)]
    max_rent: Option<String>,
}

pub(crate) async fn create_handler<S>(
    State(state): State<ApiState<S>>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<ListingDraft>, JsonRejection>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore,
{
    let Json(draft) = payload?;
    let listing_id = state.listings.create(user, &draft).await?;
    let body = json!({
        "message": "Listing created successfully",
        "listing_id": listing_id,
    });
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

pub(crate) async fn list_handler<S>(
    State(state): State<ApiState<S>>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore,
{
    let listings = state.listings.list_active().await?;
    Ok(Json(listings).into_response())
}

pub(crate) async fn search_handler<S>(
    State(state): State<ApiState<S>>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore,
{
    let Query(params) = params?;
    let max_rent = parse_max_rent(params.max_rent.as_deref())?;
    let listings = state.listings.search(max_rent).await?;
    Ok(Json(listings).into_response())
}

pub(crate) async fn get_handler<S>(
    State(state): State<ApiState<S>>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore,
{
    let Path(id) = id?;
    let listing = state.listings.get(ListingId(id)).await?;
    Ok(Json(listing).into_response())
}

pub(crate) async fn update_handler<S>(
    State(state): State<ApiState<S>>,
    CurrentUser(user): CurrentUser,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<ListingDraft>, JsonRejection>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore,
{
    let Path(id) = id?;
    let Json(draft) = payload?;
    state.listings.update(ListingId(id), user, &draft).await?;
    Ok(Json(json!({ "message": "Listing updated successfully" })).into_response())
}

pub(crate) async fn delete_handler<S>(
    State(state): State<ApiState<S>>,
    CurrentUser(user): CurrentUser,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore,
{
    let Path(id) = id?;
    state.listings.soft_delete(ListingId(id), user).await?;
    Ok(Json(json!({ "message": "Listing deleted successfully" })).into_response())
}

pub(crate) async fn images_handler<S>(
    State(state): State<ApiState<S>>,
    CurrentUser(user): CurrentUser,
    id: Result<Path<i64>, PathRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore,
{
    let Path(id) = id?;
    let listing = ListingId(id);
    // Settle ownership before any of the upload is read.
    state.listings.ensure_owner(listing, user).await?;
    let images = read_images(multipart?).await?;
    let stored = state.listings.attach_images(listing, user, images).await?;
    let body = json!({
        "message": "Images uploaded successfully",
        "images": stored,
    });
    Ok(Json(body).into_response())
}

async fn read_images(mut multipart: Multipart) -> Result<Vec<UploadedImage>, MarketplaceError> {
    let mut images = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            if field.file_name().is_some() {
                return Err(MarketplaceError::invalid(format!(
                    "unexpected file field '{}', images go in '{IMAGE_FIELD}'",
                    field.name().unwrap_or_default()
                )));
            }
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;
        images.push(UploadedImage {
            file_name,
            content_type,
            bytes,
        });
    }
    Ok(images)
}
