use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::marketplace::domain::{ApplicationId, ListingId};
use crate::marketplace::error::MarketplaceError;
use crate::marketplace::http::{ApiState, CurrentUser};
use crate::marketplace::repository::MarketplaceStore;

pub fn application_router<S>() -> Router<ApiState<S>>
where
    S: MarketplaceStore,
{
    Router::new()
        .route(
            "/applications/listings/{listing_id}",
            post(submit_handler::<S>).get(received_handler::<S>),
        )
        .route("/applications/me", get(mine_handler::<S>))
        .route("/applications/{id}", put(status_handler::<S>))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StatusChange {
    #[serde(default)]
    status: Option<String>,
}

pub(crate) async fn submit_handler<S>(
    State(state): State<ApiState<S>>,
    CurrentUser(user): CurrentUser,
    listing_id: Result<Path<i64>, PathRejection>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore,
{
    let Path(listing_id) = listing_id?;
    let application_id = state
        .applications
        .submit(ListingId(listing_id), user)
        .await?;
    let body = json!({
        "message": "Application submitted successfully",
        "application_id": application_id,
    });
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

pub(crate) async fn mine_handler<S>(
    State(state): State<ApiState<S>>,
    CurrentUser(user): CurrentUser,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore,
{
    let applications = state.applications.list_mine(user).await?;
    Ok(Json(applications).into_response())
}

pub(crate) async fn received_handler<S>(
    State(state): State<ApiState<S>>,
    CurrentUser(user): CurrentUser,
    listing_id: Result<Path<i64>, PathRejection>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore,
{
    let Path(listing_id) = listing_id?;
    let applications = state
        .applications
        .list_for_listing(ListingId(listing_id), user)
        .await?;
    Ok(Json(applications).into_response())
}

pub(crate) async fn status_handler<S>(
    State(state): State<ApiState<S>>,
    CurrentUser(user): CurrentUser,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<StatusChange>, JsonRejection>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore,
{
    let Path(id) = id?;
    let Json(change) = payload?;
    let status = change.status.unwrap_or_default();
    state
        .applications
        .update_status(ApplicationId(id), user, &status)
        .await?;
    Ok(Json(json!({ "message": "Application status updated successfully" })).into_response())
}
