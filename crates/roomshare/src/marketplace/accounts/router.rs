use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use super::service::{Login, Registration};
use crate::marketplace::domain::ProfileUpdate;
use crate::marketplace::error::MarketplaceError;
use crate::marketplace::http::{ApiState, CurrentUser};
use crate::marketplace::repository::MarketplaceStore;

pub fn account_router<S>() -> Router<ApiState<S>>
where
    S: MarketplaceStore,
{
    Router::new()
        .route("/users/register", post(register_handler::<S>))
        .route("/users/login", post(login_handler::<S>))
        .route(
            "/users/profile",
            get(profile_handler::<S>).put(update_profile_handler::<S>),
        )
}

pub(crate) async fn register_handler<S>(
    State(state): State<ApiState<S>>,
    payload: Result<Json<Registration>, JsonRejection>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore,
{
    let Json(registration) = payload?;
    let session = state.accounts.register(registration).await?;
    let body = json!({
        "message": "User registered successfully",
        "token": session.token,
        "user_id": session.user_id,
    });
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

pub(crate) async fn login_handler<S>(
    State(state): State<ApiState<S>>,
    payload: Result<Json<Login>, JsonRejection>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore,
{
    let Json(login) = payload?;
    let session = state.accounts.login(login).await?;
    let body = json!({
        "message": "Login successful",
        "token": session.token,
        "user_id": session.user_id,
    });
    Ok(Json(body).into_response())
}

pub(crate) async fn profile_handler<S>(
    State(state): State<ApiState<S>>,
    CurrentUser(user): CurrentUser,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore,
{
    let profile = state.accounts.profile(user).await?;
    Ok(Json(profile).into_response())
}

pub(crate) async fn update_profile_handler<S>(
    State(state): State<ApiState<S>>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore,
{
    let Json(update) = payload?;
    let profile = state.accounts.update_profile(user, update).await?;
    Ok(Json(json!({ "message": "Profile updated successfully", "user": profile })).into_response())
}
