use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::Router;

use super::accounts::{account_router, AccountService, Authenticator, PasswordHasher, TokenIssuer};
use super::applications::{application_router, ApplicationService};
use super::domain::UserId;
use super::error::MarketplaceError;
use super::listings::{listing_router, ListingService};
use super::media::{ImageStore, LocalImageStore};
use super::payments::{PaymentGate, WaivedPayments};
use super::repository::{MarketplaceStore, UserRepository};
use crate::config::AppConfig;

/// Shared handler state: the three services over one store plus the bearer authenticator.
pub struct ApiState<S> {
    pub accounts: Arc<AccountService<S>>,
    pub listings: Arc<ListingService<S>>,
    pub applications: Arc<ApplicationService<S>>,
    pub authenticator: Arc<Authenticator>,
}

impl<S> Clone for ApiState<S> {
    fn clone(&self) -> Self {
        Self {
            accounts: Arc::clone(&self.accounts),
            listings: Arc::clone(&self.listings),
            applications: Arc::clone(&self.applications),
            authenticator: Arc::clone(&self.authenticator),
        }
    }
}

impl<S> FromRef<ApiState<S>> for Arc<Authenticator> {
    fn from_ref(state: &ApiState<S>) -> Self {
        Arc::clone(&state.authenticator)
    }
}

impl<S> ApiState<S>
where
    S: MarketplaceStore,
{
    pub fn assemble(
        store: Arc<S>,
        tokens: Arc<TokenIssuer>,
        hasher: PasswordHasher,
        images: Arc<dyn ImageStore>,
        payments: Arc<dyn PaymentGate>,
        max_images: usize,
    ) -> Self {
        let users: Arc<dyn UserRepository> = store.clone();
        Self {
            accounts: Arc::new(AccountService::new(store.clone(), hasher, tokens.clone())),
            listings: Arc::new(
                ListingService::new(store.clone(), images, max_images).with_payments(payments),
            ),
            applications: Arc::new(ApplicationService::new(store)),
            authenticator: Arc::new(Authenticator::new(tokens, users)),
        }
    }

    /// Production wiring: local image storage, waived listing fees, default Argon2 cost.
    pub fn from_config(store: Arc<S>, config: &AppConfig) -> Self {
        let tokens = Arc::new(TokenIssuer::new(
            &config.auth.jwt_secret,
            config.auth.token_ttl,
        ));
        Self::assemble(
            store,
            tokens,
            PasswordHasher::default(),
            Arc::new(LocalImageStore::new(&config.media.upload_dir)),
            Arc::new(WaivedPayments),
            config.media.max_images_per_upload,
        )
    }
}

/// The authenticated caller, resolved from an `Authorization: Bearer` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub UserId);

impl<St> FromRequestParts<St> for CurrentUser
where
    Arc<Authenticator>: FromRef<St>,
    St: Send + Sync,
{
    type Rejection = MarketplaceError;

    async fn from_request_parts(parts: &mut Parts, state: &St) -> Result<Self, Self::Rejection> {
        let authenticator = Arc::<Authenticator>::from_ref(state);
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        authenticator.authenticate(header).await.map(CurrentUser)
    }
}

/// Every marketplace route, nested under `/api`.
pub fn marketplace_router<S>(state: ApiState<S>) -> Router
where
    S: MarketplaceStore,
{
    let api = Router::new()
        .merge(account_router::<S>())
        .merge(listing_router::<S>())
        .merge(application_router::<S>());

    Router::new().nest("/api", api).with_state(state)
}
