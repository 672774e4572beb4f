use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::credentials::{CredentialError, PasswordHasher, TokenIssuer};
use crate::marketplace::domain::{NewUser, ProfileUpdate, UserId, UserProfile};
use crate::marketplace::error::MarketplaceError;
use crate::marketplace::repository::UserRepository;

const BAD_LOGIN: &str = "invalid username or password";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Registration {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Login {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Identity plus the bearer token handed back on register and login.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub user_id: UserId,
    pub token: String,
}

/// Registration, login and self-service profile management.
pub struct AccountService<S> {
    store: Arc<S>,
    hasher: PasswordHasher,
    tokens: Arc<TokenIssuer>,
}

impl<S> AccountService<S>
where
    S: UserRepository + 'static,
{
    pub fn new(store: Arc<S>, hasher: PasswordHasher, tokens: Arc<TokenIssuer>) -> Self {
        Self {
            store,
            hasher,
            tokens,
        }
    }

    pub async fn register(&self, registration: Registration) -> Result<Session, MarketplaceError> {
        let username = required(&registration.username, "username")?;
        let password = registration
            .password
            .filter(|value| !value.is_empty())
            .ok_or_else(|| MarketplaceError::invalid("password is required"))?;
        let email = required(&registration.email, "email")?;

        let password_hash = self
            .hasher
            .hash_blocking(password)
            .await
            .map_err(credential_failure)?;
        let user_id = self
            .store
            .insert_user(NewUser {
                username,
                password_hash,
                email,
                name: optional(&registration.name),
                phone: optional(&registration.phone),
            })
            .await?;

        info!(user_id = user_id.0, "user registered");
        self.session(user_id)
    }

    pub async fn login(&self, login: Login) -> Result<Session, MarketplaceError> {
        let username = required(&login.username, "username")?;
        let password = login
            .password
            .filter(|value| !value.is_empty())
            .ok_or_else(|| MarketplaceError::invalid("password is required"))?;

        let Some(credentials) = self.store.credentials(&username).await? else {
            warn!(%username, "login for unknown user");
            return Err(MarketplaceError::Unauthorized(BAD_LOGIN.to_string()));
        };
        let verified = self
            .hasher
            .verify_blocking(password, credentials.password_hash)
            .await
            .map_err(credential_failure)?;
        if !verified {
            warn!(user_id = credentials.user_id.0, "login with wrong password");
            return Err(MarketplaceError::Unauthorized(BAD_LOGIN.to_string()));
        }

        self.session(credentials.user_id)
    }

    pub async fn profile(&self, user: UserId) -> Result<UserProfile, MarketplaceError> {
        self.store
            .user(user)
            .await?
            .ok_or(MarketplaceError::NotFound("user"))
    }

    /// Replaces the editable profile fields; omitted optional fields are cleared.
    pub async fn update_profile(
        &self,
        user: UserId,
        update: ProfileUpdate,
    ) -> Result<UserProfile, MarketplaceError> {
        let update = ProfileUpdate {
            email: Some(required(&update.email, "email")?),
            name: optional(&update.name),
            phone: optional(&update.phone),
            bio: optional(&update.bio),
        };

        self.store
            .update_profile(user, &update)
            .await
            .map_err(MarketplaceError::missing("user"))?;
        info!(user_id = user.0, "profile updated");

        self.profile(user).await
    }

    fn session(&self, user_id: UserId) -> Result<Session, MarketplaceError> {
        let token = self.tokens.issue(user_id).map_err(credential_failure)?;
        Ok(Session { user_id, token })
    }
}

fn required(value: &Option<String>, field: &str) -> Result<String, MarketplaceError> {
    optional(value).ok_or_else(|| MarketplaceError::invalid(format!("{field} is required")))
}

fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn credential_failure(err: CredentialError) -> MarketplaceError {
    MarketplaceError::Storage(err.to_string())
}

/// Turns an `Authorization` header into the identity it was issued for.
pub struct Authenticator {
    tokens: Arc<TokenIssuer>,
    users: Arc<dyn UserRepository>,
}

impl Authenticator {
    pub fn new(tokens: Arc<TokenIssuer>, users: Arc<dyn UserRepository>) -> Self {
        Self { tokens, users }
    }

    pub async fn authenticate(&self, header: Option<&str>) -> Result<UserId, MarketplaceError> {
        let header = header
            .ok_or_else(|| MarketplaceError::Unauthorized("missing bearer token".to_string()))?;
        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                MarketplaceError::Unauthorized(
                    "authorization header must use the Bearer scheme".to_string(),
                )
            })?;

        let user = self
            .tokens
            .verify(token)
            .map_err(|err| MarketplaceError::Unauthorized(err.to_string()))?;

        match self.users.user(user).await? {
            Some(_) => Ok(user),
            None => Err(MarketplaceError::Unauthorized(
                "token refers to an unknown user".to_string(),
            )),
        }
    }
}
