use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::marketplace::domain::UserId;

/// Argon2id hashing for stored credentials.
#[derive(Clone)]
pub struct PasswordHasher {
    argon: Argon2<'static>,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            argon: Argon2::default(),
        }
    }
}

impl PasswordHasher {
    /// Cheaper parameters for fixtures and demos. Returns `None` for parameters Argon2 rejects.
    pub fn with_cost(memory_kib: u32, iterations: u32) -> Option<Self> {
        let params = Params::new(memory_kib, iterations, 1, None).ok()?;
        Some(Self {
            argon: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    pub fn hash(&self, password: &str) -> Result<String, CredentialError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| CredentialError::Hashing(err.to_string()))
    }

    /// False for a wrong password and for a stored value that is not a PHC string.
    pub fn verify(&self, password: &str, stored: &str) -> bool {
        PasswordHash::new(stored).is_ok_and(|parsed| {
            self.argon
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
    }

    /// [`PasswordHasher::hash`] on the blocking pool.
    pub async fn hash_blocking(&self, password: String) -> Result<String, CredentialError> {
        let hasher = self.clone();
        off_executor(move || hasher.hash(&password)).await?
    }

    /// [`PasswordHasher::verify`] on the blocking pool.
    pub async fn verify_blocking(
        &self,
        password: String,
        stored: String,
    ) -> Result<bool, CredentialError> {
        let hasher = self.clone();
        off_executor(move || hasher.verify(&password, &stored)).await
    }
}

async fn off_executor<T, F>(work: F) -> Result<T, CredentialError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| CredentialError::Worker(err.to_string()))
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// Issues and verifies HS256 bearer tokens carrying the user id.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(&self, user: UserId) -> Result<String, CredentialError> {
        self.issue_at(user, Utc::now())
    }

    pub fn issue_at(
        &self,
        user: UserId,
        issued_at: DateTime<Utc>,
    ) -> Result<String, CredentialError> {
        let claims = Claims {
            sub: user.0.to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|err| CredentialError::Token(err.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<UserId, CredentialError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|err| CredentialError::Token(err.to_string()))?;

        data.claims
            .sub
            .parse::<i64>()
            .map(UserId)
            .map_err(|_| CredentialError::Token("subject is not a user id".to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error("invalid token: {0}")]
    Token(String),
    #[error("credential worker failed: {0}")]
    Worker(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::with_cost(1024, 1).expect("valid params")
    }

    #[test]
    fn hashes_verify_only_the_original_password() {
        let hasher = hasher();
        let stored = hasher.hash("hunter22").expect("hash");
        assert!(stored.starts_with("$argon2id$"));
        assert!(hasher.verify("hunter22", &stored));
        assert!(!hasher.verify("hunter23", &stored));
        assert!(!hasher.verify("hunter22", "plaintext"));
    }

    #[tokio::test]
    async fn argon2_work_runs_off_the_calling_thread() {
        let caller = std::thread::current().id();
        let worker = off_executor(|| std::thread::current().id())
            .await
            .expect("blocking task completes");
        assert_ne!(caller, worker);

        let hasher = hasher();
        let stored = hasher
            .hash_blocking("hunter22".to_string())
            .await
            .expect("hash");
        assert!(hasher
            .verify_blocking("hunter22".to_string(), stored.clone())
            .await
            .expect("verify"));
        assert!(!hasher
            .verify_blocking("hunter23".to_string(), stored)
            .await
            .expect("verify"));
    }

    #[test]
    fn tokens_round_trip_the_user_id() {
        let issuer = TokenIssuer::new("test-secret", Duration::hours(1));
        let token = issuer.issue(UserId(42)).expect("issue");
        assert_eq!(issuer.verify(&token).expect("verify"), UserId(42));
    }

    #[test]
    fn expired_and_foreign_tokens_are_rejected() {
        let issuer = TokenIssuer::new("test-secret", Duration::hours(1));
        let stale = issuer
            .issue_at(UserId(1), Utc::now() - Duration::days(2))
            .expect("issue");
        assert!(issuer.verify(&stale).is_err());

        let other = TokenIssuer::new("other-secret", Duration::hours(1));
        let forged = other.issue(UserId(1)).expect("issue");
        assert!(issuer.verify(&forged).is_err());
        assert!(issuer.verify("not-a-jwt").is_err());
    }
}
