//! Identity: registration, login, bearer tokens and the caller's own profile.

mod credentials;
pub mod router;
mod service;

pub use credentials::{CredentialError, PasswordHasher, TokenIssuer};
pub use router::account_router;
pub use service::{AccountService, Authenticator, Login, Registration, Session};
