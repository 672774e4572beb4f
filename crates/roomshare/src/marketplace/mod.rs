//! Roommate marketplace: listings, tenancy applications and the ownership checks gating every
//! mutation, backed by SQLite and served over axum.

pub mod accounts;
pub mod applications;
pub mod authz;
pub mod domain;
pub mod error;
pub mod http;
pub mod listings;
pub mod media;
pub mod payments;
pub mod repository;
pub mod sqlite;

#[cfg(test)]
mod tests;

pub use accounts::{AccountService, Authenticator, PasswordHasher, TokenIssuer};
pub use applications::ApplicationService;
pub use authz::{authorize_owner, require_owner, Access, Resource};
pub use domain::{
    Amenities, ApplicationId, ApplicationStatus, ApplicationWithApplicant, ApplicationWithListing,
    ImageId, ImageRef, ListingDetails, ListingDraft, ListingFields, ListingId, ListingStatus,
    ListingSummary, ProfileUpdate, RoomType, UserId, UserProfile,
};
pub use error::MarketplaceError;
pub use http::{marketplace_router, ApiState, CurrentUser};
pub use listings::{ListingService, PublishOutcome};
pub use media::{ImageStore, LocalImageStore, MediaError, UploadedImage};
pub use payments::{PaymentGate, PaymentOutcome, WaivedPayments};
pub use repository::{
    ApplicationRepository, ListingRepository, MarketplaceStore, OwnershipResolver,
    RepositoryError, UserRepository,
};
pub use sqlite::SqliteStore;
