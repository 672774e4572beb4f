use async_trait::async_trait;

use super::authz::Resource;
use super::domain::{
    ApplicationId, ApplicationStatus, ApplicationWithApplicant, ApplicationWithListing, ImageRef,
    ListingDetails, ListingFields, ListingId, ListingStatus, ListingSummary, NewUser,
    ProfileUpdate, StoredCredentials, UserId, UserProfile,
};

/// Identity records. Usernames and emails are unique at the storage layer.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn insert_user(&self, user: NewUser) -> Result<UserId, RepositoryError>;
    async fn credentials(&self, username: &str)
        -> Result<Option<StoredCredentials>, RepositoryError>;
    async fn user(&self, id: UserId) -> Result<Option<UserProfile>, RepositoryError>;
    async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<(), RepositoryError>;
}

/// Listing records and their image attachments. Reads only ever surface active listings.
#[async_trait]
pub trait ListingRepository: Send + Sync {
    async fn insert_listing(
        &self,
        owner: UserId,
        fields: &ListingFields,
    ) -> Result<ListingId, RepositoryError>;
    async fn replace_listing(
        &self,
        id: ListingId,
        fields: &ListingFields,
    ) -> Result<(), RepositoryError>;
    async fn set_listing_status(
        &self,
        id: ListingId,
        status: ListingStatus,
    ) -> Result<(), RepositoryError>;
    async fn active_listing(&self, id: ListingId)
        -> Result<Option<ListingDetails>, RepositoryError>;
    /// Newest first, optionally bounded by rent.
    async fn active_listings(
        &self,
        max_rent: Option<f64>,
    ) -> Result<Vec<ListingSummary>, RepositoryError>;
    /// Inserts one row per path, in order, atomically.
    async fn insert_images(
        &self,
        id: ListingId,
        paths: &[String],
    ) -> Result<Vec<ImageRef>, RepositoryError>;
}

/// Tenancy application records.
#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    /// Inserts a pending application. Fails with `Conflict` when the pair already applied,
    /// `NotFound` when the listing does not exist and `ListingInactive` when it is inactive,
    /// checked in that order.
    async fn insert_application(
        &self,
        listing: ListingId,
        applicant: UserId,
    ) -> Result<ApplicationId, RepositoryError>;
    async fn applications_by_applicant(
        &self,
        applicant: UserId,
    ) -> Result<Vec<ApplicationWithListing>, RepositoryError>;
    async fn applications_for_listing(
        &self,
        listing: ListingId,
    ) -> Result<Vec<ApplicationWithApplicant>, RepositoryError>;
    async fn set_application_status(
        &self,
        id: ApplicationId,
        status: ApplicationStatus,
    ) -> Result<(), RepositoryError>;
}

/// Resolves which user owns a resource; `None` when the resource does not exist.
#[async_trait]
pub trait OwnershipResolver: Send + Sync {
    async fn resolve_owner(&self, resource: Resource) -> Result<Option<UserId>, RepositoryError>;
}

/// Everything the HTTP layer needs from a single backing store.
pub trait MarketplaceStore:
    UserRepository + ListingRepository + ApplicationRepository + OwnershipResolver + 'static
{
}

impl<T> MarketplaceStore for T where
    T: UserRepository + ListingRepository + ApplicationRepository + OwnershipResolver + 'static
{
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("{0}")]
    Conflict(String),
    #[error("record not found")]
    NotFound,
    #[error("listing is no longer active")]
    ListingInactive,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
