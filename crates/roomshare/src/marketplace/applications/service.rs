use std::sync::Arc;

use tracing::info;

use crate::marketplace::authz::{require_owner, Resource};
use crate::marketplace::domain::{
    ApplicationId, ApplicationStatus, ApplicationWithApplicant, ApplicationWithListing, ListingId,
    UserId,
};
use crate::marketplace::error::MarketplaceError;
use crate::marketplace::repository::{ApplicationRepository, OwnershipResolver, RepositoryError};

/// Tenancy applications: `pending` until the listing owner accepts or rejects.
pub struct ApplicationService<S> {
    store: Arc<S>,
}

impl<S> ApplicationService<S>
where
    S: ApplicationRepository + OwnershipResolver + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// One application per (listing, applicant). Fails `Conflict` on a repeat, then
    /// `NotFound` for a missing listing, then `ListingInactive`.
    pub async fn submit(
        &self,
        listing: ListingId,
        applicant: UserId,
    ) -> Result<ApplicationId, MarketplaceError> {
        let application_id = self
            .store
            .insert_application(listing, applicant)
            .await
            .map_err(|err| match err {
                RepositoryError::Conflict(_) => MarketplaceError::Conflict(
                    "you have already applied to this listing".to_string(),
                ),
                other => MarketplaceError::missing("listing")(other),
            })?;

        info!(
            application_id = application_id.0,
            listing_id = listing.0,
            user_id = applicant.0,
            "application submitted"
        );
        Ok(application_id)
    }

    pub async fn list_mine(
        &self,
        applicant: UserId,
    ) -> Result<Vec<ApplicationWithListing>, MarketplaceError> {
        Ok(self.store.applications_by_applicant(applicant).await?)
    }

    /// Applications received for a listing; only its owner may look.
    pub async fn list_for_listing(
        &self,
        listing: ListingId,
        requester: UserId,
    ) -> Result<Vec<ApplicationWithApplicant>, MarketplaceError> {
        require_owner(self.store.as_ref(), requester, Resource::Listing(listing)).await?;
        Ok(self.store.applications_for_listing(listing).await?)
    }

    /// Overwrites the status with any of `pending`, `accepted` or `rejected`.
    pub async fn update_status(
        &self,
        id: ApplicationId,
        requester: UserId,
        status: &str,
    ) -> Result<ApplicationStatus, MarketplaceError> {
        require_owner(self.store.as_ref(), requester, Resource::Application(id)).await?;

        let status = ApplicationStatus::parse(status).ok_or_else(|| {
            MarketplaceError::invalid(format!(
                "status '{status}' must be pending, accepted or rejected"
            ))
        })?;

        self.store
            .set_application_status(id, status)
            .await
            .map_err(MarketplaceError::missing("application"))?;
        info!(
            application_id = id.0,
            user_id = requester.0,
            status = status.label(),
            "application status updated"
        );
        Ok(status)
    }
}
