use std::sync::Arc;

use tracing::{info, warn};

use crate::marketplace::authz::{require_owner, Resource};
use crate::marketplace::domain::{
    ImageRef, ListingDetails, ListingDraft, ListingId, ListingStatus, ListingSummary, UserId,
};
use crate::marketplace::error::MarketplaceError;
use crate::marketplace::media::{ImageStore, UploadedImage};
use crate::marketplace::payments::{PaymentGate, PaymentOutcome, WaivedPayments};
use crate::marketplace::repository::{ListingRepository, OwnershipResolver};

/// Result of creating a listing and attaching its images in one call. The listing survives an
/// image failure, so callers learn its id either way.
#[derive(Debug)]
pub enum PublishOutcome {
    Published {
        listing_id: ListingId,
        images: Vec<ImageRef>,
    },
    ImagesFailed {
        listing_id: ListingId,
        error: MarketplaceError,
    },
}

impl PublishOutcome {
    pub fn listing_id(&self) -> ListingId {
        match self {
            PublishOutcome::Published { listing_id, .. }
            | PublishOutcome::ImagesFailed { listing_id, .. } => *listing_id,
        }
    }
}

/// Listing lifecycle: create, browse, owner edits, image attachment and soft delete.
pub struct ListingService<S> {
    store: Arc<S>,
    images: Arc<dyn ImageStore>,
    payments: Arc<dyn PaymentGate>,
    max_images: usize,
}

impl<S> ListingService<S>
where
    S: ListingRepository + OwnershipResolver + 'static,
{
    pub fn new(store: Arc<S>, images: Arc<dyn ImageStore>, max_images: usize) -> Self {
        Self {
            store,
            images,
            payments: Arc::new(WaivedPayments),
            max_images,
        }
    }

    pub fn with_payments(mut self, payments: Arc<dyn PaymentGate>) -> Self {
        self.payments = payments;
        self
    }

    pub fn max_images(&self) -> usize {
        self.max_images
    }

    pub async fn create(
        &self,
        owner: UserId,
        draft: &ListingDraft,
    ) -> Result<ListingId, MarketplaceError> {
        let fields = draft.validate().map_err(MarketplaceError::InvalidInput)?;

        if let PaymentOutcome::Failed(reason) =
            self.payments.confirm(draft.payment_token.as_deref()).await
        {
            warn!(user_id = owner.0, %reason, "listing payment declined");
            return Err(MarketplaceError::PaymentDeclined(reason));
        }

        let listing_id = self.store.insert_listing(owner, &fields).await?;
        info!(listing_id = listing_id.0, user_id = owner.0, "listing created");
        Ok(listing_id)
    }

    /// Active listings only; an inactive listing reads as missing.
    pub async fn get(&self, id: ListingId) -> Result<ListingDetails, MarketplaceError> {
        self.store
            .active_listing(id)
            .await?
            .ok_or(MarketplaceError::NotFound("listing"))
    }

    pub async fn list_active(&self) -> Result<Vec<ListingSummary>, MarketplaceError> {
        Ok(self.store.active_listings(None).await?)
    }

    pub async fn search(
        &self,
        max_rent: Option<f64>,
    ) -> Result<Vec<ListingSummary>, MarketplaceError> {
        if let Some(bound) = max_rent {
            if !bound.is_finite() || bound < 0.0 {
                return Err(MarketplaceError::invalid(
                    "max_rent must be a non-negative number",
                ));
            }
        }
        Ok(self.store.active_listings(max_rent).await?)
    }

    /// Full replacement of the listing fields by its owner.
    pub async fn update(
        &self,
        id: ListingId,
        requester: UserId,
        draft: &ListingDraft,
    ) -> Result<(), MarketplaceError> {
        require_owner(self.store.as_ref(), requester, Resource::Listing(id)).await?;
        let fields = draft.validate().map_err(MarketplaceError::InvalidInput)?;

        self.store
            .replace_listing(id, &fields)
            .await
            .map_err(MarketplaceError::missing("listing"))?;
        info!(listing_id = id.0, user_id = requester.0, "listing updated");
        Ok(())
    }

    /// Fails `NotFound` or `Forbidden` unless `requester` owns the listing.
    pub async fn ensure_owner(
        &self,
        id: ListingId,
        requester: UserId,
    ) -> Result<(), MarketplaceError> {
        require_owner(self.store.as_ref(), requester, Resource::Listing(id)).await
    }

    /// Stores each file then records them in upload order. Files written before a failure
    /// are removed again.
    pub async fn attach_images(
        &self,
        id: ListingId,
        requester: UserId,
        images: Vec<UploadedImage>,
    ) -> Result<Vec<ImageRef>, MarketplaceError> {
        require_owner(self.store.as_ref(), requester, Resource::Listing(id)).await?;

        if images.is_empty() {
            return Err(MarketplaceError::invalid("no images were uploaded"));
        }
        if images.len() > self.max_images {
            return Err(MarketplaceError::invalid(format!(
                "at most {} images may be uploaded at once, got {}",
                self.max_images,
                images.len()
            )));
        }
        for image in &images {
            image.validate()?;
        }

        let mut paths = Vec::with_capacity(images.len());
        for image in &images {
            match self.images.store(id, image).await {
                Ok(path) => paths.push(path),
                Err(err) => {
                    self.discard(&paths).await;
                    return Err(err.into());
                }
            }
        }

        match self.store.insert_images(id, &paths).await {
            Ok(stored) => {
                info!(listing_id = id.0, count = stored.len(), "listing images attached");
                Ok(stored)
            }
            Err(err) => {
                self.discard(&paths).await;
                Err(MarketplaceError::missing("listing")(err))
            }
        }
    }

    /// Marks the listing inactive. Deleting an inactive listing again succeeds.
    pub async fn soft_delete(
        &self,
        id: ListingId,
        requester: UserId,
    ) -> Result<(), MarketplaceError> {
        require_owner(self.store.as_ref(), requester, Resource::Listing(id)).await?;

        self.store
            .set_listing_status(id, ListingStatus::Inactive)
            .await
            .map_err(MarketplaceError::missing("listing"))?;
        info!(listing_id = id.0, user_id = requester.0, "listing deactivated");
        Ok(())
    }

    /// Creates the listing, then attaches `images`. Only a failed create is an error.
    pub async fn publish(
        &self,
        owner: UserId,
        draft: &ListingDraft,
        images: Vec<UploadedImage>,
    ) -> Result<PublishOutcome, MarketplaceError> {
        let listing_id = self.create(owner, draft).await?;
        if images.is_empty() {
            return Ok(PublishOutcome::Published {
                listing_id,
                images: Vec::new(),
            });
        }

        match self.attach_images(listing_id, owner, images).await {
            Ok(images) => Ok(PublishOutcome::Published { listing_id, images }),
            Err(error) => {
                warn!(listing_id = listing_id.0, %error, "listing published without images");
                Ok(PublishOutcome::ImagesFailed { listing_id, error })
            }
        }
    }

    async fn discard(&self, paths: &[String]) {
        for path in paths {
            if let Err(err) = self.images.remove(path).await {
                warn!(%path, error = %err, "could not remove orphaned image");
            }
        }
    }
}

/// Reads the `max_rent` query value. Absent or blank means no bound.
pub fn parse_max_rent(raw: Option<&str>) -> Result<Option<f64>, MarketplaceError> {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };

    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(Some(value)),
        _ => Err(MarketplaceError::invalid(format!(
            "max_rent '{raw}' must be a non-negative number"
        ))),
    }
}
