//! Ownership checks gating every listing and application mutation.
//!
//! Error precedence is fixed: a resource that cannot be found is reported as `NotFound`
//! before ownership is considered, and a denied check is reported as `Forbidden` before any
//! payload validation or write happens.

use std::fmt;

use tracing::warn;

use super::domain::{ApplicationId, ListingId, UserId};
use super::error::MarketplaceError;
use super::repository::OwnershipResolver;

/// A resource whose mutation is restricted to its owner. Applications are owned by the owner
/// of the listing they reference, not by the applicant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Listing(ListingId),
    Application(ApplicationId),
}

impl Resource {
    pub const fn kind(self) -> &'static str {
        match self {
            Resource::Listing(_) => "listing",
            Resource::Application(_) => "application",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Listing(id) => write!(f, "listing {id}"),
            Resource::Application(id) => write!(f, "application {id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allowed,
    Denied,
}

pub fn authorize_owner(requester: UserId, owner: UserId) -> Access {
    if requester == owner {
        Access::Allowed
    } else {
        Access::Denied
    }
}

/// Resolves the owner of `resource` and requires it to be `requester`.
pub async fn require_owner<R>(
    resolver: &R,
    requester: UserId,
    resource: Resource,
) -> Result<(), MarketplaceError>
where
    R: OwnershipResolver + ?Sized,
{
    let owner = resolver
        .resolve_owner(resource)
        .await?
        .ok_or(MarketplaceError::NotFound(resource.kind()))?;

    match authorize_owner(requester, owner) {
        Access::Allowed => Ok(()),
        Access::Denied => {
            warn!(user_id = requester.0, %resource, "ownership check denied");
            Err(MarketplaceError::Forbidden(resource.kind()))
        }
    }
}
