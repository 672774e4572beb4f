//! Room listings: creation, browsing, owner edits, image attachment and soft delete.

pub mod router;
mod service;

pub use router::{listing_router, IMAGE_FIELD};
pub use service::{parse_max_rent, ListingService, PublishOutcome};
