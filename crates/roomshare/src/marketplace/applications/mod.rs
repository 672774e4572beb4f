//! Tenancy applications against listings and the owner's accept/reject decision.

pub mod router;
mod service;

pub use router::application_router;
pub use service::ApplicationService;
