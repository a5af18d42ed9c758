//! # Alfa CRM surface
//!
//! Everything the payment backend needs from Zoho CRM:
//!
//! - [`CrmRecord`]: dynamic candidate records with fallback-aware
//!   field accessors
//! - [`Criteria`]: AND-composed search criteria
//! - [`RateLimiter`]: sliding-window admission control for the CRM
//!   API budget
//! - [`CrmApi`] / [`ZohoClient`]: the API seam and its production
//!   implementation

pub mod client;
pub mod criteria;
pub mod error;
pub mod rate_limit;
pub mod record;

pub use client::{BulkUpdateItem, CrmApi, ZohoClient, ZohoConfig, ZohoRegion, BULK_UPDATE_LIMIT};
pub use criteria::Criteria;
pub use error::{CrmError, CrmResult};
pub use rate_limit::RateLimiter;
pub use record::CrmRecord;

// Re-export async_trait for CrmApi implementors.
pub use async_trait::async_trait;
