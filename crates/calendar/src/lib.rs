//! Scheduler webhook adapters - availability reads, booking writes, catalogs
//!
//! Everything in this crate talks to the external calendar automation over
//! plain HTTP webhooks and normalizes its loosely-shaped responses:
//! - **Availability** (`availability`) - slot availability query, fail closed
//! - **Booking** (`booking`) - the single booking write per confirmed
//!   conversation
//! - **Catalog source** (`catalog_source`) - fetches service and slot menus
//!   for deployments that manage them remotely
//!
//! Normalization is split into pure functions so the truth tables are testable
//! without a live webhook.

pub mod availability;
pub mod booking;
pub mod catalog_source;

pub use availability::{availability_from_payload, WebhookAvailabilityGateway};
pub use booking::{booking_verdict, BookingVerdict, WebhookBookingGateway};
pub use catalog_source::HttpCatalogSource;
