//! Citabot core - the per-conversation dialogue engine
//!
//! This crate holds everything the booking assistant needs that is not an
//! external adapter:
//! - **Domain** (`domain`) - conversations, service/slot catalogs, booking requests
//! - **Dialogue Engine** (`engine`) - the step machine that turns one inbound
//!   message into zero or more outbound replies
//! - **Conversation Store** (`store`) - in-memory registry with per-key
//!   serialization and idle-timeout eviction
//! - **Validation** (`validate`) - date/time normalization for slot filling
//! - **Config** (`config`) - layered TOML + env configuration
//!
//! # Safety Principle
//!
//! The Q&A classifier is strictly a translator. It never fills booking fields
//! or decides availability; those are deterministic decisions made by the
//! step machine and the calendar gateways.

pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod store;
pub mod validate;

pub use domain::catalog::{Service, ServiceCatalog, SlotCatalog};
pub use domain::conversation::{BookingRequest, Conversation, ConversationId, Role, Step, Turn};
pub use engine::{
    AvailabilityGateway, BookingGateway, CatalogSource, ClassifiedReply, DialogueEngine,
    Disposition, EngineConfig, EngineOutcome, Intent, IntentClassifier, StaticCatalogSource,
};
pub use errors::{CatalogError, ClassifierError, ValidationError};
pub use store::ConversationStore;
