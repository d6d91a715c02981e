//! Intent classifier adapter - document-grounded Q&A fused with intents
//!
//! This crate turns the free-text Q&A backend into the typed
//! `IntentClassifier` seam the dialogue engine consumes:
//! - **Tag parsing** (`intent`) - strips the keyword prefixes the backend
//!   emits and classifies them into the enumerated `Intent` type
//! - **Q&A client** (`qna`) - webhook client for the document-grounded
//!   answering backend
//! - **Classifier** (`classifier`) - glues both behind
//!   `citabot_core::IntentClassifier`
//!
//! The classifier is strictly a translator: it never fills booking fields and
//! a classifier failure never advances the step machine.

pub mod classifier;
pub mod intent;
pub mod qna;

pub use classifier::{NoopIntentClassifier, WebhookIntentClassifier};
pub use intent::parse_tagged_reply;
pub use qna::{HttpQnaClient, QnaClient};
