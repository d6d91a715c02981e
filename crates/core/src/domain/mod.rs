pub mod catalog;
pub mod conversation;

pub use catalog::{Service, ServiceCatalog, SlotCatalog};
pub use conversation::{BookingRequest, Conversation, ConversationId, Role, Step, Turn};
