//! Chat transport layer - inbound message pump and outbound sending
//!
//! The messaging provider is abstracted behind two seams: `ChatTransport`
//! for the inbound stream and `OutboundSender` for replies. The
//! `MessagePump` drives the stream, routes each message through the dialogue
//! engine under the conversation store's per-customer lock, and reconnects
//! with bounded backoff when the transport drops.

pub mod pump;

pub use pump::{
    ChatTransport, InboundMessage, MessagePump, NoopChatTransport, NoopOutboundSender,
    OutboundSender, ReconnectPolicy, TransportError,
};
