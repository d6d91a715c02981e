use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use citabot_core::{ConversationId, ConversationStore, DialogueEngine};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport send failed: {0}")]
    Send(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

/// One inbound customer message, already resolved to the conversation key the
/// provider addresses the customer by.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub conversation_id: ConversationId,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Inbound side of the messaging provider. `next_message` yields `None` when
/// the stream closes cleanly.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_message(&self) -> Result<Option<InboundMessage>, TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// Outbound side of the messaging provider.
#[async_trait]
pub trait OutboundSender: Send + Sync {
    async fn send(&self, id: &ConversationId, text: &str) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopChatTransport;

#[async_trait]
impl ChatTransport for NoopChatTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_message(&self) -> Result<Option<InboundMessage>, TransportError> {
        Ok(None)
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Sender stand-in for deployments wired without a real provider: replies are
/// logged and dropped.
#[derive(Default)]
pub struct NoopOutboundSender;

#[async_trait]
impl OutboundSender for NoopOutboundSender {
    async fn send(&self, id: &ConversationId, _text: &str) -> Result<(), TransportError> {
        debug!(conversation_id = %id, "noop sender dropped outbound reply");
        Ok(())
    }
}

/// Drives the inbound stream. Each message is handled on its own task so one
/// customer's slow external call never stalls another customer's messages;
/// tasks for the same customer are chained behind the previous one, and the
/// per-conversation lock is held across the outbound sends, so replies for a
/// customer always follow arrival order.
pub struct MessagePump {
    transport: Arc<dyn ChatTransport>,
    sender: Arc<dyn OutboundSender>,
    engine: Arc<DialogueEngine>,
    store: Arc<ConversationStore>,
    reconnect_policy: ReconnectPolicy,
    in_flight: Mutex<HashMap<ConversationId, JoinHandle<()>>>,
}

impl MessagePump {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        sender: Arc<dyn OutboundSender>,
        engine: Arc<DialogueEngine>,
        store: Arc<ConversationStore>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self {
            transport,
            sender,
            engine,
            store,
            reconnect_policy,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub async fn start(&self) -> Result<()> {
        for attempt in 0..=self.reconnect_policy.max_retries {
            match self.connect_and_pump(attempt).await {
                Ok(()) => {
                    self.drain().await;
                    return Ok(());
                }
                Err(transport_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "chat transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "chat transport retries exhausted; continuing process without crash"
                        );
                        self.drain().await;
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), TransportError> {
        info!(attempt, "opening chat transport connection");
        self.transport.connect().await?;
        info!(attempt, "chat transport connected");

        loop {
            let Some(message) = self.transport.next_message().await? else {
                info!(attempt, "chat transport stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };

            debug!(
                event_name = "ingress.chat.message_received",
                conversation_id = %message.conversation_id,
                "received customer message"
            );
            self.dispatch(message).await;
        }
    }

    /// Spawns the handling task for one message. The new task first awaits the
    /// previous task for the same conversation, which pins per-customer
    /// ordering to arrival order no matter how the scheduler interleaves the
    /// spawns.
    async fn dispatch(&self, message: InboundMessage) {
        let conversation_id = message.conversation_id.clone();
        let entry = self.store.checkout(&message.conversation_id).await;
        let previous = {
            let mut in_flight = self.in_flight.lock().await;
            in_flight.retain(|_, task| !task.is_finished());
            in_flight.remove(&message.conversation_id)
        };

        let engine = self.engine.clone();
        let sender = self.sender.clone();
        let store = self.store.clone();
        let task = tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }

            let mut conversation = entry.lock().await;
            let outcome = engine
                .handle_message(&message.conversation_id, &mut conversation, &message.text)
                .await;

            for reply in &outcome.replies {
                if let Err(error) = sender.send(&message.conversation_id, reply).await {
                    warn!(
                        event_name = "egress.chat.send_failed",
                        conversation_id = %message.conversation_id,
                        error = %error,
                        "failed to deliver reply; continuing pump loop"
                    );
                }
            }
            drop(conversation);

            if outcome.disposition.is_terminal() {
                store.remove(&message.conversation_id).await;
            }
        });

        self.in_flight.lock().await.insert(conversation_id, task);
    }

    /// Waits for every spawned handler to finish. Called when the stream ends
    /// so no reply is lost to process teardown.
    async fn drain(&self) {
        let tasks: Vec<JoinHandle<()>> = {
            let mut in_flight = self.in_flight.lock().await;
            in_flight.drain().map(|(_, task)| task).collect()
        };
        for task in tasks {
            let _ = task.await;
        }
    }
}
