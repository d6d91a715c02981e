use async_trait::async_trait;
use tracing::debug;

use citabot_core::errors::ClassifierError;
use citabot_core::{ClassifiedReply, Intent, IntentClassifier, Turn};

use crate::intent::parse_tagged_reply;
use crate::qna::QnaClient;

/// Fuses the Q&A backend with the tag parser: one webhook round trip, one
/// typed `ClassifiedReply` for the engine.
pub struct WebhookIntentClassifier<Q> {
    qna: Q,
}

impl<Q> WebhookIntentClassifier<Q>
where
    Q: QnaClient,
{
    pub fn new(qna: Q) -> Self {
        Self { qna }
    }
}

#[async_trait]
impl<Q> IntentClassifier for WebhookIntentClassifier<Q>
where
    Q: QnaClient + 'static,
{
    async fn classify(
        &self,
        text: &str,
        transcript: &[Turn],
    ) -> Result<ClassifiedReply, ClassifierError> {
        let raw = self.qna.answer(text, transcript).await?;
        let reply = parse_tagged_reply(&raw);
        debug!(
            event_name = "agent.classifier.reply_parsed",
            intent = ?reply.intent,
            "classified backend reply"
        );
        Ok(reply)
    }
}

/// Classifier stand-in for tests and wiring defaults: every message is a
/// general question answered with a fixed line.
#[derive(Default)]
pub struct NoopIntentClassifier;

#[async_trait]
impl IntentClassifier for NoopIntentClassifier {
    async fn classify(
        &self,
        _text: &str,
        _transcript: &[Turn],
    ) -> Result<ClassifiedReply, ClassifierError> {
        Ok(ClassifiedReply {
            intent: Intent::GeneralQuestion,
            text: "Puedo ayudarte a agendar una cita en Peluquería Estilo.".to_owned(),
        })
    }
}
