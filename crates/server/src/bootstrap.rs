use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use citabot_agent::{HttpQnaClient, WebhookIntentClassifier};
use citabot_calendar::{HttpCatalogSource, WebhookAvailabilityGateway, WebhookBookingGateway};
use citabot_chat::{MessagePump, NoopChatTransport, NoopOutboundSender, ReconnectPolicy};
use citabot_core::config::{AppConfig, CatalogMode, ConfigError, LoadOptions};
use citabot_core::{
    CatalogSource, ConversationStore, DialogueEngine, EngineConfig, IntentClassifier,
    StaticCatalogSource,
};

pub struct Application {
    pub config: AppConfig,
    pub store: Arc<ConversationStore>,
    pub pump: MessagePump,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let calendar_timeout = Duration::from_secs(config.calendar.timeout_secs);
    let availability = Arc::new(WebhookAvailabilityGateway::new(
        config.calendar.availability_webhook_url.clone(),
        calendar_timeout,
    ));
    let booking = Arc::new(WebhookBookingGateway::new(
        config.calendar.booking_webhook_url.clone(),
        calendar_timeout,
    ));

    let catalogs: Arc<dyn CatalogSource> = match config.catalog.mode {
        CatalogMode::Static => Arc::new(StaticCatalogSource::default()),
        CatalogMode::Dynamic => {
            let source_url = config.catalog.source_url.clone().ok_or_else(|| {
                ConfigError::Validation("catalog.source_url must be set in dynamic mode".to_owned())
            })?;
            Arc::new(HttpCatalogSource::new(source_url, calendar_timeout))
        }
    };

    let classifier: Option<Arc<dyn IntentClassifier>> = match (&config.qna.webhook_url, config.qna.enabled) {
        (Some(url), true) => {
            let qna = HttpQnaClient::new(url.clone(), Duration::from_secs(config.qna.timeout_secs));
            Some(Arc::new(WebhookIntentClassifier::new(qna)))
        }
        _ => None,
    };
    info!(
        event_name = "system.bootstrap.classifier_mode",
        enabled = classifier.is_some(),
        "intent classifier wiring resolved"
    );

    let engine = Arc::new(DialogueEngine::new(
        classifier,
        availability,
        booking,
        catalogs,
        EngineConfig { contact_from_sender: config.conversation.contact_from_sender },
    ));
    let store = Arc::new(ConversationStore::new(config.conversation.transcript_window));

    let pump = MessagePump::new(
        Arc::new(NoopChatTransport),
        Arc::new(NoopOutboundSender),
        engine,
        store.clone(),
        ReconnectPolicy {
            max_retries: config.chat.max_reconnects,
            base_delay_ms: config.chat.reconnect_base_delay_ms,
            max_delay_ms: config.chat.reconnect_max_delay_ms,
        },
    );

    info!(
        event_name = "system.bootstrap.ready",
        catalog_mode = ?config.catalog.mode,
        contact_from_sender = config.conversation.contact_from_sender,
        "application bootstrap complete"
    );

    Ok(Application { config, store, pump })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use citabot_core::config::{ConfigOverrides, LoadOptions};
    use citabot_core::{
        AvailabilityGateway, BookingGateway, BookingRequest, ConversationId, Disposition,
        DialogueEngine, EngineConfig, StaticCatalogSource,
    };

    use crate::bootstrap::bootstrap;

    fn valid_overrides() -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                availability_webhook_url: Some("https://hook.example/consulta".to_string()),
                booking_webhook_url: Some("https://hook.example/agenda".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    struct AlwaysFree;

    #[async_trait]
    impl AvailabilityGateway for AlwaysFree {
        async fn query(&self, _date: &str, _time: &str, _duration_minutes: u32) -> bool {
            true
        }
    }

    #[derive(Default)]
    struct RecordingBooking {
        submitted: Mutex<Vec<BookingRequest>>,
    }

    #[async_trait]
    impl BookingGateway for RecordingBooking {
        async fn submit(&self, request: &BookingRequest) -> bool {
            self.submitted.lock().await.push(request.clone());
            true
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_webhook_urls() {
        let result = bootstrap(LoadOptions::default()).await;

        assert!(result.is_err());
        let message = result.err().expect("error").to_string();
        assert!(message.contains("availability_webhook_url"));
    }

    #[tokio::test]
    async fn integration_smoke_covers_startup_and_a_full_booking() {
        let app = bootstrap(valid_overrides())
            .await
            .expect("bootstrap should succeed with valid overrides");
        assert!(app.store.is_empty().await);

        // Same store, engine swapped for one with scripted collaborators so
        // the walk stays off the network.
        let booking = Arc::new(RecordingBooking::default());
        let engine = DialogueEngine::new(
            None,
            Arc::new(AlwaysFree),
            booking.clone(),
            Arc::new(StaticCatalogSource::default()),
            EngineConfig::default(),
        );

        let id = ConversationId("5215551234567@c.us".to_string());
        let entry = app.store.checkout(&id).await;
        let mut conversation = entry.lock().await;

        let script = ["Hola", "Juana Pérez", "5512345678", "2", "10/03/2100", "15:00"];
        for message in script {
            let outcome = engine.handle_message(&id, &mut conversation, message).await;
            assert_eq!(outcome.disposition, Disposition::Continue);
        }

        let outcome = engine.handle_message(&id, &mut conversation, "CONFIRMAR").await;
        assert_eq!(outcome.disposition, Disposition::Booked);
        drop(conversation);

        let submitted = booking.submitted.lock().await;
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].service_name, "Tinte");
        assert_eq!(submitted[0].date, "2100-03-10");
        assert_eq!(submitted[0].time, "15:00");

        app.store.remove(&id).await;
        assert!(app.store.is_empty().await);
    }
}
