use std::sync::Arc;

use async_trait::async_trait;
use chrono::Local;
use tracing::{info, warn};

use crate::domain::catalog::{ServiceCatalog, SlotCatalog};
use crate::domain::conversation::{
    BookingRequest, Conversation, ConversationId, Role, Step, Turn,
};
use crate::errors::{CatalogError, ClassifierError, ValidationError};
use crate::validate;

/// Coarse intent asserted by the Q&A backend for one inbound message.
///
/// Produced by a dedicated parsing step before the engine sees anything; the
/// engine never does ad-hoc string comparisons on classifier output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    GeneralQuestion,
    StartBooking,
    FieldSupplied,
    Confirm,
    Cancel,
    BackendError,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassifiedReply {
    pub intent: Intent,
    /// Free-text reply usable verbatim or as a prefix.
    pub text: String,
}

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(
        &self,
        text: &str,
        transcript: &[Turn],
    ) -> Result<ClassifiedReply, ClassifierError>;
}

/// Availability check against the external scheduler. Implementations fail
/// closed: ambiguous shapes and transport errors resolve to `false`, never to
/// an error past this boundary.
#[async_trait]
pub trait AvailabilityGateway: Send + Sync {
    async fn query(&self, date: &str, time: &str, duration_minutes: u32) -> bool;
}

/// Booking write against the external scheduler. Called at most once per
/// confirmed conversation; fails closed to `false`.
#[async_trait]
pub trait BookingGateway: Send + Sync {
    async fn submit(&self, request: &BookingRequest) -> bool;
}

/// Supplies the service and slot catalogs a conversation freezes when it
/// enters the corresponding selection step.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn services(&self) -> Result<ServiceCatalog, CatalogError>;
    async fn slots(&self, date: &str) -> Result<SlotCatalog, CatalogError>;
}

/// Catalog source for deployments that ship a fixed menu: every conversation
/// freezes the same snapshot.
#[derive(Clone, Debug, Default)]
pub struct StaticCatalogSource {
    pub services: ServiceCatalog,
    pub slots: SlotCatalog,
}

#[async_trait]
impl CatalogSource for StaticCatalogSource {
    async fn services(&self) -> Result<ServiceCatalog, CatalogError> {
        Ok(self.services.clone())
    }

    async fn slots(&self, _date: &str) -> Result<SlotCatalog, CatalogError> {
        Ok(self.slots.clone())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Derive the contact number from the sender address instead of asking,
    /// skipping the explicit contact prompt.
    pub contact_from_sender: bool,
}

/// What the caller must do with the conversation after one message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    Continue,
    Booked,
    Cancelled,
    Aborted,
}

impl Disposition {
    /// Terminal dispositions remove the conversation from the store.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Continue)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::Booked => "booked",
            Self::Cancelled => "cancelled",
            Self::Aborted => "aborted",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineOutcome {
    pub replies: Vec<String>,
    pub disposition: Disposition,
}

/// The per-conversation dialogue engine: consumes one inbound message at a
/// time, advances the step machine, consults the collaborators, and produces
/// the outbound replies.
pub struct DialogueEngine {
    classifier: Option<Arc<dyn IntentClassifier>>,
    availability: Arc<dyn AvailabilityGateway>,
    booking: Arc<dyn BookingGateway>,
    catalogs: Arc<dyn CatalogSource>,
    config: EngineConfig,
}

impl DialogueEngine {
    pub fn new(
        classifier: Option<Arc<dyn IntentClassifier>>,
        availability: Arc<dyn AvailabilityGateway>,
        booking: Arc<dyn BookingGateway>,
        catalogs: Arc<dyn CatalogSource>,
        config: EngineConfig,
    ) -> Self {
        Self { classifier, availability, booking, catalogs, config }
    }

    pub async fn handle_message(
        &self,
        id: &ConversationId,
        conversation: &mut Conversation,
        text: &str,
    ) -> EngineOutcome {
        let text = text.trim();
        conversation.touch();
        conversation.record_turn(Role::Customer, text);

        let classified = match &self.classifier {
            Some(classifier) => {
                match classifier.classify(text, &conversation.transcript_window()).await {
                    Ok(reply) => Some(reply),
                    Err(error) => {
                        warn!(
                            event_name = "dialogue.classifier.call_failed",
                            conversation_id = %id,
                            step = conversation.step.as_str(),
                            error = %error,
                            "classifier failed; conversation left untouched"
                        );
                        return self.reply(
                            conversation,
                            vec![prompts::classifier_retry()],
                            Disposition::Continue,
                        );
                    }
                }
            }
            None => None,
        };

        if let Some(reply) = &classified {
            if reply.intent == Intent::BackendError {
                warn!(
                    event_name = "dialogue.classifier.backend_error",
                    conversation_id = %id,
                    step = conversation.step.as_str(),
                    "classifier asserted its error condition; aborting conversation"
                );
                let text = reply.text.clone();
                return self.reply(conversation, vec![text], Disposition::Aborted);
            }
        }

        let outcome = match conversation.step {
            Step::Start => self.handle_start(conversation, classified).await,
            Step::CollectName => self.handle_collect_name(id, conversation, text).await,
            Step::CollectContact => self.handle_collect_contact(id, conversation, text).await,
            Step::CollectService => self.handle_collect_service(conversation, text),
            Step::CollectDate => self.handle_collect_date(id, conversation, text).await,
            Step::CollectTime => self.handle_collect_time(id, conversation, text).await,
            Step::Confirm => self.handle_confirm(id, conversation, text, classified).await,
        };

        if outcome.disposition.is_terminal() {
            info!(
                event_name = "dialogue.engine.conversation_closed",
                conversation_id = %id,
                disposition = outcome.disposition.as_str(),
                "conversation reached a terminal disposition"
            );
        }
        outcome
    }

    async fn handle_start(
        &self,
        conversation: &mut Conversation,
        classified: Option<ClassifiedReply>,
    ) -> EngineOutcome {
        match classified {
            // Free-form Q&A mode: only an asserted booking intent starts the
            // slot-filling flow, regardless of the literal message content.
            Some(reply) if reply.intent == Intent::StartBooking => {
                conversation.step = Step::CollectName;
                self.reply(conversation, vec![prompts::welcome()], Disposition::Continue)
            }
            Some(reply) => self.reply(conversation, vec![reply.text], Disposition::Continue),
            None => {
                conversation.step = Step::CollectName;
                self.reply(conversation, vec![prompts::welcome()], Disposition::Continue)
            }
        }
    }

    async fn handle_collect_name(
        &self,
        id: &ConversationId,
        conversation: &mut Conversation,
        text: &str,
    ) -> EngineOutcome {
        conversation.name = text.to_owned();
        if self.config.contact_from_sender {
            conversation.contact = id.local_part().to_owned();
            return self.begin_service_selection(id, conversation).await;
        }

        conversation.step = Step::CollectContact;
        let prompt = prompts::ask_contact(&conversation.name);
        self.reply(conversation, vec![prompt], Disposition::Continue)
    }

    async fn handle_collect_contact(
        &self,
        id: &ConversationId,
        conversation: &mut Conversation,
        text: &str,
    ) -> EngineOutcome {
        conversation.contact = text.to_owned();
        self.begin_service_selection(id, conversation).await
    }

    /// Freezes the service catalog snapshot and renders the menu. A catalog
    /// failure here is fatal to the conversation.
    async fn begin_service_selection(
        &self,
        id: &ConversationId,
        conversation: &mut Conversation,
    ) -> EngineOutcome {
        match self.catalogs.services().await {
            Ok(services) => {
                conversation.services = services;
                conversation.step = Step::CollectService;
                let menu = prompts::service_menu(&conversation.services);
                self.reply(conversation, vec![menu], Disposition::Continue)
            }
            Err(error) => {
                warn!(
                    event_name = "dialogue.catalog.services_unavailable",
                    conversation_id = %id,
                    step = conversation.step.as_str(),
                    error = %error,
                    "service catalog unavailable; aborting conversation"
                );
                self.reply(conversation, vec![prompts::catalog_unavailable()], Disposition::Aborted)
            }
        }
    }

    fn handle_collect_service(&self, conversation: &mut Conversation, text: &str) -> EngineOutcome {
        let choice = text.trim();
        if conversation.services.get(choice).is_none() {
            let menu = prompts::invalid_service(&conversation.services);
            return self.reply(conversation, vec![menu], Disposition::Continue);
        }

        conversation.service_id = choice.to_owned();
        conversation.step = Step::CollectDate;
        self.reply(conversation, vec![prompts::ask_date()], Disposition::Continue)
    }

    async fn handle_collect_date(
        &self,
        id: &ConversationId,
        conversation: &mut Conversation,
        text: &str,
    ) -> EngineOutcome {
        let date = match validate::normalize_date(text, Local::now().date_naive()) {
            Ok(date) => date,
            Err(ValidationError::DatePast(_)) => {
                return self.reply(conversation, vec![prompts::date_in_past()], Disposition::Continue);
            }
            Err(_) => {
                return self.reply(
                    conversation,
                    vec![prompts::date_format_help()],
                    Disposition::Continue,
                );
            }
        };

        conversation.date = date;
        match self.catalogs.slots(&conversation.date).await {
            Ok(slots) => {
                conversation.slots = slots;
                conversation.step = Step::CollectTime;
                let menu = prompts::slot_menu(&conversation.slots);
                self.reply(conversation, vec![menu], Disposition::Continue)
            }
            Err(error) => {
                warn!(
                    event_name = "dialogue.catalog.slots_unavailable",
                    conversation_id = %id,
                    date = %conversation.date,
                    error = %error,
                    "slot catalog unavailable; aborting conversation"
                );
                self.reply(conversation, vec![prompts::catalog_unavailable()], Disposition::Aborted)
            }
        }
    }

    async fn handle_collect_time(
        &self,
        id: &ConversationId,
        conversation: &mut Conversation,
        text: &str,
    ) -> EngineOutcome {
        let Ok(time) = validate::normalize_time(text) else {
            return self.reply(conversation, vec![prompts::invalid_time()], Disposition::Continue);
        };
        if !conversation.slots.contains(&time) {
            return self.reply(conversation, vec![prompts::invalid_time()], Disposition::Continue);
        }

        let Some(service) = conversation.services.get(&conversation.service_id) else {
            warn!(
                event_name = "dialogue.engine.service_snapshot_missing",
                conversation_id = %id,
                service_id = %conversation.service_id,
                "stored service id missing from frozen snapshot; aborting conversation"
            );
            return self.reply(
                conversation,
                vec![prompts::catalog_unavailable()],
                Disposition::Aborted,
            );
        };
        let service_name = service.name.clone();
        let duration_minutes = service.duration_minutes;

        conversation.time = time;
        let available = self
            .availability
            .query(&conversation.date, &conversation.time, duration_minutes)
            .await;
        if !available {
            info!(
                event_name = "dialogue.availability.slot_taken",
                conversation_id = %id,
                date = %conversation.date,
                time = %conversation.time,
                "requested slot unavailable; staying in time selection"
            );
            conversation.time.clear();
            return self.reply(conversation, vec![prompts::slot_taken()], Disposition::Continue);
        }

        conversation.step = Step::Confirm;
        let summary = prompts::summary(conversation, &service_name);
        self.reply(conversation, vec![summary], Disposition::Continue)
    }

    async fn handle_confirm(
        &self,
        id: &ConversationId,
        conversation: &mut Conversation,
        text: &str,
        classified: Option<ClassifiedReply>,
    ) -> EngineOutcome {
        let keyword = text.to_lowercase();
        let action = if keyword == "confirmar" {
            Some(Intent::Confirm)
        } else if keyword == "cancelar" {
            Some(Intent::Cancel)
        } else {
            classified
                .map(|reply| reply.intent)
                .filter(|intent| matches!(intent, Intent::Confirm | Intent::Cancel))
        };

        match action {
            Some(Intent::Confirm) => self.submit_booking(id, conversation).await,
            Some(Intent::Cancel) => {
                self.reply(conversation, vec![prompts::cancelled()], Disposition::Cancelled)
            }
            _ => self.reply(conversation, vec![prompts::confirm_reprompt()], Disposition::Continue),
        }
    }

    async fn submit_booking(
        &self,
        id: &ConversationId,
        conversation: &mut Conversation,
    ) -> EngineOutcome {
        let Some(service) = conversation.services.get(&conversation.service_id) else {
            warn!(
                event_name = "dialogue.engine.service_snapshot_missing",
                conversation_id = %id,
                service_id = %conversation.service_id,
                "stored service id missing from frozen snapshot; aborting conversation"
            );
            return self.reply(
                conversation,
                vec![prompts::catalog_unavailable()],
                Disposition::Aborted,
            );
        };

        let request = BookingRequest {
            name: conversation.name.clone(),
            contact: conversation.contact.clone(),
            service_name: service.name.clone(),
            duration_minutes: service.duration_minutes,
            date: conversation.date.clone(),
            time: conversation.time.clone(),
        };

        // Exactly one attempt per confirmation; the conversation terminates
        // whatever the outcome.
        let booked = self.booking.submit(&request).await;
        if booked {
            info!(
                event_name = "dialogue.booking.confirmed",
                conversation_id = %id,
                date = %request.date,
                time = %request.time,
                service = %request.service_name,
                "appointment booked"
            );
            let message = prompts::booking_confirmed(&request);
            self.reply(conversation, vec![message], Disposition::Booked)
        } else {
            warn!(
                event_name = "dialogue.booking.rejected",
                conversation_id = %id,
                date = %request.date,
                time = %request.time,
                "booking gateway reported failure"
            );
            self.reply(conversation, vec![prompts::booking_failed()], Disposition::Aborted)
        }
    }

    fn reply(
        &self,
        conversation: &mut Conversation,
        replies: Vec<String>,
        disposition: Disposition,
    ) -> EngineOutcome {
        for text in &replies {
            conversation.record_turn(Role::Assistant, text.clone());
        }
        EngineOutcome { replies, disposition }
    }
}

mod prompts {
    use crate::domain::catalog::{ServiceCatalog, SlotCatalog};
    use crate::domain::conversation::{BookingRequest, Conversation};

    pub fn welcome() -> String {
        "👋 ¡Bienvenido/a a Peluquería Estilo! Soy tu asistente virtual para agendar citas.\n\n\
         Para comenzar, por favor escribe tu nombre completo:"
            .to_owned()
    }

    pub fn ask_contact(name: &str) -> String {
        format!("¡Gracias {name}! Por favor, comparte tu número de teléfono de contacto:")
    }

    pub fn service_menu(catalog: &ServiceCatalog) -> String {
        format!(
            "¿Qué servicio deseas agendar? Responde con el número correspondiente:\n\n{}",
            catalog.menu_text()
        )
    }

    pub fn invalid_service(catalog: &ServiceCatalog) -> String {
        format!("Por favor, selecciona una opción válida:\n\n{}", catalog.menu_text())
    }

    pub fn ask_date() -> String {
        "Perfecto. ¿Para qué fecha deseas agendar? Por favor, usa el formato DD/MM/YYYY \
         (ejemplo: 10/03/2025):"
            .to_owned()
    }

    pub fn date_format_help() -> String {
        "Por favor, ingresa la fecha en formato DD/MM/YYYY (ejemplo: 10/03/2025):".to_owned()
    }

    pub fn date_in_past() -> String {
        "Esa fecha ya pasó. Por favor, indica una fecha a partir de hoy:".to_owned()
    }

    pub fn slot_menu(slots: &SlotCatalog) -> String {
        format!(
            "Selecciona un horario disponible (responde con la hora exacta):\n\n{}",
            slots.menu_text()
        )
    }

    pub fn invalid_time() -> String {
        "Por favor, selecciona una hora válida de la lista proporcionada.".to_owned()
    }

    pub fn slot_taken() -> String {
        "Lo sentimos, ese horario ya está ocupado. Por favor, selecciona otro horario:".to_owned()
    }

    pub fn summary(conversation: &Conversation, service_name: &str) -> String {
        format!(
            "📝 *Resumen de tu cita:*\n\n\
             Nombre: {}\n\
             Teléfono: {}\n\
             Servicio: {}\n\
             Fecha: {}\n\
             Hora: {}\n\n\
             Para confirmar tu cita, escribe *CONFIRMAR*. Para cancelar, escribe *CANCELAR*.",
            conversation.name,
            conversation.contact,
            service_name,
            conversation.date,
            conversation.time
        )
    }

    pub fn confirm_reprompt() -> String {
        "Por favor, escribe *CONFIRMAR* para agendar tu cita o *CANCELAR* para cancelar el \
         proceso."
            .to_owned()
    }

    pub fn booking_confirmed(request: &BookingRequest) -> String {
        format!(
            "✅ *¡Cita confirmada!*\n\n\
             Tu cita para {} ha sido agendada para el {} a las {}.\n\n\
             Te recordaremos un día antes por este medio. Si necesitas cambiar o cancelar tu \
             cita, por favor contáctanos con al menos 24 horas de anticipación.\n\n\
             ¡Gracias por elegir Peluquería Estilo!",
            request.service_name, request.date, request.time
        )
    }

    pub fn booking_failed() -> String {
        "❌ Lo sentimos, hubo un problema al agendar tu cita. Por favor, intenta nuevamente o \
         contáctanos directamente al teléfono de la peluquería."
            .to_owned()
    }

    pub fn cancelled() -> String {
        "Entendido, hemos cancelado el proceso de reserva. Si deseas agendar en otro momento, \
         solo escribe \"Hola\" para comenzar nuevamente."
            .to_owned()
    }

    pub fn catalog_unavailable() -> String {
        "Lo sentimos, no pudimos cargar la información de la agenda. Por favor, intenta \
         nuevamente más tarde."
            .to_owned()
    }

    pub fn classifier_retry() -> String {
        "Lo sentimos, no pude procesar tu mensaje en este momento. Por favor, intenta \
         nuevamente."
            .to_owned()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use crate::domain::catalog::{ServiceCatalog, SlotCatalog};
    use crate::domain::conversation::{BookingRequest, Conversation, ConversationId, Step};
    use crate::errors::{CatalogError, ClassifierError};

    use super::{
        AvailabilityGateway, BookingGateway, CatalogSource, ClassifiedReply, DialogueEngine,
        Disposition, EngineConfig, Intent, IntentClassifier, StaticCatalogSource,
    };

    struct ScriptedAvailability {
        verdicts: Mutex<VecDeque<bool>>,
        queries: Mutex<Vec<(String, String, u32)>>,
    }

    impl ScriptedAvailability {
        fn with_verdicts(verdicts: Vec<bool>) -> Self {
            Self { verdicts: Mutex::new(verdicts.into()), queries: Mutex::new(Vec::new()) }
        }

        async fn queries(&self) -> Vec<(String, String, u32)> {
            self.queries.lock().await.clone()
        }
    }

    #[async_trait]
    impl AvailabilityGateway for ScriptedAvailability {
        async fn query(&self, date: &str, time: &str, duration_minutes: u32) -> bool {
            self.queries.lock().await.push((date.to_owned(), time.to_owned(), duration_minutes));
            self.verdicts.lock().await.pop_front().unwrap_or(true)
        }
    }

    struct ScriptedBooking {
        result: bool,
        requests: Mutex<Vec<BookingRequest>>,
    }

    impl ScriptedBooking {
        fn succeeding() -> Self {
            Self { result: true, requests: Mutex::new(Vec::new()) }
        }

        fn failing() -> Self {
            Self { result: false, requests: Mutex::new(Vec::new()) }
        }

        async fn requests(&self) -> Vec<BookingRequest> {
            self.requests.lock().await.clone()
        }
    }

    #[async_trait]
    impl BookingGateway for ScriptedBooking {
        async fn submit(&self, request: &BookingRequest) -> bool {
            self.requests.lock().await.push(request.clone());
            self.result
        }
    }

    struct FailingCatalogSource;

    #[async_trait]
    impl CatalogSource for FailingCatalogSource {
        async fn services(&self) -> Result<ServiceCatalog, CatalogError> {
            Err(CatalogError::Fetch("webhook timed out".to_owned()))
        }

        async fn slots(&self, _date: &str) -> Result<SlotCatalog, CatalogError> {
            Err(CatalogError::NotFound)
        }
    }

    struct ScriptedClassifier {
        replies: Mutex<VecDeque<Result<ClassifiedReply, ClassifierError>>>,
    }

    impl ScriptedClassifier {
        fn with_script(replies: Vec<Result<ClassifiedReply, ClassifierError>>) -> Self {
            Self { replies: Mutex::new(replies.into()) }
        }
    }

    #[async_trait]
    impl IntentClassifier for ScriptedClassifier {
        async fn classify(
            &self,
            text: &str,
            _transcript: &[crate::domain::conversation::Turn],
        ) -> Result<ClassifiedReply, ClassifierError> {
            self.replies.lock().await.pop_front().unwrap_or(Ok(ClassifiedReply {
                intent: Intent::GeneralQuestion,
                text: format!("echo: {text}"),
            }))
        }
    }

    fn customer() -> ConversationId {
        ConversationId("5215551234567@c.us".to_owned())
    }

    fn engine(
        availability: Arc<ScriptedAvailability>,
        booking: Arc<ScriptedBooking>,
    ) -> DialogueEngine {
        DialogueEngine::new(
            None,
            availability,
            booking,
            Arc::new(StaticCatalogSource::default()),
            EngineConfig::default(),
        )
    }

    async fn advance_to_confirm(
        engine: &DialogueEngine,
        conversation: &mut Conversation,
    ) -> Vec<String> {
        let id = customer();
        engine.handle_message(&id, conversation, "Hola").await;
        engine.handle_message(&id, conversation, "Juana Pérez").await;
        engine.handle_message(&id, conversation, "5512345678").await;
        engine.handle_message(&id, conversation, "2").await;
        engine.handle_message(&id, conversation, "10/03/2100").await;
        let outcome = engine.handle_message(&id, conversation, "15:00").await;
        outcome.replies
    }

    #[tokio::test]
    async fn happy_path_walks_every_step_and_books() {
        let availability = Arc::new(ScriptedAvailability::with_verdicts(vec![true]));
        let booking = Arc::new(ScriptedBooking::succeeding());
        let engine = engine(availability.clone(), booking.clone());
        let id = customer();
        let mut conversation = Conversation::new(10);

        let welcome = engine.handle_message(&id, &mut conversation, "Hola").await;
        assert_eq!(conversation.step, Step::CollectName);
        assert!(welcome.replies[0].contains("Bienvenido"));

        engine.handle_message(&id, &mut conversation, "Juana Pérez").await;
        assert_eq!(conversation.step, Step::CollectContact);
        assert_eq!(conversation.name, "Juana Pérez");

        let menu = engine.handle_message(&id, &mut conversation, "5512345678").await;
        assert_eq!(conversation.step, Step::CollectService);
        assert!(menu.replies[0].contains("2. Tinte (120 min)"));

        engine.handle_message(&id, &mut conversation, "2").await;
        assert_eq!(conversation.step, Step::CollectDate);
        assert_eq!(conversation.service_id, "2");

        let slots = engine.handle_message(&id, &mut conversation, "10/03/2100").await;
        assert_eq!(conversation.step, Step::CollectTime);
        assert_eq!(conversation.date, "2100-03-10");
        assert!(slots.replies[0].contains("- 15:00"));

        let summary = engine.handle_message(&id, &mut conversation, "15:00").await;
        assert_eq!(conversation.step, Step::Confirm);
        assert!(summary.replies[0].contains("Resumen de tu cita"));
        assert!(summary.replies[0].contains("Tinte"));

        let done = engine.handle_message(&id, &mut conversation, "CONFIRMAR").await;
        assert_eq!(done.disposition, Disposition::Booked);
        assert!(done.replies[0].contains("Cita confirmada"));

        let requests = booking.requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].service_name, "Tinte");
        assert_eq!(requests[0].duration_minutes, 120);
        assert_eq!(requests[0].date, "2100-03-10");
        assert_eq!(requests[0].time, "15:00");

        assert_eq!(availability.queries().await, vec![(
            "2100-03-10".to_owned(),
            "15:00".to_owned(),
            120
        )]);
    }

    #[tokio::test]
    async fn invalid_service_selection_preserves_collected_fields() {
        let engine = engine(
            Arc::new(ScriptedAvailability::with_verdicts(Vec::new())),
            Arc::new(ScriptedBooking::succeeding()),
        );
        let id = customer();
        let mut conversation = Conversation::new(10);

        engine.handle_message(&id, &mut conversation, "Hola").await;
        engine.handle_message(&id, &mut conversation, "Juana Pérez").await;
        engine.handle_message(&id, &mut conversation, "5512345678").await;

        let outcome = engine.handle_message(&id, &mut conversation, "99").await;
        assert_eq!(outcome.disposition, Disposition::Continue);
        assert_eq!(conversation.step, Step::CollectService);
        assert_eq!(conversation.name, "Juana Pérez");
        assert_eq!(conversation.contact, "5512345678");
        assert!(outcome.replies[0].contains("opción válida"));
    }

    #[tokio::test]
    async fn unavailable_slot_clears_time_and_stays_in_time_selection() {
        let availability = Arc::new(ScriptedAvailability::with_verdicts(vec![false, true]));
        let booking = Arc::new(ScriptedBooking::succeeding());
        let engine = engine(availability, booking);
        let id = customer();
        let mut conversation = Conversation::new(10);

        engine.handle_message(&id, &mut conversation, "Hola").await;
        engine.handle_message(&id, &mut conversation, "Juana Pérez").await;
        engine.handle_message(&id, &mut conversation, "5512345678").await;
        engine.handle_message(&id, &mut conversation, "2").await;
        engine.handle_message(&id, &mut conversation, "10/03/2100").await;

        let denied = engine.handle_message(&id, &mut conversation, "15:00").await;
        assert_eq!(conversation.step, Step::CollectTime);
        assert!(conversation.time.is_empty());
        assert_eq!(conversation.name, "Juana Pérez");
        assert_eq!(conversation.service_id, "2");
        assert_eq!(conversation.date, "2100-03-10");
        assert!(denied.replies[0].contains("ocupado"));

        let accepted = engine.handle_message(&id, &mut conversation, "16:00").await;
        assert_eq!(conversation.step, Step::Confirm);
        assert_eq!(conversation.time, "16:00");
        assert!(accepted.replies[0].contains("Resumen"));
    }

    #[tokio::test]
    async fn transport_derived_contact_skips_the_contact_prompt() {
        let engine = DialogueEngine::new(
            None,
            Arc::new(ScriptedAvailability::with_verdicts(Vec::new())),
            Arc::new(ScriptedBooking::succeeding()),
            Arc::new(StaticCatalogSource::default()),
            EngineConfig { contact_from_sender: true },
        );
        let id = customer();
        let mut conversation = Conversation::new(10);

        engine.handle_message(&id, &mut conversation, "Hola").await;
        let menu = engine.handle_message(&id, &mut conversation, "Juana Pérez").await;

        assert_eq!(conversation.step, Step::CollectService);
        assert_eq!(conversation.contact, "5215551234567");
        assert!(menu.replies[0].contains("servicio"));
    }

    #[tokio::test]
    async fn malformed_and_past_dates_reprompt_without_advancing() {
        let engine = engine(
            Arc::new(ScriptedAvailability::with_verdicts(Vec::new())),
            Arc::new(ScriptedBooking::succeeding()),
        );
        let id = customer();
        let mut conversation = Conversation::new(10);

        engine.handle_message(&id, &mut conversation, "Hola").await;
        engine.handle_message(&id, &mut conversation, "Juana Pérez").await;
        engine.handle_message(&id, &mut conversation, "5512345678").await;
        engine.handle_message(&id, &mut conversation, "2").await;

        let malformed = engine.handle_message(&id, &mut conversation, "el martes").await;
        assert_eq!(conversation.step, Step::CollectDate);
        assert!(malformed.replies[0].contains("DD/MM/YYYY"));

        let impossible = engine.handle_message(&id, &mut conversation, "31/13/2100").await;
        assert_eq!(conversation.step, Step::CollectDate);
        assert!(impossible.replies[0].contains("DD/MM/YYYY"));

        let past = engine.handle_message(&id, &mut conversation, "1/1/2020").await;
        assert_eq!(conversation.step, Step::CollectDate);
        assert!(past.replies[0].contains("ya pasó"));
        assert!(conversation.date.is_empty());
    }

    #[tokio::test]
    async fn catalog_failure_aborts_the_conversation() {
        let engine = DialogueEngine::new(
            None,
            Arc::new(ScriptedAvailability::with_verdicts(Vec::new())),
            Arc::new(ScriptedBooking::succeeding()),
            Arc::new(FailingCatalogSource),
            EngineConfig::default(),
        );
        let id = customer();
        let mut conversation = Conversation::new(10);

        engine.handle_message(&id, &mut conversation, "Hola").await;
        engine.handle_message(&id, &mut conversation, "Juana Pérez").await;
        let outcome = engine.handle_message(&id, &mut conversation, "5512345678").await;

        assert_eq!(outcome.disposition, Disposition::Aborted);
        assert!(outcome.replies[0].contains("intenta nuevamente más tarde"));
    }

    #[tokio::test]
    async fn general_questions_stay_in_qa_mode_until_booking_intent() {
        let classifier = Arc::new(ScriptedClassifier::with_script(vec![
            Ok(ClassifiedReply {
                intent: Intent::GeneralQuestion,
                text: "Abrimos de 10:00 a 19:00.".to_owned(),
            }),
            Ok(ClassifiedReply {
                intent: Intent::StartBooking,
                text: "¡Claro! Agendemos tu cita.".to_owned(),
            }),
        ]));
        let engine = DialogueEngine::new(
            Some(classifier),
            Arc::new(ScriptedAvailability::with_verdicts(Vec::new())),
            Arc::new(ScriptedBooking::succeeding()),
            Arc::new(StaticCatalogSource::default()),
            EngineConfig::default(),
        );
        let id = customer();
        let mut conversation = Conversation::new(10);

        let answer = engine.handle_message(&id, &mut conversation, "¿A qué hora abren?").await;
        assert_eq!(conversation.step, Step::Start);
        assert_eq!(answer.replies, vec!["Abrimos de 10:00 a 19:00.".to_owned()]);

        let welcome = engine.handle_message(&id, &mut conversation, "quiero una cita").await;
        assert_eq!(conversation.step, Step::CollectName);
        assert!(welcome.replies[0].contains("Bienvenido"));
    }

    #[tokio::test]
    async fn classifier_transport_failure_leaves_conversation_untouched() {
        let classifier = Arc::new(ScriptedClassifier::with_script(vec![Err(
            ClassifierError::Request("502 from webhook".to_owned()),
        )]));
        let engine = DialogueEngine::new(
            Some(classifier),
            Arc::new(ScriptedAvailability::with_verdicts(Vec::new())),
            Arc::new(ScriptedBooking::succeeding()),
            Arc::new(StaticCatalogSource::default()),
            EngineConfig::default(),
        );
        let id = customer();
        let mut conversation = Conversation::new(10);
        conversation.step = Step::CollectDate;
        conversation.name = "Juana Pérez".to_owned();

        let outcome = engine.handle_message(&id, &mut conversation, "10/03/2100").await;
        assert_eq!(outcome.disposition, Disposition::Continue);
        assert_eq!(conversation.step, Step::CollectDate);
        assert_eq!(conversation.name, "Juana Pérez");
        assert!(conversation.date.is_empty());
        assert!(outcome.replies[0].contains("intenta nuevamente"));
    }

    #[tokio::test]
    async fn classifier_backend_error_aborts_with_verbatim_reply() {
        let classifier = Arc::new(ScriptedClassifier::with_script(vec![Ok(ClassifiedReply {
            intent: Intent::BackendError,
            text: "No puedo atenderte en este momento.".to_owned(),
        })]));
        let engine = DialogueEngine::new(
            Some(classifier),
            Arc::new(ScriptedAvailability::with_verdicts(Vec::new())),
            Arc::new(ScriptedBooking::succeeding()),
            Arc::new(StaticCatalogSource::default()),
            EngineConfig::default(),
        );
        let id = customer();
        let mut conversation = Conversation::new(10);

        let outcome = engine.handle_message(&id, &mut conversation, "Hola").await;
        assert_eq!(outcome.disposition, Disposition::Aborted);
        assert_eq!(outcome.replies, vec!["No puedo atenderte en este momento.".to_owned()]);
    }

    #[tokio::test]
    async fn confirm_accepts_classifier_intent_in_place_of_literal() {
        let classifier = Arc::new(ScriptedClassifier::with_script(vec![Ok(ClassifiedReply {
            intent: Intent::Confirm,
            text: "Entendido, confirmo tu cita.".to_owned(),
        })]));
        let availability = Arc::new(ScriptedAvailability::with_verdicts(vec![true]));
        let booking = Arc::new(ScriptedBooking::succeeding());
        let engine = DialogueEngine::new(
            None,
            availability.clone(),
            booking.clone(),
            Arc::new(StaticCatalogSource::default()),
            EngineConfig::default(),
        );
        let id = customer();
        let mut conversation = Conversation::new(10);
        advance_to_confirm(&engine, &mut conversation).await;

        // Swap in the classifier for the confirmation turn.
        let fused = DialogueEngine::new(
            Some(classifier),
            availability,
            booking.clone(),
            Arc::new(StaticCatalogSource::default()),
            EngineConfig::default(),
        );
        let outcome = fused.handle_message(&id, &mut conversation, "sí, dale").await;
        assert_eq!(outcome.disposition, Disposition::Booked);
        assert_eq!(booking.requests().await.len(), 1);
    }

    #[tokio::test]
    async fn unrecognized_confirmation_input_reprompts() {
        let engine = engine(
            Arc::new(ScriptedAvailability::with_verdicts(vec![true])),
            Arc::new(ScriptedBooking::succeeding()),
        );
        let id = customer();
        let mut conversation = Conversation::new(10);
        advance_to_confirm(&engine, &mut conversation).await;

        let outcome = engine.handle_message(&id, &mut conversation, "tal vez").await;
        assert_eq!(outcome.disposition, Disposition::Continue);
        assert_eq!(conversation.step, Step::Confirm);
        assert!(outcome.replies[0].contains("CONFIRMAR"));
    }

    #[tokio::test]
    async fn cancellation_terminates_after_acknowledgement() {
        let booking = Arc::new(ScriptedBooking::succeeding());
        let engine = engine(
            Arc::new(ScriptedAvailability::with_verdicts(vec![true])),
            booking.clone(),
        );
        let id = customer();
        let mut conversation = Conversation::new(10);
        advance_to_confirm(&engine, &mut conversation).await;

        let outcome = engine.handle_message(&id, &mut conversation, "CANCELAR").await;
        assert_eq!(outcome.disposition, Disposition::Cancelled);
        assert!(outcome.replies[0].contains("cancelado el proceso"));
        assert!(booking.requests().await.is_empty());
    }

    #[tokio::test]
    async fn booking_failure_still_terminates_the_conversation() {
        let booking = Arc::new(ScriptedBooking::failing());
        let engine = engine(
            Arc::new(ScriptedAvailability::with_verdicts(vec![true])),
            booking.clone(),
        );
        let id = customer();
        let mut conversation = Conversation::new(10);
        advance_to_confirm(&engine, &mut conversation).await;

        let outcome = engine.handle_message(&id, &mut conversation, "confirmar").await;
        assert_eq!(outcome.disposition, Disposition::Aborted);
        assert!(outcome.replies[0].contains("problema al agendar"));
        assert_eq!(booking.requests().await.len(), 1);
    }
}
