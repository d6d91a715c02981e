use citabot_core::{ClassifiedReply, Intent};

/// Keyword prefixes the Q&A backend uses to assert an intent. Anything else
/// is a plain document-grounded answer.
const TAGS: [(&str, Intent); 5] = [
    ("AGENDAR_CITA", Intent::StartBooking),
    ("DATO_RECIBIDO", Intent::FieldSupplied),
    ("CONFIRMAR", Intent::Confirm),
    ("CANCELAR", Intent::Cancel),
    ("ERROR", Intent::BackendError),
];

/// Strips and classifies a recognized keyword prefix from a backend reply.
///
/// A tag counts only at the very start of the reply, either alone or followed
/// by a colon and the payload text. Replies that merely contain a tag word
/// mid-sentence stay general questions, verbatim.
pub fn parse_tagged_reply(raw: &str) -> ClassifiedReply {
    let trimmed = raw.trim();
    for (tag, intent) in TAGS {
        let Some(rest) = trimmed.strip_prefix(tag) else {
            continue;
        };
        if rest.is_empty() {
            return ClassifiedReply { intent, text: String::new() };
        }
        if let Some(payload) = rest.trim_start().strip_prefix(':') {
            return ClassifiedReply { intent, text: payload.trim().to_owned() };
        }
    }
    ClassifiedReply { intent: Intent::GeneralQuestion, text: trimmed.to_owned() }
}
