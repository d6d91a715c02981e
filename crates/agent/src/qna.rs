use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use citabot_core::errors::ClassifierError;
use citabot_core::{Role, Turn};

/// Document-grounded question answering backend.
#[async_trait]
pub trait QnaClient: Send + Sync {
    async fn answer(&self, prompt: &str, transcript: &[Turn]) -> Result<String, ClassifierError>;
}

/// Webhook-backed Q&A client. Posts the newest message plus the trailing
/// transcript window and accepts either a JSON body bearing the answer under
/// a known field or a bare text body.
pub struct HttpQnaClient {
    client: Client,
    webhook_url: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct QnaPayload<'a> {
    mensaje: &'a str,
    historial: Vec<HistoryEntry<'a>>,
}

#[derive(Serialize)]
struct HistoryEntry<'a> {
    rol: &'static str,
    texto: &'a str,
}

impl HttpQnaClient {
    pub fn new(webhook_url: String, timeout: Duration) -> Self {
        Self { client: Client::new(), webhook_url, timeout }
    }
}

#[async_trait]
impl QnaClient for HttpQnaClient {
    async fn answer(&self, prompt: &str, transcript: &[Turn]) -> Result<String, ClassifierError> {
        let payload = QnaPayload {
            mensaje: prompt,
            historial: transcript
                .iter()
                .map(|turn| HistoryEntry {
                    rol: match turn.role {
                        Role::Customer => "cliente",
                        Role::Assistant => "asistente",
                    },
                    texto: &turn.text,
                })
                .collect(),
        };

        let response = self
            .client
            .post(&self.webhook_url)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|error| ClassifierError::Request(error.to_string()))?;

        if !response.status().is_success() {
            return Err(ClassifierError::Request(format!(
                "qna webhook returned {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|error| ClassifierError::Request(error.to_string()))?;

        extract_answer(&body)
    }
}

/// Pulls the answer text out of a heterogeneous webhook body: a JSON object
/// with one of the known answer fields, or a bare text body.
fn extract_answer(body: &str) -> Result<String, ClassifierError> {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for field in ["respuesta", "reply", "answer"] {
            if let Some(answer) = value.get(field).and_then(Value::as_str) {
                return non_empty(answer);
            }
        }
        if let Some(answer) = value.as_str() {
            return non_empty(answer);
        }
        return Err(ClassifierError::Shape(
            "json body carries no recognized answer field".to_owned(),
        ));
    }
    non_empty(body)
}

fn non_empty(answer: &str) -> Result<String, ClassifierError> {
    let answer = answer.trim();
    if answer.is_empty() {
        return Err(ClassifierError::Shape("empty answer body".to_owned()));
    }
    Ok(answer.to_owned())
}
