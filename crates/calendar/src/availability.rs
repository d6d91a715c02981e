use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use citabot_core::AvailabilityGateway;

/// Availability query against the scheduler webhook.
///
/// Any transport failure, non-success status, or unrecognized body shape
/// reads as "not available": it is always safe to ask the customer for
/// another time, never safe to double-book one.
pub struct WebhookAvailabilityGateway {
    client: Client,
    webhook_url: String,
    timeout: Duration,
}

impl WebhookAvailabilityGateway {
    pub fn new(webhook_url: String, timeout: Duration) -> Self {
        Self { client: Client::new(), webhook_url, timeout }
    }
}

#[async_trait]
impl AvailabilityGateway for WebhookAvailabilityGateway {
    async fn query(&self, date: &str, time: &str, duration_minutes: u32) -> bool {
        let payload = json!({
            "fecha": date,
            "hora": time,
            "duracion": duration_minutes,
        });

        let response = match self
            .client
            .post(&self.webhook_url)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(error) => {
                warn!(
                    event_name = "calendar.availability.request_failed",
                    error = %error,
                    "availability webhook unreachable, treating slot as taken"
                );
                return false;
            }
        };

        if !response.status().is_success() {
            warn!(
                event_name = "calendar.availability.bad_status",
                status = %response.status(),
                "availability webhook returned non-success status"
            );
            return false;
        }

        let body = match response.json::<Value>().await {
            Ok(body) => body,
            Err(error) => {
                warn!(
                    event_name = "calendar.availability.bad_body",
                    error = %error,
                    "availability webhook body is not json"
                );
                return false;
            }
        };

        let available = availability_from_payload(&body);
        debug!(
            event_name = "calendar.availability.checked",
            date, time, duration_minutes, available,
            "availability query resolved"
        );
        available
    }
}

/// Collapses the webhook's record array into a single verdict.
///
/// The scheduler answers with one record per calendar it consulted; the slot
/// is free only when every record agrees. An empty array, a non-array body,
/// or a record without a truthy `disponible` field all read as taken.
pub fn availability_from_payload(payload: &Value) -> bool {
    let Some(records) = payload.as_array() else {
        return false;
    };
    if records.is_empty() {
        return false;
    }
    records.iter().all(|record| record.get("disponible").is_some_and(truthy))
}

pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::String(text) => text.eq_ignore_ascii_case("true"),
        _ => false,
    }
}
