use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{info, warn};

use citabot_core::{BookingGateway, BookingRequest};

use crate::availability::truthy;

/// Booking write against the scheduler webhook. The engine calls this at most
/// once per confirmed conversation; a `false` here means the customer was
/// told the booking failed and must start over.
pub struct WebhookBookingGateway {
    client: Client,
    webhook_url: String,
    timeout: Duration,
}

impl WebhookBookingGateway {
    pub fn new(webhook_url: String, timeout: Duration) -> Self {
        Self { client: Client::new(), webhook_url, timeout }
    }
}

#[async_trait]
impl BookingGateway for WebhookBookingGateway {
    async fn submit(&self, request: &BookingRequest) -> bool {
        let payload = json!({
            "nombre": request.name,
            "telefono": request.contact,
            "servicio": request.service_name,
            "duracion": request.duration_minutes,
            "fecha": request.date,
            "hora": request.time,
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
                    event_name = "calendar.booking.request_failed",
                    error = %error,
                    "booking webhook unreachable"
                );
                return false;
            }
        };

        let transport_ok = response.status().is_success();
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let parsed = if body.trim().is_empty() {
            None
        } else {
            serde_json::from_str::<Value>(&body).ok()
        };

        let verdict = booking_verdict(parsed.as_ref(), transport_ok);
        if verdict.legacy_fallback {
            warn!(
                event_name = "calendar.booking.legacy_fallback",
                %status,
                "booking webhook sent no structured verdict, trusting status code"
            );
        }
        if verdict.success {
            info!(
                event_name = "calendar.booking.confirmed",
                service = %request.service_name,
                date = %request.date,
                time = %request.time,
                "booking accepted by scheduler"
            );
        } else {
            warn!(
                event_name = "calendar.booking.rejected",
                %status,
                "booking webhook did not assert success"
            );
        }
        verdict.success
    }
}

/// Outcome of normalizing a booking webhook response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BookingVerdict {
    pub success: bool,
    /// The body carried no structured verdict at all and the transport status
    /// decided. Kept for deployments whose automation replies with a bare 200.
    pub legacy_fallback: bool,
}

/// Normalizes the webhook body into a booking verdict.
///
/// A structured `exito`/`success` field decides on its own, regardless of the
/// HTTP status: `true` or the string `"true"` (any case) means booked,
/// anything else means failed. Only when the response carries no structured
/// field at all does the transport status stand in for a verdict.
pub fn booking_verdict(payload: Option<&Value>, transport_ok: bool) -> BookingVerdict {
    let fallback = BookingVerdict { success: transport_ok, legacy_fallback: true };

    let Some(payload) = payload else {
        return fallback;
    };
    let record = match payload {
        Value::Array(records) => match records.first() {
            Some(record) => record,
            None => return fallback,
        },
        Value::Object(_) => payload,
        _ => return fallback,
    };

    match record.get("exito").or_else(|| record.get("success")) {
        Some(value) => BookingVerdict { success: truthy(value), legacy_fallback: false },
        None => {
            if record.as_object().is_some_and(|fields| fields.is_empty()) {
                fallback
            } else {
                // A structured record that says something else entirely: do
                // not guess that the booking landed.
                BookingVerdict { success: false, legacy_fallback: false }
            }
        }
    }
}
