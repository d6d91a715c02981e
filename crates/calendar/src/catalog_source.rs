use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use citabot_core::errors::CatalogError;
use citabot_core::{CatalogSource, ServiceCatalog, SlotCatalog};

/// Catalog source for deployments that manage the service menu and the slot
/// grid in the scheduler automation instead of shipping them with the bot.
///
/// The automation answers with prose that embeds the catalog as JSON, so the
/// response is fetched as plain text and handed to the embedded-JSON parsers.
pub struct HttpCatalogSource {
    client: Client,
    source_url: String,
    timeout: Duration,
}

impl HttpCatalogSource {
    pub fn new(source_url: String, timeout: Duration) -> Self {
        Self { client: Client::new(), source_url, timeout }
    }

    async fn fetch(&self, payload: Value) -> Result<String, CatalogError> {
        let response = self
            .client
            .post(&self.source_url)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|error| CatalogError::Fetch(error.to_string()))?;

        if !response.status().is_success() {
            return Err(CatalogError::Fetch(format!(
                "catalog webhook returned {}",
                response.status()
            )));
        }

        response.text().await.map_err(|error| CatalogError::Fetch(error.to_string()))
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn services(&self) -> Result<ServiceCatalog, CatalogError> {
        let body = self.fetch(json!({ "tipo": "servicios" })).await?;
        let catalog = ServiceCatalog::from_embedded_json(&body)?;
        debug!(
            event_name = "calendar.catalog.services_fetched",
            count = catalog.len(),
            "service catalog refreshed"
        );
        Ok(catalog)
    }

    async fn slots(&self, date: &str) -> Result<SlotCatalog, CatalogError> {
        let body = self.fetch(json!({ "tipo": "horarios", "fecha": date })).await?;
        let catalog = SlotCatalog::from_embedded_json(&body)?;
        debug!(
            event_name = "calendar.catalog.slots_fetched",
            date,
            count = catalog.len(),
            "slot catalog refreshed"
        );
        Ok(catalog)
    }
}
