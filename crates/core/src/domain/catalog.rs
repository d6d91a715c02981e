use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::errors::CatalogError;

/// One bookable service: display name plus duration used for the
/// end-of-window computation on the calendar side.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Service {
    #[serde(alias = "nombre", alias = "name")]
    pub name: String,
    #[serde(alias = "duracion", alias = "duration")]
    pub duration_minutes: u32,
}

/// Mapping from a short menu identifier to a service. Read-only once loaded;
/// conversations hold a frozen snapshot from the moment they entered the
/// service-selection step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceCatalog {
    services: BTreeMap<String, Service>,
}

impl Default for ServiceCatalog {
    fn default() -> Self {
        let mut services = BTreeMap::new();
        services.insert("1".to_owned(), service("Corte de cabello", 30));
        services.insert("2".to_owned(), service("Tinte", 120));
        services.insert("3".to_owned(), service("Peinado", 45));
        services.insert("4".to_owned(), service("Tratamiento capilar", 60));
        services.insert("5".to_owned(), service("Manicura", 45));
        Self { services }
    }
}

fn service(name: &str, duration_minutes: u32) -> Service {
    Service { name: name.to_owned(), duration_minutes }
}

impl ServiceCatalog {
    pub fn new(services: BTreeMap<String, Service>) -> Result<Self, CatalogError> {
        if services.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(Self { services })
    }

    /// Parses a catalog out of loosely-structured text: the first top-level
    /// JSON object wins, prose around it is ignored. The whole catalog is
    /// adopted atomically or not at all.
    pub fn from_embedded_json(text: &str) -> Result<Self, CatalogError> {
        let payload = first_embedded_json(text)?;
        let Value::Object(entries) = payload else {
            return Err(CatalogError::Malformed("expected a JSON object of services".to_owned()));
        };

        let mut services = BTreeMap::new();
        for (id, entry) in entries {
            let parsed: Service = serde_json::from_value(entry)
                .map_err(|error| CatalogError::Malformed(error.to_string()))?;
            services.insert(id, parsed);
        }
        Self::new(services)
    }

    pub fn get(&self, id: &str) -> Option<&Service> {
        self.services.get(id)
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Service)> {
        self.services.iter()
    }

    pub fn menu_text(&self) -> String {
        let mut menu = String::new();
        for (id, service) in &self.services {
            menu.push_str(&format!("{id}. {} ({} min)\n", service.name, service.duration_minutes));
        }
        menu
    }
}

/// Ordered sequence of offerable time-of-day slots, independent of date.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotCatalog {
    slots: Vec<String>,
}

impl Default for SlotCatalog {
    fn default() -> Self {
        let slots = ["10:00", "11:00", "12:00", "13:00", "15:00", "16:00", "17:00", "18:00"];
        Self { slots: slots.iter().map(|slot| (*slot).to_owned()).collect() }
    }
}

impl SlotCatalog {
    pub fn new(slots: Vec<String>) -> Result<Self, CatalogError> {
        if slots.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(Self { slots })
    }

    pub fn from_embedded_json(text: &str) -> Result<Self, CatalogError> {
        let payload = first_embedded_json(text)?;
        let Value::Array(entries) = payload else {
            return Err(CatalogError::Malformed("expected a JSON array of time slots".to_owned()));
        };

        let mut slots = Vec::with_capacity(entries.len());
        for entry in entries {
            let Value::String(slot) = entry else {
                return Err(CatalogError::Malformed("slot entries must be strings".to_owned()));
            };
            slots.push(slot);
        }
        Self::new(slots)
    }

    pub fn contains(&self, time: &str) -> bool {
        self.slots.iter().any(|slot| slot == time)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.slots.iter()
    }

    pub fn menu_text(&self) -> String {
        let mut menu = String::new();
        for slot in &self.slots {
            menu.push_str(&format!("- {slot}\n"));
        }
        menu
    }
}

/// Locates the first top-level JSON value embedded in surrounding prose.
fn first_embedded_json(text: &str) -> Result<Value, CatalogError> {
    for (index, character) in text.char_indices() {
        if character != '{' && character != '[' {
            continue;
        }
        let mut stream = serde_json::Deserializer::from_str(&text[index..]).into_iter::<Value>();
        if let Some(Ok(value)) = stream.next() {
            return Ok(value);
        }
    }
    Err(CatalogError::NotFound)
}
