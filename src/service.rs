//! Service registry: the in-memory catalog of priced routes.
//!
//! The catalog is embedded at compile time via `include_str!` + `serde_json`, so the
//! gateway carries no filesystem dependency at runtime, then parsed once into a
//! `Vec<Service>` behind an `Arc`.

use serde::{Deserialize, Serialize};

const CATALOG_JSON: &str = include_str!("../catalog/services.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn matches(&self, method: &axum::http::Method) -> bool {
        match self {
            Method::Get => method == axum::http::Method::GET,
            Method::Post => method == axum::http::Method::POST,
        }
    }
}

/// A priced route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub display_name: String,
    pub description: String,
    /// Decimal USD price as a string; see `crate::decimal::price_to_base_units`.
    pub price: String,
    pub method: Method,
    pub path: String,
    pub upstream_provider_tag: String,
    pub cost_estimate: Option<String>,
    pub input_schema: Option<serde_json::Value>,
    pub mime_type: String,
    pub category: String,
}

/// In-memory catalog loaded once from the embedded JSON document.
pub struct ServiceRegistry {
    services: Vec<Service>,
}

impl ServiceRegistry {
    pub fn load_embedded() -> Self {
        let services: Vec<Service> =
            serde_json::from_str(CATALOG_JSON).expect("embedded service catalog is valid JSON");
        Self { services }
    }

    pub fn get(&self, id: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.id == id)
    }

    pub fn all(&self) -> &[Service] {
        &self.services
    }

    /// Exact match on method, prefix match on path up to the query string.
    pub fn match_route(&self, method: &axum::http::Method, path: &str) -> Option<&Service> {
        let path = path.split('?').next().unwrap_or(path);
        self.services
            .iter()
            .find(|s| s.method.matches(method) && path.starts_with(s.path.as_str()))
    }
}

impl Service {
    /// Validates `input` against this service's catalog-declared field/type map.
    ///
    /// The catalog encodes schemas as a flat `{field: type_name}` map rather than a
    /// full JSON Schema document, so this checks field presence and a primitive type
    /// tag per field instead of a general-purpose schema validator.
    pub fn validate_input(&self, input: &serde_json::Value) -> Result<(), String> {
        let Some(schema) = &self.input_schema else {
            return Ok(());
        };
        let Some(fields) = schema.as_object() else {
            return Ok(());
        };
        let Some(input_obj) = input.as_object() else {
            return Err("expected a JSON object".to_string());
        };
        for (field, type_name) in fields {
            let Some(value) = input_obj.get(field) else {
                return Err(format!("missing required field {field:?}"));
            };
            let matches = match type_name.as_str() {
                Some("string") => value.is_string(),
                Some("u32") | Some("u64") | Some("number") => value.is_number(),
                Some("bool") => value.is_boolean(),
                Some("array") => value.is_array(),
                Some("object") => value.is_object(),
                _ => true,
            };
            if !matches {
                return Err(format!(
                    "field {field:?} does not match expected type {type_name}"
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_catalog_loads() {
        let registry = ServiceRegistry::load_embedded();
        assert!(!registry.all().is_empty());
    }

    #[test]
    fn ids_are_unique() {
        let registry = ServiceRegistry::load_embedded();
        let mut ids: Vec<_> = registry.all().iter().map(|s| s.id.clone()).collect();
        let original_len = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), original_len);
    }

    #[test]
    fn match_route_respects_method() {
        let registry = ServiceRegistry::load_embedded();
        let service = &registry.all()[0];
        let wrong_method = if service.method == Method::Get {
            axum::http::Method::POST
        } else {
            axum::http::Method::GET
        };
        assert!(
            registry
                .match_route(&wrong_method, &service.path)
                .map(|s| s.id != service.id)
                .unwrap_or(true)
        );
    }

    #[test]
    fn validate_input_rejects_missing_field() {
        let registry = ServiceRegistry::load_embedded();
        let service = registry.get("image-generate-sdxl").unwrap();
        let err = service
            .validate_input(&serde_json::json!({ "prompt": "a cat" }))
            .unwrap_err();
        assert!(err.contains("width"));
    }

    #[test]
    fn validate_input_rejects_wrong_type() {
        let registry = ServiceRegistry::load_embedded();
        let service = registry.get("image-generate-sdxl").unwrap();
        let err = service
            .validate_input(&serde_json::json!({ "prompt": "a cat", "width": "512", "height": 512 }))
            .unwrap_err();
        assert!(err.contains("width"));
    }

    #[test]
    fn validate_input_accepts_well_formed_input() {
        let registry = ServiceRegistry::load_embedded();
        let service = registry.get("image-generate-sdxl").unwrap();
        let result = service.validate_input(&serde_json::json!({
            "prompt": "a cat",
            "width": 512,
            "height": 512,
        }));
        assert!(result.is_ok());
    }

    #[test]
    fn match_route_ignores_query_string() {
        let registry = ServiceRegistry::load_embedded();
        let service = &registry.all()[0];
        let method = if service.method == Method::Get {
            axum::http::Method::GET
        } else {
            axum::http::Method::POST
        };
        let with_query = format!("{}?foo=bar", service.path);
        let matched = registry.match_route(&method, &with_query).unwrap();
        assert_eq!(matched.id, service.id);
    }
}
