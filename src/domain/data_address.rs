//! Data address — an opaque, typed pointer to where data lives or goes.
//!
//! The `address_type` selects the data-plane adapter (e.g. `OpcUa`,
//! `HttpData`); `properties` carry the adapter-specific keys.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::error::{DomainError, DomainResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataAddress {
    /// Adapter discriminator, matched case-insensitively by factories
    #[serde(rename = "type")]
    pub address_type: String,
    /// Adapter-specific properties
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

impl DataAddress {
    pub fn new(address_type: impl Into<String>) -> Self {
        Self {
            address_type: address_type.into(),
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Look up a property, treating an empty string as absent.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn required_property(&self, key: &str) -> DomainResult<&str> {
        self.property(key)
            .ok_or_else(|| DomainError::Validation(format!("Missing `{}` property", key)))
    }

    /// Case-insensitive type match; `_` and `-` are ignored so `OPC_UA`
    /// and `OpcUa` select the same adapter.
    pub fn is_type(&self, address_type: &str) -> bool {
        normalize_type(&self.address_type) == normalize_type(address_type)
    }
}

fn normalize_type(value: &str) -> String {
    value
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .collect::<String>()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_match_is_case_and_separator_insensitive() {
        let address = DataAddress::new("OPC_UA");
        assert!(address.is_type("OpcUa"));
        assert!(address.is_type("opcua"));
        assert!(!address.is_type("HttpData"));
    }

    #[test]
    fn empty_property_counts_as_missing() {
        let address = DataAddress::new("HttpData").with_property("baseUrl", "");
        assert!(address.property("baseUrl").is_none());
        assert!(address.required_property("baseUrl").is_err());
    }

    #[test]
    fn required_property_returns_value() {
        let address = DataAddress::new("HttpData").with_property("baseUrl", "http://sink");
        assert_eq!(address.required_property("baseUrl").unwrap(), "http://sink");
    }
}
