//! Access tokens for the public data endpoint.
//!
//! The control plane issues a short-lived HS256 token bound to one transfer
//! process and its source address; the public endpoint validates it before
//! serving any data (consumer pull).

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::domain::{DataAddress, DomainError, DomainResult};

const ISSUER: &str = "trellis-connector";

#[derive(Debug, Serialize, Deserialize)]
pub struct DataPlaneClaims {
    /// Transfer process id
    pub sub: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    /// Source data address, JSON-encoded
    pub dad: String,
}

impl DataPlaneClaims {
    pub fn source_address(&self) -> DomainResult<DataAddress> {
        serde_json::from_str(&self.dad)
            .map_err(|e| DomainError::Validation(format!("Corrupt address claim: {}", e)))
    }
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_seconds: i64,
}

impl TokenService {
    pub fn new(secret: &str, ttl_seconds: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl_seconds,
        }
    }

    /// Issue a token granting pull access to one process's source.
    pub fn issue(&self, process_id: &str, source: &DataAddress) -> DomainResult<String> {
        let now = Utc::now().timestamp();
        let claims = DataPlaneClaims {
            sub: process_id.to_string(),
            iss: ISSUER.to_string(),
            iat: now,
            exp: now + self.ttl_seconds,
            dad: serde_json::to_string(source)
                .map_err(|e| DomainError::Validation(format!("Unencodable address: {}", e)))?,
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| DomainError::Validation(format!("Token encoding failed: {}", e)))
    }

    /// Validate signature, expiry and issuer; returns the claims.
    pub fn validate(&self, token: &str) -> DomainResult<DataPlaneClaims> {
        let mut validation = Validation::default();
        validation.set_issuer(&[ISSUER]);
        validation.leeway = 0;
        decode::<DataPlaneClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| DomainError::Unauthorized(format!("Invalid token: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> DataAddress {
        DataAddress::new("OpcUa")
            .with_property("nodeId", "ns=2;s=temperature")
            .with_property("opcua.endpoint.url", "opc.tcp://localhost:4840")
    }

    #[test]
    fn issue_and_validate_round_trip() {
        let service = TokenService::new("secret", 600);
        let token = service.issue("process-1", &source()).unwrap();

        let claims = service.validate(&token).unwrap();
        assert_eq!(claims.sub, "process-1");
        assert_eq!(claims.source_address().unwrap(), source());
    }

    #[test]
    fn expired_token_is_rejected() {
        let service = TokenService::new("secret", -120);
        let token = service.issue("process-1", &source()).unwrap();

        assert!(matches!(
            service.validate(&token),
            Err(DomainError::Unauthorized(_))
        ));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let issuer = TokenService::new("secret-a", 600);
        let verifier = TokenService::new("secret-b", 600);
        let token = issuer.issue("process-1", &source()).unwrap();

        assert!(verifier.validate(&token).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        let service = TokenService::new("secret", 600);
        assert!(service.validate("not-a-token").is_err());
    }
}
