//! OPC UA client settings extracted from data-address properties.

use crate::domain::DataAddress;

pub const ENDPOINT_URL: &str = "opcua.endpoint.url";
pub const SECURITY_POLICY: &str = "opcua.security.policy";
pub const IDENTITY_PROVIDER: &str = "opcua.identity.provider";

/// How the client authenticates against the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpcUaIdentity {
    Anonymous,
    UserName { user: String, password: String },
}

/// Validated client configuration for one OPC UA endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpcUaClientSettings {
    pub endpoint_url: String,
    /// Security policy name as used on the wire, e.g. `None` or
    /// `Basic256Sha256`
    pub security_policy: String,
    pub identity: OpcUaIdentity,
}

impl OpcUaClientSettings {
    /// Extract the client settings from address properties. Each of the
    /// three keys must be present and non-empty; the failure message names
    /// the offending key.
    pub fn from_address(address: &DataAddress) -> Result<Self, String> {
        let endpoint_url = required(address, ENDPOINT_URL)?;
        let security_policy = required(address, SECURITY_POLICY)?;
        let identity_provider = required(address, IDENTITY_PROVIDER)?;

        let identity = parse_identity(&identity_provider)?;

        Ok(Self {
            endpoint_url,
            security_policy,
            identity,
        })
    }
}

fn required(address: &DataAddress, key: &str) -> Result<String, String> {
    address
        .property(key)
        .map(str::to_string)
        .ok_or_else(|| format!("Missing `{}` config", key))
}

/// `anonymous`, or `username:<user>:<password>`.
fn parse_identity(value: &str) -> Result<OpcUaIdentity, String> {
    if value.eq_ignore_ascii_case("anonymous") {
        return Ok(OpcUaIdentity::Anonymous);
    }
    if let Some(rest) = value.strip_prefix("username:") {
        if let Some((user, password)) = rest.split_once(':') {
            if !user.is_empty() {
                return Ok(OpcUaIdentity::UserName {
                    user: user.to_string(),
                    password: password.to_string(),
                });
            }
        }
    }
    Err(format!(
        "Unsupported `{}` value `{}`",
        IDENTITY_PROVIDER, value
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> DataAddress {
        DataAddress::new("OpcUa")
            .with_property(ENDPOINT_URL, "opc.tcp://localhost:4840")
            .with_property(IDENTITY_PROVIDER, "anonymous")
            .with_property(SECURITY_POLICY, "None")
    }

    #[test]
    fn verify_client_settings() {
        let settings = OpcUaClientSettings::from_address(&address()).unwrap();

        assert_eq!(settings.endpoint_url, "opc.tcp://localhost:4840");
        assert_eq!(settings.security_policy, "None");
        assert_eq!(settings.identity, OpcUaIdentity::Anonymous);
    }

    #[test]
    fn fails_if_missing_endpoint_url() {
        let address = DataAddress::new("OpcUa")
            .with_property(IDENTITY_PROVIDER, "anonymous")
            .with_property(SECURITY_POLICY, "None");

        let err = OpcUaClientSettings::from_address(&address).unwrap_err();
        assert!(err.contains("`opcua.endpoint.url`"));
    }

    #[test]
    fn fails_if_missing_security_policy() {
        let mut address = address();
        address.properties.remove(SECURITY_POLICY);

        let err = OpcUaClientSettings::from_address(&address).unwrap_err();
        assert!(err.contains("`opcua.security.policy`"));
    }

    #[test]
    fn fails_if_missing_identity_provider() {
        let mut address = address();
        address.properties.remove(IDENTITY_PROVIDER);

        let err = OpcUaClientSettings::from_address(&address).unwrap_err();
        assert!(err.contains("`opcua.identity.provider`"));
    }

    #[test]
    fn parses_username_identity() {
        let address = address().with_property(IDENTITY_PROVIDER, "username:plc-reader:s3cret");

        let settings = OpcUaClientSettings::from_address(&address).unwrap();
        assert_eq!(
            settings.identity,
            OpcUaIdentity::UserName {
                user: "plc-reader".to_string(),
                password: "s3cret".to_string(),
            }
        );
    }

    #[test]
    fn rejects_malformed_identity() {
        let address = address().with_property(IDENTITY_PROVIDER, "certificate:foo");

        assert!(OpcUaClientSettings::from_address(&address).is_err());
    }
}
