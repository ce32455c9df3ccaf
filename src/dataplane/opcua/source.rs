//! OPC UA data source and factory.

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use opcua::client::prelude::*;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::settings::{OpcUaClientSettings, OpcUaIdentity, ENDPOINT_URL};
use super::NODE_ID;
use crate::dataplane::pipeline::{
    DataSource, DataSourceFactory, Part, PartStream, PipelineError,
};
use crate::dataplane::validation::{
    CompositeValidationRule, EmptyValueValidationRule, FnValidationRule, ValidationRule,
};
use crate::domain::{DataAddress, DataFlowRequest};

/// Builds [`OpcUaDataSource`] for `OpcUa` source addresses.
pub struct OpcUaDataSourceFactory {
    validation: CompositeValidationRule,
}

impl OpcUaDataSourceFactory {
    pub fn new() -> Self {
        let validation = CompositeValidationRule::new(vec![
            Box::new(EmptyValueValidationRule::new(NODE_ID)),
            Box::new(EmptyValueValidationRule::new(ENDPOINT_URL)),
            Box::new(FnValidationRule(|address: &DataAddress| {
                OpcUaClientSettings::from_address(address).map(|_| ())?;
                parse_node_ids(address).map(|_| ())
            })),
        ]);
        Self { validation }
    }
}

impl Default for OpcUaDataSourceFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl DataSourceFactory for OpcUaDataSourceFactory {
    fn can_handle(&self, address: &DataAddress) -> bool {
        address.is_type("OpcUa")
    }

    fn validate(&self, address: &DataAddress) -> Result<(), PipelineError> {
        self.validation
            .apply(address)
            .map_err(PipelineError::Validation)
    }

    fn create(&self, request: &DataFlowRequest) -> Result<Box<dyn DataSource>, PipelineError> {
        self.validate(&request.source)?;
        let settings = OpcUaClientSettings::from_address(&request.source)
            .map_err(PipelineError::Validation)?;
        let nodes = parse_node_ids(&request.source).map_err(PipelineError::Validation)?;
        Ok(Box::new(OpcUaDataSource { settings, nodes }))
    }
}

fn parse_node_ids(address: &DataAddress) -> Result<Vec<(String, NodeId)>, String> {
    let raw = address
        .property(NODE_ID)
        .ok_or_else(|| format!("Missing or empty `{}` property", NODE_ID))?;
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<NodeId>()
                .map(|node| (s.to_string(), node))
                .map_err(|_| format!("Invalid node id `{}`", s))
        })
        .collect()
}

/// Reads the configured nodes from the server and yields one JSON part
/// per node. The SDK is synchronous, so all I/O runs on the blocking pool.
pub struct OpcUaDataSource {
    settings: OpcUaClientSettings,
    nodes: Vec<(String, NodeId)>,
}

#[async_trait]
impl DataSource for OpcUaDataSource {
    async fn open_parts(&mut self) -> Result<PartStream, PipelineError> {
        let settings = self.settings.clone();
        let nodes = self.nodes.clone();

        let parts = tokio::task::spawn_blocking(move || read_nodes(&settings, &nodes))
            .await
            .map_err(|e| PipelineError::Source(format!("OPC UA read task failed: {}", e)))??;

        debug!(parts = parts.len(), "OPC UA read complete");
        let parts: Vec<Result<Part, PipelineError>> = parts.into_iter().map(Ok).collect();
        Ok(stream::iter(parts).boxed())
    }
}

fn read_nodes(
    settings: &OpcUaClientSettings,
    nodes: &[(String, NodeId)],
) -> Result<Vec<Part>, PipelineError> {
    let mut client = ClientBuilder::new()
        .application_name("Trellis Dataspace Connector")
        .application_uri("urn:trellis:connector")
        .product_uri("urn:trellis:connector")
        .trust_server_certs(true)
        .create_sample_keypair(true)
        .session_retry_limit(1)
        .client()
        .ok_or_else(|| PipelineError::Source("Invalid OPC UA client configuration".into()))?;

    let security_mode = if settings.security_policy.eq_ignore_ascii_case("none") {
        MessageSecurityMode::None
    } else {
        MessageSecurityMode::SignAndEncrypt
    };
    let endpoint: EndpointDescription = (
        settings.endpoint_url.as_str(),
        settings.security_policy.as_str(),
        security_mode,
        UserTokenPolicy::anonymous(),
    )
        .into();

    let identity = match &settings.identity {
        OpcUaIdentity::Anonymous => IdentityToken::Anonymous,
        OpcUaIdentity::UserName { user, password } => {
            IdentityToken::UserName(user.clone(), password.clone())
        }
    };

    let session = client
        .connect_to_endpoint(endpoint, identity)
        .map_err(|status| {
            PipelineError::Source(format!(
                "OPC UA connect to {} failed: {}",
                settings.endpoint_url, status
            ))
        })?;

    let result = {
        let session = session.read();
        let read_ids: Vec<ReadValueId> =
            nodes.iter().map(|(_, node)| ReadValueId::from(node)).collect();
        session
            .read(&read_ids, TimestampsToReturn::Source, 0.0)
            .map_err(|status| PipelineError::Source(format!("OPC UA read failed: {}", status)))
    };

    let values = match result {
        Ok(values) => values,
        Err(e) => {
            disconnect(&session);
            return Err(e);
        }
    };

    let parts = nodes
        .iter()
        .zip(values.into_iter())
        .map(|((name, _), value)| encode_part(name, value))
        .collect();

    disconnect(&session);
    Ok(parts)
}

fn disconnect(session: &std::sync::Arc<opcua::sync::RwLock<Session>>) {
    let session = session.read();
    session.disconnect();
}

fn encode_part(name: &str, value: DataValue) -> Part {
    let body = json!({
        "nodeId": name,
        "value": value.value.as_ref().map(variant_to_json).unwrap_or(Value::Null),
        "status": value.status.map(|s| s.to_string()),
        "sourceTimestamp": value
            .source_timestamp
            .map(|t| t.as_chrono().to_rfc3339()),
    });
    let content = serde_json::to_vec(&body).unwrap_or_else(|e| {
        warn!(node = name, error = %e, "Failed to encode node value");
        Vec::new()
    });
    Part::new(name, content)
}

fn variant_to_json(variant: &Variant) -> Value {
    match variant {
        Variant::Empty => Value::Null,
        Variant::Boolean(v) => json!(v),
        Variant::SByte(v) => json!(v),
        Variant::Byte(v) => json!(v),
        Variant::Int16(v) => json!(v),
        Variant::UInt16(v) => json!(v),
        Variant::Int32(v) => json!(v),
        Variant::UInt32(v) => json!(v),
        Variant::Int64(v) => json!(v),
        Variant::UInt64(v) => json!(v),
        Variant::Float(v) => json!(v),
        Variant::Double(v) => json!(v),
        Variant::String(v) => json!(v.to_string()),
        Variant::DateTime(v) => json!(v.as_chrono().to_rfc3339()),
        Variant::Array(array) => {
            Value::Array(array.values.iter().map(variant_to_json).collect())
        }
        other => json!(format!("{:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataplane::opcua::settings::{IDENTITY_PROVIDER, SECURITY_POLICY};
    use crate::domain::FlowType;

    fn factory() -> OpcUaDataSourceFactory {
        OpcUaDataSourceFactory::new()
    }

    fn valid_address() -> DataAddress {
        DataAddress::new("OpcUa")
            .with_property(NODE_ID, "ns=2;s=temperature")
            .with_property(ENDPOINT_URL, "opc.tcp://localhost:4840")
            .with_property(SECURITY_POLICY, "None")
            .with_property(IDENTITY_PROVIDER, "anonymous")
    }

    fn request_with(source: DataAddress) -> DataFlowRequest {
        DataFlowRequest::new(
            "process-1",
            source,
            DataAddress::new("HttpData").with_property("baseUrl", "http://sink"),
            FlowType::Push,
        )
    }

    #[test]
    fn handles_both_type_spellings() {
        assert!(factory().can_handle(&DataAddress::new("OpcUa")));
        assert!(factory().can_handle(&DataAddress::new("OPC_UA")));
        assert!(!factory().can_handle(&DataAddress::new("HttpData")));
    }

    #[test]
    fn verify_validate_success() {
        assert!(factory().validate(&valid_address()).is_ok());
    }

    #[test]
    fn validate_fails_if_missing_node_id() {
        let mut address = valid_address();
        address.properties.remove(NODE_ID);

        let err = factory().validate(&address).unwrap_err();
        assert!(err.to_string().contains("nodeId"));
    }

    #[test]
    fn validate_fails_if_missing_endpoint_url() {
        let mut address = valid_address();
        address.properties.remove(ENDPOINT_URL);

        let err = factory().validate(&address).unwrap_err();
        assert!(err.to_string().contains("opcua.endpoint.url"));
    }

    #[test]
    fn validate_fails_on_unparsable_node_id() {
        let address = valid_address().with_property(NODE_ID, "not-a-node-id");

        let err = factory().validate(&address).unwrap_err();
        assert!(err.to_string().contains("not-a-node-id"));
    }

    #[test]
    fn create_fails_on_invalid_address() {
        let request = request_with(DataAddress::new("OpcUa"));

        assert!(factory().create(&request).is_err());
    }

    #[test]
    fn create_builds_source_with_parsed_nodes() {
        let address = valid_address().with_property(
            NODE_ID,
            "ns=2;s=temperature, ns=2;s=pressure",
        );
        let request = request_with(address);

        assert!(factory().create(&request).is_ok());
    }

    #[test]
    fn variant_scalars_map_to_json() {
        assert_eq!(variant_to_json(&Variant::Int32(7)), json!(7));
        assert_eq!(variant_to_json(&Variant::Double(1.5)), json!(1.5));
        assert_eq!(variant_to_json(&Variant::Boolean(true)), json!(true));
        assert_eq!(variant_to_json(&Variant::Empty), Value::Null);
    }
}
