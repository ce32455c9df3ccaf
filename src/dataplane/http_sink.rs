//! HTTP push sink for `HttpData` destination addresses.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::HeaderValue;
use tracing::debug;

use crate::dataplane::pipeline::{
    DataSink, DataSinkFactory, Part, PartStream, PipelineError, TransferOutcome,
};
use crate::dataplane::validation::{
    CompositeValidationRule, EmptyValueValidationRule, ValidationRule,
};
use crate::domain::{DataAddress, DataFlowRequest};
use crate::shared::retry::{retry_with_backoff, RetryConfig};

/// Destination base URL; parts are POSTed to `{baseUrl}/{part.name}`.
pub const BASE_URL: &str = "baseUrl";
/// When `true`, every part is POSTed to the bare base URL instead.
pub const ONE_GO: &str = "oneGo";
/// Optional header name/value pair attached to every request.
pub const AUTH_KEY: &str = "authKey";
pub const AUTH_CODE: &str = "authCode";

pub struct HttpDataSinkFactory {
    client: reqwest::Client,
    validation: CompositeValidationRule,
}

impl HttpDataSinkFactory {
    pub fn new(client: reqwest::Client) -> Self {
        let validation =
            CompositeValidationRule::new(vec![Box::new(EmptyValueValidationRule::new(BASE_URL))]);
        Self { client, validation }
    }
}

impl DataSinkFactory for HttpDataSinkFactory {
    fn can_handle(&self, address: &DataAddress) -> bool {
        address.is_type("HttpData")
    }

    fn validate(&self, address: &DataAddress) -> Result<(), PipelineError> {
        self.validation
            .apply(address)
            .map_err(PipelineError::Validation)?;
        let auth_key = address.property(AUTH_KEY);
        let auth_code = address.property(AUTH_CODE);
        if auth_key.is_some() != auth_code.is_some() {
            return Err(PipelineError::Validation(format!(
                "`{}` and `{}` must be provided together",
                AUTH_KEY, AUTH_CODE
            )));
        }
        Ok(())
    }

    fn create(&self, request: &DataFlowRequest) -> Result<Box<dyn DataSink>, PipelineError> {
        self.validate(&request.destination)?;
        let destination = &request.destination;
        let base_url = destination
            .required_property(BASE_URL)
            .map_err(|e| PipelineError::Validation(e.to_string()))?
            .trim_end_matches('/')
            .to_string();
        let auth = match (destination.property(AUTH_KEY), destination.property(AUTH_CODE)) {
            (Some(key), Some(code)) => Some((key.to_string(), code.to_string())),
            _ => None,
        };
        let one_go = destination
            .property(ONE_GO)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Box::new(HttpDataSink {
            client: self.client.clone(),
            base_url,
            auth,
            one_go,
        }))
    }
}

pub struct HttpDataSink {
    client: reqwest::Client,
    base_url: String,
    auth: Option<(String, String)>,
    one_go: bool,
}

impl HttpDataSink {
    fn part_url(&self, part: &Part) -> String {
        if self.one_go {
            self.base_url.clone()
        } else {
            format!("{}/{}", self.base_url, part.name)
        }
    }

    async fn post_part(&self, part: &Part) -> Result<(), PipelineError> {
        let url = self.part_url(part);
        let mut request = self
            .client
            .post(&url)
            .body(part.content.clone())
            .header("content-type", "application/octet-stream");
        if let Some((key, code)) = &self.auth {
            let value = HeaderValue::from_str(code)
                .map_err(|_| PipelineError::Sink("Invalid auth header value".to_string()))?;
            request = request.header(key.as_str(), value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PipelineError::Sink(format!("POST {} failed: {}", url, e)))?;
        if !response.status().is_success() {
            return Err(PipelineError::Sink(format!(
                "POST {} returned {}",
                url,
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DataSink for HttpDataSink {
    async fn transfer(&mut self, mut parts: PartStream) -> Result<TransferOutcome, PipelineError> {
        let mut outcome = TransferOutcome::default();
        while let Some(part) = parts.next().await {
            let part = part?;
            retry_with_backoff(
                RetryConfig::quick(),
                || self.post_part(&part),
                |err| matches!(err, PipelineError::Sink(_)),
                "http_sink_post",
            )
            .await?;

            outcome.parts += 1;
            outcome.bytes += part.len() as u64;
            metrics::counter!("data_flow_parts_total").increment(1);
            metrics::counter!("data_flow_bytes_total").increment(part.len() as u64);
        }
        debug!(parts = outcome.parts, bytes = outcome.bytes, "HTTP sink drained source");
        Ok(outcome)
    }
}
