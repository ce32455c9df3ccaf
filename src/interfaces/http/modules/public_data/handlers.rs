//! Serves transfer data to consumers presenting a valid pull token.
//!
//! The token binds the request to one transfer process and its source
//! address; the handler opens the source through the pipeline and returns
//! the parts as one JSON document.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    Json,
};
use futures_util::StreamExt;
use serde_json::{Map, Value};
use tracing::warn;

use crate::dataplane::{PipelineService, TokenService};
use crate::domain::{DataAddress, DataFlowRequest, FlowType};
use crate::interfaces::http::common::ApiResponse;

/// Public data endpoint state
#[derive(Clone)]
pub struct PublicDataState {
    pub token_service: Arc<TokenService>,
    pub pipeline: Arc<PipelineService>,
}

type PublicError = (StatusCode, Json<ApiResponse<()>>);

fn unauthorized(message: String) -> PublicError {
    (StatusCode::UNAUTHORIZED, Json(ApiResponse::error(message)))
}

fn bad_gateway(message: String) -> PublicError {
    (StatusCode::BAD_GATEWAY, Json(ApiResponse::error(message)))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

#[utoipa::path(
    get,
    path = "/api/v1/public/data",
    tag = "Public Data",
    responses(
        (status = 200, description = "Source data, one entry per part"),
        (status = 401, description = "Missing, invalid or expired token"),
        (status = 502, description = "Source could not be read")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_data(
    State(state): State<PublicDataState>,
    headers: HeaderMap,
) -> Result<Json<Value>, PublicError> {
    let token = bearer_token(&headers)
        .ok_or_else(|| unauthorized("Missing bearer token".to_string()))?;
    let claims = state
        .token_service
        .validate(token)
        .map_err(|e| unauthorized(e.to_string()))?;
    let source = claims
        .source_address()
        .map_err(|e| unauthorized(e.to_string()))?;

    // The destination is ourselves; the pipeline only needs the source leg
    let request = DataFlowRequest::new(
        &claims.sub,
        source,
        DataAddress::new("HttpProxy"),
        FlowType::Pull,
    );

    let mut data_source = state
        .pipeline
        .open_source(&request)
        .map_err(|e| bad_gateway(e.to_string()))?;
    let result = read_all_parts(&mut *data_source).await;
    data_source.close().await;

    match result {
        Ok(parts) => Ok(Json(Value::Object(parts))),
        Err(e) => {
            warn!(process_id = %claims.sub, error = %e, "Pull request failed");
            Err(bad_gateway(e))
        }
    }
}

async fn read_all_parts(
    source: &mut dyn crate::dataplane::DataSource,
) -> Result<Map<String, Value>, String> {
    let mut parts = source.open_parts().await.map_err(|e| e.to_string())?;
    let mut document = Map::new();
    while let Some(part) = parts.next().await {
        let part = part.map_err(|e| e.to_string())?;
        let value = serde_json::from_slice(&part.content).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&part.content).into_owned())
        });
        document.insert(part.name, value);
    }
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataplane::pipeline::{
        DataSource, DataSourceFactory, Part, PartStream, PipelineError,
    };
    use async_trait::async_trait;
    use futures_util::stream;

    struct JsonSource;

    #[async_trait]
    impl DataSource for JsonSource {
        async fn open_parts(&mut self) -> Result<PartStream, PipelineError> {
            let parts = vec![
                Ok(Part::new("ns=2;s=temperature", r#"{"value": 21.5}"#)),
                Ok(Part::new("raw", "not json")),
            ];
            Ok(stream::iter(parts).boxed())
        }
    }

    struct JsonSourceFactory;

    impl DataSourceFactory for JsonSourceFactory {
        fn can_handle(&self, address: &DataAddress) -> bool {
            address.is_type("Json")
        }
        fn validate(&self, _address: &DataAddress) -> Result<(), PipelineError> {
            Ok(())
        }
        fn create(&self, _request: &DataFlowRequest) -> Result<Box<dyn DataSource>, PipelineError> {
            Ok(Box::new(JsonSource))
        }
    }

    #[tokio::test]
    async fn parts_become_json_document() {
        let mut source = JsonSource;
        let document = read_all_parts(&mut source).await.unwrap();

        assert_eq!(document["ns=2;s=temperature"]["value"], 21.5);
        assert_eq!(document["raw"], Value::String("not json".to_string()));
    }

    #[tokio::test]
    async fn handler_rejects_bad_token() {
        let mut pipeline = PipelineService::new();
        pipeline.register_source_factory(Arc::new(JsonSourceFactory));
        let state = PublicDataState {
            token_service: Arc::new(TokenService::new("secret", 600)),
            pipeline: Arc::new(pipeline),
        };

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer garbage".parse().unwrap());
        let result = get_data(State(state), headers).await;

        let (status, _) = result.err().unwrap();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn handler_serves_data_for_valid_token() {
        let mut pipeline = PipelineService::new();
        pipeline.register_source_factory(Arc::new(JsonSourceFactory));
        let token_service = Arc::new(TokenService::new("secret", 600));
        let token = token_service
            .issue("process-1", &DataAddress::new("Json"))
            .unwrap();
        let state = PublicDataState {
            token_service,
            pipeline: Arc::new(pipeline),
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            format!("Bearer {}", token).parse().unwrap(),
        );
        let Json(document) = get_data(State(state), headers).await.unwrap();

        assert_eq!(document["ns=2;s=temperature"]["value"], 21.5);
    }
}
