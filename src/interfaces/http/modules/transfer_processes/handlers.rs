//! Transfer process API handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::info;

use super::dto::{
    IdResponse, PullTokenDto, SuspendTransferDto, TerminateTransferDto, TransferProcessDto,
    TransferProcessFilter, TransferRequestDto, TransferStateDto,
};
use crate::application::TransferProcessService;
use crate::interfaces::http::common::{
    map_domain_error, ApiError, PaginatedResponse, PaginationParams, ValidatedJson,
};

/// Transfer process handler state
#[derive(Clone)]
pub struct TransferAppState {
    pub service: Arc<TransferProcessService>,
}

#[utoipa::path(
    post,
    path = "/api/v1/management/transferprocesses",
    tag = "Transfer Processes",
    request_body = TransferRequestDto,
    responses(
        (status = 200, description = "The transfer was successfully initiated. Returns the \
            transfer process id; note that this only means the transfer was *initiated* — \
            clients must poll the /{id}/state endpoint to track progress", body = IdResponse),
        (status = 400, description = "Request body was malformed")
    ),
    security(("api_key" = []))
)]
pub async fn initiate_transfer_process(
    State(state): State<TransferAppState>,
    ValidatedJson(body): ValidatedJson<TransferRequestDto>,
) -> Result<Json<IdResponse>, ApiError> {
    let process = state
        .service
        .initiate(body.into_domain())
        .await
        .map_err(map_domain_error)?;
    info!(process_id = %process.id, "Transfer process created");
    Ok(Json(IdResponse {
        id: process.id,
        created_at: process.created_at,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/management/transferprocesses",
    tag = "Transfer Processes",
    params(TransferProcessFilter, PaginationParams),
    responses(
        (status = 200, description = "Transfer process list", body = PaginatedResponse<TransferProcessDto>)
    ),
    security(("api_key" = []))
)]
pub async fn list_transfer_processes(
    State(state): State<TransferAppState>,
    Query(filter): Query<TransferProcessFilter>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<PaginatedResponse<TransferProcessDto>>, ApiError> {
    let processes = state.service.list().await.map_err(map_domain_error)?;

    let filtered: Vec<TransferProcessDto> = processes
        .into_iter()
        .filter(|p| {
            if let Some(ref state_filter) = filter.state {
                if !state_filter.eq_ignore_ascii_case(p.state.as_str()) {
                    return false;
                }
            }
            if let Some(ref asset_id) = filter.asset_id {
                if p.asset_id != *asset_id {
                    return false;
                }
            }
            true
        })
        .map(TransferProcessDto::from_domain)
        .collect();

    Ok(Json(PaginatedResponse::paginate(filtered, &pagination)))
}

#[utoipa::path(
    get,
    path = "/api/v1/management/transferprocesses/{id}",
    tag = "Transfer Processes",
    params(("id" = String, Path, description = "Transfer process id")),
    responses(
        (status = 200, description = "Transfer process", body = TransferProcessDto),
        (status = 404, description = "Unknown transfer process")
    ),
    security(("api_key" = []))
)]
pub async fn get_transfer_process(
    State(state): State<TransferAppState>,
    Path(id): Path<String>,
) -> Result<Json<TransferProcessDto>, ApiError> {
    let process = state
        .service
        .find_by_id(&id)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(TransferProcessDto::from_domain(process)))
}

#[utoipa::path(
    get,
    path = "/api/v1/management/transferprocesses/{id}/state",
    tag = "Transfer Processes",
    params(("id" = String, Path, description = "Transfer process id")),
    responses(
        (status = 200, description = "Current state", body = TransferStateDto),
        (status = 404, description = "Unknown transfer process")
    ),
    security(("api_key" = []))
)]
pub async fn get_transfer_process_state(
    State(state): State<TransferAppState>,
    Path(id): Path<String>,
) -> Result<Json<TransferStateDto>, ApiError> {
    let process_state = state
        .service
        .get_state(&id)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(TransferStateDto {
        state: process_state.as_str().to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/management/transferprocesses/{id}/terminate",
    tag = "Transfer Processes",
    params(("id" = String, Path, description = "Transfer process id")),
    request_body = TerminateTransferDto,
    responses(
        (status = 204, description = "Termination accepted"),
        (status = 404, description = "Unknown transfer process"),
        (status = 409, description = "Process is already in a terminal state")
    ),
    security(("api_key" = []))
)]
pub async fn terminate_transfer_process(
    State(state): State<TransferAppState>,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<TerminateTransferDto>,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .terminate(&id, &body.reason)
        .await
        .map_err(map_domain_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/v1/management/transferprocesses/{id}/suspend",
    tag = "Transfer Processes",
    params(("id" = String, Path, description = "Transfer process id")),
    request_body = SuspendTransferDto,
    responses(
        (status = 204, description = "Suspension accepted"),
        (status = 404, description = "Unknown transfer process"),
        (status = 409, description = "Process is not running")
    ),
    security(("api_key" = []))
)]
pub async fn suspend_transfer_process(
    State(state): State<TransferAppState>,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<SuspendTransferDto>,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .suspend(&id, body.reason)
        .await
        .map_err(map_domain_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/v1/management/transferprocesses/{id}/resume",
    tag = "Transfer Processes",
    params(("id" = String, Path, description = "Transfer process id")),
    responses(
        (status = 204, description = "Resumption accepted"),
        (status = 404, description = "Unknown transfer process"),
        (status = 409, description = "Process is not suspended")
    ),
    security(("api_key" = []))
)]
pub async fn resume_transfer_process(
    State(state): State<TransferAppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.service.resume(&id).await.map_err(map_domain_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/v1/management/transferprocesses/{id}/deprovision",
    tag = "Transfer Processes",
    params(("id" = String, Path, description = "Transfer process id")),
    responses(
        (status = 204, description = "Deprovisioning accepted"),
        (status = 404, description = "Unknown transfer process"),
        (status = 409, description = "Process has not finished")
    ),
    security(("api_key" = []))
)]
pub async fn deprovision_transfer_process(
    State(state): State<TransferAppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .deprovision(&id)
        .await
        .map_err(map_domain_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/management/transferprocesses/{id}/token",
    tag = "Transfer Processes",
    params(("id" = String, Path, description = "Transfer process id")),
    responses(
        (status = 200, description = "Consumer-pull access token", body = PullTokenDto),
        (status = 404, description = "Unknown transfer process"),
        (status = 409, description = "Process is not started or has no source")
    ),
    security(("api_key" = []))
)]
pub async fn get_pull_token(
    State(state): State<TransferAppState>,
    Path(id): Path<String>,
) -> Result<Json<PullTokenDto>, ApiError> {
    let token = state
        .service
        .issue_pull_token(&id)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(PullTokenDto { token }))
}
