//! Common API types

mod validated_json;

pub use validated_json::ValidatedJson;

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::DomainError;

/// Standard API response envelope
///
/// Every endpoint answers in this wrapper: `{"success": true, "data": ...}`
/// on success, `{"success": false, "error": "..."}` on failure.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// `true` when the request succeeded
    pub success: bool,
    /// Payload; `null` on errors
    pub data: Option<T>,
    /// Error description; `null` on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Empty response for operations without return data
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EmptyData {}

/// Error tuple returned by handlers
pub type ApiError = (StatusCode, Json<ApiResponse<()>>);

/// Map a domain error onto the HTTP status it deserves.
pub fn map_domain_error(error: DomainError) -> ApiError {
    let status = match &error {
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::Validation(_) => StatusCode::BAD_REQUEST,
        DomainError::Conflict(_) | DomainError::IllegalTransition { .. } => StatusCode::CONFLICT,
        DomainError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        DomainError::Saturated(_) => StatusCode::SERVICE_UNAVAILABLE,
        DomainError::Dispatch(_) | DomainError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ApiResponse::error(error.to_string())))
}

/// Pagination query parameters
#[derive(Debug, Deserialize, ToSchema, utoipa::IntoParams)]
pub struct PaginationParams {
    /// Page number (1-based). Default: 1
    #[serde(default = "default_page")]
    pub page: u32,
    /// Items per page (1-100). Default: 50
    #[serde(default = "default_limit")]
    pub limit: u32,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
        }
    }
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    50
}

/// Paginated response
///
/// Carries one page of items plus paging metadata.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    /// Total item count across all pages
    pub total: u64,
    /// Current page (1-based)
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: u32, limit: u32) -> Self {
        let total_pages = ((total as f64) / (limit as f64)).ceil() as u32;
        Self {
            items,
            total,
            page,
            limit,
            total_pages,
        }
    }

    /// Slice a full result set down to the requested page.
    pub fn paginate(all: Vec<T>, params: &PaginationParams) -> Self {
        let total = all.len() as u64;
        let page = params.page.max(1);
        let limit = params.limit.clamp(1, 100);
        let start = ((page - 1) * limit) as usize;
        let items: Vec<T> = all.into_iter().skip(start).take(limit as usize).collect();
        Self::new(items, total, page, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paginate_slices_and_counts() {
        let all: Vec<u32> = (0..12).collect();
        let page = PaginatedResponse::paginate(
            all,
            &PaginationParams { page: 2, limit: 5 },
        );
        assert_eq!(page.items, vec![5, 6, 7, 8, 9]);
        assert_eq!(page.total, 12);
        assert_eq!(page.total_pages, 3);
    }

    #[test]
    fn paginate_clamps_silly_params() {
        let all: Vec<u32> = (0..3).collect();
        let page = PaginatedResponse::paginate(
            all,
            &PaginationParams { page: 0, limit: 0 },
        );
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, 1);
        assert_eq!(page.items, vec![0]);
    }

    #[test]
    fn domain_errors_map_to_statuses() {
        let (status, _) = map_domain_error(DomainError::not_found("TransferProcess", "x"));
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = map_domain_error(DomainError::IllegalTransition {
            from: "COMPLETED".to_string(),
            to: "TERMINATING".to_string(),
        });
        assert_eq!(status, StatusCode::CONFLICT);
        let (status, _) = map_domain_error(DomainError::Saturated("full".to_string()));
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
