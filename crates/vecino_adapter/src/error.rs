#![forbid(unsafe_code)]

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use vecino_kernel_contracts::benefit::BenefitEligibility;
use vecino_kernel_contracts::ContractViolation;
use vecino_os::OsError;
use vecino_storage::store::StorageError;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("{0}")]
    BadRequest(String),
    #[error("missing X-Tenant-Id header")]
    MissingTenant,
    #[error("operator token required")]
    OperatorOnly,
    #[error(transparent)]
    Os(#[from] OsError),
    #[error("journal: {0}")]
    Journal(String),
    #[error("adapter store lock poisoned")]
    LockPoisoned,
    #[error("failed to encode response: {0}")]
    Encode(String),
}

impl From<ContractViolation> for AdapterError {
    fn from(v: ContractViolation) -> Self {
        Self::Os(OsError::Contract(v))
    }
}

impl From<StorageError> for AdapterError {
    fn from(e: StorageError) -> Self {
        Self::Os(OsError::Storage(e))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub code: &'static str,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eligibility: Option<BenefitEligibility>,
}

impl AdapterError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::BadRequest(_) | Self::MissingTenant => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::OperatorOnly => (StatusCode::FORBIDDEN, "OPERATOR_ONLY"),
            Self::Journal(_) | Self::LockPoisoned | Self::Encode(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL")
            }
            Self::Os(e) => match e {
                OsError::Contract(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
                OsError::Storage(StorageError::ContractViolation(_)) => {
                    (StatusCode::BAD_REQUEST, "INVALID_INPUT")
                }
                OsError::Storage(StorageError::ForeignKeyViolation { .. }) => {
                    (StatusCode::BAD_REQUEST, "UNKNOWN_REFERENCE")
                }
                OsError::Storage(StorageError::DuplicateKey { .. }) => {
                    (StatusCode::CONFLICT, "DUPLICATE")
                }
                OsError::Storage(StorageError::NotFound { .. }) => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND")
                }
                OsError::Storage(StorageError::AppendOnlyViolation { .. }) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL")
                }
                OsError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
                OsError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
                OsError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
                OsError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                OsError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
                OsError::Ineligible(_) => (StatusCode::CONFLICT, "NOT_ELIGIBLE"),
            },
        }
    }
}

impl IntoResponse for AdapterError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let eligibility = match &self {
            Self::Os(OsError::Ineligible(e)) => Some(*e),
            _ => None,
        };
        let body = ErrorBody {
            status: "error",
            code,
            reason: self.to_string(),
            eligibility,
        };
        (status, Json(body)).into_response()
    }
}
