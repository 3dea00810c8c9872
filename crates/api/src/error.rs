//! JSON error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use kinko_core::account::AccountError;
use kinko_core::chips::ChipError;
use kinko_core::collections::CollectionsError;
use kinko_core::ledger::LedgerError;
use kinko_core::loans::LoanError;
use kinko_core::tax::TaxError;
use kinko_shared::AppError;
use serde_json::json;

/// An error rendered as `{ "error": <code>, "message": <user message> }`.
#[derive(Debug)]
pub struct ApiError {
    code: &'static str,
    error: AppError,
    detail: Option<String>,
}

impl ApiError {
    /// Builds an error from a domain code, status and user message.
    #[must_use]
    pub fn new(code: &'static str, status: u16, message: String) -> Self {
        Self {
            code,
            error: AppError::from_status(status, message),
            detail: None,
        }
    }

    /// A rejected or missing service token.
    #[must_use]
    pub fn unauthorized(code: &'static str, message: &str) -> Self {
        Self::new(code, 401, message.to_string())
    }

    /// A malformed request.
    #[must_use]
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(code, 400, message.into())
    }

    /// Keeps the internal description for the log line only.
    fn with_detail(mut self, detail: String) -> Self {
        self.detail = Some(detail);
        self
    }

    /// The stable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }

    /// The HTTP status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(
                code = self.code,
                detail = self.detail.as_deref().unwrap_or_default(),
                "request failed"
            );
        }
        (
            status,
            Json(json!({
                "error": self.code,
                "message": self.error.message(),
            })),
        )
            .into_response()
    }
}

macro_rules! from_domain_error {
    ($($ty:ty),+ $(,)?) => {
        $(impl From<$ty> for ApiError {
            fn from(err: $ty) -> Self {
                Self::new(err.error_code(), err.http_status_code(), err.user_message())
                    .with_detail(err.to_string())
            }
        })+
    };
}

from_domain_error!(
    LedgerError,
    AccountError,
    ChipError,
    LoanError,
    TaxError,
    CollectionsError,
);
