//! REST API types.
//!
//! A successful validation answers with the [`ValidationOutcome`] itself;
//! every failure answers with an [`ErrorResponse`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::{ErrorCode, ValidateError};

/// Content type of CSV Schema documents
pub const CSV_SCHEMA_CONTENT_TYPE: &str = "text/csv-schema";

/// Header carrying the API version on every response
pub const VERSION_HEADER: &str = "x-bblvalidator-version";

pub use crate::models::ValidationOutcome as ValidationResponse;

/// Error body: machine-readable code plus description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub description: String,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }

    pub fn schema_not_found(schema_id: &str) -> Self {
        Self::new(
            ErrorCode::SchemaNotFound,
            format!("Schema not found with ID: {}", schema_id),
        )
    }
}

impl From<&ValidateError> for ErrorResponse {
    fn from(err: &ValidateError) -> Self {
        Self::new(err.code(), err.description())
    }
}

impl IntoResponse for ValidateError {
    fn into_response(self) -> Response {
        let status = if self.is_user_error() {
            StatusCode::BAD_REQUEST
        } else {
            error!(code = ?self.code(), "Validation request failed: {}", self);
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}

/// `application/x-www-form-urlencoded` validation request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationForm {
    #[serde(default)]
    pub schema_id: String,
    #[serde(default)]
    pub url: String,
}

/// Query parameters accepted by `POST /validate`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValidateQuery {
    #[serde(rename = "schema-id", default)]
    pub schema_id: String,
    #[serde(default)]
    pub url: String,
}

/// `GET /version` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiVersion {
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    #[test]
    fn test_error_body() {
        let body = ErrorResponse::schema_not_found("nonExistingSchema");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["code"], "SCHEMA_NOT_FOUND");
        assert_eq!(json["description"], "Schema not found with ID: nonExistingSchema");
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ValidateError::SchemaNotFound("x".into()), StatusCode::BAD_REQUEST),
            (ValidateError::NoCsv("Empty CSV content".into()), StatusCode::BAD_REQUEST),
            (ValidateError::NonResolvableUrl("not-a-url".into()), StatusCode::BAD_REQUEST),
            (ValidateError::Unexpected("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (
                ValidateError::Validation(EngineError::Aborted("panic".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_form_field_names() {
        let form: ValidationForm =
            serde_json::from_str(r#"{"schemaId": "concat", "url": "http://x/y.csv"}"#).unwrap();
        assert_eq!(form.schema_id, "concat");

        let query: ValidateQuery = serde_json::from_str(r#"{"schema-id": "concat"}"#).unwrap();
        assert_eq!(query.schema_id, "concat");
        assert!(query.url.is_empty());
    }
}
