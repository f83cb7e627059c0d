use axum::extract::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use std::fmt::Display;
use uuid::Uuid;

#[derive(Debug)]
pub struct ApiSuccess<T: Serialize>(StatusCode, Json<ApiResponse<T>>);

impl<T: Serialize> ApiSuccess<T> {
    pub const fn new(status: StatusCode, data: T) -> Self {
        Self(status, Json(ApiResponse::new(status, data, None)))
    }

    pub const fn paginated(status: StatusCode, data: T, pagination: Pagination) -> Self {
        Self(status, Json(ApiResponse::new(status, data, Some(pagination))))
    }
}

impl<T: Serialize> IntoResponse for ApiSuccess<T> {
    fn into_response(self) -> axum::response::Response {
        (self.0, self.1).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    status_code: u16,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pagination: Option<Pagination>,
}

impl<T: Serialize> ApiResponse<T> {
    const fn new(status: StatusCode, data: T, pagination: Option<Pagination>) -> Self {
        Self {
            status_code: status.as_u16(),
            data,
            pagination,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    field: &'static str,
    rule: &'static str,
    message: String,
}

/// Accumulates field-level failures while a request body is converted into a
/// domain request, so every invalid field is reported at once.
#[derive(Debug, Default)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn require<T>(&mut self, field: &'static str, value: Option<T>) -> Option<T> {
        if value.is_none() {
            self.0.push(FieldError {
                field,
                rule: "required",
                message: format!("{field} is required"),
            });
        }
        value
    }

    pub fn check<T, E: Display>(
        &mut self,
        field: &'static str,
        rule: &'static str,
        result: Result<T, E>,
    ) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.0.push(FieldError {
                    field,
                    rule,
                    message: format!("{field} is invalid: {err}"),
                });
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<FieldError>,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest { code: &'static str, message: String },
    Validation(Vec<FieldError>),
    NotFound { code: &'static str, message: String },
    Conflict { code: &'static str, message: String },
    InternalServerError { code: &'static str, message: String },
}

impl ApiError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::NotFound {
            code,
            message: message.into(),
        }
    }

    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self::Conflict {
            code,
            message: message.into(),
        }
    }

    /// Logs `cause` and hides it from the client behind `message`.
    pub fn internal(code: &'static str, message: &str, cause: &anyhow::Error) -> Self {
        tracing::error!(error_code = code, error = ?cause, "{message}");
        Self::InternalServerError {
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            Self::BadRequest { code, message } => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code,
                    message,
                    errors: Vec::new(),
                },
            ),
            Self::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "VALIDATION_ERROR",
                    message: "validation failed".into(),
                    errors,
                },
            ),
            Self::NotFound { code, message } => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code,
                    message,
                    errors: Vec::new(),
                },
            ),
            Self::Conflict { code, message } => (
                StatusCode::CONFLICT,
                ErrorBody {
                    code,
                    message,
                    errors: Vec::new(),
                },
            ),
            Self::InternalServerError { code, message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    code,
                    message,
                    errors: Vec::new(),
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}

impl From<FieldErrors> for ApiError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors.0)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request("INVALID_REQUEST_BODY", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request("INVALID_QUERY", rejection.body_text())
    }
}

/// Parses an id taken from the request path, failing with `code` when malformed.
pub fn parse_path_id(raw: &str, code: &'static str, message: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request(code, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_errors_collect_every_failure() {
        let mut errors = FieldErrors::default();
        assert_eq!(errors.require::<u8>("title", None), None);
        assert_eq!(
            errors.check("author_id", "uuid", Uuid::parse_str("nope")),
            None
        );
        assert_eq!(errors.check::<_, String>("bio", "max", Ok(1)), Some(1));

        assert_eq!(errors.0.len(), 2);
        assert_eq!(errors.0[0].message, "title is required");
        assert_eq!(errors.0[1].rule, "uuid");
    }

    #[test]
    fn error_statuses() {
        let cases = [
            (ApiError::bad_request("X", "x"), StatusCode::BAD_REQUEST),
            (ApiError::Validation(Vec::new()), StatusCode::BAD_REQUEST),
            (ApiError::not_found("X", "x"), StatusCode::NOT_FOUND),
            (ApiError::conflict("X", "x"), StatusCode::CONFLICT),
            (
                ApiError::internal("X", "x", &anyhow::anyhow!("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }
}
