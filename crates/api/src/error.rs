use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::services::{ContentError, EvaluationError, GenerationError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The generative service answered, but not in a usable shape. `raw`
    /// carries its text for diagnosis.
    #[error("Upstream returned an unusable response: {message}")]
    UpstreamInvalid { message: String, raw: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw: Option<String>,
}

struct ValidationDetail {
    field: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut raw = None;
        let (status, error_code, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            ApiError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Too many requests. Please try again later.".into(),
            ),
            ApiError::Configuration(msg) => {
                tracing::error!("Configuration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "configuration_error",
                    msg,
                )
            }
            ApiError::UpstreamUnavailable(msg) => {
                tracing::warn!("Upstream unavailable: {}", msg);
                (StatusCode::BAD_GATEWAY, "upstream_unavailable", msg)
            }
            ApiError::UpstreamInvalid { message, raw: text } => {
                tracing::warn!(raw_len = text.len(), "Upstream response rejected: {}", message);
                raw = Some(text);
                (StatusCode::BAD_GATEWAY, "upstream_invalid", message)
            }
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".into(),
                )
            }
        };

        let body = ErrorBody {
            error: error_code.into(),
            message,
            raw,
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".into()),
            sqlx::Error::Database(db_err) => {
                if let Some(code) = db_err.code() {
                    match code.as_ref() {
                        "23505" => ApiError::Conflict("Resource already exists".into()),
                        "23503" => ApiError::NotFound("Referenced resource not found".into()),
                        _ => ApiError::Internal(format!("Database error: {}", db_err)),
                    }
                } else {
                    ApiError::Internal(format!("Database error: {}", db_err))
                }
            }
            _ => ApiError::Internal(format!("Database error: {}", err)),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| ValidationDetail {
                    field: field.to_string(),
                    message: e
                        .message
                        .clone()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();

        // Struct-level checks and nested lists are reported under their own keys.
        if details.is_empty() {
            details.push(ValidationDetail {
                field: "request".to_string(),
                message: errors.to_string(),
            });
        }

        let message = if details.len() == 1 {
            format!("{}: {}", details[0].field, details[0].message)
        } else {
            details
                .iter()
                .map(|d| format!("{}: {}", d.field, d.message))
                .collect::<Vec<_>>()
                .join(", ")
        };

        ApiError::Validation(message)
    }
}

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::NotConfigured => {
                ApiError::Configuration("Generative service is not configured".into())
            }
            GenerationError::EmptyResponse(reason) => ApiError::UpstreamInvalid {
                message: format!("Generative service returned no text: {}", reason),
                raw: String::new(),
            },
            other => ApiError::UpstreamUnavailable(other.to_string()),
        }
    }
}

impl From<EvaluationError> for ApiError {
    fn from(err: EvaluationError) -> Self {
        match err {
            EvaluationError::GroupNotFound => ApiError::NotFound("Group not found".into()),
            EvaluationError::NotMember => ApiError::Forbidden(err.to_string()),
            EvaluationError::EmptyTranscript => ApiError::Validation(err.to_string()),
            EvaluationError::InProgress => ApiError::Conflict(err.to_string()),
            EvaluationError::Timeout(_) => ApiError::UpstreamUnavailable(err.to_string()),
            EvaluationError::Generation(e) => e.into(),
            EvaluationError::Parse { source, raw } => ApiError::UpstreamInvalid {
                message: source.to_string(),
                raw,
            },
            EvaluationError::Database(e) => e.into(),
        }
    }
}

impl From<ContentError> for ApiError {
    fn from(err: ContentError) -> Self {
        match err {
            ContentError::Generation(e) => e.into(),
            ContentError::Topic { source, raw } => ApiError::UpstreamInvalid {
                message: source.to_string(),
                raw,
            },
            ContentError::Quiz { source, raw } => ApiError::UpstreamInvalid {
                message: source.to_string(),
                raw,
            },
            ContentError::Database(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use validator::Validate;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_api_error_unauthorized() {
        let response = ApiError::Unauthorized("test message".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_api_error_forbidden() {
        let response = ApiError::Forbidden("access denied".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_api_error_not_found() {
        let response = ApiError::NotFound("resource not found".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_api_error_conflict() {
        let response = ApiError::Conflict("already exists".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_api_error_rate_limited() {
        let response = ApiError::RateLimited.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_api_error_validation_body() {
        let response = ApiError::Validation("invalid input".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "validation_error");
        assert_eq!(body["message"], "invalid input");
        assert!(body.get("raw").is_none());
    }

    #[tokio::test]
    async fn test_api_error_configuration_body() {
        let response = ApiError::Configuration("missing key".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "configuration_error");
    }

    #[tokio::test]
    async fn test_api_error_upstream_invalid_keeps_raw_text() {
        let response = ApiError::UpstreamInvalid {
            message: "no JSON object found".to_string(),
            raw: "Sorry, I cannot help".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert_eq!(body["error"], "upstream_invalid");
        assert_eq!(body["raw"], "Sorry, I cannot help");
    }

    #[test]
    fn test_api_error_upstream_unavailable() {
        let response = ApiError::UpstreamUnavailable("timeout".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_api_error_internal_hides_details() {
        let response = ApiError::Internal("database connection failed".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["message"], "An internal error occurred");
    }

    #[test]
    fn test_api_error_display() {
        assert_eq!(
            format!("{}", ApiError::Unauthorized("test".to_string())),
            "Unauthorized: test"
        );
        assert_eq!(
            format!("{}", ApiError::Configuration("test".to_string())),
            "Configuration error: test"
        );
        assert_eq!(format!("{}", ApiError::RateLimited), "Rate limited");
    }

    #[test]
    fn test_from_sqlx_row_not_found() {
        let error: ApiError = sqlx::Error::RowNotFound.into();
        match error {
            ApiError::NotFound(msg) => assert_eq!(msg, "Resource not found"),
            _ => panic!("Expected NotFound error"),
        }
    }

    #[derive(Debug, Validate)]
    struct Sample {
        #[validate(length(min = 1, message = "Name is required"))]
        name: String,
    }

    #[test]
    fn test_from_validation_errors_uses_field_message() {
        let errors = Sample {
            name: String::new(),
        }
        .validate()
        .unwrap_err();

        match ApiError::from(errors) {
            ApiError::Validation(msg) => assert_eq!(msg, "name: Name is required"),
            other => panic!("Expected Validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_generator_is_configuration_error() {
        let response = ApiError::from(GenerationError::NotConfigured).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], "configuration_error");
    }

    #[test]
    fn test_circuit_open_is_upstream_unavailable() {
        let response = ApiError::from(GenerationError::CircuitOpen).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_unparseable_verdict_keeps_raw_text() {
        let err = EvaluationError::Parse {
            source: domain::services::EvaluationParseError::NoJsonBlock,
            raw: "Great discussion everyone!".to_string(),
        };
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert_eq!(body["error"], "upstream_invalid");
        assert_eq!(body["raw"], "Great discussion everyone!");
    }

    #[test]
    fn test_evaluation_rejections_map_to_client_errors() {
        assert_eq!(
            ApiError::from(EvaluationError::NotMember).into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(EvaluationError::EmptyTranscript).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(EvaluationError::InProgress).into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(EvaluationError::Timeout(45)).into_response().status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
