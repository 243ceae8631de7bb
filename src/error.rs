use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde_json::json;
use thiserror::Error;

/// Error taxonomy for the order and points core. Validation and not-found
/// errors are returned to the caller as structured JSON; database errors
/// surface as opaque 500s.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Not authenticated")]
    Unauthorized,

    #[error("Unauthorized access")]
    Forbidden,

    #[error("external service error: {0}")]
    ExternalService(String),

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

impl ApiError {
    /// Maps a `RowNotFound` from a lookup to a domain-level not-found.
    pub fn not_found_as(err: sqlx::Error, entity: &'static str) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound(entity),
            other => Self::Database(other),
        }
    }
}

impl actix_web::ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::ExternalService(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let Self::Database(err) = self {
            tracing::error!("database error: {err:?}");
            return HttpResponse::InternalServerError()
                .json(json!({"success": false, "message": "Internal server error"}));
        }
        HttpResponse::build(self.status_code())
            .json(json!({"success": false, "message": self.to_string()}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_domain_not_found() {
        let err = ApiError::not_found_as(sqlx::Error::RowNotFound, "Order");
        assert!(matches!(err, ApiError::NotFound("Order")));
        assert_eq!(err.to_string(), "Order not found");
    }

    #[test]
    fn status_codes_follow_taxonomy() {
        use actix_web::ResponseError;
        assert_eq!(
            ApiError::Validation("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotFound("Order").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(ApiError::Forbidden.status_code(), StatusCode::FORBIDDEN);
    }
}
