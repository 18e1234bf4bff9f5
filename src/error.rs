use actix_web::{
    http::{header, StatusCode},
    HttpResponse, ResponseError,
};
use serde_json::json;
use thiserror::Error;

use crate::auth::AUTH_REALM;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("This time slot was already booked. Please pick another one.")]
    SlotAlreadyTaken,

    #[error("Bookings cannot be made for a time that has already passed.")]
    PastSlot,

    #[error("Bookings must be made at least {minutes} minutes in advance.")]
    InsufficientLeadTime { minutes: i64 },

    #[error("The requested time is not offered on that date.")]
    SlotNotOffered,

    #[error("The slot at {0} has a booking and cannot be changed.")]
    SlotProtected(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Duplicate(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("The store is unavailable, please retry: {0}")]
    StoreUnavailable(String),
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Stable machine-readable code sent to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::SlotAlreadyTaken => "slot_already_taken",
            AppError::PastSlot => "past_slot",
            AppError::InsufficientLeadTime { .. } => "insufficient_lead_time",
            AppError::SlotNotOffered => "slot_not_offered",
            AppError::SlotProtected(_) => "slot_protected",
            AppError::NotFound(_) => "not_found",
            AppError::Validation(_) => "validation",
            AppError::Duplicate(_) => "duplicate",
            AppError::Unauthorized => "unauthorized",
            AppError::StoreUnavailable(_) => "store_unavailable",
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("record"),
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                // The only unique index a caller can race on is the live booking slot;
                // the other tables are checked before insert and report Duplicate.
                if db_err.message().contains("bookings") {
                    AppError::SlotAlreadyTaken
                } else {
                    AppError::Duplicate(db_err.message().to_string())
                }
            }
            // A write naming a professional that does not exist.
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                AppError::NotFound("referenced record")
            }
            other => {
                log::error!("Store error: {other}");
                AppError::StoreUnavailable(other.to_string())
            }
        }
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::StoreUnavailable(err.to_string())
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::SlotAlreadyTaken | AppError::SlotProtected(_) | AppError::Duplicate(_) => {
                StatusCode::CONFLICT
            }
            AppError::PastSlot | AppError::InsufficientLeadTime { .. } | AppError::SlotNotOffered => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            // Infrastructure details stay in the logs.
            AppError::StoreUnavailable(_) => {
                "The service is temporarily unavailable. Please try again.".to_string()
            }
            other => other.to_string(),
        };
        let mut response = HttpResponse::build(self.status_code());
        if let AppError::Unauthorized = self {
            response.insert_header((
                header::WWW_AUTHENTICATE,
                format!("Basic realm=\"{AUTH_REALM}\""),
            ));
        }
        response.json(json!({
            "error": self.code(),
            "message": message,
        }))
    }
}
