/// One of the coarse kinds listed in the error-handling design: each maps
/// to exactly one transport status regardless of which component raised it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoreErrorKind {
    Unauthenticated,
    UnauthorizedClient,
    BadRequest,
    BadIssuer,
    NoSubject,
    NotFound,
    Conflict,
    DeadlineExceeded,
    Canceled,
    Internal,
}

impl CoreErrorKind {
    pub fn status_code(self) -> u16 {
        match self {
            CoreErrorKind::Unauthenticated => 401,
            CoreErrorKind::UnauthorizedClient => 401,
            CoreErrorKind::BadRequest => 400,
            CoreErrorKind::BadIssuer => 400,
            CoreErrorKind::NoSubject => 400,
            CoreErrorKind::NotFound => 404,
            CoreErrorKind::Conflict => 409,
            CoreErrorKind::DeadlineExceeded => 504,
            CoreErrorKind::Canceled => 499,
            CoreErrorKind::Internal => 500,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            CoreErrorKind::Unauthenticated => "UNAUTHENTICATED",
            CoreErrorKind::UnauthorizedClient => "UNAUTHORIZED_CLIENT",
            CoreErrorKind::BadRequest => "BAD_REQUEST",
            CoreErrorKind::BadIssuer => "BAD_ISSUER",
            CoreErrorKind::NoSubject => "NO_SUBJECT",
            CoreErrorKind::NotFound => "NOT_FOUND",
            CoreErrorKind::Conflict => "CONFLICT",
            CoreErrorKind::DeadlineExceeded => "DEADLINE_EXCEEDED",
            CoreErrorKind::Canceled => "CANCELED",
            CoreErrorKind::Internal => "INTERNAL",
        }
    }
}

/// The detail envelope: kind + status tag + human message, so callers can
/// programmatically distinguish kinds without parsing prose.
#[derive(Debug, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct CoreError {
    pub kind: CoreErrorKind,
    pub message: String,
}

impl CoreError {
    pub fn new(kind: CoreErrorKind, message: impl Into<String>) -> Self {
        CoreError {
            kind,
            message: message.into(),
        }
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Unauthenticated, message)
    }

    pub fn unauthorized_client(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::UnauthorizedClient, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::BadRequest, message)
    }

    pub fn bad_issuer(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::BadIssuer, message)
    }

    pub fn no_subject(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::NoSubject, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Conflict, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Internal, message)
    }
}

#[cfg(feature = "sqlx-store")]
impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                CoreError::new(CoreErrorKind::DeadlineExceeded, err.to_string())
            }
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                CoreError::new(CoreErrorKind::Conflict, err.to_string())
            }
            sqlx::Error::RowNotFound => CoreError::new(CoreErrorKind::NotFound, err.to_string()),
            _ => CoreError::new(CoreErrorKind::Internal, err.to_string()),
        }
    }
}

impl From<tokio::time::error::Elapsed> for CoreError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        CoreError::new(CoreErrorKind::DeadlineExceeded, err.to_string())
    }
}
