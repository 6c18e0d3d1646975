//! Shared error type used across all drawroom crates.
//!
//! One variant per error *kind* (not per failing call site); the HTTP
//! adapter in `dr-gateway` is the only place that maps a kind to a
//! status code.

/// Which entity a `not_found` failure was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundKind {
    Room,
    RoomMember,
    Stroke,
    Object,
    Turn,
}

impl std::fmt::Display for NotFoundKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NotFoundKind::Room => "room_not_found",
            NotFoundKind::RoomMember => "member_not_found",
            NotFoundKind::Stroke => "stroke_not_found",
            NotFoundKind::Object => "object_not_found",
            NotFoundKind::Turn => "turn_not_found",
        };
        f.write_str(s)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0}")]
    NotFound(NotFoundKind),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unprocessable: {reasons:?}")]
    UnprocessableEntity { reasons: Vec<String> },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal: {0}")]
    Internal(String),
}

impl Error {
    /// The stable, machine-readable kind string used in HTTP bodies
    /// and log fields (`"not_found"`, `"bad_request"`, ...).
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::BadRequest(_) => "bad_request",
            Error::Conflict(_) => "conflict",
            Error::UnprocessableEntity { .. } => "unprocessable_entity",
            Error::Unauthorized(_) => "unauthorized",
            Error::Forbidden(_) => "forbidden",
            Error::Io(_) | Error::Json(_) | Error::Internal(_) => "internal",
        }
    }

    pub fn not_found(kind: NotFoundKind) -> Self {
        Error::NotFound(kind)
    }

    pub fn unprocessable(reasons: Vec<String>) -> Self {
        Error::UnprocessableEntity { reasons }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
