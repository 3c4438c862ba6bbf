use std::fmt::Display;
use std::str::FromStr;

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::ApiError;

/// `axum::Json` whose rejection is an `ApiError`, so bad bodies get the
/// usual `{"error": ...}` shape and a 400.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

/// `axum::extract::Path` with an `ApiError` rejection.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct PathParam<T>(pub T);

/// Parse an optional string-typed request field. Absent stays `None`; an
/// unrecognised value becomes a 400 naming the field.
pub fn parse_field<T>(field: &str, raw: Option<&str>) -> Result<Option<T>, ApiError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.map(|value| {
        value
            .parse::<T>()
            .map_err(|e| ApiError::BadRequest(format!("invalid {field}: {e}")))
    })
    .transpose()
}
