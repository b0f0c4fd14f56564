// server/src/api/errors.rs
use std::convert::Infallible;

use log::{debug, error, warn};
use models::errors::{LedgerError, LedgerResult};
use serde::Serialize;
use serde_json::json;
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};
use warp::Rejection;

pub type ApiReply = Result<WithStatus<Json>, Rejection>;

pub fn status_for(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
        LedgerError::Authorization(_) => StatusCode::FORBIDDEN,
        LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
        e if e.is_dependency_failure() => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn message_reply(message: &str, status: StatusCode) -> WithStatus<Json> {
    warp::reply::with_status(warp::reply::json(&json!({ "message": message })), status)
}

pub fn error_reply(err: &LedgerError) -> WithStatus<Json> {
    let status = status_for(err);
    match status {
        StatusCode::INTERNAL_SERVER_ERROR => error!("Request failed: {}", err),
        StatusCode::BAD_GATEWAY => warn!("Dependency failure: {}", err),
        _ => debug!("Request rejected ({}): {}", status, err),
    }
    message_reply(&err.to_string(), status)
}

/// Serializes `result` with `ok` on success, or the mapped error status.
pub fn respond<T: Serialize>(result: LedgerResult<T>, ok: StatusCode) -> WithStatus<Json> {
    match result {
        Ok(value) => warp::reply::with_status(warp::reply::json(&value), ok),
        Err(err) => error_reply(&err),
    }
}

/// Turns the rejections warp produces itself (unknown path, wrong method,
/// oversized body) into the same `{message}` body the handlers use.
pub async fn handle_rejection(rejection: Rejection) -> Result<WithStatus<Json>, Infallible> {
    let (message, status) = if rejection.is_not_found() {
        ("Not found", StatusCode::NOT_FOUND)
    } else if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        ("Request body too large", StatusCode::PAYLOAD_TOO_LARGE)
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        ("Method not allowed", StatusCode::METHOD_NOT_ALLOWED)
    } else {
        error!("Unhandled rejection: {:?}", rejection);
        ("Internal server error", StatusCode::INTERNAL_SERVER_ERROR)
    };
    Ok(message_reply(message, status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::ValidationError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&ValidationError::MissingTitle.into()), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&LedgerError::unauthorized("no")), StatusCode::FORBIDDEN);
        assert_eq!(status_for(&LedgerError::not_found("Request not found")), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&LedgerError::Dependency("pin".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(&LedgerError::Timeout("rpc".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(&LedgerError::Storage("disk".into())), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            status_for(&LedgerError::Configuration("Missing blockchain config: RPC_URL".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
