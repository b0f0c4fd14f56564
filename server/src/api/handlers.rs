// server/src/api/handlers.rs
use std::collections::HashMap;

use chrono::Utc;
use lib::requests::CreateRequest;
use lib::RecordAccess;
use log::{debug, info};
use models::errors::{LedgerResult, ValidationError, ValidationResult};
use models::{Address, ChainEvidence, PrescriptionId, RequestId, Role};
use serde_json::{json, Map, Value};
use warp::http::StatusCode;
use warp::hyper::body::Bytes;

use crate::api::app_state::AppState;
use crate::api::errors::{error_reply, message_reply, respond, ApiReply};

const METRIC_FIELDS_REQUIRED: &str = "type (string) and value (number) are required";

/// The calling account taken from `x-sender`.
fn sender_address(header: Option<String>) -> ValidationResult<Address> {
    let value = header.ok_or_else(|| ValidationError::MissingHeader("sender".into()))?;
    Address::parse_field(value.trim(), "x-sender address")
}

fn viewer_address(header: Option<String>) -> ValidationResult<Address> {
    header
        .and_then(|value| Address::parse(value.trim()).ok())
        .ok_or(ValidationError::InvalidViewer)
}

/// An absent body reads as `{}`.
fn parse_body(body: &Bytes) -> ValidationResult<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(body).map_err(|e| ValidationError::MalformedBody(e.to_string()))
}

pub async fn health(state: AppState) -> ApiReply {
    Ok(warp::reply::with_status(
        warp::reply::json(&json!({ "status": "ok", "chainConfigured": state.chain_configured })),
        StatusCode::OK,
    ))
}

pub async fn create_request(sender: Option<String>, body: Bytes, state: AppState) -> ApiReply {
    let result: LedgerResult<_> = async {
        let doctor = sender_address(sender)?;
        let body = parse_body(&body)?;
        let input = CreateRequest::from_json(doctor, &body, Utc::now())?;
        state.requests.create_request(input).await
    }
    .await;
    Ok(respond(result, StatusCode::CREATED))
}

pub async fn list_requests(query: HashMap<String, String>, state: AppState) -> ApiReply {
    let result: LedgerResult<_> = async {
        let address = query
            .get("address")
            .ok_or_else(|| ValidationError::InvalidAddress("address".into()))
            .and_then(|value| Address::parse(value))?;
        let role = Role::parse_lenient(query.get("role").map(String::as_str));
        state.requests.list_requests(&address, role).await
    }
    .await;
    Ok(respond(result, StatusCode::OK))
}

pub async fn approve_request(id: String, sender: Option<String>, body: Bytes, state: AppState) -> ApiReply {
    let result: LedgerResult<_> = async {
        let patient = sender_address(sender)?;
        let evidence = match parse_body(&body)? {
            value @ Value::Object(_) => serde_json::from_value::<ChainEvidence>(value)
                .map_err(|e| ValidationError::MalformedBody(e.to_string()))?,
            _ => return Err(ValidationError::MissingEvidence("Missing chain metadata".into()).into()),
        };
        Ok((patient, evidence))
    }
    .await;
    let (patient, evidence) = match result {
        Ok(parsed) => parsed,
        Err(err) => return Ok(error_reply(&err)),
    };

    // An id that cannot exist in the store is reported like a missing one.
    let Ok(request_id) = id.parse::<RequestId>() else {
        debug!("Approve for unparseable request id {:?}", id);
        return Ok(message_reply("Request not found", StatusCode::NOT_FOUND));
    };

    let result = state.requests.complete_request(&request_id, &patient, &evidence).await;
    Ok(respond(result, StatusCode::OK))
}

pub async fn get_prescription(id: String, viewer: Option<String>, state: AppState) -> ApiReply {
    let Ok(prescription_id) = id.parse::<PrescriptionId>() else {
        return Ok(message_reply("Invalid prescription id", StatusCode::BAD_REQUEST));
    };
    let viewer = match viewer_address(viewer) {
        Ok(viewer) => viewer,
        Err(err) => return Ok(error_reply(&err.into())),
    };

    match state.authorization.fetch_single_record(prescription_id, &viewer).await {
        Ok(RecordAccess::Allowed(record)) => Ok(respond(Ok(record), StatusCode::OK)),
        Ok(RecordAccess::Denied) => Ok(message_reply("Viewer not authorized", StatusCode::FORBIDDEN)),
        Err(err) => Ok(error_reply(&err)),
    }
}

pub async fn patient_prescriptions(patient: String, viewer: Option<String>, state: AppState) -> ApiReply {
    let result: LedgerResult<_> = async {
        let patient = Address::parse_field(&patient, "patient address")?;
        let viewer = viewer_address(viewer)?;
        state.authorization.resolve_patient_records(&patient, &viewer).await
    }
    .await;
    Ok(respond(result, StatusCode::OK))
}

pub async fn record_metric(body: Bytes, state: AppState) -> ApiReply {
    let parsed = parse_body(&body).ok().and_then(|body| {
        let name = body.get("type")?.as_str()?.to_string();
        let value = body.get("value")?.as_f64()?;
        Some((name, value))
    });
    let Some((name, value)) = parsed else {
        return Ok(error_reply(&ValidationError::InvalidMetric(METRIC_FIELDS_REQUIRED.into()).into()));
    };

    if !state.metrics.record(&name, value) {
        info!("Metric sample {} = {} was not kept", name, value);
    }
    Ok(warp::reply::with_status(
        warp::reply::json(&json!({ "status": "ok" })),
        StatusCode::CREATED,
    ))
}

pub async fn read_metrics(state: AppState) -> ApiReply {
    Ok(warp::reply::with_status(
        warp::reply::json(&state.metrics.read_all()),
        StatusCode::OK,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_header_errors() {
        assert_eq!(sender_address(None).unwrap_err().to_string(), "Missing x-sender header");
        assert_eq!(
            sender_address(Some("0x123".into())).unwrap_err().to_string(),
            "Invalid x-sender address"
        );
        let parsed = sender_address(Some("0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".into())).unwrap();
        assert_eq!(parsed.as_str(), "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
    }

    #[test]
    fn test_viewer_header_errors() {
        assert_eq!(viewer_address(None).unwrap_err(), ValidationError::InvalidViewer);
        assert_eq!(viewer_address(Some("viewer".into())).unwrap_err(), ValidationError::InvalidViewer);
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(&Bytes::new()).unwrap(), json!({}));
        assert_eq!(parse_body(&Bytes::from_static(b"[1]")).unwrap(), json!([1]));
        assert!(matches!(
            parse_body(&Bytes::from_static(b"{oops")),
            Err(ValidationError::MalformedBody(_))
        ));
    }
}
