// server/src/api/routes.rs
use std::collections::HashMap;
use std::convert::Infallible;

use lib::metrics::api_latency_metric;
use log::info;
use warp::hyper::body::Bytes;
use warp::{Filter, Rejection, Reply};

use crate::api::app_state::AppState;
use crate::api::errors::handle_rejection;
use crate::api::handlers;

const MAX_BODY_BYTES: u64 = 1024 * 1024;

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn json_body() -> impl Filter<Extract = (Bytes,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::bytes())
}

/// Full route tree: `/health` plus everything under `/api`, with CORS open to
/// any origin and one latency sample recorded per request.
pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let health = warp::path!("health")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handlers::health);

    let create_request = warp::path!("requests")
        .and(warp::post())
        .and(warp::header::optional::<String>("x-sender"))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(handlers::create_request);

    let list_requests = warp::path!("requests")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_state(state.clone()))
        .and_then(handlers::list_requests);

    let approve_request = warp::path!("requests" / String / "approve")
        .and(warp::post())
        .and(warp::header::optional::<String>("x-sender"))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(handlers::approve_request);

    let get_prescription = warp::path!("prescriptions" / String)
        .and(warp::get())
        .and(warp::header::optional::<String>("x-viewer"))
        .and(with_state(state.clone()))
        .and_then(handlers::get_prescription);

    let patient_prescriptions = warp::path!("patients" / String / "prescriptions")
        .and(warp::get())
        .and(warp::header::optional::<String>("x-viewer"))
        .and(with_state(state.clone()))
        .and_then(handlers::patient_prescriptions);

    let record_metric = warp::path!("metrics")
        .and(warp::post())
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(handlers::record_metric);

    let read_metrics = warp::path!("metrics")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handlers::read_metrics);

    let api = warp::path("api").and(
        create_request
            .or(list_requests)
            .or(approve_request)
            .or(get_prescription)
            .or(patient_prescriptions)
            .or(record_metric)
            .or(read_metrics),
    );

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_headers(vec!["content-type", "x-sender", "x-viewer"]);

    let metrics = state.metrics.clone();
    let access_log = warp::log::custom(move |req: warp::log::Info<'_>| {
        let elapsed_ms = req.elapsed().as_secs_f64() * 1000.0;
        metrics.record(&api_latency_metric(req.method().as_str(), req.path()), elapsed_ms);
        info!("{} {} {} {:.1}ms", req.method(), req.path(), req.status().as_u16(), elapsed_ms);
    });

    health
        .or(api)
        .recover(handle_rejection)
        .with(cors)
        .with(access_log)
}
