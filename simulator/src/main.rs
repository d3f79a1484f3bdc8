mod telemetry;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use clap::Parser;
use rand::Rng;
use serde::Deserialize;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use telemetry::{History, SthResponse};
use tracing::{debug, error, info, warn};

/// Mock short-term-history service serving generated lamp telemetry
#[derive(Debug, Parser)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "SIM_ADDR", default_value = "0.0.0.0:8666")]
    addr: String,

    /// Interval between generated samples
    #[arg(long, env = "SAMPLE_INTERVAL_MS", default_value_t = 2000)]
    sample_interval_ms: u64,

    /// Samples kept per attribute
    #[arg(long, env = "HISTORY", default_value_t = 500)]
    history: usize,

    /// Probability of answering 503 instead of data
    #[arg(long, env = "FAILURE_RATE", default_value_t = 0.0)]
    failure_rate: f64,
}

#[derive(Clone)]
struct AppState {
    history: Arc<RwLock<History>>,
    failure_rate: f64,
}

#[derive(Debug, Deserialize)]
struct SthQuery {
    #[serde(rename = "lastN")]
    last_n: Option<usize>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    info!("Starting telemetry store simulator");
    info!(
        "Listening on {}, sample every {}ms, history {}, failure rate {}",
        args.addr, args.sample_interval_ms, args.history, args.failure_rate
    );

    let history = Arc::new(RwLock::new(History::new(args.history)));

    let generator = history.clone();
    let sample_interval = Duration::from_millis(args.sample_interval_ms.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sample_interval);
        let mut generated = 0u64;
        loop {
            ticker.tick().await;
            let mut rng = rand::thread_rng();
            match generator.write() {
                Ok(mut history) => history.record(&mut rng, Utc::now()),
                Err(e) => {
                    error!("History lock poisoned: {}", e);
                    break;
                }
            }
            generated += 1;
            if generated % 100 == 0 {
                info!("Generated {} samples per attribute", generated);
            }
        }
    });

    let state = AppState {
        history,
        failure_rate: args.failure_rate.clamp(0.0, 1.0),
    };

    let app = app(state);

    let listener = match tokio::net::TcpListener::bind(&args.addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", args.addr, e);
            std::process::exit(1);
        }
    };

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap_or_else(|e| {
            error!("HTTP server error: {}", e);
        });
    });

    tokio::select! {
        _ = server_handle => {
            error!("HTTP server terminated");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }
}

fn app(state: AppState) -> Router {
    Router::new()
        .route(
            "/STH/v1/contextEntities/type/:entity_type/id/:entity_id/attributes/:attribute",
            get(get_attribute),
        )
        .with_state(state)
}

async fn get_attribute(
    State(state): State<AppState>,
    Path((entity_type, entity_id, attribute)): Path<(String, String, String)>,
    Query(query): Query<SthQuery>,
    headers: HeaderMap,
) -> Response {
    if !headers.contains_key("fiware-service") {
        warn!("Rejecting request without fiware-service header");
        return (StatusCode::BAD_REQUEST, "missing fiware-service header").into_response();
    }

    if rand::thread_rng().gen_bool(state.failure_rate) {
        debug!("Injecting failure for {}", attribute);
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let last_n = query.last_n.unwrap_or(1);
    let samples = match state.history.read() {
        Ok(history) => history.last_n(&attribute, last_n),
        Err(e) => {
            error!("History lock poisoned: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match samples {
        Some(samples) => {
            debug!("Serving {} {} samples", samples.len(), attribute);
            Json(SthResponse::new(&entity_type, &entity_id, &attribute, &samples)).into_response()
        }
        None => (StatusCode::NOT_FOUND, format!("unknown attribute {}", attribute)).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    const LAMP_PATH: &str = "/STH/v1/contextEntities/type/Lamp/id/urn:ngsi-ld:Lamp:003/attributes";

    fn state(failure_rate: f64) -> AppState {
        let mut history = History::new(10);
        let mut rng = rand::thread_rng();
        let start = Utc::now();
        for i in 0..5 {
            history.record(&mut rng, start + chrono::Duration::seconds(i));
        }
        AppState {
            history: Arc::new(RwLock::new(history)),
            failure_rate,
        }
    }

    fn request(uri: &str, with_service: bool) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if with_service {
            builder = builder
                .header("fiware-service", "smart")
                .header("fiware-servicepath", "/");
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn values(response: Response) -> Vec<serde_json::Value> {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        json["contextResponses"][0]["contextElement"]["attributes"][0]["values"]
            .as_array()
            .cloned()
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_service_header_is_rejected() {
        let uri = format!("{}/luminosity?lastN=3", LAMP_PATH);
        let response = app(state(0.0)).oneshot(request(&uri, false)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_failure_injection_returns_503() {
        let uri = format!("{}/temperature?lastN=3", LAMP_PATH);
        let response = app(state(1.0)).oneshot(request(&uri, true)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_unknown_attribute_is_404() {
        let uri = format!("{}/pressure?lastN=3", LAMP_PATH);
        let response = app(state(0.0)).oneshot(request(&uri, true)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_last_n_defaults_to_one() {
        let uri = format!("{}/humidity", LAMP_PATH);
        let response = app(state(0.0)).oneshot(request(&uri, true)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(values(response).await.len(), 1);
    }

    #[tokio::test]
    async fn test_last_n_limits_values() {
        let app = app(state(0.0));

        let uri = format!("{}/luminosity?lastN=3", LAMP_PATH);
        let response = app.clone().oneshot(request(&uri, true)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let served = values(response).await;
        assert_eq!(served.len(), 3);
        assert!(served[0]["recvTime"].as_str() < served[2]["recvTime"].as_str());

        let uri = format!("{}/luminosity?lastN=50", LAMP_PATH);
        let response = app.oneshot(request(&uri, true)).await.unwrap();
        assert_eq!(values(response).await.len(), 5);
    }
}
