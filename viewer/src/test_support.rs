//! In-process stand-in for the short-term-history service.

use crate::config::Config;
use crate::model::Channel;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub enum MockReply {
    Json(Value),
    Status(StatusCode),
    Delay(Duration),
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub entity_type: String,
    pub entity_id: String,
    pub attribute: String,
    pub last_n: Option<String>,
    pub service: Option<String>,
    pub service_path: Option<String>,
    pub correlator: Option<String>,
    pub received_at: Instant,
}

/// Replies are queued per attribute; the last queued reply repeats.
#[derive(Debug, Clone, Default)]
pub struct MockSth {
    replies: Arc<Mutex<HashMap<String, VecDeque<MockReply>>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockSth {
    pub fn reply(&self, channel: Channel, reply: MockReply) {
        self.replies
            .lock()
            .unwrap()
            .entry(channel.as_str().to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_reply(&self, attribute: &str) -> Option<MockReply> {
        let mut replies = self.replies.lock().unwrap();
        let queue = replies.get_mut(attribute)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }

    pub async fn spawn(&self) -> SocketAddr {
        let app = Router::new()
            .route(
                "/STH/v1/contextEntities/type/:entity_type/id/:entity_id/attributes/:attribute",
                get(handle),
            )
            .with_state(self.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }
}

async fn handle(
    State(mock): State<MockSth>,
    Path((entity_type, entity_id, attribute)): Path<(String, String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
    };

    mock.requests.lock().unwrap().push(RecordedRequest {
        entity_type,
        entity_id,
        last_n: query.get("lastN").cloned(),
        service: header("fiware-service"),
        service_path: header("fiware-servicepath"),
        correlator: header("fiware-correlator"),
        attribute: attribute.clone(),
        received_at: Instant::now(),
    });

    match mock.next_reply(&attribute) {
        Some(MockReply::Json(body)) => Json(body).into_response(),
        Some(MockReply::Status(status)) => status.into_response(),
        Some(MockReply::Delay(delay)) => {
            tokio::time::sleep(delay).await;
            Json(envelope(&[])).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Builds a 200 body with the given `(attrValue, recvTime)` records.
pub fn envelope(records: &[(&str, &str)]) -> Value {
    let values: Vec<Value> = records
        .iter()
        .map(|(value, time)| json!({"_id": "65a1", "attrValue": value, "recvTime": time}))
        .collect();

    json!({
        "contextResponses": [{
            "contextElement": {
                "attributes": [{"name": "attr", "values": values}],
                "id": "urn:ngsi-ld:Lamp:003",
                "isPattern": false,
                "type": "Lamp"
            },
            "statusCode": {"code": "200", "reasonPhrase": "OK"}
        }]
    })
}

pub fn test_config(addr: SocketAddr) -> Config {
    Config {
        sth_host: addr.ip().to_string(),
        sth_port: addr.port(),
        request_timeout: Duration::from_millis(500),
        ..Config::default()
    }
}
