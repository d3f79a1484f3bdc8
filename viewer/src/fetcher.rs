use crate::config::Config;
use crate::errors::{Error, Result};
use crate::metrics::{
    FETCH_EMPTY_TOTAL, FETCH_FAILURES_TOTAL, FETCH_REQUESTS_TOTAL, SKIPPED_RECORDS_TOTAL,
};
use crate::model::{Channel, FetchWindow, SensorPoint};
use crate::timestamp::normalize;
use chrono_tz::Tz;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Result of a fetch that reached the remote store and decoded cleanly
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Points(Vec<SensorPoint>),
    /// The remote store holds no values for the attribute
    Empty,
}

impl FetchOutcome {
    pub fn into_points(self) -> Vec<SensorPoint> {
        match self {
            FetchOutcome::Points(points) => points,
            FetchOutcome::Empty => Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SthEnvelope {
    context_responses: Vec<ContextResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContextResponse {
    context_element: ContextElement,
}

#[derive(Debug, Deserialize)]
struct ContextElement {
    attributes: Vec<SthAttribute>,
}

#[derive(Debug, Deserialize)]
struct SthAttribute {
    values: Vec<SthRecord>,
}

/// One raw `{attrValue, recvTime}` entry; fields are checked per record.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SthRecord {
    #[serde(default)]
    pub attr_value: Value,
    #[serde(default)]
    pub recv_time: Option<String>,
}

/// Queries the short-term-history service, one attribute per request.
#[derive(Debug, Clone)]
pub struct ChannelFetcher {
    http: Client,
    config: Config,
}

impl ChannelFetcher {
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    /// Fetches the last-N window for `channel`. Never fails: every error is
    /// logged and counted, then degraded to an empty result.
    pub async fn fetch(&self, channel: Channel) -> Vec<SensorPoint> {
        FETCH_REQUESTS_TOTAL
            .with_label_values(&[channel.as_str()])
            .inc();

        match self.try_fetch(channel).await {
            Ok(FetchOutcome::Empty) => {
                FETCH_EMPTY_TOTAL.with_label_values(&[channel.as_str()]).inc();
                info!("Remote store has no {} values", channel);
                Vec::new()
            }
            Ok(outcome) => outcome.into_points(),
            Err(e) => {
                FETCH_FAILURES_TOTAL
                    .with_label_values(&[channel.as_str(), e.reason()])
                    .inc();
                warn!("Fetch for {} failed ({}): {}", channel, e.reason(), e);
                Vec::new()
            }
        }
    }

    pub async fn try_fetch(&self, channel: Channel) -> Result<FetchOutcome> {
        let url = self.config.endpoint(channel).url();
        let correlator = Uuid::new_v4().to_string();
        let window = self.config.window;

        debug!(
            "GET {}?lastN={} (correlator {})",
            url,
            window.last_n(),
            correlator
        );

        let response = self
            .http
            .get(&url)
            .query(&[("lastN", window.last_n())])
            .header("fiware-service", &self.config.fiware_service)
            .header("fiware-servicepath", &self.config.fiware_servicepath)
            .header("fiware-correlator", &correlator)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::RemoteUnavailable(status));
        }

        let body = response.bytes().await?;
        let records = extract_records(&body)?;

        debug!(
            "Received {} {} records (correlator {})",
            records.len(),
            channel,
            correlator
        );

        Ok(convert_records(channel, records, window, self.config.timezone))
    }
}

/// Unwraps `contextResponses[0].contextElement.attributes[0].values`.
pub fn extract_records(body: &[u8]) -> Result<Vec<SthRecord>> {
    let envelope: SthEnvelope = serde_json::from_slice(body)
        .map_err(|e| Error::MalformedResponse(e.to_string()))?;

    let response = envelope
        .context_responses
        .into_iter()
        .next()
        .ok_or_else(|| Error::MalformedResponse("empty contextResponses".to_string()))?;

    let attribute = response
        .context_element
        .attributes
        .into_iter()
        .next()
        .ok_or_else(|| Error::MalformedResponse("empty attributes".to_string()))?;

    Ok(attribute.values)
}

/// Converts raw records in remote order, keeping at most the window's
/// newest entries. Records with a bad value or timestamp are skipped.
pub fn convert_records(
    channel: Channel,
    records: Vec<SthRecord>,
    window: FetchWindow,
    tz: Tz,
) -> FetchOutcome {
    if records.is_empty() {
        return FetchOutcome::Empty;
    }

    let excess = records.len().saturating_sub(window.last_n());
    let mut points = Vec::with_capacity(records.len() - excess);

    for record in records.into_iter().skip(excess) {
        match parse_record(&record, tz) {
            Ok(point) => points.push(point),
            Err(e) => {
                SKIPPED_RECORDS_TOTAL
                    .with_label_values(&[channel.as_str()])
                    .inc();
                warn!("Skipping {} record: {}", channel, e);
            }
        }
    }

    FetchOutcome::Points(points)
}

fn parse_record(record: &SthRecord, tz: Tz) -> Result<SensorPoint> {
    let value = match &record.attr_value {
        Value::String(raw) => raw
            .trim()
            .parse::<f64>()
            .map_err(|_| Error::InvalidValue(format!("attrValue '{}' is not a number", raw)))?,
        Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| Error::InvalidValue(format!("attrValue {} out of range", number)))?,
        other => {
            return Err(Error::InvalidValue(format!(
                "unsupported attrValue {}",
                other
            )))
        }
    };

    let recv_time = record
        .recv_time
        .as_deref()
        .ok_or_else(|| Error::Format("missing recvTime".to_string()))?;
    let timestamp = normalize(recv_time, tz)?;

    Ok(SensorPoint { timestamp, value })
}
