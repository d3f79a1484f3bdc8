use crate::model::Channel;
use crate::store::StoreSnapshot;
use chrono::{DateTime, SecondsFormat};
use chrono_tz::Tz;
use serde::Serialize;

const LINE_MODE: &str = "lines+markers";

/// Horizontal axis of a line series
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "points", rename_all = "lowercase")]
pub enum XAxis {
    /// Local civil timestamps, RFC 3339
    Time(Vec<String>),
    /// Position within the latest snapshot
    Index(Vec<usize>),
}

#[cfg(test)]
impl XAxis {
    pub fn len(&self) -> usize {
        match self {
            XAxis::Time(points) => points.len(),
            XAxis::Index(points) => points.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Chart-ready trace plus its layout title
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineSeries {
    pub channel: Channel,
    pub name: &'static str,
    pub title: &'static str,
    pub mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<&'static str>,
    pub x: XAxis,
    pub y: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub cycle: u64,
    pub updated_at: Option<String>,
    pub series: Vec<LineSeries>,
}

impl Dashboard {
    /// What readers see before the first cycle completes
    pub fn empty() -> Self {
        render(&StoreSnapshot::default(), 0, None)
    }

    pub fn series(&self, channel: Channel) -> Option<&LineSeries> {
        self.series.iter().find(|s| s.channel == channel)
    }
}

/// Builds the three series from a store snapshot. Luminosity is plotted
/// against its accumulated timestamps; temperature and humidity only carry
/// positional indices since their snapshots drop the time axis.
pub fn render(snapshot: &StoreSnapshot, cycle: u64, updated_at: Option<DateTime<Tz>>) -> Dashboard {
    let luminosity = LineSeries {
        channel: Channel::Luminosity,
        name: "Luminosity",
        title: "Luminosity over Time",
        mode: LINE_MODE,
        color: None,
        x: XAxis::Time(
            snapshot
                .luminosity
                .timestamps
                .iter()
                .map(format_timestamp)
                .collect(),
        ),
        y: snapshot.luminosity.values.clone(),
    };

    Dashboard {
        cycle,
        updated_at: updated_at.as_ref().map(format_timestamp),
        series: vec![
            luminosity,
            indexed_series(
                Channel::Temperature,
                "Temperature",
                "Temperature over Time",
                "red",
                &snapshot.temperature,
            ),
            indexed_series(
                Channel::Humidity,
                "Humidity",
                "Humidity over Time",
                "green",
                &snapshot.humidity,
            ),
        ],
    }
}

fn indexed_series(
    channel: Channel,
    name: &'static str,
    title: &'static str,
    color: &'static str,
    values: &[f64],
) -> LineSeries {
    LineSeries {
        channel,
        name,
        title,
        mode: LINE_MODE,
        color: Some(color),
        x: XAxis::Index((0..values.len()).collect()),
        y: values.to_vec(),
    }
}

fn format_timestamp(timestamp: &DateTime<Tz>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, false)
}
