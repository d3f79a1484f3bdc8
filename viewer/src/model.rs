use chrono::DateTime;
use chrono_tz::Tz;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Sensor measurement stream of the monitored device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Luminosity,
    Temperature,
    Humidity,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Luminosity, Channel::Temperature, Channel::Humidity];

    /// Attribute name on the remote entity
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Luminosity => "luminosity",
            Channel::Temperature => "temperature",
            Channel::Humidity => "humidity",
        }
    }

    /// Static retention classification; never inferred from data.
    pub fn policy(&self) -> RetentionPolicy {
        match self {
            Channel::Luminosity => RetentionPolicy::Cumulative,
            Channel::Temperature | Channel::Humidity => RetentionPolicy::Snapshot,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "luminosity" => Ok(Channel::Luminosity),
            "temperature" => Ok(Channel::Temperature),
            "humidity" => Ok(Channel::Humidity),
            other => Err(format!("unknown channel '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// New points are appended to the retained history
    Cumulative,
    /// New points replace the retained set
    Snapshot,
}

/// One remote record after conversion
#[derive(Debug, Clone, PartialEq)]
pub struct SensorPoint {
    pub timestamp: DateTime<Tz>,
    pub value: f64,
}

/// Number of most recent points requested per query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    last_n: usize,
}

impl FetchWindow {
    pub fn new(last_n: usize) -> Self {
        Self {
            last_n: last_n.max(1),
        }
    }

    pub fn last_n(&self) -> usize {
        self.last_n
    }
}

/// Addressing of one remote attribute stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
    pub host: String,
    pub port: u16,
    pub entity_type: String,
    pub entity_id: String,
    pub channel: Channel,
}

impl RemoteEndpoint {
    pub fn url(&self) -> String {
        format!(
            "http://{}:{}/STH/v1/contextEntities/type/{}/id/{}/attributes/{}",
            self.host, self.port, self.entity_type, self.entity_id, self.channel
        )
    }
}
