use crate::model::{Channel, RetentionPolicy, SensorPoint};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreSettings {
    /// Ring-buffer cap for cumulative channels; `None` grows without bound
    pub max_points: Option<usize>,
    /// Skip cumulative points whose timestamp is already retained
    pub dedup: bool,
}

/// History kept as two lock-step sequences.
#[derive(Debug, Clone)]
struct CumulativeBuffer {
    timestamps: VecDeque<DateTime<Tz>>,
    values: VecDeque<f64>,
    seen: HashSet<DateTime<Utc>>,
    /// Newest timestamp evicted by the cap; older refetched points are stale
    evicted_through: Option<DateTime<Utc>>,
    settings: StoreSettings,
}

impl CumulativeBuffer {
    fn new(settings: StoreSettings) -> Self {
        Self {
            timestamps: VecDeque::new(),
            values: VecDeque::new(),
            seen: HashSet::new(),
            evicted_through: None,
            settings,
        }
    }

    fn extend(&mut self, fetched: Vec<SensorPoint>) -> usize {
        let mut appended = 0;

        for point in fetched {
            if self.settings.dedup {
                let utc = point.timestamp.with_timezone(&Utc);
                if self.evicted_through.is_some_and(|mark| utc <= mark) || !self.seen.insert(utc) {
                    continue;
                }
            }
            self.timestamps.push_back(point.timestamp);
            self.values.push_back(point.value);
            appended += 1;
        }

        if let Some(cap) = self.settings.max_points {
            while self.values.len() > cap {
                self.values.pop_front();
                if let Some(evicted) = self.timestamps.pop_front() {
                    if self.settings.dedup {
                        let utc = evicted.with_timezone(&Utc);
                        self.seen.remove(&utc);
                        self.evicted_through = self.evicted_through.max(Some(utc));
                    }
                }
            }
        }

        debug_assert_eq!(self.timestamps.len(), self.values.len());
        appended
    }

    fn len(&self) -> usize {
        self.values.len()
    }
}

/// Latest fetch only; timestamps are not retained.
#[derive(Debug, Clone, Default)]
struct SnapshotBuffer {
    values: Vec<f64>,
}

impl SnapshotBuffer {
    fn replace(&mut self, fetched: Vec<SensorPoint>) -> usize {
        self.values = fetched.into_iter().map(|p| p.value).collect();
        self.values.len()
    }
}

#[derive(Debug, Clone)]
enum ChannelBuffer {
    Cumulative(CumulativeBuffer),
    Snapshot(SnapshotBuffer),
}

impl ChannelBuffer {
    fn for_policy(policy: RetentionPolicy, settings: StoreSettings) -> Self {
        match policy {
            RetentionPolicy::Cumulative => ChannelBuffer::Cumulative(CumulativeBuffer::new(settings)),
            RetentionPolicy::Snapshot => ChannelBuffer::Snapshot(SnapshotBuffer::default()),
        }
    }

    fn len(&self) -> usize {
        match self {
            ChannelBuffer::Cumulative(buffer) => buffer.len(),
            ChannelBuffer::Snapshot(buffer) => buffer.values.len(),
        }
    }

    fn timestamps(&self) -> Vec<DateTime<Tz>> {
        match self {
            ChannelBuffer::Cumulative(buffer) => buffer.timestamps.iter().cloned().collect(),
            ChannelBuffer::Snapshot(_) => Vec::new(),
        }
    }

    fn values(&self) -> Vec<f64> {
        match self {
            ChannelBuffer::Cumulative(buffer) => buffer.values.iter().copied().collect(),
            ChannelBuffer::Snapshot(buffer) => buffer.values.clone(),
        }
    }
}

/// Series with its own time axis
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimedValues {
    pub timestamps: Vec<DateTime<Tz>>,
    pub values: Vec<f64>,
}

/// Copy of the store contents handed to the render stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    pub luminosity: TimedValues,
    pub temperature: Vec<f64>,
    pub humidity: Vec<f64>,
}

/// Retained per-channel buffers. Owned by the poller; created empty and
/// discarded at shutdown.
#[derive(Debug, Clone)]
pub struct AccumulationStore {
    buffers: HashMap<Channel, ChannelBuffer>,
}

impl AccumulationStore {
    pub fn new(settings: StoreSettings) -> Self {
        let buffers = Channel::ALL
            .iter()
            .map(|&channel| (channel, ChannelBuffer::for_policy(channel.policy(), settings)))
            .collect();

        Self { buffers }
    }

    /// Merges fetched points into the channel's buffer and returns how many
    /// were taken in. An empty fetch leaves the buffer untouched.
    pub fn apply(&mut self, channel: Channel, fetched: Vec<SensorPoint>) -> usize {
        if fetched.is_empty() {
            return 0;
        }

        let fetched_len = fetched.len();
        let taken = match self.buffers.get_mut(&channel) {
            Some(ChannelBuffer::Cumulative(buffer)) => buffer.extend(fetched),
            Some(ChannelBuffer::Snapshot(buffer)) => buffer.replace(fetched),
            None => return 0,
        };

        debug!(
            "Applied {}/{} {} points, buffer now {}",
            taken,
            fetched_len,
            channel,
            self.len(channel)
        );
        taken
    }

    pub fn len(&self, channel: Channel) -> usize {
        self.buffers.get(&channel).map_or(0, ChannelBuffer::len)
    }

    pub fn timestamps(&self, channel: Channel) -> Vec<DateTime<Tz>> {
        self.buffers
            .get(&channel)
            .map(ChannelBuffer::timestamps)
            .unwrap_or_default()
    }

    pub fn values(&self, channel: Channel) -> Vec<f64> {
        self.buffers
            .get(&channel)
            .map(ChannelBuffer::values)
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            luminosity: TimedValues {
                timestamps: self.timestamps(Channel::Luminosity),
                values: self.values(Channel::Luminosity),
            },
            temperature: self.values(Channel::Temperature),
            humidity: self.values(Channel::Humidity),
        }
    }
}
