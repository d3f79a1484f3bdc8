use chrono::{DateTime, SecondsFormat, Utc};
use rand::Rng;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};

pub const ATTRIBUTES: [&str; 3] = ["luminosity", "temperature", "humidity"];

#[derive(Debug, Clone)]
pub struct Sample {
    pub value: f64,
    pub recv_time: DateTime<Utc>,
}

/// Bounded per-attribute history, oldest first
#[derive(Debug)]
pub struct History {
    samples: HashMap<&'static str, VecDeque<Sample>>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: ATTRIBUTES.iter().map(|&a| (a, VecDeque::new())).collect(),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&mut self, rng: &mut impl Rng, now: DateTime<Utc>) {
        for attribute in ATTRIBUTES {
            let value = generate_value(rng, attribute);
            if let Some(queue) = self.samples.get_mut(attribute) {
                queue.push_back(Sample {
                    value,
                    recv_time: now,
                });
                while queue.len() > self.capacity {
                    queue.pop_front();
                }
            }
        }
    }

    /// Newest `last_n` samples, still oldest first. `None` for an unknown attribute.
    pub fn last_n(&self, attribute: &str, last_n: usize) -> Option<Vec<Sample>> {
        let queue = self.samples.get(attribute)?;
        let skip = queue.len().saturating_sub(last_n);
        Some(queue.iter().skip(skip).cloned().collect())
    }
}

fn generate_value(rng: &mut impl Rng, attribute: &str) -> f64 {
    let value = match attribute {
        "luminosity" => {
            if rng.gen_bool(0.05) {
                rng.gen_range(0.0..5.0) // 5% lights off
            } else {
                rng.gen_range(300.0..900.0)
            }
        }
        "temperature" => rng.gen_range(15.0..35.0),
        _ => rng.gen_range(30.0..80.0),
    };
    (value * 100.0_f64).round() / 100.0
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SthResponse {
    pub context_responses: Vec<ContextResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextResponse {
    pub context_element: ContextElement,
    pub status_code: StatusCode,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextElement {
    pub attributes: Vec<Attribute>,
    pub id: String,
    pub is_pattern: bool,
    #[serde(rename = "type")]
    pub entity_type: String,
}

#[derive(Debug, Serialize)]
pub struct Attribute {
    pub name: String,
    pub values: Vec<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Value {
    pub recv_time: String,
    pub attr_type: String,
    pub attr_value: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCode {
    pub code: String,
    pub reason_phrase: String,
}

impl SthResponse {
    pub fn new(entity_type: &str, entity_id: &str, attribute: &str, samples: &[Sample]) -> Self {
        let values = samples
            .iter()
            .map(|sample| Value {
                recv_time: sample.recv_time.to_rfc3339_opts(SecondsFormat::Millis, true),
                attr_type: "Number".to_string(),
                attr_value: sample.value.to_string(),
            })
            .collect();

        Self {
            context_responses: vec![ContextResponse {
                context_element: ContextElement {
                    attributes: vec![Attribute {
                        name: attribute.to_string(),
                        values,
                    }],
                    id: entity_id.to_string(),
                    is_pattern: false,
                    entity_type: entity_type.to_string(),
                },
                status_code: StatusCode {
                    code: "200".to_string(),
                    reason_phrase: "OK".to_string(),
                },
            }],
        }
    }
}
