//! The in-memory aggregation shelf.
//!
//! Mirrors `navdoon.processor.StatsShelf`: one lock, four maps, and an
//! atomic swap-and-clear at snapshot time. Timer statistics are derived
//! lazily when the snapshot is expanded into records, not on every `add`.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::wire::Sample;

#[derive(Default)]
struct ShelfState {
    counters: HashMap<String, f64>,
    gauges: HashMap<String, f64>,
    sets: HashMap<String, std::collections::HashSet<String>>,
    timers: HashMap<String, Vec<f64>>,
}

/// The mutable aggregation structure holding current-window state.
///
/// Safe to share across collector tasks via `Arc`; `add` takes `&self`.
pub struct Shelf {
    state: Mutex<ShelfState>,
}

impl Default for Shelf {
    fn default() -> Self {
        Self::new()
    }
}

impl Shelf {
    pub fn new() -> Self {
        Shelf {
            state: Mutex::new(ShelfState::default()),
        }
    }

    /// Apply one parsed sample to the shelf.
    pub fn add(&self, sample: Sample) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match sample {
            Sample::Counter {
                name,
                count,
                sample_rate,
            } => {
                *state.counters.entry(name).or_insert(0.0) += count / sample_rate;
            }
            Sample::Gauge { name, value } => {
                state.gauges.insert(name, value);
            }
            Sample::GaugeDelta { name, delta } => {
                state
                    .gauges
                    .entry(name)
                    .and_modify(|v| *v += delta)
                    .or_insert(delta);
            }
            Sample::Set { name, member } => {
                state.sets.entry(name).or_default().insert(member);
            }
            Sample::Timer {
                name,
                milliseconds,
            } => {
                state.timers.entry(name).or_default().push(milliseconds);
            }
        }
    }

    /// Atomically move the four maps out and replace them with empty ones.
    /// Subsequent `add` calls never touch the returned snapshot.
    pub fn snapshot_and_clear(&self) -> RawSnapshot {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let taken = std::mem::take(&mut *state);
        RawSnapshot {
            counters: taken.counters,
            gauges: taken.gauges,
            sets: taken.sets,
            timers: taken.timers,
        }
    }
}

/// The four maps captured at a flush instant, before expansion into records.
pub struct RawSnapshot {
    pub counters: HashMap<String, f64>,
    pub gauges: HashMap<String, f64>,
    pub sets: HashMap<String, std::collections::HashSet<String>>,
    pub timers: HashMap<String, Vec<f64>>,
}

/// One serializable `(name, value, timestamp)` triple.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub name: String,
    pub value: f64,
    pub timestamp: f64,
}

/// An ordered, immutable copy of the shelf at a flush instant, expanded
/// into serializable records. Timers expand into five records each
/// (`.count`, `.min`, `.max`, `.mean`, `.median`); sets emit `|members|`.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub records: Vec<Record>,
}

impl RawSnapshot {
    /// Expand the raw maps into an ordered list of records, stamping every
    /// record with `timestamp`.
    pub fn into_snapshot(self, timestamp: f64) -> Snapshot {
        let mut records = Vec::new();

        for (name, value) in self.counters {
            records.push(Record {
                name,
                value,
                timestamp,
            });
        }
        for (name, value) in self.gauges {
            records.push(Record {
                name,
                value,
                timestamp,
            });
        }
        for (name, members) in self.sets {
            records.push(Record {
                name,
                value: members.len() as f64,
                timestamp,
            });
        }
        for (name, samples) in self.timers {
            if samples.is_empty() {
                continue;
            }
            for (suffix, value) in timer_stats(&samples) {
                records.push(Record {
                    name: format!("{name}.{suffix}"),
                    value,
                    timestamp,
                });
            }
        }

        Snapshot { records }
    }
}

/// Compute the five timer statistics for one window's worth of samples.
/// `samples` must be non-empty. Sort is stable; ties break by arrival order.
fn timer_stats(samples: &[f64]) -> [(&'static str, f64); 5] {
    let count = samples.len();
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let min = sorted[0];
    let max = sorted[count - 1];
    let sum: f64 = sorted.iter().sum();
    let mean = sum / count as f64;

    let median = if count == 1 {
        sorted[0]
    } else if count == 2 {
        (sorted[0] + sorted[1]) / 2.0
    } else if count % 2 == 1 {
        sorted[count / 2]
    } else {
        (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
    };

    [
        ("count", count as f64),
        ("min", min),
        ("max", max),
        ("mean", mean),
        ("median", median),
    ]
}
