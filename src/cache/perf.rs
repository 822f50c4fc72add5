use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;

use crate::clock::SharedClock;

/// Samples kept per operation.
pub const WINDOW: usize = 100;

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct OpStats {
    pub count: usize,
    pub average: f64,
    pub min: u64,
    pub max: u64,
}

/// Rolling per-operation latency samples in milliseconds.
pub struct PerfMonitor {
    samples: Mutex<HashMap<String, VecDeque<u64>>>,
    clock: SharedClock,
}

impl PerfMonitor {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            samples: Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub fn track(&self, op: &str, duration_ms: u64) {
        let mut samples = self.samples.lock();
        let window = samples.entry(op.to_string()).or_default();
        window.push_back(duration_ms);
        if window.len() > WINDOW {
            window.pop_front();
        }
    }

    pub fn stats(&self, op: &str) -> Option<OpStats> {
        let samples = self.samples.lock();
        samples.get(op).and_then(summarize)
    }

    pub fn all_stats(&self) -> BTreeMap<String, OpStats> {
        let samples = self.samples.lock();
        samples
            .iter()
            .filter_map(|(op, window)| summarize(window).map(|s| (op.clone(), s)))
            .collect()
    }

    /// Await `fut`, recording its duration under `op`, or `op:error` when it
    /// fails.
    pub async fn time<T, E, Fut>(&self, op: &str, fut: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        let start = self.clock.now_ms();
        let result = fut.await;
        let elapsed = self.clock.now_ms().saturating_sub(start);

        match &result {
            Ok(_) => self.track(op, elapsed),
            Err(_) => self.track(&format!("{op}:error"), elapsed),
        }
        result
    }
}

fn summarize(window: &VecDeque<u64>) -> Option<OpStats> {
    if window.is_empty() {
        return None;
    }
    let total: u64 = window.iter().sum();
    Some(OpStats {
        count: window.len(),
        average: total as f64 / window.len() as f64,
        min: window.iter().copied().min().unwrap_or_default(),
        max: window.iter().copied().max().unwrap_or_default(),
    })
}

pub type PerfData = Arc<PerfMonitor>;
