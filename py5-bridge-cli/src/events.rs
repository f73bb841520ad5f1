//! Frame schedule for input events and processing-mode calls

use crate::config::{CallConfig, EventConfig};
use py5_bridge::HostValue;
use std::collections::BTreeMap;

/// Events and calls grouped by the frame they are due on
#[derive(Debug, Default)]
pub struct Schedule<'a> {
    events: BTreeMap<u64, Vec<&'a EventConfig>>,
    calls: BTreeMap<u64, Vec<&'a CallConfig>>,
}

impl<'a> Schedule<'a> {
    /// Group events and calls by frame, keeping file order within a frame
    pub fn new(events: &'a [EventConfig], calls: &'a [CallConfig]) -> Self {
        let mut schedule = Self::default();
        for event in events {
            schedule.events.entry(event.frame).or_default().push(event);
        }
        for call in calls {
            schedule.calls.entry(call.frame).or_default().push(call);
        }
        schedule
    }

    /// Events due on `frame`
    pub fn events_on(&self, frame: u64) -> &[&'a EventConfig] {
        self.events.get(&frame).map(Vec::as_slice).unwrap_or_default()
    }

    /// Processing-mode calls due on `frame`
    pub fn calls_on(&self, frame: u64) -> &[&'a CallConfig] {
        self.calls.get(&frame).map(Vec::as_slice).unwrap_or_default()
    }

    /// Number of scheduled entries after `frame` that will never run
    pub fn pending_after(&self, frame: u64) -> usize {
        let events: usize = self.events.range(frame + 1..).map(|(_, v)| v.len()).sum();
        let calls: usize = self.calls.range(frame + 1..).map(|(_, v)| v.len()).sum();
        events + calls
    }
}

/// Convert parameters from the sketch file into host values
pub fn host_params(params: &[serde_json::Value]) -> Vec<HostValue> {
    params.iter().cloned().map(HostValue::from).collect()
}
