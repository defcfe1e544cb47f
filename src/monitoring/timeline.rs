//! Execution Timeline
//!
//! The execution trace of a run: one `Entry`, `Skipped` or `Exit` event per
//! node transition, in the order they happened. Every event is also written
//! to the log as `<path> <Event>`.
//!
//! The timeline is shared by all branches of a run, so recording takes
//! `&self` and synchronizes internally.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use log::info;
use serde::Serialize;

use crate::error::{Result, WorkflowError};

/// Type of timeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventType {
    /// Node started
    Entry,
    /// Node's condition was false; its subtree did not run
    Skipped,
    /// Node finished
    Exit,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Entry => "Entry",
            Self::Skipped => "Skipped",
            Self::Exit => "Exit",
        };
        f.write_str(name)
    }
}

/// A single event in the execution timeline.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineEvent {
    /// Path of the node
    pub path: String,
    /// Type of event
    pub event_type: EventType,
    /// Wall-clock time of the event
    pub timestamp: DateTime<Local>,
    /// Milliseconds since the timeline started
    pub elapsed_ms: u128,
}

/// Records the execution trace of a workflow run.
#[derive(Debug)]
pub struct ExecutionTimeline {
    events: Mutex<Vec<TimelineEvent>>,
    start_time: Instant,
}

impl ExecutionTimeline {
    /// Creates a new timeline starting now.
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            start_time: Instant::now(),
        }
    }

    /// Records and logs an event for a node.
    ///
    /// The log line is written while the event list is locked, so the log
    /// and the timeline agree on ordering.
    pub fn record(&self, path: &str, event_type: EventType) {
        let mut events = self.lock();
        info!("{} {}", path, event_type);
        events.push(TimelineEvent {
            path: path.to_string(),
            event_type,
            timestamp: Local::now(),
            elapsed_ms: self.start_time.elapsed().as_millis(),
        });
    }

    /// Returns a snapshot of all recorded events, in order.
    pub fn get_events(&self) -> Vec<TimelineEvent> {
        self.lock().clone()
    }

    /// Index of the first `event_type` event for `path`.
    pub fn position(&self, path: &str, event_type: EventType) -> Option<usize> {
        self.lock()
            .iter()
            .position(|e| e.path == path && e.event_type == event_type)
    }

    /// Event types recorded for one node, in order.
    pub fn events_for(&self, path: &str) -> Vec<EventType> {
        self.lock()
            .iter()
            .filter(|e| e.path == path)
            .map(|e| e.event_type)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Returns the total elapsed time since timeline creation.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Returns node durations in milliseconds, from `Entry` to `Exit`.
    pub fn get_durations(&self) -> HashMap<String, u128> {
        let mut starts: HashMap<&str, u128> = HashMap::new();
        let mut durations: HashMap<String, u128> = HashMap::new();
        let events = self.lock();

        for event in events.iter() {
            match event.event_type {
                EventType::Entry => {
                    starts.insert(&event.path, event.elapsed_ms);
                }
                EventType::Exit => {
                    if let Some(start) = starts.get(event.path.as_str()) {
                        durations.insert(event.path.clone(), event.elapsed_ms - start);
                    }
                }
                EventType::Skipped => {}
            }
        }

        durations
    }

    /// Generates an ASCII Gantt chart representation.
    ///
    /// Each node that exited is shown as a bar spanning its `Entry` to
    /// `Exit`, relative to the total run time.
    pub fn gantt_chart(&self) -> String {
        let mut output = String::from("\nExecution Timeline:\n\n");

        let total_time = self.start_time.elapsed().as_millis();

        if total_time == 0 {
            return output;
        }

        // Scale to 50 characters width
        let scale = 50.0 / total_time as f64;

        let mut spans: HashMap<String, (u128, Option<u128>)> = HashMap::new();
        for event in self.lock().iter() {
            match event.event_type {
                EventType::Entry => {
                    spans
                        .entry(event.path.clone())
                        .or_insert((event.elapsed_ms, None))
                        .0 = event.elapsed_ms;
                }
                EventType::Exit => {
                    if let Some(span) = spans.get_mut(&event.path) {
                        span.1 = Some(event.elapsed_ms);
                    }
                }
                EventType::Skipped => {}
            }
        }

        let mut sorted: Vec<_> = spans.into_iter().collect();
        sorted.sort_by(|(a_path, (a_start, _)), (b_path, (b_start, _))| {
            a_start.cmp(b_start).then_with(|| a_path.cmp(b_path))
        });

        // Nodes that never exited get no bar
        for (path, (start, end)) in sorted {
            if let Some(end) = end.filter(|end| *end >= start) {
                let start_pos = (start as f64 * scale) as usize;
                let duration = ((end - start) as f64 * scale).max(1.0) as usize;

                let mut bar = " ".repeat(start_pos);
                bar.push_str(&"#".repeat(duration));

                output.push_str(&format!(
                    "{:24} |{}| ({} ms)\n",
                    truncate(&path, 24),
                    bar,
                    end - start
                ));
            }
        }

        output.push_str(&format!("\nTotal: {} ms\n", total_time));
        output
    }

    /// Writes the events as pretty-printed JSON.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| WorkflowError::io(path, e))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &*self.lock())
            .map_err(|e| WorkflowError::io(path, e.into()))?;

        info!("Saved execution timeline to {}", path.display());
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TimelineEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ExecutionTimeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Pads or truncates a string to a fixed width.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        format!("{:width$}", s, width = max_len)
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}
