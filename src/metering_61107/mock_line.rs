//! Scripted serial line used by the unit tests to emulate a meter.

use super::session::Clock;
use super::transport::{Connector, Transport, TransportError};
use super::structs::CycleReport;
use crate::exporter::{CycleRecorder, GaugeSink};
use crate::models::{LabelSet, Metric};
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What happened on all lines handed out by one connector
#[derive(Default)]
pub struct Journal {
    writes: Mutex<Vec<Vec<u8>>>,
    opens: Mutex<Vec<String>>,
    closes: Mutex<usize>,
}

impl Journal {
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().unwrap().clone()
    }

    pub fn opens(&self) -> Vec<String> {
        self.opens.lock().unwrap().clone()
    }

    pub fn closes(&self) -> usize {
        *self.closes.lock().unwrap()
    }
}

pub struct MockLine {
    journal: Arc<Journal>,
    /// Replies handed out by consecutive reads, an exhausted script reads as a timeout
    replies: VecDeque<Vec<u8>>,
    write_calls: usize,
    read_calls: usize,
    /// Zero based index of the write call that fails
    fail_write: Option<usize>,
    /// Zero based index of the read call that fails
    fail_read: Option<usize>,
}

impl MockLine {
    pub fn reply(mut self, bytes: &[u8]) -> Self {
        self.replies.push_back(bytes.to_vec());
        self
    }

    pub fn fail_write(mut self, call: usize) -> Self {
        self.fail_write = Some(call);
        self
    }

    pub fn fail_read(mut self, call: usize) -> Self {
        self.fail_read = Some(call);
        self
    }
}

impl Transport for MockLine {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        let call = self.write_calls;
        self.write_calls += 1;
        if self.fail_write == Some(call) {
            return Err(TransportError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "simulated write error")));
        }
        self.journal.writes.lock().unwrap().push(bytes.to_vec());
        Ok(bytes.len())
    }

    fn read_up_to(&mut self, max_bytes: usize) -> Result<Vec<u8>, TransportError> {
        let call = self.read_calls;
        self.read_calls += 1;
        if self.fail_read == Some(call) {
            return Err(TransportError::Io(io::Error::new(io::ErrorKind::Other, "simulated read error")));
        }
        let mut reply = self.replies.pop_front().unwrap_or_default();
        reply.truncate(max_bytes);
        Ok(reply)
    }

    fn close(&mut self) {
        *self.journal.closes.lock().unwrap() += 1;
    }
}

/// Hands out the pushed lines (or open failures) in order
pub struct MockConnector {
    journal: Arc<Journal>,
    lines: Mutex<VecDeque<Result<MockLine, String>>>,
}

impl MockConnector {
    pub fn new() -> Self {
        MockConnector {
            journal: Arc::new(Journal::default()),
            lines: Mutex::new(VecDeque::new()),
        }
    }

    /// A fresh line writing into this connector's journal
    pub fn line(&self) -> MockLine {
        MockLine {
            journal: self.journal.clone(),
            replies: VecDeque::new(),
            write_calls: 0,
            read_calls: 0,
            fail_write: None,
            fail_read: None,
        }
    }

    pub fn push(&self, line: MockLine) {
        self.lines.lock().unwrap().push_back(Ok(line));
    }

    pub fn push_open_failure(&self, reason: &str) {
        self.lines.lock().unwrap().push_back(Err(reason.to_string()));
    }

    pub fn journal(&self) -> Arc<Journal> {
        self.journal.clone()
    }
}

impl Connector for MockConnector {
    type Line = MockLine;

    fn open(&self, path: &str, _read_timeout: Duration) -> Result<MockLine, TransportError> {
        self.journal.opens.lock().unwrap().push(path.to_string());
        match self.lines.lock().unwrap().pop_front() {
            Some(Ok(line)) => Ok(line),
            Some(Err(reason)) => Err(TransportError::Open { path: path.to_string(), reason }),
            None => Err(TransportError::Open { path: path.to_string(), reason: "no line scripted".to_string() }),
        }
    }
}

/// Never sleeps, remembers what it was asked to wait
#[derive(Default)]
pub struct RecordingClock {
    pauses: Mutex<Vec<Duration>>,
}

impl RecordingClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses.lock().unwrap().clone()
    }
}

impl Clock for RecordingClock {
    fn sleep(&self, duration: Duration) {
        self.pauses.lock().unwrap().push(duration);
    }
}

#[derive(Default)]
pub struct RecordingSink {
    values: Mutex<Vec<(Metric, LabelSet, f64)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<(Metric, LabelSet, f64)> {
        self.values.lock().unwrap().clone()
    }

    /// Latest value written for the metric and labels
    pub fn value(&self, metric: Metric, labels: &LabelSet) -> Option<f64> {
        self.values.lock().unwrap().iter().rev()
            .find(|(m, l, _)| *m == metric && l == labels)
            .map(|(_, _, v)| *v)
    }
}

impl GaugeSink for RecordingSink {
    fn set_gauge(&self, metric: Metric, labels: &LabelSet, value: f64) {
        self.values.lock().unwrap().push((metric, labels.clone(), value));
    }
}

#[derive(Default)]
pub struct RecordingRecorder {
    reports: Mutex<Vec<CycleReport>>,
}

impl RecordingRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<CycleReport> {
        self.reports.lock().unwrap().clone()
    }
}

impl CycleRecorder for RecordingRecorder {
    fn record_cycle(&self, report: CycleReport) {
        self.reports.lock().unwrap().push(report);
    }
}
