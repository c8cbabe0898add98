use crate::config::MeterConfig;
use crate::exporter::{CycleRecorder, GaugeSink};
use crate::models::Device;
use log::{error, info};
use std::time::{Duration, Instant};
use thiserror::Error;

pub mod utils;
pub mod structs;
pub mod reply_parser;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod mock_line;

use session::{Clock, FrameTiming};
use structs::CycleReport;
use transport::{Connector, TransportError};

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Frame is missing its {0} marker")]
    MissingMarker(&'static str),
    #[error("Frame ends before its block check character")]
    Truncated,
    #[error("Block check mismatch, calculated {calculated:#04x} but frame carries {provided:#04x}")]
    Checksum { calculated: u8, provided: u8 },
    #[error("Identification reply too short ({length} bytes)")]
    Identification { length: usize },
    #[error("Invalid mode byte {0:#04x} in identification reply")]
    InvalidModeByte(u8),
}

/// Everything that can end a session early. None of these stop the poller.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Unable to open the line for device '{device}': {source}")]
    OpenFailed { device: String, source: TransportError },
    #[error("I/O failed for device '{device}' during {step}: {source}")]
    IoFailed { device: String, step: &'static str, source: TransportError },
    #[error("Device '{device}' sent no usable identification: {source}")]
    Identification { device: String, source: FrameError },
}

/// Polls all configured meters one after the other, forever
pub struct Iec61107Manager<K: Connector, C: Clock, S: GaugeSink, R: CycleRecorder> {
    config: MeterConfig,
    devices: Vec<Device>,
    timing: FrameTiming,
    connector: K,
    clock: C,
    sink: S,
    recorder: R,
}

impl<K: Connector, C: Clock, S: GaugeSink, R: CycleRecorder> Iec61107Manager<K, C, S, R> {
    pub fn new(config: MeterConfig, connector: K, clock: C, sink: S, recorder: R) -> Self {
        let devices = config.counters.iter().map(|address| Device::new(address)).collect();
        let timing = FrameTiming::from(&config);

        Self {
            config,
            devices,
            timing,
            connector,
            clock,
            sink,
            recorder,
        }
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// One session per device, in configuration order. A failing device is logged
    /// and skipped, the others are still read.
    pub fn run_cycle(&self) -> CycleReport {
        let start = Instant::now();
        let mut report = CycleReport {
            devices: self.devices.len(),
            ..Default::default()
        };

        for device in self.devices.iter() {
            match session::run_session(&self.connector, &self.config.port, device, &self.timing, &self.clock, &self.sink) {
                Ok(result) => {
                    report.measurements += result.measurements;
                    report.skipped += result.skipped;
                }
                Err(e) => {
                    error!("{}", e);
                    report.failed_devices.push(device.address.clone());
                }
            }
        }

        let elapsed = start.elapsed();
        report.duration_ms = elapsed.as_millis() as u64;
        report.finished_at = chrono::Utc::now().to_rfc3339();
        info!("Data fetch took {:?}", elapsed);
        report
    }

    /// One scheduler iteration: a full cycle, its report, then the pause
    pub fn poll_once(&self) {
        let report = self.run_cycle();
        self.recorder.record_cycle(report);
        self.clock.sleep(Duration::from_secs(self.config.cycle_pause));
    }

    pub fn start_thread(&self) {
        info!("Data collection started on {} for {} device(s)", self.config.port, self.devices.len());

        loop {
            self.poll_once();
        }
    }
}
