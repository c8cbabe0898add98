use crate::metering_61107::structs::CycleReport;
use crate::models::{LabelSet, Metric};
use lazy_static::lazy_static;
use log::{debug, error};
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Instant;
use thiserror::Error;

/// Where decoded readings go. Upsert semantics, the last write per metric and
/// label set wins.
pub trait GaugeSink {
    fn set_gauge(&self, metric: Metric, labels: &LabelSet, value: f64);
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Prometheus registry error: {0}")]
    Registry(#[from] prometheus::Error),
    #[error("Exposition is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Gauges in a private registry. Clones share the registry, so the poller writes
/// into the same gauges the scrape handler reads.
#[derive(Clone)]
pub struct PrometheusSink {
    registry: Registry,
    gauges: HashMap<Metric, GaugeVec>,
}

impl PrometheusSink {
    pub fn new() -> Result<Self, SinkError> {
        let registry = Registry::new();
        let mut gauges = HashMap::new();

        for metric in Metric::ALL {
            let gauge = GaugeVec::new(Opts::new(metric.name(), metric.help()), metric.label_names())?;
            registry.register(Box::new(gauge.clone()))?;
            gauges.insert(metric, gauge);
        }

        Ok(PrometheusSink { registry, gauges })
    }

    /// Current values in the text exposition format
    pub fn render(&self) -> Result<String, SinkError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    #[cfg(test)]
    pub fn value(&self, metric: Metric, labels: &LabelSet) -> Option<f64> {
        let values = labels.values();
        let values: Vec<&str> = values.iter().map(String::as_str).collect();
        self.gauges.get(&metric)?
            .get_metric_with_label_values(&values)
            .ok()
            .map(|gauge| gauge.get())
    }
}

impl GaugeSink for PrometheusSink {
    fn set_gauge(&self, metric: Metric, labels: &LabelSet, value: f64) {
        let values = labels.values();
        let values: Vec<&str> = values.iter().map(String::as_str).collect();

        let gauge = match self.gauges.get(&metric) {
            Some(gauge) => gauge,
            None => {
                error!("Gauge {} is not registered", metric.name());
                return;
            }
        };

        match gauge.get_metric_with_label_values(&values) {
            Ok(gauge) => {
                debug!("{}{:?} = {}", metric.name(), values, value);
                gauge.set(value);
            }
            Err(e) => error!("Unable to set {}{:?}: {}", metric.name(), values, e),
        }
    }
}

#[derive(Clone)]
pub struct AppStatus {
    pub start_time: Instant,
    pub cycles: u64,
    pub last_cycle: Option<CycleReport>,
}

impl AppStatus {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            cycles: 0,
            last_cycle: None,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Unhealthy once a whole cycle went by without a single device answering
    pub fn is_healthy(&self) -> bool {
        match &self.last_cycle {
            Some(cycle) => cycle.failed_devices.len() < cycle.devices,
            None => true,
        }
    }
}

lazy_static! {
    pub static ref APP_STATUS: RwLock<AppStatus> = RwLock::new(AppStatus::new());
}

pub fn record_cycle(report: CycleReport) {
    match APP_STATUS.write() {
        Ok(mut status) => {
            status.cycles += 1;
            status.last_cycle = Some(report);
        }
        Err(e) => error!("Application status is poisoned: {}", e),
    }
}

/// Receives the report of every finished poll cycle
pub trait CycleRecorder {
    fn record_cycle(&self, report: CycleReport);
}

/// Hands cycle reports to the process wide `APP_STATUS`
pub struct AppStatusRecorder;

impl CycleRecorder for AppStatusRecorder {
    fn record_cycle(&self, report: CycleReport) {
        record_cycle(report);
    }
}

pub fn get_app_status() -> AppStatus {
    match APP_STATUS.read() {
        Ok(status) => status.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}
