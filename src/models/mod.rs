use serde::{Deserialize, Serialize};

/// A meter on the serial line, addressed by the string it answers to in the sign-on frame
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Device {
    /// Address sent in `/?<address>!`, empty for a single meter on the line
    pub address: String,
}

impl Device {
    pub fn new(address: &str) -> Self {
        Device { address: address.to_string() }
    }

    /// Name used in log lines, the empty address is hard to spot otherwise
    pub fn display_name(&self) -> &str {
        if self.address.is_empty() {
            "<default>"
        } else {
            &self.address
        }
    }
}

/// The gauges the exporter publishes, one per kind of reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    Voltage,
    Current,
    PhasePower,
    Tariff,
    PowerUsed,
    Frequency,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::Voltage,
        Metric::Current,
        Metric::PhasePower,
        Metric::Tariff,
        Metric::PowerUsed,
        Metric::Frequency,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Voltage => "voltage_volt",
            Metric::Current => "current_ampere",
            Metric::PhasePower => "power_kwt",
            Metric::Tariff => "tarif",
            Metric::PowerUsed => "power_used_kwt",
            Metric::Frequency => "mains_frequency_hz",
        }
    }

    pub fn help(&self) -> &'static str {
        match self {
            Metric::Voltage => "voltage per phase in volts",
            Metric::Current => "current per phase in amperes",
            Metric::PhasePower => "power per phase in kilowatts",
            Metric::Tariff => "tarif total in kilowatts",
            Metric::PowerUsed => "power used total in kilowatts",
            Metric::Frequency => "mains frequency in Hertz",
        }
    }

    /// Label names in the order `LabelSet::values` produces them
    pub fn label_names(&self) -> &'static [&'static str] {
        match self {
            Metric::Voltage | Metric::Current | Metric::PhasePower => &["id", "phase"],
            Metric::Tariff => &["id", "tarif"],
            Metric::PowerUsed | Metric::Frequency => &["id"],
        }
    }
}

/// Second label of the per-phase and per-tariff gauges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Phase(u8),
    Tariff(u8),
}

impl Channel {
    pub fn label_value(&self) -> String {
        match self {
            Channel::Phase(n) => format!("phase{}", n),
            Channel::Tariff(n) => format!("tarif{}", n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LabelSet {
    pub id: String,
    pub channel: Option<Channel>,
}

impl LabelSet {
    pub fn device(id: &str) -> Self {
        LabelSet { id: id.to_string(), channel: None }
    }

    pub fn with_channel(id: &str, channel: Channel) -> Self {
        LabelSet { id: id.to_string(), channel: Some(channel) }
    }

    pub fn values(&self) -> Vec<String> {
        let mut values = vec![self.id.clone()];
        if let Some(channel) = &self.channel {
            values.push(channel.label_value());
        }
        values
    }
}

/// One decoded reading, handed to the gauge sink right away
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub metric: Metric,
    pub labels: LabelSet,
    pub value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_values_match_label_names() {
        let phase = LabelSet::with_channel("m1", Channel::Phase(2));
        assert_eq!(phase.values(), vec!["m1".to_string(), "phase2".to_string()]);
        assert_eq!(phase.values().len(), Metric::Voltage.label_names().len());

        let tariff = LabelSet::with_channel("m1", Channel::Tariff(3));
        assert_eq!(tariff.values()[1], "tarif3");
        assert_eq!(tariff.values().len(), Metric::Tariff.label_names().len());

        let device = LabelSet::device("m1");
        assert_eq!(device.values().len(), Metric::Frequency.label_names().len());
    }

    #[test]
    fn test_device_display_name() {
        assert_eq!(Device::new("").display_name(), "<default>");
        assert_eq!(Device::new("42").display_name(), "42");
    }
}
