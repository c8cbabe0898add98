use super::{structs::Command, utils};
use crate::models::{LabelSet, Measurement};
use log::{debug, warn};

/// Turns the fields of one command reply into measurements.
///
/// Only the first `command.field_count()` fields are looked at. A field that is missing
/// or not a number is skipped on its own, the others are still emitted.
pub fn decode(command: Command, device: &str, fields: &[String]) -> Vec<Measurement> {
    let metric = command.metric();

    (0..command.field_count())
        .filter_map(|index| {
            let field = match fields.get(index) {
                Some(field) => field,
                None => {
                    debug!("Reply to {} from device '{}' has no field {}", command.name(), device, index + 1);
                    return None;
                }
            };

            let text = utils::strip_wrapper(field, command.name());
            let value = match parse_value(text) {
                Some(value) => value,
                None => {
                    warn!("Skipping field {} of {} from device '{}': {:?} is not a number",
                          index + 1, command.name(), device, field);
                    return None;
                }
            };

            let labels = match command.channel(index) {
                Some(channel) => LabelSet::with_channel(device, channel),
                None => LabelSet::device(device),
            };

            Some(Measurement { metric, labels, value })
        })
        .collect()
}

pub fn parse_value(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Channel, Metric};

    fn fields(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_three_phase_reply() {
        let result = decode(Command::Volta, "m1", &fields(&["230.1", "230.5", "229.9"]));
        assert_eq!(result.len(), 3);
        assert_eq!(result[0], Measurement {
            metric: Metric::Voltage,
            labels: LabelSet::with_channel("m1", Channel::Phase(1)),
            value: 230.1,
        });
        assert_eq!(result[1].labels.values(), vec!["m1", "phase2"]);
        assert_eq!(result[1].value, 230.5);
        assert_eq!(result[2].labels.values(), vec!["m1", "phase3"]);
        assert_eq!(result[2].value, 229.9);
    }

    #[test]
    fn test_wrapped_fields() {
        let result = decode(Command::Curre, "7", &fields(&["CURRE(1.234)", "CURRE(0.5)", "CURRE(12)"]));
        let values: Vec<f64> = result.iter().map(|m| m.value).collect();
        assert_eq!(values, vec![1.234, 0.5, 12.0]);
        assert!(result.iter().all(|m| m.metric == Metric::Current));
    }

    #[test]
    fn test_tariff_labels() {
        let result = decode(Command::Et0pe, "m1", &fields(&["ET0PE(100.5)", "ET0PE(60.25)", "ET0PE(40.25)", "ET0PE(0)"]));
        assert_eq!(result.len(), 3);
        let labels: Vec<String> = result.iter().map(|m| m.labels.values()[1].clone()).collect();
        assert_eq!(labels, vec!["tarif1", "tarif2", "tarif3"]);
        assert_eq!(result[0].metric, Metric::Tariff);
    }

    #[test]
    fn test_single_field_replies() {
        let power = decode(Command::Powep, "m1", &fields(&["POWEP(1.75)"]));
        assert_eq!(power.len(), 1);
        assert_eq!(power[0].metric, Metric::PowerUsed);
        assert_eq!(power[0].labels, LabelSet::device("m1"));

        let frequency = decode(Command::Frequ, "m1", &fields(&["49.97", "garbage"]));
        assert_eq!(frequency.len(), 1);
        assert_eq!(frequency[0].value, 49.97);
        assert_eq!(frequency[0].labels.channel, None);
    }

    #[test]
    fn test_bad_field_is_isolated() {
        let result = decode(Command::Powpp, "m1", &fields(&["0.4", "n/a", "0.6"]));
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].labels.channel, Some(Channel::Phase(1)));
        assert_eq!(result[0].value, 0.4);
        assert_eq!(result[1].labels.channel, Some(Channel::Phase(3)));
        assert_eq!(result[1].value, 0.6);
    }

    #[test]
    fn test_short_reply_drops_missing_fields() {
        let result = decode(Command::Volta, "m1", &fields(&["230.1"]));
        assert_eq!(result.len(), 1);
        assert!(decode(Command::Frequ, "m1", &[]).is_empty());
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value(" 50.00 "), Some(50.0));
        assert_eq!(parse_value("-0.12"), Some(-0.12));
        assert_eq!(parse_value("NaN"), None);
        assert_eq!(parse_value(""), None);
    }
}
