//! StatsD wire-format parsing.
//!
//! One line in, one [`Sample`] out. Grammar:
//!
//! ```text
//! line   := name ':' value '|' type ('|@' rate)?
//! name   := [^:]+           (non-empty, no ':')
//! type   := 'c' | 'g' | 's' | 'ms'
//! value  := signed number for 'c','g'; string for 's'; non-negative number for 'ms'
//! rate   := float in (0,1], optional, default 1.0
//! ```
//!
//! A `g` value beginning with `+` or `-` is a relative [`Sample::GaugeDelta`];
//! any other `g` value is absolute. Lines failing the grammar produce a
//! [`ParseError`] for that line only. Empty and whitespace-only lines are not
//! errors: callers should skip them before calling [`parse_line`].

use crate::error::ParseError;

/// One parsed StatsD metric observation.
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    Counter {
        name: String,
        count: f64,
        sample_rate: f64,
    },
    Gauge {
        name: String,
        value: f64,
    },
    GaugeDelta {
        name: String,
        delta: f64,
    },
    Set {
        name: String,
        member: String,
    },
    Timer {
        name: String,
        milliseconds: f64,
    },
}

impl Sample {
    pub fn name(&self) -> &str {
        match self {
            Sample::Counter { name, .. }
            | Sample::Gauge { name, .. }
            | Sample::GaugeDelta { name, .. }
            | Sample::Set { name, .. }
            | Sample::Timer { name, .. } => name,
        }
    }
}

/// Parse a single StatsD line into a [`Sample`].
///
/// Callers are expected to have already trimmed and skipped empty lines;
/// this function treats an empty or whitespace-only `line` as malformed.
pub fn parse_line(line: &str) -> Result<Sample, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ParseError::Malformed(line.to_string()));
    }

    let colon = line
        .find(':')
        .ok_or_else(|| ParseError::Malformed(line.to_string()))?;
    let name = &line[..colon];
    if name.is_empty() {
        return Err(ParseError::EmptyName(line.to_string()));
    }
    let rest = &line[colon + 1..];

    let mut parts = rest.split('|');
    let value_str = parts
        .next()
        .ok_or_else(|| ParseError::Malformed(line.to_string()))?;
    let type_tag = parts
        .next()
        .ok_or_else(|| ParseError::MissingType(line.to_string()))?;
    let rate_part = parts.next();
    if parts.next().is_some() {
        return Err(ParseError::Malformed(line.to_string()));
    }

    let sample_rate = match rate_part {
        None => 1.0,
        Some(raw) => {
            let raw = raw
                .strip_prefix('@')
                .ok_or_else(|| ParseError::Malformed(line.to_string()))?;
            let rate: f64 = raw.parse().map_err(|_| ParseError::InvalidSampleRate {
                line: line.to_string(),
                rate: raw.to_string(),
            })?;
            if !(rate > 0.0 && rate <= 1.0) {
                return Err(ParseError::InvalidSampleRate {
                    line: line.to_string(),
                    rate: raw.to_string(),
                });
            }
            rate
        }
    };

    let name = name.to_string();
    match type_tag {
        "c" => {
            let count: f64 = value_str.parse().map_err(|_| ParseError::InvalidValue {
                line: line.to_string(),
                name: name.clone(),
                value: value_str.to_string(),
            })?;
            Ok(Sample::Counter {
                name,
                count,
                sample_rate,
            })
        }
        "g" => {
            let value: f64 = value_str.parse().map_err(|_| ParseError::InvalidValue {
                line: line.to_string(),
                name: name.clone(),
                value: value_str.to_string(),
            })?;
            if value_str.starts_with('+') || value_str.starts_with('-') {
                Ok(Sample::GaugeDelta { name, delta: value })
            } else {
                Ok(Sample::Gauge { name, value })
            }
        }
        "s" => Ok(Sample::Set {
            name,
            member: value_str.to_string(),
        }),
        "ms" => {
            let milliseconds: f64 =
                value_str.parse().map_err(|_| ParseError::InvalidValue {
                    line: line.to_string(),
                    name: name.clone(),
                    value: value_str.to_string(),
                })?;
            if milliseconds < 0.0 {
                return Err(ParseError::InvalidValue {
                    line: line.to_string(),
                    name,
                    value: value_str.to_string(),
                });
            }
            Ok(Sample::Timer {
                name,
                milliseconds,
            })
        }
        other => Err(ParseError::UnknownType {
            line: line.to_string(),
            type_tag: other.to_string(),
        }),
    }
}

/// Serialize a sample back to its StatsD wire form. Used by property tests
/// to check `parse(serialize(x)) == x`.
pub fn serialize(sample: &Sample) -> String {
    match sample {
        Sample::Counter {
            name,
            count,
            sample_rate,
        } => {
            if (*sample_rate - 1.0).abs() < f64::EPSILON {
                format!("{name}:{count}|c")
            } else {
                format!("{name}:{count}|c|@{sample_rate}")
            }
        }
        Sample::Gauge { name, value } => format!("{name}:{value}|g"),
        Sample::GaugeDelta { name, delta } => {
            if *delta >= 0.0 {
                format!("{name}:+{delta}|g")
            } else {
                format!("{name}:{delta}|g")
            }
        }
        Sample::Set { name, member } => format!("{name}:{member}|s"),
        Sample::Timer {
            name,
            milliseconds,
        } => format!("{name}:{milliseconds}|ms"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_counter() {
        assert_eq!(
            parse_line("event:1|c").unwrap(),
            Sample::Counter {
                name: "event".into(),
                count: 1.0,
                sample_rate: 1.0
            }
        );
    }

    #[test]
    fn parses_counter_with_sample_rate() {
        assert_eq!(
            parse_line("event:1|c|@0.1").unwrap(),
            Sample::Counter {
                name: "event".into(),
                count: 1.0,
                sample_rate: 0.1
            }
        );
    }

    #[test]
    fn parses_absolute_gauge() {
        assert_eq!(
            parse_line("temp:20|g").unwrap(),
            Sample::Gauge {
                name: "temp".into(),
                value: 20.0
            }
        );
    }

    #[test]
    fn parses_gauge_delta_positive() {
        assert_eq!(
            parse_line("temp:+5|g").unwrap(),
            Sample::GaugeDelta {
                name: "temp".into(),
                delta: 5.0
            }
        );
    }

    #[test]
    fn parses_gauge_delta_negative() {
        assert_eq!(
            parse_line("temp:-4|g").unwrap(),
            Sample::GaugeDelta {
                name: "temp".into(),
                delta: -4.0
            }
        );
    }

    #[test]
    fn parses_set() {
        assert_eq!(
            parse_line("users:alice|s").unwrap(),
            Sample::Set {
                name: "users".into(),
                member: "alice".into()
            }
        );
    }

    #[test]
    fn parses_timer() {
        assert_eq!(
            parse_line("process:101|ms").unwrap(),
            Sample::Timer {
                name: "process".into(),
                milliseconds: 101.0
            }
        );
    }

    #[test]
    fn rejects_empty_name() {
        assert!(matches!(
            parse_line(":1|c"),
            Err(ParseError::EmptyName(_))
        ));
    }

    #[test]
    fn rejects_missing_type() {
        assert!(matches!(parse_line("event:1"), Err(ParseError::MissingType(_))));
    }

    #[test]
    fn rejects_missing_colon() {
        assert!(parse_line("event1c").is_err());
    }

    #[test]
    fn rejects_zero_sample_rate() {
        assert!(matches!(
            parse_line("event:1|c|@0"),
            Err(ParseError::InvalidSampleRate { .. })
        ));
    }

    #[test]
    fn rejects_negative_timer() {
        assert!(parse_line("process:-1|ms").is_err());
    }

    #[test]
    fn rejects_unknown_type() {
        assert!(matches!(
            parse_line("event:1|z"),
            Err(ParseError::UnknownType { .. })
        ));
    }

    #[test]
    fn rejects_empty_line() {
        assert!(parse_line("").is_err());
        assert!(parse_line("   ").is_err());
    }

    #[test]
    fn round_trips_counter() {
        let sample = Sample::Counter {
            name: "event".into(),
            count: 3.0,
            sample_rate: 1.0,
        };
        assert_eq!(parse_line(&serialize(&sample)).unwrap(), sample);
    }

    #[test]
    fn round_trips_gauge_delta() {
        let sample = Sample::GaugeDelta {
            name: "temp".into(),
            delta: -4.0,
        };
        assert_eq!(parse_line(&serialize(&sample)).unwrap(), sample);
    }

    #[test]
    fn round_trips_timer() {
        let sample = Sample::Timer {
            name: "process".into(),
            milliseconds: 101.5,
        };
        assert_eq!(parse_line(&serialize(&sample)).unwrap(), sample);
    }

    proptest! {
        /// Parse(Serialize(x)) == x for every metric kind (spec §8 round-trip law).
        #[test]
        fn parse_serialize_round_trips_counter(
            name in "[a-zA-Z][a-zA-Z0-9_.]{0,15}",
            count in 1i64..1_000_000,
        ) {
            let sample = Sample::Counter { name, count: count as f64, sample_rate: 1.0 };
            prop_assert_eq!(parse_line(&serialize(&sample)).unwrap(), sample);
        }

        #[test]
        fn parse_serialize_round_trips_gauge(
            name in "[a-zA-Z][a-zA-Z0-9_.]{0,15}",
            value in 0i64..1_000_000,
        ) {
            let sample = Sample::Gauge { name, value: value as f64 };
            prop_assert_eq!(parse_line(&serialize(&sample)).unwrap(), sample);
        }

        #[test]
        fn parse_serialize_round_trips_gauge_delta(
            name in "[a-zA-Z][a-zA-Z0-9_.]{0,15}",
            delta in -1_000_000i64..1_000_000,
        ) {
            let sample = Sample::GaugeDelta { name, delta: delta as f64 };
            prop_assert_eq!(parse_line(&serialize(&sample)).unwrap(), sample);
        }

        #[test]
        fn parse_serialize_round_trips_set(
            name in "[a-zA-Z][a-zA-Z0-9_.]{0,15}",
            member in "[a-zA-Z0-9_-]{1,12}",
        ) {
            let sample = Sample::Set { name, member };
            prop_assert_eq!(parse_line(&serialize(&sample)).unwrap(), sample);
        }

        #[test]
        fn parse_serialize_round_trips_timer(
            name in "[a-zA-Z][a-zA-Z0-9_.]{0,15}",
            milliseconds in 0i64..1_000_000,
        ) {
            let sample = Sample::Timer { name, milliseconds: milliseconds as f64 };
            prop_assert_eq!(parse_line(&serialize(&sample)).unwrap(), sample);
        }

        /// A zero or out-of-(0,1] sample rate is always rejected; every valid
        /// rate round-trips (spec §8 boundary: "sample rate 0 -> ParseError").
        #[test]
        fn zero_sample_rate_always_rejected(name in "[a-zA-Z][a-zA-Z0-9_]{0,10}") {
            prop_assert!(matches!(
                parse_line(&format!("{name}:1|c|@0")),
                Err(ParseError::InvalidSampleRate { .. })
            ));
        }
    }
}
