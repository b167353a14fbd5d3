//! Property tests for the pure pieces: line formatting, the w1_slave
//! parser, and the poll schedule.

use std::time::{Duration, Instant};

use proptest::prelude::*;

use sensornode::config::SensorKind;
use sensornode::drivers::ds18b20::parse_w1_slave;
use sensornode::format;
use sensornode::schedule::PollSchedule;

fn token() -> impl Strategy<Value = String> {
    "[a-z0-9_]{1,24}"
}

proptest! {
    /// Reading lines always carry exactly two decimals and parse back to
    /// within rounding distance of the input value.
    #[test]
    fn reading_line_value_has_two_decimals(
        measurand in token(),
        location in token(),
        node in token(),
        value in -1.0e6f64..1.0e6,
    ) {
        let line = format::reading_line(&measurand, &location, &node, SensorKind::Bme280, value);

        let (_, rendered) = line.rsplit_once("value=").unwrap();
        let (_, decimals) = rendered.rsplit_once('.').unwrap();
        prop_assert_eq!(decimals.len(), 2, "{}", line);

        let parsed: f64 = rendered.parse().unwrap();
        prop_assert!((parsed - value).abs() <= 0.005 + 1e-9, "{}", line);
    }

    /// Both templates keep the tag section identical for the same sensor,
    /// so a down-stream consumer can correlate readings and errors.
    #[test]
    fn error_and_reading_lines_share_the_tag_section(
        location in token(),
        node in token(),
        value in -100.0f64..100.0,
    ) {
        use sensornode::error::ReadError;

        let kind = SensorKind::Si7021;
        let reading = format::reading_line("temperature", &location, &node, kind, value);
        let error = format::error_line(
            &location,
            &node,
            kind,
            &ReadError::SensorValueInvalid("999".into()),
        );

        let reading_tags = reading.split(' ').next().unwrap();
        let error_tags = error.split(' ').next().unwrap();
        prop_assert_eq!(
            reading_tags.split_once(',').unwrap().1,
            error_tags.split_once(',').unwrap().1
        );
    }

    /// The parser rejects or accepts, but never panics, whatever the
    /// kernel file contains.
    #[test]
    fn parse_w1_slave_never_panics(content in ".{0,256}") {
        let _ = parse_w1_slave(&content);
    }

    /// A mangled tail after a valid CRC line yields an error, not a bogus
    /// temperature outside the plausible band.
    #[test]
    fn parsed_temperatures_stay_in_the_plausible_band(tail in ".{0,64}") {
        let content = format!("50 01 4b 46 7f ff 0c 10 1c : crc=1c YES\n{tail}");
        if let Ok(celsius) = parse_w1_slave(&content) {
            prop_assert!((-40.0..=120.0).contains(&celsius), "{}", celsius);
        }
    }

    /// The wait after a tick is the interval minus the tick's own
    /// duration, floored at zero, and deadlines never drift.
    #[test]
    fn wait_compensates_for_tick_duration(
        interval_s in 1u64..=60,
        tick_ms in 0u64..120_000,
    ) {
        let interval = Duration::from_secs(interval_s);
        let start = Instant::now();
        let mut schedule = PollSchedule::new(interval, start);

        let wait = schedule.wait_after_tick(start + Duration::from_millis(tick_ms));
        let expected = interval.saturating_sub(Duration::from_millis(tick_ms));
        prop_assert_eq!(wait, expected);
    }

    /// Over many ticks the deadline advances by exactly one interval per
    /// tick regardless of how late each tick ran.
    #[test]
    fn deadlines_advance_one_interval_per_tick(
        interval_s in 1u64..=60,
        lates in proptest::collection::vec(0u64..5_000, 1..20),
    ) {
        let interval = Duration::from_secs(interval_s);
        let start = Instant::now();
        let mut schedule = PollSchedule::new(interval, start);

        let mut deadline = start;
        for (n, late_ms) in lates.iter().enumerate() {
            let tick_end = deadline + Duration::from_millis(*late_ms);
            let wait = schedule.wait_after_tick(tick_end);
            deadline = start + interval * (n as u32 + 1);
            prop_assert!(tick_end + wait >= deadline);
            prop_assert_eq!(
                wait,
                deadline.saturating_duration_since(tick_end)
            );
        }
    }
}
