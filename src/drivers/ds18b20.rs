//! DS18B20 1-Wire temperature probe.
//!
//! The kernel's w1-therm driver exposes each probe as a directory under
//! `/sys/bus/w1/devices/28-*` containing a `w1_slave` text blob:
//!
//! ```text
//! 2c 01 4b 46 7f ff 04 10 e9 : crc=e9 YES
//! 2c 01 4b 46 7f ff 04 10 e9 t=29750
//! ```
//!
//! Line 1 ends in `YES` when the scratchpad CRC checked out; line 2
//! carries the temperature in milli-degrees as its 10th token.

use std::io;
use std::path::Path;

use super::ReadingOutcome;
use crate::error::ReadError;

/// Plausibility gate: readings outside this band are rejected even when
/// the CRC says the transfer was clean (a flaky pull-up produces valid
/// frames with garbage payloads).
pub const MIN_PLAUSIBLE_C: f64 = -40.0;
pub const MAX_PLAUSIBLE_C: f64 = 120.0;

/// Read one probe. `w1_root` is the devices directory: the real sysfs
/// path in production, a temp directory in tests.
pub fn read(w1_root: &Path, id: &str) -> ReadingOutcome {
    let path = w1_root.join(id).join("w1_slave");
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ReadError::SensorNotFound(format!("DS18B20 {id}")));
        }
        Err(e) => return Err(ReadError::Bus(e.to_string())),
    };
    parse_w1_slave(&content).map(|celsius| vec![celsius])
}

/// Parse the two-line `w1_slave` blob into degrees Celsius.
pub fn parse_w1_slave(content: &str) -> Result<f64, ReadError> {
    let mut lines = content.lines();

    let crc_line = lines.next().unwrap_or("");
    if !crc_line.trim_end().ends_with("YES") {
        return Err(ReadError::SensorValueInvalid("???".into()));
    }

    // 10th space-delimited token, e.g. "t=29750": 2-char prefix, then
    // the signed milli-degree integer.
    let token = lines
        .next()
        .and_then(|line| line.split(' ').nth(9))
        .and_then(|tok| tok.get(2..))
        .ok_or_else(|| ReadError::SensorValueInvalid("truncated w1_slave payload".into()))?;
    let millidegrees: f64 = token
        .parse()
        .map_err(|_| ReadError::SensorValueInvalid(format!("bad temperature token \"{token}\"")))?;

    let celsius = millidegrees / 1000.0;
    if !(MIN_PLAUSIBLE_C..=MAX_PLAUSIBLE_C).contains(&celsius) {
        return Err(ReadError::SensorValueInvalid(format!("{celsius}")));
    }
    Ok(celsius)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn blob(crc_flag: &str, millidegrees: i64) -> String {
        format!(
            "2c 01 4b 46 7f ff 04 10 e9 : crc=e9 {crc_flag}\n\
             2c 01 4b 46 7f ff 04 10 e9 t={millidegrees}\n"
        )
    }

    #[test]
    fn parses_a_good_blob() {
        assert_eq!(parse_w1_slave(&blob("YES", 29750)), Ok(29.75));
    }

    #[test]
    fn parses_negative_temperatures() {
        assert_eq!(parse_w1_slave(&blob("YES", -12250)), Ok(-12.25));
    }

    #[test]
    fn crc_failure_wins_over_any_second_line() {
        // Second line holds a perfectly fine value; the NO flag decides.
        assert_eq!(
            parse_w1_slave(&blob("NO", 21500)),
            Err(ReadError::SensorValueInvalid("???".into()))
        );
    }

    #[test]
    fn range_gate_is_inclusive_at_the_edges() {
        assert_eq!(parse_w1_slave(&blob("YES", 120_000)), Ok(120.0));
        assert_eq!(
            parse_w1_slave(&blob("YES", 120_500)),
            Err(ReadError::SensorValueInvalid("120.5".into()))
        );
        assert_eq!(parse_w1_slave(&blob("YES", -40_000)), Ok(-40.0));
        assert_eq!(
            parse_w1_slave(&blob("YES", -40_500)),
            Err(ReadError::SensorValueInvalid("-40.5".into()))
        );
    }

    #[test]
    fn truncated_blob_is_invalid_not_a_panic() {
        let out = parse_w1_slave("2c 01 4b 46 7f ff 04 10 e9 : crc=e9 YES\n");
        assert_eq!(
            out,
            Err(ReadError::SensorValueInvalid(
                "truncated w1_slave payload".into()
            ))
        );
    }

    #[test]
    fn missing_device_directory_is_sensor_not_found() {
        let root = std::env::temp_dir().join("w1-test-empty");
        std::fs::create_dir_all(&root).unwrap();
        assert_eq!(
            read(&root, "28-0316a2c91d1b"),
            Err(ReadError::SensorNotFound("DS18B20 28-0316a2c91d1b".into()))
        );
    }

    #[test]
    fn reads_from_a_device_directory() {
        let root: PathBuf = std::env::temp_dir().join("w1-test-read");
        let dev = root.join("28-0000075e1a2f");
        std::fs::create_dir_all(&dev).unwrap();
        std::fs::write(dev.join("w1_slave"), blob("YES", 21236)).unwrap();

        assert_eq!(read(&root, "28-0000075e1a2f"), Ok(vec![21.236]));
    }
}
