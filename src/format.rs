//! Wire payload formatter.
//!
//! Two single-line formats, loosely modelled on a line-oriented
//! time-series point format. They are the contract consumed by the
//! downstream log scraper: field order, comma/space placement, quoting
//! and the two-decimal value rounding are all fixed.

use crate::config::SensorKind;
use crate::error::ReadError;

/// `<measurand>,location=<location>,node=<node>,sensor=<kind> value=<v>`
/// with the corrected value rendered to exactly two decimal places.
pub fn reading_line(
    measurand: &str,
    location: &str,
    node: &str,
    kind: SensorKind,
    corrected: f64,
) -> String {
    format!("{measurand},location={location},node={node},sensor={kind} value={corrected:.2}")
}

/// `error,location=<location>,node=<node>,sensor=<kind> type="<k>",value="<d>"`
pub fn error_line(location: &str, node: &str, kind: SensorKind, error: &ReadError) -> String {
    format!(
        "error,location={location},node={node},sensor={kind} type=\"{}\",value=\"{}\"",
        error.kind_name(),
        error.detail()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reading_line_matches_template() {
        // Raw 21.236 with correction -1.2 applied upstream.
        let line = reading_line("temperature", "i2c_1", "gw1", SensorKind::Htu21, 20.036);
        assert_eq!(line, "temperature,location=i2c_1,node=gw1,sensor=HTU21 value=20.04");
    }

    #[test]
    fn reading_line_pads_to_two_decimals() {
        let line = reading_line("humidity", "cellar", "gw1", SensorKind::Si7021, 45.0);
        assert_eq!(line, "humidity,location=cellar,node=gw1,sensor=SI7021 value=45.00");
    }

    #[test]
    fn negative_values_keep_the_template() {
        let line = reading_line("temperature", "attic", "gw2", SensorKind::Ds18b20, -7.128);
        assert_eq!(
            line,
            "temperature,location=attic,node=gw2,sensor=DS18B20 value=-7.13"
        );
    }

    #[test]
    fn error_line_matches_template() {
        let err = ReadError::SensorValueInvalid("???".into());
        let line = error_line("attic", "gw1", SensorKind::Ds18b20, &err);
        assert_eq!(
            line,
            "error,location=attic,node=gw1,sensor=DS18B20 type=\"SensorValueInvalid\",value=\"???\""
        );
    }

    #[test]
    fn bus_error_carries_the_underlying_message() {
        let err = ReadError::Bus("no acknowledge from 0x40".into());
        let line = error_line("i2c_1_ch3", "gw1", SensorKind::Si7021, &err);
        assert_eq!(
            line,
            "error,location=i2c_1_ch3,node=gw1,sensor=SI7021 \
             type=\"BusError\",value=\"no acknowledge from 0x40\""
        );
    }
}
