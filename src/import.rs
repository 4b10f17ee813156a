// 📥 CSV Import - bulk load equipment definitions
//
// Expected header: type,manufacturer,installation_date
// installation_date is a Unix timestamp or an ISO date (YYYY-MM-DD, midnight UTC).

use crate::equipment::NewEquipment;
use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "type")]
    equipment_type: String,
    manufacturer: String,
    installation_date: String,
}

pub fn load_csv(csv_path: &Path) -> Result<Vec<NewEquipment>> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("Failed to open CSV file {}", csv_path.display()))?;
    parse_csv(file)
}

pub fn parse_csv<R: Read>(reader: R) -> Result<Vec<NewEquipment>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let mut rows = Vec::new();

    for (index, result) in rdr.deserialize().enumerate() {
        // Header is line 1
        let line = index + 2;
        let row: CsvRow =
            result.with_context(|| format!("Failed to deserialize equipment on line {}", line))?;

        let installation_date = parse_installation_date(&row.installation_date)
            .with_context(|| format!("Bad installation_date on line {}", line))?;

        rows.push(NewEquipment {
            equipment_type: row.equipment_type,
            manufacturer: row.manufacturer,
            installation_date,
        });
    }

    debug!(rows = rows.len(), "csv parsed");
    Ok(rows)
}

/// Parse a Unix timestamp or a `YYYY-MM-DD` date into seconds since the epoch
pub fn parse_installation_date(value: &str) -> Result<u64> {
    let value = value.trim();

    if value.is_empty() {
        bail!("empty installation date");
    }

    if let Ok(secs) = value.parse::<u64>() {
        return Ok(secs);
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| anyhow!("'{}' is neither a Unix timestamp nor YYYY-MM-DD: {}", value, e))?;

    let secs = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow!("invalid time for {}", value))?
        .and_utc()
        .timestamp();

    u64::try_from(secs).map_err(|_| anyhow!("'{}' is before 1970-01-01", value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv() {
        let data = "\
type,manufacturer,installation_date
Pump,Acme Inc,1625097600
Valve, Best Valves ,2021-07-02
";
        let rows = parse_csv(data.as_bytes()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], NewEquipment::new("Pump", "Acme Inc", 1625097600));
        assert_eq!(rows[1], NewEquipment::new("Valve", "Best Valves", 1625184000));
    }

    #[test]
    fn test_parse_csv_reports_bad_line() {
        let data = "\
type,manufacturer,installation_date
Pump,Acme Inc,1625097600
Valve,Best Valves,yesterday
";
        let err = parse_csv(data.as_bytes()).unwrap_err();
        assert!(format!("{:#}", err).contains("line 3"));
    }

    #[test]
    fn test_parse_installation_date() {
        assert_eq!(parse_installation_date("0").unwrap(), 0);
        assert_eq!(parse_installation_date("1625097600").unwrap(), 1625097600);
        assert_eq!(parse_installation_date("2021-07-01").unwrap(), 1625097600);
        assert_eq!(parse_installation_date("1970-01-01").unwrap(), 0);

        assert!(parse_installation_date("").is_err());
        assert!(parse_installation_date("-5").is_err());
        assert!(parse_installation_date("1969-12-31").is_err());
        assert!(parse_installation_date("2021-13-01").is_err());
    }
}
