//! CSV candle loading.
//!
//! Expected header: `timestamp,open,high,low,close,volume`, timestamps in
//! RFC 3339 (`2024-03-01T12:00:00Z`), oldest first.

use anyhow::{bail, Context, Result};
use std::path::Path;
use tracing::{debug, warn};

use rebound_core::domain::{first_out_of_order, Candle};

pub fn load_csv(path: &Path) -> Result<Vec<Candle>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("cannot open {}", path.display()))?;

    let mut candles = Vec::new();
    for (row, record) in reader.deserialize::<Candle>().enumerate() {
        let candle = record.with_context(|| format!("{}: bad row {}", path.display(), row + 1))?;
        if !candle.is_sane() {
            warn!(path = %path.display(), row = row + 1, "candle fails OHLC sanity check");
        }
        candles.push(candle);
    }

    if candles.is_empty() {
        bail!("{} contains no candles", path.display());
    }
    if let Some(i) = first_out_of_order(&candles) {
        bail!(
            "{}: candle {} is not after candle {} (timestamps must strictly increase)",
            path.display(),
            i + 1,
            i
        );
    }
    debug!(path = %path.display(), count = candles.len(), "candles loaded");
    Ok(candles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_temp(name: &str, body: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("rebound-{}-{name}", std::process::id()));
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn loads_rfc3339_rows() {
        let path = write_temp(
            "ok.csv",
            "timestamp,open,high,low,close,volume\n\
             2024-03-01T00:00:00Z,100,101,99,100.5,1200\n\
             2024-03-01T00:15:00Z,100.5,102,100,101.5,900\n",
        );
        let candles = load_csv(&path).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[1].close, 101.5);
        assert_eq!(candles[0].volume, 1200.0);
        fs::remove_file(path).ok();
    }

    #[test]
    fn rejects_unordered_rows() {
        let path = write_temp(
            "unordered.csv",
            "timestamp,open,high,low,close,volume\n\
             2024-03-01T00:15:00Z,100,101,99,100.5,1200\n\
             2024-03-01T00:00:00Z,100.5,102,100,101.5,900\n",
        );
        let err = load_csv(&path).unwrap_err();
        assert!(err.to_string().contains("strictly increase"));
        fs::remove_file(path).ok();
    }

    #[test]
    fn rejects_empty_file() {
        let path = write_temp("empty.csv", "timestamp,open,high,low,close,volume\n");
        assert!(load_csv(&path).is_err());
        fs::remove_file(path).ok();
    }
}
