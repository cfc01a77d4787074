//! Frequency list files for wideband/narrowband list sweeps.
//!
//! A list file holds one frequency per line:
//!
//! ```text
//! # 10 MHz steps around 1 GHz
//! 990
//! 1000 MHz
//! 1.01GHz, -5.0
//! ```
//!
//! Bare numbers are megahertz. Blank lines and `#` comments are ignored. A
//! second comma-separated column (per-point power on some instruments) is
//! accepted and ignored.

use std::path::Path;

use synthlib_core::error::{Error, Result};
use synthlib_core::synth::Synthesizer;
use synthlib_core::types::ListBand;
use synthlib_core::units::{self, FrequencyUnit};

/// An ordered, non-empty list of frequencies in hertz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyList {
    points: Vec<u64>,
}

impl FrequencyList {
    /// Wrap already-parsed points.
    pub fn new(points: Vec<u64>) -> Result<Self> {
        if points.is_empty() {
            return Err(Error::InvalidParameter("frequency list is empty".into()));
        }
        Ok(FrequencyList { points })
    }

    /// Parse list file contents.
    pub fn parse(text: &str) -> Result<Self> {
        let mut points = Vec::new();
        for (index, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let field = line.split([',', ';', '\t']).next().unwrap_or("").trim();
            let freq_hz = units::parse_frequency(field, FrequencyUnit::MHz).map_err(|e| {
                let detail = match e {
                    Error::InvalidParameter(msg) => msg,
                    other => other.to_string(),
                };
                Error::InvalidParameter(format!("line {}: {detail}", index + 1))
            })?;
            points.push(freq_hz);
        }
        Self::new(points)
    }

    /// Read and parse a list file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let list = Self::parse(&text)?;
        tracing::debug!(path = %path.display(), points = list.len(), "frequency list read");
        Ok(list)
    }

    pub fn points(&self) -> &[u64] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Upload the list into `band` on the instrument (clear, then one add
    /// per point).
    pub async fn upload(&self, synth: &dyn Synthesizer, band: ListBand) -> Result<()> {
        synth.load_list(band, &self.points).await
    }
}

/// Read `path` and upload it into `band`. Returns the number of points.
pub async fn import_list(
    synth: &dyn Synthesizer,
    band: ListBand,
    path: impl AsRef<Path>,
) -> Result<usize> {
    let list = FrequencyList::from_file(path)?;
    list.upload(synth, band).await?;
    Ok(list.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    use crate::builder::HolzworthBuilder;
    use crate::models::hs1001a;
    use synthlib_test_harness::MockTransport;

    #[test]
    fn parses_units_comments_and_columns() {
        let list = FrequencyList::parse(
            "# header\n\n990\n1000 MHz\r\n1.01GHz, -5.0\n  250 kHz # inline\n",
        )
        .unwrap();
        assert_eq!(
            list.points(),
            &[990_000_000, 1_000_000_000, 1_010_000_000, 250_000]
        );
        assert_eq!(list.len(), 4);
    }

    #[test]
    fn reports_line_number() {
        let err = FrequencyList::parse("1000\n# ok\nbanana\n").unwrap_err();
        match err {
            Error::InvalidParameter(msg) => assert!(msg.starts_with("line 3:"), "{msg}"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn empty_list_is_rejected() {
        assert!(matches!(
            FrequencyList::parse("# nothing here\n\n"),
            Err(Error::InvalidParameter(_))
        ));
        assert!(FrequencyList::new(Vec::new()).is_err());
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = FrequencyList::from_file("/nonexistent/synthlib/list.txt");
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn import_uploads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# wide list").unwrap();
        writeln!(file, "100").unwrap();
        writeln!(file, "200").unwrap();

        let mut mock = MockTransport::new();
        mock.expect_line(":LIST:WIDE:CLEAR", "ok");
        mock.expect_line(":LIST:WIDE:ADD:100000000Hz", "ok");
        mock.expect_line(":LIST:WIDE:ADD:200000000Hz", "ok");
        let synth = HolzworthBuilder::new(hs1001a())
            .query_identity(false)
            .command_timeout(Duration::from_millis(200))
            .build_with_transport(Box::new(mock))
            .await
            .unwrap();

        let count = import_list(&synth, ListBand::Wide, file.path()).await.unwrap();
        assert_eq!(count, 2);
    }
}
