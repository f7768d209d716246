//! Console sink

use std::io::{self, Stdout, Write};

use async_trait::async_trait;

use geoner_core::LocationRecord;

use crate::{FeatureSink, Result, SinkSummary, StoreError};

/// Prints one line per located entity
pub struct ConsoleSink<W: Write + Send = Stdout> {
    out: W,
    written: usize,
}

impl ConsoleSink<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, written: 0 }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// `document<TAB>value (TYPE)<TAB>lat, lon`
pub fn format_line(record: &LocationRecord) -> String {
    format!(
        "{}\t{} ({})\t{}, {}",
        record.document, record.extracted_value, record.entity_type, record.lat, record.lon
    )
}

fn write_error(source: io::Error) -> StoreError {
    StoreError::IoError {
        path: "<stdout>".into(),
        source,
    }
}

#[async_trait]
impl<W: Write + Send> FeatureSink for ConsoleSink<W> {
    async fn insert(&mut self, records: &[LocationRecord]) -> Result<usize> {
        for record in records {
            writeln!(self.out, "{}", format_line(record)).map_err(write_error)?;
        }
        self.written += records.len();
        Ok(records.len())
    }

    async fn finish(&mut self) -> Result<SinkSummary> {
        self.out.flush().map_err(write_error)?;
        Ok(SinkSummary {
            sink: self.name().to_string(),
            records: self.written,
            location: None,
        })
    }

    fn name(&self) -> &str {
        "console"
    }
}
