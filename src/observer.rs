use tracing::{info, warn};

use crate::error::{ExtractError, SinkError};
use crate::model::{DirectorDealing, Field};

/// Hooks for tracing a run. Extraction and dispatch never print directly.
pub trait PipelineObserver {
    fn on_request(&self, _url: &str) {}
    fn on_record(&self, _row: usize, _record: &DirectorDealing) {}
    fn on_row_error(&self, _error: &ExtractError) {}
    fn on_sink_error(&self, _error: &SinkError) {}
    /// A row had fewer cells than the column map; `fields` were left empty.
    fn on_missing_columns(&self, _row: usize, _fields: &[Field]) {}
}

/// Default observer: everything goes to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_request(&self, url: &str) {
        info!("Visiting {}", url);
    }

    fn on_record(&self, row: usize, record: &DirectorDealing) {
        info!(
            row,
            date = record.date(),
            deal_type = record.deal_type(),
            "Dispatched dealing"
        );
    }

    fn on_row_error(&self, error: &ExtractError) {
        warn!("Skipping {}", error);
    }

    fn on_sink_error(&self, error: &SinkError) {
        warn!("{}", error);
    }

    fn on_missing_columns(&self, row: usize, fields: &[Field]) {
        let names: Vec<&str> = fields.iter().map(|f| f.as_str()).collect();
        warn!(row, "Row is short, left unset: {}", names.join(", "));
    }
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl PipelineObserver for Silent {}
