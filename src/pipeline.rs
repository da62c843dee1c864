use chrono::Utc;
use tracing::{info, warn};

use crate::cancel::Cancel;
use crate::config::{ErrorPolicy, PolicySettings, Settings};
use crate::db::{self, RunRow};
use crate::error::{ExtractError, PipelineError, SinkError};
use crate::fetch::PageFetcher;
use crate::observer::PipelineObserver;
use crate::parser::Extractor;
use crate::sink::SinkDispatcher;

/// Outcome of a run that was not aborted.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: String,
    /// Data rows after the header skip.
    pub rows_seen: usize,
    /// Rows that parsed into a record.
    pub records: usize,
    /// Records accepted by at least one sink.
    pub delivered: usize,
    pub row_errors: Vec<ExtractError>,
    pub sink_errors: Vec<SinkError>,
}

impl RunReport {
    fn new(run_id: String) -> Self {
        Self {
            run_id,
            rows_seen: 0,
            records: 0,
            delivered: 0,
            row_errors: Vec::new(),
            sink_errors: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.row_errors.is_empty() && self.sink_errors.is_empty()
    }
}

pub fn new_run_id() -> String {
    format!("run-{}", Utc::now().format("%Y%m%dT%H%M%S%.3f"))
}

/// Fetch the configured page and dispatch every record it holds.
pub async fn run(
    settings: &Settings,
    sinks: &mut SinkDispatcher,
    observer: &dyn PipelineObserver,
    mut cancel: Cancel,
) -> Result<RunReport, PipelineError> {
    let extractor = Extractor::new(&settings.extract, &settings.target.stock_code)?;
    let fetcher = PageFetcher::new(&settings.target, &settings.fetch)?;
    let url = settings.target.url.as_str();

    observer.on_request(url);
    let html = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
        page = fetcher.fetch(url) => page?,
    };
    info!("Fetched {} ({} bytes)", url, html.len());

    process_document(url, &html, &extractor, sinks, observer, &settings.pipeline, &mut cancel)
        .await
}

/// Extract `html` and dispatch the records in row order, applying the row
/// and sink failure policies. `source` names where the page came from.
pub async fn process_document(
    source: &str,
    html: &str,
    extractor: &Extractor,
    sinks: &mut SinkDispatcher,
    observer: &dyn PipelineObserver,
    policy: &PolicySettings,
    cancel: &mut Cancel,
) -> Result<RunReport, PipelineError> {
    let started_at = Utc::now().to_rfc3339();
    let mut report = RunReport::new(new_run_id());
    sinks.set_run_id(&report.run_id);

    let results = extractor.extract_html(html, observer);
    report.rows_seen = results.len();
    if results.is_empty() {
        info!("No dealings found in {}", source);
    }

    for (i, result) in results.into_iter().enumerate() {
        let row = extractor.header_rows() + i;
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                observer.on_row_error(&e);
                if policy.on_row_error == ErrorPolicy::Abort {
                    return Err(e.into());
                }
                report.row_errors.push(e);
                continue;
            }
        };

        let errors = sinks.dispatch(&record, cancel).await;
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        report.records += 1;
        if errors.len() < sinks.len() {
            report.delivered += 1;
            observer.on_record(row, &record);
        }

        for e in &errors {
            observer.on_sink_error(e);
        }
        if policy.on_sink_error == ErrorPolicy::Abort {
            if let Some(first) = errors.into_iter().next() {
                return Err(first.into());
            }
        } else {
            report.sink_errors.extend(errors);
        }
    }

    record_run(sinks, &report, source, extractor.stock_code(), &started_at);
    Ok(report)
}

fn record_run(
    sinks: &SinkDispatcher,
    report: &RunReport,
    source: &str,
    stock_code: &str,
    started_at: &str,
) {
    let Some(conn) = sinks.store() else {
        return;
    };
    let row = RunRow {
        run_id: &report.run_id,
        url: source,
        stock_code,
        rows_seen: report.rows_seen,
        records: report.records,
        delivered: report.delivered,
        row_errors: report.row_errors.len(),
        sink_errors: report.sink_errors.len(),
        started_at,
    };
    if let Err(e) = db::insert_run(conn, &row) {
        warn!("Failed to record run {}: {}", report.run_id, e);
    }
}
