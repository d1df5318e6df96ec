use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{error, info, warn};
use took::Timer;

use crate::error::IngestError;
use crate::pipeline::{FileOutcome, FileReport};
use crate::utils::logging::{format_log_batch, format_log_file};

#[derive(Debug)]
pub struct FailedFile {
    pub source: PathBuf,
    pub error: IngestError,
}

/// Summary of a batch. Every attempted file ends up either in `reports` or in
/// `failures`.
#[derive(Debug)]
pub struct BatchReport {
    pub attempted: usize,
    pub reports: Vec<(PathBuf, FileReport)>,
    pub failures: Vec<FailedFile>,
    pub skipped_lines: usize,
    pub took: Duration,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.reports.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Applies `ingest` to every path. A failing file is logged and recorded, the
/// remaining files are processed regardless. Results keep the order of `paths`.
pub fn run_batch<F>(paths: &[PathBuf], ingest: F) -> BatchReport
where
    F: Fn(&Path) -> FileOutcome + Send + Sync,
{
    let timer = Timer::new();

    #[cfg(feature = "parallel")]
    let outcomes: Vec<FileOutcome> = {
        use rayon::prelude::*;
        paths.par_iter().map(|path| ingest(path)).collect()
    };
    #[cfg(not(feature = "parallel"))]
    let outcomes: Vec<FileOutcome> = paths.iter().map(|path| ingest(path)).collect();

    let mut report = BatchReport {
        attempted: paths.len(),
        reports: Vec::with_capacity(outcomes.len()),
        failures: vec![],
        skipped_lines: 0,
        took: timer.took().into_std(),
    };
    for outcome in outcomes {
        report.skipped_lines += outcome.skipped_lines;
        if outcome.skipped_lines > 0 {
            warn!(
                "{}: skipped {} malformed lines",
                outcome.source.display(),
                outcome.skipped_lines
            );
        }
        match outcome.result {
            Ok(file_report) => {
                info!("{}", format_log_file(&outcome.source, &file_report, &outcome.took));
                report.reports.push((outcome.source, file_report));
            }
            Err(e) => {
                error!("{}: {} ({})", outcome.source.display(), e, e.kind());
                report.failures.push(FailedFile {
                    source: outcome.source,
                    error: e,
                });
            }
        }
    }
    report.took = timer.took().into_std();
    info!("{}", format_log_batch(&report));
    report
}

/// Expands glob patterns into a sorted, duplicate free list of files.
pub fn expand_sources(patterns: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths = vec![];
    for pattern in patterns {
        let before = paths.len();
        for entry in glob::glob(pattern)? {
            let path = entry?;
            if path.is_file() {
                paths.push(path);
            }
        }
        if paths.len() == before {
            warn!("no files match {}", pattern);
        }
    }
    paths.sort();
    paths.dedup();
    Ok(paths)
}
