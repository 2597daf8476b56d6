//! End-of-load report

use std::time::Duration;

/// Counters collected over one reload
///
/// `failed` covers every row that did not end up in the store: rejected
/// rows, rows whose reference upsert failed, and every record of a failed
/// batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Data rows seen, header excluded
    pub rows_seen: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Rows rejected by validation
    pub rejected: usize,
    pub failed_batches: usize,
    pub warnings: usize,
    pub elapsed: Duration,
}

impl LoadSummary {
    /// One-line report, e.g. "3 total rows processed, 2 successful, 1 failed"
    pub fn headline(&self) -> String {
        format!(
            "{} total rows processed, {} successful, {} failed",
            self.rows_seen, self.succeeded, self.failed
        )
    }

    pub fn log(&self) {
        log::info!("import complete: {}", self.headline());
        log::info!(
            "  {} rejected rows, {} failed batches, {} warnings, took {:.2}s",
            self.rejected,
            self.failed_batches,
            self.warnings,
            self.elapsed.as_secs_f64()
        );
    }
}

impl std::fmt::Display for LoadSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "import complete:")?;
        writeln!(f, "  total rows processed: {}", self.rows_seen)?;
        writeln!(f, "  successful inserts: {}", self.succeeded)?;
        write!(f, "  failed inserts: {}", self.failed)
    }
}
