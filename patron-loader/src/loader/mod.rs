//! Full reload of the patron collections from spreadsheet rows
//!
//! A reload walks through a fixed sequence of phases:
//!
//! 1. `SchemaReset` - drop all four collections and create them empty
//! 2. `IndexesReady` - unique code indexes (fatal) and lookup indexes (best effort)
//! 3. `Loading` - validate rows, upsert references, insert records in batches
//! 4. `Committed` on success, `Failed` as soon as a fatal step errors out
//!
//! Per-row and per-batch errors are counted in the [`LoadSummary`] and never
//! stop the load.

mod summary;

pub use summary::LoadSummary;

use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use std::time::Instant;

use crate::model::{Collection, PATRON_LOOKUP_FIELDS, PatronRecord};
use crate::normalize::validate_row;
use crate::store::Store;

/// Records per bulk insert
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Rows between progress log lines
const PROGRESS_INTERVAL: usize = 10_000;

/// Failed rows whose cells are dumped at debug level
const MAX_LOGGED_FAILURES: usize = 5;

/// Where a reload currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Idle,
    SchemaReset,
    IndexesReady,
    Loading,
    Committed,
    Failed,
}

impl std::fmt::Display for LoadPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LoadPhase::Idle => "idle",
            LoadPhase::SchemaReset => "schema reset",
            LoadPhase::IndexesReady => "indexes ready",
            LoadPhase::Loading => "loading",
            LoadPhase::Committed => "committed",
            LoadPhase::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Options for a reload
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Maximum records per bulk insert
    pub batch_size: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Drives one reload against a store
pub struct Loader<'a, S: Store + ?Sized> {
    store: &'a S,
    options: LoadOptions,
    phase: LoadPhase,
    /// Reference codes already upserted during this run, per collection
    seen: HashMap<Collection, HashSet<String>>,
    pending: Vec<PatronRecord>,
    summary: LoadSummary,
    logged_failures: usize,
}

impl<'a, S: Store + ?Sized> Loader<'a, S> {
    pub fn new(store: &'a S, options: LoadOptions) -> Self {
        let batch_size = options.batch_size.max(1);
        Self {
            store,
            options: LoadOptions { batch_size },
            phase: LoadPhase::Idle,
            seen: HashMap::new(),
            pending: Vec::with_capacity(batch_size),
            summary: LoadSummary::default(),
            logged_failures: 0,
        }
    }

    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    /// Replace the store contents with the given rows
    ///
    /// The first row is the header and is skipped. Returns the summary once
    /// every row has been processed; returns an error (and leaves the loader
    /// in [`LoadPhase::Failed`]) if the schema could not be reset.
    pub async fn run(&mut self, rows: &[Vec<String>]) -> Result<LoadSummary> {
        let started = Instant::now();
        self.reset();

        match self.run_phases(rows).await {
            Ok(()) => {
                self.summary.elapsed = started.elapsed();
                self.transition(LoadPhase::Committed);
                Ok(self.summary.clone())
            }
            Err(e) => {
                self.transition(LoadPhase::Failed);
                Err(e)
            }
        }
    }

    fn reset(&mut self) {
        self.phase = LoadPhase::Idle;
        self.seen.clear();
        self.pending.clear();
        self.summary = LoadSummary::default();
        self.logged_failures = 0;
    }

    fn transition(&mut self, next: LoadPhase) {
        log::debug!("Load phase: {} -> {}", self.phase, next);
        self.phase = next;
    }

    async fn run_phases(&mut self, rows: &[Vec<String>]) -> Result<()> {
        self.reset_schema().await?;
        self.transition(LoadPhase::SchemaReset);

        self.create_indexes().await?;
        self.transition(LoadPhase::IndexesReady);

        self.transition(LoadPhase::Loading);
        self.load_rows(rows).await;
        Ok(())
    }

    async fn reset_schema(&mut self) -> Result<()> {
        for collection in Collection::drop_order() {
            match self.store.drop_collection(collection).await {
                Ok(()) => log::info!("Dropped collection {}", collection),
                Err(e) if e.is_not_found() => {
                    log::debug!("Collection {} did not exist, nothing to drop", collection)
                }
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to drop collection {}", collection));
                }
            }
        }

        for collection in Collection::ALL {
            self.store
                .create_collection(collection)
                .await
                .with_context(|| format!("Failed to create collection {}", collection))?;
        }
        Ok(())
    }

    async fn create_indexes(&mut self) -> Result<()> {
        for collection in Collection::REFERENCES {
            self.store
                .create_unique_index(collection, "code")
                .await
                .with_context(|| format!("Failed to create unique index on {}.code", collection))?;
        }

        for field in PATRON_LOOKUP_FIELDS {
            if let Err(e) = self.store.create_index(Collection::Patrons, field).await {
                log::warn!("Failed to create index on patrons.{}: {}", field, e);
            }
        }
        Ok(())
    }

    async fn load_rows(&mut self, rows: &[Vec<String>]) {
        // Row numbers are 1-based sheet rows, the header being row 1
        for (index, row) in rows.iter().enumerate().skip(1) {
            let row_number = index + 1;
            self.summary.rows_seen += 1;
            self.process_row(row_number, row).await;

            if self.summary.rows_seen % PROGRESS_INTERVAL == 0 {
                log::info!(
                    "processed {} rows ({} successful, {} errors)",
                    self.summary.rows_seen,
                    self.summary.succeeded + self.pending.len(),
                    self.summary.failed
                );
            }
        }

        self.flush().await;
    }

    async fn process_row(&mut self, row_number: usize, row: &[String]) {
        let validated = match validate_row(row) {
            Ok(validated) => validated,
            Err(reason) => {
                log::warn!("skipping row {}: {}", row_number, reason);
                self.summary.rejected += 1;
                self.record_failure(row_number, row);
                return;
            }
        };

        for warning in &validated.warnings {
            log::warn!("Row {}: {}", row_number, warning);
            self.summary.warnings += 1;
        }

        for reference in validated.references() {
            let collection = reference.collection();
            if self
                .seen
                .get(&collection)
                .is_some_and(|codes| codes.contains(reference.code()))
            {
                continue;
            }

            match self.store.upsert_reference(&reference).await {
                Ok(created) => {
                    if created {
                        log::debug!(
                            "Added {} {} ({})",
                            collection,
                            reference.code(),
                            reference.label()
                        );
                    }
                    self.seen
                        .entry(collection)
                        .or_default()
                        .insert(reference.code().to_string());
                }
                Err(e) => {
                    log::warn!(
                        "Row {}: failed to upsert {} {}: {}",
                        row_number,
                        collection,
                        reference.code(),
                        e
                    );
                    self.record_failure(row_number, row);
                    return;
                }
            }
        }

        self.pending.push(validated.patron);
        if self.pending.len() >= self.options.batch_size {
            self.flush().await;
        }
    }

    fn record_failure(&mut self, row_number: usize, row: &[String]) {
        self.summary.failed += 1;
        if self.logged_failures < MAX_LOGGED_FAILURES {
            self.logged_failures += 1;
            log::debug!("Failed row {} data: {:?}", row_number, row);
        }
    }

    async fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }

        let batch = std::mem::take(&mut self.pending);
        match self.store.insert_patrons(&batch).await {
            Ok(inserted) => {
                log::debug!("Inserted batch of {} records", inserted);
                self.summary.succeeded += batch.len();
            }
            Err(e) => {
                log::warn!("Failed to insert batch of {} records: {}", batch.len(), e);
                if let Some(first) = batch.first() {
                    log::debug!("First record of failed batch: {}", first.to_log_json());
                }
                self.summary.failed += batch.len();
                self.summary.failed_batches += 1;
            }
        }
        self.pending = Vec::with_capacity(self.options.batch_size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Reference;
    use crate::store::{Document, Filter, QueryValue, SqliteStore, StoreError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const HEADER: [&str; 14] = [
        "Patron Type Code",
        "Patron Type Definition",
        "Total Checkouts",
        "Total Renewals",
        "Age Range",
        "Home Library Code",
        "Home Library Definition",
        "Circulation Active Month",
        "Circulation Active Year",
        "Notice Preference Code",
        "Notice Preference Definition",
        "Provided Email Address",
        "Within San Francisco County",
        "Year Patron Registered",
    ];

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn data_row(
        type_code: &str,
        type_desc: &str,
        library: &str,
        library_name: &str,
    ) -> Vec<String> {
        cells(&[
            type_code,
            type_desc,
            "42",
            "7",
            "25 to 34 years",
            library,
            library_name,
            "March",
            "2023",
            "z",
            "email",
            "TRUE",
            "true",
            "2015",
        ])
    }

    fn sheet(data: Vec<Vec<String>>) -> Vec<Vec<String>> {
        let mut rows = vec![cells(&HEADER)];
        rows.extend(data);
        rows
    }

    async fn all(store: &SqliteStore, collection: Collection) -> Vec<Document> {
        store
            .find(collection, &Filter::match_all(), 10_000)
            .await
            .unwrap()
    }

    async fn count(store: &SqliteStore, collection: Collection) -> u64 {
        store.count(collection, &Filter::match_all()).await.unwrap()
    }

    /// Delegates to SQLite, failing the operations it is told to
    struct FaultyStore {
        inner: SqliteStore,
        fail_insert_call: Option<usize>,
        fail_drop: bool,
        fail_lookup_indexes: bool,
        fail_reference_code: Option<&'static str>,
        insert_calls: AtomicUsize,
    }

    impl FaultyStore {
        async fn new() -> Self {
            Self {
                inner: SqliteStore::in_memory().await.unwrap(),
                fail_insert_call: None,
                fail_drop: false,
                fail_lookup_indexes: false,
                fail_reference_code: None,
                insert_calls: AtomicUsize::new(0),
            }
        }
    }

    fn injected() -> StoreError {
        StoreError::backend(std::io::Error::other("injected failure"))
    }

    #[async_trait]
    impl Store for FaultyStore {
        async fn drop_collection(&self, collection: Collection) -> Result<(), StoreError> {
            if self.fail_drop {
                return Err(injected());
            }
            self.inner.drop_collection(collection).await
        }

        async fn create_collection(&self, collection: Collection) -> Result<(), StoreError> {
            self.inner.create_collection(collection).await
        }

        async fn create_unique_index(
            &self,
            collection: Collection,
            field: &str,
        ) -> Result<(), StoreError> {
            self.inner.create_unique_index(collection, field).await
        }

        async fn create_index(
            &self,
            collection: Collection,
            field: &str,
        ) -> Result<(), StoreError> {
            if self.fail_lookup_indexes {
                return Err(injected());
            }
            self.inner.create_index(collection, field).await
        }

        async fn upsert_reference(&self, reference: &Reference) -> Result<bool, StoreError> {
            if self.fail_reference_code == Some(reference.code()) {
                return Err(injected());
            }
            self.inner.upsert_reference(reference).await
        }

        async fn insert_patrons(&self, records: &[PatronRecord]) -> Result<u64, StoreError> {
            let call = self.insert_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_insert_call == Some(call) {
                return Err(injected());
            }
            self.inner.insert_patrons(records).await
        }

        async fn find(
            &self,
            collection: Collection,
            filter: &Filter,
            limit: usize,
        ) -> Result<Vec<Document>, StoreError> {
            self.inner.find(collection, filter, limit).await
        }

        async fn count(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
            self.inner.count(collection, filter).await
        }

        async fn group_count(
            &self,
            collection: Collection,
            field: &str,
        ) -> Result<Vec<(QueryValue, u64)>, StoreError> {
            self.inner.group_count(collection, field).await
        }
    }

    #[tokio::test]
    async fn test_end_to_end_load() {
        let store = SqliteStore::in_memory().await.unwrap();
        let rows = sheet(vec![
            data_row("ADULT", "Adult", "X", "Main Library"),
            data_row("ADULT", "Adult Patron", "X", "Main Library"),
            cells(&["JUV", "Juvenile", "1", "2", "0 to 9 years", "B2", "Bayview", "", "", "z"]),
        ]);

        let mut loader = Loader::new(&store, LoadOptions::default());
        let summary = loader.run(&rows).await.unwrap();

        assert_eq!(loader.phase(), LoadPhase::Committed);
        assert_eq!(summary.headline(), "3 total rows processed, 2 successful, 1 failed");
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.failed_batches, 0);

        let types = all(&store, Collection::PatronTypes).await;
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].get("code"), Some(&QueryValue::from("ADULT")));
        assert_eq!(types[0].get("description"), Some(&QueryValue::from("Adult")));

        assert_eq!(count(&store, Collection::Libraries).await, 1);
        assert_eq!(count(&store, Collection::NotificationTypes).await, 1);
        assert_eq!(count(&store, Collection::Patrons).await, 2);

        let patrons = all(&store, Collection::Patrons).await;
        assert_eq!(patrons[0].get("active_month"), Some(&QueryValue::Int(3)));
        assert_eq!(patrons[0].get("email"), Some(&QueryValue::Null));
        assert_eq!(patrons[0].get("within_sf_county"), Some(&QueryValue::Bool(true)));
        assert_eq!(
            patrons[1].get("patron_type_description"),
            Some(&QueryValue::from("Adult Patron"))
        );
    }

    #[tokio::test]
    async fn test_reload_is_idempotent() {
        let store = SqliteStore::in_memory().await.unwrap();
        let rows = sheet(vec![
            data_row("ADULT", "Adult", "X", "Main Library"),
            data_row("SENIOR", "Senior", "B2", "Bayview"),
            data_row("ADULT", "Adult", "B2", "Bayview Branch"),
        ]);

        let first = Loader::new(&store, LoadOptions::default()).run(&rows).await.unwrap();
        let mut snapshot = Vec::new();
        for collection in Collection::ALL {
            snapshot.push(all(&store, collection).await);
        }

        let second = Loader::new(&store, LoadOptions::default()).run(&rows).await.unwrap();
        for (collection, before) in Collection::ALL.into_iter().zip(snapshot) {
            let after = all(&store, collection).await;
            assert_eq!(after, before, "{} differs after reload", collection);
        }

        assert_eq!(first.headline(), second.headline());
        assert_eq!(count(&store, Collection::Patrons).await, 3);
    }

    #[tokio::test]
    async fn test_first_seen_reference_wins() {
        let store = SqliteStore::in_memory().await.unwrap();
        let rows = sheet(vec![
            data_row("ADULT", "Adult", "B2", "Bayview"),
            data_row("ADULT", "Grown-up", "B2", "Bayview Branch"),
        ]);

        Loader::new(&store, LoadOptions::default()).run(&rows).await.unwrap();

        let libraries = all(&store, Collection::Libraries).await;
        assert_eq!(libraries.len(), 1);
        assert_eq!(libraries[0].get("name"), Some(&QueryValue::from("Bayview")));
        let types = all(&store, Collection::PatronTypes).await;
        assert_eq!(types[0].get("description"), Some(&QueryValue::from("Adult")));
    }

    #[tokio::test]
    async fn test_short_row_has_no_side_effects() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut short = data_row("ONLY", "Only Here", "Q9", "Nowhere");
        short.truncate(13);

        let summary = Loader::new(&store, LoadOptions::default())
            .run(&sheet(vec![short]))
            .await
            .unwrap();

        assert_eq!(summary.rows_seen, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.rejected, 1);
        for collection in Collection::ALL {
            assert_eq!(count(&store, collection).await, 0, "{} not empty", collection);
        }
    }

    #[tokio::test]
    async fn test_empty_input_and_header_only() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut loader = Loader::new(&store, LoadOptions::default());

        let summary = loader.run(&[]).await.unwrap();
        assert_eq!(summary.headline(), "0 total rows processed, 0 successful, 0 failed");

        let summary = loader.run(&sheet(Vec::new())).await.unwrap();
        assert_eq!(summary.rows_seen, 0);
        assert_eq!(loader.phase(), LoadPhase::Committed);
    }

    #[tokio::test]
    async fn test_failed_batch_is_isolated() {
        let mut store = FaultyStore::new().await;
        store.fail_insert_call = Some(0);

        let rows = sheet(
            (0..5)
                .map(|i| data_row("ADULT", "Adult", &format!("L{}", i), "Branch"))
                .collect(),
        );
        let options = LoadOptions { batch_size: 2 };
        let mut loader = Loader::new(&store, options);
        let summary = loader.run(&rows).await.unwrap();

        assert_eq!(loader.phase(), LoadPhase::Committed);
        assert_eq!(summary.rows_seen, 5);
        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.failed_batches, 1);
        assert_eq!(store.insert_calls.load(Ordering::SeqCst), 3);
        assert_eq!(count(&store.inner, Collection::Patrons).await, 3);
        // References of the failed batch were still upserted
        assert_eq!(count(&store.inner, Collection::Libraries).await, 5);
    }

    #[tokio::test]
    async fn test_drop_failure_aborts_load() {
        let mut store = FaultyStore::new().await;
        store.fail_drop = true;

        let mut loader = Loader::new(&store, LoadOptions::default());
        let err = loader
            .run(&sheet(vec![data_row("ADULT", "Adult", "X", "Main")]))
            .await
            .unwrap_err();

        assert_eq!(loader.phase(), LoadPhase::Failed);
        assert!(err.to_string().contains("Failed to drop collection"));
        assert_eq!(store.insert_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_lookup_index_failure_is_not_fatal() {
        let mut store = FaultyStore::new().await;
        store.fail_lookup_indexes = true;

        let summary = Loader::new(&store, LoadOptions::default())
            .run(&sheet(vec![data_row("ADULT", "Adult", "X", "Main")]))
            .await
            .unwrap();
        assert_eq!(summary.succeeded, 1);
    }

    #[tokio::test]
    async fn test_reference_failure_fails_only_that_row() {
        let mut store = FaultyStore::new().await;
        store.fail_reference_code = Some("BAD");

        let summary = Loader::new(&store, LoadOptions::default())
            .run(&sheet(vec![
                data_row("ADULT", "Adult", "X", "Main"),
                data_row("ADULT", "Adult", "BAD", "Broken"),
                data_row("SENIOR", "Senior", "X", "Main"),
            ]))
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.rejected, 0);
        assert_eq!(count(&store.inner, Collection::Patrons).await, 2);
    }

    #[tokio::test]
    async fn test_unrecognized_month_is_a_warning() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut row = data_row("ADULT", "Adult", "X", "Main");
        row[7] = "Smarch".to_string();

        let summary = Loader::new(&store, LoadOptions::default())
            .run(&sheet(vec![row]))
            .await
            .unwrap();

        assert_eq!(summary.warnings, 1);
        assert_eq!(summary.succeeded, 1);
        let patrons = all(&store, Collection::Patrons).await;
        assert_eq!(patrons[0].get("active_month"), Some(&QueryValue::Null));
    }
}
