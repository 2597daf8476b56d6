//! Canned query timings

use colored::*;
use std::io::Write;
use std::time::{Duration, Instant};

use crate::model::Collection;
use crate::store::{Filter, Store, StoreError};

enum Probe {
    Count(Filter),
    /// Number of distinct values of a field
    GroupBy(&'static str),
}

struct BenchmarkQuery {
    name: &'static str,
    collection: Collection,
    probe: Probe,
}

fn queries() -> Vec<BenchmarkQuery> {
    let patrons = |name, probe| BenchmarkQuery {
        name,
        collection: Collection::Patrons,
        probe,
    };
    vec![
        patrons("count all patrons", Probe::Count(Filter::match_all())),
        patrons("count by patron type", Probe::GroupBy("patron_type_description")),
        patrons("count by age range", Probe::GroupBy("age_range")),
        patrons("count by library", Probe::GroupBy("home_library_name")),
        patrons("find SF patrons", Probe::Count(Filter::eq("within_sf_county", true))),
        patrons("active in 2023", Probe::Count(Filter::eq("active_year", "2023"))),
    ]
}

/// Outcome of one timed query
#[derive(Debug)]
pub struct BenchmarkResult {
    pub name: &'static str,
    pub elapsed: Duration,
    pub count: Result<u64, StoreError>,
}

async fn execute<S: Store + ?Sized>(store: &S, query: &BenchmarkQuery) -> Result<u64, StoreError> {
    match &query.probe {
        Probe::Count(filter) => store.count(query.collection, filter).await,
        Probe::GroupBy(field) => store
            .group_count(query.collection, field)
            .await
            .map(|groups| groups.len() as u64),
    }
}

/// Time each canned query and print one line per query
pub async fn run_benchmark<S, W>(store: &S, out: &mut W) -> std::io::Result<Vec<BenchmarkResult>>
where
    S: Store + ?Sized,
    W: Write + ?Sized,
{
    writeln!(out)?;
    writeln!(out, "{}", "=== performance test ===".bold())?;

    let mut results = Vec::new();
    for query in queries() {
        let started = Instant::now();
        let count = execute(store, &query).await;
        let elapsed = started.elapsed();

        match &count {
            Ok(count) => writeln!(
                out,
                "{}: {} ({} results)",
                query.name,
                format!("{:.2}ms", elapsed.as_secs_f64() * 1000.0).cyan(),
                count
            )?,
            Err(e) => writeln!(out, "{}: {} - {}", query.name, "error".red(), e)?,
        }

        results.push(BenchmarkResult {
            name: query.name,
            elapsed,
            count,
        });
    }

    writeln!(out)?;
    writeln!(out, "benchmark done")?;
    Ok(results)
}
