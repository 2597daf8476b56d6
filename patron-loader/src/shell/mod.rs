//! Interactive query shell
//!
//! Reads one command per line until `exit`, `quit` or end of input. Errors in
//! a command are printed and the shell keeps going; only I/O failures on the
//! terminal itself end the session early.

mod benchmark;
mod command;
mod output;

pub use benchmark::{BenchmarkResult, run_benchmark};
pub use command::Command;
pub use output::print_documents;

use anyhow::{Context, Result};
use colored::*;
use std::io::{BufRead, Write};

use crate::model::Collection;
use crate::store::{Filter, Store};

/// Rows printed per query unless configured otherwise
pub const DEFAULT_RESULT_LIMIT: usize = 100;

const HELP: &str = r#"
=== Some example queries you can try ===
patrons|{}  // first rows of the patrons collection
patrons|{"within_sf_county": true}  // patrons living in San Francisco
patrons|{"age_range": "25 to 34 years"}  // patrons by age
patrons|{"email": {"$regex": "gmail\\.com"}}  // gmail users
patrons|{"active_year": {"$in": ["2022", "2023"]}}  // recently active patrons
patrons|{"$or": [{"home_library_code": "X"}, {"home_library_code": "B2"}]}
patron_types|{}  // all patron types
libraries|{}  // all libraries

Operators: $eq $ne $gt $gte $lt $lte $in $nin $regex $exists, plus $and / $or
Type 'benchmark' to run performance tests
"#;

pub struct Shell<'a, S: Store + ?Sized> {
    store: &'a S,
    limit: usize,
}

impl<'a, S: Store + ?Sized> Shell<'a, S> {
    pub fn new(store: &'a S, limit: usize) -> Self {
        Self { store, limit }
    }

    /// Run the read-eval-print loop
    pub async fn run<R, W>(&self, mut input: R, out: &mut W) -> Result<()>
    where
        R: BufRead,
        W: Write + ?Sized,
    {
        print_banner(out)?;

        let mut line = String::new();
        loop {
            write!(out, "> ")?;
            out.flush()?;

            line.clear();
            let read = input
                .read_line(&mut line)
                .context("Failed to read shell input")?;
            if read == 0 {
                writeln!(out)?;
                writeln!(out, "bye")?;
                return Ok(());
            }

            match Command::parse(&line) {
                Ok(Command::Empty) => {}
                Ok(Command::Exit) => {
                    writeln!(out, "bye")?;
                    return Ok(());
                }
                Ok(Command::Help) => writeln!(out, "{}", HELP)?,
                Ok(Command::Benchmark) => {
                    run_benchmark(self.store, out).await?;
                }
                Ok(Command::Query { collection, filter }) => {
                    self.query(collection, &filter, out).await?;
                }
                Err(e) => writeln!(out, "{}", e.to_string().red())?,
            }
        }
    }

    async fn query<W: Write + ?Sized>(
        &self,
        collection: Collection,
        filter: &Filter,
        out: &mut W,
    ) -> Result<()> {
        log::debug!("Query on {}: {:?}", collection, filter);
        match self.store.find(collection, filter, self.limit).await {
            Ok(documents) => print_documents(out, collection, &documents)?,
            Err(e) => writeln!(out, "{} {}", "query error:".red(), e)?,
        }
        Ok(())
    }
}

fn print_banner<W: Write + ?Sized>(out: &mut W) -> std::io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "=== patron query shell ===".bold())?;
    writeln!(out, "format: collection_name|{{\"field\": \"value\"}}")?;
    writeln!(
        out,
        "collections: {}",
        Collection::ALL
            .iter()
            .map(|c| c.name())
            .collect::<Vec<_>>()
            .join(", ")
    )?;
    writeln!(out, "type 'exit' or 'quit' to quit")?;
    writeln!(out, "type 'help' for example queries")?;
    writeln!(out)
}
