//! Result table rendering

use colored::*;
use std::io::Write;

use crate::model::Collection;
use crate::store::Document;

const RULE_WIDTH: usize = 80;

fn rule() -> String {
    "-".repeat(RULE_WIDTH)
}

/// Print documents as a ` | ` separated table followed by a row count
pub fn print_documents<W: Write + ?Sized>(
    out: &mut W,
    collection: Collection,
    documents: &[Document],
) -> std::io::Result<()> {
    let header = collection
        .columns()
        .iter()
        .map(|c| c.name)
        .collect::<Vec<_>>()
        .join(" | ");

    writeln!(out, "{}", rule())?;
    writeln!(out, "{}", header.bold())?;
    for document in documents {
        let line = document
            .fields
            .iter()
            .map(|(_, value)| value.to_string())
            .collect::<Vec<_>>()
            .join(" | ");
        writeln!(out, "{}", line)?;
    }
    writeln!(out, "{}", rule())?;
    writeln!(out, "{} rows returned", documents.len())?;
    writeln!(out)
}
