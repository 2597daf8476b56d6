//! Shell input parsing

use crate::model::Collection;
use crate::store::{Filter, QueryError, parse_filter};

/// One line of shell input, parsed
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Blank line
    Empty,
    Exit,
    Help,
    Benchmark,
    Query { collection: Collection, filter: Filter },
}

impl Command {
    /// Parse a line; keywords are matched case-sensitively before anything else
    pub fn parse(line: &str) -> Result<Self, QueryError> {
        let line = line.trim();
        match line {
            "" => return Ok(Command::Empty),
            "exit" | "quit" => return Ok(Command::Exit),
            "help" => return Ok(Command::Help),
            "benchmark" => return Ok(Command::Benchmark),
            _ => {}
        }

        let (selector, expression) = line.split_once('|').ok_or(QueryError::MissingSeparator)?;
        let selector = selector.trim();
        let collection = Collection::from_name(selector)
            .ok_or_else(|| QueryError::UnknownCollection(selector.to_string()))?;
        let filter = parse_filter(collection, expression)?;

        Ok(Command::Query { collection, filter })
    }
}
