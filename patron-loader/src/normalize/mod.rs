//! Row normalization
//!
//! Pure functions turning a raw spreadsheet row into validated entities or a
//! rejection. Nothing in here touches the store or logs.

mod fields;
mod row;

pub use fields::*;
pub use row::*;
