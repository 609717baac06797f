//! Consensus resolution of crowd transcriptions.
//!
//! Volunteers transcribe the same rows of scanned ledger pages independently. For
//! every cell (a subject, a task and a field), this crate decides whether the
//! transcriptions agree enough to accept a value, and otherwise keeps all the
//! candidates for manual review. The resolved cells are then joined into one row
//! per task, annotated with the problems a reviewer has to look at.
//!
//! See the [manual] for the details of the rules.

mod assembly;
pub mod builder;
mod config;
mod fields;
mod labels;
pub mod manual;
mod tally;
mod uncertainty;

pub use crate::assembly::*;
pub use crate::config::*;
pub use crate::fields::*;
pub use crate::labels::*;
pub use crate::tally::*;
pub use crate::uncertainty::*;
