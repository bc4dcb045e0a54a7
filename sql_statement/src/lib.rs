//! The bound statement model handed to the route engine.
//!
//! Parsing SQL text happens elsewhere; this crate only describes the result of
//! binding a statement: which tables it touches, its predicate tree, its
//! INSERT rows and UPDATE assignments, the positional parameters bound for
//! this execution, and any routing hints embedded in SQL comments.
//!
//! All types are plain data and can be (de)serialized with serde, so tools can
//! pass statements around as JSON.

mod expr;
mod hint;
mod statement;
mod value;

pub use expr::*;
pub use hint::*;
pub use statement::*;
pub use value::*;
