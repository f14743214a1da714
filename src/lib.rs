//! rie - Repository Integrity Engine
//!
//! Turns collected evidence (static imports, runtime traces, text
//! references) into a dependency graph, splits the repository into
//! surfaces, triangulates the smallest entrypoint set that explains the live
//! code, and plans reversible quarantine moves for everything else.

pub mod cli;
pub mod config;
pub mod error;
pub mod evidence;
pub mod graph;
pub mod models;
pub mod paths;
pub mod pipeline;
pub mod quarantine;
pub mod reporters;
pub mod surface;
pub mod tagger;
pub mod triangulate;

pub use error::{FileError, FileErrorKind, IntegrityError, IntegrityResult};
pub use models::{Confidence, Evidence, FileRecord, Status};
