#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`error`]: Domain error types (`ShipError`)
//! - [`config`]: Ship configuration (`ShipConfig`, builder)
//! - [`record`]: Report record model (`RawRow`, `CanonicalRecord`, `DerivedRecord`, `Identifier`)
//! - [`csv_reader`]: CSV export reader with per-cell type inference
//! - [`normalize`]: Row normalizer
//! - [`fanout`]: Identifier fan-out
//! - [`lock`]: Shared log file handle (`LogFile`) with in-process and `flock` locking
//! - [`writer`]: Output log writer (`LogWriter`, `LineFormat`, `WriteMode`)
//! - [`export`]: Export adapters (`ReportExporter` trait, `GvmScriptExporter`, `FileExporter`)
//! - [`ship`]: Run orchestrator (`ShipOrchestrator`, `RunReport`)
//! - [`archive`]: Archive-and-truncate rotation (`ArchiveRotator`, `RotationOutcome`)
//!
//! # Architecture
//!
//! ```text
//! ReportExporter --> CSV --> RawRow --> normalize --> CanonicalRecord
//!                                                         |
//!                                                      fan_out
//!                                                         |
//!                                              Vec<DerivedRecord>
//!                                                         |
//!                                 LogWriter (LogFile lock) --> staging / cumulative log
//!                                                                           |
//!                                         ArchiveRotator (same LogFile lock) --> <YYYYMMDD>_scans
//! ```

pub mod archive;
pub mod config;
pub mod csv_reader;
pub mod error;
pub mod export;
pub mod fanout;
pub mod lock;
pub mod normalize;
pub mod record;
pub mod ship;
pub mod writer;

// --- Public API Re-exports ---

// Orchestrator
pub use ship::{RunReport, ShipOrchestrator, ShipOrchestratorBuilder};

// Configuration
pub use config::{ShipConfig, ShipConfigBuilder};

// Error
pub use error::ShipError;

// Records
pub use record::{CanonicalRecord, DerivedRecord, Identifier, IdentifierSlot, RawRow, RawValue};

// Transform
pub use fanout::{fan_out, fan_out_all};
pub use normalize::normalize;

// Output
pub use lock::{LogFile, RunLock};
pub use writer::{LineFormat, LogWriter, WriteMode};

// Export
pub use export::{Exporter, FileExporter, GvmScriptExporter, ReportExporter, ScriptOutput};

// Archive
pub use archive::{ArchiveRotator, RotationOutcome, rotate};
