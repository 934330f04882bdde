//! # qube-memory
//!
//! Long-term memory for the QUBE concept-routing harness.
//!
//! - [`LtmManager`]: the durable, versioned concept→vertex mapping.
//!   Protected vertices need human approval to change; every mutation is
//!   snapshotted to an append-only version history with per-snapshot backup
//!   files, and rollback is itself a forward-only audited event.
//! - [`ConceptGrounder`]: assigns concept strings to vertices by prototype
//!   similarity, with synonym (neighbor) and antonym (complement) placement
//!   rules.
//!
//! ```no_run
//! use qube_core::{AuditLog, StoragePaths};
//! use qube_memory::LtmManager;
//!
//! let paths = StoragePaths::builder().root("/tmp/qube-run").build();
//! paths.ensure_dirs()?;
//! let audit = AuditLog::open(paths.audit_dir().join("ltm.jsonl"))?;
//! let (mut ltm, outcome) = LtmManager::open(&paths, &[0b1111], &audit)?;
//! println!("LTM start: {}", outcome.note);
//!
//! let promoted = ltm.propose_promote("gravity", 5, true, false, 4, 3)?;
//! assert!(promoted);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod grounding;
pub mod ltm;

pub use grounding::ConceptGrounder;
pub use ltm::{LtmLoadOutcome, LtmManager, LtmVersion};
