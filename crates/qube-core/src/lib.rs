//! # qube-core
//!
//! Core types for the QUBE hypercube concept-routing research harness.
//!
//! This crate provides the foundations the rest of the workspace builds on:
//!
//! - [`Hypercube`]: n-dimensional vertex topology (neighbors, Hamming
//!   distance, complements, shortest routes)
//! - [`BitTransitionTable`]: precomputed, persistable Hamming-1 adjacency,
//!   usable both for routing and for validating persisted routing state
//! - [`interfaces`]: named capability traits for external collaborators
//!   ([`Generator`], [`Encoder`], [`VectorIndex`], [`SafetyGate`],
//!   [`ReviewGate`]), injected at construction, never ambient
//! - [`StoragePaths`]: explicit storage-root configuration (no process-wide
//!   singletons)
//! - [`AuditLog`]: append-only JSONL record of every structural mutation
//!
//! ## Quick start
//!
//! ```
//! use qube_core::{BitTransitionTable, Hypercube};
//!
//! let cube = Hypercube::new(4);
//! let table = BitTransitionTable::from_hypercube(&cube);
//! assert!(table.validate(&cube));
//! assert_eq!(table.edge_list().len(), 32); // 4 * 16 / 2
//! ```

pub mod audit;
pub mod config;
pub mod interfaces;
pub mod topology;
pub mod transition;

pub use audit::AuditLog;
pub use config::{PathsSource, StoragePaths, StoragePathsBuilder};
pub use interfaces::{
    Encoder, Generator, GenomeView, ProvenanceHit, ReviewGate, SafetyGate, SafetyVerdict,
    VectorIndex,
};
pub use topology::Hypercube;
pub use transition::BitTransitionTable;
