//! Core library for the harmonic engine.
//!
//! The canonical cosmology of 24 modes is read from three CSV tables, checked
//! by the [`loader`] and frozen into an immutable [`Registry`]. The
//! [`HarmonicEngine`] answers queries over it and the [`legacy`] module
//! reproduces the pre-1.3.0 mapping shapes from the same data.
//!
//! Data flows one way: tables → loader → registry → engine / legacy facade.

pub mod chart;
pub mod config;
pub mod engine;
pub mod error;
pub mod legacy;
pub mod loader;
pub mod model;
pub mod registry;
pub mod tables;

pub use chart::{aggregate, ChartHarmony, Placement};
pub use config::EngineConfig;
pub use engine::{resolve_in, HarmonicEngine, Resolution, SharedEngine};
pub use error::{CosmologyError, Result, TableLocation};
pub use legacy::{load_map, load_table, LegacyMap, LegacyModeRecord, LegacyTable};
pub use loader::{load, LoadReport, CANONICAL_MODE_COUNT};
pub use model::{AssociationSubject, Element, ElementAssociation, ModalFamily, Mode, TimbreProfile};
pub use registry::Registry;
pub use tables::{RawTable, TableName, TableSet};
