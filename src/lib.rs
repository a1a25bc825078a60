//! A symbolic model checker for networks of timed automata: difference-
//! bound-matrix zones, a zone-graph transition system, and a covering-
//! reachability search engine, plus a local-time (reference-clock)
//! variant for asynchronous exploration.
//!
//! The textual modelling language, a general-purpose integer VM beyond
//! what guards/updates need, and static clock-bound analysis are out of
//! scope (spec §1); [`model`] is the in-memory AST shape those components
//! would otherwise produce.

pub mod arena;
pub mod bound;
pub mod clocks;
pub mod cover_graph;
pub mod covreach;
pub mod dbm;
pub mod error;
pub mod extrapolation;
pub mod hashtable;
pub mod matrix;
pub mod model;
pub mod output;
pub mod path;
pub mod refdbm;
pub mod refzg;
pub mod semantics;
pub mod ta;
pub mod textmodel;
pub mod vm;
pub mod zg;
