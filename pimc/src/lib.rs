//! YAML configuration loading, logging setup and CLI surface for the
//! `pimc` PIM-SM v2 Join/Prune emitter. The protocol core lives in
//! `pimc-core`; this crate wires validated configuration into it.

pub mod cli;
pub mod config;
pub mod logging;
