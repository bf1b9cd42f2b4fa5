//! Core library behind the `pimc` PIM-SM v2 Join/Prune emitter and shared by
//! `mclst`'s address handling: wire codec, Join/Prune plan builder,
//! scheduler and raw-socket transport.

pub mod config;
pub mod error;
pub mod net;
pub mod packet;
pub mod plan;
pub mod scheduler;
pub mod transport;
pub mod wire;
