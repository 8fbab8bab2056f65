//! # pt-data
//!
//! External collaborators of the search engine: the PCS parameter format,
//! benchmark instance discovery, seed-point files and the result sinks
//! (generated points, updated configuration, solving-mode logs).

pub mod instances;
pub mod pcs;
pub mod points;
pub mod solve_log;
pub mod solver_copy;

pub use instances::*;
pub use pcs::*;
pub use points::*;
pub use solve_log::*;
pub use solver_copy::*;
