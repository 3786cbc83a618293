//! Distributed Jacobi power ratings.
//!
//! Builds a rating system from season results and solves it with a fixed
//! set of message-passing workers, synchronized either point-to-point
//! through a coordinator or with an all-gather collective.

pub mod compiler;
pub mod error;
pub mod ir;
pub mod output;
pub mod parser;
pub mod solver;
pub mod stats;
