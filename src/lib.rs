// tacopt: optimization and analysis passes over a JSON three-address IR.

#![allow(dead_code)]

pub mod cfg;
pub mod cli;
pub mod dataflow;
pub mod error;
pub mod ir;
pub mod opt;
pub mod ssa;

pub use error::{Result, TacError};
