//! Local and loop-scoped optimizations: LVN, local/global DCE, LICM.

pub mod dce;
pub mod licm;
pub mod lvn;

pub use dce::{global_dce, local_dce};
pub use licm::licm;
pub use lvn::lvn;
