//! Plan optimizer
//!
//! Turns a raw plan into the compact, resilient plan the code generator
//! compiles: duplicate navigations collapse, adjacent waits merge and every
//! interactive step gets an ordered list of fallback selectors.

pub mod errors;
pub mod optimizer;
pub mod policy;
pub mod selectors;

pub use errors::OptimizeError;
pub use optimizer::Optimizer;
pub use policy::OptimizerPolicy;
pub use selectors::{fallback_candidates, normalize_selector};
