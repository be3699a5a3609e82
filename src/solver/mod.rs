//! Solver interface: linear algebra backend, linear operator and error types

mod linalg;
mod operator;
mod solver_error;
mod result;

pub use linalg::*;
pub use operator::*;
pub use solver_error::*;
pub use result::*;
