//! Dense two-phase simplex solver for linear programs over non-negative
//! variables.
//!
//! ```
//! use tableau::{Problem, Relation, Status};
//!
//! let mut problem = Problem::new();
//! let x = problem.add_variable();
//! let y = problem.add_variable();
//! problem.add_constraint(&[(x, 1.0), (y, 1.0)], Relation::Equal, 10.0)?;
//! problem.add_constraint(&[(x, 1.0)], Relation::LessOrEqual, 6.0)?;
//! problem.set_objective(&[(y, 1.0)])?;
//!
//! let result = problem.solve_min()?;
//! assert_eq!(result.status, Status::Optimal);
//! assert!((problem.value_of(y) - 4.0).abs() < 1e-7);
//! # Ok::<(), tableau::Error>(())
//! ```

mod error;
mod linalg;
mod model;
mod preprocess;
mod problem;
#[cfg(feature = "python")]
mod pyobjs;
mod simplex;
mod solution;
mod tolerance;

pub use crate::error::{Error, Result};
pub use crate::model::{Constraint, ConstraintId, Relation, Variable, VariableId};
pub use crate::problem::{Problem, SolverOptions};
pub use crate::solution::{SolveResult, Status};
pub use crate::tolerance::{Tolerance, EPSILON};

#[cfg(feature = "python")]
use pyo3::prelude::*;

#[cfg(feature = "python")]
#[pymodule]
fn tableau(py: Python<'_>, m: &PyModule) -> PyResult<()> {
    use crate::pyobjs::{InfeasibleError, PyProblem, UnboundedError};

    m.add_class::<PyProblem>()?;
    m.add("UnboundedError", py.get_type::<UnboundedError>())?;
    m.add("InfeasibleError", py.get_type::<InfeasibleError>())?;
    Ok(())
}
