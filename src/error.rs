use crate::model::VariableId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Caller contract violations and aborted solves.
///
/// Infeasible and unbounded programs are not errors; they are reported
/// through [`Status`](crate::solution::Status).
#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("variable {0} does not belong to this problem")]
    UnknownVariable(VariableId),

    #[error("coefficient of variable {variable} is not finite: {value}")]
    NonFiniteCoefficient { variable: VariableId, value: f64 },

    #[error("constraint constant is not finite: {0}")]
    NonFiniteConstant(f64),

    #[error("simplex did not terminate within {0} pivots")]
    IterationLimit(usize),
}
