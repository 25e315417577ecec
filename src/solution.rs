use crate::model::{Constraint, Variable, VariableId};
use crate::tolerance::Tolerance;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Optimal,
    Infeasible,
    Unbounded,
}

/// Outcome of [`Problem::solve_min`](crate::Problem::solve_min) or
/// [`Problem::solve_max`](crate::Problem::solve_max).
///
/// `objective_value` is only meaningful for [`Status::Optimal`]; it is `NaN`
/// otherwise.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolveResult {
    pub status: Status,
    pub objective_value: f64,
}

impl SolveResult {
    pub(crate) fn optimal(objective_value: f64) -> Self {
        Self {
            status: Status::Optimal,
            objective_value,
        }
    }

    pub(crate) fn failed(status: Status) -> Self {
        debug_assert_ne!(status, Status::Optimal);
        Self {
            status,
            objective_value: f64::NAN,
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.status == Status::Optimal
    }
}

/// Copy solved values onto the variables and evaluate the caller's objective.
///
/// Variables absent from `solution` were non-basic and read zero. The
/// objective is recomputed from `objective` rather than read off the tableau,
/// whose objective row may have been negated for maximization.
pub(crate) fn collect(
    solution: &BTreeMap<VariableId, f64>,
    variables: &mut [Variable],
    objective: &Constraint,
    tol: &Tolerance,
) -> f64 {
    reset(variables);
    for (id, &value) in solution {
        if tol.is_negative(value) {
            warn!("{} solved to negative value {}; clamping to zero", id, value);
        }
        variables[id.0].result = tol.clean(value).max(0.0);
    }
    objective.lhs(variables)
}

pub(crate) fn reset(variables: &mut [Variable]) {
    variables.iter_mut().for_each(|v| v.result = 0.0);
}
