use crate::error::Error;
use crate::model::{Relation, VariableId};
use crate::problem::{Problem, SolverOptions};
use crate::solution::{SolveResult, Status};
use crate::tolerance::Tolerance;
use pyo3::create_exception;
use pyo3::exceptions::{PyException, PyIndexError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;

create_exception!(tableau, UnboundedError, PyException);
create_exception!(tableau, InfeasibleError, PyException);

fn to_pyerr(err: Error) -> PyErr {
    match err {
        Error::UnknownVariable(_) => PyIndexError::new_err(err.to_string()),
        Error::NonFiniteCoefficient { .. } | Error::NonFiniteConstant(_) => {
            PyValueError::new_err(err.to_string())
        }
        Error::IterationLimit(_) => PyRuntimeError::new_err(err.to_string()),
    }
}

fn parse_relation(relation: &str) -> PyResult<Relation> {
    match relation {
        "<=" => Ok(Relation::LessOrEqual),
        "=" | "==" => Ok(Relation::Equal),
        ">=" => Ok(Relation::MoreOrEqual),
        _ => Err(PyValueError::new_err(format!(
            "unknown relation {:?}; expected one of '<=', '==', '>='",
            relation
        ))),
    }
}

fn objective_value(result: SolveResult) -> PyResult<f64> {
    match result.status {
        Status::Optimal => Ok(result.objective_value),
        Status::Unbounded => Err(UnboundedError::new_err("The objective is unbounded")),
        Status::Infeasible => Err(InfeasibleError::new_err("The model is infeasible")),
    }
}

#[pyclass(module = "tableau", name = "Problem")]
pub(crate) struct PyProblem {
    problem: Problem,
}

#[pymethods]
impl PyProblem {
    #[new]
    #[pyo3(signature = (*, tolerance = None, max_iterations = None))]
    fn new(tolerance: Option<f64>, max_iterations: Option<usize>) -> PyResult<Self> {
        let mut options = SolverOptions::default();
        if let Some(epsilon) = tolerance {
            if !epsilon.is_finite() || epsilon < 0.0 {
                return Err(PyValueError::new_err("tolerance must be finite and non-negative"));
            }
            options = options.with_tolerance(Tolerance::new(epsilon));
        }
        if max_iterations.is_some() {
            options = options.with_max_iterations(max_iterations);
        }
        Ok(Self {
            problem: Problem::with_options(options),
        })
    }

    fn add_variable(&mut self) -> usize {
        self.problem.add_variable().0
    }

    fn add_constraint(
        &mut self,
        terms: Vec<(usize, f64)>,
        relation: &str,
        constant: f64,
    ) -> PyResult<usize> {
        let relation = parse_relation(relation)?;
        let terms = terms
            .into_iter()
            .map(|(id, coef)| (VariableId(id), coef))
            .collect::<Vec<_>>();
        self.problem
            .add_constraint(&terms, relation, constant)
            .map(|id| id.0)
            .map_err(to_pyerr)
    }

    fn set_objective(&mut self, terms: Vec<(usize, f64)>) -> PyResult<()> {
        let terms = terms
            .into_iter()
            .map(|(id, coef)| (VariableId(id), coef))
            .collect::<Vec<_>>();
        self.problem.set_objective(&terms).map_err(to_pyerr)
    }

    fn solve_min(&mut self) -> PyResult<f64> {
        objective_value(self.problem.solve_min().map_err(to_pyerr)?)
    }

    fn solve_max(&mut self) -> PyResult<f64> {
        objective_value(self.problem.solve_max().map_err(to_pyerr)?)
    }

    fn value_of(&self, variable: usize) -> PyResult<f64> {
        self.problem
            .variable(VariableId(variable))
            .map(|v| v.result())
            .ok_or_else(|| to_pyerr(Error::UnknownVariable(VariableId(variable))))
    }

    fn __getitem__(&self, variable: usize) -> PyResult<f64> {
        self.value_of(variable)
    }
}
