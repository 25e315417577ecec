use crate::error::{Error, Result};
use crate::model::{Constraint, ConstraintId, Relation, Variable, VariableId};
use crate::preprocess::{preprocess, Preprocessed};
use crate::simplex::{Sense, Simplex};
use crate::solution::{self, SolveResult, Status};
use crate::tolerance::Tolerance;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    pub tolerance: Tolerance,
    /// Upper bound on pivots per solve; `None` runs until termination.
    pub max_iterations: Option<usize>,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::default(),
            max_iterations: Some(10_000),
        }
    }
}

impl SolverOptions {
    pub fn with_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: Option<usize>) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

/// A linear program over non-negative variables.
///
/// Each solve builds its own tableau; nothing but the variable results
/// survives between calls, so solving twice gives the same answer.
#[derive(Clone, Debug, Default)]
pub struct Problem {
    variables: Vec<Variable>,
    constraints: Vec<Constraint>,
    objective: Option<Constraint>,
    referenced: usize,
    options: SolverOptions,
}

impl Problem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: SolverOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    pub fn add_variable(&mut self) -> VariableId {
        self.variables.push(Variable::default());
        VariableId(self.variables.len() - 1)
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn variable(&self, id: VariableId) -> Option<&Variable> {
        self.variables.get(id.0)
    }

    /// Add `Σ coef·var  relation  constant`. Repeated variables are summed.
    pub fn add_constraint(
        &mut self,
        coefficients: &[(VariableId, f64)],
        relation: Relation,
        constant: f64,
    ) -> Result<ConstraintId> {
        if !constant.is_finite() {
            return Err(Error::NonFiniteConstant(constant));
        }
        let terms = self.consolidate(coefficients)?;
        self.constraints
            .push(Constraint::new(terms, relation, constant));
        Ok(ConstraintId(self.constraints.len() - 1))
    }

    pub fn set_objective(&mut self, coefficients: &[(VariableId, f64)]) -> Result<()> {
        let terms = self.consolidate(coefficients)?;
        self.objective = Some(Constraint::new(terms, Relation::Equal, 0.0));
        Ok(())
    }

    pub fn constraint(&self, id: ConstraintId) -> &Constraint {
        &self.constraints[id.0]
    }

    pub fn constraints(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter()
    }

    /// Check a constraint against the most recent solution.
    pub fn is_satisfied(&self, id: ConstraintId) -> bool {
        self.constraint(id).is_satisfied(&self.variables)
    }

    /// Drop every constraint, keeping the variables and the objective.
    pub fn clear_constraints(&mut self) {
        self.constraints.clear();
    }

    /// Solved value of `variable`; only meaningful after an optimal solve.
    ///
    /// # Panics
    ///
    /// If `variable` was not created by this problem.
    pub fn value_of(&self, variable: VariableId) -> f64 {
        self.variables[variable.0].result
    }

    pub fn solve_min(&mut self) -> Result<SolveResult> {
        self.solve(Sense::Minimize)
    }

    pub fn solve_max(&mut self) -> Result<SolveResult> {
        self.solve(Sense::Maximize)
    }

    fn solve(&mut self, sense: Sense) -> Result<SolveResult> {
        let tol = self.options.tolerance;
        let objective = self
            .objective
            .clone()
            .unwrap_or_else(|| Constraint::new(BTreeMap::new(), Relation::Equal, 0.0));
        debug!(
            "solving {:?} over {} constraints and {} variables",
            sense,
            self.constraints.len(),
            self.variables.len()
        );

        let prepared = match preprocess(&self.constraints, &objective, &tol) {
            Preprocessed::Ready(prepared) => prepared,
            Preprocessed::Infeasible => {
                solution::reset(&mut self.variables);
                return Ok(SolveResult::failed(Status::Infeasible));
            }
        };

        let mut simplex = Simplex::new(prepared, self.options);
        let status = simplex.run(&objective, sense).map_err(|err| {
            solution::reset(&mut self.variables);
            err
        })?;
        if status != Status::Optimal {
            solution::reset(&mut self.variables);
            return Ok(SolveResult::failed(status));
        }

        let objective_value =
            solution::collect(&simplex.solution(), &mut self.variables, &objective, &tol);
        for c in &self.constraints {
            if !c.holds_for(c.lhs(&self.variables), &tol) {
                warn!("optimal solution violates {}", c);
            }
        }
        debug!(
            "optimal objective {} after {} pivots",
            objective_value,
            simplex.iterations()
        );
        Ok(SolveResult::optimal(objective_value))
    }

    fn consolidate(&mut self, coefficients: &[(VariableId, f64)]) -> Result<BTreeMap<VariableId, f64>> {
        let mut terms = BTreeMap::new();
        for &(id, coef) in coefficients {
            if id.0 >= self.variables.len() {
                return Err(Error::UnknownVariable(id));
            }
            if !coef.is_finite() {
                return Err(Error::NonFiniteCoefficient {
                    variable: id,
                    value: coef,
                });
            }
            match terms.entry(id) {
                Entry::Vacant(e) => {
                    e.insert(coef);
                }
                Entry::Occupied(mut e) => *e.get_mut() += coef,
            }
        }
        for id in terms.keys() {
            let variable = &mut self.variables[id.0];
            if variable.index.is_none() {
                variable.index = Some(self.referenced);
                self.referenced += 1;
            }
        }
        Ok(terms)
    }
}
