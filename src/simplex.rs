use crate::error::{Error, Result};
use crate::linalg::Tableau;
use crate::model::{Constraint, Helper, Relation, VariableId};
use crate::preprocess::Prepared;
use crate::problem::SolverOptions;
use crate::solution::Status;
use log::{debug, trace, warn};
use std::collections::{BTreeMap, HashMap};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Sense {
    Minimize,
    Maximize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    /// Minimizing the sum of artificial variables.
    One,
    /// Artificial columns frozen, optimizing the caller's objective.
    Two,
    Done(Status),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PivotRule {
    /// Most negative reduced cost; ties go to the lowest index.
    Dantzig,
    /// First improving column; ratio ties go to the lowest basic column.
    Bland,
}

enum Iteration {
    Optimal,
    /// The entering column has no eligible pivot row.
    Unbounded(usize),
}

/// Two-phase tableau simplex.
///
/// Column layout: structural variables, then one slack or surplus column per
/// inequality row, then one artificial column per `=`/`>=` row, then the RHS.
/// The objective row is the last row and holds reduced costs, with the
/// negated objective value in its RHS cell.
pub(crate) struct Simplex {
    tableau: Tableau,
    /// Basic column of each constraint row.
    basis: Vec<usize>,
    prepared: Prepared,
    first_artificial: usize,
    phase: Phase,
    rule: PivotRule,
    degenerate_streak: usize,
    iterations: usize,
    options: SolverOptions,
}

impl Simplex {
    pub(crate) fn new(mut prepared: Prepared, options: SolverOptions) -> Self {
        let m = prepared.constraints.len();
        let n = prepared.columns.len();
        let helpers = prepared
            .constraints
            .iter()
            .filter(|c| c.relation != Relation::Equal)
            .count();
        let artificials = prepared
            .constraints
            .iter()
            .filter(|c| c.relation != Relation::LessOrEqual)
            .count();

        let first_artificial = n + helpers;
        let mut tableau = Tableau::zeros(m + 1, first_artificial + artificials + 1);
        let rhs = tableau.rhs_column();
        let mut basis = Vec::with_capacity(m);

        let indices = prepared
            .columns
            .iter()
            .enumerate()
            .map(|(j, &id)| (id, j))
            .collect::<HashMap<_, _>>();

        let mut next_helper = n;
        let mut next_artificial = first_artificial;
        for (i, c) in prepared.constraints.iter_mut().enumerate() {
            for (id, &coef) in &c.terms {
                tableau.set_value_at(i, indices[id], coef);
            }
            tableau.set_value_at(i, rhs, c.constant);

            c.slack_or_surplus = match c.relation {
                Relation::LessOrEqual => Some(Helper {
                    column: next_helper,
                    coefficient: 1.0,
                }),
                Relation::MoreOrEqual => Some(Helper {
                    column: next_helper,
                    coefficient: -1.0,
                }),
                Relation::Equal => None,
            };
            if let Some(helper) = c.slack_or_surplus {
                tableau.set_value_at(i, helper.column, helper.coefficient);
                next_helper += 1;
            }

            c.artificial = match c.relation {
                Relation::LessOrEqual => None,
                _ => Some(next_artificial),
            };
            if let Some(column) = c.artificial {
                tableau.set_value_at(i, column, 1.0);
                next_artificial += 1;
            }

            // Each row starts with its slack or artificial as a unit column.
            basis.push(match c.artificial {
                Some(column) => column,
                None => next_helper - 1,
            });
        }

        let phase = match artificials {
            0 => Phase::Two,
            _ => Phase::One,
        };
        debug!(
            "built {}x{} tableau: {} structural, {} slack/surplus, {} artificial",
            tableau.nrows(),
            tableau.ncols(),
            n,
            helpers,
            artificials
        );

        Self {
            tableau,
            basis,
            prepared,
            first_artificial,
            phase,
            rule: PivotRule::Dantzig,
            degenerate_streak: 0,
            iterations: 0,
            options,
        }
    }

    /// Drive the phase state machine until a terminal status is reached.
    pub(crate) fn run(&mut self, objective: &Constraint, sense: Sense) -> Result<Status> {
        loop {
            self.phase = match self.phase {
                Phase::One => self.phase_one()?,
                Phase::Two => self.phase_two(objective, sense)?,
                Phase::Done(status) => {
                    debug!("simplex finished after {} pivots: {:?}", self.iterations, status);
                    return Ok(status);
                }
            };
        }
    }

    fn phase_one(&mut self) -> Result<Phase> {
        let obj = self.tableau.objective_row();
        self.tableau.clear_row(obj);
        for j in self.first_artificial..self.tableau.rhs_column() {
            self.tableau.set_value_at(obj, j, 1.0);
        }
        self.reduce_objective();
        debug!(
            "phase 1: initial infeasibility {}",
            -self.tableau.rhs(obj)
        );

        if let Iteration::Unbounded(j) = self.iterate(self.tableau.rhs_column())? {
            // Artificial sums are bounded below by zero, so this means the
            // tableau was corrupted by rounding.
            warn!("phase 1 found no pivot row for column {}", j);
            return Ok(Phase::Done(Status::Infeasible));
        }

        let tol = self.options.tolerance;
        let infeasibility = -self.tableau.rhs(obj);
        if !tol.nearly_zero(infeasibility) {
            debug!("phase 1 ended with infeasibility {}", infeasibility);
            return Ok(Phase::Done(Status::Infeasible));
        }
        if let Some(i) = (0..self.basis.len())
            .find(|&i| self.is_artificial(self.basis[i]) && tol.is_positive(self.tableau.rhs(i)))
        {
            debug!(
                "artificial column {} still basic with value {}",
                self.basis[i],
                self.tableau.rhs(i)
            );
            return Ok(Phase::Done(Status::Infeasible));
        }

        self.drive_out_artificials()?;
        self.freeze_artificials();
        Ok(Phase::Two)
    }

    fn phase_two(&mut self, objective: &Constraint, sense: Sense) -> Result<Phase> {
        let obj = self.tableau.objective_row();
        self.tableau.clear_row(obj);

        // Only minimization is implemented; maximize by minimizing the negation.
        let sign = match sense {
            Sense::Minimize => 1.0,
            Sense::Maximize => -1.0,
        };
        for (j, &id) in self.prepared.columns.iter().enumerate() {
            self.tableau.set_value_at(obj, j, sign * objective.coef(id));
        }
        self.reduce_objective();
        self.rule = PivotRule::Dantzig;
        self.degenerate_streak = 0;
        debug!("phase 2: {:?}", sense);

        match self.iterate(self.first_artificial)? {
            Iteration::Optimal => Ok(Phase::Done(Status::Optimal)),
            Iteration::Unbounded(j) => {
                debug!("column {} can increase without bound", j);
                Ok(Phase::Done(Status::Unbounded))
            }
        }
    }

    fn is_artificial(&self, j: usize) -> bool {
        j >= self.first_artificial
    }

    /// Zero the objective row under every basic column.
    fn reduce_objective(&mut self) {
        let obj = self.tableau.objective_row();
        for i in 0..self.basis.len() {
            let factor = self.tableau.value_at(obj, self.basis[i]);
            if factor != 0.0 {
                self.tableau.combine_rows(obj, i, factor);
                self.tableau.set_value_at(obj, self.basis[i], 0.0);
            }
        }
    }

    /// Pivot until no column below `limit` improves the objective.
    fn iterate(&mut self, limit: usize) -> Result<Iteration> {
        loop {
            let Some(j) = self.pivot_column(limit) else {
                return Ok(Iteration::Optimal);
            };
            let Some(i) = self.pivot_row(j) else {
                return Ok(Iteration::Unbounded(j));
            };
            self.pivot(i, j)?;
        }
    }

    fn pivot_column(&self, limit: usize) -> Option<usize> {
        let tol = self.options.tolerance;
        let obj = self.tableau.objective_row();
        let candidates = self.tableau.row(obj)[..limit]
            .iter()
            .enumerate()
            .filter(|&(_, &cost)| tol.is_negative(cost));

        match self.rule {
            PivotRule::Bland => candidates.map(|(j, _)| j).next(),
            PivotRule::Dantzig => candidates
                .fold(None, |best: Option<(usize, f64)>, (j, &cost)| match best {
                    Some((_, lowest)) if !tol.is_negative(cost - lowest) => best,
                    _ => Some((j, cost)),
                })
                .map(|(j, _)| j),
        }
    }

    /// Minimum ratio test over rows with a positive entry in column `j`.
    fn pivot_row(&self, j: usize) -> Option<usize> {
        let tol = self.options.tolerance;
        let mut best: Option<(usize, f64)> = None;
        for i in 0..self.basis.len() {
            let a = self.tableau.value_at(i, j);
            if !tol.is_positive(a) {
                continue;
            }
            let ratio = self.tableau.rhs(i).max(0.0) / a;
            best = match best {
                None => Some((i, ratio)),
                Some((_, lowest)) if tol.is_negative(ratio - lowest) => Some((i, ratio)),
                Some((k, lowest))
                    if self.rule == PivotRule::Bland
                        && tol.nearly_eq(ratio, lowest)
                        && self.basis[i] < self.basis[k] =>
                {
                    Some((i, ratio))
                }
                _ => best,
            };
        }
        best.map(|(i, _)| i)
    }

    /// One Gauss-Jordan step making column `j` basic in row `i`.
    fn pivot(&mut self, i: usize, j: usize) -> Result<()> {
        self.iterations += 1;
        if let Some(max) = self.options.max_iterations {
            if self.iterations > max {
                return Err(Error::IterationLimit(max));
            }
        }
        trace!(
            "pivot #{}: column {} enters, column {} leaves row {}",
            self.iterations,
            j,
            self.basis[i],
            i
        );

        let tol = self.options.tolerance;
        let degenerate = tol.nearly_zero(self.tableau.rhs(i));
        let rhs = self.tableau.rhs_column();

        self.tableau.scale_row(i, 1.0 / self.tableau.value_at(i, j));
        self.tableau.set_value_at(i, j, 1.0);
        for k in 0..self.tableau.nrows() {
            let factor = self.tableau.value_at(k, j);
            if k != i && factor != 0.0 {
                self.tableau.combine_rows(k, i, factor);
                self.tableau.set_value_at(k, j, 0.0);
                let cleaned = tol.clean(self.tableau.rhs(k));
                self.tableau.set_value_at(k, rhs, cleaned);
            }
        }
        self.basis[i] = j;

        if degenerate {
            self.degenerate_streak += 1;
            let patience = self.tableau.nrows() + self.tableau.ncols();
            if self.rule == PivotRule::Dantzig && self.degenerate_streak > patience {
                debug!(
                    "{} consecutive degenerate pivots; switching to Bland's rule",
                    self.degenerate_streak
                );
                self.rule = PivotRule::Bland;
            }
        } else {
            self.degenerate_streak = 0;
        }
        Ok(())
    }

    /// Replace basic artificial columns left at zero by a structural or
    /// slack column from the same row. Rows with none are redundant and keep
    /// their artificial, which can never leave zero again.
    fn drive_out_artificials(&mut self) -> Result<()> {
        let tol = self.options.tolerance;
        for i in 0..self.basis.len() {
            if !self.is_artificial(self.basis[i]) {
                continue;
            }
            let entering = (0..self.first_artificial)
                .find(|&j| !tol.nearly_zero(self.tableau.value_at(i, j)));
            match entering {
                Some(j) => self.pivot(i, j)?,
                None => debug!("row {} is redundant", i),
            }
        }
        Ok(())
    }

    /// Zero every non-basic artificial column so it cannot re-enter.
    fn freeze_artificials(&mut self) {
        for j in self.first_artificial..self.tableau.rhs_column() {
            if !self.basis.contains(&j) {
                self.tableau.clear_column(j);
            }
        }
    }

    /// Value of every structural and pinned variable at the current basis.
    pub(crate) fn solution(&self) -> BTreeMap<VariableId, f64> {
        let mut solution = self.prepared.pinned.clone();
        for (j, &id) in self.prepared.columns.iter().enumerate() {
            let value = match self.basis.iter().position(|&b| b == j) {
                Some(i) => {
                    debug_assert!(self.is_unit_column(j, i));
                    self.tableau.rhs(i)
                }
                None => 0.0,
            };
            solution.insert(id, value);
        }
        solution
    }

    fn is_unit_column(&self, j: usize, row: usize) -> bool {
        let tol = self.options.tolerance;
        self.tableau
            .column(j)
            .take(self.basis.len())
            .enumerate()
            .all(|(i, &x)| match i == row {
                true => tol.nearly_eq(x, 1.0),
                false => tol.nearly_zero(x),
            })
    }

    pub(crate) fn iterations(&self) -> usize {
        self.iterations
    }

    /// Slack or surplus value of each row, in row order.
    #[cfg(test)]
    fn helper_values(&self) -> Vec<Option<f64>> {
        self.prepared
            .constraints
            .iter()
            .map(|c| {
                c.slack_or_surplus.map(|h| {
                    self.basis
                        .iter()
                        .position(|&b| b == h.column)
                        .map_or(0.0, |i| self.tableau.rhs(i))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::{preprocess, Preprocessed};
    use crate::tolerance::Tolerance;
    use approx::assert_abs_diff_eq;

    const ATOL: f64 = 1e-9;

    fn constraint(terms: &[(usize, f64)], relation: Relation, constant: f64) -> Constraint {
        let terms = terms.iter().map(|&(i, c)| (VariableId(i), c)).collect();
        Constraint::new(terms, relation, constant)
    }

    fn objective(coefs: &[f64]) -> Constraint {
        let terms = coefs.iter().enumerate().map(|(i, &c)| (i, c)).collect::<Vec<_>>();
        constraint(&terms, Relation::Equal, 0.0)
    }

    fn solve(
        objective: &Constraint,
        constraints: &[Constraint],
        sense: Sense,
    ) -> (Status, Simplex) {
        let _ = env_logger::builder().is_test(true).try_init();
        let prepared = match preprocess(constraints, objective, &Tolerance::default()) {
            Preprocessed::Ready(prepared) => prepared,
            Preprocessed::Infeasible => panic!("preprocessing reported infeasible"),
        };
        let mut simplex = Simplex::new(prepared, SolverOptions::default());
        let status = simplex.run(objective, sense).unwrap();
        (status, simplex)
    }

    fn values(simplex: &Simplex, n: usize) -> Vec<f64> {
        let solution = simplex.solution();
        (0..n)
            .map(|i| solution.get(&VariableId(i)).cloned().unwrap_or(0.0))
            .collect()
    }

    fn value(objective: &Constraint, x: &[f64]) -> f64 {
        objective.terms().map(|(id, c)| c * x[id.0]).sum()
    }

    #[test]
    fn test_tableau_layout() {
        let prepared = match preprocess(
            &[
                constraint(&[(0, 1.0), (1, 1.0)], Relation::MoreOrEqual, 2.0),
                constraint(&[(0, 1.0), (1, 3.0)], Relation::LessOrEqual, 6.0),
                constraint(&[(0, 2.0), (1, 1.0)], Relation::Equal, 4.0),
            ],
            &objective(&[1.0, 1.0]),
            &Tolerance::default(),
        ) {
            Preprocessed::Ready(prepared) => prepared,
            Preprocessed::Infeasible => unreachable!(),
        };
        let simplex = Simplex::new(prepared, SolverOptions::default());

        // x, y | surplus, slack | artificial, artificial | rhs
        assert_eq!(simplex.tableau.nrows(), 4);
        assert_eq!(simplex.tableau.ncols(), 7);
        assert_eq!(simplex.first_artificial, 4);
        assert_eq!(simplex.tableau.row(0), &[1.0, 1.0, -1.0, 0.0, 1.0, 0.0, 2.0]);
        assert_eq!(simplex.tableau.row(1), &[1.0, 3.0, 0.0, 1.0, 0.0, 0.0, 6.0]);
        assert_eq!(simplex.tableau.row(2), &[2.0, 1.0, 0.0, 0.0, 0.0, 1.0, 4.0]);
        assert_eq!(simplex.basis, vec![4, 3, 5]);
        assert_eq!(simplex.phase, Phase::One);

        let helpers = simplex
            .prepared
            .constraints
            .iter()
            .map(|c| (c.slack_or_surplus, c.artificial))
            .collect::<Vec<_>>();
        assert_eq!(
            helpers,
            vec![
                (
                    Some(Helper {
                        column: 2,
                        coefficient: -1.0
                    }),
                    Some(4)
                ),
                (
                    Some(Helper {
                        column: 3,
                        coefficient: 1.0
                    }),
                    None
                ),
                (None, Some(5)),
            ]
        );
    }

    #[test]
    fn test_solve_1() {
        // Example 3.5 in Bertsimas & Tsitsiklis
        let objective = objective(&[-10.0, -12.0, -12.0]);
        let constraints = [
            constraint(&[(0, 1.0), (1, 2.0), (2, 2.0)], Relation::LessOrEqual, 20.0),
            constraint(&[(0, 2.0), (1, 1.0), (2, 2.0)], Relation::LessOrEqual, 20.0),
            constraint(&[(0, 2.0), (1, 2.0), (2, 1.0)], Relation::LessOrEqual, 20.0),
        ];

        let (status, simplex) = solve(&objective, &constraints, Sense::Minimize);
        assert_eq!(status, Status::Optimal);
        let x = values(&simplex, 3);
        assert_abs_diff_eq!(value(&objective, &x), -136.0, epsilon = ATOL);
        assert_abs_diff_eq!(x[..], [4.0, 4.0, 4.0][..], epsilon = ATOL);
        for slack in simplex.helper_values() {
            assert_abs_diff_eq!(slack.unwrap(), 0.0, epsilon = ATOL);
        }
    }

    #[test]
    fn test_solve_2() {
        // Example 3.8 in Bertsimas & Tsitsiklis; the third row is the sum of
        // the first two, so one artificial stays behind a redundant row.
        let objective = objective(&[1.0, 1.0, 1.0, 0.0]);
        let constraints = [
            constraint(&[(0, 1.0), (1, 2.0), (2, 3.0)], Relation::Equal, 3.0),
            constraint(&[(0, -1.0), (1, 2.0), (2, 6.0)], Relation::Equal, 2.0),
            constraint(&[(1, 4.0), (2, 9.0)], Relation::Equal, 5.0),
            constraint(&[(2, 3.0), (3, 1.0)], Relation::Equal, 1.0),
        ];

        let (status, simplex) = solve(&objective, &constraints, Sense::Minimize);
        assert_eq!(status, Status::Optimal);
        let x = values(&simplex, 4);
        assert_abs_diff_eq!(value(&objective, &x), 1.75, epsilon = ATOL);
        assert_abs_diff_eq!(x[..], [0.5, 1.25, 0.0, 1.0][..], epsilon = ATOL);
    }

    #[test]
    fn test_solve_3() {
        let objective = objective(&[1.0, 2.0, 3.0]);

        let (status, simplex) = solve(&objective, &[], Sense::Minimize);
        assert_eq!(status, Status::Optimal);
        assert_eq!(values(&simplex, 3), &[0.0, 0.0, 0.0]);
        assert_eq!(simplex.iterations(), 0);
    }

    #[test]
    fn test_solve_4() {
        let objective = objective(&[1.0, 2.0, -3.0]);

        let (status, _) = solve(&objective, &[], Sense::Minimize);
        assert_eq!(status, Status::Unbounded);
    }

    #[test]
    fn test_phase_one_detects_infeasibility() {
        // x + y <= 2 and x + 2y >= 6 with x, y >= 0 cannot both hold.
        let objective = objective(&[1.0, 1.0]);
        let constraints = [
            constraint(&[(0, 1.0), (1, 1.0)], Relation::LessOrEqual, 2.0),
            constraint(&[(0, 1.0), (1, 2.0)], Relation::MoreOrEqual, 6.0),
        ];

        let (status, simplex) = solve(&objective, &constraints, Sense::Minimize);
        assert_eq!(status, Status::Infeasible);
        assert!(simplex.iterations() > 0);
    }

    #[test]
    fn test_maximize_with_surplus() {
        // max 3x + 2y s.t. x + y >= 2, x + 3y <= 6, x <= 4
        let objective = objective(&[3.0, 2.0]);
        let constraints = [
            constraint(&[(0, 1.0), (1, 1.0)], Relation::MoreOrEqual, 2.0),
            constraint(&[(0, 1.0), (1, 3.0)], Relation::LessOrEqual, 6.0),
            constraint(&[(0, 1.0)], Relation::LessOrEqual, 4.0),
        ];

        let (status, simplex) = solve(&objective, &constraints, Sense::Maximize);
        assert_eq!(status, Status::Optimal);
        let x = values(&simplex, 2);
        assert_abs_diff_eq!(x[..], [4.0, 2.0 / 3.0][..], epsilon = ATOL);
        assert_abs_diff_eq!(value(&objective, &x), 12.0 + 4.0 / 3.0, epsilon = ATOL);
    }

    #[test]
    fn test_beale_does_not_cycle() {
        // Beale (1955), the classic cycling example for the most-negative rule.
        let objective = objective(&[-0.75, 20.0, -0.5, 6.0]);
        let constraints = [
            constraint(
                &[(0, 0.25), (1, -8.0), (2, -1.0), (3, 9.0)],
                Relation::LessOrEqual,
                0.0,
            ),
            constraint(
                &[(0, 0.5), (1, -12.0), (2, -0.5), (3, 3.0)],
                Relation::LessOrEqual,
                0.0,
            ),
            constraint(&[(2, 1.0)], Relation::LessOrEqual, 1.0),
        ];

        let (status, simplex) = solve(&objective, &constraints, Sense::Minimize);
        assert_eq!(status, Status::Optimal);
        let x = values(&simplex, 4);
        assert_abs_diff_eq!(value(&objective, &x), -1.25, epsilon = ATOL);
        assert_abs_diff_eq!(x[..], [1.0, 0.0, 1.0, 0.0][..], epsilon = ATOL);
        assert!(simplex.iterations() < 100);
    }

    #[test]
    fn test_iteration_limit() {
        let objective = objective(&[-10.0, -12.0, -12.0]);
        let constraints = [
            constraint(&[(0, 1.0), (1, 2.0), (2, 2.0)], Relation::LessOrEqual, 20.0),
            constraint(&[(0, 2.0), (1, 1.0), (2, 2.0)], Relation::LessOrEqual, 20.0),
            constraint(&[(0, 2.0), (1, 2.0), (2, 1.0)], Relation::LessOrEqual, 20.0),
        ];
        let prepared = match preprocess(&constraints, &objective, &Tolerance::default()) {
            Preprocessed::Ready(prepared) => prepared,
            Preprocessed::Infeasible => unreachable!(),
        };
        let options = SolverOptions::default().with_max_iterations(Some(1));
        let mut simplex = Simplex::new(prepared, options);
        assert_eq!(
            simplex.run(&objective, Sense::Minimize),
            Err(Error::IterationLimit(1))
        );
    }
}
