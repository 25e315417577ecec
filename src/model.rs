use crate::tolerance::Tolerance;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque handle to a [`Variable`] owned by a [`Problem`](crate::Problem).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VariableId(pub(crate) usize);

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConstraintId(pub(crate) usize);

/// One non-negative unknown of the linear system.
#[derive(Clone, Debug, Default)]
pub struct Variable {
    pub(crate) result: f64,
    /// Position in the order variables were first mentioned by a constraint
    /// or the objective.
    pub(crate) index: Option<usize>,
}

impl Variable {
    pub fn result(&self) -> f64 {
        self.result
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relation {
    LessOrEqual,
    Equal,
    MoreOrEqual,
}

impl Relation {
    fn flipped(self) -> Self {
        match self {
            Relation::LessOrEqual => Relation::MoreOrEqual,
            Relation::Equal => Relation::Equal,
            Relation::MoreOrEqual => Relation::LessOrEqual,
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::LessOrEqual => write!(f, "<="),
            Relation::Equal => write!(f, "="),
            Relation::MoreOrEqual => write!(f, ">="),
        }
    }
}

/// The slack or surplus column a constraint row owns in the tableau,
/// together with its coefficient (`+1` slack, `-1` surplus).
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Helper {
    pub(crate) column: usize,
    pub(crate) coefficient: f64,
}

/// `Σ terms[v]·v  relation  constant`
#[derive(Clone, Debug)]
pub struct Constraint {
    pub(crate) terms: BTreeMap<VariableId, f64>,
    pub(crate) constant: f64,
    pub(crate) relation: Relation,
    pub(crate) slack_or_surplus: Option<Helper>,
    pub(crate) artificial: Option<usize>,
}

impl Constraint {
    pub(crate) fn new(terms: BTreeMap<VariableId, f64>, relation: Relation, constant: f64) -> Self {
        Self {
            terms,
            constant,
            relation,
            slack_or_surplus: None,
            artificial: None,
        }
    }

    pub fn terms(&self) -> impl Iterator<Item = (VariableId, f64)> + '_ {
        self.terms.iter().map(|(&id, &coef)| (id, coef))
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    pub fn relation(&self) -> Relation {
        self.relation
    }

    pub(crate) fn coef(&self, id: VariableId) -> f64 {
        self.terms.get(&id).cloned().unwrap_or(0.0)
    }

    /// Multiply both sides by `-1`.
    pub(crate) fn invert(&mut self) {
        self.terms.values_mut().for_each(|coef| *coef = -*coef);
        self.constant = -self.constant;
        self.relation = self.relation.flipped();
    }

    /// Multiply both sides by `factor`, flipping the relation when negative.
    pub(crate) fn scale(&mut self, factor: f64) {
        assert!(factor != 0.0 && factor.is_finite());
        self.terms.values_mut().for_each(|coef| *coef *= factor);
        self.constant *= factor;
        if factor < 0.0 {
            self.relation = self.relation.flipped();
        }
    }

    pub(crate) fn lhs(&self, variables: &[Variable]) -> f64 {
        self.terms
            .iter()
            .map(|(id, coef)| coef * variables[id.0].result)
            .sum()
    }

    /// Check the relation for the current variable results.
    pub fn is_satisfied(&self, variables: &[Variable]) -> bool {
        self.holds_for(self.lhs(variables), &Tolerance::default())
    }

    pub(crate) fn holds_for(&self, lhs: f64, tol: &Tolerance) -> bool {
        if tol.nearly_eq(lhs, self.constant) {
            return true;
        }
        match self.relation {
            Relation::LessOrEqual => lhs < self.constant,
            Relation::Equal => false,
            Relation::MoreOrEqual => lhs > self.constant,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            write!(f, "0")?;
        }
        for (i, (id, coef)) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            write!(f, "{}*{}", coef, id)?;
        }
        write!(f, " {} {}", self.relation, self.constant)
    }
}
