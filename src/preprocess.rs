use crate::model::{Constraint, Relation, VariableId};
use crate::tolerance::Tolerance;
use log::{debug, trace};
use std::collections::{BTreeMap, HashSet};

/// Constraints in a form the simplex engine can tabulate.
pub(crate) struct Prepared {
    /// Normalized rows; every constant is non-negative.
    pub(crate) constraints: Vec<Constraint>,
    /// Structural variable of each tableau column.
    pub(crate) columns: Vec<VariableId>,
    /// Variables fixed by single-variable equalities and removed from the rows.
    pub(crate) pinned: BTreeMap<VariableId, f64>,
}

pub(crate) enum Preprocessed {
    Ready(Prepared),
    /// A contradiction was found without building a tableau.
    Infeasible,
}

/// Accomplishes three main objectives:
///
/// 1. Normalize every constraint so its constant is non-negative.
/// 2. Substitute variables pinned by `a*x = c` into the other constraints,
///    dropping rows that become empty.
/// 3. Merge constraints that are scalar multiples of one another.
///
/// Any trivially contradictory input is reported as infeasible.
pub(crate) fn preprocess(
    constraints: &[Constraint],
    objective: &Constraint,
    tol: &Tolerance,
) -> Preprocessed {
    let mut constraints = constraints.to_vec();
    constraints.iter_mut().for_each(|c| normalize(c, tol));

    let pinned = match substitute_pinned(&mut constraints, tol) {
        Some(pinned) => pinned,
        None => return Preprocessed::Infeasible,
    };
    let constraints = match merge_parallel(constraints, tol) {
        Some(constraints) => constraints,
        None => return Preprocessed::Infeasible,
    };

    let mut seen = HashSet::new();
    let columns = constraints
        .iter()
        .flat_map(|c| c.terms.keys())
        .chain(objective.terms.keys())
        .filter(|id| !pinned.contains_key(*id))
        .filter(|&&id| seen.insert(id))
        .cloned()
        .collect::<Vec<_>>();

    debug!(
        "preprocessed into {} rows over {} columns, {} variables pinned",
        constraints.len(),
        columns.len(),
        pinned.len()
    );
    Preprocessed::Ready(Prepared {
        constraints,
        columns,
        pinned,
    })
}

fn normalize(c: &mut Constraint, tol: &Tolerance) {
    c.terms.retain(|_, coef| !tol.nearly_zero(*coef));
    if c.constant < 0.0 {
        c.invert();
    }
}

/// Returns `None` if substitution exposes a contradiction.
fn substitute_pinned(
    constraints: &mut Vec<Constraint>,
    tol: &Tolerance,
) -> Option<BTreeMap<VariableId, f64>> {
    let mut pinned = BTreeMap::new();
    let mut modified = true;

    while modified {
        modified = false;
        let mut i = 0;
        while i < constraints.len() {
            let c = &mut constraints[i];
            modified |= substitute(c, &pinned);
            normalize(c, tol);

            let single = match (c.relation, c.terms.len()) {
                (Relation::Equal, 1) => c.terms.iter().next().map(|(&id, &coef)| (id, coef)),
                _ => None,
            };
            if let Some((id, coef)) = single {
                let value = c.constant / coef;
                if tol.is_negative(value) {
                    debug!("{} pinned to negative value {}", id, value);
                    return None;
                }
                trace!("pinning {} = {}", id, value);
                pinned.insert(id, value.max(0.0));
                substitute(c, &pinned);
                modified = true;
            }

            if c.terms.is_empty() {
                if !c.holds_for(0.0, tol) {
                    debug!("constraint reduced to contradiction: {}", c);
                    return None;
                }
                constraints.remove(i);
            } else {
                i += 1;
            }
        }
    }
    Some(pinned)
}

fn substitute(c: &mut Constraint, pinned: &BTreeMap<VariableId, f64>) -> bool {
    let mut modified = false;
    for (id, value) in pinned {
        if let Some(coef) = c.terms.remove(id) {
            c.constant -= coef * value;
            modified = true;
        }
    }
    modified
}

/// All parallel constraints over one direction, collapsed to the interval
/// `lower <= terms <= upper`.
struct Band {
    canonical: Constraint,
    lower: Option<f64>,
    upper: Option<f64>,
    first: Constraint,
    sources: usize,
}

impl Band {
    fn new(c: Constraint, canonical: Constraint) -> Self {
        let mut band = Self {
            canonical,
            lower: None,
            upper: None,
            first: c,
            sources: 0,
        };
        band.absorb_bounds();
        band
    }

    fn is_parallel(&self, other: &Constraint, tol: &Tolerance) -> bool {
        self.canonical.terms.len() == other.terms.len()
            && self
                .canonical
                .terms
                .iter()
                .zip(&other.terms)
                .all(|((a, x), (b, y))| a == b && tol.nearly_eq(*x, *y))
    }

    fn absorb(&mut self, canonical: Constraint) {
        self.canonical.relation = canonical.relation;
        self.canonical.constant = canonical.constant;
        self.absorb_bounds();
    }

    fn absorb_bounds(&mut self) {
        let k = self.canonical.constant;
        if self.canonical.relation != Relation::MoreOrEqual {
            self.upper = Some(self.upper.map_or(k, |u| u.min(k)));
        }
        if self.canonical.relation != Relation::LessOrEqual {
            self.lower = Some(self.lower.map_or(k, |l| l.max(k)));
        }
        self.sources += 1;
    }

    /// Returns `None` if the interval is empty.
    fn into_constraints(self, tol: &Tolerance) -> Option<Vec<Constraint>> {
        if self.sources == 1 {
            return Some(vec![self.first]);
        }
        let make = |relation, constant| {
            let mut c = Constraint::new(self.canonical.terms.clone(), relation, constant);
            normalize(&mut c, tol);
            c
        };
        match (self.lower, self.upper) {
            (Some(l), Some(u)) if !tol.nearly_le(l, u) => None,
            (Some(l), Some(u)) if tol.nearly_eq(l, u) => Some(vec![make(Relation::Equal, u)]),
            (lower, upper) => Some(
                upper
                    .map(|u| make(Relation::LessOrEqual, u))
                    .into_iter()
                    .chain(lower.map(|l| make(Relation::MoreOrEqual, l)))
                    .collect(),
            ),
        }
    }
}

/// Scale so the coefficient of the first variable is exactly one.
fn canonicalize(c: &Constraint) -> Constraint {
    let mut canonical = c.clone();
    if let Some(&first) = c.terms.values().next() {
        canonical.scale(1.0 / first);
        if let Some(coef) = canonical.terms.values_mut().next() {
            *coef = 1.0;
        }
    }
    canonical
}

/// Returns `None` if two parallel constraints contradict each other.
fn merge_parallel(constraints: Vec<Constraint>, tol: &Tolerance) -> Option<Vec<Constraint>> {
    let mut bands: Vec<Band> = Vec::with_capacity(constraints.len());
    for c in constraints {
        let canonical = canonicalize(&c);
        match bands.iter_mut().find(|b| b.is_parallel(&canonical, tol)) {
            Some(band) => {
                trace!("merging parallel constraint {}", c);
                band.absorb(canonical)
            }
            None => bands.push(Band::new(c, canonical)),
        }
    }

    let mut merged = Vec::with_capacity(bands.len());
    for band in bands {
        match band.into_constraints(tol) {
            Some(cs) => merged.extend(cs),
            None => {
                debug!("parallel constraints admit no common solution");
                return None;
            }
        }
    }
    Some(merged)
}
