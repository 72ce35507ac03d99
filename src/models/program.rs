//! A solver-agnostic mixed integer linear program.
//!
//! A [`Model`] is filled once by a builder and afterwards handed by reference to a
//! [`SolverEngine`](crate::solver::SolverEngine). Variables are plain handles into the model.
//!
//! The expression layer mirrors the one of `good_lp` so that one model translates to both the
//! `good_lp` and the `grb` backends.

use std::collections::BTreeMap;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Range, Sub};

use log::trace;

/// Handle of a variable in a [`Model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Var(usize);

impl Var {
    /// Position of the variable in the model, and in every value vector of a solved model.
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    Binary,
    Integer,
    Continuous,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDef {
    pub name: String,
    pub vtype: VarType,
    pub lower: f64,
    pub upper: f64,
}

/// A linear expression `sum(coef * var) + constant`.
#[derive(Debug, Clone, Default)]
pub struct LinExpr {
    terms: Vec<(Var, f64)>,
    constant: f64,
}

impl LinExpr {
    pub fn new() -> LinExpr {
        LinExpr::default()
    }

    pub fn add_term(&mut self, coef: f64, var: Var) -> &mut Self {
        self.terms.push((var, coef));
        self
    }

    pub fn add_constant(&mut self, constant: f64) -> &mut Self {
        self.constant += constant;
        self
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    /// The terms of the expression, merged per variable and ordered by variable. Zero coefficients are dropped.
    pub fn terms(&self) -> Vec<(Var, f64)> {
        let mut merged: BTreeMap<Var, f64> = BTreeMap::new();
        for (var, coef) in &self.terms {
            *merged.entry(*var).or_insert(0.0) += coef;
        }
        merged.into_iter().filter(|(_, c)| *c != 0.0).collect()
    }

    /// Evaluates the expression for a full assignment of variable values.
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(var, coef)| coef * values[var.index()])
            .sum::<f64>()
            + self.constant
    }

    pub fn leq(self, rhs: impl Into<LinExpr>) -> Comparison {
        Comparison::new(self, Sense::Less, rhs.into())
    }

    pub fn geq(self, rhs: impl Into<LinExpr>) -> Comparison {
        Comparison::new(self, Sense::Greater, rhs.into())
    }

    pub fn eq(self, rhs: impl Into<LinExpr>) -> Comparison {
        Comparison::new(self, Sense::Equal, rhs.into())
    }
}

impl From<Var> for LinExpr {
    fn from(var: Var) -> Self {
        LinExpr {
            terms: vec![(var, 1.0)],
            constant: 0.0,
        }
    }
}

impl From<&Var> for LinExpr {
    fn from(var: &Var) -> Self {
        LinExpr::from(*var)
    }
}

impl From<f64> for LinExpr {
    fn from(constant: f64) -> Self {
        LinExpr {
            terms: Vec::new(),
            constant,
        }
    }
}

impl<T: Into<LinExpr>> Add<T> for LinExpr {
    type Output = LinExpr;

    fn add(mut self, rhs: T) -> LinExpr {
        self += rhs;
        self
    }
}

impl<T: Into<LinExpr>> AddAssign<T> for LinExpr {
    fn add_assign(&mut self, rhs: T) {
        let rhs = rhs.into();
        self.terms.extend(rhs.terms);
        self.constant += rhs.constant;
    }
}

impl<T: Into<LinExpr>> Sub<T> for LinExpr {
    type Output = LinExpr;

    fn sub(self, rhs: T) -> LinExpr {
        let rhs: LinExpr = rhs.into();
        self + (-rhs)
    }
}

impl Neg for LinExpr {
    type Output = LinExpr;

    fn neg(self) -> LinExpr {
        -1.0 * self
    }
}

impl Mul<LinExpr> for f64 {
    type Output = LinExpr;

    fn mul(self, mut rhs: LinExpr) -> LinExpr {
        for (_, coef) in rhs.terms.iter_mut() {
            *coef *= self;
        }
        rhs.constant *= self;
        rhs
    }
}

impl Mul<Var> for f64 {
    type Output = LinExpr;

    fn mul(self, rhs: Var) -> LinExpr {
        LinExpr {
            terms: vec![(rhs, self)],
            constant: 0.0,
        }
    }
}

impl Mul<&Var> for f64 {
    type Output = LinExpr;

    fn mul(self, rhs: &Var) -> LinExpr {
        self * *rhs
    }
}

impl<T: Into<LinExpr>> Add<T> for Var {
    type Output = LinExpr;

    fn add(self, rhs: T) -> LinExpr {
        LinExpr::from(self) + rhs
    }
}

impl<T: Into<LinExpr>> Sub<T> for Var {
    type Output = LinExpr;

    fn sub(self, rhs: T) -> LinExpr {
        LinExpr::from(self) - rhs
    }
}

impl<T: Into<LinExpr>> Sum<T> for LinExpr {
    fn sum<I: Iterator<Item = T>>(iter: I) -> Self {
        let mut expr = LinExpr::new();
        for item in iter {
            expr += item;
        }
        expr
    }
}

/// Sum anything that can be turned into a linear expression
pub trait LinSum {
    fn lin_sum(self) -> LinExpr;
}

impl<I> LinSum for I
where
    I: Iterator,
    I::Item: Into<LinExpr>,
{
    fn lin_sum(self) -> LinExpr {
        self.sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Less,
    Equal,
    Greater,
}

impl fmt::Display for Sense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sense::Less => write!(f, "<="),
            Sense::Equal => write!(f, "=="),
            Sense::Greater => write!(f, ">="),
        }
    }
}

/// `lhs sense rhs`, normalized to variables on the left and a constant on the right.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub terms: Vec<(Var, f64)>,
    pub sense: Sense,
    pub rhs: f64,
}

impl Comparison {
    fn new(lhs: LinExpr, sense: Sense, rhs: LinExpr) -> Comparison {
        let expr = lhs - rhs;
        Comparison {
            terms: expr.terms(),
            sense,
            rhs: -expr.constant,
        }
    }

    /// Whether the comparison holds for `values`, up to `tolerance`.
    pub fn holds(&self, values: &[f64], tolerance: f64) -> bool {
        let lhs: f64 = self
            .terms
            .iter()
            .map(|(var, coef)| coef * values[var.index()])
            .sum();
        match self.sense {
            Sense::Less => lhs <= self.rhs + tolerance,
            Sense::Equal => (lhs - self.rhs).abs() <= tolerance,
            Sense::Greater => lhs >= self.rhs - tolerance,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub name: String,
    pub comparison: Comparison,
}

/// A minimization problem over binary, integer and continuous variables.
#[derive(Debug, Clone, Default)]
pub struct Model {
    name: String,
    vars: Vec<VarDef>,
    constraints: Vec<Constraint>,
    objective: LinExpr,
}

impl Model {
    pub fn new(name: &str) -> Model {
        Model {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_var(&mut self, name: &str, vtype: VarType, bounds: &Range<f64>) -> Var {
        let (lower, upper) = match vtype {
            VarType::Binary => (0.0, 1.0),
            _ => (bounds.start, bounds.end),
        };
        self.vars.push(VarDef {
            name: name.to_string(),
            vtype,
            lower,
            upper,
        });
        Var(self.vars.len() - 1)
    }

    pub fn add_constr(&mut self, name: &str, comparison: Comparison) {
        trace!(
            "{}: {} terms {} {}",
            name,
            comparison.terms.len(),
            comparison.sense,
            comparison.rhs
        );
        self.constraints.push(Constraint {
            name: name.to_string(),
            comparison,
        });
    }

    pub fn set_objective(&mut self, objective: impl Into<LinExpr>) {
        self.objective = objective.into();
    }

    pub fn vars(&self) -> &[VarDef] {
        &self.vars
    }

    pub fn var(&self, var: Var) -> &VarDef {
        &self.vars[var.index()]
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Looks up a constraint by name
    pub fn constraint(&self, name: &str) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.name == name)
    }

    /// The objective, which is always minimized
    pub fn objective(&self) -> &LinExpr {
        &self.objective
    }

    /// Names of the constraints violated by `values`, including variable bounds and integrality.
    pub fn violations(&self, values: &[f64], tolerance: f64) -> Vec<String> {
        let mut violated = Vec::new();
        for (def, value) in self.vars.iter().zip(values) {
            let integral = def.vtype == VarType::Continuous
                || (value - value.round()).abs() <= tolerance;
            if !integral || *value < def.lower - tolerance || *value > def.upper + tolerance {
                violated.push(def.name.clone());
            }
        }
        for constraint in &self.constraints {
            if !constraint.comparison.holds(values, tolerance) {
                violated.push(constraint.name.clone());
            }
        }
        violated
    }
}
