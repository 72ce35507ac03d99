//! The contract between a built [`Model`] and whatever MILP solver ends up solving it.

#[cfg(feature = "gurobi")]
pub mod gurobi;
pub mod microlp;

use std::time::Duration;

use derive_more::Display;

use crate::models::program::{Model, Var};

#[cfg(feature = "gurobi")]
pub use gurobi::Gurobi;
pub use microlp::MicroLp;

/// Terminal status of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Status {
    /// Proven optimal assignment
    #[display(fmt = "optimal")]
    Optimal,
    /// A limit was hit; the best assignment found so far is available
    #[display(fmt = "feasible")]
    Feasible,
    #[display(fmt = "infeasible")]
    Infeasible,
    #[display(fmt = "unbounded")]
    Unbounded,
    #[display(fmt = "error")]
    Error,
}

/// Solver settings. Engines that cannot honour a setting ignore it with a warning.
#[derive(Debug, Clone, Default)]
pub struct SolverConfig {
    pub time_limit: Option<Duration>,
    /// Relative MIP gap at which the search stops
    pub mip_gap: Option<f64>,
    pub threads: Option<usize>,
    /// Let the engine print its own progress output
    pub verbose: bool,
}

/// The immutable result of handing a [`Model`] to a [`SolverEngine`].
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutput {
    pub status: Status,
    /// Objective value of the assignment, when there is one
    pub objective: Option<f64>,
    /// One value per model variable, indexed by [`Var::index`]
    pub values: Option<Vec<f64>>,
    /// Diagnostic message from the engine
    pub message: Option<String>,
}

impl SolverOutput {
    /// An output carrying an assignment for `model`.
    pub fn solved(model: &Model, status: Status, values: Vec<f64>) -> SolverOutput {
        SolverOutput {
            status,
            objective: Some(model.objective().evaluate(&values)),
            values: Some(values),
            message: None,
        }
    }

    /// An output without any assignment.
    pub fn failed(status: Status, message: impl Into<String>) -> SolverOutput {
        SolverOutput {
            status,
            objective: None,
            values: None,
            message: Some(message.into()),
        }
    }

    /// True if the output holds an assignment that satisfies the model
    pub fn is_solved(&self) -> bool {
        matches!(self.status, Status::Optimal | Status::Feasible) && self.values.is_some()
    }

    pub fn is_optimal(&self) -> bool {
        self.status == Status::Optimal && self.values.is_some()
    }

    pub fn value(&self, var: Var) -> Option<f64> {
        self.values
            .as_ref()
            .and_then(|values| values.get(var.index()).copied())
    }
}

/// A (mixed integer) linear programming solver.
pub trait SolverEngine {
    fn name(&self) -> &str;

    /// Solves `model` to a terminal status. Blocks until the engine returns.
    fn solve(&self, model: &Model) -> SolverOutput;
}

impl<S: SolverEngine + ?Sized> SolverEngine for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn solve(&self, model: &Model) -> SolverOutput {
        (**self).solve(model)
    }
}

#[cfg(feature = "gurobi")]
const OPTIONAL_ENGINES: &[&str] = &[gurobi::NAME];
#[cfg(not(feature = "gurobi"))]
const OPTIONAL_ENGINES: &[&str] = &[];

/// Available engines, by name
pub fn engines() -> Vec<&'static str> {
    let mut names = vec![microlp::NAME];
    names.extend(OPTIONAL_ENGINES);
    names
}

/// Constructs the engine called `name`, if it is available in this build.
pub fn engine(name: &str, config: SolverConfig) -> Option<Box<dyn SolverEngine>> {
    match name {
        microlp::NAME => Some(Box::new(MicroLp::new(config))),
        #[cfg(feature = "gurobi")]
        gurobi::NAME => Some(Box::new(Gurobi::new(config))),
        _ => None,
    }
}
