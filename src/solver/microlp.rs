use good_lp::{
    constraint, microlp, variable, Expression, ProblemVariables, ResolutionError, Solution,
    SolverModel, Variable,
};
use log::{debug, info, warn};

use super::{SolverConfig, SolverEngine, SolverOutput, Status};
use crate::models::program::{Model, Sense, Var, VarType};

pub const NAME: &str = "microlp";

/// Pure Rust branch and bound solver, through `good_lp`.
///
/// Has no time or gap limits, so it either proves optimality or fails.
#[derive(Debug, Clone, Default)]
pub struct MicroLp {
    config: SolverConfig,
}

impl MicroLp {
    pub fn new(config: SolverConfig) -> MicroLp {
        if config.time_limit.is_some() || config.mip_gap.is_some() || config.threads.is_some() {
            warn!("{NAME} ignores time limits, gap limits and thread counts");
        }
        MicroLp { config }
    }

    fn expression(vars: &[Variable], terms: &[(Var, f64)]) -> Expression {
        let mut expr = Expression::from(0.0);
        for (var, coef) in terms {
            expr += *coef * vars[var.index()];
        }
        expr
    }
}

impl SolverEngine for MicroLp {
    fn name(&self) -> &str {
        NAME
    }

    fn solve(&self, model: &Model) -> SolverOutput {
        info!(
            "Solving {} with {}: {} variables, {} constraints",
            model.name(),
            NAME,
            model.vars().len(),
            model.constraints().len()
        );

        let mut problem = ProblemVariables::new();
        let vars: Vec<Variable> = model
            .vars()
            .iter()
            .map(|def| {
                let definition = match def.vtype {
                    VarType::Binary => variable().binary(),
                    VarType::Integer => variable().integer().min(def.lower).max(def.upper),
                    VarType::Continuous => variable().min(def.lower).max(def.upper),
                };
                problem.add(definition.name(def.name.clone()))
            })
            .collect();

        let objective = Self::expression(&vars, &model.objective().terms());
        let mut solver = problem.minimise(objective).using(microlp);
        for c in model.constraints() {
            let lhs = Self::expression(&vars, &c.comparison.terms);
            let rhs = Expression::from(c.comparison.rhs);
            solver.add_constraint(match c.comparison.sense {
                Sense::Less => constraint::leq(lhs, rhs),
                Sense::Equal => constraint::eq(lhs, rhs),
                Sense::Greater => constraint::geq(lhs, rhs),
            });
        }

        if self.config.verbose {
            debug!("{NAME} has no progress output of its own");
        }

        match solver.solve() {
            Ok(solution) => {
                let values = vars.iter().map(|v| solution.value(*v)).collect();
                let output = SolverOutput::solved(model, Status::Optimal, values);
                info!("{NAME} finished: optimal, objective = {:?}", output.objective);
                output
            }
            Err(ResolutionError::Infeasible) => {
                info!("{NAME} finished: infeasible");
                SolverOutput::failed(Status::Infeasible, "the model is infeasible")
            }
            Err(ResolutionError::Unbounded) => {
                info!("{NAME} finished: unbounded");
                SolverOutput::failed(Status::Unbounded, "the model is unbounded")
            }
            Err(err) => {
                warn!("{NAME} failed: {err}");
                SolverOutput::failed(Status::Error, err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::program::LinExpr;

    #[test]
    fn solves_a_small_integer_program() {
        // min x + 2y  s.t.  x + y >= 3.5, x <= 2, x integer, y continuous
        let mut model = Model::new("small");
        let x = model.add_var("x", VarType::Integer, &(0.0..f64::INFINITY));
        let y = model.add_var("y", VarType::Continuous, &(0.0..f64::INFINITY));
        model.add_constr("cover", (x + y).geq(3.5));
        model.add_constr("cap", LinExpr::from(x).leq(2.0));
        model.set_objective(x + 2.0 * y);

        let output = MicroLp::default().solve(&model);
        assert_eq!(output.status, Status::Optimal);
        assert!((output.value(x).unwrap() - 2.0).abs() < 1e-6);
        assert!((output.value(y).unwrap() - 1.5).abs() < 1e-6);
        assert!((output.objective.unwrap() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn reports_infeasibility() {
        let mut model = Model::new("infeasible");
        let x = model.add_var("x", VarType::Binary, &(0.0..1.0));
        model.add_constr("impossible", LinExpr::from(x).geq(2.0));
        model.set_objective(x);

        let output = MicroLp::default().solve(&model);
        assert_eq!(output.status, Status::Infeasible);
        assert!(!output.is_solved());
    }
}
