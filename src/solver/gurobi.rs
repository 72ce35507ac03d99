use grb::prelude::*;
use log::{info, warn};

use super::{SolverConfig, SolverEngine, SolverOutput, Status};
use crate::models::program::{Model as Program, Sense, VarType};

pub const NAME: &str = "gurobi";

/// Commercial MILP solver, through `grb`. Needs a Gurobi installation and licence at runtime.
#[derive(Debug, Clone, Default)]
pub struct Gurobi {
    config: SolverConfig,
}

impl Gurobi {
    pub fn new(config: SolverConfig) -> Gurobi {
        Gurobi { config }
    }

    fn build(&self, program: &Program) -> grb::Result<(Model, Vec<Var>)> {
        let mut model = Model::new(program.name())?;
        model.set_param(param::OutputFlag, if self.config.verbose { 1 } else { 0 })?;
        if let Some(limit) = self.config.time_limit {
            model.set_param(param::TimeLimit, limit.as_secs_f64())?;
        }
        if let Some(gap) = self.config.mip_gap {
            model.set_param(param::MIPGap, gap)?;
        }
        if let Some(threads) = self.config.threads {
            model.set_param(param::Threads, threads as i32)?;
        }

        let mut vars = Vec::with_capacity(program.vars().len());
        for def in program.vars() {
            let vtype = match def.vtype {
                VarType::Binary => grb::VarType::Binary,
                VarType::Integer => grb::VarType::Integer,
                VarType::Continuous => grb::VarType::Continuous,
            };
            vars.push(model.add_var(
                &def.name,
                vtype,
                0.0,
                def.lower,
                def.upper,
                std::iter::empty(),
            )?);
        }

        // integrate all the variables into the model
        model.update()?;

        for constraint in program.constraints() {
            let comparison = &constraint.comparison;
            let lhs = comparison
                .terms
                .iter()
                .map(|(var, coef)| *coef * vars[var.index()])
                .grb_sum();
            let rhs = comparison.rhs;
            let constr = match comparison.sense {
                Sense::Less => c!(lhs <= rhs),
                Sense::Equal => c!(lhs == rhs),
                Sense::Greater => c!(lhs >= rhs),
            };
            model.add_constr(&constraint.name, constr)?;
        }

        let objective = program.objective();
        let expr = objective
            .terms()
            .into_iter()
            .map(|(var, coef)| coef * vars[var.index()])
            .grb_sum()
            + objective.constant();
        model.set_objective(expr, Minimize)?;
        model.update()?;

        Ok((model, vars))
    }

    fn try_solve(&self, program: &Program) -> grb::Result<SolverOutput> {
        let (mut model, vars) = self.build(program)?;
        model.optimize()?;

        let status = model.status()?;
        let incumbents = model.get_attr(attr::SolCount)?;

        let status = match status {
            grb::Status::Optimal => Status::Optimal,
            grb::Status::TimeLimit
            | grb::Status::NodeLimit
            | grb::Status::IterationLimit
            | grb::Status::SolutionLimit
            | grb::Status::Interrupted
            | grb::Status::SubOptimal
                if incumbents > 0 =>
            {
                Status::Feasible
            }
            grb::Status::Infeasible => Status::Infeasible,
            grb::Status::Unbounded | grb::Status::InfOrUnbd => Status::Unbounded,
            other => {
                return Ok(SolverOutput::failed(
                    Status::Error,
                    format!("gurobi stopped with status {:?}", other),
                ))
            }
        };

        if !matches!(status, Status::Optimal | Status::Feasible) {
            return Ok(SolverOutput::failed(status, format!("the model is {}", status)));
        }

        let mut values = Vec::with_capacity(vars.len());
        for var in &vars {
            values.push(model.get_obj_attr(attr::X, var)?);
        }

        Ok(SolverOutput::solved(program, status, values))
    }
}

impl SolverEngine for Gurobi {
    fn name(&self) -> &str {
        NAME
    }

    fn solve(&self, program: &Program) -> SolverOutput {
        info!(
            "Solving {} with {}: {} variables, {} constraints",
            program.name(),
            NAME,
            program.vars().len(),
            program.constraints().len()
        );

        match self.try_solve(program) {
            Ok(output) => {
                info!("{NAME} finished: {}", output.status);
                output
            }
            Err(err) => {
                warn!("{NAME} failed: {err}");
                SolverOutput::failed(Status::Error, err.to_string())
            }
        }
    }
}
