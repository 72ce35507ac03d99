use derive_more::{Constructor, Display};
use itertools::iproduct;
use log::{debug, info, warn};

use super::sets_and_parameters::{Ids, Parameters, Sets};
use crate::models::program::{LinExpr, LinSum, Model, Var, VarType};
use crate::models::utils::AddVars;
use crate::problem::{ProblemError, RepairProblem};
use crate::solver::{SolverEngine, SolverOutput, Status};

/// Choices in how the model is formulated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelConfig {
    /// Adds `sum(x[p,r,t]) = 1` for every product. Without it, a product is only kept from
    /// being dropped by the horizon-length penalty in its lead time bound.
    pub require_shipment: bool,
}

#[derive(Debug, Clone, Constructor)]
pub struct Variables {
    /// 1 if product p ships to repairer r on day t, indexed `[p][r][t]`
    pub x: Vec<Vec<Vec<Var>>>,
    /// 1 if the batch of repairer r departs on day t, indexed `[r][t]`
    pub z: Vec<Vec<Var>>,
    /// basket level of repairer r at the end of day t, indexed `[r][t]`
    pub b: Vec<Vec<Var>>,
    /// products newly assigned to repairer r on day t, indexed `[r][t]`
    pub a: Vec<Vec<Var>>,
    /// 1 if product p is assigned to repairer r, indexed `[p][r]`
    pub u: Vec<Vec<Var>>,
    /// 1 if the k'th defect of product p is repaired by repairer r, indexed `[p][k][r]`
    pub u_dpr: Vec<Vec<Vec<Var>>>,
    /// the largest realized lead time
    pub l: Var,
}

#[derive(Debug, Clone, PartialEq, Display)]
pub enum SolveError {
    #[display(fmt = "no schedule satisfies the capacity and lead time constraints")]
    Infeasible,
    #[display(fmt = "the model is unbounded")]
    Unbounded,
    #[display(fmt = "the solver failed: {}", _0)]
    Engine(String),
}

impl std::error::Error for SolveError {}

/// A fully built repair batching model. Immutable once built.
#[derive(Debug, Clone)]
pub struct RepairMip {
    pub sets: Sets,
    pub ids: Ids,
    pub parameters: Parameters,
    pub config: ModelConfig,
    pub model: Model,
    pub vars: Variables,
}

#[allow(non_snake_case)]
impl RepairMip {
    /// Validates `problem` and builds the complete model in one pass.
    pub fn build(problem: &RepairProblem, config: ModelConfig) -> Result<RepairMip, ProblemError> {
        problem.validate()?;
        let (sets, ids) = Sets::new(problem)?;
        let parameters = Parameters::new(problem, &sets, &ids)?;
        let (model, vars) = Self::build_model(&sets, &parameters, config);

        Ok(RepairMip {
            sets,
            ids,
            parameters,
            config,
            model,
            vars,
        })
    }

    fn build_model(
        sets: &Sets,
        parameters: &Parameters,
        config: ModelConfig,
    ) -> (Model, Variables) {
        info!(
            "Building repair batching model for {} products, {} repairers and {} days",
            sets.P.len(),
            sets.R.len(),
            sets.T.len()
        );

        let mut model = Model::new("repair_mip");

        let R = &sets.R;
        let P = &sets.P;
        let T = &sets.T;
        let D_p = &sets.D_p;
        let par = parameters;

        //*************CREATE VARIABLES*************//

        let x = (P.len(), R.len(), T.len()).binary(&mut model, "x");
        let z = (R.len(), T.len()).binary(&mut model, "z");
        // neither the basket nor the arrivals of one day can exceed the number of products
        let count = 0.0..P.len() as f64;
        let b = (R.len(), T.len()).vars(&mut model, "b", VarType::Integer, &count);
        let a = (R.len(), T.len()).vars(&mut model, "a", VarType::Integer, &count);
        let u = (P.len(), R.len()).binary(&mut model, "u");

        // only defined for the defects that are present on each product
        let mut u_dpr: Vec<Vec<Vec<Var>>> = Vec::with_capacity(P.len());
        for p in P {
            let mut per_defect = Vec::with_capacity(D_p[*p].len());
            for d in &D_p[*p] {
                let per_repairer = R
                    .iter()
                    .map(|r| {
                        let name = format!("u_dpr_{}_{}_{}", **d, **p, **r);
                        model.add_var(&name, VarType::Binary, &(0.0..1.0))
                    })
                    .collect::<Vec<_>>();
                per_defect.push(per_repairer);
            }
            u_dpr.push(per_defect);
        }

        let l = 1usize.cont(&mut model, "l")[0];

        debug!(
            "Created {} variables, {} of them for defect repairs",
            model.vars().len(),
            sets.defect_assignments()
        );

        // ******************** ADD CONSTRAINTS ********************

        let shipped = |r: usize, t: usize| P.iter().map(|p| x[**p][r][t]).lin_sum();

        for (r, t) in iproduct!(R, T) {
            let (r, t) = (**r, **t);
            let cap = par.capacity[sets.R[r]];

            // the basket never exceeds the batch capacity
            model.add_constr(
                &format!("b_leq_beta_{r}_{t}"),
                LinExpr::from(b[r][t]).leq(cap),
            );

            // a full basket forces the batch to depart
            model.add_constr(
                &format!("b_z_link_{r}_{t}"),
                (b[r][t] - cap + 1.0).leq(z[r][t]),
            );

            // products only ship on a day the batch departs
            for p in P {
                model.add_constr(
                    &format!("x_z_link_{}_{r}_{t}", **p),
                    LinExpr::from(x[**p][r][t]).leq(z[r][t]),
                );
            }

            // a departing batch carries at least one product
            model.add_constr(
                &format!("z_x_link_{r}_{t}"),
                LinExpr::from(z[r][t]).leq(shipped(r, t)),
            );

            // basket balance, with an empty basket before the first day
            let previous = match t {
                0 => LinExpr::new(),
                _ => LinExpr::from(b[r][t - 1]),
            };
            let name = match t {
                0 => format!("b_update0_{r}_{t}"),
                _ => format!("b_update_{r}_{t}"),
            };
            model.add_constr(
                &name,
                LinExpr::from(b[r][t]).eq(previous.clone() + a[r][t] - shipped(r, t)),
            );

            // only what is in the basket, or arrives today, can ship
            model.add_constr(
                &format!("x_leq_ba_{r}_{t}"),
                shipped(r, t).leq(previous + a[r][t]),
            );

            // a batch holds at most the capacity
            model.add_constr(&format!("x_leq_beta_{r}_{t}"), shipped(r, t).leq(cap));
        }

        // every product enters a basket exactly once
        let arrivals = iproduct!(R, T).map(|(r, t)| a[**r][**t]).lin_sum();
        model.add_constr("a_sum", arrivals.eq(P.len() as f64));

        // each product is assigned to exactly one repairer
        for p in P {
            let lhs = R.iter().map(|r| u[**p][**r]).lin_sum();
            model.add_constr(&format!("assignment_{}", **p), lhs.eq(1.0));
        }

        // arrivals at a repairer match the products assigned to it
        for r in R {
            let lhs = T.iter().map(|t| a[**r][**t]).lin_sum();
            let rhs = P.iter().map(|p| u[**p][**r]).lin_sum();
            model.add_constr(&format!("a_u_link_{}", **r), lhs.eq(rhs));
        }

        for (p, r) in iproduct!(P, R) {
            let (p, r) = (**p, **r);

            // a product only ships to its assigned repairer
            let lhs = T.iter().map(|t| x[p][r][**t]).lin_sum();
            model.add_constr(&format!("x_u_link_{p}_{r}"), lhs.leq(u[p][r]));

            // all defects of a product are repaired by its repairer
            let defects = D_p[sets.P[p]].len();
            if defects > 0 {
                let lhs = (0..defects).map(|k| u_dpr[p][k][r]).lin_sum();
                model.add_constr(
                    &format!("u_dpr_link_{p}_{r}"),
                    lhs.eq(defects as f64 * u[p][r]),
                );
            }
        }

        // the realized lead time stays below tau. A product that never ships is charged one
        // day past the horizon as its shipping day.
        for p in P {
            let p_ = **p;
            let relative_lead_time = R
                .iter()
                .map(|r| (par.lead_time[*r] - par.lead_time_min) * u[p_][**r])
                .lin_sum();
            let ships = iproduct!(R, T).map(|(r, t)| x[p_][**r][**t]).lin_sum();
            let shipping_day = iproduct!(R, T)
                .map(|(r, t)| par.day[*t] * x[p_][**r][**t])
                .lin_sum();

            let lhs = LinExpr::from(par.stock_time[*p] + par.lead_time_min)
                + relative_lead_time
                + par.horizon * (LinExpr::from(1.0) - ships.clone())
                + shipping_day;
            model.add_constr(&format!("leadtime_max_{p_}"), lhs.leq(par.tau));

            if config.require_shipment {
                model.add_constr(&format!("shipped_{p_}"), ships.eq(1.0));
            }
        }

        // l bounds the realized lead time from above. Only the objective pushes it down.
        for (p, r) in iproduct!(P, R) {
            let rhs = T
                .iter()
                .map(|t| {
                    let lead_time = par.day[*t] + par.lead_time[*r] + par.stock_time[*p];
                    lead_time * x[**p][**r][**t]
                })
                .lin_sum();
            model.add_constr(
                &format!("leadtime_l_{}_{}", **p, **r),
                LinExpr::from(l).geq(rhs),
            );
        }

        // ******************** OBJECTIVE ********************

        let repairs = &u_dpr;
        let alpha = par.alpha;
        if alpha.lead_time == 0.0 {
            warn!(
                "The lead time weight is zero, so l may exceed the largest realized lead time"
            );
        }

        let batch_cost = iproduct!(R, T)
            .map(|(r, t)| {
                (alpha.shipping_cost * par.shipping_cost[*r] + alpha.emissions * par.emissions[*r])
                    * z[**r][**t]
            })
            .lin_sum();
        let repair_cost = P
            .iter()
            .flat_map(|p| {
                (0..D_p[*p].len()).flat_map(move |k| {
                    R.iter().map(move |r| {
                        let coef = alpha.quality_drop * par.quality_drop[*p][k][*r]
                            + alpha.repair_cost * par.repair_cost[*p][k][*r];
                        coef * repairs[**p][k][**r]
                    })
                })
            })
            .lin_sum();

        model.set_objective(alpha.lead_time * l + batch_cost + repair_cost);

        info!(
            "Successfully built repair batching model: {} variables, {} constraints",
            model.vars().len(),
            model.constraints().len()
        );

        (model, Variables::new(x, z, b, a, u, u_dpr, l))
    }

    /// Hands the model to `engine` and blocks until it returns.
    ///
    /// Returns the output only if it carries an assignment; a `Feasible` output is not proven optimal.
    pub fn solve<E: SolverEngine + ?Sized>(&self, engine: &E) -> Result<SolverOutput, SolveError> {
        info!("Solving {} with {}", self.model.name(), engine.name());
        let output = engine.solve(&self.model);

        match output.status {
            Status::Optimal | Status::Feasible => {
                let values = output.values.as_ref().map_or(0, |v| v.len());
                if values != self.model.vars().len() {
                    return Err(SolveError::Engine(format!(
                        "expected {} values, got {}",
                        self.model.vars().len(),
                        values
                    )));
                }
                if output.status == Status::Feasible {
                    warn!("The solver stopped early; the schedule is feasible but not proven optimal");
                }
                Ok(output)
            }
            Status::Infeasible => Err(SolveError::Infeasible),
            Status::Unbounded => Err(SolveError::Unbounded),
            Status::Error => Err(SolveError::Engine(
                output
                    .message
                    .unwrap_or_else(|| "unknown solver error".to_string()),
            )),
        }
    }
}
