use std::collections::BTreeMap;

use derive_more::Display;
use float_ord::FloatOrd;
use itertools::iproduct;
use log::{trace, warn};
use serde::Serialize;

use super::model::RepairMip;
use crate::models::utils::{integral, is_set, ConvertVars};
use crate::problem::{Cost, Day, Duration, ProductId, RepairerId};
use crate::solver::SolverOutput;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ExtractError {
    #[display(fmt = "the model has not been solved")]
    NotSolved,
}

impl std::error::Error for ExtractError {}

/// Where and when a product is repaired, and what it costs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRecord {
    pub product_id: ProductId,
    pub repairer_id: RepairerId,
    /// `None` if the product never ships
    pub shipping_day: Option<Day>,
    pub repair_cost: Cost,
    pub quality_drop: f64,
    /// The full emissions of one batch of the repairer
    pub emissions: f64,
    pub lead_time: Option<Duration>,
    pub time_in_stock: Duration,
}

/// One departing batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchRecord {
    pub repairer_id: RepairerId,
    pub shipping_day: Day,
    pub batch_size: usize,
    pub products: Vec<ProductId>,
    pub shipping_cost: Cost,
    pub emissions: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BasketStatus {
    pub accumulated: i64,
    pub newly_assigned: i64,
}

/// Read-only views of a solved assignment.
pub struct Extractor<'a> {
    mip: &'a RepairMip,
    output: &'a SolverOutput,
}

impl<'a> Extractor<'a> {
    pub fn new(mip: &'a RepairMip, output: &'a SolverOutput) -> Extractor<'a> {
        Extractor { mip, output }
    }

    pub fn is_optimal(&self) -> bool {
        self.output.is_optimal()
    }

    fn convert<C: ConvertVars>(&self, vars: &C) -> Result<C::Out, ExtractError> {
        if !self.output.is_solved() {
            return Err(ExtractError::NotSolved);
        }
        vars.convert(self.output).ok_or(ExtractError::NotSolved)
    }

    /// One record per assigned product, in product order.
    pub fn product_schedule(&self) -> Result<Vec<ProductRecord>, ExtractError> {
        let mip = self.mip;
        let (sets, ids, par) = (&mip.sets, &mip.ids, &mip.parameters);
        let u = self.convert(&mip.vars.u)?;
        let x = self.convert(&mip.vars.x)?;
        let u_dpr = self.convert(&mip.vars.u_dpr)?;

        let mut schedule = Vec::with_capacity(sets.P.len());
        for p in &sets.P {
            let product = ids.product[*p];
            let r = match sets.R.iter().find(|r| is_set(u[**p][***r])) {
                Some(r) => *r,
                None => {
                    warn!("Product {} is not assigned to any repairer", product);
                    continue;
                }
            };

            let shipping_day = sets
                .T
                .iter()
                .find(|t| is_set(x[**p][*r][***t]))
                .map(|t| ids.day[*t]);

            let mut repair_cost = 0.0;
            let mut quality_drop = 0.0;
            for k in 0..sets.D_p[*p].len() {
                if is_set(u_dpr[**p][k][*r]) {
                    repair_cost += par.repair_cost[*p][k][r];
                    quality_drop += par.quality_drop[*p][k][r];
                }
            }

            let lead_time =
                shipping_day.map(|day| day as f64 + par.lead_time[r] + par.stock_time[*p]);

            schedule.push(ProductRecord {
                product_id: product,
                repairer_id: ids.repairer[r],
                shipping_day,
                repair_cost,
                quality_drop,
                emissions: par.emissions[r],
                lead_time,
                time_in_stock: par.stock_time[*p],
            });
        }

        trace!("Extracted {} product records", schedule.len());
        Ok(schedule)
    }

    /// One record per departing batch, ordered by repairer and then by day.
    pub fn batch_schedule(&self) -> Result<Vec<BatchRecord>, ExtractError> {
        let mip = self.mip;
        let (sets, ids, par) = (&mip.sets, &mip.ids, &mip.parameters);
        let z = self.convert(&mip.vars.z)?;
        let x = self.convert(&mip.vars.x)?;

        let batches = iproduct!(&sets.R, &sets.T)
            .filter(|(r, t)| is_set(z[***r][***t]))
            .map(|(r, t)| {
                let products = sets
                    .P
                    .iter()
                    .filter(|p| is_set(x[***p][**r][**t]))
                    .map(|p| ids.product[*p])
                    .collect::<Vec<_>>();

                BatchRecord {
                    repairer_id: ids.repairer[*r],
                    shipping_day: ids.day[*t],
                    batch_size: products.len(),
                    products,
                    shipping_cost: par.shipping_cost[*r],
                    emissions: par.emissions[*r],
                }
            })
            .collect::<Vec<_>>();

        trace!("Extracted {} batches", batches.len());
        Ok(batches)
    }

    /// Basket level and arrivals of every repairer on every day.
    pub fn daily_basket_status(
        &self,
    ) -> Result<BTreeMap<(RepairerId, Day), BasketStatus>, ExtractError> {
        let mip = self.mip;
        let (sets, ids) = (&mip.sets, &mip.ids);
        let b = self.convert(&mip.vars.b)?;
        let a = self.convert(&mip.vars.a)?;

        Ok(iproduct!(&sets.R, &sets.T)
            .map(|(r, t)| {
                let status = BasketStatus {
                    accumulated: integral(b[**r][**t]),
                    newly_assigned: integral(a[**r][**t]),
                };
                ((ids.repairer[*r], ids.day[*t]), status)
            })
            .collect())
    }
}

/// Objective terms of a schedule, unweighted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ObjectiveBreakdown {
    /// The largest realized lead time
    pub lead_time: f64,
    pub shipping_cost: f64,
    pub quality_drop: f64,
    pub repair_cost: f64,
    pub emissions: f64,
}

impl ObjectiveBreakdown {
    pub fn new(products: &[ProductRecord], batches: &[BatchRecord]) -> ObjectiveBreakdown {
        ObjectiveBreakdown {
            lead_time: products
                .iter()
                .filter_map(|p| p.lead_time.map(FloatOrd))
                .max()
                .map_or(0.0, |l| l.0),
            shipping_cost: batches.iter().map(|b| b.shipping_cost).sum(),
            quality_drop: products.iter().map(|p| p.quality_drop).sum(),
            repair_cost: products.iter().map(|p| p.repair_cost).sum(),
            emissions: batches.iter().map(|b| b.emissions).sum(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BasketRecord {
    pub repairer_id: RepairerId,
    pub day: Day,
    #[serde(flatten)]
    pub status: BasketStatus,
}

/// Everything a reporting consumer needs from one solve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// False if the solver stopped at a limit before proving optimality
    pub optimal: bool,
    pub objective: f64,
    pub breakdown: ObjectiveBreakdown,
    pub products: Vec<ProductRecord>,
    pub batches: Vec<BatchRecord>,
    pub baskets: Vec<BasketRecord>,
}

impl Report {
    pub fn new(extractor: &Extractor) -> Result<Report, ExtractError> {
        let products = extractor.product_schedule()?;
        let batches = extractor.batch_schedule()?;
        let baskets = extractor
            .daily_basket_status()?
            .into_iter()
            .map(|((repairer_id, day), status)| BasketRecord {
                repairer_id,
                day,
                status,
            })
            .collect();

        Ok(Report {
            optimal: extractor.is_optimal(),
            objective: extractor.output.objective.ok_or(ExtractError::NotSolved)?,
            breakdown: ObjectiveBreakdown::new(&products, &batches),
            products,
            batches,
            baskets,
        })
    }
}
