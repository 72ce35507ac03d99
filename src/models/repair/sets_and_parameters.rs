use std::collections::{BTreeMap, HashMap};

use derive_more::{Deref, From, Into};
use float_ord::FloatOrd;
use typed_index_collections::TiVec;

use crate::problem::{
    Day, DefectId, ProblemError, ProductId, RepairProblem, RepairerId, Weights,
};

#[derive(Deref, Debug, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash)]
pub struct RepairerIndex(usize);

#[derive(Deref, Debug, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash)]
pub struct DefectIndex(usize);

#[derive(Deref, Debug, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash)]
pub struct ProductIndex(usize);

#[derive(Deref, Debug, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash)]
pub struct TimeIndex(usize);

/// sets of the repair batching model, by position
#[derive(Debug, Clone)]
#[allow(non_snake_case)]
pub struct Sets {
    /// Set of repairers
    pub R: Vec<RepairerIndex>,
    /// Set of defect types
    pub D: Vec<DefectIndex>,
    /// Set of products
    pub P: Vec<ProductIndex>,
    /// Set of days in the planning horizon
    pub T: Vec<TimeIndex>,
    /// Defects present on each product, ordered by defect position
    pub D_p: TiVec<ProductIndex, Vec<DefectIndex>>,
}

/// Translation from positions back to the ids of the problem
#[derive(Debug, Clone)]
pub struct Ids {
    pub repairer: TiVec<RepairerIndex, RepairerId>,
    pub defect: TiVec<DefectIndex, DefectId>,
    pub product: TiVec<ProductIndex, ProductId>,
    pub day: TiVec<TimeIndex, Day>,
}

/// parameters of the repair batching model
#[derive(Debug, Clone)]
#[allow(non_snake_case)]
pub struct Parameters {
    /// Batch capacity of each repairer
    pub capacity: TiVec<RepairerIndex, f64>,
    /// Transit and repair time of each repairer
    pub lead_time: TiVec<RepairerIndex, f64>,
    /// The lead time of the fastest repairer
    pub lead_time_min: f64,
    /// Shipping cost of one batch
    pub shipping_cost: TiVec<RepairerIndex, f64>,
    /// Emissions of one batch
    pub emissions: TiVec<RepairerIndex, f64>,
    /// Days spent in stock before the horizon
    pub stock_time: TiVec<ProductIndex, f64>,
    /// Quality drop of the k'th defect of product p at repairer r, indexed `[p][k][r]`
    pub quality_drop: TiVec<ProductIndex, Vec<TiVec<RepairerIndex, f64>>>,
    /// Repair cost of the k'th defect of product p at repairer r, indexed `[p][k][r]`
    pub repair_cost: TiVec<ProductIndex, Vec<TiVec<RepairerIndex, f64>>>,
    /// The day number of each period, as it enters the lead time
    pub day: TiVec<TimeIndex, f64>,
    /// One past the last day number, the lead time penalty of a product that is never shipped
    pub horizon: f64,
    /// Maximum lead time
    pub tau: f64,
    /// Objective weights
    pub alpha: Weights,
}

#[allow(non_snake_case)]
impl Sets {
    pub fn new(problem: &RepairProblem) -> Result<(Sets, Ids), ProblemError> {
        macro_rules! set {
            ($type:ident, $n:expr) => {
                (0..$n).map($type).collect::<Vec<_>>()
            };
        }

        let ids = Ids {
            repairer: problem.repairers.iter().copied().collect(),
            defect: problem.defects.iter().copied().collect(),
            product: problem.products.iter().copied().collect(),
            day: problem.days.iter().copied().collect(),
        };

        let defect_position: HashMap<DefectId, DefectIndex> = ids
            .defect
            .iter_enumerated()
            .map(|(k, d)| (*d, k))
            .collect();

        let D_p = ids
            .product
            .iter()
            .map(|&p| {
                let mut defects = problem
                    .defects_of(p)
                    .map(|d| {
                        defect_position
                            .get(&d)
                            .copied()
                            .ok_or(ProblemError::UnknownDefect {
                                product: p,
                                defect: d,
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                defects.sort();
                Ok::<_, ProblemError>(defects)
            })
            .collect::<Result<TiVec<ProductIndex, _>, ProblemError>>()?;

        let sets = Sets {
            R: set!(RepairerIndex, ids.repairer.len()),
            D: set!(DefectIndex, ids.defect.len()),
            P: set!(ProductIndex, ids.product.len()),
            T: set!(TimeIndex, ids.day.len()),
            D_p,
        };

        Ok((sets, ids))
    }

    /// Number of (defect, product, repairer) triples that get an assignment variable
    pub fn defect_assignments(&self) -> usize {
        self.D_p.iter().map(|defects| defects.len()).sum::<usize>() * self.R.len()
    }
}

#[allow(non_snake_case)]
impl Parameters {
    pub fn new(problem: &RepairProblem, sets: &Sets, ids: &Ids) -> Result<Parameters, ProblemError> {
        let per_repairer = |parameter: &'static str, table: &BTreeMap<RepairerId, f64>| {
            ids.repairer
                .iter()
                .map(|r| {
                    table
                        .get(r)
                        .copied()
                        .ok_or(ProblemError::MissingRepairerParameter {
                            parameter,
                            repairer: *r,
                        })
                })
                .collect::<Result<TiVec<RepairerIndex, f64>, _>>()
        };

        let capacity = ids
            .repairer
            .iter()
            .map(|r| {
                problem
                    .capacity
                    .get(r)
                    .map(|c| *c as f64)
                    .ok_or(ProblemError::MissingRepairerParameter {
                        parameter: "capacity",
                        repairer: *r,
                    })
            })
            .collect::<Result<TiVec<RepairerIndex, f64>, _>>()?;
        let lead_time = per_repairer("lead time", &problem.lead_time)?;
        let shipping_cost = per_repairer("shipping cost", &problem.shipping_cost)?;
        let emissions = per_repairer("emissions", &problem.emissions)?;

        let lead_time_min = lead_time
            .iter()
            .map(|l| FloatOrd(*l))
            .min()
            .map(|l| l.0)
            .ok_or(ProblemError::NoRepairers)?;

        let stock_time = ids
            .product
            .iter()
            .map(|p| {
                problem
                    .stock_time
                    .get(p)
                    .copied()
                    .ok_or(ProblemError::MissingStockTime(*p))
            })
            .collect::<Result<TiVec<ProductIndex, f64>, _>>()?;

        let costs = problem.defect_cost_table();
        let mut quality_drop: TiVec<ProductIndex, Vec<TiVec<RepairerIndex, f64>>> = TiVec::new();
        let mut repair_cost: TiVec<ProductIndex, Vec<TiVec<RepairerIndex, f64>>> = TiVec::new();
        for p in &sets.P {
            let product = ids.product[*p];
            let mut drops = Vec::with_capacity(sets.D_p[*p].len());
            let mut repairs = Vec::with_capacity(sets.D_p[*p].len());
            for d in &sets.D_p[*p] {
                let defect = ids.defect[*d];
                let mut drop_r = TiVec::with_capacity(sets.R.len());
                let mut repair_r = TiVec::with_capacity(sets.R.len());
                for r in &sets.R {
                    let repairer = ids.repairer[*r];
                    let cost = costs.get(&(defect, product, repairer)).ok_or(
                        ProblemError::MissingDefectCost {
                            defect,
                            product,
                            repairer,
                        },
                    )?;
                    drop_r.push(cost.quality_drop);
                    repair_r.push(cost.repair_cost);
                }
                drops.push(drop_r);
                repairs.push(repair_r);
            }
            quality_drop.push(drops);
            repair_cost.push(repairs);
        }

        Ok(Parameters {
            capacity,
            lead_time,
            lead_time_min,
            shipping_cost,
            emissions,
            stock_time,
            quality_drop,
            repair_cost,
            day: ids.day.iter().map(|&t| t as f64).collect(),
            horizon: ids.day.last().map_or(0.0, |&t| t as f64 + 1.0),
            tau: problem.tau,
            alpha: problem.weights,
        })
    }
}
