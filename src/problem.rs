use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use derive_more::Display;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// The type used for cost, quality drop and emission coefficients
pub type Cost = f64;
/// The type used for lead times and stock times, in days
pub type Duration = f64;

pub type RepairerId = usize;
pub type DefectId = usize;
pub type ProductId = usize;
pub type Day = usize;

/// Weights of the five objective terms (alpha1..alpha5). No normalization is applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    /// Weight of the worst-case lead time
    pub lead_time: f64,
    /// Weight of the total shipping cost
    pub shipping_cost: f64,
    /// Weight of the total quality degradation
    pub quality_drop: f64,
    /// Weight of the total repair cost
    pub repair_cost: f64,
    /// Weight of the total carbon emissions
    pub emissions: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Weights {
            lead_time: 1.0,
            shipping_cost: 1.0,
            quality_drop: 1.0,
            repair_cost: 1.0,
            emissions: 1.0,
        }
    }
}

impl Weights {
    fn named(&self) -> [(&'static str, f64); 5] {
        [
            ("lead_time", self.lead_time),
            ("shipping_cost", self.shipping_cost),
            ("quality_drop", self.quality_drop),
            ("repair_cost", self.repair_cost),
            ("emissions", self.emissions),
        ]
    }
}

/// Quality drop and repair cost of repairing defect `defect` on `product` at `repairer`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DefectCost {
    pub defect: DefectId,
    pub product: ProductId,
    pub repairer: RepairerId,
    pub quality_drop: Cost,
    pub repair_cost: Cost,
}

/// The parameters of a repair batching instance, keyed by entity ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairProblem {
    /// The repairers (R)
    pub repairers: Vec<RepairerId>,
    /// The defect types (D)
    pub defects: Vec<DefectId>,
    /// The products (P)
    pub products: Vec<ProductId>,
    /// The days of the planning horizon (T), strictly increasing
    pub days: Vec<Day>,
    /// The defects present on each product (D_p). Products that are missing have no defects.
    #[serde(default)]
    pub product_defects: BTreeMap<ProductId, BTreeSet<DefectId>>,
    /// Maximum batch size of each repairer
    pub capacity: BTreeMap<RepairerId, i64>,
    /// Transit and repair time of each repairer
    pub lead_time: BTreeMap<RepairerId, Duration>,
    /// Cost of shipping one batch to each repairer
    pub shipping_cost: BTreeMap<RepairerId, Cost>,
    /// Emissions of shipping one batch to each repairer
    pub emissions: BTreeMap<RepairerId, Cost>,
    /// Days each product has spent in stock before the planning horizon
    pub stock_time: BTreeMap<ProductId, Duration>,
    /// Coefficients for every valid (defect, product, repairer) triple
    #[serde(default)]
    pub defect_costs: Vec<DefectCost>,
    /// The maximum allowed lead time
    pub tau: Duration,
    #[serde(default)]
    pub weights: Weights,
}

/// A configuration error found before building a model.
#[derive(Debug, Clone, PartialEq, Display)]
pub enum ProblemError {
    #[display(fmt = "there must be at least one repairer")]
    NoRepairers,
    #[display(fmt = "the planning horizon must contain at least one day")]
    NoDays,
    #[display(fmt = "days must be strictly increasing, found {} after {}", day, previous)]
    UnorderedDays { previous: Day, day: Day },
    #[display(fmt = "{} {} is listed more than once", kind, id)]
    DuplicateId { kind: &'static str, id: usize },
    #[display(fmt = "missing {} for repairer {}", parameter, repairer)]
    MissingRepairerParameter {
        parameter: &'static str,
        repairer: RepairerId,
    },
    #[display(fmt = "missing stock time for product {}", _0)]
    MissingStockTime(ProductId),
    #[display(
        fmt = "missing coefficients for defect {} on product {} at repairer {}",
        defect,
        product,
        repairer
    )]
    MissingDefectCost {
        defect: DefectId,
        product: ProductId,
        repairer: RepairerId,
    },
    #[display(
        fmt = "duplicate coefficients for defect {} on product {} at repairer {}",
        defect,
        product,
        repairer
    )]
    DuplicateDefectCost {
        defect: DefectId,
        product: ProductId,
        repairer: RepairerId,
    },
    #[display(fmt = "defects are listed for unknown product {}", _0)]
    UnknownProduct(ProductId),
    #[display(fmt = "product {} has unknown defect {}", product, defect)]
    UnknownDefect { product: ProductId, defect: DefectId },
    #[display(fmt = "repairer {} has negative capacity {}", repairer, capacity)]
    NegativeCapacity { repairer: RepairerId, capacity: i64 },
    #[display(fmt = "{} of {} {} is negative ({})", parameter, kind, id, value)]
    NegativeValue {
        parameter: &'static str,
        kind: &'static str,
        id: usize,
        value: f64,
    },
    #[display(fmt = "objective weight {} is negative ({})", _0, _1)]
    NegativeWeight(&'static str, f64),
    #[display(fmt = "{} is not a finite number", _0)]
    NotFinite(String),
}

impl std::error::Error for ProblemError {}

impl RepairProblem {
    /// The defects present on `product`, in ascending id order.
    pub fn defects_of(&self, product: ProductId) -> impl Iterator<Item = DefectId> + '_ {
        self.product_defects
            .get(&product)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// The coefficients of every valid triple, keyed by (defect, product, repairer).
    pub fn defect_cost_table(&self) -> HashMap<(DefectId, ProductId, RepairerId), DefectCost> {
        self.defect_costs
            .iter()
            .map(|c| ((c.defect, c.product, c.repairer), *c))
            .collect()
    }

    /// Checks that the parameters are complete and consistent. Fails on the first offending key.
    pub fn validate(&self) -> Result<(), ProblemError> {
        use ProblemError::*;

        if self.repairers.is_empty() {
            return Err(NoRepairers);
        }
        if self.days.is_empty() {
            return Err(NoDays);
        }
        for w in self.days.windows(2) {
            if w[1] <= w[0] {
                return Err(UnorderedDays {
                    previous: w[0],
                    day: w[1],
                });
            }
        }

        unique("repairer", &self.repairers)?;
        unique("defect", &self.defects)?;
        unique("product", &self.products)?;

        for &r in &self.repairers {
            let capacity = *self.capacity.get(&r).ok_or(MissingRepairerParameter {
                parameter: "capacity",
                repairer: r,
            })?;
            if capacity < 0 {
                return Err(NegativeCapacity {
                    repairer: r,
                    capacity,
                });
            }

            for (parameter, table) in [
                ("lead time", &self.lead_time),
                ("shipping cost", &self.shipping_cost),
                ("emissions", &self.emissions),
            ] {
                let value = *table.get(&r).ok_or(MissingRepairerParameter {
                    parameter,
                    repairer: r,
                })?;
                finite(value, || format!("{parameter} of repairer {r}"))?;
                if parameter == "lead time" && value < 0.0 {
                    return Err(NegativeValue {
                        parameter,
                        kind: "repairer",
                        id: r,
                        value,
                    });
                }
            }
        }

        for &p in &self.products {
            let stock = *self.stock_time.get(&p).ok_or(MissingStockTime(p))?;
            finite(stock, || format!("stock time of product {p}"))?;
            if stock < 0.0 {
                return Err(NegativeValue {
                    parameter: "stock time",
                    kind: "product",
                    id: p,
                    value: stock,
                });
            }
        }

        let products: HashSet<ProductId> = self.products.iter().copied().collect();
        let defects: HashSet<DefectId> = self.defects.iter().copied().collect();
        for (&p, set) in &self.product_defects {
            if !products.contains(&p) {
                return Err(UnknownProduct(p));
            }
            if let Some(&d) = set.iter().find(|d| !defects.contains(d)) {
                return Err(UnknownDefect {
                    product: p,
                    defect: d,
                });
            }
        }

        let mut seen = HashSet::new();
        for c in &self.defect_costs {
            if !seen.insert((c.defect, c.product, c.repairer)) {
                return Err(DuplicateDefectCost {
                    defect: c.defect,
                    product: c.product,
                    repairer: c.repairer,
                });
            }
            finite(c.quality_drop, || {
                format!("quality drop of ({}, {}, {})", c.defect, c.product, c.repairer)
            })?;
            finite(c.repair_cost, || {
                format!("repair cost of ({}, {}, {})", c.defect, c.product, c.repairer)
            })?;
        }

        for &p in &self.products {
            for d in self.defects_of(p) {
                for &r in &self.repairers {
                    if !seen.contains(&(d, p, r)) {
                        return Err(MissingDefectCost {
                            defect: d,
                            product: p,
                            repairer: r,
                        });
                    }
                }
            }
        }

        let unused = self
            .defect_costs
            .iter()
            .filter(|c| {
                !self
                    .product_defects
                    .get(&c.product)
                    .map_or(false, |set| set.contains(&c.defect))
            })
            .count();
        if unused > 0 {
            warn!("Ignoring {unused} defect coefficients outside of the product defect sets");
        }

        finite(self.tau, || "tau".to_string())?;
        for (name, weight) in self.weights.named() {
            finite(weight, || format!("weight {name}"))?;
            if weight < 0.0 {
                return Err(NegativeWeight(name, weight));
            }
        }

        debug!(
            "Validated problem with {} repairers, {} defects, {} products and {} days",
            self.repairers.len(),
            self.defects.len(),
            self.products.len(),
            self.days.len()
        );

        Ok(())
    }
}

fn unique(kind: &'static str, ids: &[usize]) -> Result<(), ProblemError> {
    let mut seen = HashSet::with_capacity(ids.len());
    match ids.iter().find(|id| !seen.insert(**id)) {
        Some(&id) => Err(ProblemError::DuplicateId { kind, id }),
        None => Ok(()),
    }
}

fn finite(value: f64, what: impl FnOnce() -> String) -> Result<(), ProblemError> {
    match value.is_finite() {
        true => Ok(()),
        false => Err(ProblemError::NotFinite(what())),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Two repairers, three products; product 0 has defects {0, 1}, product 1 has {1}, product 2 has none.
    pub fn small_problem() -> RepairProblem {
        let repairers = vec![0, 1];
        let product_defects = BTreeMap::from([
            (0, BTreeSet::from([0, 1])),
            (1, BTreeSet::from([1])),
            (2, BTreeSet::new()),
        ]);
        let mut defect_costs = Vec::new();
        for (&p, set) in &product_defects {
            for &d in set {
                for &r in &repairers {
                    defect_costs.push(DefectCost {
                        defect: d,
                        product: p,
                        repairer: r,
                        quality_drop: 0.05 + 0.01 * r as f64,
                        repair_cost: 10.0 + d as f64 + r as f64,
                    });
                }
            }
        }

        RepairProblem {
            repairers,
            defects: vec![0, 1],
            products: vec![0, 1, 2],
            days: (0..4).collect(),
            product_defects,
            capacity: BTreeMap::from([(0, 2), (1, 3)]),
            lead_time: BTreeMap::from([(0, 3.0), (1, 5.0)]),
            shipping_cost: BTreeMap::from([(0, 8.0), (1, 8.0)]),
            emissions: BTreeMap::from([(0, 8.0), (1, 1.36)]),
            stock_time: BTreeMap::from([(0, 0.0), (1, 1.0), (2, 2.0)]),
            defect_costs,
            tau: 12.0,
            weights: Weights::default(),
        }
    }

    #[test]
    fn small_problem_is_valid() {
        assert_eq!(small_problem().validate(), Ok(()));
    }

    #[test]
    fn empty_sets_are_rejected() {
        let mut problem = small_problem();
        problem.days.clear();
        assert_eq!(problem.validate(), Err(ProblemError::NoDays));

        let mut problem = small_problem();
        problem.repairers.clear();
        assert_eq!(problem.validate(), Err(ProblemError::NoRepairers));
    }

    #[test]
    fn missing_coefficients_name_the_key() {
        let mut problem = small_problem();
        problem.emissions.remove(&1);
        assert_eq!(
            problem.validate(),
            Err(ProblemError::MissingRepairerParameter {
                parameter: "emissions",
                repairer: 1
            })
        );

        let mut problem = small_problem();
        problem
            .defect_costs
            .retain(|c| !(c.defect == 1 && c.product == 1 && c.repairer == 0));
        assert_eq!(
            problem.validate(),
            Err(ProblemError::MissingDefectCost {
                defect: 1,
                product: 1,
                repairer: 0
            })
        );
    }

    #[test]
    fn negative_capacity_and_weights_are_rejected() {
        let mut problem = small_problem();
        problem.capacity.insert(0, -1);
        assert_eq!(
            problem.validate(),
            Err(ProblemError::NegativeCapacity {
                repairer: 0,
                capacity: -1
            })
        );

        let mut problem = small_problem();
        problem.weights.emissions = -0.5;
        assert_eq!(
            problem.validate(),
            Err(ProblemError::NegativeWeight("emissions", -0.5))
        );
    }

    #[test]
    fn unknown_defects_and_unordered_days_are_rejected() {
        let mut problem = small_problem();
        problem.product_defects.insert(2, BTreeSet::from([7]));
        assert_eq!(
            problem.validate(),
            Err(ProblemError::UnknownDefect {
                product: 2,
                defect: 7
            })
        );

        let mut problem = small_problem();
        problem.days = vec![0, 2, 2];
        assert_eq!(
            problem.validate(),
            Err(ProblemError::UnorderedDays {
                previous: 2,
                day: 2
            })
        );
    }

    #[test]
    fn problems_survive_json() {
        let problem = small_problem();
        let json = serde_json::to_string(&problem).unwrap();
        let back: RepairProblem = serde_json::from_str(&json).unwrap();
        assert_eq!(problem, back);
    }
}
