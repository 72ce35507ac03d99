//! Synthetic instance parameters for loaded records.
//!
//! Only the sets come from the data; every coefficient is drawn at random. This is a stand-in
//! for a real parameter feed.
use std::collections::BTreeMap;

use derive_more::Display;
use log::info;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, Normal, NormalError};

use crate::parse::RepairData;
use crate::problem::{DefectCost, Duration, RepairProblem, RepairerId, Weights};

/// Fixed parameters of one repairer.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairerProfile {
    pub capacity: i64,
    pub lead_time: Duration,
    pub shipping_cost: f64,
    pub emissions: f64,
    pub quality_drop: f64,
    /// Inclusive range of the integer markup on the base repair cost
    pub cost_markup: Option<(u32, u32)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SampleConfig {
    pub seed: u64,
    pub days: usize,
    pub tau: Duration,
    pub weights: Weights,
    /// One profile per repairer, in the order the repairers are loaded
    pub profiles: Vec<RepairerProfile>,
    /// Mean and standard deviation of the base repair cost of one defect
    pub repair_cost: (f64, f64),
    /// Largest stock time of a product, in whole days
    pub max_stock_time: u32,
}

impl Default for SampleConfig {
    fn default() -> Self {
        SampleConfig {
            seed: 42,
            days: 7,
            tau: 15.0,
            weights: Weights::default(),
            profiles: vec![
                RepairerProfile {
                    capacity: 15,
                    lead_time: 12.0,
                    shipping_cost: 8.0,
                    emissions: 8.0,
                    quality_drop: 0.08,
                    cost_markup: Some((2, 10)),
                },
                RepairerProfile {
                    capacity: 9,
                    lead_time: 6.0,
                    shipping_cost: 8.0,
                    emissions: 1.36,
                    quality_drop: 0.05,
                    cost_markup: None,
                },
            ],
            repair_cost: (10.0, 2.0),
            max_stock_time: 6,
        }
    }
}

#[derive(Debug, Display)]
pub enum SampleError {
    #[display(fmt = "invalid repair cost distribution: {}", _0)]
    RepairCost(NormalError),
    #[display(fmt = "inverted cost markup range {}..={}", _0, _1)]
    Markup(u32, u32),
}

impl std::error::Error for SampleError {}

/// Draws a problem over the records in `data`. Deterministic for a given seed.
pub fn generate(data: &RepairData, config: &SampleConfig) -> Result<RepairProblem, SampleError> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let (mean, std_dev) = config.repair_cost;
    if !(std_dev.is_finite() && std_dev >= 0.0) {
        return Err(SampleError::RepairCost(NormalError::BadVariance));
    }
    let base_cost = Normal::new(mean, std_dev).map_err(SampleError::RepairCost)?;

    let inverted = config
        .profiles
        .iter()
        .filter_map(|p| p.cost_markup)
        .find(|(low, high)| low > high);
    if let Some((low, high)) = inverted {
        return Err(SampleError::Markup(low, high));
    }

    let profiles = data
        .repairers
        .iter()
        .zip(&config.profiles)
        .map(|(repairer, profile)| (repairer.id, profile))
        .collect::<Vec<_>>();

    let product_defects = data.product_defects();
    let products = data.products.iter().map(|p| p.id).collect::<Vec<_>>();

    let stock_time = products
        .iter()
        .map(|&p| (p, rng.gen_range(0..=config.max_stock_time) as f64))
        .collect();

    let mut defect_costs = Vec::new();
    for (&product, defects) in &product_defects {
        for &defect in defects {
            let base = base_cost.sample(&mut rng).max(0.0);
            for &(repairer, profile) in &profiles {
                let markup = match profile.cost_markup {
                    Some((low, high)) => rng.gen_range(low..=high) as f64,
                    None => 0.0,
                };
                defect_costs.push(DefectCost {
                    defect,
                    product,
                    repairer,
                    quality_drop: profile.quality_drop,
                    repair_cost: base + markup,
                });
            }
        }
    }

    let per_repairer = |f: fn(&RepairerProfile) -> f64| -> BTreeMap<RepairerId, f64> {
        profiles
            .iter()
            .map(|(r, profile)| (*r, f(*profile)))
            .collect()
    };

    let problem = RepairProblem {
        repairers: profiles.iter().map(|(r, _)| *r).collect(),
        defects: data.defects.iter().map(|d| d.id).collect(),
        products,
        days: (0..config.days).collect(),
        product_defects,
        capacity: profiles.iter().map(|(r, p)| (*r, p.capacity)).collect(),
        lead_time: per_repairer(|p| p.lead_time),
        shipping_cost: per_repairer(|p| p.shipping_cost),
        emissions: per_repairer(|p| p.emissions),
        stock_time,
        defect_costs,
        tau: config.tau,
        weights: config.weights,
    };

    info!(
        "Sampled parameters for {} products and {} repairers over {} days (seed {})",
        problem.products.len(),
        problem.repairers.len(),
        problem.days.len(),
        config.seed
    );

    Ok(problem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Defect, Product, RepairRequest, Repairer};

    fn data(products: usize, repairers: usize) -> RepairData {
        RepairData {
            products: (0..products)
                .map(|id| Product {
                    id,
                    category: "Cardigan".to_string(),
                    size: "L".to_string(),
                    color: "blue".to_string(),
                    composition: "cotton".to_string(),
                    description: String::new(),
                })
                .collect(),
            defects: (0..3)
                .map(|id| Defect {
                    id,
                    description: format!("defect {id}"),
                })
                .collect(),
            repairers: (0..repairers)
                .map(|id| Repairer {
                    id: 10 + id,
                    name: format!("repairer {id}"),
                    specialization: String::new(),
                    status: "active".to_string(),
                    contact_email: String::new(),
                    notes: String::new(),
                })
                .collect(),
            customers: Vec::new(),
            requests: (0..products)
                .flat_map(|p| {
                    (0..=p % 3).map(move |d| RepairRequest {
                        id: 3 * p + d,
                        customer_id: 0,
                        product_id: p,
                        defect_id: d,
                    })
                })
                .collect(),
        }
    }

    #[test]
    fn generation_is_deterministic_for_a_seed() {
        let data = data(20, 2);
        let config = SampleConfig::default();
        assert_eq!(
            generate(&data, &config).unwrap(),
            generate(&data, &config).unwrap()
        );

        let other = SampleConfig {
            seed: 7,
            ..SampleConfig::default()
        };
        assert_ne!(
            generate(&data, &config).unwrap(),
            generate(&data, &other).unwrap()
        );
    }

    #[test]
    fn sampled_problems_are_valid() {
        let problem = generate(&data(12, 2), &SampleConfig::default()).unwrap();
        problem.validate().unwrap();

        assert_eq!(problem.repairers, vec![10, 11]);
        assert_eq!(problem.days, (0..7).collect::<Vec<_>>());
        assert_eq!(problem.capacity[&10], 15);
        assert_eq!(problem.emissions[&11], 1.36);
        assert!(problem.stock_time.values().all(|s| (0.0..=6.0).contains(s) && s.fract() == 0.0));
        // one, two or three defects per product, one record per repairer
        assert_eq!(problem.defect_costs.len(), 2 * (4 + 4 * 2 + 4 * 3));
    }

    #[test]
    fn markup_is_added_to_the_shared_base_cost() {
        let problem = generate(&data(12, 2), &SampleConfig::default()).unwrap();
        let costs = problem.defect_cost_table();

        for cost in problem.defect_costs.iter().filter(|c| c.repairer == 10) {
            let base = costs[&(cost.defect, cost.product, 11)];
            let markup = cost.repair_cost - base.repair_cost;
            assert!((2.0..=10.0).contains(&markup.round()), "{}", markup);
            assert!((markup - markup.round()).abs() < 1e-9);
            assert_eq!(cost.quality_drop, 0.08);
        }
    }

    #[test]
    fn repairers_are_capped_by_the_records() {
        let problem = generate(&data(4, 1), &SampleConfig::default()).unwrap();
        assert_eq!(problem.repairers, vec![10]);
        assert_eq!(problem.capacity.len(), 1);

        let config = SampleConfig {
            profiles: vec![],
            ..SampleConfig::default()
        };
        let problem = generate(&data(4, 3), &config).unwrap();
        assert!(problem.repairers.is_empty());
        assert!(problem.validate().is_err());
    }

    #[test]
    fn invalid_distributions_are_rejected() {
        let config = SampleConfig {
            repair_cost: (10.0, -1.0),
            ..SampleConfig::default()
        };
        assert!(matches!(
            generate(&data(2, 2), &config),
            Err(SampleError::RepairCost(NormalError::BadVariance))
        ));

        let config = SampleConfig {
            repair_cost: (10.0, f64::INFINITY),
            ..SampleConfig::default()
        };
        assert!(matches!(
            generate(&data(2, 2), &config),
            Err(SampleError::RepairCost(_))
        ));
    }
}
