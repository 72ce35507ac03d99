use std::collections::{BTreeMap, BTreeSet};

use repair_batching::{
    models::{
        program::LinExpr,
        repair::{Extractor, ModelConfig, RepairMip, Report, SolveError},
        utils::{integral, is_set, ConvertVars},
    },
    problem::{DefectCost, RepairProblem, Weights},
    solver::{MicroLp, SolverOutput, Status},
};

struct Profile {
    capacity: i64,
    lead_time: f64,
    emissions: f64,
    repair_cost: f64,
    quality_drop: f64,
}

/// Repairers `0..`, products `0..` with `defects[p]` defects each, no stock time and days
/// `0..days`. Defect `d` costs `repair_cost + 2d` to repair.
fn instance(profiles: &[Profile], days: usize, tau: f64, defects: &[usize]) -> RepairProblem {
    let repairers = (0..profiles.len()).collect::<Vec<_>>();
    let products = (0..defects.len()).collect::<Vec<_>>();
    let product_defects: BTreeMap<usize, BTreeSet<usize>> = defects
        .iter()
        .enumerate()
        .map(|(p, &n)| (p, (0..n).collect()))
        .collect();

    let mut defect_costs = Vec::new();
    for (&product, set) in &product_defects {
        for &defect in set {
            for (repairer, profile) in profiles.iter().enumerate() {
                defect_costs.push(DefectCost {
                    defect,
                    product,
                    repairer,
                    quality_drop: profile.quality_drop,
                    repair_cost: profile.repair_cost + 2.0 * defect as f64,
                });
            }
        }
    }

    let per_repairer = |f: fn(&Profile) -> f64| {
        profiles
            .iter()
            .enumerate()
            .map(|(r, p)| (r, f(p)))
            .collect::<BTreeMap<_, _>>()
    };

    RepairProblem {
        repairers: repairers.clone(),
        defects: (0..defects.iter().copied().max().unwrap_or(0)).collect(),
        products: products.clone(),
        days: (0..days).collect(),
        product_defects,
        capacity: profiles
            .iter()
            .enumerate()
            .map(|(r, p)| (r, p.capacity))
            .collect(),
        lead_time: per_repairer(|p| p.lead_time),
        shipping_cost: per_repairer(|_| 8.0),
        emissions: per_repairer(|p| p.emissions),
        stock_time: products.iter().map(|&p| (p, 0.0)).collect(),
        defect_costs,
        tau,
        weights: Weights::default(),
    }
}

fn two_repairers(tau: f64) -> RepairProblem {
    let profiles = [
        Profile {
            capacity: 5,
            lead_time: 8.0,
            emissions: 8.0,
            repair_cost: 12.0,
            quality_drop: 0.08,
        },
        Profile {
            capacity: 3,
            lead_time: 9.0,
            emissions: 1.36,
            repair_cost: 10.0,
            quality_drop: 0.05,
        },
    ];
    instance(&profiles, 8, tau, &[1, 1, 1, 1])
}

fn one_repairer(
    capacity: i64,
    lead_time: f64,
    days: usize,
    tau: f64,
    defects: &[usize],
) -> RepairProblem {
    let profile = Profile {
        capacity,
        lead_time,
        emissions: 2.0,
        repair_cost: 4.0,
        quality_drop: 0.1,
    };
    instance(&[profile], days, tau, defects)
}

fn solve(problem: &RepairProblem, config: ModelConfig) -> (RepairMip, SolverOutput) {
    let mip = RepairMip::build(problem, config).unwrap();
    let output = mip.solve(&MicroLp::default()).unwrap();
    (mip, output)
}

#[test]
fn two_repairers_ship_every_product_in_time() {
    let problem = two_repairers(15.0);
    let (mip, output) = solve(&problem, ModelConfig::default());
    assert_eq!(output.status, Status::Optimal);

    let report = Report::new(&Extractor::new(&mip, &output)).unwrap();
    assert!(report.optimal);
    assert_eq!(report.products.len(), 4);
    for product in &report.products {
        assert!(product.shipping_day.is_some(), "{:?}", product);
        let lead_time = product.lead_time.unwrap();
        assert!(lead_time <= problem.tau + 1e-6, "{:?}", product);
        assert_eq!(
            lead_time,
            product.shipping_day.unwrap() as f64
                + problem.lead_time[&product.repairer_id]
                + product.time_in_stock
        );
    }

    let shipped = report.batches.iter().map(|b| b.batch_size).sum::<usize>();
    assert_eq!(shipped, 4);
    assert!(report.breakdown.lead_time <= problem.tau + 1e-6);
}

#[test]
fn solved_assignments_satisfy_the_model() {
    let problem = two_repairers(15.0);
    let (mip, output) = solve(&problem, ModelConfig::default());
    let values = output.values.as_ref().unwrap();
    let violations = mip.model.violations(values, 1e-5);
    assert!(violations.is_empty(), "{:?}", violations);

    let v = &mip.vars;
    let u = v.u.convert(&output).unwrap();
    let x = v.x.convert(&output).unwrap();
    let z = v.z.convert(&output).unwrap();
    let a = v.a.convert(&output).unwrap();
    let b = v.b.convert(&output).unwrap();

    // single assignment
    for row in &u {
        assert_eq!(row.iter().filter(|&&u| is_set(u)).count(), 1);
    }

    // batches depart exactly when something ships
    for r in 0..2 {
        for t in 0..8 {
            let ships = (0..4).filter(|&p| is_set(x[p][r][t])).count();
            assert_eq!(is_set(z[r][t]), ships >= 1, "repairer {r} day {t}");
            assert!(integral(b[r][t]) <= problem.capacity[&r]);
        }
    }

    // conservation
    let arrivals = a.iter().flatten().map(|&a| integral(a)).sum::<i64>();
    assert_eq!(arrivals, 4);
}

#[test]
fn tight_lead_time_is_infeasible() {
    let mip = RepairMip::build(&two_repairers(0.0), ModelConfig::default()).unwrap();
    assert_eq!(mip.solve(&MicroLp::default()), Err(SolveError::Infeasible));
}

#[test]
fn never_shipping_is_no_escape_from_tau() {
    // every shipment takes at least 5 + 1 days
    let mut problem = one_repairer(2, 1.0, 3, 4.0, &[1]);
    problem.days = vec![5, 6, 7];
    let mip = RepairMip::build(&problem, ModelConfig::default()).unwrap();
    assert_eq!(mip.solve(&MicroLp::default()), Err(SolveError::Infeasible));

    problem.tau = 6.0;
    let (mip, output) = solve(&problem, ModelConfig::default());
    let report = Report::new(&Extractor::new(&mip, &output)).unwrap();
    assert_eq!(report.products[0].shipping_day, Some(5));
    assert_eq!(report.products[0].lead_time, Some(6.0));
}

#[test]
fn full_basket_forces_a_departure() {
    // unshipped products would need 2 + 7 days, more than tau
    let problem = one_repairer(2, 2.0, 7, 7.0, &[1, 1, 1]);
    let (mip, output) = solve(&problem, ModelConfig::default());
    let extractor = Extractor::new(&mip, &output);

    let products = extractor.product_schedule().unwrap();
    assert!(products.iter().all(|p| p.shipping_day.is_some()));

    let batches = extractor.batch_schedule().unwrap();
    assert!(batches.len() >= 2);
    assert!(batches.iter().all(|b| b.batch_size <= 2 && b.batch_size >= 1));

    for ((_, day), status) in extractor.daily_basket_status().unwrap() {
        assert!(status.accumulated <= 2, "day {day}");
        // a basket at capacity at the end of a day means the batch left that day
        if status.accumulated == 2 {
            assert!(batches.iter().any(|b| b.shipping_day == day));
        }
    }
}

#[test]
fn overflowing_first_day_ships_that_day() {
    let problem = one_repairer(2, 2.0, 7, 7.0, &[1, 1, 1]);
    let mut mip = RepairMip::build(&problem, ModelConfig::default()).unwrap();
    let arrivals = mip.vars.a[0][0];
    mip.model.add_constr("arrivals_0_0", LinExpr::from(arrivals).eq(3.0));

    // keeping all three in the basket breaks the capacity
    let mut values = vec![0.0; mip.model.vars().len()];
    for p in 0..3 {
        values[mip.vars.u[p][0].index()] = 1.0;
        values[mip.vars.u_dpr[p][0][0].index()] = 1.0;
    }
    values[arrivals.index()] = 3.0;
    values[mip.vars.b[0][0].index()] = 3.0;
    let violations = mip.model.violations(&values, 1e-6);
    assert!(
        violations.iter().any(|v| v == "b_leq_beta_0_0"),
        "{:?}",
        violations
    );

    let output = mip.solve(&MicroLp::default()).unwrap();
    let extractor = Extractor::new(&mip, &output);
    let batches = extractor.batch_schedule().unwrap();
    let first = batches.iter().find(|b| b.shipping_day == 0).unwrap();
    assert!(first.batch_size >= 1 && first.batch_size <= 2);

    let baskets = extractor.daily_basket_status().unwrap();
    assert_eq!(baskets[&(0, 0)].newly_assigned, 3);
    assert_eq!(baskets[&(0, 0)].accumulated, 3 - first.batch_size as i64);
}

#[test]
fn repair_cost_sums_the_defects_of_a_product() {
    // defects cost 4 and 6, and the product has to ship by day 2
    let problem = one_repairer(1, 1.0, 3, 3.0, &[2]);
    let (mip, output) = solve(&problem, ModelConfig::default());

    let report = Report::new(&Extractor::new(&mip, &output)).unwrap();
    let product = &report.products[0];
    assert_eq!(product.repairer_id, 0);
    assert!((product.repair_cost - 10.0).abs() < 1e-6);
    assert!((product.quality_drop - 0.2).abs() < 1e-6);
    assert!((report.breakdown.repair_cost - 10.0).abs() < 1e-6);
}

#[test]
fn generous_tau_lets_products_stay_in_the_basket() {
    // with tau beyond horizon + lead time, staying unshipped saves a batch
    let problem = one_repairer(2, 1.0, 4, 10.0, &[1]);

    let (mip, output) = solve(&problem, ModelConfig::default());
    let report = Report::new(&Extractor::new(&mip, &output)).unwrap();
    assert_eq!(report.products[0].shipping_day, None);
    assert_eq!(report.products[0].lead_time, None);
    assert!(report.batches.is_empty());

    let config = ModelConfig {
        require_shipment: true,
    };
    let (mip, output) = solve(&problem, config);
    let report = Report::new(&Extractor::new(&mip, &output)).unwrap();
    assert_eq!(report.products[0].shipping_day, Some(0));
    assert_eq!(report.products[0].lead_time, Some(1.0));
    assert_eq!(report.batches.len(), 1);
}

#[test]
fn weights_steer_the_assignment() {
    // only repair cost counts: everything goes to the cheaper repairer
    let mut problem = two_repairers(15.0);
    problem.weights = Weights {
        lead_time: 0.0,
        shipping_cost: 0.0,
        quality_drop: 0.0,
        repair_cost: 1.0,
        emissions: 0.0,
    };
    let (mip, output) = solve(&problem, ModelConfig::default());
    let report = Report::new(&Extractor::new(&mip, &output)).unwrap();
    assert!(report.products.iter().all(|p| p.repairer_id == 1));
    assert!((report.objective - 40.0).abs() < 1e-6);
}

#[test]
fn extraction_is_repeatable() {
    let (mip, output) = solve(&two_repairers(15.0), ModelConfig::default());
    let extractor = Extractor::new(&mip, &output);
    assert_eq!(
        extractor.product_schedule().unwrap(),
        extractor.product_schedule().unwrap()
    );
    assert_eq!(
        Report::new(&extractor).unwrap(),
        Report::new(&extractor).unwrap()
    );
}
