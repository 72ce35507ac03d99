use std::{error::Error, path::PathBuf, time::Duration};

use clap::Parser;
use log::{info, warn};

use repair_batching::{
    models::repair::{Extractor, ModelConfig, RepairMip, Report},
    parse::{self, RepairData},
    problem::RepairProblem,
    sample::{self, SampleConfig},
    solver::{self, SolverConfig},
};

/// Assigns products to repairers and schedules their batch shipments.
#[derive(Parser, Debug)]
#[clap(name = "repair-batching", version)]
struct Args {
    /// Problem parameters as json
    #[clap(long)]
    params: Option<PathBuf>,
    /// Directory with the csv exports; parameters are sampled for them
    #[clap(long)]
    data_dir: Option<PathBuf>,
    /// Seed of the sampled parameters
    #[clap(long, default_value_t = 42)]
    seed: u64,
    /// Number of days in the sampled horizon
    #[clap(long, default_value_t = 7)]
    days: usize,
    /// Maximum lead time of the sampled problem
    #[clap(long, default_value_t = 15.0)]
    tau: f64,

    /// Weight of the worst-case lead time
    #[clap(long)]
    alpha1: Option<f64>,
    /// Weight of the shipping cost
    #[clap(long)]
    alpha2: Option<f64>,
    /// Weight of the quality drop
    #[clap(long)]
    alpha3: Option<f64>,
    /// Weight of the repair cost
    #[clap(long)]
    alpha4: Option<f64>,
    /// Weight of the emissions
    #[clap(long)]
    alpha5: Option<f64>,

    /// Forbid products that never ship explicitly
    #[clap(long)]
    require_shipment: bool,
    /// Time limit of the solver, in seconds
    #[clap(long)]
    time_limit: Option<f64>,
    /// Relative optimality gap at which the solver stops
    #[clap(long)]
    mip_gap: Option<f64>,
    #[clap(long)]
    threads: Option<usize>,
    /// Show the solver's own output
    #[clap(long)]
    verbose: bool,
    #[clap(long, default_value = "microlp")]
    solver: String,

    /// Write the problem parameters as json
    #[clap(long)]
    dump_params: Option<PathBuf>,
    /// Write the report as json
    #[clap(long)]
    output: Option<PathBuf>,
}

impl Args {
    fn problem(&self) -> Result<RepairProblem, Box<dyn Error>> {
        let mut problem = match (&self.params, &self.data_dir) {
            (Some(path), None) => parse::read_problem(path)?,
            (None, Some(dir)) => {
                let data = RepairData::load(dir)?;
                let config = SampleConfig {
                    seed: self.seed,
                    days: self.days,
                    tau: self.tau,
                    ..SampleConfig::default()
                };
                sample::generate(&data, &config)?
            }
            _ => return Err("exactly one of --params and --data-dir is required".into()),
        };

        let weights = &mut problem.weights;
        for (weight, value) in [
            (&mut weights.lead_time, self.alpha1),
            (&mut weights.shipping_cost, self.alpha2),
            (&mut weights.quality_drop, self.alpha3),
            (&mut weights.repair_cost, self.alpha4),
            (&mut weights.emissions, self.alpha5),
        ] {
            if let Some(value) = value {
                *weight = value;
            }
        }

        Ok(problem)
    }

    fn solver_config(&self) -> Result<SolverConfig, Box<dyn Error>> {
        let time_limit = match self.time_limit {
            Some(secs) if secs.is_finite() && secs >= 0.0 => Some(Duration::from_secs_f64(secs)),
            Some(secs) => return Err(format!("invalid time limit {secs}").into()),
            None => None,
        };

        Ok(SolverConfig {
            time_limit,
            mip_gap: self.mip_gap,
            threads: self.threads,
            verbose: self.verbose,
        })
    }
}

fn summarize(report: &Report) {
    info!(
        "Objective {:.3} ({})",
        report.objective,
        if report.optimal { "optimal" } else { "not proven optimal" }
    );
    let b = &report.breakdown;
    info!(
        "lead time {:.1}, shipping {:.2}, quality drop {:.3}, repair {:.2}, emissions {:.2}",
        b.lead_time, b.shipping_cost, b.quality_drop, b.repair_cost, b.emissions
    );

    for batch in &report.batches {
        info!(
            "day {}: repairer {} takes {} products {:?}",
            batch.shipping_day, batch.repairer_id, batch.batch_size, batch.products
        );
    }
    for product in report.products.iter().filter(|p| p.shipping_day.is_none()) {
        warn!("product {} is never shipped", product.product_id);
    }
}

pub fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let problem = args.problem()?;
    if let Some(path) = &args.dump_params {
        parse::write_json(&problem, path)?;
        info!("Wrote problem parameters to {}", path.display());
    }

    let config = ModelConfig {
        require_shipment: args.require_shipment,
    };
    let mip = RepairMip::build(&problem, config)?;

    let engine = solver::engine(&args.solver, args.solver_config()?).ok_or_else(|| {
        format!(
            "unknown solver {}, expected one of {:?}",
            args.solver,
            solver::engines()
        )
    })?;
    let output = mip.solve(engine.as_ref())?;

    let report = Report::new(&Extractor::new(&mip, &output))?;
    summarize(&report);

    if let Some(path) = &args.output {
        parse::write_json(&report, path)?;
        info!("Wrote report to {}", path.display());
    }

    Ok(())
}
