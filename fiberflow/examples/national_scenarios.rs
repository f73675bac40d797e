use std::path::PathBuf;

use clap::Parser;
use fiberflow::{Degradation, FiberModel, ParameterStore, RunConfig, SolveReport};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "national_scenarios")]
#[command(about = "Solve the fiber-flow model under a sequence of scenarios")]
struct Cli {
    /// Parameter store (JSON)
    #[arg(long, default_value = "fiberflow/data/regional.json")]
    params: PathBuf,

    /// Run configuration (JSON); overrides the environment's solver choice
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for sampled degradation and contamination
    #[arg(long)]
    seed: Option<u64>,

    /// Recycled-content targets as PRODUCT=POINTS
    #[arg(long = "target", value_parser = parse_pair)]
    targets: Vec<(String, f64)>,

    /// Demand changes as PRODUCT=PERCENT
    #[arg(long = "demand", value_parser = parse_pair)]
    demand: Vec<(String, f64)>,

    /// Mixed-paper yield loss in percent
    #[arg(long)]
    mixed_paper_loss: Option<f64>,

    /// Sample a per-category fiber degradation
    #[arg(long)]
    degrade: bool,

    /// Recovery system for contamination: mix, ssr or dual
    #[arg(long)]
    contamination: Option<String>,

    /// Fixed contamination rate in (0, 1]
    #[arg(long, requires = "contamination")]
    contamination_rate: Option<f64>,

    /// Print the full flow tables of every solve
    #[arg(long)]
    flows: bool,
}

fn parse_pair(s: &str) -> Result<(String, f64), String> {
    let (name, value) = s.split_once('=').ok_or_else(|| format!("expected NAME=VALUE, got `{s}`"))?;
    let value = value.trim().parse::<f64>().map_err(|e| format!("{value}: {e}"))?;
    Ok((name.trim().to_string(), value))
}

fn report(label: &str, report: &SolveReport, flows: bool) -> Result<(), Box<dyn std::error::Error>> {
    match report.objective {
        Some(objective) => println!("{label}: {:?} objective={objective:.4}", report.status),
        None => println!("{label}: {:?}", report.status),
    }
    if flows {
        if let Some(results) = &report.flows {
            println!("{}", results.to_pretty_json()?);
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut run = match &cli.config {
        Some(path) => RunConfig::from_path(path)?,
        None => RunConfig {
            solver: fiberflow::SolverConfig::from_env(),
            ..RunConfig::default()
        },
    };
    if let Some(seed) = cli.seed {
        run.seed = seed;
    }

    let params = ParameterStore::from_path(&cli.params)?;
    let products = run.products_for(&params);
    let solver = run.solver.build();
    let mut rng = ChaCha8Rng::seed_from_u64(run.seed);
    info!(params = %cli.params.display(), solver = solver.name(), seed = run.seed, "starting run");

    let mut model = FiberModel::build(run.name.clone(), &params, &products)?;
    let base = model.solve(&solver)?;
    report("base", &base, cli.flows)?;

    if !cli.targets.is_empty() {
        let targets: Vec<(&str, f64)> = cli.targets.iter().map(|(p, v)| (p.as_str(), *v)).collect();
        model.set_recycled_content_targets(&targets)?;
    }
    if !cli.demand.is_empty() {
        let changes: Vec<(&str, f64)> = cli.demand.iter().map(|(p, v)| (p.as_str(), *v)).collect();
        model.change_demand(&changes)?;
    }
    if let Some(loss) = cli.mixed_paper_loss {
        model.degrade_mixed_paper_yield(loss)?;
    }
    if cli.degrade {
        let outcome = model.degrade_fibers(Degradation::Sampled, &mut rng)?;
        for (category, loss) in &outcome.degradation {
            info!(category = category.as_str(), loss, "sampled degradation");
        }
    }
    if let Some(system) = &cli.contamination {
        let outcome = model.contaminate_collection(system, cli.contamination_rate, &mut rng)?;
        if let Some(rate) = outcome.contamination_rate {
            info!(system = %system, rate, "contamination applied");
        }
    }

    if model.state().is_baseline() {
        return Ok(());
    }

    let scenario = model.solve(&solver)?;
    report("scenario", &scenario, cli.flows)?;
    if !scenario.is_optimal() {
        let diagnosis = model.relax(&solver)?;
        warn!(total = diagnosis.total_violation, "scenario infeasible; smallest relaxation follows");
        for v in &diagnosis.violations {
            println!("  {} ({}) {} {:.6}", v.constraint, v.group, v.slack, v.amount);
        }
    }
    Ok(())
}
