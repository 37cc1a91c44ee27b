use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use gridflow::debug::format_bus_table;
use gridflow::{
    cases, is_n1_secure, run_contingency_analysis, runpf, simulate_frequency_response,
    linear_solver, Alg, BlackstartSequencer, Component, GeneratorType, Grid, GridOpt, LinSolver,
    LiveGrid, LoadClass, Network, PFOpt, PowerBalance, RealtimeLoop,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// AC power flow, N-1 security and grid-code control simulation.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Power Flow
    #[clap(name = "pf")]
    PowerFlow(PfArgs),

    /// N-1 Contingency Analysis
    #[clap(name = "n1")]
    Contingency(N1Args),

    /// Frequency response to a loss of generation
    Frequency(FrequencyArgs),

    /// Blackstart assessment and restoration sequence
    Blackstart,

    /// Real-time frequency and voltage control loop
    Realtime(RealtimeArgs),
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Case {
    TwoBus,
    Ring,
    Radial,
    Large,
}

#[derive(Args)]
struct CaseArgs {
    /// Built-in network.
    #[arg(long, value_enum, default_value_t = Case::Ring)]
    case: Case,

    /// Number of buses for the radial and large cases.
    #[arg(long)]
    buses: Option<usize>,
}

#[derive(Args)]
struct PfArgs {
    #[command(flatten)]
    case: CaseArgs,

    /// AC power flow algorithm.
    #[arg(long)]
    pub alg: Option<Alg>,

    /// Termination tolerance on per unit P & Q mismatch.
    #[arg(long)]
    pub tol: Option<f64>,

    /// Maximum number of iterations.
    #[arg(long)]
    pub max_it: Option<usize>,

    /// Linear solver for Newton and fast-decoupled updates.
    #[arg(long)]
    pub lin_solver: Option<LinSolver>,
}

#[derive(Args)]
struct N1Args {
    #[command(flatten)]
    pf: PfArgs,

    /// Analyse contingencies on a worker pool.
    #[arg(long, default_value_t = false)]
    parallel: bool,

    /// Upper bound on worker threads.
    #[arg(long)]
    workers: Option<usize>,
}

#[derive(Args)]
struct FrequencyArgs {
    /// Lost generation (MW).
    #[arg(long, default_value_t = 1000.0)]
    disturbance: f64,

    /// Simulated duration (s).
    #[arg(long, default_value_t = 30.0)]
    duration: f64,

    /// Online generation (MW).
    #[arg(long, default_value_t = 50000.0)]
    generation: f64,
}

#[derive(Args)]
struct RealtimeArgs {
    /// Wall-clock run time (s).
    #[arg(long, default_value_t = 5)]
    seconds: u64,

    /// Generation deficit applied at start (MW).
    #[arg(long, default_value_t = 500.0)]
    deficit: f64,
}

fn main() {
    env_logger::Builder::from_default_env()
        .format_level(false)
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    match execute(&cli) {
        Ok(_) => {
            std::process::exit(0);
        }
        Err(err) => {
            eprintln!("error: {}", err);
            std::process::exit(2);
        }
    }
}

fn execute(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::PowerFlow(args) => power_flow(args),
        Commands::Contingency(args) => contingency(args),
        Commands::Frequency(args) => frequency(args),
        Commands::Blackstart => blackstart(),
        Commands::Realtime(args) => realtime(args),
    }
}

fn load_case(args: &CaseArgs) -> Result<Network> {
    let network = match args.case {
        Case::TwoBus => cases::two_bus()?,
        Case::Ring => cases::ring()?,
        Case::Radial => cases::radial(args.buses.unwrap_or(10))?,
        Case::Large => cases::large(args.buses.unwrap_or(120))?,
    };
    Ok(network)
}

fn pf_options(args: &PfArgs) -> PFOpt {
    let mut opt = GridOpt::default().pf;
    if let Some(alg) = args.alg {
        opt.algorithm = alg;
    }
    if let Some(tol) = args.tol {
        opt.tolerance = tol;
    }
    if let Some(max_it) = args.max_it {
        opt.max_it = max_it;
    }
    if let Some(lin_solver) = args.lin_solver {
        opt.lin_solver = lin_solver;
    }
    opt
}

fn power_flow(args: &PfArgs) -> Result<()> {
    let mut network = load_case(&args.case)?;
    let opt = pf_options(args);
    let solver = linear_solver(opt.lin_solver);

    let result = runpf(&mut network, &opt, solver.as_ref())?;
    if !result.converged {
        return Err(anyhow::anyhow!("power flow did not succeed"));
    }

    let ids: Vec<&str> = network.buses().iter().map(|b| b.id.as_str()).collect();
    print!("{}", format_bus_table(&ids, &result.vm, &result.va));
    println!();
    for br in network.branches() {
        println!(
            "{:<12}  P={:9.2} MW  Q={:9.2} MVAr  loading={:6.1} %",
            br.id, br.p_from, br.q_from, br.loading
        );
    }
    println!(
        "{} iterations, losses {:.2} MW",
        result.iterations,
        network.total_losses()
    );
    Ok(())
}

fn contingency(args: &N1Args) -> Result<()> {
    let mut network = load_case(&args.pf.case)?;
    let opt = pf_options(&args.pf);
    let solver = linear_solver(opt.lin_solver);
    let workers = args
        .workers
        .unwrap_or(GridOpt::default().contingency.max_workers);
    let standards = network.standards().network.clone();

    let results = run_contingency_analysis(
        &mut network,
        args.parallel,
        workers,
        &opt,
        solver.as_ref(),
        &standards,
    )?;

    for r in &results {
        println!(
            "{:<28} converged={:<5}  dV={:.4} pu  overload={:6.1} %  shed={:7.1} MW{}",
            r.outage.to_string(),
            r.converged,
            r.voltage_violation,
            r.thermal_violation,
            r.load_shed,
            if r.critical { "  CRITICAL" } else { "" }
        );
    }
    println!("N-1 secure: {}", is_n1_secure(&results));
    Ok(())
}

fn frequency(args: &FrequencyArgs) -> Result<()> {
    let standards = gridflow::standards::Standards::default();
    print!("{}", standards.summary());
    let response =
        simulate_frequency_response(args.disturbance, args.duration, args.generation, &standards);
    for (t, f) in response.time.iter().zip(&response.frequency).step_by(10) {
        println!("t={:5.1} s  f={:.4} Hz", t, f);
    }
    println!(
        "max deviation {:.1} mHz, final state {}",
        response.max_deviation * 1000.0,
        response.final_state
    );
    Ok(())
}

fn blackstart() -> Result<()> {
    let components = vec![
        Component::generator("nuclear", GeneratorType::Nuclear, 1200.0),
        Component::generator("coal", GeneratorType::Coal, 600.0),
        Component::generator("gas", GeneratorType::Gas, 300.0).blackstart(10.0),
        Component::generator("hydro", GeneratorType::Hydro, 200.0).blackstart(5.0),
        Component::load("city", LoadClass::Normal, 1500.0),
        Component::load("hospital", LoadClass::Critical, 100.0),
        Component::load("industry", LoadClass::Important, 400.0),
    ];

    let mut sequencer = BlackstartSequencer::default();
    let assessment = sequencer.assess(&components);
    println!(
        "blackstart capacity {:.0} MW for {:.0} MW demand ({:.1} %), compliant: {}",
        assessment.total_capacity,
        assessment.area_demand,
        assessment.ratio * 100.0,
        assessment.meets_standard
    );

    sequencer.generate_sequence(&components)?;
    sequencer.start_restoration()?;
    while let Some(step) = sequencer.advance() {
        println!("{}", step);
    }
    Ok(())
}

fn realtime(args: &RealtimeArgs) -> Result<()> {
    let generation = 50_000.0;
    let standards = gridflow::standards::Standards::default();
    let balance = PowerBalance {
        generation: generation - args.deficit,
        load: generation,
        capacity: 60_000.0,
        fcr_available: standards.reserves.reference_incident,
        frr_available: 5_000.0,
        largest_unit: 1_600.0,
    };
    let live = Arc::new(Mutex::new(LiveGrid::new(balance, Grid::default(), standards)));

    let rt = RealtimeLoop::default();
    let handle = rt.start(live.clone())?;
    std::thread::sleep(Duration::from_secs(args.seconds));
    let steps = handle.stop();

    let live = live.lock();
    println!(
        "{} steps, f={:.4} Hz, state {}",
        steps,
        live.controller.frequency(),
        live.controller.state()
    );
    Ok(())
}
