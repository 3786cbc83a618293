use clap::Parser;
use powerrank::compiler;
use powerrank::output;
use powerrank::parser;
use powerrank::solver::convergence::DEFAULT_TOLERANCE;
use powerrank::solver::cpu::CpuSolver;
use powerrank::solver::jacobi::DEFAULT_INITIAL_RATING;
use powerrank::solver::partition::PartitionStrategy;
use powerrank::solver::{
    LocalSolver, RatingSolution, RatingSolver, SolveOptions, Variant, DEFAULT_MAX_ROUNDS,
};
use std::io;
use std::path::PathBuf;
use std::time::Instant;

/// Power ratings by distributed Jacobi iteration
#[derive(Parser)]
#[command(name = "powerrank", version)]
struct Cli {
    /// Team names file, one name per line
    names: PathBuf,

    /// Game results file: `home away home_score away_score`, 1-based indices
    results: PathBuf,

    /// Number of workers (default: 8 for point-to-point, one per team for collective)
    #[arg(short, long)]
    workers: Option<usize>,

    /// How workers merge each round: point-to-point or collective
    #[arg(long, default_value_t = Variant::PointToPoint)]
    variant: Variant,

    /// How teams are assigned to workers: strided or block
    #[arg(long, default_value_t = PartitionStrategy::Strided)]
    partition: PartitionStrategy,

    /// Stop once every rating moves by less than this between rounds
    #[arg(short, long, default_value_t = DEFAULT_TOLERANCE)]
    tolerance: f64,

    /// Rating every team starts from
    #[arg(long, default_value_t = DEFAULT_INITIAL_RATING)]
    initial_rating: f64,

    /// Give up after this many rounds
    #[arg(long, default_value_t = DEFAULT_MAX_ROUNDS)]
    max_rounds: usize,

    /// Solve in one process with the shared-memory reference solver
    #[arg(long, conflicts_with_all = ["workers", "variant", "partition"])]
    shared_memory: bool,

    /// Run as one rank of an MPI job (launch with mpirun)
    #[cfg(feature = "distributed")]
    #[arg(long)]
    mpi: bool,

    /// Print ratings as CSV
    #[arg(long)]
    csv: bool,

    /// Print performance stats to stderr
    #[arg(long)]
    stats: bool,
}

impl Cli {
    fn options(&self) -> SolveOptions {
        SolveOptions {
            variant: self.variant,
            workers: self.workers,
            strategy: self.partition,
            tolerance: self.tolerance,
            initial_rating: self.initial_rating,
            max_rounds: self.max_rounds,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    #[cfg(feature = "distributed")]
    if cli.mpi {
        run_mpi(&cli);
        return;
    }

    let mut stats = if cli.stats { Some(powerrank::stats::Stats::new()) } else { None };

    let load_start = Instant::now();
    let season = parser::load(&cli.names, &cli.results).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });
    let system = compiler::compile(&season).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });
    if let Some(ref mut stats) = stats {
        stats.add_phase("Load", load_start.elapsed());
        stats.entities = system.size();
        stats.games = season.games.len();
    }

    let options = cli.options();
    let solver: Box<dyn RatingSolver> = if cli.shared_memory {
        Box::new(CpuSolver::new(options))
    } else {
        Box::new(LocalSolver::new(options))
    };

    let solve_start = Instant::now();
    let solution = solver.solve(&system).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });
    if let Some(ref mut stats) = stats {
        stats.add_phase("Solve", solve_start.elapsed());
        stats.workers = if cli.shared_memory { 1 } else { options.worker_count(system.size()) };
        stats.rounds = solution.rounds;
        stats.messages = solution.messages;
    }

    print_solution(&cli, &system.names, &solution);

    if let Some(ref stats) = stats {
        stats.display();
    }
}

fn print_solution(cli: &Cli, names: &[String], solution: &RatingSolution) {
    let mut stdout = io::stdout();
    let written = if cli.csv {
        output::write_csv(names, solution, &mut stdout)
    } else {
        output::write_report(names, solution, &mut stdout)
    };
    written.unwrap_or_else(|e| {
        eprintln!("Output error: {}", e);
        std::process::exit(1);
    });
}

/// One rank of an MPI job. Rank 0 loads the input and prints the results;
/// the worker count is the world size.
#[cfg(feature = "distributed")]
fn run_mpi(cli: &Cli) {
    use powerrank::solver::comm::{CommunicationBackend, COORDINATOR};
    use powerrank::solver::comm_mpi::MpiComm;
    use powerrank::solver::partition::Partition;
    use powerrank::solver::run_rank;

    let _universe = mpi::initialize().unwrap_or_else(|| {
        eprintln!("Error: MPI initialization failed");
        std::process::exit(1);
    });
    let comm = MpiComm::new();
    let options = cli.options();

    let system = if comm.rank() == COORDINATOR {
        let loaded = parser::load(&cli.names, &cli.results)
            .and_then(|season| compiler::compile(&season))
            .and_then(|system| {
                Partition::new(system.size(), comm.num_ranks(), options.strategy)?;
                Ok(system)
            });
        match loaded {
            Ok(system) => Some(system),
            Err(e) => {
                eprintln!("Error: {}", e);
                comm.abort(1)
            }
        }
    } else {
        None
    };

    match run_rank(&comm, system.as_ref(), &options) {
        Ok(Some(solution)) => {
            if let Some(system) = &system {
                print_solution(cli, &system.names, &solution);
            }
        }
        Ok(None) => {}
        Err(e) => {
            if comm.rank() == COORDINATOR {
                eprintln!("Error: {}", e);
            }
            comm.abort(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_match_solver_defaults() {
        let cli = Cli::try_parse_from(["powerrank", "names.dat", "results.dat"]).unwrap();
        assert_eq!(cli.options(), SolveOptions::default());
    }

    #[test]
    fn shared_memory_rejects_distributed_flags() {
        for extra in [["-w", "4"], ["--variant", "collective"], ["--partition", "block"]] {
            let mut args = vec!["powerrank", "names.dat", "results.dat", "--shared-memory"];
            args.extend(extra);
            assert!(Cli::try_parse_from(args).is_err(), "{:?} accepted", extra);
        }
        assert!(Cli::try_parse_from(["powerrank", "n", "r", "--shared-memory", "-t", "0.01"]).is_ok());
    }
}
