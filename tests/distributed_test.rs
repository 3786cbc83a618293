//! Multi-process distributed solver tests.
//!
//! These tests require MPI and the `distributed` feature flag.
//! Run with: mpirun -n 2 cargo test --features distributed --test distributed_test
//!
//! Without MPI installed, these tests are excluded from the default build.

#![cfg(feature = "distributed")]

use approx::assert_abs_diff_eq;
use powerrank::solver::comm::{CommunicationBackend, COORDINATOR};
use powerrank::solver::comm_mpi::MpiComm;
use powerrank::solver::{run_rank, SolveOptions, Variant};

#[test]
fn distributed_four_teams_every_rank() {
    // MPI can only be initialized once per process, so both variants run
    // inside this one test. With a single rank this exercises the
    // degenerate case; under mpirun -n 2 or -n 4 the real exchange.
    let _universe = mpi::initialize().expect("MPI init failed");
    let comm = MpiComm::new();

    let season = powerrank::parser::parse(
        "Alpha\nBravo\nCharlie\nDelta\n",
        "1 2 20 10\n3 4 17 7\n1 3 10 7\n2 4 6 3\n-1\n",
    )
    .expect("parse failed");
    let system = powerrank::compiler::compile(&season).expect("compile failed");

    for variant in [Variant::PointToPoint, Variant::Collective] {
        let options = SolveOptions {
            variant,
            workers: Some(comm.num_ranks()),
            ..SolveOptions::default()
        };
        let local = (comm.rank() == COORDINATOR).then_some(&system);
        let result = run_rank(&comm, local, &options).expect("solve failed");

        if comm.rank() == COORDINATOR {
            let solution = result.expect("coordinator holds the solution");
            assert_eq!(solution.rounds, 2);
            assert_abs_diff_eq!(solution.ratings[0], 106.5, epsilon = 1e-12);
            assert_abs_diff_eq!(solution.ratings[1], 96.5, epsilon = 1e-12);
            assert_abs_diff_eq!(solution.ratings[2], 103.5, epsilon = 1e-12);
            assert_abs_diff_eq!(solution.ratings[3], 93.5, epsilon = 1e-12);
        } else {
            assert!(result.is_none());
        }
    }
}
