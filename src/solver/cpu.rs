//! Shared-memory Jacobi solver.
//!
//! Runs the same update rule and convergence test as the distributed
//! variants in one process, with the rows of each sweep computed in
//! parallel by rayon. Used as the reference the distributed runs are
//! checked against.

use rayon::prelude::*;

use crate::compiler::RatingSystem;
use crate::error::Result;

use super::convergence::{self, Verdict};
use super::jacobi::update;
use super::{round_cap_exceeded, RatingSolution, SolveOptions};

/// CPU-based shared-memory solver.
pub struct CpuSolver {
    options: SolveOptions,
}

impl CpuSolver {
    /// Solver using the tolerance, initial rating and round cap from
    /// `options`. Worker count and variant are ignored.
    pub fn new(options: SolveOptions) -> Self {
        Self { options }
    }
}

impl Default for CpuSolver {
    fn default() -> Self {
        Self::new(SolveOptions::default())
    }
}

impl super::RatingSolver for CpuSolver {
    fn solve(&self, system: &RatingSystem) -> Result<RatingSolution> {
        self.options.validate()?;
        let SolveOptions {
            tolerance,
            initial_rating,
            max_rounds,
            ..
        } = self.options;
        let _span = tracing::info_span!("cpu_jacobi", entities = system.size()).entered();

        let mut global = vec![initial_rating; system.size()];
        let mut rounds = 0;

        loop {
            rounds += 1;
            let next: Vec<f64> = (0..system.size())
                .into_par_iter()
                .map(|i| update(system.coeff.row(i), &global, system.target[i], system.played[i]))
                .collect();

            let verdict = convergence::check(&global, &next, tolerance);
            let max_delta = convergence::max_delta(&global, &next);
            tracing::debug!(round = rounds, max_delta, ?verdict, "sweep");
            global = next;

            if verdict == Verdict::Converged {
                tracing::info!(rounds, "Jacobi converged");
                return Ok(RatingSolution {
                    ratings: global,
                    rounds,
                    tolerance,
                    messages: 0,
                });
            }
            if rounds >= max_rounds {
                return Err(round_cap_exceeded(max_rounds, Some(max_delta)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{CoefficientMatrix, RatingSystem};
    use crate::error::RankingError;
    use crate::solver::RatingSolver;
    use approx::assert_abs_diff_eq;

    fn two_team_system(margin: i64) -> RatingSystem {
        let coeff = CoefficientMatrix::from_rows(&[vec![0, 1], vec![1, 0]]).unwrap();
        RatingSystem::from_parts(vec!["A".into(), "B".into()], coeff, vec![margin, -margin]).unwrap()
    }

    #[test]
    fn two_team_schedule_oscillates_until_cap() {
        // r0' = r1 + 10, r1' = r0 - 10: (100, 100) -> (110, 90) -> (100, 100).
        // A bipartite schedule oscillates forever, so the cap trips.
        let solver = CpuSolver::new(SolveOptions {
            max_rounds: 20,
            ..SolveOptions::default()
        });
        let err = solver.solve(&two_team_system(10)).unwrap_err();
        assert!(matches!(err, RankingError::Solve(_)));
    }

    #[test]
    fn balanced_pair_converges_in_one_round() {
        let solution = CpuSolver::default().solve(&two_team_system(0)).unwrap();
        assert_eq!(solution.rounds, 1);
        assert_abs_diff_eq!(solution.ratings[0], 100.0, epsilon = 1e-12);
        assert_abs_diff_eq!(solution.ratings[1], 100.0, epsilon = 1e-12);
    }
}
