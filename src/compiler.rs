//! Rating system compiler.
//!
//! Converts a `Season` into the linear system solved by Jacobi iteration.
//!
//! # System
//!
//! For N entities the system is N x N. For each game between home `h` and
//! away `a` with differential `d = home_score - away_score`:
//!
//! ```text
//! coeff[h][a] += 1      target[h] += d
//! coeff[a][h] += 1      target[a] -= d
//! ```
//!
//! `played[i]` is the row sum of `coeff`. The fixed point satisfies
//!
//! ```text
//! played[i] * r[i] = sum_j coeff[i][j] * r[j] + target[i]
//! ```

use crate::error::{RankingError, Result};
use crate::ir::{EntityId, Season};

/// Dense N x N matchup count matrix, stored row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoefficientMatrix {
    n: usize,
    counts: Vec<i64>,
}

impl CoefficientMatrix {
    /// All-zero N x N matrix.
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            counts: vec![0; n * n],
        }
    }

    /// Build from explicit rows. Every row must have `rows.len()` entries.
    pub fn from_rows(rows: &[Vec<i64>]) -> Result<Self> {
        let n = rows.len();
        let mut counts = Vec::with_capacity(n * n);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n {
                return Err(RankingError::Config(format!(
                    "coefficient row {} has {} entries, expected {}",
                    i,
                    row.len(),
                    n
                )));
            }
            counts.extend_from_slice(row);
        }
        Ok(Self { n, counts })
    }

    pub fn dim(&self) -> usize {
        self.n
    }

    /// Matchups between `i` and `j`, or `None` if either is outside the matrix.
    pub fn get(&self, i: EntityId, j: EntityId) -> Option<i64> {
        if i < self.n && j < self.n {
            Some(self.counts[i * self.n + j])
        } else {
            None
        }
    }

    /// Row `i` as a slice of length N.
    ///
    /// # Panics
    ///
    /// Panics if `i` is not below `dim()`.
    pub fn row(&self, i: EntityId) -> &[i64] {
        &self.counts[i * self.n..(i + 1) * self.n]
    }

    fn increment(&mut self, i: EntityId, j: EntityId) {
        self.counts[i * self.n + j] += 1;
    }
}

/// The compiled rating system, immutable once built.
#[derive(Debug, Clone)]
pub struct RatingSystem {
    /// Entity names, indexed by entity id.
    pub names: Vec<String>,
    /// Head-to-head matchup counts.
    pub coeff: CoefficientMatrix,
    /// Accumulated score differential per entity.
    pub target: Vec<i64>,
    /// Total matchups per entity (row sums of `coeff`), the Jacobi divisor.
    pub played: Vec<i64>,
}

impl RatingSystem {
    /// Assemble a system from raw parts, deriving `played` from the rows.
    ///
    /// Fails if an entity has no games, since its update would divide by zero.
    pub fn from_parts(names: Vec<String>, coeff: CoefficientMatrix, target: Vec<i64>) -> Result<Self> {
        let n = names.len();
        if coeff.dim() != n || target.len() != n {
            return Err(RankingError::Config(format!(
                "dimension mismatch: {} names, {}x{} coefficients, {} targets",
                n,
                coeff.dim(),
                coeff.dim(),
                target.len()
            )));
        }

        let played: Vec<i64> = (0..n).map(|i| coeff.row(i).iter().sum()).collect();
        if let Some(idle) = played.iter().position(|&p| p <= 0) {
            return Err(RankingError::Solve(format!(
                "entity {} ('{}') has played no games; its rating is undefined",
                idle + 1,
                names[idle]
            )));
        }

        Ok(Self {
            names,
            coeff,
            target,
            played,
        })
    }

    /// Number of entities.
    pub fn size(&self) -> usize {
        self.names.len()
    }
}

/// Compile a season into its rating system.
pub fn compile(season: &Season) -> Result<RatingSystem> {
    let n = season.len();
    if n == 0 {
        return Err(RankingError::Config("season has no entities".into()));
    }

    let mut coeff = CoefficientMatrix::zeros(n);
    let mut target = vec![0i64; n];

    for game in &season.games {
        if game.home >= n || game.away >= n {
            return Err(RankingError::Config(format!(
                "game references entity outside 0..{}: {:?}",
                n, game
            )));
        }
        let diff = game.differential();
        target[game.home] += diff;
        target[game.away] -= diff;
        coeff.increment(game.home, game.away);
        coeff.increment(game.away, game.home);
    }

    RatingSystem::from_parts(season.names.clone(), coeff, target)
}
