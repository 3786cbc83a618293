//! Coordinator-side convergence test.

/// Per-entity tolerance used when none is configured.
pub const DEFAULT_TOLERANCE: f64 = 0.05;

/// Control message the coordinator sends to every worker after each round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// At least one entity moved by `tolerance` or more; run another round.
    Continue,
    /// Every entity moved by strictly less than `tolerance`; stop.
    Converged,
}

impl Verdict {
    /// Wire code for transports that carry plain integers.
    pub fn code(self) -> u8 {
        match self {
            Verdict::Continue => 0,
            Verdict::Converged => 1,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Verdict::Continue),
            1 => Some(Verdict::Converged),
            _ => None,
        }
    }
}

/// Largest per-entity change between two rounds.
pub fn max_delta(previous: &[f64], current: &[f64]) -> f64 {
    previous
        .iter()
        .zip(current)
        .map(|(p, c)| (p - c).abs())
        .fold(0.0, f64::max)
}

/// Decide whether the round converged.
///
/// Converged only when every `|previous[i] - current[i]|` is strictly below
/// `tolerance`. A NaN delta never converges.
pub fn check(previous: &[f64], current: &[f64], tolerance: f64) -> Verdict {
    debug_assert_eq!(previous.len(), current.len());
    let converged = previous
        .iter()
        .zip(current)
        .all(|(p, c)| (p - c).abs() < tolerance);
    if converged {
        Verdict::Converged
    } else {
        Verdict::Continue
    }
}
