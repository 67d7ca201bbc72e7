//! Suspiciousness formulas.
//!
//! Every function here is total: degenerate counts (no failing tests, an
//! uncovered line, an empty denominator) give 0.0, never NaN or infinity.

use serde::{Deserialize, Serialize};

/// Exponent of the DStar formula
pub const DSTAR_EXPONENT: i32 = 2;

/// Tarantula: share of failing coverage relative to passing coverage.
pub fn tarantula(ncf: usize, ncs: usize, nf: usize, ns: usize) -> f64 {
    if nf == 0 {
        return 0.0;
    }
    let fail_ratio = ncf as f64 / nf as f64;
    let pass_ratio = if ns > 0 { ncs as f64 / ns as f64 } else { 0.0 };
    let total = fail_ratio + pass_ratio;
    if total == 0.0 {
        0.0
    } else {
        fail_ratio / total
    }
}

/// Ochiai: `ncf / sqrt(nf * (ncf + ncs))`
pub fn ochiai(ncf: usize, ncs: usize, nf: usize, _ns: usize) -> f64 {
    let covered = ncf + ncs;
    if nf == 0 || covered == 0 {
        return 0.0;
    }
    (ncf as f64 / (nf as f64 * covered as f64).sqrt()).min(1.0)
}

/// DStar with exponent 2: `ncf² / (ncs + (nf - ncf))`. Unbounded above.
pub fn dstar(ncf: usize, ncs: usize, nf: usize, _ns: usize) -> f64 {
    let denominator = ncs + nf.saturating_sub(ncf);
    if denominator == 0 {
        return 0.0;
    }
    (ncf as f64).powi(DSTAR_EXPONENT) / denominator as f64
}

/// Plain mean of the three formulas.
pub fn ensemble(tarantula: f64, ochiai: f64, dstar: f64) -> f64 {
    (tarantula + ochiai + dstar) / 3.0
}

/// How the ensemble combines bounded and unbounded formulas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnsembleStrategy {
    /// `(tarantula + ochiai + dstar) / 3`
    #[default]
    Mean,
    /// DStar divided by the run's largest DStar before averaging, so every
    /// term lies in `[0, 1]`
    #[serde(rename = "max-scaled-dstar")]
    MaxScaledDStar,
}

impl EnsembleStrategy {
    /// Combine one line's scores. `max_dstar` is the largest DStar over
    /// every line of the run.
    pub fn combine(self, tarantula: f64, ochiai: f64, dstar: f64, max_dstar: f64) -> f64 {
        match self {
            Self::Mean => ensemble(tarantula, ochiai, dstar),
            Self::MaxScaledDStar => {
                let scaled = if max_dstar > 0.0 { dstar / max_dstar } else { 0.0 };
                ensemble(tarantula, ochiai, scaled)
            }
        }
    }
}

impl std::fmt::Display for EnsembleStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mean => write!(f, "mean"),
            Self::MaxScaledDStar => write!(f, "max-scaled-dstar"),
        }
    }
}
