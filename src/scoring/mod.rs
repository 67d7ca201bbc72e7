//! Suspiciousness scoring over collected spectra

pub mod engine;
pub mod metrics;

pub use engine::{compute_suspiciousness, SuspiciousnessEngine};
pub use metrics::{dstar, ensemble, ochiai, tarantula, EnsembleStrategy, DSTAR_EXPONENT};
