pub mod bigfloat;
pub mod complex;
pub mod complex_big;
pub mod direct;
pub mod error;
pub mod fractal;
pub mod kind;
pub mod orbit;
pub mod perturbation;
pub mod series;
pub mod viewport;

pub use bigfloat::BigFloat;
pub use complex::Complex;
pub use complex_big::ComplexBig;
pub use direct::{iterate_direct, DEFAULT_PERIODICITY_INTERVAL};
pub use error::CoreError;
pub use fractal::{smoothed_iterations, FractalParams, IterationResult};
pub use kind::FractalKind;
pub use orbit::ReferenceOrbit;
pub use perturbation::{iterate_perturbation, PerturbationResult, DEFAULT_GLITCH_ALPHA};
pub use series::SeriesApproximation;
pub use viewport::Viewport;

/// Convenience result type for the core crate.
pub type Result<T> = std::result::Result<T, CoreError>;
