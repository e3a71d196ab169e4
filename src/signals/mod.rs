//! Signal classification.

pub mod classifier;
pub mod history;
pub mod scoring;

pub use classifier::{Classification, SignalClassifier};
pub use history::{DeathCrossHistory, DeathCrossMark};
pub use scoring::*;
