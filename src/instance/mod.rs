//! Per-instance evaluation
//!
//! # Modules
//!
//! - [`evaluator`]: Discovery → version resolution → vulnerability gate → metadata → score
//! - [`score`]: Ranking score of a live instance
//! - [`types`]: Records fetched from instances and the classified result

pub mod evaluator;
pub mod score;
pub mod types;

pub use evaluator::InstanceEvaluator;
pub use types::{
    AliveInstance, ClassifiedInstance, DeadInstance, Meta, NoteChart, OutdatedInstance,
};
