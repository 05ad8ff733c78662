pub mod config;
pub mod env;
pub mod error;
pub mod eval;
pub mod evaluate;
pub mod gc;
pub mod jpath;
pub mod k8s;
pub mod objects;
pub mod patch;
pub mod pipeline;
pub mod pristine;
pub mod reconcile;
pub mod telemetry;
pub mod yaml;
