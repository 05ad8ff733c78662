//! Top-level error taxonomy.
//!
//! Each module defines its own `thiserror` enum; this module only aggregates
//! them for callers that need one error type, and provides the "first 3
//! verbatim, then N more" collapsing behavior shared by the evaluator (C5)
//! and the GC lister (C9).

use thiserror::Error;

use crate::{
	config::ConfigError,
	env::EnvError,
	eval::EvalError,
	gc::ListError,
	k8s::{client::ConnectionError, discovery::DiscoveryError},
	objects::ExtractError,
	reconcile::SyncError,
};

/// Errors that can escape the library boundary.
///
/// `is_runtime` classifies `Connection`/`Discovery`/`Sync` as failures that
/// are not the user's fault (network errors, cluster outages), as opposed
/// to `Configuration`/`Environment` errors, which are.
#[derive(Debug, Error)]
pub enum CoreError {
	#[error(transparent)]
	Configuration(#[from] ConfigError),

	#[error(transparent)]
	Environment(#[from] EnvError),

	#[error("evaluation failed: {0}")]
	Evaluation(#[from] Aggregate),

	#[error(transparent)]
	Extraction(#[from] ExtractError),

	#[error(transparent)]
	Eval(#[from] EvalError),

	#[error(transparent)]
	List(#[from] ListError),

	#[error(transparent)]
	Connection(#[from] ConnectionError),

	#[error(transparent)]
	Discovery(#[from] DiscoveryError),

	#[error(transparent)]
	Sync(#[from] SyncError),
}

impl CoreError {
	/// Whether this error class should suppress a usage banner, i.e. it is
	/// not caused by something the user authored incorrectly.
	pub fn is_runtime(&self) -> bool {
		matches!(self, CoreError::Connection(_) | CoreError::Discovery(_) | CoreError::Sync(_))
	}
}

/// An aggregate of up to an unbounded number of errors, displayed as the
/// first three verbatim followed by a "... and N more errors" summary.
///
/// Workers never format user-visible output themselves: they hand errors to
/// one aggregator which decides presentation.
#[derive(Debug, Error)]
#[error("{}", format_aggregate(.0))]
pub struct Aggregate(pub Vec<String>);

const VERBATIM_LIMIT: usize = 3;

fn format_aggregate(errors: &[String]) -> String {
	if errors.is_empty() {
		return "no errors".to_owned();
	}
	let mut out = String::new();
	for (i, e) in errors.iter().take(VERBATIM_LIMIT).enumerate() {
		if i > 0 {
			out.push('\n');
		}
		out.push_str(e);
	}
	if errors.len() > VERBATIM_LIMIT {
		out.push_str(&format!(
			"\n... and {} more errors",
			errors.len() - VERBATIM_LIMIT
		));
	}
	out
}

impl Aggregate {
	pub fn from_errors(errors: Vec<String>) -> Option<Self> {
		if errors.is_empty() {
			None
		} else {
			Some(Aggregate(errors))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn collapses_after_three() {
		let errors: Vec<String> = (0..5).map(|i| format!("error {i}")).collect();
		let agg = Aggregate(errors);
		let msg = agg.to_string();
		assert!(msg.contains("error 0"));
		assert!(msg.contains("error 2"));
		assert!(!msg.contains("error 3"));
		assert!(msg.contains("... and 2 more errors"));
	}

	#[test]
	fn single_error_has_no_summary() {
		let agg = Aggregate(vec!["boom".to_owned()]);
		assert_eq!(agg.to_string(), "boom");
	}
}
