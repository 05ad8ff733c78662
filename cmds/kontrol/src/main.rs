//! Thin binary wiring the object pipeline together for manual smoke testing.
//!
//! CLI parsing, kubeconfig/TLS plumbing and interactive confirmation are
//! external collaborators the library proper does not depend on; this
//! binary owns just enough of that surface to drive one evaluate-then-sync
//! pass end to end. The actual evaluate/sync/prune logic lives in
//! [`kontrol::pipeline`] so integration tests can call it directly against a
//! mock cluster.

use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::Parser;
use kontrol::{
	error::CoreError,
	k8s::client::ClusterConnection,
	pipeline,
	reconcile::SyncOptions,
	telemetry,
};

/// Environment variables this binary reads once at startup (spec §6:
/// `KONTROL_ROOT`, `KONTROL_ENV_FILE`, `KONTROL_YES`).
struct RuntimeConfig {
	/// Overrides the descriptor's parent directory as the resolution root
	/// for `componentsDir`/`libraryPaths`/`externalEnvFiles`.
	root: Option<PathBuf>,
	/// An additional environment-map file merged in after the descriptor's
	/// own `externalEnvFiles`.
	env_file: Option<PathBuf>,
	/// Skips the dry-run preview step before an actual prune delete.
	assume_yes: bool,
}

impl RuntimeConfig {
	fn from_env() -> Self {
		RuntimeConfig {
			root: std::env::var_os("KONTROL_ROOT").map(PathBuf::from),
			env_file: std::env::var_os("KONTROL_ENV_FILE").map(PathBuf::from),
			assume_yes: std::env::var_os("KONTROL_YES").is_some(),
		}
	}
}

#[derive(Parser)]
#[command(name = "kontrol")]
#[command(about = "Evaluate and reconcile a multi-environment Kubernetes app descriptor")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
	/// Path to the application descriptor file.
	descriptor: PathBuf,

	/// Environment name to evaluate. The reserved name `_` evaluates the
	/// baseline and prints the resulting objects without connecting to a
	/// cluster.
	environment: String,

	/// Tag stamped onto objects and used to scope the GC selector.
	#[arg(long)]
	tag: Option<String>,

	/// Compute patches/creates/deletes without submitting them.
	#[arg(long)]
	dry_run: bool,

	/// After syncing, delete live objects no longer in the desired set.
	#[arg(long)]
	prune: bool,

	/// Extra environment-map files, merged in after the descriptor's own.
	#[arg(long = "env-file")]
	env_files: Vec<PathBuf>,

	/// Log level (error, warn, info, debug, trace). Falls back to RUST_LOG.
	#[arg(long, global = true)]
	log_level: Option<tracing::Level>,
}

#[tokio::main]
async fn main() -> ExitCode {
	let cli = Cli::parse();

	let _telemetry_guard = match telemetry::init(cli.log_level) {
		Ok(guard) => guard,
		Err(err) => {
			eprintln!("failed to initialize telemetry: {err}");
			return ExitCode::FAILURE;
		}
	};

	match run(cli).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			eprintln!("error: {err:#}");
			if !suppresses_usage_banner(&err) {
				eprintln!("Usage: kontrol <descriptor> <environment> [--tag TAG] [--dry-run] [--prune]");
			}
			ExitCode::FAILURE
		}
	}
}

/// Whether `err` wraps a [`CoreError`] variant classified as a runtime
/// failure, i.e. a cluster/network problem rather than something the user's
/// descriptor got wrong (spec §6: exit codes distinguish the two so a usage
/// banner is not printed for failures that are not the user's fault).
fn suppresses_usage_banner(err: &anyhow::Error) -> bool {
	err.downcast_ref::<CoreError>().is_some_and(CoreError::is_runtime)
}

async fn run(cli: Cli) -> Result<()> {
	let runtime = RuntimeConfig::from_env();

	let mut env_files = cli.env_files.clone();
	env_files.extend(runtime.env_file.clone());

	let (app, evaluated) = pipeline::evaluate_environment(
		&cli.descriptor,
		&cli.environment,
		runtime.root.clone(),
		cli.tag.as_deref(),
		&env_files,
		cli.dry_run,
	)
	.await
	.map_err(anyhow::Error::from)?;

	tracing::info!(
		count = evaluated.objects.len(),
		environment = %cli.environment,
		"evaluated objects"
	);

	let Some(environment_def) = &evaluated.environment else {
		for object in &evaluated.objects {
			println!("{}", kontrol::yaml::to_yaml(&object.object.0).context("rendering object as YAML")?);
		}
		return Ok(());
	};

	let connection = ClusterConnection::from_environment(environment_def)
		.await
		.map_err(CoreError::from)?;

	let sync_options = SyncOptions {
		dry_run: cli.dry_run,
		disable_create: false,
	};

	let (results, api_cache, desired) =
		pipeline::sync_environment(&connection, &evaluated, sync_options, cli.prune)
			.await
			.map_err(anyhow::Error::from)?;
	for result in &results {
		tracing::info!(object = %result.display_name, outcome = ?result.outcome, "sync result");
	}

	if cli.prune {
		let outcome = pipeline::prune_environment(
			&connection,
			&api_cache,
			&app.metadata.name,
			&cli.environment,
			evaluated.tag.as_deref(),
			&desired,
			cli.dry_run,
			runtime.assume_yes,
		)
		.await
		.map_err(anyhow::Error::from)?;

		match outcome {
			pipeline::PruneOutcome::Deleted(results) => {
				for result in &results {
					tracing::info!(object = %result.display_name, outcome = ?result.outcome, "prune result");
				}
			}
			pipeline::PruneOutcome::AwaitingApproval(count) => {
				tracing::warn!(
					count,
					"prune candidates found; set KONTROL_YES=1 or pass --dry-run to act on them"
				);
			}
		}
	}

	Ok(())
}
