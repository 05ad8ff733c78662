//! Whole-run pipeline: descriptor load through evaluate, sync and prune,
//! factored out of the binary so integration tests can drive the same
//! code path the `kontrol` binary does, against a mock cluster.
//!
//! `main.rs` is a thin CLI shim over these library functions
//! (`evaluate_environment`, `sync_environment`, `prune_environment`) so
//! integration tests can call them directly with a mock
//! `ClusterConnection` instead of parsing CLI output.

use std::{collections::HashSet, path::{Path, PathBuf}};

use kube::core::GroupVersionKind;

use crate::{
	config::AppSpec,
	env::{self, Environment},
	error::{Aggregate, CoreError},
	evaluate::{self, EvaluateContext, EvaluateOptions},
	gc::{self, ObjectKey},
	k8s::{
		client::ClusterConnection,
		discovery::{gvk_from_manifest, ApiResourceCache},
		list::{self, ListQuery},
		ResourceScope,
	},
	objects::LocalObject,
	reconcile::{Reconciler, SyncOptions, SyncResult},
};

/// Everything `evaluate_environment` produces: the stamped objects plus the
/// resolved environment facts later phases need (spec §4.4-4.5).
pub struct EvaluatedEnvironment {
	pub objects: Vec<LocalObject>,
	pub environment: Option<Environment>,
	pub default_namespace: String,
	pub tag: Option<String>,
}

/// Load the descriptor, merge environment definitions, and evaluate every
/// selected component (spec §4.4 `AppSpec`, §4.5 `Evaluate`). `root`
/// overrides the descriptor's parent directory as the resolution root for
/// `componentsDir`/`libraryPaths`/`externalEnvFiles` (spec §6 `KONTROL_ROOT`).
pub async fn evaluate_environment(
	descriptor: &Path,
	environment_name: &str,
	root: Option<PathBuf>,
	tag: Option<&str>,
	extra_env_files: &[PathBuf],
	clean_mode: bool,
) -> Result<(AppSpec, EvaluatedEnvironment), CoreError> {
	let app = AppSpec::load(descriptor)?;
	let root = root
		.or_else(|| descriptor.parent().map(PathBuf::from))
		.unwrap_or_else(|| PathBuf::from("."));

	let components = app.discover_components(&root)?;

	let environments = env::merge_environments(&app, &root, extra_env_files)
		.map_err(CoreError::from)?;
	env::validate_environments(&environments).map_err(CoreError::from)?;
	app.validate(&components)?;

	let tag = env::resolve_tag(tag).map_err(CoreError::from)?;
	let environment_def = environments.get(environment_name).cloned();
	if environment_name != env::BASELINE_ENV && environment_def.is_none() {
		return Err(CoreError::Environment(crate::env::EnvError::UnknownEnvironment {
			name: environment_name.to_owned(),
		}));
	}

	let default_namespace = env::default_namespace(&app, environment_def.as_ref(), None, tag.as_deref());
	let properties = env::properties_for(&app, environment_name, environment_def.as_ref());
	let selected = env::components_for(&app, &components, environment_def.as_ref(), &[], &[])
		.map_err(CoreError::from)?;
	let selected: Vec<_> = selected.into_iter().cloned().collect();

	let preprocessor_vars = evaluate::run_preprocessors(
		&root,
		&app,
		environment_name,
		tag.as_deref(),
		&default_namespace,
		&properties,
		clean_mode,
	)
	.map_err(|source| CoreError::Evaluation(Aggregate(vec![source.to_string()])))?;

	let baseline_environment = Environment::default();
	let ctx = EvaluateContext {
		root: &root,
		app: &app,
		environment_name,
		environment: environment_def.as_ref().unwrap_or(&baseline_environment),
		tag: tag.as_deref(),
		default_namespace: &default_namespace,
		properties: &properties,
		clean_mode,
		preprocessor_vars: &preprocessor_vars,
	};

	let (objects, errors) = evaluate::evaluate_components(&selected, &ctx, EvaluateOptions::default());
	if let Some(aggregate) = Aggregate::from_errors(errors.iter().map(ToString::to_string).collect()) {
		return Err(CoreError::Evaluation(aggregate));
	}

	Ok((
		app,
		EvaluatedEnvironment {
			objects,
			environment: environment_def,
			default_namespace,
			tag,
		},
	))
}

/// `Sync` every evaluated object against a live cluster (spec §4.8),
/// returning the per-object results plus the discovery cache and desired
/// key set a later `prune_environment` call needs.
pub async fn sync_environment(
	connection: &ClusterConnection,
	evaluated: &EvaluatedEnvironment,
	options: SyncOptions,
	discover_full: bool,
) -> Result<(Vec<SyncResult>, ApiResourceCache, HashSet<ObjectKey>), CoreError> {
	let mut required_keys: HashSet<GroupVersionKind> = evaluated
		.objects
		.iter()
		.filter_map(|o| gvk_from_manifest(&o.object.0))
		.collect();
	required_keys.insert(GroupVersionKind::gvk("", "v1", "Namespace"));

	let api_cache = ApiResourceCache::build(connection.client(), required_keys, discover_full).await?;

	let reconciler = Reconciler::new(
		connection.client().clone(),
		api_cache.clone(),
		evaluated.default_namespace.clone(),
	);

	let mut desired = HashSet::new();
	let mut results = Vec::with_capacity(evaluated.objects.len());
	for object in &evaluated.objects {
		if let Some(gvk) = gvk_from_manifest(&object.object.0) {
			if let Some(canonical) = api_cache.canonicalize(&gvk) {
				let scope = api_cache.lookup(&canonical.0).map(|d| d.scope);
				let namespace = resolve_desired_namespace(
					scope,
					object.object.namespace(),
					&evaluated.default_namespace,
				);
				desired.insert(ObjectKey {
					gvk: canonical,
					namespace,
					name: object
						.object
						.name()
						.or_else(|| object.object.generate_name())
						.unwrap_or_default()
						.to_owned(),
				});
			}
		}

		let result = reconciler.sync(object, options).await?;
		results.push(result);
	}

	Ok((results, api_cache, desired))
}

/// Re-resolve a desired object's namespace against its discovered scope
/// rather than trusting the object's literal `metadata.namespace`: a
/// namespaced object with none set is synced into `default_namespace` by
/// `reconcile::sync_inner`, and the desired key must match that or
/// `gc::prune_candidates` treats the just-created object as an orphan (spec
/// §4.9 `Remove`). A GVK the cache hasn't discovered (a CRD installed
/// earlier this run) falls back to the literal namespace, since its scope
/// isn't known yet.
fn resolve_desired_namespace(
	scope: Option<ResourceScope>,
	literal_namespace: Option<&str>,
	default_namespace: &str,
) -> Option<String> {
	match scope {
		Some(ResourceScope::Namespaced) => {
			Some(literal_namespace.unwrap_or(default_namespace).to_owned())
		}
		Some(ResourceScope::ClusterWide) => None,
		None => literal_namespace.map(str::to_owned),
	}
}

/// What happened to a `prune_environment` call: either every candidate was
/// actually submitted for deletion (possibly as a dry-run preview), or the
/// caller's approval gate held them back and only a count is reported.
#[derive(Debug)]
pub enum PruneOutcome {
	/// Deletion (or dry-run preview) was submitted for each candidate.
	Deleted(Vec<SyncResult>),
	/// Candidates exist but were not submitted; the caller must pass
	/// `assume_yes` or `dry_run` to act on them (spec §4.9).
	AwaitingApproval(usize),
}

/// `Prune` every live object matching the app/environment/tag selector that
/// is not in `desired` (spec §4.9). Candidates are only submitted for
/// deletion when `assume_yes` or `dry_run` is set; otherwise their count is
/// reported and nothing is touched, mirroring the binary's confirmation gate.
pub async fn prune_environment(
	connection: &ClusterConnection,
	api_cache: &ApiResourceCache,
	application: &str,
	environment_name: &str,
	tag: Option<&str>,
	desired: &HashSet<ObjectKey>,
	dry_run: bool,
	assume_yes: bool,
) -> Result<PruneOutcome, CoreError> {
	let cancel = tokio_util::sync::CancellationToken::new();
	let query = ListQuery {
		application,
		environment: environment_name,
		tag,
		kinds: &[],
	};
	let collection = list::collect(connection.client(), api_cache, &query, &cancel).await?;
	let candidates = gc::prune_candidates(&collection, desired);

	if !candidates.is_empty() && !assume_yes && !dry_run {
		return Ok(PruneOutcome::AwaitingApproval(candidates.len()));
	}

	let reconciler = Reconciler::new(
		connection.client().clone(),
		api_cache.clone(),
		connection.default_namespace().to_owned(),
	);

	let mut results = Vec::with_capacity(candidates.len());
	for key in candidates {
		let result = reconciler.delete(key, "gc", dry_run || !assume_yes).await?;
		results.push(result);
	}

	Ok(PruneOutcome::Deleted(results))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn namespaced_scope_keeps_the_objects_literal_namespace() {
		let namespace = resolve_desired_namespace(Some(ResourceScope::Namespaced), Some("team-a"), "default");
		assert_eq!(namespace, Some("team-a".to_owned()));
	}

	#[test]
	fn namespaced_scope_without_a_literal_namespace_falls_back_to_default() {
		let namespace = resolve_desired_namespace(Some(ResourceScope::Namespaced), None, "default");
		assert_eq!(namespace, Some("default".to_owned()));
	}

	#[test]
	fn cluster_wide_scope_is_always_namespaceless_even_with_a_literal_namespace() {
		let namespace = resolve_desired_namespace(Some(ResourceScope::ClusterWide), Some("stray"), "default");
		assert_eq!(namespace, None);

		let namespace = resolve_desired_namespace(Some(ResourceScope::ClusterWide), None, "default");
		assert_eq!(namespace, None);
	}

	#[test]
	fn undiscovered_scope_falls_back_to_the_literal_namespace_unchanged() {
		let namespace = resolve_desired_namespace(None, Some("team-a"), "default");
		assert_eq!(namespace, Some("team-a".to_owned()));

		let namespace = resolve_desired_namespace(None, None, "default");
		assert_eq!(namespace, None);
	}
}
