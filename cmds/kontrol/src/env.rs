//! App/environment model, part two (C4): the `Environment` type, the
//! inline + external-file + CLI-file merge chain, cross-field validation,
//! and `ComponentsFor`/`DefaultNamespace`.

use std::{collections::BTreeSet, fs, path::Path, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::config::{AppSpec, Component, ConfigError, EnvironmentMapDescriptor};

/// Reserved environment name used for components with no environment-specific
/// overrides (spec glossary: "Baseline").
pub const BASELINE_ENV: &str = "_";

/// Context namespaces beginning with this prefix are reserved for the
/// tool's own bookkeeping and may not be used as a context name.
const RESERVED_CONTEXT_PREFIX: &str = "__";

static ENV_NAME_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("valid regex"));
static TAG_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]([-A-Za-z0-9_.]*[A-Za-z0-9])?$").expect("valid regex"));

#[derive(Debug, Error)]
pub enum EnvError {
	#[error("reading env file {path}: {source}")]
	Io {
		path: String,
		#[source]
		source: std::io::Error,
	},

	#[error("parsing env file {path}: {source}")]
	Parse {
		path: String,
		#[source]
		source: serde_yaml_with_quirks::Error,
	},

	#[error("environment `{0}`: name must match a DNS label, e.g. `prod`, `staging-eu`")]
	InvalidName(String),

	#[error("environment `{0}`: exactly one of `server` or `context` must be set")]
	ServerAndContext(String),

	#[error("environment `{env}`: context `{context}` uses the reserved `__` prefix")]
	ReservedContextPrefix { env: String, context: String },

	#[error("tag `{0}` does not match the label-value pattern")]
	InvalidTag(String),

	#[error("no such environment `{name}`")]
	UnknownEnvironment { name: String },

	#[error(transparent)]
	Config(#[from] ConfigError),
}

/// A named deployment target (spec §3: "Environment").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
	#[serde(default)]
	pub default_namespace: Option<String>,
	#[serde(default)]
	pub server: Option<String>,
	#[serde(default)]
	pub context: Option<String>,
	#[serde(default)]
	pub includes: Vec<String>,
	#[serde(default)]
	pub excludes: Vec<String>,
	#[serde(default)]
	pub properties: Option<Value>,
	/// Source this environment definition was last loaded from, kept only
	/// for the "later definitions replace earlier, log a warning with the
	/// prior source" rule (spec §4.4 step 2).
	#[serde(skip)]
	pub source: Option<String>,
}

/// Merge environments: inline definitions first, then each referenced env
/// file in order, then command-line env files. Later definitions replace
/// earlier ones for the same env name, logging a warning with the prior
/// source (spec §4.4 step 2).
pub fn merge_environments(
	app: &AppSpec,
	root: &Path,
	cli_env_files: &[std::path::PathBuf],
) -> Result<std::collections::BTreeMap<String, Environment>, EnvError> {
	let mut merged = app.spec.environments.clone();
	for (name, env) in merged.iter_mut() {
		env.source = Some(format!("inline:{name}"));
	}

	for file in &app.spec.external_env_files {
		merge_one_file(&mut merged, &root.join(file), file.display().to_string())?;
	}
	for file in cli_env_files {
		merge_one_file(&mut merged, &root.join(file), file.display().to_string())?;
	}

	Ok(merged)
}

fn merge_one_file(
	merged: &mut std::collections::BTreeMap<String, Environment>,
	path: &Path,
	source_label: String,
) -> Result<(), EnvError> {
	let content = fs::read_to_string(path).map_err(|source| EnvError::Io {
		path: path.display().to_string(),
		source,
	})?;
	let descriptor: EnvironmentMapDescriptor =
		serde_yaml_with_quirks::from_str(&content).map_err(|source| EnvError::Parse {
			path: path.display().to_string(),
			source,
		})?;

	for (name, mut env) in descriptor.environments {
		if let Some(prior) = merged.get(&name) {
			warn!(
				env = %name,
				prior_source = %prior.source.as_deref().unwrap_or("<unknown>"),
				new_source = %source_label,
				"environment definition replaced"
			);
		}
		env.source = Some(source_label.clone());
		merged.insert(name, env);
	}
	Ok(())
}

/// Validate environments (spec §4.4 step 3): name matches a DNS label
/// (the reserved baseline `_` is exempt), exactly one of `server`/`context`
/// is set, `context` does not start with the reserved prefix.
pub fn validate_environments(
	envs: &std::collections::BTreeMap<String, Environment>,
) -> Result<(), EnvError> {
	for (name, env) in envs {
		if name != BASELINE_ENV && !ENV_NAME_RE.is_match(name) {
			return Err(EnvError::InvalidName(name.clone()));
		}
		match (&env.server, &env.context) {
			(Some(_), None) | (None, Some(_)) => {}
			_ => return Err(EnvError::ServerAndContext(name.clone())),
		}
		if let Some(context) = &env.context {
			if context.starts_with(RESERVED_CONTEXT_PREFIX) {
				return Err(EnvError::ReservedContextPrefix {
					env: name.clone(),
					context: context.clone(),
				});
			}
		}
	}
	Ok(())
}

/// Resolve tag syntax, validating it against the label-value pattern
/// (spec §4.4 step 6).
pub fn resolve_tag(tag: Option<&str>) -> Result<Option<String>, EnvError> {
	match tag {
		None => Ok(None),
		Some(t) if TAG_RE.is_match(t) => Ok(Some(t.to_owned())),
		Some(t) => Err(EnvError::InvalidTag(t.to_owned())),
	}
}

/// Deep-merge of base properties with env properties (spec §4.4
/// `Properties`). Baseline returns base properties as-is.
pub fn properties_for(app: &AppSpec, env_name: &str, env: Option<&Environment>) -> Value {
	if env_name == BASELINE_ENV {
		return app.spec.base_properties.clone();
	}
	match env.and_then(|e| e.properties.as_ref()) {
		Some(overlay) => crate::config::merge_properties(&app.spec.base_properties, overlay),
		None => app.spec.base_properties.clone(),
	}
}

/// Resolve the component set for an environment (spec §4.4 `ComponentsFor`):
/// start from the default set minus default excludes, apply env
/// includes/excludes, then the caller's include/exclude filter (mutually
/// exclusive). Returns components sorted by name.
pub fn components_for<'a>(
	app: &AppSpec,
	components: &'a [Component],
	env: Option<&Environment>,
	call_includes: &[String],
	call_excludes: &[String],
) -> Result<Vec<&'a Component>, EnvError> {
	if !call_includes.is_empty() && !call_excludes.is_empty() {
		return Err(EnvError::Config(ConfigError::Validation(
			"caller must specify an include list or an exclude list, not both".to_owned(),
		)));
	}

	let default_excludes: BTreeSet<&str> =
		app.spec.default_excludes.iter().map(String::as_str).collect();
	let mut selected: BTreeSet<&str> = components
		.iter()
		.map(|c| c.name.as_str())
		.filter(|n| !default_excludes.contains(n))
		.collect();

	if let Some(env) = env {
		for name in &env.includes {
			if default_excludes.contains(name.as_str()) {
				warn!(component = %name, "environment include duplicates a default include");
			}
			selected.insert(name.as_str());
		}
		for name in &env.excludes {
			if !default_excludes.contains(name.as_str()) {
				selected.remove(name.as_str());
			} else {
				warn!(component = %name, "environment exclude duplicates a default exclude");
			}
		}
	}

	if !call_includes.is_empty() {
		selected = call_includes.iter().map(String::as_str).collect();
	} else if !call_excludes.is_empty() {
		for name in call_excludes {
			selected.remove(name.as_str());
		}
	}

	let mut out: Vec<&Component> = components
		.iter()
		.filter(|c| selected.contains(c.name.as_str()))
		.collect();
	out.sort_by(|a, b| a.name.cmp(&b.name));
	Ok(out)
}

/// Resolve the default namespace for an environment (spec §4.4
/// `DefaultNamespace`): override if set, else env default, else `"default"`.
/// If a tag is active and the app opts into namespace tagging, append
/// `-<tag>`.
pub fn default_namespace(
	app: &AppSpec,
	env: Option<&Environment>,
	override_ns: Option<&str>,
	tag: Option<&str>,
) -> String {
	let base = override_ns
		.map(str::to_owned)
		.or_else(|| env.and_then(|e| e.default_namespace.clone()))
		.unwrap_or_else(|| "default".to_owned());

	match (app.spec.namespace_tag_suffix, tag) {
		(true, Some(tag)) => format!("{base}-{tag}"),
		_ => base,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::AppSpecBody;
	use std::path::PathBuf;

	fn app_with(default_excludes: Vec<&str>) -> AppSpec {
		AppSpec {
			api_version: "kontrol.dev/v1".to_owned(),
			kind: crate::config::DescriptorKind::App,
			metadata: crate::config::AppMetadata {
				name: "myapp".to_owned(),
			},
			spec: AppSpecBody {
				components_dir: PathBuf::from("components"),
				params_file: None,
				library_paths: Vec::new(),
				base_properties: serde_json::json!({}),
				default_excludes: default_excludes.into_iter().map(str::to_owned).collect(),
				pre_processors: Vec::new(),
				post_processors: Vec::new(),
				environments: Default::default(),
				external_env_files: Vec::new(),
				external_vars: Default::default(),
				top_level_vars: Default::default(),
				cluster_scoped_lists: false,
				namespace_tag_suffix: false,
			},
		}
	}

	fn component(name: &str) -> Component {
		Component {
			name: name.to_owned(),
			files: Vec::new(),
			top_level_vars: Vec::new(),
		}
	}

	#[test]
	fn scenario_s2_env_include_overrides_default_exclude() {
		let app = app_with(vec!["service2"]);
		let components = vec![component("service1"), component("service2")];

		let env_with_include = Environment {
			includes: vec!["service2".to_owned()],
			..Default::default()
		};
		let with = components_for(&app, &components, Some(&env_with_include), &[], &[]).unwrap();
		assert!(with.iter().any(|c| c.name == "service2"));

		let excluded =
			components_for(&app, &components, Some(&env_with_include), &[], &["service2".to_owned()])
				.unwrap();
		assert!(!excluded.iter().any(|c| c.name == "service2"));
	}

	#[test]
	fn mutually_exclusive_call_filters_error() {
		let app = app_with(vec![]);
		let components = vec![component("a")];
		let err = components_for(
			&app,
			&components,
			None,
			&["a".to_owned()],
			&["a".to_owned()],
		)
		.unwrap_err();
		assert!(matches!(err, EnvError::Config(_)));
	}

	#[test]
	fn default_namespace_falls_back_through_chain() {
		let mut app = app_with(vec![]);
		app.spec.namespace_tag_suffix = true;
		let env = Environment {
			default_namespace: Some("team-ns".to_owned()),
			..Default::default()
		};
		assert_eq!(default_namespace(&app, Some(&env), None, None), "team-ns");
		assert_eq!(
			default_namespace(&app, Some(&env), None, Some("v1")),
			"team-ns-v1"
		);
		assert_eq!(default_namespace(&app, None, None, None), "default");
		assert_eq!(
			default_namespace(&app, Some(&env), Some("explicit"), None),
			"explicit"
		);
	}

	#[test]
	fn server_and_context_both_set_is_invalid() {
		let mut envs = std::collections::BTreeMap::new();
		envs.insert(
			"prod".to_owned(),
			Environment {
				server: Some("https://x".to_owned()),
				context: Some("ctx".to_owned()),
				..Default::default()
			},
		);
		assert!(validate_environments(&envs).is_err());
	}

	#[test]
	fn baseline_name_is_exempt_from_dns_label_check() {
		let mut envs = std::collections::BTreeMap::new();
		envs.insert(
			BASELINE_ENV.to_owned(),
			Environment {
				server: Some("https://x".to_owned()),
				..Default::default()
			},
		);
		assert!(validate_environments(&envs).is_ok());
	}

	#[test]
	fn tag_must_match_label_value_pattern() {
		assert!(resolve_tag(Some("v1.2.3")).is_ok());
		assert!(resolve_tag(Some("has spaces")).is_err());
	}
}
