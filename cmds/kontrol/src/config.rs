//! App/environment model, part one (C4): descriptor loading, component
//! discovery and properties merge. Environment validation and the
//! env-file merge chain live in [`crate::env`].

use std::{
	collections::BTreeMap,
	fs,
	path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::env::Environment;

/// Supported component source file extensions, matched against C2's
/// file-extension adapters.
const SUPPORTED_EXTENSIONS: &[&str] = &["jsonnet", "libsonnet", "yaml", "yml", "json"];

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("reading descriptor {path}: {source}")]
	Io {
		path: String,
		#[source]
		source: std::io::Error,
	},

	#[error("parsing descriptor {path}: {source}")]
	Parse {
		path: String,
		#[source]
		source: serde_yaml_with_quirks::Error,
	},

	#[error("descriptor validation failed:\n{0}")]
	Validation(String),

	#[error("components directory {0} does not exist")]
	MissingComponentsDir(String),

	#[error("reading components directory {path}: {source}")]
	ComponentsIo {
		path: String,
		#[source]
		source: std::io::Error,
	},
}

/// The top-level descriptor (spec §6: "Descriptor files").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSpec {
	pub api_version: String,
	pub kind: DescriptorKind,
	pub metadata: AppMetadata,
	pub spec: AppSpecBody,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DescriptorKind {
	App,
	EnvironmentMap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppMetadata {
	pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSpecBody {
	pub components_dir: PathBuf,
	#[serde(default)]
	pub params_file: Option<PathBuf>,
	#[serde(default)]
	pub library_paths: Vec<PathBuf>,
	#[serde(default)]
	pub base_properties: Value,
	#[serde(default)]
	pub default_excludes: Vec<String>,
	#[serde(default)]
	pub pre_processors: Vec<PathBuf>,
	#[serde(default)]
	pub post_processors: Vec<PathBuf>,
	#[serde(default)]
	pub environments: BTreeMap<String, Environment>,
	#[serde(default)]
	pub external_env_files: Vec<PathBuf>,
	#[serde(default)]
	pub external_vars: BTreeMap<String, Value>,
	#[serde(default)]
	pub top_level_vars: BTreeMap<String, Vec<String>>,
	/// Whether namespace-scoped list queries may span multiple namespaces
	/// in one request (used by C9).
	#[serde(default)]
	pub cluster_scoped_lists: bool,
	/// Whether `DefaultNamespace` appends `-<tag>` when a tag is active.
	#[serde(default)]
	pub namespace_tag_suffix: bool,
}

/// An external environment-map file: `kind: EnvironmentMap`, contributing
/// only to the environments map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentMapDescriptor {
	pub api_version: String,
	pub kind: DescriptorKind,
	#[serde(default)]
	pub environments: BTreeMap<String, Environment>,
}

/// A discovered component (spec §3: "Component").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
	pub name: String,
	pub files: Vec<PathBuf>,
	pub top_level_vars: Vec<String>,
}

impl AppSpec {
	/// Parse a descriptor file. Schema/cross-reference validation is a
	/// separate step ([`AppSpec::validate`]) so callers can load, merge
	/// environments, and validate once at the end.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
			path: path.display().to_string(),
			source,
		})?;
		let app: AppSpec =
			serde_yaml_with_quirks::from_str(&content).map_err(|source| ConfigError::Parse {
				path: path.display().to_string(),
				source,
			})?;
		Ok(app)
	}

	/// Discover components under `spec.componentsDir`, non-recursively
	/// (spec §4.4 step 4 / §3 "Component"):
	/// - a single file with a supported extension is a one-file component
	///   named after the file stem;
	/// - a subdirectory with an `index.<ext>` template is a one-file
	///   component whose sole file is that index;
	/// - a subdirectory with `index.yaml` loads it plus every other
	///   YAML/JSON sibling in the directory, sorted by name.
	pub fn discover_components(&self, root: &Path) -> Result<Vec<Component>, ConfigError> {
		let dir = root.join(&self.spec.components_dir);
		if !dir.is_dir() {
			return Err(ConfigError::MissingComponentsDir(dir.display().to_string()));
		}

		let mut entries: Vec<_> = fs::read_dir(&dir)
			.map_err(|source| ConfigError::ComponentsIo {
				path: dir.display().to_string(),
				source,
			})?
			.filter_map(|e| e.ok())
			.collect();
		entries.sort_by_key(|e| e.file_name());

		let mut components = Vec::new();
		for entry in entries {
			let path = entry.path();
			if path.is_file() {
				if let Some(component) = single_file_component(&path) {
					components.push(component);
				}
			} else if path.is_dir() {
				if let Some(component) = directory_component(&path)? {
					components.push(component);
				}
			}
		}

		for component in &mut components {
			component.top_level_vars = self
				.spec
				.top_level_vars
				.get(&component.name)
				.cloned()
				.unwrap_or_default();
		}

		components.sort_by(|a, b| a.name.cmp(&b.name));
		Ok(components)
	}

	/// Cross-reference validation (spec §4.4 step 5): default excludes,
	/// per-env includes/excludes and TLA component lists are all subsets of
	/// the discovered component set; include/exclude for one env are
	/// disjoint; TLA/external variable names are unique within their
	/// namespace.
	pub fn validate(&self, components: &[Component]) -> Result<(), ConfigError> {
		let known: std::collections::HashSet<&str> =
			components.iter().map(|c| c.name.as_str()).collect();
		let mut errors = Vec::new();

		for name in &self.spec.default_excludes {
			if !known.contains(name.as_str()) {
				errors.push(format!("default exclude `{name}` is not a known component"));
			}
		}

		for (env_name, env) in &self.spec.environments {
			for name in env.includes.iter().chain(env.excludes.iter()) {
				if !known.contains(name.as_str()) {
					errors.push(format!(
						"environment `{env_name}` references unknown component `{name}`"
					));
				}
			}
			let overlap: Vec<&String> = env
				.includes
				.iter()
				.filter(|n| env.excludes.contains(n))
				.collect();
			if !overlap.is_empty() {
				errors.push(format!(
					"environment `{env_name}` includes and excludes the same component(s): {overlap:?}"
				));
			}
		}

		for (name, vars) in &self.spec.top_level_vars {
			if !known.contains(name.as_str()) {
				errors.push(format!(
					"top-level var declaration references unknown component `{name}`"
				));
			}
			let mut seen = std::collections::HashSet::new();
			for v in vars {
				if !seen.insert(v) {
					errors.push(format!(
						"duplicate top-level var `{v}` declared for component `{name}`"
					));
				}
			}
		}

		let mut seen_ext = std::collections::HashSet::new();
		for name in self.spec.external_vars.keys() {
			if !seen_ext.insert(name) {
				errors.push(format!("duplicate external var `{name}`"));
			}
		}

		if errors.is_empty() {
			Ok(())
		} else {
			Err(ConfigError::Validation(errors.join("\n")))
		}
	}
}

fn single_file_component(path: &Path) -> Option<Component> {
	let ext = path.extension()?.to_str()?;
	if !SUPPORTED_EXTENSIONS.contains(&ext) {
		return None;
	}
	let name = path.file_stem()?.to_str()?.to_owned();
	Some(Component {
		name,
		files: vec![path.to_path_buf()],
		top_level_vars: Vec::new(),
	})
}

fn directory_component(dir: &Path) -> Result<Option<Component>, ConfigError> {
	let name = match dir.file_name().and_then(|n| n.to_str()) {
		Some(n) => n.to_owned(),
		None => return Ok(None),
	};

	for ext in SUPPORTED_EXTENSIONS {
		if *ext == "yaml" || *ext == "yml" || *ext == "json" {
			continue;
		}
		let index = dir.join(format!("index.{ext}"));
		if index.is_file() {
			return Ok(Some(Component {
				name,
				files: vec![index],
				top_level_vars: Vec::new(),
			}));
		}
	}

	let yaml_index = dir.join("index.yaml");
	if yaml_index.is_file() {
		let mut files: Vec<PathBuf> = fs::read_dir(dir)
			.map_err(|source| ConfigError::ComponentsIo {
				path: dir.display().to_string(),
				source,
			})?
			.filter_map(|e| e.ok())
			.map(|e| e.path())
			.filter(|p| {
				p.is_file()
					&& p.extension()
						.and_then(|e| e.to_str())
						.is_some_and(|e| e == "yaml" || e == "yml" || e == "json")
			})
			.collect();
		files.sort();
		return Ok(Some(Component {
			name,
			files,
			top_level_vars: Vec::new(),
		}));
	}

	Ok(None)
}

/// Deep-merge environment properties over base properties, preserving
/// nulls (spec §4.4 `Properties`, Open Question resolution in §9: the rule
/// was tightened from "JSON merge patch (nulls drop)" to "deep merge
/// preserving nulls"). Maps are merged key-wise recursively; scalars and
/// arrays are fully overwritten by the env side, including an explicit
/// `null` override.
pub fn merge_properties(base: &Value, overlay: &Value) -> Value {
	match (base, overlay) {
		(Value::Object(base_map), Value::Object(overlay_map)) => {
			let mut merged = base_map.clone();
			for (k, overlay_v) in overlay_map {
				match merged.get(k) {
					Some(base_v) => {
						merged.insert(k.clone(), merge_properties(base_v, overlay_v));
					}
					None => {
						merged.insert(k.clone(), overlay_v.clone());
					}
				}
			}
			Value::Object(merged)
		}
		(_, overlay) => overlay.clone(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn merge_properties_recurses_into_maps() {
		let base = json!({"a": {"x": 1, "y": 2}, "b": "base"});
		let overlay = json!({"a": {"y": 20, "z": 30}, "c": "env"});
		let merged = merge_properties(&base, &overlay);
		assert_eq!(
			merged,
			json!({"a": {"x": 1, "y": 20, "z": 30}, "b": "base", "c": "env"})
		);
	}

	#[test]
	fn merge_properties_overwrites_arrays_wholesale() {
		let base = json!({"a": [1, 2, 3]});
		let overlay = json!({"a": [9]});
		assert_eq!(merge_properties(&base, &overlay), json!({"a": [9]}));
	}

	#[test]
	fn merge_properties_preserves_explicit_null_override() {
		let base = json!({"a": "value"});
		let overlay = json!({"a": null});
		assert_eq!(merge_properties(&base, &overlay), json!({"a": null}));
	}

	#[test]
	fn baseline_properties_equal_base_as_is() {
		let base = json!({"a": 1});
		let overlay = json!({});
		assert_eq!(merge_properties(&base, &overlay), base);
	}
}
