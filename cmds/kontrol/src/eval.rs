//! Jsonnet evaluation (C2): a thin, testable wrapper over jrsonnet that
//! turns one component's entrypoint plus a [`VariableSet`] into a
//! `serde_json::Value`. The jsonnet language itself is a black box; this
//! module only owns how external/top-level variables and import paths are
//! wired into it.

use std::{collections::BTreeMap, path::Path};

use jrsonnet_evaluator::{
	function::TlaArg, gc::GcHashMap, trace::PathResolver, FileImportResolver, IStr,
	State,
};
use jrsonnet_stdlib::ContextInitializer;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
	#[error("reading {path}: {source}")]
	Io {
		path: String,
		#[source]
		source: std::io::Error,
	},

	#[error("{entrypoint}: {message}")]
	Evaluation { entrypoint: String, message: String },

	#[error("{entrypoint}: ext code `{name}`: {message}")]
	ExtCode {
		entrypoint: String,
		name: String,
		message: String,
	},

	#[error("{entrypoint}: top-level arg `{name}`: {message}")]
	TopLevelArg {
		entrypoint: String,
		name: String,
		message: String,
	},

	#[error("{entrypoint}: manifesting result to JSON: {message}")]
	Manifest { entrypoint: String, message: String },

	#[error("{entrypoint}: result is not valid JSON: {source}")]
	ResultNotJson {
		entrypoint: String,
		#[source]
		source: serde_json::Error,
	},
}

/// A variable value: either a plain string or a jsonnet code snippet
/// evaluated in its own scope (spec §4.2 `Var`).
#[derive(Debug, Clone)]
pub enum Var {
	Str(String),
	Code(String),
}

/// The variables available to one evaluation (spec §4.2 `VariableSet`):
/// external variables addressed by name (`std.extVar`), and top-level
/// arguments addressed by position, bound to the names a component
/// declared via `topLevelVars` (spec §4.4 `AppSpec.topLevelVars`).
#[derive(Debug, Clone, Default)]
pub struct VariableSet {
	pub external: BTreeMap<String, Var>,
	pub top_level: BTreeMap<String, Var>,
}

impl VariableSet {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_external(mut self, name: impl Into<String>, var: Var) -> Self {
		self.external.insert(name.into(), var);
		self
	}

	pub fn with_top_level(mut self, name: impl Into<String>, var: Var) -> Self {
		self.top_level.insert(name.into(), var);
		self
	}
}

/// Evaluates jsonnet entrypoints against a fixed set of library search
/// paths (spec §4.2: library search paths resolved from
/// `AppSpec.libraryPaths`, kept separate per evaluation so concurrent
/// workers (C5) never share mutable evaluator state).
#[derive(Debug, Clone)]
pub struct Engine {
	import_paths: Vec<std::path::PathBuf>,
}

impl Engine {
	/// `import_paths` are searched in the order given; callers typically
	/// pass `[component_dir, root/lib, ...AppSpec.libraryPaths, root/vendor]`.
	pub fn new(import_paths: Vec<std::path::PathBuf>) -> Self {
		Engine { import_paths }
	}

	/// Evaluate one jsonnet/libsonnet entrypoint to a JSON value.
	pub fn evaluate(&self, entrypoint: &Path, vars: &VariableSet) -> Result<Value, EvalError> {
		let entrypoint_str = entrypoint.to_string_lossy().into_owned();

		let import_resolver = FileImportResolver::new(self.import_paths.clone());
		let context_init = ContextInitializer::new(PathResolver::Absolute);
		register_native_functions(&context_init);

		for (name, var) in &vars.external {
			add_ext(&context_init, &entrypoint_str, name, var)?;
		}

		let mut builder = State::builder();
		builder.import_resolver(import_resolver).context_initializer(context_init);
		let state = builder.build();

		let result = state.import(entrypoint_str.as_str()).map_err(|e| EvalError::Evaluation {
			entrypoint: entrypoint_str.clone(),
			message: e.to_string(),
		})?;

		let result = if vars.top_level.is_empty() {
			result
		} else {
			apply_top_level(&state, result, &entrypoint_str, &vars.top_level)?
		};

		let manifest = result
			.manifest(jrsonnet_evaluator::manifest::JsonFormat::default())
			.map_err(|e| EvalError::Manifest {
				entrypoint: entrypoint_str.clone(),
				message: e.to_string(),
			})?;

		serde_json::from_str(&manifest.to_string()).map_err(|source| EvalError::ResultNotJson {
			entrypoint: entrypoint_str,
			source,
		})
	}
}

fn add_ext(
	context_init: &ContextInitializer,
	entrypoint: &str,
	name: &str,
	var: &Var,
) -> Result<(), EvalError> {
	match var {
		Var::Str(value) => {
			context_init.add_ext_str(name.into(), value.as_str().into());
			Ok(())
		}
		Var::Code(code) => context_init.add_ext_code(name, code).map_err(|e| EvalError::ExtCode {
			entrypoint: entrypoint.to_owned(),
			name: name.to_owned(),
			message: e.to_string(),
		}),
	}
}

fn apply_top_level(
	state: &State,
	val: jrsonnet_evaluator::Val,
	entrypoint: &str,
	top_level: &BTreeMap<String, Var>,
) -> Result<jrsonnet_evaluator::Val, EvalError> {
	let mut tla_args: GcHashMap<IStr, TlaArg> = GcHashMap::new();
	for (name, var) in top_level {
		match var {
			Var::Str(value) => {
				tla_args.insert(name.as_str().into(), TlaArg::String(value.as_str().into()));
			}
			Var::Code(code) => {
				let source =
					jrsonnet_parser::Source::new_virtual(format!("<tla:{name}>").into(), code.as_str().into());
				let parsed = jrsonnet_parser::parse(code, &jrsonnet_parser::ParserSettings { source })
					.map_err(|e| EvalError::TopLevelArg {
						entrypoint: entrypoint.to_owned(),
						name: name.clone(),
						message: e.to_string(),
					})?;
				tla_args.insert(name.as_str().into(), TlaArg::Code(parsed));
			}
		}
	}

	jrsonnet_evaluator::apply_tla(state.clone(), &tla_args, val).map_err(|e| EvalError::Evaluation {
		entrypoint: entrypoint.to_owned(),
		message: e.to_string(),
	})
}

/// General-purpose jsonnet natives kept from the stdlib. The Helm/Kustomize
/// bridge natives are not registered: templating external charts is out of
/// scope.
fn register_native_functions(context: &ContextInitializer) {
	use jrsonnet_stdlib::{
		builtin_escape_string_regex, builtin_tanka_manifest_json_from_json,
		builtin_tanka_manifest_yaml_from_json, builtin_tanka_parse_json, builtin_tanka_parse_yaml,
		builtin_tanka_regex_match, builtin_tanka_regex_subst, builtin_tanka_sha256, RegexCache,
	};

	context.add_native("parseJson", builtin_tanka_parse_json::INST);
	context.add_native("parseYaml", builtin_tanka_parse_yaml::INST);
	context.add_native(
		"manifestJsonFromJson",
		builtin_tanka_manifest_json_from_json::INST,
	);
	context.add_native(
		"manifestYamlFromJson",
		builtin_tanka_manifest_yaml_from_json::INST,
	);
	context.add_native("sha256", builtin_tanka_sha256::INST);
	context.add_native("escapeStringRegex", builtin_escape_string_regex::INST);

	let regex_cache = RegexCache::default();
	context.add_native(
		"regexMatch",
		builtin_tanka_regex_match {
			cache: regex_cache.clone(),
		},
	);
	context.add_native(
		"regexSubst",
		builtin_tanka_regex_subst { cache: regex_cache },
	);
}

#[cfg(test)]
mod tests {
	use std::fs;

	use tempfile::TempDir;

	use super::*;

	fn engine_for(dir: &Path) -> Engine {
		Engine::new(vec![dir.to_path_buf()])
	}

	#[test]
	fn evaluates_plain_object() {
		let temp = TempDir::new().unwrap();
		let entry = temp.path().join("main.jsonnet");
		fs::write(&entry, r#"{ hello: "world", num: 42 }"#).unwrap();

		let value = engine_for(temp.path())
			.evaluate(&entry, &VariableSet::new())
			.unwrap();
		assert_eq!(value["hello"], "world");
		assert_eq!(value["num"], 42);
	}

	#[test]
	fn external_string_var_is_visible() {
		let temp = TempDir::new().unwrap();
		let entry = temp.path().join("main.jsonnet");
		fs::write(&entry, r#"{ v: std.extVar("myvar") }"#).unwrap();

		let vars = VariableSet::new().with_external("myvar", Var::Str("hi".to_owned()));
		let value = engine_for(temp.path()).evaluate(&entry, &vars).unwrap();
		assert_eq!(value["v"], "hi");
	}

	#[test]
	fn external_code_var_evaluates_as_jsonnet() {
		let temp = TempDir::new().unwrap();
		let entry = temp.path().join("main.jsonnet");
		fs::write(&entry, r#"{ v: std.extVar("cfg").a }"#).unwrap();

		let vars = VariableSet::new().with_external("cfg", Var::Code("{ a: 1 }".to_owned()));
		let value = engine_for(temp.path()).evaluate(&entry, &vars).unwrap();
		assert_eq!(value["v"], 1);
	}

	#[test]
	fn top_level_string_arg_applies_to_function() {
		let temp = TempDir::new().unwrap();
		let entry = temp.path().join("main.jsonnet");
		fs::write(&entry, r#"function(name) { greeting: "hi " + name }"#).unwrap();

		let vars = VariableSet::new().with_top_level("name", Var::Str("rust".to_owned()));
		let value = engine_for(temp.path()).evaluate(&entry, &vars).unwrap();
		assert_eq!(value["greeting"], "hi rust");
	}

	#[test]
	fn import_path_resolves_sibling_library() {
		let temp = TempDir::new().unwrap();
		fs::write(temp.path().join("shared.libsonnet"), r#"{ shared: true }"#).unwrap();
		let entry = temp.path().join("main.jsonnet");
		fs::write(&entry, r#"(import 'shared.libsonnet')"#).unwrap();

		let value = engine_for(temp.path())
			.evaluate(&entry, &VariableSet::new())
			.unwrap();
		assert_eq!(value["shared"], true);
	}

	#[test]
	fn syntax_error_is_reported() {
		let temp = TempDir::new().unwrap();
		let entry = temp.path().join("main.jsonnet");
		fs::write(&entry, r#"{ invalid syntax"#).unwrap();

		let err = engine_for(temp.path())
			.evaluate(&entry, &VariableSet::new())
			.unwrap_err();
		assert!(matches!(err, EvalError::Evaluation { .. }));
	}

	#[test]
	fn native_parse_json_is_available() {
		let temp = TempDir::new().unwrap();
		let entry = temp.path().join("main.jsonnet");
		fs::write(&entry, r#"{ v: std.native("parseJson")('{"a": 1}') }"#).unwrap();

		let value = engine_for(temp.path())
			.evaluate(&entry, &VariableSet::new())
			.unwrap();
		assert_eq!(value["v"]["a"], 1);
	}
}
