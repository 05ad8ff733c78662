//! Concurrent component evaluator (C5): runs C2 over every component in an
//! environment, bounded to a worker count, and stamps the resulting
//! objects into [`LocalObject`]s.
//!
//! Uses the same bounded worker-pool shape as `k8s::diff::diff_all`'s
//! `Semaphore`-style fan-out with one mutex guarding the merged result,
//! but with plain OS threads plus `std::sync::mpsc` instead of `tokio`:
//! these workers are CPU-bound jsonnet evaluation and `jrsonnet`'s `State`
//! is not `Send`, so each thread constructs its own `Engine` rather than
//! sharing one.

use std::{
	collections::BTreeMap,
	panic::{catch_unwind, AssertUnwindSafe},
	path::{Path, PathBuf},
	sync::mpsc,
	thread,
};

use serde_json::Value;
use thiserror::Error;

use crate::{
	config::{AppSpec, Component},
	env::Environment,
	eval::{Engine, Var, VariableSet},
	jpath,
	objects::{extract_objects, ExtractError, KubeObject, LocalObject},
	yaml::{self, YamlError},
};

/// `kontrol.io/…` reserved external variables bound for every component
/// (spec §6 "Reserved variable names").
pub mod reserved_vars {
	pub const ENV: &str = "kontrol.io/env";
	pub const TAG: &str = "kontrol.io/tag";
	pub const DEFAULT_NS: &str = "kontrol.io/defaultNs";
	pub const ENV_PROPERTIES: &str = "kontrol.io/envProperties";
	pub const CLEAN_MODE: &str = "kontrol.io/cleanMode";

	/// Namespace a pre-processor's JSON output is bound under so later
	/// pre-processors and every component can read it via `std.extVar`
	/// (spec §4.5 step 2).
	pub fn preprocessor(name: &str) -> String {
		format!("kontrol.io/preprocessors/{name}")
	}
}

#[derive(Debug, Error)]
pub enum EvaluateError {
	#[error("component `{component}`: {source}")]
	Eval {
		component: String,
		#[source]
		source: crate::eval::EvalError,
	},

	#[error("component `{component}`: reading static manifest {path}: {source}")]
	Io {
		component: String,
		path: String,
		#[source]
		source: std::io::Error,
	},

	#[error("component `{component}`: reading static manifest {path}: {source}")]
	Yaml {
		component: String,
		path: String,
		#[source]
		source: YamlError,
	},

	#[error("component `{component}`: extracting objects from {path}: {source}")]
	Extract {
		component: String,
		path: String,
		#[source]
		source: ExtractError,
	},

	#[error("component `{component}`: unknown top-level var `{var}`: not a declared external var or reserved var")]
	UnknownTopLevelVar { component: String, var: String },

	#[error("worker thread for component `{component}` panicked")]
	WorkerPanicked { component: String },

	#[error("pre-processor {path}: {source}")]
	PreProcessor {
		path: String,
		#[source]
		source: crate::eval::EvalError,
	},

	#[error("component `{component}`: post-processor {path}: {source}")]
	PostProcessor {
		component: String,
		path: String,
		#[source]
		source: crate::eval::EvalError,
	},

	#[error(
		"component `{component}`: post-processor {path}: expected a single leaf object, evaluation returned {shape}"
	)]
	PostProcessorNotLeaf {
		component: String,
		path: String,
		shape: &'static str,
	},

	#[error("component `{component}`: post-processor {path}: {source}")]
	PostProcessorInvalidObject {
		component: String,
		path: String,
		#[source]
		source: crate::objects::ObjectError,
	},
}

/// Tunable concurrency for the evaluator pool (spec §4.5: default 5,
/// clamped to `[1, components.len()]`).
#[derive(Debug, Clone, Copy)]
pub struct EvaluateOptions {
	pub worker_count: usize,
}

impl Default for EvaluateOptions {
	fn default() -> Self {
		EvaluateOptions { worker_count: 5 }
	}
}

/// Everything one component's evaluation needs that does not vary by
/// component: shared by reference across worker threads.
pub struct EvaluateContext<'a> {
	pub root: &'a Path,
	pub app: &'a AppSpec,
	pub environment_name: &'a str,
	pub environment: &'a Environment,
	pub tag: Option<&'a str>,
	pub default_namespace: &'a str,
	pub properties: &'a Value,
	pub clean_mode: bool,
	/// JSON outputs of `AppSpec.preProcessors`, keyed by file stem, already
	/// run once ahead of component evaluation (spec §4.5 step 2). Populated
	/// by [`run_preprocessors`]; empty when the app declares none.
	pub preprocessor_vars: &'a BTreeMap<String, Value>,
}

/// Run each declared pre-processor file in order, in its own standalone
/// evaluation, binding its JSON output as a new external code variable
/// under [`reserved_vars::preprocessor`] before evaluating the next one
/// (spec §4.5 step 2). Runs once per environment, ahead of the component
/// worker pool.
pub fn run_preprocessors(
	root: &Path,
	app: &AppSpec,
	environment_name: &str,
	tag: Option<&str>,
	default_namespace: &str,
	properties: &Value,
	clean_mode: bool,
) -> Result<BTreeMap<String, Value>, EvaluateError> {
	let mut outputs = BTreeMap::new();

	for file in &app.spec.pre_processors {
		let mut vars = VariableSet::new();
		vars = vars.with_external(reserved_vars::ENV, Var::Str(environment_name.to_owned()));
		if let Some(tag) = tag {
			vars = vars.with_external(reserved_vars::TAG, Var::Str(tag.to_owned()));
		}
		vars = vars.with_external(reserved_vars::DEFAULT_NS, Var::Str(default_namespace.to_owned()));
		vars = vars.with_external(reserved_vars::ENV_PROPERTIES, Var::Code(properties.to_string()));
		vars = vars.with_external(reserved_vars::CLEAN_MODE, Var::Str(clean_mode.to_string()));
		for (name, value) in &outputs {
			vars = vars.with_external(reserved_vars::preprocessor(name), Var::Code(value.to_string()));
		}

		let engine = Engine::new(jpath::import_paths(
			root,
			component_dir(file),
			&app.spec.library_paths,
		));
		let value = engine
			.evaluate(file, &vars)
			.map_err(|source| EvaluateError::PreProcessor {
				path: file.display().to_string(),
				source,
			})?;

		outputs.insert(template_name(file), value);
	}

	Ok(outputs)
}

fn template_name(file: &Path) -> String {
	file.file_stem()
		.and_then(|s| s.to_str())
		.unwrap_or_default()
		.to_owned()
}

/// Evaluate every component in `components` concurrently and return the
/// stamped objects across all of them, sorted by [`LocalObject::sort_key`].
/// Errors from individual components are collected rather than
/// short-circuiting the whole run: workers never format output themselves,
/// one aggregator decides presentation. Callers turn the returned `Vec`
/// into an [`crate::error::Aggregate`] when it is non-empty.
pub fn evaluate_components(
	components: &[Component],
	ctx: &EvaluateContext<'_>,
	options: EvaluateOptions,
) -> (Vec<LocalObject>, Vec<EvaluateError>) {
	let worker_count = options.worker_count.clamp(1, components.len().max(1));

	let (tx, rx) = mpsc::channel::<Result<Vec<LocalObject>, EvaluateError>>();

	thread::scope(|scope| {
		for chunk in split_round_robin(components, worker_count) {
			if chunk.is_empty() {
				continue;
			}
			let tx = tx.clone();
			scope.spawn(move || {
				for component in chunk {
					let component_name = component.name.clone();
					let outcome = catch_unwind(AssertUnwindSafe(|| evaluate_one(component, ctx)))
						.unwrap_or(Err(EvaluateError::WorkerPanicked {
							component: component_name,
						}));
					let _ = tx.send(outcome);
				}
			});
		}
		drop(tx);

		let mut objects = Vec::new();
		let mut errors = Vec::new();
		for outcome in rx {
			match outcome {
				Ok(mut objs) => objects.append(&mut objs),
				Err(e) => errors.push(e),
			}
		}
		objects.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
		(objects, errors)
	})
}

fn split_round_robin<'a>(components: &'a [Component], workers: usize) -> Vec<Vec<&'a Component>> {
	let mut chunks: Vec<Vec<&Component>> = vec![Vec::new(); workers];
	for (i, component) in components.iter().enumerate() {
		chunks[i % workers].push(component);
	}
	chunks
}

fn evaluate_one(
	component: &Component,
	ctx: &EvaluateContext<'_>,
) -> Result<Vec<LocalObject>, EvaluateError> {
	let mut objects = Vec::new();

	for file in &component.files {
		let values = evaluate_file(component, file, ctx)?;
		for value in values {
			for extracted in extract_objects(&value).map_err(|source| EvaluateError::Extract {
				component: component.name.clone(),
				path: file.display().to_string(),
				source,
			})? {
				let mut kube_object = run_postprocessors(extracted, component, ctx)?;
				if kube_object.namespace().is_none() {
					kube_object.set_namespace(ctx.default_namespace);
				}
				objects.push(stamp(kube_object, component, ctx));
			}
		}
	}

	Ok(objects)
}

/// Run every declared post-processor over `object` in order (spec §4.5
/// step 3e). Each is a standalone evaluation of its file with an extra
/// top-level variable `object` bound to the current JSON; its result
/// replaces `object` for the next post-processor and must itself be a
/// single leaf object.
fn run_postprocessors(
	object: KubeObject,
	component: &Component,
	ctx: &EvaluateContext<'_>,
) -> Result<KubeObject, EvaluateError> {
	let mut current = object;

	for file in &ctx.app.spec.post_processors {
		let vars = build_variable_set(component, ctx)?
			.with_top_level("object", Var::Code(current.into_value().to_string()));

		let engine = Engine::new(jpath::import_paths(
			ctx.root,
			component_dir(file),
			&ctx.app.spec.library_paths,
		));
		let result = engine.evaluate(file, &vars).map_err(|source| EvaluateError::PostProcessor {
			component: component.name.clone(),
			path: file.display().to_string(),
			source,
		})?;

		current = leaf_object(result, component, file)?;
	}

	Ok(current)
}

/// Validate a post-processor's result against spec §4.5 step 3e: it must
/// be a single leaf object, not a scalar, a bare array, or a List wrapper.
fn leaf_object(value: Value, component: &Component, file: &Path) -> Result<KubeObject, EvaluateError> {
	let shape = match &value {
		Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => Some("scalar"),
		Value::Array(_) => Some("array"),
		Value::Object(map) if map.contains_key("items") && map.contains_key("apiVersion") && map.contains_key("kind") => {
			Some("a List wrapper")
		}
		Value::Object(_) => None,
	};
	if let Some(shape) = shape {
		return Err(EvaluateError::PostProcessorNotLeaf {
			component: component.name.clone(),
			path: file.display().to_string(),
			shape,
		});
	}

	KubeObject::new(value).map_err(|source| EvaluateError::PostProcessorInvalidObject {
		component: component.name.clone(),
		path: file.display().to_string(),
		source,
	})
}

fn stamp(object: KubeObject, component: &Component, ctx: &EvaluateContext<'_>) -> LocalObject {
	LocalObject::stamp(
		object,
		&ctx.app.metadata.name,
		ctx.tag,
		&component.name,
		ctx.environment_name,
	)
}

fn evaluate_file(
	component: &Component,
	file: &Path,
	ctx: &EvaluateContext<'_>,
) -> Result<Vec<Value>, EvaluateError> {
	let extension = file.extension().and_then(|e| e.to_str()).unwrap_or("");

	if extension == "jsonnet" || extension == "libsonnet" {
		let engine = crate::eval::Engine::new(jpath::import_paths(
			ctx.root,
			component_dir(file),
			&ctx.app.spec.library_paths,
		));
		let vars = build_variable_set(component, ctx)?;
		let value = engine
			.evaluate(file, &vars)
			.map_err(|source| EvaluateError::Eval {
				component: component.name.clone(),
				source,
			})?;
		Ok(vec![value])
	} else {
		let content = std::fs::read_to_string(file).map_err(|source| EvaluateError::Io {
			component: component.name.clone(),
			path: file.display().to_string(),
			source,
		})?;
		yaml::load_multi_doc(&content, &file.display().to_string()).map_err(|source| {
			EvaluateError::Yaml {
				component: component.name.clone(),
				path: file.display().to_string(),
				source,
			}
		})
	}
}

fn component_dir(file: &Path) -> &Path {
	file.parent().unwrap_or_else(|| Path::new("."))
}

/// Bind reserved `kontrol.io/…` externals plus the app's declared
/// `externalVars`, and resolve each of the component's `topLevelVars`
/// names against that same pool (spec §6 "Reserved variable names", §4.4
/// `AppSpec.topLevelVars`).
fn build_variable_set(
	component: &Component,
	ctx: &EvaluateContext<'_>,
) -> Result<VariableSet, EvaluateError> {
	let mut vars = VariableSet::new();

	vars = vars.with_external(reserved_vars::ENV, Var::Str(ctx.environment_name.to_owned()));
	if let Some(tag) = ctx.tag {
		vars = vars.with_external(reserved_vars::TAG, Var::Str(tag.to_owned()));
	}
	vars = vars.with_external(
		reserved_vars::DEFAULT_NS,
		Var::Str(ctx.default_namespace.to_owned()),
	);
	vars = vars.with_external(
		reserved_vars::ENV_PROPERTIES,
		Var::Code(ctx.properties.to_string()),
	);
	vars = vars.with_external(
		reserved_vars::CLEAN_MODE,
		Var::Str(ctx.clean_mode.to_string()),
	);
	for (name, value) in ctx.preprocessor_vars {
		vars = vars.with_external(reserved_vars::preprocessor(name), Var::Code(value.to_string()));
	}

	for (name, value) in &ctx.app.spec.external_vars {
		vars = vars.with_external(name.clone(), Var::Code(value.to_string()));
	}

	for name in &component.top_level_vars {
		let is_reserved = matches!(
			name.as_str(),
			reserved_vars::ENV
				| reserved_vars::TAG
				| reserved_vars::DEFAULT_NS
				| reserved_vars::ENV_PROPERTIES
				| reserved_vars::CLEAN_MODE
		);
		if !is_reserved && !ctx.app.spec.external_vars.contains_key(name) {
			return Err(EvaluateError::UnknownTopLevelVar {
				component: component.name.clone(),
				var: name.clone(),
			});
		}
		if let Some(var) = vars.external.get(name).cloned() {
			vars = vars.with_top_level(name.clone(), var);
		}
	}

	Ok(vars)
}

#[cfg(test)]
mod tests {
	use std::fs;

	use serde_json::json;
	use tempfile::TempDir;

	use super::*;
	use crate::config::{AppMetadata, AppSpecBody, DescriptorKind};

	fn app_spec(components_dir: PathBuf) -> AppSpec {
		AppSpec {
			api_version: "kontrol.dev/v1".to_owned(),
			kind: DescriptorKind::App,
			metadata: AppMetadata {
				name: "myapp".to_owned(),
			},
			spec: AppSpecBody {
				components_dir,
				params_file: None,
				library_paths: Vec::new(),
				base_properties: Value::Null,
				default_excludes: Vec::new(),
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

	#[test]
	fn evaluates_components_concurrently_and_stamps_objects() {
		let temp = TempDir::new().unwrap();
		let components_dir = temp.path().join("components");
		fs::create_dir(&components_dir).unwrap();
		fs::write(
			components_dir.join("a.jsonnet"),
			r#"{ apiVersion: "v1", kind: "ConfigMap", metadata: { name: "a" } }"#,
		)
		.unwrap();
		fs::write(
			components_dir.join("b.jsonnet"),
			r#"{ apiVersion: "v1", kind: "ConfigMap", metadata: { name: "b" } }"#,
		)
		.unwrap();

		let app = app_spec(PathBuf::from("components"));
		let components = app.discover_components(temp.path()).unwrap();
		assert_eq!(components.len(), 2);

		let environment = Environment::default();
		let properties = json!({});
		let ctx = EvaluateContext {
			root: temp.path(),
			app: &app,
			environment_name: "dev",
			environment: &environment,
			tag: Some("v1"),
			default_namespace: "default",
			properties: &properties,
			clean_mode: false,
			preprocessor_vars: &BTreeMap::new(),
		};

		let (objects, errors) =
			evaluate_components(&components, &ctx, EvaluateOptions { worker_count: 2 });
		assert!(errors.is_empty(), "unexpected errors: {errors:?}");
		assert_eq!(objects.len(), 2);
		assert_eq!(objects[0].object.name(), Some("a"));
		assert_eq!(objects[1].object.name(), Some("b"));
		assert_eq!(objects[0].object.namespace(), Some("default"));
		assert_eq!(objects[0].tag.as_deref(), Some("v1"));
	}

	#[test]
	fn static_yaml_component_is_loaded_without_evaluation() {
		let temp = TempDir::new().unwrap();
		let components_dir = temp.path().join("components");
		fs::create_dir(&components_dir).unwrap();
		fs::write(
			components_dir.join("svc.yaml"),
			"apiVersion: v1\nkind: Service\nmetadata:\n  name: svc\n",
		)
		.unwrap();

		let app = app_spec(PathBuf::from("components"));
		let components = app.discover_components(temp.path()).unwrap();

		let environment = Environment::default();
		let properties = json!({});
		let ctx = EvaluateContext {
			root: temp.path(),
			app: &app,
			environment_name: "dev",
			environment: &environment,
			tag: None,
			default_namespace: "default",
			properties: &properties,
			clean_mode: false,
			preprocessor_vars: &BTreeMap::new(),
		};

		let (objects, errors) =
			evaluate_components(&components, &ctx, EvaluateOptions::default());
		assert!(errors.is_empty(), "unexpected errors: {errors:?}");
		assert_eq!(objects.len(), 1);
		assert_eq!(objects[0].object.kind(), Some("Service"));
	}

	#[test]
	fn unknown_top_level_var_is_reported_as_error() {
		let temp = TempDir::new().unwrap();
		let components_dir = temp.path().join("components");
		fs::create_dir(&components_dir).unwrap();
		fs::write(
			components_dir.join("a.jsonnet"),
			r#"function(missing) { apiVersion: "v1", kind: "ConfigMap", metadata: { name: missing } }"#,
		)
		.unwrap();

		let mut app = app_spec(PathBuf::from("components"));
		app.spec
			.top_level_vars
			.insert("a".to_owned(), vec!["missing".to_owned()]);
		let components = app.discover_components(temp.path()).unwrap();

		let environment = Environment::default();
		let properties = json!({});
		let ctx = EvaluateContext {
			root: temp.path(),
			app: &app,
			environment_name: "dev",
			environment: &environment,
			tag: None,
			default_namespace: "default",
			properties: &properties,
			clean_mode: false,
			preprocessor_vars: &BTreeMap::new(),
		};

		let (_, errors) = evaluate_components(&components, &ctx, EvaluateOptions::default());
		assert_eq!(errors.len(), 1);
		assert!(matches!(errors[0], EvaluateError::UnknownTopLevelVar { .. }));
	}

	#[test]
	fn preprocessor_output_is_visible_to_components() {
		let temp = TempDir::new().unwrap();
		fs::write(
			temp.path().join("pre.jsonnet"),
			r#"{ region: "us-east-1" }"#,
		)
		.unwrap();

		let components_dir = temp.path().join("components");
		fs::create_dir(&components_dir).unwrap();
		fs::write(
			components_dir.join("a.jsonnet"),
			r#"{ apiVersion: "v1", kind: "ConfigMap", metadata: { name: std.extVar("kontrol.io/preprocessors/pre").region } }"#,
		)
		.unwrap();

		let mut app = app_spec(PathBuf::from("components"));
		app.spec.pre_processors = vec![temp.path().join("pre.jsonnet")];
		let components = app.discover_components(temp.path()).unwrap();

		let environment = Environment::default();
		let properties = json!({});
		let preprocessor_vars =
			run_preprocessors(temp.path(), &app, "dev", None, "default", &properties, false).unwrap();
		assert_eq!(preprocessor_vars["pre"]["region"], "us-east-1");

		let ctx = EvaluateContext {
			root: temp.path(),
			app: &app,
			environment_name: "dev",
			environment: &environment,
			tag: None,
			default_namespace: "default",
			properties: &properties,
			clean_mode: false,
			preprocessor_vars: &preprocessor_vars,
		};

		let (objects, errors) = evaluate_components(&components, &ctx, EvaluateOptions::default());
		assert!(errors.is_empty(), "unexpected errors: {errors:?}");
		assert_eq!(objects[0].object.name(), Some("us-east-1"));
	}

	#[test]
	fn postprocessor_runs_over_each_extracted_object() {
		let temp = TempDir::new().unwrap();
		let components_dir = temp.path().join("components");
		fs::create_dir(&components_dir).unwrap();
		fs::write(
			components_dir.join("a.jsonnet"),
			r#"{ apiVersion: "v1", kind: "ConfigMap", metadata: { name: "a" } }"#,
		)
		.unwrap();
		fs::write(
			temp.path().join("post.jsonnet"),
			r#"function(object) object { metadata+: { annotations+: { decorated: "true" } } }"#,
		)
		.unwrap();

		let mut app = app_spec(PathBuf::from("components"));
		app.spec.post_processors = vec![temp.path().join("post.jsonnet")];
		let components = app.discover_components(temp.path()).unwrap();

		let environment = Environment::default();
		let properties = json!({});
		let ctx = EvaluateContext {
			root: temp.path(),
			app: &app,
			environment_name: "dev",
			environment: &environment,
			tag: None,
			default_namespace: "default",
			properties: &properties,
			clean_mode: false,
			preprocessor_vars: &BTreeMap::new(),
		};

		let (objects, errors) = evaluate_components(&components, &ctx, EvaluateOptions::default());
		assert!(errors.is_empty(), "unexpected errors: {errors:?}");
		assert_eq!(
			objects[0].object.annotations().get("decorated").map(String::as_str),
			Some("true")
		);
	}

	#[test]
	fn postprocessor_returning_array_is_rejected() {
		let temp = TempDir::new().unwrap();
		let components_dir = temp.path().join("components");
		fs::create_dir(&components_dir).unwrap();
		fs::write(
			components_dir.join("a.jsonnet"),
			r#"{ apiVersion: "v1", kind: "ConfigMap", metadata: { name: "a" } }"#,
		)
		.unwrap();
		fs::write(temp.path().join("post.jsonnet"), r#"function(object) [object]"#).unwrap();

		let mut app = app_spec(PathBuf::from("components"));
		app.spec.post_processors = vec![temp.path().join("post.jsonnet")];
		let components = app.discover_components(temp.path()).unwrap();

		let environment = Environment::default();
		let properties = json!({});
		let ctx = EvaluateContext {
			root: temp.path(),
			app: &app,
			environment_name: "dev",
			environment: &environment,
			tag: None,
			default_namespace: "default",
			properties: &properties,
			clean_mode: false,
			preprocessor_vars: &BTreeMap::new(),
		};

		let (_, errors) = evaluate_components(&components, &ctx, EvaluateOptions::default());
		assert_eq!(errors.len(), 1);
		assert!(matches!(errors[0], EvaluateError::PostProcessorNotLeaf { .. }));
	}
}
