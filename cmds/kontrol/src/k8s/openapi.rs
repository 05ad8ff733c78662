//! OpenAPI-backed merge-key lookup and schema validation (C1/C7).
//!
//! The built-in merge-key table in [`crate::patch`] covers the handful of
//! fields every cluster agrees on (containers, env, ports, ...). For CRDs
//! and less common built-in fields, the authoritative merge key lives in
//! the cluster's published OpenAPI schema as the
//! `x-kubernetes-patch-merge-key` extension on an array field. This cache
//! fetches that schema lazily, once per GVK, and falls back to treating a
//! list as positionally merged (no key) when the cluster has no schema for
//! it (e.g. a webhook-only CRD with no structural schema).
//!
//! The same fetched document backs `ValidatorFor`/`Validate`: a per-GVK
//! [`Validator`] that walks an object against its published schema and
//! reports type/required-field mismatches. A GVK absent from the document
//! is the "schema not found" sentinel ([`Validator::schema_found`]) rather
//! than an error, since callers use it to decide dry-run leniency for a
//! CRD installed earlier in the same run.

use std::{collections::HashMap, sync::Arc};

use kube::{core::GroupVersionKind, Client};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{Mutex, OnceCell};

#[derive(Debug, Error)]
pub enum OpenApiError {
	#[error("fetching OpenAPI schema for {group}/{version}: {source}")]
	Fetch {
		group: String,
		version: String,
		#[source]
		source: kube::Error,
	},
}

/// Per-array-field merge key, keyed by JSON pointer from the object root
/// (e.g. `/spec/template/spec/containers`).
pub type MergeKeys = HashMap<String, String>;

/// Caches OpenAPI v3 schema documents per API group/version and extracts
/// `x-kubernetes-patch-merge-key` annotations for each GVK on first use.
#[derive(Clone)]
pub struct OpenApiCache {
	client: Client,
	schemas: Arc<Mutex<HashMap<(String, String), Value>>>,
	validators: Arc<Mutex<HashMap<GroupVersionKind, Arc<OnceCell<Arc<Validator>>>>>>,
}

impl OpenApiCache {
	pub fn new(client: Client) -> Self {
		OpenApiCache {
			client,
			schemas: Arc::new(Mutex::new(HashMap::new())),
			validators: Arc::new(Mutex::new(HashMap::new())),
		}
	}

	/// Merge keys declared by the cluster's schema for `gvk`. Returns an
	/// empty map (not an error) when the group/version has no schema
	/// document or the document has no merge-key annotations, since a CRD
	/// without a structural schema is common and not a usage error.
	pub async fn merge_keys_for(&self, gvk: &GroupVersionKind) -> Result<MergeKeys, OpenApiError> {
		let doc = self.schema_for(&gvk.group, &gvk.version).await?;
		Ok(extract_merge_keys(&doc, &gvk.kind))
	}

	/// `ValidatorFor(gvk) -> Validator`: lazily fetches the schema document
	/// for `gvk` and caches the resulting [`Validator`] behind a
	/// `tokio::sync::OnceCell`, so concurrent first-requesters for the same
	/// GVK share one fetch-and-extract instead of racing each other.
	pub async fn validator_for(&self, gvk: &GroupVersionKind) -> Result<Arc<Validator>, OpenApiError> {
		let cell = {
			let mut validators = self.validators.lock().await;
			validators
				.entry(gvk.clone())
				.or_insert_with(|| Arc::new(OnceCell::new()))
				.clone()
		};

		let validator = cell
			.get_or_try_init(|| async {
				let doc = self.schema_for(&gvk.group, &gvk.version).await?;
				let schema = find_schema(&doc, &gvk.kind);
				Ok::<_, OpenApiError>(Arc::new(Validator { schema }))
			})
			.await?;

		Ok(validator.clone())
	}

	async fn schema_for(&self, group: &str, version: &str) -> Result<Value, OpenApiError> {
		let key = (group.to_owned(), version.to_owned());
		let mut schemas = self.schemas.lock().await;
		if let Some(doc) = schemas.get(&key) {
			return Ok(doc.clone());
		}

		let path = if group.is_empty() {
			format!("/openapi/v3/api/{version}")
		} else {
			format!("/openapi/v3/apis/{group}/{version}")
		};
		let request = http::Request::get(path).body(Vec::new()).expect("valid request");
		let doc: Value = self
			.client
			.request(request)
			.await
			.map_err(|source| OpenApiError::Fetch {
				group: group.to_owned(),
				version: version.to_owned(),
				source,
			})?;

		schemas.insert(key, doc.clone());
		Ok(doc)
	}
}

/// Walk `components.schemas` for a definition whose `kind` suffix matches
/// `kind`, collecting `x-kubernetes-patch-merge-key` annotations on its
/// array properties (recursively, to cover nested pod spec fields).
fn extract_merge_keys(doc: &Value, kind: &str) -> MergeKeys {
	let mut out = MergeKeys::new();
	let Some(schemas) = doc.pointer("/components/schemas").and_then(Value::as_object) else {
		return out;
	};

	for (name, schema) in schemas {
		if !name.ends_with(kind) {
			continue;
		}
		walk_schema(schema, "", &mut out);
	}
	out
}

/// First `components.schemas` definition whose name ends with `kind`, or
/// `None` if the document has no definition for it (the "schema not found"
/// sentinel consumed by [`Validator::schema_found`]).
fn find_schema(doc: &Value, kind: &str) -> Option<Value> {
	doc.pointer("/components/schemas")?
		.as_object()?
		.iter()
		.find(|(name, _)| name.ends_with(kind))
		.map(|(_, schema)| schema.clone())
}

/// One violation found by [`Validator::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
	/// JSON pointer from the object root to the offending field.
	pub path: String,
	pub message: String,
}

/// A GVK's OpenAPI schema, resolved once via [`OpenApiCache::validator_for`]
/// and reused for every subsequent `Validate` call. `schema: None` is the
/// "schema not found" sentinel: the GVK had no definition in the cluster's
/// published document, so `validate` reports no violations rather than
/// failing.
pub struct Validator {
	schema: Option<Value>,
}

impl Validator {
	/// Whether a schema was actually published for this GVK. A CRD with no
	/// structural schema, or a GVK the cluster simply doesn't recognize,
	/// both validate clean without one.
	pub fn schema_found(&self) -> bool {
		self.schema.is_some()
	}

	/// `Validate(obj) -> []SchemaError` (spec §4.1): type and required-field
	/// mismatches between `object` and the cached schema, walked
	/// recursively through `properties`/`items`.
	pub fn validate(&self, object: &Value) -> Vec<SchemaError> {
		let Some(schema) = &self.schema else {
			return Vec::new();
		};
		let mut errors = Vec::new();
		walk_validate(schema, object, "", &mut errors);
		errors
	}
}

fn walk_validate(schema: &Value, value: &Value, path: &str, out: &mut Vec<SchemaError>) {
	if let Some(expected) = schema.get("type").and_then(Value::as_str) {
		if !type_matches(expected, value) {
			out.push(SchemaError {
				path: path.to_owned(),
				message: format!("expected type {expected}, found {}", json_type_name(value)),
			});
			return;
		}
	}

	if let (Some(required), Some(object)) = (schema.get("required").and_then(Value::as_array), value.as_object()) {
		for field in required.iter().filter_map(Value::as_str) {
			if !object.contains_key(field) {
				out.push(SchemaError {
					path: format!("{path}/{field}"),
					message: "required field missing".to_owned(),
				});
			}
		}
	}

	if let (Some(properties), Some(object)) =
		(schema.get("properties").and_then(Value::as_object), value.as_object())
	{
		for (field, field_schema) in properties {
			if let Some(field_value) = object.get(field) {
				walk_validate(field_schema, field_value, &format!("{path}/{field}"), out);
			}
		}
	}

	if let (Some(items_schema), Some(items)) = (schema.get("items"), value.as_array()) {
		for (index, item) in items.iter().enumerate() {
			walk_validate(items_schema, item, &format!("{path}/{index}"), out);
		}
	}
}

fn type_matches(expected: &str, value: &Value) -> bool {
	match expected {
		"object" => value.is_object(),
		"array" => value.is_array(),
		"string" => value.is_string(),
		"boolean" => value.is_boolean(),
		"integer" => value.is_i64() || value.is_u64(),
		"number" => value.is_number(),
		_ => true,
	}
}

fn json_type_name(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "boolean",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "array",
		Value::Object(_) => "object",
	}
}

fn walk_schema(schema: &Value, prefix: &str, out: &mut HashMap<String, String>) {
	let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
		return;
	};
	for (field, field_schema) in properties {
		let pointer = format!("{prefix}/{field}");
		if let Some(key) = field_schema
			.get("x-kubernetes-patch-merge-key")
			.and_then(Value::as_str)
		{
			out.insert(pointer.clone(), key.to_owned());
		}
		if let Some(items) = field_schema.get("items") {
			walk_schema(items, &pointer, out);
		}
		walk_schema(field_schema, &pointer, out);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn extract_merge_keys_finds_container_name_key() {
		let doc = json!({
			"components": {
				"schemas": {
					"io.k8s.api.core.v1.PodSpec": {
						"properties": {
							"containers": {
								"items": {
									"x-kubernetes-patch-merge-key": "name",
									"properties": {}
								}
							}
						}
					}
				}
			}
		});
		let keys = extract_merge_keys(&doc, "PodSpec");
		assert_eq!(keys.get("/containers"), Some(&"name".to_owned()));
	}

	#[test]
	fn extract_merge_keys_empty_for_missing_schema() {
		let doc = json!({});
		assert!(extract_merge_keys(&doc, "Widget").is_empty());
	}

	fn widget_doc() -> Value {
		json!({
			"components": {
				"schemas": {
					"com.example.v1.Widget": {
						"type": "object",
						"required": ["spec"],
						"properties": {
							"spec": {
								"type": "object",
								"required": ["replicas"],
								"properties": {
									"replicas": {"type": "integer"}
								}
							}
						}
					}
				}
			}
		})
	}

	#[test]
	fn validator_reports_no_errors_for_a_conforming_object() {
		let validator = Validator {
			schema: find_schema(&widget_doc(), "Widget"),
		};
		assert!(validator.schema_found());
		let object = json!({"spec": {"replicas": 3}});
		assert!(validator.validate(&object).is_empty());
	}

	#[test]
	fn validator_reports_type_mismatch_and_missing_required_field() {
		let validator = Validator {
			schema: find_schema(&widget_doc(), "Widget"),
		};
		let object = json!({"spec": {"replicas": "three"}});
		let errors = validator.validate(&object);
		assert_eq!(errors.len(), 1);
		assert_eq!(errors[0].path, "/spec/replicas");

		let missing_spec = json!({});
		let errors = validator.validate(&missing_spec);
		assert!(errors.iter().any(|e| e.path == "/spec"));
	}

	#[test]
	fn validator_schema_not_found_validates_clean() {
		let validator = Validator {
			schema: find_schema(&json!({}), "Widget"),
		};
		assert!(!validator.schema_found());
		assert!(validator.validate(&json!({"anything": true})).is_empty());
	}
}
