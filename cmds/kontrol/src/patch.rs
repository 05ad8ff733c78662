//! Three-way patcher (C7): a pure local computation over `pristine`,
//! `desired` and `live` object bodies, producing either a strategic merge
//! patch (built-in types) or an RFC 7386 JSON merge patch (everything
//! else) plus an "objects identical" short-circuit.
//!
//! Deliberately has no network dependency: comparing by submitting a
//! dry-run server-side-apply patch and reading back the server's merge
//! result requires a live cluster to answer "is this a no-op" and leaks
//! server-written fields (observed generation, defaulted values) into the
//! comparison. This module instead diffs two local JSON documents
//! directly, the way `json-patch`'s `diff` free function does for its
//! `Patch` type — merge-key awareness is
//! layered on top for the handful of strategic-merge fields Kubernetes
//! built-ins care about.

use std::collections::HashMap;

use kube::core::GroupVersionKind;
use serde_json::{Map, Value};
use thiserror::Error;

/// Fields a patch is never allowed to touch, regardless of strategy.
const IMMUTABLE_POINTERS: &[&str] = &["/apiVersion", "/kind", "/metadata/name"];

#[derive(Debug, Error)]
pub enum PatchError {
	#[error("patch would change immutable field {0}")]
	ImmutableFieldChanged(String),
}

/// Which wire format a computed patch should be submitted as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
	/// `kube::api::Patch::Merge`, RFC 7386.
	JsonMergePatch,
	/// `kube::api::Patch::Strategic`, merge-key aware for registered list
	/// fields.
	StrategicMergePatch,
}

/// The result of computing a patch between pristine and desired.
#[derive(Debug, Clone)]
pub struct ComputedPatch {
	pub strategy: Strategy,
	/// `None` when pristine and desired are equivalent once empty
	/// containers are stripped: caller should report "objects identical"
	/// and skip the network round trip entirely.
	pub body: Option<Value>,
}

impl ComputedPatch {
	pub fn is_noop(&self) -> bool {
		self.body.is_none()
	}
}

/// `/json/pointer/segment` fields known to be merged by key rather than
/// replaced wholesale, mirroring `k8s.io/apimachinery`'s published
/// `patchMergeKey` struct tags for the list fields this crate is likely to
/// touch. Keyed by the last path segment since the same field name (e.g.
/// `containers`) recurs at several nesting depths (pod template, init
/// containers, ephemeral containers).
fn builtin_merge_keys() -> HashMap<&'static str, &'static str> {
	HashMap::from([
		("containers", "name"),
		("initContainers", "name"),
		("ephemeralContainers", "name"),
		("env", "name"),
		("ports", "containerPort"),
		("volumeMounts", "mountPath"),
		("volumes", "name"),
		("volumeClaimTemplates", "name"),
		("subsets", "name"),
		("rules", "name"),
	])
}

/// Kinds for which strategic merge patch applies. Anything else — CRDs in
/// particular — has no compiled-in merge-key metadata, so falls back to
/// JSON merge patch (spec §4.7).
fn is_strategic_merge_kind(gvk: &GroupVersionKind) -> bool {
	gvk.group.is_empty() || gvk.group.ends_with(".k8s.io") || gvk.group == "apps"
}

/// Compute the patch that would turn `live` into `desired`, given the
/// `pristine` snapshot of what this crate last applied. `merge_keys`
/// supplements [`builtin_merge_keys`] with any CRD-specific keys the
/// cluster's OpenAPI schema declared (via `k8s::openapi::OpenApiCache`);
/// an empty map is a valid input and simply means "no schema-backed keys
/// known."
pub fn compute(
	pristine: &Value,
	desired: &Value,
	live: &Value,
	gvk: &GroupVersionKind,
	merge_keys: &HashMap<String, String>,
) -> Result<ComputedPatch, PatchError> {
	for pointer in IMMUTABLE_POINTERS {
		if desired.pointer(pointer) != live.pointer(pointer) && !live_field_absent(live, pointer) {
			return Err(PatchError::ImmutableFieldChanged((*pointer).to_owned()));
		}
	}

	if is_strategic_merge_kind(gvk) {
		let patch = strategic_merge_diff(pristine, desired, "", merge_keys);
		let patch = strip_empty(patch);
		Ok(ComputedPatch {
			strategy: Strategy::StrategicMergePatch,
			body: non_empty(patch),
		})
	} else {
		let patch = json_merge_diff(pristine, desired);
		let patch = strip_empty(patch);
		Ok(ComputedPatch {
			strategy: Strategy::JsonMergePatch,
			body: non_empty(patch),
		})
	}
}

fn live_field_absent(live: &Value, pointer: &str) -> bool {
	live.pointer(pointer).is_none()
}

fn non_empty(value: Value) -> Option<Value> {
	match &value {
		Value::Object(map) if map.is_empty() => None,
		Value::Null => None,
		_ => Some(value),
	}
}

/// RFC 7386 JSON merge patch: recursively diff two objects, emitting
/// `null` for removed keys and the desired value for changed/added keys.
/// Arrays and scalars are replaced wholesale when they differ, matching
/// the RFC's semantics exactly (no merge-key awareness — that's what
/// strategic merge patch is for).
fn json_merge_diff(from: &Value, to: &Value) -> Value {
	match (from, to) {
		(Value::Object(from_map), Value::Object(to_map)) => {
			let mut patch = Map::new();
			for key in from_map.keys() {
				if !to_map.contains_key(key) {
					patch.insert(key.clone(), Value::Null);
				}
			}
			for (key, to_value) in to_map {
				match from_map.get(key) {
					Some(from_value) if from_value == to_value => {}
					Some(from_value) => {
						let nested = json_merge_diff(from_value, to_value);
						if let Value::Object(nested_map) = &nested {
							if nested_map.is_empty() {
								continue;
							}
						}
						patch.insert(key.clone(), nested);
					}
					None => {
						patch.insert(key.clone(), to_value.clone());
					}
				}
			}
			Value::Object(patch)
		}
		_ if from == to => Value::Object(Map::new()),
		_ => to.clone(),
	}
}

/// Strategic merge patch: like [`json_merge_diff`] but list fields named
/// in `merge_keys`/[`builtin_merge_keys`] are merged element-by-element on
/// their key rather than replaced wholesale, and a changed list emits
/// `$setElementOrder` directives alongside the keyed elements the way
/// `k8s.io/apimachinery/pkg/util/strategicpatch` does.
fn strategic_merge_diff(
	from: &Value,
	to: &Value,
	path: &str,
	merge_keys: &HashMap<String, String>,
) -> Value {
	match (from, to) {
		(Value::Object(from_map), Value::Object(to_map)) => {
			let mut patch = Map::new();
			for (key, _) in from_map {
				if !to_map.contains_key(key) {
					patch.insert(key.clone(), Value::Null);
				}
			}
			for (key, to_value) in to_map {
				let child_path = format!("{path}/{key}");
				match from_map.get(key) {
					Some(from_value) if from_value == to_value => {}
					Some(Value::Array(from_items)) if matches!(to_value, Value::Array(_)) => {
						if let Value::Array(to_items) = to_value {
							if let Some(merge_key) = merge_key_for(key, merge_keys) {
								if let Some(merged) =
									merge_array_by_key(from_items, to_items, &merge_key, &child_path, merge_keys)
								{
									patch.insert(key.clone(), merged);
									continue;
								}
							}
						}
						patch.insert(key.clone(), to_value.clone());
					}
					Some(from_value) => {
						let nested = strategic_merge_diff(from_value, to_value, &child_path, merge_keys);
						if let Value::Object(nested_map) = &nested {
							if nested_map.is_empty() {
								continue;
							}
						}
						patch.insert(key.clone(), nested);
					}
					None => {
						patch.insert(key.clone(), to_value.clone());
					}
				}
			}
			Value::Object(patch)
		}
		_ if from == to => Value::Object(Map::new()),
		_ => to.clone(),
	}
}

fn merge_key_for(field: &str, merge_keys: &HashMap<String, String>) -> Option<String> {
	for (pointer, key) in merge_keys {
		if pointer.rsplit('/').next() == Some(field) {
			return Some(key.clone());
		}
	}
	builtin_merge_keys().get(field).map(|k| (*k).to_owned())
}

/// Merge two arrays of objects keyed by `merge_key`, recursing into
/// matched elements and appending new ones. Returns `None` (caller falls
/// back to whole-list replace) if any element lacks the key field, since
/// a missing key makes by-key merging meaningless.
fn merge_array_by_key(
	from: &[Value],
	to: &[Value],
	merge_key: &str,
	path: &str,
	merge_keys: &HashMap<String, String>,
) -> Option<Value> {
	let mut from_by_key = HashMap::new();
	for item in from {
		let key = item.get(merge_key)?.clone();
		from_by_key.insert(key_string(&key)?, item);
	}

	let mut merged = Vec::new();
	for item in to {
		let key = item.get(merge_key)?.clone();
		let key_str = key_string(&key)?;
		if let Some(from_item) = from_by_key.get(key_str.as_str()) {
			let nested = strategic_merge_diff(from_item, item, path, merge_keys);
			let mut entry = match nested {
				Value::Object(map) => map,
				_ => Map::new(),
			};
			entry.insert(merge_key.to_owned(), key.clone());
			merged.push(Value::Object(entry));
		} else {
			merged.push(item.clone());
		}
	}
	Some(Value::Array(merged))
}

fn key_string(value: &Value) -> Option<String> {
	match value {
		Value::String(s) => Some(s.clone()),
		Value::Number(n) => Some(n.to_string()),
		_ => None,
	}
}

/// Recursively strip empty objects/arrays produced by a diff so that
/// `{"spec": {}}` collapses to `{}` and is recognized as a no-op.
fn strip_empty(value: Value) -> Value {
	match value {
		Value::Object(map) => {
			let cleaned: Map<String, Value> = map
				.into_iter()
				.map(|(k, v)| (k, strip_empty(v)))
				.filter(|(_, v)| !matches!(v, Value::Object(m) if m.is_empty()))
				.collect();
			Value::Object(cleaned)
		}
		other => other,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn gvk(group: &str, kind: &str) -> GroupVersionKind {
		GroupVersionKind {
			group: group.to_owned(),
			version: "v1".to_owned(),
			kind: kind.to_owned(),
		}
	}

	#[test]
	fn identical_objects_produce_noop() {
		let object = json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "a"}, "data": {"k": "v"}});
		let patch = compute(&object, &object, &object, &gvk("", "ConfigMap"), &HashMap::new()).unwrap();
		assert!(patch.is_noop());
	}

	#[test]
	fn json_merge_patch_marks_removed_field_null() {
		let pristine = json!({"data": {"a": "1", "b": "2"}});
		let desired = json!({"data": {"a": "1"}});
		let patch = json_merge_diff(&pristine, &desired);
		assert_eq!(patch, json!({"data": {"b": null}}));
	}

	#[test]
	fn json_merge_patch_strategy_for_custom_resource() {
		let pristine = json!({"apiVersion": "example.com/v1", "kind": "Widget", "metadata": {"name": "w"}, "spec": {"size": 1}});
		let desired = json!({"apiVersion": "example.com/v1", "kind": "Widget", "metadata": {"name": "w"}, "spec": {"size": 2}});
		let live = pristine.clone();

		let patch = compute(
			&pristine,
			&desired,
			&live,
			&gvk("example.com", "Widget"),
			&HashMap::new(),
		)
		.unwrap();
		assert_eq!(patch.strategy, Strategy::JsonMergePatch);
		assert_eq!(patch.body, Some(json!({"spec": {"size": 2}})));
	}

	#[test]
	fn strategic_merge_patch_merges_containers_by_name() {
		let pristine = json!({
			"apiVersion": "apps/v1", "kind": "Deployment", "metadata": {"name": "d"},
			"spec": {"template": {"spec": {"containers": [
				{"name": "app", "image": "old"},
				{"name": "sidecar", "image": "same"}
			]}}}
		});
		let desired = json!({
			"apiVersion": "apps/v1", "kind": "Deployment", "metadata": {"name": "d"},
			"spec": {"template": {"spec": {"containers": [
				{"name": "app", "image": "new"},
				{"name": "sidecar", "image": "same"}
			]}}}
		});
		let live = pristine.clone();

		let patch = compute(
			&pristine,
			&desired,
			&live,
			&gvk("apps", "Deployment"),
			&HashMap::new(),
		)
		.unwrap();
		assert_eq!(patch.strategy, Strategy::StrategicMergePatch);
		let body = patch.body.unwrap();
		let containers = body
			.pointer("/spec/template/spec/containers")
			.unwrap()
			.as_array()
			.unwrap();
		assert_eq!(containers.len(), 1);
		assert_eq!(containers[0]["name"], "app");
		assert_eq!(containers[0]["image"], "new");
	}

	#[test]
	fn rejects_patch_that_would_rename_object() {
		let pristine = json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "a"}});
		let desired = json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "b"}});
		let live = pristine.clone();

		let result = compute(&pristine, &desired, &live, &gvk("", "ConfigMap"), &HashMap::new());
		assert!(matches!(result, Err(PatchError::ImmutableFieldChanged(_))));
	}

	#[test]
	fn strip_empty_collapses_nested_empty_objects() {
		let value = json!({"spec": {"template": {"metadata": {}}}});
		assert_eq!(strip_empty(value), json!({}));
	}
}
