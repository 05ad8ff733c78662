//! Kubernetes object model (spec data model §3: "Kubernetes Object",
//! "Local Object").

pub mod extract;

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

pub use extract::{extract_objects, ExtractError};

/// Label/annotation keys this crate stamps on every object it produces,
/// under this project's own `kontrol.dev/` prefix.
pub mod well_known {
	pub const APPLICATION: &str = "kontrol.dev/application";
	pub const ENVIRONMENT: &str = "kontrol.dev/environment";
	pub const TAG: &str = "kontrol.dev/tag";
	pub const COMPONENT: &str = "kontrol.dev/component";
	pub const LAST_APPLIED: &str = "kontrol.dev/last-applied";

	pub const APPLY_ORDER: &str = "kontrol.dev/apply-order";
	pub const DELETE_POLICY: &str = "kontrol.dev/delete-policy";
	pub const UPDATE_POLICY: &str = "kontrol.dev/update-policy";
	pub const WAIT_POLICY: &str = "kontrol.dev/wait-policy";

	/// Annotation written by `kubectl apply`, read as a pristine-codec fallback.
	pub const KUBECTL_LAST_APPLIED: &str = "kubectl.kubernetes.io/last-applied-configuration";
}

#[derive(Debug, Error)]
pub enum ObjectError {
	#[error("object at {path} is missing both `name` and `generateName`")]
	MissingName { path: String },

	#[error("{field} at {path} must be a mapping of string to string, found {value}")]
	NonStringMetadataValue {
		field: &'static str,
		path: String,
		value: String,
	},
}

/// A Kubernetes object: an arbitrary JSON mapping with `apiVersion`, `kind`
/// and `metadata`. Kept as a thin wrapper over `serde_json::Value` rather
/// than a typed struct so the pipeline can carry CRDs it has never heard of.
#[derive(Debug, Clone, PartialEq)]
pub struct KubeObject(pub Value);

impl KubeObject {
	pub fn new(value: Value) -> Result<Self, ObjectError> {
		let obj = KubeObject(value);
		obj.validate_metadata()?;
		Ok(obj)
	}

	pub fn api_version(&self) -> Option<&str> {
		self.0.get("apiVersion").and_then(Value::as_str)
	}

	pub fn kind(&self) -> Option<&str> {
		self.0.get("kind").and_then(Value::as_str)
	}

	pub fn name(&self) -> Option<&str> {
		self.0.pointer("/metadata/name").and_then(Value::as_str)
	}

	pub fn generate_name(&self) -> Option<&str> {
		self.0
			.pointer("/metadata/generateName")
			.and_then(Value::as_str)
	}

	pub fn namespace(&self) -> Option<&str> {
		self.0
			.pointer("/metadata/namespace")
			.and_then(Value::as_str)
	}

	pub fn set_namespace(&mut self, namespace: &str) {
		self.metadata_mut()
			.insert("namespace".to_owned(), Value::String(namespace.to_owned()));
	}

	pub fn labels(&self) -> BTreeMap<String, String> {
		string_map(self.0.pointer("/metadata/labels"))
	}

	pub fn annotations(&self) -> BTreeMap<String, String> {
		string_map(self.0.pointer("/metadata/annotations"))
	}

	pub fn set_label(&mut self, key: &str, value: &str) {
		insert_into(self.metadata_mut(), "labels", key, value);
	}

	pub fn set_annotation(&mut self, key: &str, value: &str) {
		insert_into(self.metadata_mut(), "annotations", key, value);
	}

	pub fn remove_annotation(&mut self, key: &str) -> Option<Value> {
		self.0
			.pointer_mut("/metadata/annotations")
			.and_then(Value::as_object_mut)
			.and_then(|m| m.remove(key))
	}

	fn metadata_mut(&mut self) -> &mut serde_json::Map<String, Value> {
		if self.0.get("metadata").is_none() {
			self.0["metadata"] = Value::Object(Default::default());
		}
		self.0
			.get_mut("metadata")
			.and_then(Value::as_object_mut)
			.expect("metadata is an object")
	}

	/// Invariant: a leaf without `name` must carry a non-empty `generateName`;
	/// if both are set, `generateName` is cleared (spec §3).
	fn validate_metadata(&self) -> Result<(), ObjectError> {
		for field in ["labels", "annotations"] {
			if let Some(Value::Object(map)) = self.0.pointer(&format!("/metadata/{field}")) {
				for (k, v) in map {
					if !v.is_string() {
						return Err(ObjectError::NonStringMetadataValue {
							field: if field == "labels" { "labels" } else { "annotations" },
							path: format!("/metadata/{field}/{k}"),
							value: v.to_string(),
						});
					}
				}
			}
		}
		if self.name().is_none() {
			match self.generate_name() {
				Some(gn) if !gn.is_empty() => {}
				_ => {
					return Err(ObjectError::MissingName {
						path: "/metadata".to_owned(),
					})
				}
			}
		}
		Ok(())
	}

	pub fn into_value(self) -> Value {
		self.0
	}
}

/// Clear `generateName` once `name` is set on it: at most one of the pair
/// may be present.
pub fn normalize_name_fields(object: &mut KubeObject) {
	if object.name().is_some() {
		object.remove_generate_name();
	}
}

impl KubeObject {
	fn remove_generate_name(&mut self) {
		if let Some(map) = self.0.get_mut("metadata").and_then(Value::as_object_mut) {
			map.remove("generateName");
		}
	}
}

fn string_map(value: Option<&Value>) -> BTreeMap<String, String> {
	let Some(Value::Object(map)) = value else {
		return BTreeMap::new();
	};
	map.iter()
		.filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_owned())))
		.collect()
}

fn insert_into(metadata: &mut serde_json::Map<String, Value>, field: &str, key: &str, value: &str) {
	let entry = metadata
		.entry(field.to_owned())
		.or_insert_with(|| Value::Object(Default::default()));
	if !entry.is_object() {
		*entry = Value::Object(Default::default());
	}
	entry
		.as_object_mut()
		.expect("just ensured object")
		.insert(key.to_owned(), Value::String(value.to_owned()));
}

/// A Kubernetes object plus the four identity fields the reconciler and GC
/// collector key off of (spec §3: "Local Object").
#[derive(Debug, Clone)]
pub struct LocalObject {
	pub object: KubeObject,
	pub application: String,
	pub tag: Option<String>,
	pub component: String,
	pub environment: String,
}

impl LocalObject {
	/// Stamps identity labels/annotations. Copy-on-write: the caller's
	/// `KubeObject` is consumed and a new one with the identity fields
	/// attached is produced.
	pub fn stamp(
		mut object: KubeObject,
		application: &str,
		tag: Option<&str>,
		component: &str,
		environment: &str,
	) -> Self {
		object.set_label(well_known::APPLICATION, application);
		object.set_label(well_known::ENVIRONMENT, environment);
		if let Some(tag) = tag {
			object.set_label(well_known::TAG, tag);
		}
		object.set_annotation(well_known::COMPONENT, component);
		normalize_name_fields(&mut object);

		LocalObject {
			object,
			application: application.to_owned(),
			tag: tag.map(str::to_owned),
			component: component.to_owned(),
			environment: environment.to_owned(),
		}
	}

	pub fn sort_key(&self) -> (String, String, String, String) {
		(
			self.component.clone(),
			self.object.namespace().unwrap_or_default().to_owned(),
			self.object.kind().unwrap_or_default().to_owned(),
			self.object
				.name()
				.or_else(|| self.object.generate_name())
				.unwrap_or_default()
				.to_owned(),
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn stamp_sets_identity_labels_and_annotation() {
		let object = KubeObject::new(json!({
			"apiVersion": "v1",
			"kind": "ConfigMap",
			"metadata": {"name": "cm"}
		}))
		.unwrap();

		let local = LocalObject::stamp(object, "myapp", Some("v1"), "service-a", "dev");

		assert_eq!(local.object.labels()[well_known::APPLICATION], "myapp");
		assert_eq!(local.object.labels()[well_known::ENVIRONMENT], "dev");
		assert_eq!(local.object.labels()[well_known::TAG], "v1");
		assert_eq!(
			local.object.annotations()[well_known::COMPONENT],
			"service-a"
		);
	}

	#[test]
	fn stamp_without_tag_does_not_set_tag_label() {
		let object = KubeObject::new(json!({
			"apiVersion": "v1",
			"kind": "ConfigMap",
			"metadata": {"name": "cm"}
		}))
		.unwrap();
		let local = LocalObject::stamp(object, "myapp", None, "service-a", "dev");
		assert!(!local.object.labels().contains_key(well_known::TAG));
	}

	#[test]
	fn missing_name_and_generate_name_is_rejected() {
		let err = KubeObject::new(json!({
			"apiVersion": "v1",
			"kind": "ConfigMap",
			"metadata": {}
		}))
		.unwrap_err();
		assert!(matches!(err, ObjectError::MissingName { .. }));
	}

	#[test]
	fn generate_name_is_cleared_once_name_present() {
		let mut object = KubeObject::new(json!({
			"apiVersion": "v1",
			"kind": "ConfigMap",
			"metadata": {"name": "cm", "generateName": "cm-"}
		}))
		.unwrap();
		normalize_name_fields(&mut object);
		assert_eq!(object.generate_name(), None);
	}

	#[test]
	fn non_string_label_value_is_rejected() {
		let err = KubeObject::new(json!({
			"apiVersion": "v1",
			"kind": "ConfigMap",
			"metadata": {"name": "cm", "labels": {"count": 1}}
		}))
		.unwrap_err();
		assert!(matches!(err, ObjectError::NonStringMetadataValue { .. }));
	}
}
