//! Object extractor (C3): walk an arbitrary JSON value and yield Kubernetes
//! objects.

use serde_json::Value;
use thiserror::Error;

use super::KubeObject;

#[derive(Debug, Error)]
pub enum ExtractError {
	#[error("{path}: expected an object, array, or Kubernetes object, found scalar {literal}")]
	UnexpectedScalar { path: String, literal: String },

	#[error("{path}: {source}")]
	InvalidObject {
		path: String,
		#[source]
		source: super::ObjectError,
	},
}

const SCALAR_LITERAL_TRUNCATE: usize = 80;

/// Walk `value` and collect every Kubernetes object reachable from it.
///
/// Rules (spec §4.3):
/// - an object with both `apiVersion` and `kind` is a leaf, unless it has
///   `items: [...]` (a List wrapper), in which case iteration continues
///   into `items`;
/// - arrays iterate by index;
/// - any other mapping recurses into its values;
/// - a scalar at a non-object position is an error.
pub fn extract_objects(value: &Value) -> Result<Vec<KubeObject>, ExtractError> {
	let mut out = Vec::new();
	walk(value, "$", &mut out)?;
	Ok(out)
}

fn walk(value: &Value, path: &str, out: &mut Vec<KubeObject>) -> Result<(), ExtractError> {
	match value {
		Value::Object(map) => {
			let is_manifest = map.contains_key("apiVersion") && map.contains_key("kind");
			if is_manifest {
				if let Some(Value::Array(items)) = map.get("items") {
					for (i, item) in items.iter().enumerate() {
						walk(item, &format!("{path}.items[{i}]"), out)?;
					}
				} else {
					let object = KubeObject::new(value.clone()).map_err(|source| {
						ExtractError::InvalidObject {
							path: path.to_owned(),
							source,
						}
					})?;
					out.push(object);
				}
			} else {
				for (key, v) in map {
					walk(v, &format!("{path}.{key}"), out)?;
				}
			}
			Ok(())
		}
		Value::Array(items) => {
			for (i, item) in items.iter().enumerate() {
				walk(item, &format!("{path}[{i}]"), out)?;
			}
			Ok(())
		}
		Value::Null => Ok(()),
		other => {
			let literal = other.to_string();
			let literal = if literal.len() > SCALAR_LITERAL_TRUNCATE {
				format!("{}...", &literal[..SCALAR_LITERAL_TRUNCATE])
			} else {
				literal
			};
			Err(ExtractError::UnexpectedScalar {
				path: path.to_owned(),
				literal,
			})
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn single_leaf() {
		let v = json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "a"}});
		let objs = extract_objects(&v).unwrap();
		assert_eq!(objs.len(), 1);
		assert_eq!(objs[0].name(), Some("a"));
	}

	#[test]
	fn nested_container_recurses() {
		let v = json!({
			"a": {"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "a"}},
			"b": {"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "b"}},
		});
		let objs = extract_objects(&v).unwrap();
		assert_eq!(objs.len(), 2);
	}

	#[test]
	fn list_wrapper_iterates_items() {
		let v = json!({
			"apiVersion": "v1",
			"kind": "List",
			"items": [
				{"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "a"}},
				{"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "b"}},
			]
		});
		let objs = extract_objects(&v).unwrap();
		assert_eq!(objs.len(), 2);
	}

	#[test]
	fn scalar_at_container_position_errors() {
		let v = json!({"a": "not an object"});
		let err = extract_objects(&v).unwrap_err();
		assert!(matches!(err, ExtractError::UnexpectedScalar { .. }));
	}

	#[test]
	fn array_of_objects() {
		let v = json!([
			{"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "a"}},
			{"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "b"}},
		]);
		let objs = extract_objects(&v).unwrap();
		assert_eq!(objs.len(), 2);
	}

	#[test]
	fn missing_name_propagates_as_invalid_object() {
		let v = json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {}});
		let err = extract_objects(&v).unwrap_err();
		assert!(matches!(err, ExtractError::InvalidObject { .. }));
	}
}
