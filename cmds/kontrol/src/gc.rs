//! Object lister / GC collector, data half (C9): the `Collection` type
//! collected by [`crate::k8s::list`] and the prune-candidate logic that
//! runs over it.
//!
//! A controller-owned object (one with an `ownerReferences` entry whose
//! `controller` field is true) is never a prune candidate, since deleting
//! it would just have its owning controller recreate it.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

use crate::k8s::discovery::CanonicalGvk;

#[derive(Debug, Error)]
pub enum ListError {
	#[error("listing {gvk}: {source}")]
	List {
		gvk: String,
		#[source]
		source: kube::Error,
	},

	#[error("discovering resource types: {0}")]
	Discovery(#[from] crate::k8s::discovery::DiscoveryError),
}

/// Identity of one collected object: its canonical GVK plus namespace/name
/// (spec §3 "Collection").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
	pub gvk: CanonicalGvk,
	pub namespace: Option<String>,
	pub name: String,
}

/// One live object discovered by a label-selector list, plus the
/// controller-ownership fact the prune step needs.
#[derive(Debug, Clone)]
pub struct CollectionEntry {
	pub object: Value,
	pub controller_owned: bool,
}

/// All objects a selector-based list turned up, keyed for O(1) lookup
/// against the set of objects this run's evaluation produced (spec §3
/// "Collection").
pub type Collection = IndexMap<ObjectKey, CollectionEntry>;

/// Whether `object` carries an owner reference with `controller: true`
/// (spec §4.9: controller-owned objects are excluded from GC).
pub fn is_controller_owned(object: &Value) -> bool {
	object
		.pointer("/metadata/ownerReferences")
		.and_then(Value::as_array)
		.is_some_and(|refs| {
			refs.iter()
				.any(|r| r.get("controller").and_then(Value::as_bool).unwrap_or(false))
		})
}

/// The objects in `collection` that are candidates for deletion: present
/// on the cluster, not in `desired`, and not controller-owned (spec §4.9
/// `Prune`).
pub fn prune_candidates<'a>(
	collection: &'a Collection,
	desired: &HashSet<ObjectKey>,
) -> Vec<&'a ObjectKey> {
	collection
		.iter()
		.filter(|(key, entry)| !desired.contains(*key) && !entry.controller_owned)
		.map(|(key, _)| key)
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use kube::core::GroupVersionKind;
	use serde_json::json;

	fn key(name: &str) -> ObjectKey {
		ObjectKey {
			gvk: CanonicalGvk(GroupVersionKind::gvk("", "v1", "ConfigMap")),
			namespace: Some("default".to_owned()),
			name: name.to_owned(),
		}
	}

	#[test]
	fn detects_controller_owned_object() {
		let object = json!({
			"metadata": {
				"ownerReferences": [{"controller": true, "kind": "ReplicaSet", "name": "rs"}]
			}
		});
		assert!(is_controller_owned(&object));
	}

	#[test]
	fn non_controller_owner_reference_is_not_controller_owned() {
		let object = json!({
			"metadata": {
				"ownerReferences": [{"controller": false, "kind": "Other", "name": "x"}]
			}
		});
		assert!(!is_controller_owned(&object));
	}

	#[test]
	fn prune_candidates_skips_desired_and_controller_owned() {
		let mut collection = Collection::new();
		collection.insert(
			key("keep"),
			CollectionEntry {
				object: json!({}),
				controller_owned: false,
			},
		);
		collection.insert(
			key("orphan"),
			CollectionEntry {
				object: json!({}),
				controller_owned: false,
			},
		);
		collection.insert(
			key("owned"),
			CollectionEntry {
				object: json!({}),
				controller_owned: true,
			},
		);

		let desired: HashSet<ObjectKey> = [key("keep")].into_iter().collect();
		let candidates = prune_candidates(&collection, &desired);
		assert_eq!(candidates.len(), 1);
		assert_eq!(candidates[0].name, "orphan");
	}
}
