//! Object lister, networking half (C9): label-selector list across every
//! discovered GVK, bounded to a worker pool, producing a [`gc::Collection`].
//!
//! One `Api<DynamicObject>::all_with` call per discovered type, merged
//! under a shared aggregator, over a bounded `Semaphore` + `JoinSet` pool,
//! selecting on `application=<app>,environment=<env>` (+ `tag=<tag>`/`!tag`).

use std::sync::Arc;

use kube::{
	api::{Api, DynamicObject, ListParams},
	Client,
};
use tokio::{sync::Semaphore, task::JoinSet};
use tokio_util::sync::CancellationToken;

use crate::{
	gc::{is_controller_owned, Collection, CollectionEntry, ListError, ObjectKey},
	k8s::discovery::{ApiResourceCache, CanonicalGvk},
	objects::well_known,
};

const MAX_CONCURRENT_LISTS: usize = 8;

/// Kinds that are always noisy bystanders in a GC list pass: every `Service`
/// gets a same-named `Endpoints`/`EndpointSlice` the control plane rewrites
/// continuously, never something this project applied itself (spec §4.9:
/// "skip types that are known to be noisy bystanders").
const NOISY_KINDS: &[&str] = &["Endpoints", "EndpointSlice"];

/// Identity a list call filters by: every object this project stamps
/// carries `application`/`environment` labels, and optionally `tag`
/// (spec §4.9: selector is `application=<app>, environment=<env>` plus
/// `tag=<tag>` when a tag is active, `!tag` otherwise so untagged and
/// tagged releases of the same environment never collide in GC).
pub struct ListQuery<'a> {
	pub application: &'a str,
	pub environment: &'a str,
	pub tag: Option<&'a str>,
	/// Caller-supplied kind filter (spec §4.9: "optionally kind-filtered by
	/// the caller"). Empty means "every discovered kind".
	pub kinds: &'a [String],
}

pub fn label_selector(query: &ListQuery<'_>) -> String {
	let mut parts = vec![
		format!("{}={}", well_known::APPLICATION, query.application),
		format!("{}={}", well_known::ENVIRONMENT, query.environment),
	];
	match query.tag {
		Some(tag) => parts.push(format!("{}={}", well_known::TAG, tag)),
		None => parts.push(format!("!{}", well_known::TAG)),
	}
	parts.join(",")
}

/// List every object matching `query` across all GVKs in `cache`,
/// returning the merged collection. A single GVK failing to list does not
/// abort the whole run: it records a per-type error rather than failing
/// the whole prune. The first error is surfaced if every list failed,
/// otherwise partial results are returned with the caller able to inspect
/// `cancel` to tell a clean cancellation from a happenstance empty result.
/// Forbidden (403) responses for a single type are downgraded to a warning
/// and contribute no items and no error: a cluster role that can't list
/// CRDs it doesn't own shouldn't fail GC for the types it does.
pub async fn collect(
	client: &Client,
	cache: &ApiResourceCache,
	query: &ListQuery<'_>,
	cancel: &CancellationToken,
) -> Result<Collection, ListError> {
	let selector = label_selector(query);
	let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_LISTS));
	let mut join_set = JoinSet::new();

	for (gvk, resource) in cache.iter() {
		if cancel.is_cancelled() {
			break;
		}
		if NOISY_KINDS.contains(&gvk.kind.as_str()) {
			continue;
		}
		if !query.kinds.is_empty() && !query.kinds.iter().any(|k| k == &gvk.kind) {
			continue;
		}
		let client = client.clone();
		let sem = semaphore.clone();
		let gvk = gvk.clone();
		let api_resource = resource.api_resource.clone();
		let selector = selector.clone();

		join_set.spawn(async move {
			let _permit = sem.acquire().await.expect("semaphore closed");
			let api: Api<DynamicObject> = Api::all_with(client, &api_resource);
			let lp = ListParams::default().labels(&selector);
			let result = api.list(&lp).await;
			(gvk, result)
		});
	}

	let mut collection = Collection::new();
	let mut last_error = None;
	let mut any_succeeded = false;

	while let Some(joined) = join_set.join_next().await {
		let (gvk, result) = match joined {
			Ok(pair) => pair,
			Err(_) => continue,
		};
		match result {
			Ok(list) => {
				any_succeeded = true;
				for object in list.items {
					let value = serde_json::to_value(&object).unwrap_or(serde_json::Value::Null);
					let name = object.metadata.name.clone().unwrap_or_default();
					let namespace = object.metadata.namespace.clone();
					let key = ObjectKey {
						gvk: CanonicalGvk(gvk.clone()),
						namespace,
						name,
					};
					collection.insert(
						key,
						CollectionEntry {
							controller_owned: is_controller_owned(&value),
							object: value,
						},
					);
				}
			}
			Err(kube::Error::Api(e)) if e.code == 403 => {
				tracing::warn!(
					api_version = %gvk.api_version(),
					kind = %gvk.kind,
					error = %e,
					"list forbidden for resource type, skipping"
				);
			}
			Err(source) => {
				tracing::warn!(api_version = %gvk.api_version(), kind = %gvk.kind, error = %source, "list failed for resource type");
				last_error = Some(ListError::List {
					gvk: format!("{}/{}", gvk.api_version(), gvk.kind),
					source,
				});
			}
		}
	}

	if !any_succeeded {
		if let Some(error) = last_error {
			return Err(error);
		}
	}

	Ok(collection)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn label_selector_includes_negative_tag_match_when_untagged() {
		let query = ListQuery {
			application: "myapp",
			environment: "dev",
			tag: None,
			kinds: &[],
		};
		let selector = label_selector(&query);
		assert_eq!(
			selector,
			format!(
				"{}=myapp,{}=dev,!{}",
				well_known::APPLICATION,
				well_known::ENVIRONMENT,
				well_known::TAG
			)
		);
	}

	#[test]
	fn label_selector_pins_tag_when_active() {
		let query = ListQuery {
			application: "myapp",
			environment: "dev",
			tag: Some("v1"),
			kinds: &[],
		};
		let selector = label_selector(&query);
		assert_eq!(
			selector,
			format!(
				"{}=myapp,{}=dev,{}=v1",
				well_known::APPLICATION,
				well_known::ENVIRONMENT,
				well_known::TAG
			)
		);
	}

	#[test]
	fn noisy_kinds_lists_endpoints_and_endpoint_slice() {
		assert!(NOISY_KINDS.contains(&"Endpoints"));
		assert!(NOISY_KINDS.contains(&"EndpointSlice"));
		assert!(!NOISY_KINDS.contains(&"Service"));
	}

	#[test]
	fn kind_filter_empty_means_every_kind() {
		let query = ListQuery {
			application: "myapp",
			environment: "dev",
			tag: None,
			kinds: &[],
		};
		assert!(query.kinds.is_empty());
	}

	#[test]
	fn kind_filter_matches_only_named_kinds() {
		let kinds = vec!["ConfigMap".to_owned()];
		let query = ListQuery {
			application: "myapp",
			environment: "dev",
			tag: None,
			kinds: &kinds,
		};
		assert!(query.kinds.iter().any(|k| k == "ConfigMap"));
		assert!(!query.kinds.iter().any(|k| k == "Secret"));
	}
}
