//! Remote client / reconciler, sync half (C8): the `Sync`/`Delete` flow
//! that ties discovery (C1), the pristine codec (C6) and the patcher (C7)
//! together into a single object-level reconcile (spec §4.8).
//!
//! Client shape: resolve GVK, build a dynamic `Api`, get-or-create, then
//! patch, with `get_opt`-based not-found handling. Local patch computation
//! goes through [`crate::patch`] instead of a server-side dry-run, with
//! two-pass secret masking, `generateName`-only skip-GET-always-create, and
//! a CRD-installed-this-run cache so a custom resource applied earlier in
//! the same run can be dry-run previewed before cluster discovery catches
//! up.

use std::{
	collections::HashSet,
	sync::Mutex,
	time::Duration,
};

use kube::{
	api::{Api, DeleteParams, DynamicObject, Patch as KubePatch, PatchParams, PostParams, PropagationPolicy},
	core::GroupVersionKind,
	Client,
};
use rand::RngCore;
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::instrument;

use crate::{
	gc::ObjectKey,
	k8s::{
		discovery::{gvk_from_manifest, ApiResourceCache, CanonicalGvk, DiscoveredResource, DiscoveryError},
		openapi::{MergeKeys, OpenApiCache, OpenApiError},
		ResourceScope,
	},
	objects::{well_known, KubeObject, LocalObject},
	patch::{self, ComputedPatch, PatchError, Strategy},
	pristine::{self, PristineError},
};

/// Conflict-retry attempts before giving up on a patch.
const MAX_PATCH_ATTEMPTS: u32 = 5;
/// Fixed back-off applied before every retry after the first attempt.
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

const CRD_GROUP: &str = "apiextensions.k8s.io";
const CRD_KIND: &str = "CustomResourceDefinition";

#[derive(Debug, Error)]
pub enum SyncError {
	#[error("object has no apiVersion/kind")]
	MissingGvk,

	#[error("resource type {gvk} is not known to the cluster")]
	UnknownResourceType { gvk: String },

	#[error("discovering resource types: {0}")]
	Discovery(#[from] DiscoveryError),

	#[error("computing pristine annotation for {display_name}: {source}")]
	Pristine {
		display_name: String,
		#[source]
		source: PristineError,
	},

	#[error("computing patch for {display_name}: {source}")]
	Patch {
		display_name: String,
		#[source]
		source: PatchError,
	},

	#[error("getting {display_name}: {source}")]
	Get {
		display_name: String,
		#[source]
		source: kube::Error,
	},

	#[error("creating {display_name}: {source}")]
	Create {
		display_name: String,
		#[source]
		source: kube::Error,
	},

	#[error("patching {display_name} after {attempts} attempt(s): {source}")]
	PatchConflict {
		display_name: String,
		attempts: u32,
		#[source]
		source: kube::Error,
	},

	#[error("deleting {display_name}: {source}")]
	Delete {
		display_name: String,
		#[source]
		source: kube::Error,
	},

	#[error("converting response for {display_name}: {source}")]
	Conversion {
		display_name: String,
		#[source]
		source: serde_json::Error,
	},
}

/// Caller-controlled knobs for one `Sync` call (spec §4.8: "if creation is
/// disabled by the caller"; "in dry-run, stop after computing the patch").
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
	pub dry_run: bool,
	pub disable_create: bool,
}

/// What happened to an object (spec §4.8 `SyncResult`, flattened into a
/// data type since this crate has no interactive approval loop to drive).
#[derive(Debug, Clone)]
pub enum SyncOutcome {
	/// Created; carries the server-assigned name when `generateName` was used.
	Created { server_assigned_name: Option<String> },
	/// Patched with the given (already-submitted) patch.
	Patched(ComputedPatch),
	/// Desired already matched pristine; nothing submitted.
	Identical,
	/// Deleted.
	Deleted,
	/// Dry-run: this is the patch/create that *would* have been submitted.
	DryRun(ComputedPatch),
	/// Not submitted, for a documented reason.
	Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
	CreationDisabled,
	NotFoundOnDelete,
	ConflictOnNamespaceDelete,
}

/// Result of one `Sync`/`Delete` call.
#[derive(Debug, Clone)]
pub struct SyncResult {
	pub display_name: String,
	pub outcome: SyncOutcome,
	/// Set only for `Secret` objects: the masked dry-run preview from pass
	/// 1 of the two-pass sensitive flow (spec §4.8 step 2).
	pub masked_preview: Option<ComputedPatch>,
}

/// Ties C1 discovery, C6 pristine recovery and C7 patch computation
/// together for one run's worth of `Sync`/`Delete` calls. Holds the
/// CRD-installed-this-run cache and the per-process secret-masking salt,
/// both of which must outlive a single object's reconcile.
pub struct Reconciler {
	client: Client,
	api_cache: ApiResourceCache,
	openapi_cache: OpenApiCache,
	default_namespace: String,
	installed_crds: Mutex<HashSet<GroupVersionKind>>,
	secret_salt: [u8; 16],
}

impl Reconciler {
	pub fn new(client: Client, api_cache: ApiResourceCache, default_namespace: String) -> Self {
		let openapi_cache = OpenApiCache::new(client.clone());
		let mut secret_salt = [0u8; 16];
		rand::thread_rng().fill_bytes(&mut secret_salt);
		Reconciler {
			client,
			api_cache,
			openapi_cache,
			default_namespace,
			installed_crds: Mutex::new(HashSet::new()),
			secret_salt,
		}
	}

	/// `Sync(localObject, options) → SyncResult` (spec §4.8).
	#[instrument(skip(self, local), fields(component = %local.component))]
	pub async fn sync(&self, local: &LocalObject, options: SyncOptions) -> Result<SyncResult, SyncError> {
		let gvk = gvk_from_manifest(&local.object.0).ok_or(SyncError::MissingGvk)?;
		let canonical = self.resolve_gvk(&gvk)?;
		let display_name = self.display_name_for(&canonical, local);
		let merge_keys = self.merge_keys_for(&canonical).await;
		self.validate_against_schema(&canonical, &local.object.0, &display_name).await;

		let result = if is_sensitive(&local.object.0) {
			self.sync_sensitive(local, &canonical, &merge_keys, &display_name, options)
				.await?
		} else {
			let outcome = self
				.sync_inner(local, &canonical, &merge_keys, &local.object.0, options)
				.await?;
			SyncResult {
				display_name,
				outcome,
				masked_preview: None,
			}
		};

		if options.dry_run {
			return Ok(result);
		}
		if matches!(result.outcome, SyncOutcome::Created { .. } | SyncOutcome::Patched(_)) {
			self.note_if_crd_install(&gvk, &local.object.0);
		}

		Ok(result)
	}

	/// `Delete(ref, dryRun) → SyncResult` (spec §4.8).
	#[instrument(skip(self))]
	pub async fn delete(
		&self,
		key: &ObjectKey,
		component: &str,
		dry_run: bool,
	) -> Result<SyncResult, SyncError> {
		let discovered = self.lookup_or_unknown(&key.gvk.0)?;
		let display_name = format!(
			"{} {} {}(source {component})",
			discovered.api_resource.plural,
			key.name,
			key.namespace
				.as_deref()
				.map(|ns| format!("-n {ns} "))
				.unwrap_or_default(),
		);

		if dry_run {
			return Ok(SyncResult {
				display_name,
				outcome: SyncOutcome::DryRun(ComputedPatch {
					strategy: Strategy::JsonMergePatch,
					body: None,
				}),
				masked_preview: None,
			});
		}

		let api = self.dynamic_api(discovered, key.namespace.as_deref());
		let params = DeleteParams {
			propagation_policy: Some(PropagationPolicy::Foreground),
			..Default::default()
		};

		match api.delete(&key.name, &params).await {
			Ok(_) => Ok(SyncResult {
				display_name,
				outcome: SyncOutcome::Deleted,
				masked_preview: None,
			}),
			Err(kube::Error::Api(ref e)) if e.code == 404 => Ok(SyncResult {
				display_name,
				outcome: SyncOutcome::Skipped(SkipReason::NotFoundOnDelete),
				masked_preview: None,
			}),
			Err(kube::Error::Api(ref e)) if e.code == 409 && key.gvk.0.kind == "Namespace" => Ok(SyncResult {
				display_name,
				outcome: SyncOutcome::Skipped(SkipReason::ConflictOnNamespaceDelete),
				masked_preview: None,
			}),
			Err(source) => Err(SyncError::Delete { display_name, source }),
		}
	}

	/// Two-pass sensitive-object flow (spec §4.8 step 2): a forced
	/// dry-run preview over a masked copy, surfaced to the caller, then
	/// the real operation over the unmasked object, submitted silently.
	async fn sync_sensitive(
		&self,
		local: &LocalObject,
		canonical: &CanonicalGvk,
		merge_keys: &MergeKeys,
		display_name: &str,
		options: SyncOptions,
	) -> Result<SyncResult, SyncError> {
		let masked = mask_secret(&local.object.0, &self.secret_salt);
		let masked_outcome = self
			.sync_inner(
				local,
				canonical,
				merge_keys,
				&masked,
				SyncOptions {
					dry_run: true,
					..options
				},
			)
			.await?;
		let masked_preview = patch_from_outcome(&masked_outcome);

		let outcome = self
			.sync_inner(local, canonical, merge_keys, &local.object.0, options)
			.await?;

		Ok(SyncResult {
			display_name: display_name.to_owned(),
			outcome,
			masked_preview,
		})
	}

	/// Steps 3-8 of spec §4.8's `Sync`, parameterized over which JSON body
	/// ("real" or masked) to treat as desired.
	async fn sync_inner(
		&self,
		local: &LocalObject,
		canonical: &CanonicalGvk,
		merge_keys: &MergeKeys,
		desired_raw: &Value,
		options: SyncOptions,
	) -> Result<SyncOutcome, SyncError> {
		let Some(discovered) = self.api_cache.lookup(&canonical.0) else {
			// CRD installed earlier this run, but cluster discovery has not
			// caught up yet. Only a dry-run preview is possible.
			return if options.dry_run {
				let wrapped = self.wrap_pristine(desired_raw)?;
				Ok(SyncOutcome::DryRun(ComputedPatch {
					strategy: Strategy::JsonMergePatch,
					body: Some(wrapped),
				}))
			} else {
				Err(SyncError::UnknownResourceType {
					gvk: format!("{}/{}", canonical.0.api_version(), canonical.0.kind),
				})
			};
		};

		let namespace = match discovered.scope {
			ResourceScope::Namespaced => Some(
				local
					.object
					.namespace()
					.unwrap_or(&self.default_namespace)
					.to_owned(),
			),
			ResourceScope::ClusterWide => None,
		};
		let api = self.dynamic_api(discovered, namespace.as_deref());
		let display_name = self.display_name_for(canonical, local);

		let Some(name) = local.object.name() else {
			// step 3: generateName-only objects skip the GET entirely.
			return self.create(&api, desired_raw, &display_name, options).await;
		};

		// step 4: GET, normalizing not-found to `None`.
		let live = api
			.get_opt(name)
			.await
			.map_err(|source| SyncError::Get {
				display_name: display_name.clone(),
				source,
			})?;

		let Some(live) = live else {
			return self.create(&api, desired_raw, &display_name, options).await;
		};

		let live_value = serde_json::to_value(&live).map_err(|source| SyncError::Conversion {
			display_name: display_name.clone(),
			source,
		})?;

		self.patch_existing(&api, canonical, merge_keys, desired_raw, &live_value, &display_name, options)
			.await
	}

	/// step 6: `maybeCreate`.
	async fn create(
		&self,
		api: &Api<DynamicObject>,
		desired_raw: &Value,
		display_name: &str,
		options: SyncOptions,
	) -> Result<SyncOutcome, SyncError> {
		if options.disable_create {
			return Ok(SyncOutcome::Skipped(SkipReason::CreationDisabled));
		}

		let wrapped = self.wrap_pristine(desired_raw)?;

		if options.dry_run {
			return Ok(SyncOutcome::DryRun(ComputedPatch {
				strategy: Strategy::JsonMergePatch,
				body: Some(wrapped),
			}));
		}

		let object: DynamicObject = serde_json::from_value(wrapped).map_err(|source| SyncError::Conversion {
			display_name: display_name.to_owned(),
			source,
		})?;
		let created = api
			.create(&PostParams::default(), &object)
			.await
			.map_err(|source| SyncError::Create {
				display_name: display_name.to_owned(),
				source,
			})?;

		let server_assigned_name = if desired_raw.pointer("/metadata/name").is_none() {
			created.metadata.name.clone()
		} else {
			None
		};
		Ok(SyncOutcome::Created { server_assigned_name })
	}

	/// steps 7-8: compute the local patch and, unless dry-run, submit it
	/// with a conflict-retry loop.
	async fn patch_existing(
		&self,
		api: &Api<DynamicObject>,
		canonical: &CanonicalGvk,
		merge_keys: &MergeKeys,
		desired_raw: &Value,
		live_value: &Value,
		display_name: &str,
		options: SyncOptions,
	) -> Result<SyncOutcome, SyncError> {
		let (pristine_value, _source) = pristine::decode(live_value);
		let wrapped_desired = self.wrap_pristine(desired_raw)?;

		let computed = patch::compute(&pristine_value, &wrapped_desired, live_value, &canonical.0, merge_keys)
			.map_err(|source| SyncError::Patch {
				display_name: display_name.to_owned(),
				source,
			})?;

		if computed.is_noop() {
			return Ok(SyncOutcome::Identical);
		}
		if options.dry_run {
			return Ok(SyncOutcome::DryRun(computed));
		}

		self.apply_with_retry(api, canonical, merge_keys, &wrapped_desired, display_name, computed)
			.await
	}

	async fn apply_with_retry(
		&self,
		api: &Api<DynamicObject>,
		canonical: &CanonicalGvk,
		merge_keys: &MergeKeys,
		wrapped_desired: &Value,
		display_name: &str,
		mut computed: ComputedPatch,
	) -> Result<SyncOutcome, SyncError> {
		let name = wrapped_desired
			.pointer("/metadata/name")
			.and_then(Value::as_str)
			.expect("patch path only reached once the object has a name")
			.to_owned();
		let patch_params = PatchParams::default();

		let mut attempt = 0u32;
		loop {
			attempt += 1;
			let kube_patch = match computed.strategy {
				Strategy::JsonMergePatch => KubePatch::Merge(computed.body.clone().unwrap_or(Value::Null)),
				Strategy::StrategicMergePatch => {
					KubePatch::Strategic(computed.body.clone().unwrap_or(Value::Null))
				}
			};

			match api.patch(&name, &patch_params, &kube_patch).await {
				Ok(_) => return Ok(SyncOutcome::Patched(computed)),
				Err(kube::Error::Api(ref e)) if e.code == 409 && attempt < MAX_PATCH_ATTEMPTS => {
					if attempt > 1 {
						tokio::time::sleep(RETRY_BACKOFF).await;
					}
					let live = api.get(&name).await.map_err(|source| SyncError::Get {
						display_name: display_name.to_owned(),
						source,
					})?;
					let live_value = serde_json::to_value(&live).map_err(|source| SyncError::Conversion {
						display_name: display_name.to_owned(),
						source,
					})?;
					let (pristine_value, _source) = pristine::decode(&live_value);
					computed = patch::compute(
						&pristine_value,
						wrapped_desired,
						&live_value,
						&canonical.0,
						merge_keys,
					)
					.map_err(|source| SyncError::Patch {
						display_name: display_name.to_owned(),
						source,
					})?;
					if computed.is_noop() {
						return Ok(SyncOutcome::Identical);
					}
				}
				Err(source) => {
					return Err(SyncError::PatchConflict {
						display_name: display_name.to_owned(),
						attempts: attempt,
						source,
					})
				}
			}
		}
	}

	/// Resolve a GVK via C1, falling back to treating it as already-canonical
	/// when it was installed by a CRD applied earlier in this run.
	fn resolve_gvk(&self, gvk: &GroupVersionKind) -> Result<CanonicalGvk, SyncError> {
		if let Some(canonical) = self.api_cache.canonicalize(gvk) {
			return Ok(canonical);
		}
		if self.installed_crds.lock().expect("lock poisoned").contains(gvk) {
			return Ok(CanonicalGvk(gvk.clone()));
		}
		Err(SyncError::UnknownResourceType {
			gvk: format!("{}/{}", gvk.api_version(), gvk.kind),
		})
	}

	fn lookup_or_unknown<'a>(
		&'a self,
		gvk: &GroupVersionKind,
	) -> Result<&'a DiscoveredResource, SyncError> {
		self.api_cache.lookup(gvk).ok_or_else(|| SyncError::UnknownResourceType {
			gvk: format!("{}/{}", gvk.api_version(), gvk.kind),
		})
	}

	async fn merge_keys_for(&self, canonical: &CanonicalGvk) -> MergeKeys {
		match self.openapi_cache.merge_keys_for(&canonical.0).await {
			Ok(keys) => keys,
			Err(OpenApiError::Fetch { group, version, source }) => {
				tracing::debug!(group, version, error = %source, "no OpenAPI merge keys available, using built-ins only");
				MergeKeys::new()
			}
		}
	}

	/// `ValidatorFor(gvk).Validate(obj)` (spec §4.1), best-effort: a fetch
	/// failure or an absent schema is logged, not fatal, since a CRD with no
	/// structural schema is routine and this crate has no interactive
	/// approval loop to surface violations through.
	async fn validate_against_schema(&self, canonical: &CanonicalGvk, desired_raw: &Value, display_name: &str) {
		let validator = match self.openapi_cache.validator_for(&canonical.0).await {
			Ok(validator) => validator,
			Err(OpenApiError::Fetch { group, version, source }) => {
				tracing::debug!(group, version, error = %source, "could not fetch OpenAPI schema for validation");
				return;
			}
		};

		if !validator.schema_found() {
			tracing::debug!(
				api_version = %canonical.0.api_version(),
				kind = %canonical.0.kind,
				"no OpenAPI schema found for this GVK, skipping schema validation"
			);
			return;
		}

		for error in validator.validate(desired_raw) {
			tracing::warn!(
				display_name,
				path = %error.path,
				message = %error.message,
				"object fails cluster OpenAPI schema validation"
			);
		}
	}

	fn dynamic_api(&self, discovered: &DiscoveredResource, namespace: Option<&str>) -> Api<DynamicObject> {
		match (discovered.scope, namespace) {
			(ResourceScope::Namespaced, Some(ns)) => {
				Api::namespaced_with(self.client.clone(), ns, &discovered.api_resource)
			}
			(ResourceScope::Namespaced, None) => {
				Api::namespaced_with(self.client.clone(), &self.default_namespace, &discovered.api_resource)
			}
			(ResourceScope::ClusterWide, _) => Api::all_with(self.client.clone(), &discovered.api_resource),
		}
	}

	fn wrap_pristine(&self, desired_raw: &Value) -> Result<Value, SyncError> {
		let mut stamped = KubeObject(desired_raw.clone());
		let encoded = pristine::encode(desired_raw).map_err(|source| SyncError::Pristine {
			display_name: stamped.name().unwrap_or("<unnamed>").to_owned(),
			source,
		})?;
		stamped.set_annotation(well_known::LAST_APPLIED, &encoded);
		Ok(stamped.into_value())
	}

	/// Display name: `<pluralKind> <name> -n <namespace> (source <component>)`
	/// (spec §4.8).
	fn display_name_for(&self, canonical: &CanonicalGvk, local: &LocalObject) -> String {
		let plural = self
			.api_cache
			.lookup(&canonical.0)
			.map(|d| d.api_resource.plural.clone())
			.unwrap_or_else(|| canonical.0.kind.to_lowercase());
		let name = local
			.object
			.name()
			.or_else(|| local.object.generate_name())
			.unwrap_or("<unnamed>");
		match local.object.namespace() {
			Some(ns) => format!("{plural} {name} -n {ns} (source {})", local.component),
			None => format!("{plural} {name} (source {})", local.component),
		}
	}

	/// Record a CRD's provided GVKs in the installed-this-run cache once a
	/// `CustomResourceDefinition` object has actually been created/patched
	/// (spec §4.8 step 1).
	fn note_if_crd_install(&self, gvk: &GroupVersionKind, object: &Value) {
		if gvk.group != CRD_GROUP || gvk.kind != CRD_KIND {
			return;
		}
		let mut installed = self.installed_crds.lock().expect("lock poisoned");
		for provided in crd_provided_gvks(object) {
			installed.insert(provided);
		}
	}
}

fn patch_from_outcome(outcome: &SyncOutcome) -> Option<ComputedPatch> {
	match outcome {
		SyncOutcome::DryRun(patch) | SyncOutcome::Patched(patch) => Some(patch.clone()),
		_ => None,
	}
}

fn is_sensitive(object: &Value) -> bool {
	object.get("apiVersion").and_then(Value::as_str) == Some("v1")
		&& object.get("kind").and_then(Value::as_str) == Some("Secret")
}

/// Deterministically obfuscate every value under `data`/`stringData` so
/// the masked preview is stable across runs within a process but never
/// reveals the real secret (spec §4.8 step 2).
fn mask_secret(value: &Value, salt: &[u8; 16]) -> Value {
	let mut masked = value.clone();
	for field in ["data", "stringData"] {
		if let Some(map) = masked.get_mut(field).and_then(Value::as_object_mut) {
			for entry in map.values_mut() {
				if let Some(s) = entry.as_str() {
					*entry = Value::String(obfuscate(salt, s.as_bytes()));
				}
			}
		}
	}
	masked
}

fn obfuscate(salt: &[u8; 16], value: &[u8]) -> String {
	let mut hasher = Sha256::new();
	hasher.update(salt);
	hasher.update(value);
	let digest = hasher.finalize();
	let mut hex = String::with_capacity(16);
	for byte in &digest[..8] {
		hex.push_str(&format!("{byte:02x}"));
	}
	format!("sha256:{hex}")
}

/// GVKs a `CustomResourceDefinition` manifest provides, one per declared
/// version (spec §4.8 step 1: "if CRD for the GVK was installed by a
/// prior `Sync` in the same run").
fn crd_provided_gvks(object: &Value) -> Vec<GroupVersionKind> {
	let Some(group) = object.pointer("/spec/group").and_then(Value::as_str) else {
		return Vec::new();
	};
	let Some(kind) = object.pointer("/spec/names/kind").and_then(Value::as_str) else {
		return Vec::new();
	};
	object
		.pointer("/spec/versions")
		.and_then(Value::as_array)
		.map(|versions| {
			versions
				.iter()
				.filter_map(|v| v.get("name").and_then(Value::as_str))
				.map(|version| GroupVersionKind::gvk(group, version, kind))
				.collect()
		})
		.unwrap_or_default()
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn is_sensitive_matches_core_secret_only() {
		assert!(is_sensitive(&json!({"apiVersion": "v1", "kind": "Secret"})));
		assert!(!is_sensitive(&json!({"apiVersion": "v1", "kind": "ConfigMap"})));
		assert!(!is_sensitive(
			&json!({"apiVersion": "example.com/v1", "kind": "Secret"})
		));
	}

	#[test]
	fn mask_secret_obfuscates_data_and_string_data_deterministically() {
		let salt = [7u8; 16];
		let secret = json!({
			"apiVersion": "v1",
			"kind": "Secret",
			"metadata": {"name": "s"},
			"data": {"password": "c2VjcmV0"},
			"stringData": {"token": "raw-value"}
		});

		let masked_once = mask_secret(&secret, &salt);
		let masked_twice = mask_secret(&secret, &salt);
		assert_eq!(masked_once, masked_twice);

		let password = masked_once.pointer("/data/password").unwrap().as_str().unwrap();
		assert!(password.starts_with("sha256:"));
		assert_ne!(password, "c2VjcmV0");
	}

	#[test]
	fn mask_secret_differs_across_salts() {
		let secret = json!({
			"apiVersion": "v1",
			"kind": "Secret",
			"metadata": {"name": "s"},
			"data": {"password": "c2VjcmV0"}
		});
		let a = mask_secret(&secret, &[1u8; 16]);
		let b = mask_secret(&secret, &[2u8; 16]);
		assert_ne!(a, b);
	}

	#[test]
	fn crd_provided_gvks_extracts_one_per_version() {
		let crd = json!({
			"apiVersion": "apiextensions.k8s.io/v1",
			"kind": "CustomResourceDefinition",
			"spec": {
				"group": "example.com",
				"names": {"kind": "Widget"},
				"versions": [{"name": "v1"}, {"name": "v1beta1"}]
			}
		});
		let gvks = crd_provided_gvks(&crd);
		assert_eq!(gvks.len(), 2);
		assert!(gvks.iter().any(|g| g.version == "v1" && g.kind == "Widget"));
		assert!(gvks.iter().any(|g| g.version == "v1beta1" && g.kind == "Widget"));
	}

	#[test]
	fn crd_provided_gvks_empty_for_non_crd() {
		let object = json!({"apiVersion": "v1", "kind": "ConfigMap"});
		assert!(crd_provided_gvks(&object).is_empty());
	}
}
