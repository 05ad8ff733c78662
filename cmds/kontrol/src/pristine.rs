//! Pristine codec (C6): the last-applied snapshot embedded in an annotation
//! on every object this crate applies, and the fallback chain used to
//! recover it when reconciling against a live cluster (spec §4.6).
//!
//! Reads and writes a well-known annotation key on a JSON object, the same
//! way any other well-known-key accessor on this object model does, but
//! generalized to round-trip an entire object rather than a single string
//! value.

use std::io::{Read, Write};

use base64::{engine::general_purpose::STANDARD, Engine};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use serde_json::Value;
use thiserror::Error;

use crate::objects::well_known;

#[derive(Debug, Error)]
pub enum PristineError {
	#[error("gzip-compressing pristine snapshot: {0}")]
	Compress(#[source] std::io::Error),

	#[error("base64-decoding pristine annotation: {0}")]
	Base64(#[source] base64::DecodeError),

	#[error("gunzipping pristine annotation: {0}")]
	Decompress(#[source] std::io::Error),

	#[error("parsing pristine snapshot as JSON: {0}")]
	Json(#[source] serde_json::Error),
}

/// Where a recovered pristine object came from, attached to the result for
/// diagnostics (spec §4.6: "the final source label is attached for
/// diagnostics").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
	/// This crate's own `…/last-applied` annotation.
	Own,
	/// `kubectl.kubernetes.io/last-applied-configuration`, written by other
	/// tooling that has touched the same object.
	KubectlCompat,
	/// No annotation reader succeeded; the live object itself, scrubbed of
	/// server-written fields, is used as a best-effort diff baseline.
	ScrubbedLive,
}

/// Server-written fields stripped from the scrubbed-live fallback (spec
/// §4.6 step 3).
const STRIPPED_METADATA_FIELDS: &[&str] = &[
	"resourceVersion",
	"uid",
	"selfLink",
	"generation",
	"creationTimestamp",
	"deletionTimestamp",
	"managedFields",
];

/// Annotation written by controllers recording the revision of their
/// owning resource; stripped alongside the other server-written metadata.
const CONTROLLER_REVISION_ANNOTATION: &str = "deployment.kubernetes.io/revision";

/// Encode an object as the pristine annotation value: base64 of the gzip of
/// its canonical JSON (spec §3 "Pristine annotation").
pub fn encode(object: &Value) -> Result<String, PristineError> {
	let json = serde_json::to_vec(object).map_err(PristineError::Json)?;

	let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
	encoder.write_all(&json).map_err(PristineError::Compress)?;
	let gz = encoder.finish().map_err(PristineError::Compress)?;

	Ok(STANDARD.encode(gz))
}

/// Decode a pristine annotation value produced by [`encode`].
fn decode_own(annotation: &str) -> Result<Value, PristineError> {
	let gz = STANDARD.decode(annotation).map_err(PristineError::Base64)?;
	let mut decoder = GzDecoder::new(gz.as_slice());
	let mut json = Vec::new();
	decoder
		.read_to_end(&mut json)
		.map_err(PristineError::Decompress)?;
	serde_json::from_slice(&json).map_err(PristineError::Json)
}

/// Recover the pristine object for `live`, trying each reader in order
/// (spec §4.6 `Decode`): this crate's own annotation, the `kubectl`
/// compatibility annotation, then a scrubbed copy of the live object
/// itself. Failures in an earlier reader fall through to the next; `None`
/// pristine (first-ever apply) is distinguished from "no annotation but
/// live exists", which falls to the scrubbed-live reader.
pub fn decode(live: &Value) -> (Value, Source) {
	if let Some(annotation) = live
		.pointer(&format!("/metadata/annotations/{}", well_known::LAST_APPLIED))
		.and_then(Value::as_str)
	{
		if let Ok(pristine) = decode_own(annotation) {
			return (pristine, Source::Own);
		}
	}

	if let Some(annotation) = live
		.pointer(&format!(
			"/metadata/annotations/{}",
			well_known::KUBECTL_LAST_APPLIED
		))
		.and_then(Value::as_str)
	{
		if let Ok(pristine) = serde_json::from_str::<Value>(annotation) {
			return (pristine, Source::KubectlCompat);
		}
	}

	(scrub_live(live), Source::ScrubbedLive)
}

/// Strip server-written metadata and the `status` subtree from a live
/// object, for use as a diff baseline when no pristine annotation survived
/// (spec §4.6 step 3).
fn scrub_live(live: &Value) -> Value {
	let mut scrubbed = live.clone();

	if let Some(metadata) = scrubbed.get_mut("metadata").and_then(Value::as_object_mut) {
		for field in STRIPPED_METADATA_FIELDS {
			metadata.remove(*field);
		}
		if let Some(annotations) = metadata.get_mut("annotations").and_then(Value::as_object_mut) {
			annotations.remove(well_known::LAST_APPLIED);
			annotations.remove(well_known::KUBECTL_LAST_APPLIED);
			annotations.remove(CONTROLLER_REVISION_ANNOTATION);
			if annotations.is_empty() {
				metadata.remove("annotations");
			}
		}
	}

	if let Some(map) = scrubbed.as_object_mut() {
		map.remove("status");
	}

	scrubbed
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn round_trip_reconstructs_equal_object() {
		let object = json!({
			"apiVersion": "v1",
			"kind": "ConfigMap",
			"metadata": {"name": "cm", "namespace": "default"},
			"data": {"key": "value"}
		});

		let encoded = encode(&object).unwrap();
		let decoded = decode_own(&encoded).unwrap();
		assert_eq!(decoded, object);
	}

	#[test]
	fn decode_prefers_own_annotation() {
		let inner = json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "cm"}});
		let encoded = encode(&inner).unwrap();

		let live = json!({
			"apiVersion": "v1",
			"kind": "ConfigMap",
			"metadata": {
				"name": "cm",
				"annotations": {
					well_known::LAST_APPLIED: encoded,
					well_known::KUBECTL_LAST_APPLIED: "{\"should\":\"not be used\"}",
				}
			}
		});

		let (pristine, source) = decode(&live);
		assert_eq!(source, Source::Own);
		assert_eq!(pristine, inner);
	}

	#[test]
	fn decode_falls_back_to_kubectl_annotation() {
		let kubectl_json = json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "cm"}});
		let live = json!({
			"apiVersion": "v1",
			"kind": "ConfigMap",
			"metadata": {
				"name": "cm",
				"annotations": {
					well_known::KUBECTL_LAST_APPLIED: serde_json::to_string(&kubectl_json).unwrap(),
				}
			}
		});

		let (pristine, source) = decode(&live);
		assert_eq!(source, Source::KubectlCompat);
		assert_eq!(pristine, kubectl_json);
	}

	#[test]
	fn decode_falls_back_to_scrubbed_live_when_no_annotation_survives() {
		let live = json!({
			"apiVersion": "v1",
			"kind": "ConfigMap",
			"metadata": {
				"name": "cm",
				"resourceVersion": "123",
				"uid": "abc-def",
				"annotations": {
					well_known::LAST_APPLIED: "not valid base64!!",
				}
			},
			"status": {"phase": "Active"}
		});

		let (pristine, source) = decode(&live);
		assert_eq!(source, Source::ScrubbedLive);
		assert_eq!(pristine.pointer("/metadata/resourceVersion"), None);
		assert_eq!(pristine.get("status"), None);
		assert_eq!(
			pristine.pointer(&format!("/metadata/annotations/{}", well_known::LAST_APPLIED)),
			None
		);
	}

	#[test]
	fn scrub_live_drops_controller_revision_annotation() {
		let live = json!({
			"apiVersion": "apps/v1",
			"kind": "Deployment",
			"metadata": {
				"name": "d",
				"annotations": {CONTROLLER_REVISION_ANNOTATION: "7"}
			}
		});
		let scrubbed = scrub_live(&live);
		assert_eq!(scrubbed.pointer("/metadata/annotations"), None);
	}
}
