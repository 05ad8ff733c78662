//! End-to-end pipeline tests against a mock Kubernetes API server.
//!
//! These call the actual `pipeline::{evaluate_environment, sync_environment,
//! prune_environment}` entrypoints the `kontrol` binary uses, driving the
//! full descriptor-load -> evaluate -> sync -> prune flow end to end.

use std::path::Path;

use assert_matches::assert_matches;
use k8s_mock::{DiscoveryMode, HttpMockK8sServer, MockApiResource, MockDiscovery};
use kontrol::{
	env::Environment,
	gc::ObjectKey,
	k8s::client::ClusterConnection,
	objects::well_known,
	pipeline::{self, PruneOutcome},
	reconcile::{SyncOptions, SyncOutcome},
};
use serde_json::json;

const DESCRIPTOR: &str = r#"
apiVersion: kontrol.dev/v1
kind: App
metadata:
  name: demo
spec:
  componentsDir: components
  environments:
    test:
      context: mock-context
"#;

fn write_descriptor(root: &Path, components: &[(&str, &str)]) -> std::path::PathBuf {
	let components_dir = root.join("components");
	std::fs::create_dir_all(&components_dir).expect("create components dir");
	for (name, content) in components {
		std::fs::write(components_dir.join(name), content).expect("write component");
	}
	let descriptor = root.join("app.yaml");
	std::fs::write(&descriptor, DESCRIPTOR).expect("write descriptor");
	descriptor
}

async fn connect(server: &k8s_mock::RunningHttpMockK8sServer) -> ClusterConnection {
	let env = Environment {
		context: Some("mock-context".to_owned()),
		..Default::default()
	};
	ClusterConnection::from_environment_with_kubeconfig(&env, server.kubeconfig())
		.await
		.expect("connecting to mock cluster")
}

#[tokio::test]
async fn sync_creates_then_patches_an_object() {
	let dir = tempfile::tempdir().expect("tempdir");

	let descriptor = write_descriptor(
		dir.path(),
		&[(
			"widget.yaml",
			"apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: widget\ndata:\n  color: blue\n",
		)],
	);

	let server = HttpMockK8sServer::builder()
		.discovery_mode(DiscoveryMode::Aggregated)
		.build()
		.start()
		.await;
	let connection = connect(&server).await;

	let (_app, evaluated) = pipeline::evaluate_environment(&descriptor, "test", None, None, &[], false)
		.await
		.expect("evaluate should succeed");
	assert_eq!(evaluated.objects.len(), 1);

	let options = SyncOptions { dry_run: false, disable_create: false };
	let (results, _cache, _desired) = pipeline::sync_environment(&connection, &evaluated, options, false)
		.await
		.expect("sync should succeed");

	assert_eq!(results.len(), 1);
	assert_matches!(results[0].outcome, SyncOutcome::Created { .. });

	// Change the desired data and sync again: the object already exists, so
	// this time it should be patched rather than created.
	std::fs::write(
		dir.path().join("components/widget.yaml"),
		"apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: widget\ndata:\n  color: red\n",
	)
	.expect("rewrite component");

	let (_app, evaluated) = pipeline::evaluate_environment(&descriptor, "test", None, None, &[], false)
		.await
		.expect("re-evaluate should succeed");
	let (results, _cache, _desired) = pipeline::sync_environment(&connection, &evaluated, options, false)
		.await
		.expect("second sync should succeed");

	assert_eq!(results.len(), 1);
	assert_matches!(results[0].outcome, SyncOutcome::Patched(_));
}

#[tokio::test]
async fn dry_run_sync_does_not_create_anything() {
	let dir = tempfile::tempdir().expect("tempdir");
	let descriptor = write_descriptor(
		dir.path(),
		&[(
			"widget.yaml",
			"apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: widget\ndata:\n  color: blue\n",
		)],
	);

	let server = HttpMockK8sServer::builder()
		.discovery_mode(DiscoveryMode::Aggregated)
		.build()
		.start()
		.await;
	let connection = connect(&server).await;

	let (_app, evaluated) = pipeline::evaluate_environment(&descriptor, "test", None, None, &[], true)
		.await
		.expect("evaluate should succeed");

	let options = SyncOptions { dry_run: true, disable_create: false };
	let (results, _cache, _desired) = pipeline::sync_environment(&connection, &evaluated, options, false)
		.await
		.expect("dry-run sync should succeed");

	assert_eq!(results.len(), 1);
	assert_matches!(results[0].outcome, SyncOutcome::DryRun(_));
}

#[tokio::test]
async fn prune_deletes_orphans_not_in_the_desired_set() {
	let dir = tempfile::tempdir().expect("tempdir");
	let descriptor = write_descriptor(
		dir.path(),
		&[(
			"widget.yaml",
			"apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: widget\ndata:\n  color: blue\n",
		)],
	);

	let stale = json!({
		"apiVersion": "v1",
		"kind": "ConfigMap",
		"metadata": {
			"name": "orphan",
			"namespace": "default",
			"labels": {
				"kontrol.dev/application": "demo",
				"kontrol.dev/environment": "test",
			},
		},
		"data": {"leftover": "true"},
	});

	let server = HttpMockK8sServer::builder()
		.discovery_mode(DiscoveryMode::Aggregated)
		.resources(vec![stale])
		.build()
		.start()
		.await;
	let connection = connect(&server).await;

	let (app, evaluated) = pipeline::evaluate_environment(&descriptor, "test", None, None, &[], false)
		.await
		.expect("evaluate should succeed");

	let options = SyncOptions { dry_run: false, disable_create: false };
	let (_results, api_cache, desired) = pipeline::sync_environment(&connection, &evaluated, options, true)
		.await
		.expect("sync should succeed");
	assert!(desired.iter().any(|key: &ObjectKey| key.name == "widget"));

	let outcome = pipeline::prune_environment(
		&connection,
		&api_cache,
		&app.metadata.name,
		"test",
		None,
		&desired,
		false,
		true, // assume_yes: act on the candidates immediately
	)
	.await
	.expect("prune should succeed");

	let PruneOutcome::Deleted(results) = outcome else {
		panic!("expected candidates to be deleted, got {outcome:?}");
	};
	assert_eq!(results.len(), 1);
	assert!(results[0].display_name.contains("orphan"));
	assert_matches!(results[0].outcome, SyncOutcome::Deleted);
}

#[tokio::test]
async fn prune_without_assume_yes_or_dry_run_only_reports_candidate_count() {
	let dir = tempfile::tempdir().expect("tempdir");
	let descriptor = write_descriptor(dir.path(), &[]);

	let stale = json!({
		"apiVersion": "v1",
		"kind": "ConfigMap",
		"metadata": {
			"name": "orphan",
			"namespace": "default",
			"labels": {
				"kontrol.dev/application": "demo",
				"kontrol.dev/environment": "test",
			},
		},
	});

	let server = HttpMockK8sServer::builder()
		.discovery_mode(DiscoveryMode::Aggregated)
		.resources(vec![stale])
		.build()
		.start()
		.await;
	let connection = connect(&server).await;

	let (app, evaluated) = pipeline::evaluate_environment(&descriptor, "test", None, None, &[], false)
		.await
		.expect("evaluate should succeed");
	assert!(evaluated.objects.is_empty());

	let options = SyncOptions { dry_run: false, disable_create: false };
	let (_results, api_cache, desired) = pipeline::sync_environment(&connection, &evaluated, options, true)
		.await
		.expect("sync should succeed");

	let outcome = pipeline::prune_environment(
		&connection,
		&api_cache,
		&app.metadata.name,
		"test",
		None,
		&desired,
		false,
		false, // no assume_yes, no dry_run: must not delete anything
	)
	.await
	.expect("prune should succeed");

	assert_matches!(outcome, PruneOutcome::AwaitingApproval(1));
}

/// Scenario S1 (spec §8): a component layout mixing a plain JSON file, a
/// YAML file, a jsonnet template and a directory component with multiple
/// siblings all evaluate to one Local Object per file, sorted by component
/// and stamped with the same application/environment identity.
#[tokio::test]
async fn evaluate_environment_handles_a_multi_file_component_layout() {
	let dir = tempfile::tempdir().expect("tempdir");
	let components_dir = dir.path().join("components");
	std::fs::create_dir_all(components_dir.join("d")).expect("create component dirs");

	std::fs::write(
		components_dir.join("a.json"),
		r#"{"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "a"}, "data": {"k": "a"}}"#,
	)
	.expect("write a.json");
	std::fs::write(
		components_dir.join("b.yaml"),
		"apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: b\ndata:\n  k: b\n",
	)
	.expect("write b.yaml");
	std::fs::write(
		components_dir.join("c.jsonnet"),
		"{ apiVersion: 'v1', kind: 'ConfigMap', metadata: { name: 'c' }, data: { k: 'c' } }",
	)
	.expect("write c.jsonnet");
	std::fs::write(
		components_dir.join("d/index.yaml"),
		"apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: d-index\ndata:\n  k: d-index\n",
	)
	.expect("write d/index.yaml");
	std::fs::write(
		components_dir.join("d/cm.yaml"),
		"apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: d-cm\ndata:\n  k: d-cm\n",
	)
	.expect("write d/cm.yaml");

	let descriptor = dir.path().join("app.yaml");
	std::fs::write(&descriptor, DESCRIPTOR).expect("write descriptor");

	let (_app, evaluated) = pipeline::evaluate_environment(&descriptor, "test", None, None, &[], false)
		.await
		.expect("evaluate should succeed");

	assert_eq!(evaluated.objects.len(), 5);
	assert!(evaluated
		.objects
		.iter()
		.all(|o| o.object.labels().get(well_known::APPLICATION).map(String::as_str) == Some("demo")));
	assert!(evaluated
		.objects
		.iter()
		.all(|o| o.object.labels().get(well_known::ENVIRONMENT).map(String::as_str) == Some("test")));

	let components: Vec<&str> = evaluated.objects.iter().map(|o| o.component.as_str()).collect();
	let mut sorted = components.clone();
	sorted.sort();
	assert_eq!(components, sorted, "objects must be sorted by component");
}

/// Scenario S4 (spec §8): `apps/v1.Deployment` and `extensions/v1beta1.
/// Deployment` are both discoverable. The cache must collapse them to one
/// canonical identity rather than listing/GC-ing the kind twice, and syncing
/// an `apps/v1`-authored Deployment through that merged identity must not
/// get pruned as an orphan afterward.
#[tokio::test]
async fn aliased_deployment_groups_collapse_to_one_canonical_identity() {
	let dir = tempfile::tempdir().expect("tempdir");
	let descriptor = write_descriptor(
		dir.path(),
		&[(
			"web.yaml",
			concat!(
				"apiVersion: apps/v1\n",
				"kind: Deployment\n",
				"metadata:\n",
				"  name: web\n",
				"spec:\n",
				"  replicas: 1\n",
				"  selector:\n",
				"    matchLabels:\n",
				"      app: web\n",
				"  template:\n",
				"    metadata:\n",
				"      labels:\n",
				"        app: web\n",
				"    spec:\n",
				"      containers:\n",
				"      - name: web\n",
				"        image: web:1\n",
			),
		)],
	);

	let mut discovery = MockDiscovery::default();
	discovery.group_resources.insert(
		"extensions/v1beta1".to_owned(),
		vec![MockApiResource::namespaced("deployments", "Deployment")],
	);

	let server = HttpMockK8sServer::builder()
		.discovery_mode(DiscoveryMode::Aggregated)
		.discovery(discovery)
		.build()
		.start()
		.await;
	let connection = connect(&server).await;

	let (app, evaluated) = pipeline::evaluate_environment(&descriptor, "test", None, None, &[], false)
		.await
		.expect("evaluate should succeed");

	let options = SyncOptions { dry_run: false, disable_create: false };
	let (results, api_cache, desired) = pipeline::sync_environment(&connection, &evaluated, options, true)
		.await
		.expect("sync should succeed");
	assert_eq!(results.len(), 1);
	assert_matches!(results[0].outcome, SyncOutcome::Created { .. });

	let deployment_identities = api_cache.iter().filter(|(gvk, _)| gvk.kind == "Deployment").count();
	assert_eq!(
		deployment_identities, 1,
		"apps/v1 and extensions/v1beta1 Deployment must collapse to one cached identity"
	);

	let outcome = pipeline::prune_environment(
		&connection,
		&api_cache,
		&app.metadata.name,
		"test",
		None,
		&desired,
		false,
		true,
	)
	.await
	.expect("prune should succeed");

	let PruneOutcome::Deleted(results) = outcome else {
		panic!("expected an empty deletion batch, got {outcome:?}");
	};
	assert!(
		results.is_empty(),
		"the just-created Deployment must not be pruned as an orphan across its aliased group"
	);
}

/// Scenario S5 (spec §8): a `generateName`-only object skips the GET and is
/// created directly, with the server-assigned name surfaced on the result;
/// a subsequent prune pass (using the desired set `sync_environment`
/// returned) must not treat that freshly created object as an orphan.
#[tokio::test]
async fn generate_name_only_object_is_created_without_a_get_and_survives_prune() {
	let dir = tempfile::tempdir().expect("tempdir");
	let descriptor = write_descriptor(
		dir.path(),
		&[(
			"job.yaml",
			"apiVersion: v1\nkind: ConfigMap\nmetadata:\n  generateName: job-run-\ndata:\n  run: \"1\"\n",
		)],
	);

	let server = HttpMockK8sServer::builder()
		.discovery_mode(DiscoveryMode::Aggregated)
		.build()
		.start()
		.await;
	let connection = connect(&server).await;

	let (app, evaluated) = pipeline::evaluate_environment(&descriptor, "test", None, None, &[], false)
		.await
		.expect("evaluate should succeed");
	assert_eq!(evaluated.objects.len(), 1);
	assert!(evaluated.objects[0].object.name().is_none());
	assert_eq!(evaluated.objects[0].object.generate_name(), Some("job-run-"));

	let options = SyncOptions { dry_run: false, disable_create: false };
	let (results, api_cache, desired) = pipeline::sync_environment(&connection, &evaluated, options, true)
		.await
		.expect("sync should succeed");

	assert_eq!(results.len(), 1);
	let SyncOutcome::Created { server_assigned_name } = &results[0].outcome else {
		panic!("expected a Created outcome, got {:?}", results[0].outcome);
	};
	let assigned = server_assigned_name.as_deref().expect("server must assign a name");
	assert!(assigned.starts_with("job-run-"));
	assert!(desired.iter().any(|key: &ObjectKey| key.name == assigned));

	let outcome = pipeline::prune_environment(
		&connection,
		&api_cache,
		&app.metadata.name,
		"test",
		None,
		&desired,
		false,
		true,
	)
	.await
	.expect("prune should succeed");

	let PruneOutcome::Deleted(results) = outcome else {
		panic!("expected an empty deletion batch, got {outcome:?}");
	};
	assert!(
		results.is_empty(),
		"the generateName-created object must not be pruned as an orphan"
	);
}
