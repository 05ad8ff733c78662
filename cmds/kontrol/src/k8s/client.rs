//! Kubernetes cluster connection management (C8).

use std::time::Duration;

use k8s_openapi::apimachinery::pkg::version::Info;
use kube::{
	config::{KubeConfigOptions, Kubeconfig, KubeconfigError},
	Client, Config,
};
use thiserror::Error;
use tracing::instrument;

use crate::env::Environment;

/// Default timeout for Kubernetes API requests.
const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur when connecting to a Kubernetes cluster.
#[derive(Debug, Error)]
pub enum ConnectionError {
	#[error(
		"environment is missing both `server` and `context`; exactly one must be set \
		 (this should have been caught by environment validation)"
	)]
	IncompleteSpec,

	#[error("no cluster that matches the server `{0}` was found. Please check your $KUBECONFIG")]
	ClusterNotFound(String),

	#[error("no context using cluster `{0}` was found. Please check your $KUBECONFIG")]
	ContextNotFoundForCluster(String),

	#[error("no context named `{0}` was found. Please check your $KUBECONFIG")]
	ContextNotFound(String),

	#[error(transparent)]
	Kubeconfig(#[from] KubeconfigError),

	#[error(transparent)]
	Kube(#[from] kube::Error),
}

/// A live connection to a Kubernetes cluster: the kube client plus the
/// server metadata needed elsewhere in the pipeline (C1's discovery, C8's
/// display name).
#[derive(Clone)]
pub struct ClusterConnection {
	client: Client,
	server_version: Info,
	/// Human-readable identifier for the cluster (context name or server URL).
	cluster_identifier: String,
}

impl std::fmt::Debug for ClusterConnection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ClusterConnection")
			.field("cluster_identifier", &self.cluster_identifier)
			.field("server_version", &self.server_version)
			.finish_non_exhaustive()
	}
}

impl ClusterConnection {
	/// Connect to a cluster using a resolved environment.
	///
	/// Exactly one of `environment.server` or `environment.context` is set
	/// (enforced by [`crate::env::validate_environments`]):
	/// - `server`: searches kubeconfig for a cluster with a matching server
	///   URL, then finds a context that references that cluster;
	/// - `context`: uses that context name directly.
	#[instrument(skip_all)]
	pub async fn from_environment(env: &Environment) -> Result<Self, ConnectionError> {
		let kubeconfig = Kubeconfig::read()?;
		Self::from_environment_with_kubeconfig(env, kubeconfig).await
	}

	/// Connect to a cluster using a resolved environment and a provided
	/// kubeconfig (the seam used by tests).
	#[instrument(skip_all)]
	pub async fn from_environment_with_kubeconfig(
		env: &Environment,
		kubeconfig: Kubeconfig,
	) -> Result<Self, ConnectionError> {
		let (mut config, cluster_identifier) = if let Some(server) = &env.server {
			let context_name = find_context_for_server(&kubeconfig, server)?;

			tracing::debug!(context = %context_name, server = %server, "found context for server");

			let config = Config::from_custom_kubeconfig(
				kubeconfig,
				&KubeConfigOptions {
					context: Some(context_name.clone()),
					..Default::default()
				},
			)
			.await?;

			(config, format!("{server} (context:{context_name})"))
		} else if let Some(context) = &env.context {
			find_context(&kubeconfig, context)?;

			tracing::debug!(context = %context, "using context");

			let config = Config::from_custom_kubeconfig(
				kubeconfig,
				&KubeConfigOptions {
					context: Some(context.clone()),
					..Default::default()
				},
			)
			.await?;

			(config, format!("context:{context}"))
		} else {
			return Err(ConnectionError::IncompleteSpec);
		};

		config.read_timeout = Some(DEFAULT_API_TIMEOUT);
		let client = Client::try_from(config)?;

		let server_version = client.apiserver_version().await?;

		Ok(Self {
			client,
			server_version,
			cluster_identifier,
		})
	}

	pub fn client(&self) -> &Client {
		&self.client
	}

	pub fn server_version(&self) -> &Info {
		&self.server_version
	}

	pub fn default_namespace(&self) -> &str {
		self.client.default_namespace()
	}

	/// Human-readable identifier for the cluster (context name or server URL).
	pub fn cluster_identifier(&self) -> &str {
		&self.cluster_identifier
	}
}

/// Find a kubeconfig context that uses a cluster with the given server URL.
fn find_context_for_server(
	kubeconfig: &Kubeconfig,
	server: &str,
) -> Result<String, ConnectionError> {
	let matching_cluster = kubeconfig
		.clusters
		.iter()
		.find(|c| {
			c.cluster
				.as_ref()
				.is_some_and(|cluster| cluster.server.as_deref() == Some(server))
		})
		.ok_or_else(|| ConnectionError::ClusterNotFound(server.to_owned()))?;

	let cluster_name = &matching_cluster.name;

	let matching_context = kubeconfig
		.contexts
		.iter()
		.find(|c| {
			c.context
				.as_ref()
				.is_some_and(|ctx| ctx.cluster.as_str() == cluster_name)
		})
		.ok_or_else(|| ConnectionError::ContextNotFoundForCluster(cluster_name.clone()))?;

	Ok(matching_context.name.clone())
}

/// Confirm a named context exists in kubeconfig.
fn find_context(kubeconfig: &Kubeconfig, context: &str) -> Result<(), ConnectionError> {
	if kubeconfig.contexts.iter().any(|c| c.name == context) {
		Ok(())
	} else {
		Err(ConnectionError::ContextNotFound(context.to_owned()))
	}
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;

	use super::*;

	#[tokio::test]
	async fn test_connect_no_cluster_specified_errors() {
		let env = Environment::default();
		let kubeconfig = Kubeconfig::default();

		let result = ClusterConnection::from_environment_with_kubeconfig(&env, kubeconfig).await;
		assert_matches!(result, Err(ConnectionError::IncompleteSpec));
	}

	#[tokio::test]
	async fn test_connect_context_not_found() {
		let env = Environment {
			context: Some("nonexistent".to_owned()),
			..Default::default()
		};
		let kubeconfig = Kubeconfig::default();

		let result = ClusterConnection::from_environment_with_kubeconfig(&env, kubeconfig).await;
		assert_matches!(
			result,
			Err(ConnectionError::ContextNotFound(name)) if name == "nonexistent"
		);
	}

	#[tokio::test]
	async fn test_connect_server_not_found() {
		let env = Environment {
			server: Some("https://unknown:6443".to_owned()),
			..Default::default()
		};
		let kubeconfig = Kubeconfig::default();

		let result = ClusterConnection::from_environment_with_kubeconfig(&env, kubeconfig).await;
		assert_matches!(
			result,
			Err(ConnectionError::ClusterNotFound(server)) if server == "https://unknown:6443"
		);
	}
}
