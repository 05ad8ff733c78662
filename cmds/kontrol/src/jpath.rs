//! Library search path resolution (spec §4.2): the ordered list of
//! directories jsonnet imports are resolved against for one app.
//!
//! There is no environment-base discovery here: an app's root is wherever
//! its descriptor file lives, and its components are already enumerated by
//! [`crate::config::AppSpec`]. This module only builds the import path
//! list.

use std::path::{Path, PathBuf};

/// Build the import path list for a component rooted at `component_dir`,
/// given the app root and its declared `spec.libraryPaths` (spec §4.4
/// `AppSpec`).
///
/// Order (first match wins): the component's own directory, each declared
/// library path (in declaration order), `<root>/lib`, `<root>/vendor`.
pub fn import_paths(root: &Path, component_dir: &Path, library_paths: &[PathBuf]) -> Vec<PathBuf> {
	let mut paths = vec![component_dir.to_path_buf()];
	paths.extend(library_paths.iter().map(|p| root.join(p)));
	paths.push(root.join("lib"));
	paths.push(root.join("vendor"));
	paths
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn orders_component_dir_first_then_library_paths_then_lib_and_vendor() {
		let root = Path::new("/app");
		let component_dir = Path::new("/app/components/service-a");
		let library_paths = vec![PathBuf::from("third_party/ksonnet")];

		let paths = import_paths(root, component_dir, &library_paths);
		assert_eq!(
			paths,
			vec![
				PathBuf::from("/app/components/service-a"),
				PathBuf::from("/app/third_party/ksonnet"),
				PathBuf::from("/app/lib"),
				PathBuf::from("/app/vendor"),
			]
		);
	}

	#[test]
	fn works_with_no_declared_library_paths() {
		let root = Path::new("/app");
		let component_dir = Path::new("/app/components/service-a");
		let paths = import_paths(root, component_dir, &[]);
		assert_eq!(
			paths,
			vec![
				PathBuf::from("/app/components/service-a"),
				PathBuf::from("/app/lib"),
				PathBuf::from("/app/vendor"),
			]
		);
	}
}
