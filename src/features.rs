//! Feature file discovery.
//!
//! Feature files for a backend live in `<root>/<backend>/*.feature`. Paths are
//! returned sorted by file name so that stop-on-failure always halts at the
//! same scenario for the same inputs.

use std::path::{Path, PathBuf};

use cucumber::feature::Ext as _;
use cucumber::gherkin::{Feature, GherkinEnv};
use tracing::debug;

use crate::backend::Backend;

/// Extension of Gherkin feature files.
pub const FEATURE_EXTENSION: &str = "feature";

/// Errors raised while locating or reading feature files.
#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("Feature directory {} for {backend} does not exist", .path.display())]
    MissingRoot { backend: Backend, path: PathBuf },

    #[error("Failed to read feature directory {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse feature {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
}

/// Directory holding the feature files of `backend`.
pub fn backend_features_dir(root: &Path, backend: Backend) -> PathBuf {
    root.join(backend.name())
}

/// Find the feature files of `backend` whose file name starts with `prefix`.
///
/// An empty prefix selects every feature file.
pub fn find_feature_paths(
    root: &Path,
    backend: Backend,
    prefix: &str,
) -> Result<Vec<PathBuf>, LocationError> {
    let dir = backend_features_dir(root, backend);
    if !dir.is_dir() {
        return Err(LocationError::MissingRoot { backend, path: dir });
    }

    let io_error = |source| LocationError::Io {
        path: dir.clone(),
        source,
    };

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(&dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        if !path.is_file() || !is_feature_file(&path) {
            continue;
        }
        let matches = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(prefix));
        if matches {
            paths.push(path);
        }
    }
    paths.sort();

    debug!(backend = %backend, prefix = %prefix, count = paths.len(), "Located feature files");
    Ok(paths)
}

fn is_feature_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext == FEATURE_EXTENSION)
}

/// Parse every feature file, failing on the first that is not valid Gherkin.
///
/// Scenario outlines come back expanded, one scenario per example row.
pub fn load_features(paths: &[PathBuf]) -> Result<Vec<Feature>, LocationError> {
    paths.iter().map(|path| load_feature(path)).collect()
}

fn load_feature(path: &Path) -> Result<Feature, LocationError> {
    let parse_error = |message: String| LocationError::Parse {
        path: path.to_path_buf(),
        message,
    };
    Feature::parse_path(path, GherkinEnv::default())
        .map_err(|err| parse_error(err.to_string()))?
        .expand_examples()
        .map_err(|err| parse_error(err.to_string()))
}
