//! Location and integrity checks of the compiled account-binding circuit.
//!
//! A circuit directory is laid out the way the circom toolchain leaves it:
//!
//! ```text
//! <base>/viex_proof_graph.bin   witness graph (compiled circuit program)
//! <base>/keys/viex_proof.zkey   Groth16 proving key
//! ```

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use viex_primitives::Config;

/// File name of the witness graph, relative to the circuit directory.
pub const GRAPH_FILE: &str = "viex_proof_graph.bin";
/// File name of the proving key, relative to the circuit directory.
pub const ZKEY_FILE: &str = "keys/viex_proof.zkey";

/// Errors raised when the proving material is missing or does not match what is expected.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    /// An artifact does not exist at the resolved path.
    #[error("circuit artifact not found at {}", .0.display())]
    Missing(PathBuf),
    /// An artifact exists but could not be read.
    #[error("failed to read circuit artifact {}: {source}", path.display())]
    Io {
        /// The artifact path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
    /// The SHA-256 fingerprint of an artifact does not match the pinned value.
    #[error("invalid {} - wrong sha256 fingerprint (expected {expected}, got {actual})", path.display())]
    FingerprintMismatch {
        /// The artifact path.
        path: PathBuf,
        /// The pinned fingerprint.
        expected: String,
        /// The fingerprint of the file on disk.
        actual: String,
    },
    /// The artifacts could be read but not parsed into proving material.
    #[error("invalid circuit artifacts: {0}")]
    Invalid(String),
    /// The proving backend returned public signals that do not match the circuit's declared public inputs.
    #[error("public signals do not match the circuit: {0}")]
    PublicSignals(String),
}

/// Resolved paths (and optional fingerprints) of the witness graph and proving key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitArtifacts {
    graph: PathBuf,
    zkey: PathBuf,
    graph_fingerprint: Option<String>,
    zkey_fingerprint: Option<String>,
}

impl CircuitArtifacts {
    /// Resolves the artifacts below `base_dir`.
    #[must_use]
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        let base_dir = base_dir.as_ref();
        Self {
            graph: base_dir.join(GRAPH_FILE),
            zkey: base_dir.join(ZKEY_FILE),
            graph_fingerprint: None,
            zkey_fingerprint: None,
        }
    }

    /// Resolves the artifacts from the circuit directory and fingerprints in `config`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.circuit_dir()).with_fingerprints(
            config.graph_fingerprint().map(ToOwned::to_owned),
            config.zkey_fingerprint().map(ToOwned::to_owned),
        )
    }

    /// Pins the expected SHA-256 fingerprints (lowercase hex) of the graph and the proving key.
    #[must_use]
    pub fn with_fingerprints(mut self, graph: Option<String>, zkey: Option<String>) -> Self {
        self.graph_fingerprint = graph.map(|f| f.to_lowercase());
        self.zkey_fingerprint = zkey.map(|f| f.to_lowercase());
        self
    }

    /// Path of the witness graph.
    #[must_use]
    pub fn graph_path(&self) -> &Path {
        &self.graph
    }

    /// Path of the proving key.
    #[must_use]
    pub fn zkey_path(&self) -> &Path {
        &self.zkey
    }

    /// Checks that both artifacts exist and match their pinned fingerprints.
    ///
    /// # Errors
    /// Returns [`ArtifactError::Missing`] for a missing file and [`ArtifactError::FingerprintMismatch`] if a
    /// pinned fingerprint does not match.
    pub fn verify(&self) -> Result<(), ArtifactError> {
        check_artifact(&self.graph, self.graph_fingerprint.as_deref())?;
        check_artifact(&self.zkey, self.zkey_fingerprint.as_deref())
    }
}

/// Computes the SHA-256 fingerprint (lowercase hex) of the file at `path`.
///
/// # Errors
/// Returns [`ArtifactError::Missing`] if the file does not exist and [`ArtifactError::Io`] if it cannot be read.
pub fn fingerprint(path: &Path) -> Result<String, ArtifactError> {
    let bytes = std::fs::read(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ArtifactError::Missing(path.to_path_buf())
        } else {
            ArtifactError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    Ok(hex::encode(Sha256::digest(bytes)))
}

fn check_artifact(path: &Path, expected: Option<&str>) -> Result<(), ArtifactError> {
    if !path.is_file() {
        return Err(ArtifactError::Missing(path.to_path_buf()));
    }
    let Some(expected) = expected else {
        return Ok(());
    };
    let actual = fingerprint(path)?;
    if actual != expected {
        tracing::error!(path = %path.display(), %expected, %actual, "circuit artifact fingerprint mismatch");
        return Err(ArtifactError::FingerprintMismatch {
            path: path.to_path_buf(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_artifacts(dir: &Path) {
        std::fs::create_dir_all(dir.join("keys")).unwrap();
        std::fs::write(dir.join(GRAPH_FILE), b"graph").unwrap();
        std::fs::write(dir.join(ZKEY_FILE), b"zkey").unwrap();
    }

    #[test]
    fn test_paths_are_resolved_from_base_dir() {
        let artifacts = CircuitArtifacts::new("/opt/circuits");
        assert_eq!(
            artifacts.graph_path(),
            Path::new("/opt/circuits/viex_proof_graph.bin")
        );
        assert_eq!(
            artifacts.zkey_path(),
            Path::new("/opt/circuits/keys/viex_proof.zkey")
        );
    }

    #[test]
    fn test_missing_artifacts_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = CircuitArtifacts::new(dir.path()).verify().unwrap_err();
        assert!(matches!(err, ArtifactError::Missing(path) if path.ends_with(GRAPH_FILE)));
    }

    #[test]
    fn test_fingerprints_are_checked() {
        let dir = tempfile::tempdir().unwrap();
        write_artifacts(dir.path());

        let graph = fingerprint(&dir.path().join(GRAPH_FILE)).unwrap();
        let zkey = fingerprint(&dir.path().join(ZKEY_FILE)).unwrap();
        assert_eq!(graph.len(), 64);

        CircuitArtifacts::new(dir.path())
            .with_fingerprints(Some(graph.to_uppercase()), Some(zkey.clone()))
            .verify()
            .unwrap();

        let err = CircuitArtifacts::new(dir.path())
            .with_fingerprints(Some(graph), Some("00".repeat(32)))
            .verify()
            .unwrap_err();
        assert!(matches!(
            err,
            ArtifactError::FingerprintMismatch { actual, .. } if actual == zkey
        ));
    }

    #[test]
    fn test_unpinned_artifacts_only_need_to_exist() {
        let dir = tempfile::tempdir().unwrap();
        write_artifacts(dir.path());
        CircuitArtifacts::new(dir.path()).verify().unwrap();
    }
}
