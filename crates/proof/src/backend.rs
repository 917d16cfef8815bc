//! Proving backends for the account-binding relation.
//!
//! [`CircomBackend`] proves with the compiled circom circuit, whose verifying key is deployed on the ledger.

use ark_bn254::{Bn254, Fr};
use ark_groth16::Proof;
use rand::{CryptoRng, Rng};
use viex_primitives::AccountBindingInput;

pub use groth16_material::circom::{CircomGroth16Material, CircomGroth16MaterialBuilder};

use crate::{ArtifactError, CircuitArtifacts, ProofError, WitnessError};

/// A Groth16 prover and verifier for the account-binding circuit.
///
/// Proving is CPU-bound and blocking. Async callers should run it on a blocking worker.
pub trait ProvingBackend: Send + Sync {
    /// Proves the relation for `input`, returning the proof and the public signals in circuit order.
    ///
    /// # Errors
    /// Returns a [`ProofError`] if the witness cannot be computed or the proof cannot be generated.
    fn prove<R: Rng + CryptoRng>(
        &self,
        input: &AccountBindingInput,
        rng: &mut R,
    ) -> Result<(Proof<Bn254>, Vec<Fr>), ProofError>;

    /// Verifies `proof` against `public` with the backend's verifying key.
    ///
    /// # Errors
    /// Returns a [`ProofError`] if verification could not be carried out at all.
    fn verify(&self, proof: &Proof<Bn254>, public: &[Fr]) -> Result<bool, ProofError>;
}

/// Proving backend over the compiled circom circuit: a witness graph and a `snarkjs`/`arkworks` proving key.
///
/// The proving key must belong to the verifying key deployed on the ledger, or every proof is rejected there.
pub struct CircomBackend {
    material: CircomGroth16Material,
}

impl CircomBackend {
    /// Loads the proving material after checking the artifacts exist and match their pinned fingerprints.
    ///
    /// # Errors
    /// Returns [`ProofError::Artifact`] if an artifact is missing, mismatched or cannot be parsed.
    pub fn load(artifacts: &CircuitArtifacts) -> Result<Self, ProofError> {
        artifacts.verify()?;
        let material = CircomGroth16MaterialBuilder::new()
            .build_from_paths(artifacts.zkey_path(), artifacts.graph_path())
            .map_err(|e| {
                tracing::error!("error while loading circuit material: {e}");
                ArtifactError::Invalid(e.to_string())
            })?;
        tracing::debug!(
            zkey = %artifacts.zkey_path().display(),
            graph = %artifacts.graph_path().display(),
            "loaded account-binding circuit material"
        );
        Ok(Self { material })
    }
}

impl From<CircomGroth16Material> for CircomBackend {
    fn from(material: CircomGroth16Material) -> Self {
        Self { material }
    }
}

impl ProvingBackend for CircomBackend {
    fn prove<R: Rng + CryptoRng>(
        &self,
        input: &AccountBindingInput,
        rng: &mut R,
    ) -> Result<(Proof<Bn254>, Vec<Fr>), ProofError> {
        let witness = self.material.generate_witness(input).map_err(|e| {
            tracing::error!("error during witness calculation: {e}");
            WitnessError::Calculation(e.to_string())
        })?;
        Ok(self.material.generate_proof_from_witness(&witness, rng)?)
    }

    fn verify(&self, proof: &Proof<Bn254>, public: &[Fr]) -> Result<bool, ProofError> {
        Ok(self.material.verify_proof(proof, public).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::artifacts::{GRAPH_FILE, ZKEY_FILE, fingerprint};

    fn write_junk_artifacts(dir: &Path) {
        std::fs::create_dir_all(dir.join("keys")).unwrap();
        std::fs::write(dir.join(GRAPH_FILE), b"not a witness graph").unwrap();
        std::fs::write(dir.join(ZKEY_FILE), b"not a zkey").unwrap();
    }

    #[test]
    fn test_unparsable_artifacts_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_junk_artifacts(dir.path());

        let loaded = CircomBackend::load(&CircuitArtifacts::new(dir.path()));
        assert!(matches!(
            loaded,
            Err(ProofError::Artifact(ArtifactError::Invalid(_)))
        ));
    }

    #[test]
    fn test_fingerprint_mismatch_is_rejected_before_parsing() {
        let dir = tempfile::tempdir().unwrap();
        write_junk_artifacts(dir.path());
        let graph = fingerprint(&dir.path().join(GRAPH_FILE)).unwrap();

        let artifacts = CircuitArtifacts::new(dir.path())
            .with_fingerprints(Some(graph), Some("ff".repeat(32)));
        assert!(matches!(
            CircomBackend::load(&artifacts),
            Err(ProofError::Artifact(ArtifactError::FingerprintMismatch { .. }))
        ));
    }

    #[test]
    fn test_missing_artifacts_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            CircomBackend::load(&CircuitArtifacts::new(dir.path())),
            Err(ProofError::Artifact(ArtifactError::Missing(_)))
        ));
    }
}
