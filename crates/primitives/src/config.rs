use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use alloy_primitives::Address;

use crate::PrimitiveError;

const fn default_confirmation_timeout_secs() -> u64 {
    120
}

const fn default_required_confirmations() -> u64 {
    1
}

fn default_circuit_dir() -> PathBuf {
    PathBuf::from("circuits")
}

/// Global configuration to interact with the `ViexProofVerifier` contract and the circuit artifacts.
///
/// Used by the registration, proving and verification clients.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// A fully qualified RPC domain to perform on-chain call functions
    rpc_url: String,
    /// The address of the `ViexProofVerifier` contract
    verifier_address: Address,
    /// Base path of the compiled circuit program and proving key.
    #[serde(default = "default_circuit_dir")]
    circuit_dir: PathBuf,
    /// Optional SHA-256 fingerprint (hex) of the witness graph.
    #[serde(default)]
    graph_fingerprint: Option<String>,
    /// Optional SHA-256 fingerprint (hex) of the proving key.
    #[serde(default)]
    zkey_fingerprint: Option<String>,
    /// How long to wait for a submitted transaction to be confirmed.
    #[serde(default = "default_confirmation_timeout_secs")]
    confirmation_timeout_secs: u64,
    /// Number of confirmations a transaction needs before it is considered included.
    #[serde(default = "default_required_confirmations")]
    required_confirmations: u64,
}

impl Config {
    /// Instantiates a new configuration with default artifact location and confirmation policy.
    #[must_use]
    pub fn new(rpc_url: String, verifier_address: Address) -> Self {
        Self {
            rpc_url,
            verifier_address,
            circuit_dir: default_circuit_dir(),
            graph_fingerprint: None,
            zkey_fingerprint: None,
            confirmation_timeout_secs: default_confirmation_timeout_secs(),
            required_confirmations: default_required_confirmations(),
        }
    }

    /// Sets the base path of the circuit artifacts.
    #[must_use]
    pub fn with_circuit_dir(mut self, circuit_dir: impl Into<PathBuf>) -> Self {
        self.circuit_dir = circuit_dir.into();
        self
    }

    /// Overrides the RPC endpoint.
    #[must_use]
    pub fn with_rpc_url(mut self, rpc_url: impl Into<String>) -> Self {
        self.rpc_url = rpc_url.into();
        self
    }

    /// Overrides the verifier contract address.
    #[must_use]
    pub const fn with_verifier_address(mut self, verifier_address: Address) -> Self {
        self.verifier_address = verifier_address;
        self
    }

    /// Loads a configuration from JSON.
    ///
    /// # Errors
    /// Will error if the JSON is not valid.
    pub fn from_json(json_str: &str) -> Result<Self, PrimitiveError> {
        serde_json::from_str(json_str)
            .map_err(|e| PrimitiveError::Serialization(format!("failed to parse config: {e}")))
    }

    /// The RPC endpoint to perform RPC calls.
    #[must_use]
    pub const fn rpc_url(&self) -> &String {
        &self.rpc_url
    }

    /// The address of the `ViexProofVerifier` contract.
    #[must_use]
    pub const fn verifier_address(&self) -> &Address {
        &self.verifier_address
    }

    /// The directory containing the witness graph and the `keys/` folder with the proving key.
    #[must_use]
    pub fn circuit_dir(&self) -> &Path {
        &self.circuit_dir
    }

    /// The expected fingerprint of the witness graph, if pinned.
    #[must_use]
    pub fn graph_fingerprint(&self) -> Option<&str> {
        self.graph_fingerprint.as_deref()
    }

    /// The expected fingerprint of the proving key, if pinned.
    #[must_use]
    pub fn zkey_fingerprint(&self) -> Option<&str> {
        self.zkey_fingerprint.as_deref()
    }

    /// Maximum time to wait for a transaction receipt, in seconds.
    #[must_use]
    pub const fn confirmation_timeout_secs(&self) -> u64 {
        self.confirmation_timeout_secs
    }

    /// Confirmations required before a write is considered included. Never lower than one.
    #[must_use]
    pub const fn required_confirmations(&self) -> u64 {
        if self.required_confirmations == 0 {
            1
        } else {
            self.required_confirmations
        }
    }
}
