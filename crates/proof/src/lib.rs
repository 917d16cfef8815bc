//! Groth16 proof generation for the Viex account-binding circuit.
//!
//! Two backends implement [`ProvingBackend`]: [`CircomBackend`] proves with the compiled circom circuit whose
//! verifying key is deployed on the ledger, [`NativeBackend`] proves the same relation from an arkworks R1CS
//! circuit with a local setup.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![deny(clippy::all, clippy::nursery)]
#![warn(missing_docs)]

pub mod artifacts;
pub mod backend;
pub mod circuit;
pub mod proof;

pub use artifacts::{ArtifactError, CircuitArtifacts};
pub use backend::{CircomBackend, ProvingBackend};
pub use circuit::{AccountBindingCircuit, NativeBackend};
pub use proof::{ProofError, WitnessError, check_witness, generate_account_proof};
