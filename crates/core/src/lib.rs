//! The core library for the Viex account-binding protocol.
//!
//! A claim `(subject, audience)` from an identity provider is committed to as `idHash` and bound to an account
//! address through `accountHash` on the `ViexProofVerifier` contract. The account can later prove in zero
//! knowledge that it holds the claim behind its `accountHash`.

#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    dead_code
)]

pub mod contracts;

pub mod gate;

mod ledger;
pub use ledger::{AccessGate, Confirmation, ContractLedger, GateAdmin, Ledger, LedgerError};

mod prover;
pub use prover::{ClaimProver, ProverError};

mod registry;
pub use registry::{
    AccountRegistryClient, RegisterClaimError, RegistrationError, RegistrationResult,
    RegistrationStatus, RegistrationStep, RetryConfig,
};

mod verifier;
pub use verifier::{ProofVerifierClient, VerificationError};

pub use viex_primitives::{Claim, Config, FieldElement};

/// Re-export of all the Viex primitives
pub mod primitives {
    pub use viex_primitives::*;
}

/// Re-export of the proving backends
pub mod proof {
    pub use viex_proof::*;
}
