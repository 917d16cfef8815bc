use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use alloy::primitives::{Address, TxHash, keccak256};
use ark_bn254::Bn254;
use ark_groth16::{Groth16, PreparedVerifyingKey};
use async_trait::async_trait;
use parking_lot::Mutex;
use viex_core::{AccessGate, Confirmation, GateAdmin, Ledger, LedgerError};
use viex_primitives::{FieldElement, ProofCalldata};

/// The write entry points of the verifier contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerCall {
    SetAccountAddress,
    SetAccountHash,
    AddWhitelistAddress,
}

/// A failure injected into the next matching write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The RPC fails before the transaction reaches the chain.
    Transport,
    /// The transaction is included but the confirmation wait times out.
    TimeoutAfterInclusion,
}

#[derive(Default)]
struct State {
    account_address: HashMap<FieldElement, Address>,
    account_hash: HashMap<Address, FieldElement>,
    whitelist: HashSet<Address>,
    faults: Vec<(LedgerCall, Fault)>,
    submissions: HashMap<LedgerCall, usize>,
    verify_calls: usize,
    block_number: u64,
}

/// An in-memory emulation of the `ViexProofVerifier` contract.
///
/// Writes require the sender to be whitelisted, whitelisting requires the owner, and `verifyProof` checks the
/// stored `accountHash` before the pairing check. Handles created with [`InMemoryLedger::as_sender`] share
/// the same state.
#[derive(Clone)]
pub struct InMemoryLedger {
    state: Arc<Mutex<State>>,
    owner: Address,
    sender: Address,
    verifying_key: Arc<PreparedVerifyingKey<Bn254>>,
}

impl InMemoryLedger {
    pub fn new(owner: Address, verifying_key: PreparedVerifyingKey<Bn254>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            owner,
            sender: owner,
            verifying_key: Arc::new(verifying_key),
        }
    }

    /// A handle on the same ledger that signs as `sender`.
    pub fn as_sender(&self, sender: Address) -> Self {
        Self {
            sender,
            ..self.clone()
        }
    }

    pub const fn owner(&self) -> Address {
        self.owner
    }

    /// Whitelists `address` directly, bypassing the owner check.
    pub fn grant(&self, address: Address) {
        self.state.lock().whitelist.insert(address);
    }

    pub fn revoke(&self, address: Address) {
        self.state.lock().whitelist.remove(&address);
    }

    /// Makes the next `call` fail with `fault`.
    pub fn fail_next(&self, call: LedgerCall, fault: Fault) {
        self.state.lock().faults.push((call, fault));
    }

    /// Number of transactions that reached the chain for `call`.
    pub fn submissions(&self, call: LedgerCall) -> usize {
        self.state
            .lock()
            .submissions
            .get(&call)
            .copied()
            .unwrap_or_default()
    }

    /// Number of `verifyProof` calls.
    pub fn verify_calls(&self) -> usize {
        self.state.lock().verify_calls
    }

    fn write(
        &self,
        call: LedgerCall,
        apply: impl FnOnce(&mut State),
    ) -> Result<Confirmation, LedgerError> {
        let mut state = self.state.lock();
        let allowed = match call {
            LedgerCall::AddWhitelistAddress => self.sender == self.owner,
            LedgerCall::SetAccountAddress | LedgerCall::SetAccountHash => {
                state.whitelist.contains(&self.sender)
            }
        };
        if !allowed {
            return Err(match call {
                LedgerCall::AddWhitelistAddress => LedgerError::Reverted {
                    reason: "Ownable: caller is not the owner".to_string(),
                },
                _ => LedgerError::from_revert_reason("Sender is not in whitelist"),
            });
        }

        let fault = state
            .faults
            .iter()
            .position(|(c, _)| *c == call)
            .map(|i| state.faults.remove(i).1);
        if fault == Some(Fault::Transport) {
            return Err(LedgerError::Transport("injected transport failure".to_string()));
        }

        apply(&mut state);
        state.block_number += 1;
        let submissions = state.submissions.entry(call).or_default();
        *submissions += 1;
        let tx_hash: TxHash = keccak256(format!("{call:?}/{}", state.block_number));

        if fault == Some(Fault::TimeoutAfterInclusion) {
            return Err(LedgerError::ConfirmationTimeout { tx_hash });
        }
        Ok(Confirmation {
            tx_hash,
            block_number: Some(state.block_number),
        })
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn account_address(&self, id_hash: FieldElement) -> Result<Address, LedgerError> {
        Ok(self
            .state
            .lock()
            .account_address
            .get(&id_hash)
            .copied()
            .unwrap_or(Address::ZERO))
    }

    async fn account_hash(&self, address: Address) -> Result<FieldElement, LedgerError> {
        Ok(self
            .state
            .lock()
            .account_hash
            .get(&address)
            .copied()
            .unwrap_or(FieldElement::ZERO))
    }

    async fn set_account_address(
        &self,
        id_hash: FieldElement,
        address: Address,
    ) -> Result<Confirmation, LedgerError> {
        self.write(LedgerCall::SetAccountAddress, |state| {
            state.account_address.insert(id_hash, address);
        })
    }

    async fn set_account_hash(
        &self,
        address: Address,
        account_hash: FieldElement,
    ) -> Result<Confirmation, LedgerError> {
        self.write(LedgerCall::SetAccountHash, |state| {
            state.account_hash.insert(address, account_hash);
        })
    }

    async fn verify_proof(&self, calldata: &ProofCalldata) -> Result<bool, LedgerError> {
        let malformed = |e: viex_primitives::PrimitiveError| LedgerError::Reverted {
            reason: e.to_string(),
        };
        let signals = calldata.public_signals().map_err(malformed)?;
        let address = signals.address().map_err(malformed)?;
        let proof = calldata.to_groth16_proof().map_err(malformed)?;

        let stored = {
            let mut state = self.state.lock();
            state.verify_calls += 1;
            state.account_hash.get(&address).copied()
        };
        if stored != Some(signals.account_hash) {
            return Ok(false);
        }

        Groth16::<Bn254>::verify_proof(&self.verifying_key, &proof, &signals.to_vec())
            .map_err(|e| LedgerError::Reverted {
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl AccessGate for InMemoryLedger {
    async fn is_whitelisted(&self, address: Address) -> Result<bool, LedgerError> {
        Ok(self.state.lock().whitelist.contains(&address))
    }
}

#[async_trait]
impl GateAdmin for InMemoryLedger {
    async fn add_whitelisted(&self, address: Address) -> Result<Confirmation, LedgerError> {
        self.write(LedgerCall::AddWhitelistAddress, |state| {
            state.whitelist.insert(address);
        })
    }
}
