//! Whitelist checks and administration.
//!
//! The whitelist is owned by the ledger and may change at any time, so every check here goes to the gate.

use alloy::primitives::Address;

use crate::ledger::{AccessGate, Confirmation, GateAdmin, LedgerError};

/// Whether `address` is currently whitelisted.
///
/// # Errors
/// Returns a [`LedgerError`] if the gate cannot be queried.
pub async fn is_whitelisted<G: AccessGate + ?Sized>(
    gate: &G,
    address: Address,
) -> Result<bool, LedgerError> {
    gate.is_whitelisted(address).await
}

/// Fails with [`LedgerError::NotWhitelisted`] unless `address` is currently whitelisted.
///
/// # Errors
/// Returns [`LedgerError::NotWhitelisted`] on a gate rejection, or the error of the gate query.
pub async fn ensure_whitelisted<G: AccessGate + ?Sized>(
    gate: &G,
    address: Address,
) -> Result<(), LedgerError> {
    if gate.is_whitelisted(address).await? {
        Ok(())
    } else {
        tracing::warn!(%address, "address is not whitelisted");
        Err(LedgerError::NotWhitelisted)
    }
}

/// Adds `address` to the whitelist.
///
/// Returns `None` without submitting a transaction if the address is already whitelisted.
///
/// # Errors
/// Returns a [`LedgerError`] if the gate cannot be queried or the write fails.
pub async fn add_whitelisted<G: AccessGate + GateAdmin + ?Sized>(
    gate: &G,
    address: Address,
) -> Result<Option<Confirmation>, LedgerError> {
    if gate.is_whitelisted(address).await? {
        tracing::info!(%address, "address is already whitelisted");
        return Ok(None);
    }
    let confirmation = gate.add_whitelisted(address).await?;
    tracing::info!(%address, tx_hash = %confirmation.tx_hash, "address whitelisted");
    Ok(Some(confirmation))
}
