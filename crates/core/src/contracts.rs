//! Solidity contract bindings for the Viex protocol.
//!
//! This module provides auto-generated Rust bindings for the on-chain `ViexProofVerifier`
//! contract via [`alloy::sol!`]. The bindings include full RPC support so
//! callers can interact with a deployed contract directly.
//!
//! # Example
//!
//! ```rust,ignore
//! use viex_core::contracts::IViexProofVerifier;
//!
//! let contract = IViexProofVerifier::new(address, provider);
//! let calldata = proof.calldata();
//! let valid = contract
//!     .verifyProof(calldata.a, calldata.b, calldata.c, calldata.public_signals)
//!     .call()
//!     .await?;
//! ```

alloy::sol! {
    /// Bindings for the `ViexProofVerifier` contract.
    ///
    /// The contract stores `idHash => address` and `address => accountHash`, gates both writes with a
    /// whitelist administered by the owner, and verifies account proofs against the stored `accountHash`
    /// with an embedded Groth16 verifying key.
    #[sol(rpc)]
    #[derive(Debug)]
    interface IViexProofVerifier {
        /// The address bound to an identity commitment, or the zero address.
        function accountAddress(uint256 idHash) external view returns (address);

        /// The account commitment stored for an address, or zero.
        function accountHash(address account) external view returns (uint256);

        /// Binds an identity commitment to an address. Whitelisted senders only.
        function setAccountAddress(uint256 idHash, address account) external;

        /// Stores the account commitment of an address. Whitelisted senders only.
        function setAccountHash(address account, uint256 hash) external;

        /// Verifies a Groth16 account proof. The public signals are `[address, accountHash]`.
        function verifyProof(
            uint256[2] calldata a,
            uint256[2][2] calldata b,
            uint256[2] calldata c,
            uint256[2] calldata pubSignals
        ) external view returns (bool);

        /// Whether an address may register accounts.
        function whitelistAddress(address account) external view returns (bool);

        /// Adds an address to the whitelist. Owner only.
        function addWhitelistAddress(address account) external;

        /// The contract owner, who administers the whitelist.
        function owner() external view returns (address);
    }
}
