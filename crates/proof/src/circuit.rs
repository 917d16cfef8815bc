//! The account-binding relation as an arkworks R1CS circuit.
//!
//! Public inputs, in order: `address`, `accountHash`. Private witnesses: `sub`, `aud`.
//! The single constraint is `Poseidon(sub, aud, address) == accountHash` with the circomlib Poseidon
//! parameter set, so the circuit accepts exactly the witnesses the circom circuit accepts.

use ark_bn254::{Bn254, Fr};
use ark_groth16::{Groth16, PreparedVerifyingKey, Proof, ProvingKey, VerifyingKey};
use ark_r1cs_std::{fields::fp::FpVar, prelude::*};
use ark_relations::r1cs::{
    ConstraintSynthesizer, ConstraintSystem, ConstraintSystemRef, SynthesisError,
};
use ark_snark::{CircuitSpecificSetupSNARK, SNARK};
use light_poseidon::{PoseidonParameters, parameters::bn254_x5::get_poseidon_parameters};
use rand::{CryptoRng, Rng};
use viex_primitives::AccountBindingInput;

use crate::{ProofError, ProvingBackend, WitnessError};

/// Number of hashed inputs in the account commitment: `sub`, `aud`, `address`.
const ACCOUNT_HASH_ARITY: usize = 3;

fn circom_parameters(arity: usize) -> PoseidonParameters<Fr> {
    #[allow(clippy::cast_possible_truncation)]
    let width = (arity + 1) as u8;
    get_poseidon_parameters::<Fr>(width).expect("circom parameters exist for the account hash arity")
}

/// `x^5`, the S-box of the BN254 Poseidon instance.
fn sbox(x: &FpVar<Fr>) -> Result<FpVar<Fr>, SynthesisError> {
    let x2 = x.square()?;
    let x4 = x2.square()?;
    Ok(x4 * x)
}

/// In-circuit Poseidon permutation with a zero domain tag, returning the first state element.
fn poseidon_gadget(
    params: &PoseidonParameters<Fr>,
    inputs: &[FpVar<Fr>],
) -> Result<FpVar<Fr>, SynthesisError> {
    let width = params.width;
    let half_full = params.full_rounds / 2;
    let rounds = params.full_rounds + params.partial_rounds;

    let mut state = Vec::with_capacity(width);
    state.push(FpVar::zero());
    state.extend(inputs.iter().cloned());
    if state.len() != width {
        return Err(SynthesisError::Unsatisfiable);
    }

    for round in 0..rounds {
        for (i, element) in state.iter_mut().enumerate() {
            *element += params.ark[round * width + i];
        }

        if round < half_full || round >= half_full + params.partial_rounds {
            for element in &mut state {
                *element = sbox(element)?;
            }
        } else {
            state[0] = sbox(&state[0])?;
        }

        state = params
            .mds
            .iter()
            .map(|row| {
                state
                    .iter()
                    .zip(row)
                    .fold(FpVar::zero(), |acc, (element, m)| acc + element * *m)
            })
            .collect();
    }

    Ok(state.swap_remove(0))
}

/// The account-binding circuit.
#[derive(Clone)]
pub struct AccountBindingCircuit<'a> {
    subject: Fr,
    audience: Fr,
    address: Fr,
    account_hash: Fr,
    params: &'a PoseidonParameters<Fr>,
}

impl<'a> AccountBindingCircuit<'a> {
    fn new(input: &AccountBindingInput, params: &'a PoseidonParameters<Fr>) -> Self {
        Self {
            subject: *input.subject,
            audience: *input.audience,
            address: *input.address,
            account_hash: *input.account_hash,
            params,
        }
    }

    /// A circuit with all-zero assignments, only used for the key setup.
    fn blank(params: &'a PoseidonParameters<Fr>) -> Self {
        Self {
            subject: Fr::from(0u64),
            audience: Fr::from(0u64),
            address: Fr::from(0u64),
            account_hash: Fr::from(0u64),
            params,
        }
    }
}

impl ConstraintSynthesizer<Fr> for AccountBindingCircuit<'_> {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        // public inputs first, in verifier order
        let address = FpVar::new_input(cs.clone(), || Ok(self.address))?;
        let account_hash = FpVar::new_input(cs.clone(), || Ok(self.account_hash))?;
        let subject = FpVar::new_witness(cs.clone(), || Ok(self.subject))?;
        let audience = FpVar::new_witness(cs, || Ok(self.audience))?;

        let computed = poseidon_gadget(self.params, &[subject, audience, address])?;
        computed.enforce_equal(&account_hash)
    }
}

/// Proving backend over the native R1CS circuit with a circuit-specific Groth16 setup.
///
/// Runs the whole protocol without compiled circom artifacts. The keys come from a local trusted setup, so
/// proofs only verify against [`NativeBackend::verifying_key`], never against a deployed circom verifier.
pub struct NativeBackend {
    params: PoseidonParameters<Fr>,
    pk: ProvingKey<Bn254>,
    pvk: PreparedVerifyingKey<Bn254>,
}

impl NativeBackend {
    /// Runs the circuit-specific Groth16 setup.
    ///
    /// # Errors
    /// Returns [`ProofError::Synthesis`] if the constraint system cannot be built.
    pub fn setup<R: Rng + CryptoRng>(rng: &mut R) -> Result<Self, ProofError> {
        let params = circom_parameters(ACCOUNT_HASH_ARITY);
        let (pk, vk) = <Groth16<Bn254> as CircuitSpecificSetupSNARK<Fr>>::setup(
            AccountBindingCircuit::blank(&params),
            rng,
        )?;
        let pvk = Groth16::<Bn254>::process_vk(&vk)?;
        tracing::debug!(
            public_inputs = vk.gamma_abc_g1.len() - 1,
            "native account-binding circuit setup complete"
        );
        Ok(Self { params, pk, pvk })
    }

    /// The verifying key of this setup.
    #[must_use]
    pub const fn verifying_key(&self) -> &VerifyingKey<Bn254> {
        &self.pk.vk
    }

    /// The verifying key prepared for pairing checks.
    #[must_use]
    pub const fn prepared_verifying_key(&self) -> &PreparedVerifyingKey<Bn254> {
        &self.pvk
    }

    /// Checks whether `input` satisfies every constraint of the circuit.
    ///
    /// # Errors
    /// Returns [`ProofError::Synthesis`] if the constraint system cannot be built.
    pub fn is_satisfied(&self, input: &AccountBindingInput) -> Result<bool, ProofError> {
        let cs = ConstraintSystem::<Fr>::new_ref();
        AccountBindingCircuit::new(input, &self.params).generate_constraints(cs.clone())?;
        Ok(cs.is_satisfied()?)
    }
}

impl ProvingBackend for NativeBackend {
    fn prove<R: Rng + CryptoRng>(
        &self,
        input: &AccountBindingInput,
        rng: &mut R,
    ) -> Result<(Proof<Bn254>, Vec<Fr>), ProofError> {
        if !self.is_satisfied(input)? {
            tracing::error!("witness does not satisfy the account-binding circuit");
            return Err(WitnessError::Unsatisfied.into());
        }
        let circuit = AccountBindingCircuit::new(input, &self.params);
        let proof = Groth16::<Bn254>::prove(&self.pk, circuit, rng)?;
        let public = input.public_inputs().map(Fr::from).to_vec();
        Ok((proof, public))
    }

    fn verify(&self, proof: &Proof<Bn254>, public: &[Fr]) -> Result<bool, ProofError> {
        Ok(Groth16::<Bn254>::verify_with_processed_vk(
            &self.pvk, public, proof,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::address;
    use rand::thread_rng;
    use viex_primitives::{Claim, FieldElement, commit_account, poseidon_hash3};

    use super::*;

    fn poseidon_in_circuit(inputs: [FieldElement; 3]) -> Fr {
        let cs = ConstraintSystem::<Fr>::new_ref();
        let params = circom_parameters(ACCOUNT_HASH_ARITY);
        let vars = inputs
            .iter()
            .map(|fe| FpVar::new_witness(cs.clone(), || Ok(**fe)).unwrap())
            .collect::<Vec<_>>();
        let out = poseidon_gadget(&params, &vars).unwrap();
        assert!(cs.is_satisfied().unwrap());
        out.value().unwrap()
    }

    #[test]
    fn test_gadget_matches_native_poseidon() {
        let inputs = [
            FieldElement::from(1u64),
            FieldElement::from(2u64),
            FieldElement::from(3u64),
        ];
        assert_eq!(
            FieldElement::from(poseidon_in_circuit(inputs)),
            poseidon_hash3(inputs[0], inputs[1], inputs[2])
        );
    }

    #[test]
    fn test_circuit_accepts_registered_binding_only() {
        let params = circom_parameters(ACCOUNT_HASH_ARITY);
        let claim = Claim::new("user-123", "app.example");
        let address = address!("0xabcdabcdabcdabcdabcdabcdabcdabcdabcdabcd");
        let account_hash = commit_account(&claim, address).unwrap();

        let good = AccountBindingInput::new(&claim, address, account_hash).unwrap();
        let cs = ConstraintSystem::<Fr>::new_ref();
        AccountBindingCircuit::new(&good, &params)
            .generate_constraints(cs.clone())
            .unwrap();
        assert!(cs.is_satisfied().unwrap());
        // constant + address + accountHash
        assert_eq!(cs.num_instance_variables(), 3);

        let bad = AccountBindingInput::new(&Claim::new("user-123", "app.other"), address, account_hash)
            .unwrap();
        let cs = ConstraintSystem::<Fr>::new_ref();
        AccountBindingCircuit::new(&bad, &params)
            .generate_constraints(cs.clone())
            .unwrap();
        assert!(!cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_native_backend_proves_and_verifies() {
        let mut rng = thread_rng();
        let backend = NativeBackend::setup(&mut rng).unwrap();

        let claim = Claim::new("user-123", "app.example");
        let address = address!("0xabcdabcdabcdabcdabcdabcdabcdabcdabcdabcd");
        let input =
            AccountBindingInput::new(&claim, address, commit_account(&claim, address).unwrap())
                .unwrap();

        let (proof, public) = backend.prove(&input, &mut rng).unwrap();
        assert_eq!(public, vec![*input.address, *input.account_hash]);
        assert!(backend.verify(&proof, &public).unwrap());

        let swapped = vec![public[1], public[0]];
        assert!(!backend.verify(&proof, &swapped).unwrap());
    }

    #[test]
    fn test_native_backend_refuses_bad_witness() {
        let mut rng = thread_rng();
        let backend = NativeBackend::setup(&mut rng).unwrap();
        let input = AccountBindingInput::new(
            &Claim::new("user-123", "app.example"),
            address!("0xabcdabcdabcdabcdabcdabcdabcdabcdabcdabcd"),
            FieldElement::ONE,
        )
        .unwrap();

        assert!(matches!(
            backend.prove(&input, &mut rng),
            Err(ProofError::Witness(WitnessError::Unsatisfied))
        ));
    }
}
