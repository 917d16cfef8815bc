use alloy_primitives::Address;
use ark_bn254::{Bn254, Fq, Fq2, G1Affine, G2Affine};
use ark_ec::AffineRepr;
use ark_ff::{BigInt, PrimeField};
use ark_groth16::Proof;
use ruint::aliases::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};

use crate::{FieldElement, PrimitiveError, ScalarField};

/// Number of public signals exposed by the account-binding circuit.
pub const PUBLIC_SIGNAL_COUNT: usize = 2;

/// Byte length of the binary form of [`ProofCalldata`]: 8 proof coordinates and 2 public signals.
const CALLDATA_BYTES: usize = (8 + PUBLIC_SIGNAL_COUNT) * 32;

/// The public signals of an account proof.
///
/// The verifier reads them positionally, so the order is fixed to `[address, accountHash]`.
/// The claim itself (`sub`, `aud`) is never part of the public signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicSignals {
    /// The account address, embedded in the field.
    pub address: FieldElement,
    /// The `accountHash` the proof was generated against.
    pub account_hash: FieldElement,
}

impl PublicSignals {
    /// Parses the positional signal vector returned by a proving backend.
    ///
    /// # Errors
    /// Returns [`PrimitiveError::InvalidInput`] if the vector does not have exactly [`PUBLIC_SIGNAL_COUNT`] entries.
    pub fn from_slice(signals: &[ScalarField]) -> Result<Self, PrimitiveError> {
        match signals {
            [address, account_hash] => Ok(Self {
                address: (*address).into(),
                account_hash: (*account_hash).into(),
            }),
            _ => Err(PrimitiveError::InvalidInput {
                attribute: "public_signals".to_string(),
                reason: format!(
                    "expected {PUBLIC_SIGNAL_COUNT} public signals, got {}",
                    signals.len()
                ),
            }),
        }
    }

    /// The signals in circuit order, as consumed by Groth16 verification.
    #[must_use]
    pub fn to_vec(&self) -> Vec<ScalarField> {
        vec![*self.address, *self.account_hash]
    }

    /// The account address carried by the signals.
    ///
    /// # Errors
    /// Returns [`PrimitiveError::OutOfBounds`] if the address signal does not fit in 160 bits.
    pub fn address(&self) -> Result<Address, PrimitiveError> {
        self.address.to_address()
    }
}

/// A Groth16 proof of the account-binding relation together with its public signals.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountProof {
    /// The Groth16 proof `(a, b, c)`.
    pub proof: Proof<Bn254>,
    /// The public signals the proof commits to.
    pub public_signals: PublicSignals,
}

impl AccountProof {
    /// The calldata for the verifier's `verifyProof` entry point.
    #[must_use]
    pub fn calldata(&self) -> ProofCalldata {
        ProofCalldata::new(&self.proof, &self.public_signals)
    }
}

/// The arguments of the verifier contract's `verifyProof(uint[2] a, uint[2][2] b, uint[2] c, uint[2] pubSignals)`.
///
/// G2 coordinates are emitted with the imaginary part first, which is what the Solidity pairing precompile
/// expects and what `snarkjs zkey export soliditycalldata` produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProofCalldata {
    /// The `A` point of the proof, `[x, y]`.
    pub a: [U256; 2],
    /// The `B` point of the proof, `[[x.c1, x.c0], [y.c1, y.c0]]`.
    pub b: [[U256; 2]; 2],
    /// The `C` point of the proof, `[x, y]`.
    pub c: [U256; 2],
    /// The public signals, `[address, accountHash]`.
    pub public_signals: [U256; PUBLIC_SIGNAL_COUNT],
}

impl ProofCalldata {
    /// Flattens a Groth16 proof and its public signals into verifier calldata.
    #[must_use]
    pub fn new(proof: &Proof<Bn254>, public_signals: &PublicSignals) -> Self {
        Self {
            a: g1_to_u256(&proof.a),
            b: g2_to_u256(&proof.b),
            c: g1_to_u256(&proof.c),
            public_signals: [public_signals.address.into(), public_signals.account_hash.into()],
        }
    }

    /// Parses the public signals back into field elements.
    ///
    /// # Errors
    /// Returns [`PrimitiveError::NotInField`] if a signal is not a canonical field element.
    pub fn public_signals(&self) -> Result<PublicSignals, PrimitiveError> {
        Ok(PublicSignals {
            address: self.public_signals[0].try_into()?,
            account_hash: self.public_signals[1].try_into()?,
        })
    }

    /// Rebuilds the Groth16 proof from the calldata coordinates.
    ///
    /// `(0, 0)` is read as the point at infinity, like the pairing precompile does.
    ///
    /// # Errors
    /// Returns [`PrimitiveError::InvalidInput`] if a coordinate is not in the base field or a point is not on the curve.
    pub fn to_groth16_proof(&self) -> Result<Proof<Bn254>, PrimitiveError> {
        Ok(Proof {
            a: g1_from_u256("a", self.a)?,
            b: g2_from_u256(self.b)?,
            c: g1_from_u256("c", self.c)?,
        })
    }

    /// Converts the calldata to its 320-byte big-endian form: `a || b || c || public_signals`.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.words().flat_map(|word| word.to_be_bytes::<32>()).collect()
    }

    /// Constructs calldata from its 320-byte big-endian form.
    ///
    /// # Errors
    /// Returns [`PrimitiveError::Deserialization`] if the input is not exactly 320 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PrimitiveError> {
        if bytes.len() != CALLDATA_BYTES {
            return Err(PrimitiveError::Deserialization(format!(
                "Invalid length: expected {CALLDATA_BYTES} bytes, got {}",
                bytes.len()
            )));
        }

        let mut words = bytes.chunks_exact(32).map(U256::from_be_slice);
        let mut next = || words.next().unwrap_or_default();

        Ok(Self {
            a: [next(), next()],
            b: [[next(), next()], [next(), next()]],
            c: [next(), next()],
            public_signals: [next(), next()],
        })
    }

    fn words(&self) -> impl Iterator<Item = U256> + '_ {
        self.a
            .iter()
            .chain(self.b.iter().flatten())
            .chain(self.c.iter())
            .chain(self.public_signals.iter())
            .copied()
    }
}

fn fq_to_u256(f: Fq) -> U256 {
    U256::from_limbs(f.into_bigint().0)
}

fn fq_from_u256(attribute: &str, value: U256) -> Result<Fq, PrimitiveError> {
    Fq::from_bigint(BigInt(value.into_limbs())).ok_or_else(|| PrimitiveError::InvalidInput {
        attribute: attribute.to_string(),
        reason: "coordinate is not in the base field".to_string(),
    })
}

fn g1_to_u256(p: &G1Affine) -> [U256; 2] {
    if p.infinity {
        return [U256::ZERO; 2];
    }
    [fq_to_u256(p.x), fq_to_u256(p.y)]
}

fn g2_to_u256(p: &G2Affine) -> [[U256; 2]; 2] {
    if p.infinity {
        return [[U256::ZERO; 2]; 2];
    }
    [
        [fq_to_u256(p.x.c1), fq_to_u256(p.x.c0)],
        [fq_to_u256(p.y.c1), fq_to_u256(p.y.c0)],
    ]
}

fn g1_from_u256(attribute: &str, [x, y]: [U256; 2]) -> Result<G1Affine, PrimitiveError> {
    if x.is_zero() && y.is_zero() {
        return Ok(G1Affine::zero());
    }
    let point = G1Affine::new_unchecked(fq_from_u256(attribute, x)?, fq_from_u256(attribute, y)?);
    if !point.is_on_curve() {
        return Err(PrimitiveError::InvalidInput {
            attribute: attribute.to_string(),
            reason: "point is not on the curve".to_string(),
        });
    }
    Ok(point)
}

fn g2_from_u256([[x1, x0], [y1, y0]]: [[U256; 2]; 2]) -> Result<G2Affine, PrimitiveError> {
    if [x1, x0, y1, y0].iter().all(U256::is_zero) {
        return Ok(G2Affine::zero());
    }
    let x = Fq2::new(fq_from_u256("b", x0)?, fq_from_u256("b", x1)?);
    let y = Fq2::new(fq_from_u256("b", y0)?, fq_from_u256("b", y1)?);
    let point = G2Affine::new_unchecked(x, y);
    if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve() {
        return Err(PrimitiveError::InvalidInput {
            attribute: "b".to_string(),
            reason: "point is not in the G2 subgroup".to_string(),
        });
    }
    Ok(point)
}

impl Serialize for ProofCalldata {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let bytes = self.to_bytes();
        if serializer.is_human_readable() {
            serializer.serialize_str(&hex::encode(bytes))
        } else {
            serializer.serialize_bytes(&bytes)
        }
    }
}

impl<'de> Deserialize<'de> for ProofCalldata {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = if deserializer.is_human_readable() {
            let hex_str = String::deserialize(deserializer)?;
            hex::decode(hex_str.trim_start_matches("0x")).map_err(D::Error::custom)?
        } else {
            Vec::deserialize(deserializer)?
        };

        Self::from_bytes(&bytes).map_err(D::Error::custom)
    }
}
