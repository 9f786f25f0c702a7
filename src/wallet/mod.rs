use rand::rngs::OsRng;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey, ecdsa::Signature};
use std::collections::HashSet;

use crate::error::WalletError;
use crate::transaction::{
    OutPoint, Transaction, TxInput, TxOutput, TxPool, UnspentOutput, UtxoSet, validate_address,
};

/// Generate a new secp256k1 private key, hex encoded.
pub fn generate_private_key() -> String {
    let secp = Secp256k1::new();
    let (sk, _pk) = secp.generate_keypair(&mut OsRng);
    hex::encode(sk.secret_bytes())
}

fn parse_secret(sk_hex: &str) -> Result<SecretKey, WalletError> {
    let bytes = hex::decode(sk_hex).map_err(|_| WalletError::InvalidKey)?;
    SecretKey::from_slice(&bytes).map_err(|_| WalletError::InvalidKey)
}

/// Address for a private key: hex of the uncompressed public key (`04` prefix).
pub fn public_key_hex(sk_hex: &str) -> Result<String, WalletError> {
    let secp = Secp256k1::signing_only();
    let sk = parse_secret(sk_hex)?;
    let pk = PublicKey::from_secret_key(&secp, &sk);
    Ok(hex::encode(pk.serialize_uncompressed()))
}

/// The signed message is the 32 bytes the hex transaction id encodes.
fn id_message(tx_id: &str) -> Result<Message, &'static str> {
    let bytes = hex::decode(tx_id).map_err(|_| "invalid transaction id hex")?;
    Message::from_digest_slice(&bytes).map_err(|_| "invalid message length")
}

/// Verify a hex DER signature over `tx_id` against the address (public key hex).
pub fn verify_signature_hex(
    address_hex: &str,
    sig_hex: &str,
    tx_id: &str,
) -> Result<bool, &'static str> {
    let secp = Secp256k1::verification_only();

    let sig_bytes = hex::decode(sig_hex).map_err(|_| "invalid signature hex")?;
    let mut sig = Signature::from_der(&sig_bytes).map_err(|_| "invalid DER signature")?;
    // Peers may produce high-S signatures; libsecp256k1 only accepts low-S.
    sig.normalize_s();

    let pk_bytes = hex::decode(address_hex).map_err(|_| "invalid pubkey hex")?;
    let pk = PublicKey::from_slice(&pk_bytes).map_err(|_| "invalid pubkey bytes")?;

    let msg = id_message(tx_id)?;
    Ok(secp.verify_ecdsa(&msg, &sig, &pk).is_ok())
}

/// Sign input `input_index` of `tx`. The key must own the referenced output.
pub fn sign_input(
    tx: &Transaction,
    input_index: usize,
    sk_hex: &str,
    utxo: &UtxoSet,
) -> Result<String, WalletError> {
    let input = tx
        .inputs
        .get(input_index)
        .ok_or(WalletError::NoSuchInput(input_index))?;
    let referenced = utxo
        .get(&input.outpoint())
        .ok_or_else(|| WalletError::MissingOutput {
            id: input.referenced_output_id.clone(),
            index: input.referenced_output_index,
        })?;
    if public_key_hex(sk_hex)? != referenced.address {
        return Err(WalletError::KeyMismatch {
            id: input.referenced_output_id.clone(),
            index: input.referenced_output_index,
        });
    }

    let secp = Secp256k1::signing_only();
    let sk = parse_secret(sk_hex)?;
    let msg = id_message(&tx.id).map_err(|_| WalletError::InvalidKey)?;
    let sig = secp.sign_ecdsa(&msg, &sk);
    Ok(hex::encode(sig.serialize_der()))
}

/// Pick unspent records in order until `amount` is covered.
/// Returns the picked records and the leftover to send back as change.
fn select_outputs(
    amount: u64,
    candidates: Vec<UnspentOutput>,
) -> Result<(Vec<UnspentOutput>, u64), WalletError> {
    let mut sum: u64 = 0;
    let mut included = Vec::new();
    for u in candidates {
        sum = sum.saturating_add(u.amount);
        included.push(u);
        if sum >= amount {
            return Ok((included, sum - amount));
        }
    }
    Err(WalletError::InsufficientFunds {
        required: amount,
        available: sum,
    })
}

/// Build and sign a transaction paying `amount` to `receiver` from the
/// outputs owned by `sk_hex`. Outputs already spent by pooled transactions
/// are skipped so the result never conflicts with the pool.
pub fn create_transaction(
    receiver: &str,
    amount: u64,
    sk_hex: &str,
    utxo: &UtxoSet,
    pool: &TxPool,
) -> Result<Transaction, WalletError> {
    if amount == 0 {
        return Err(WalletError::ZeroAmount);
    }
    validate_address(receiver).map_err(|_| WalletError::InvalidAddress(receiver.to_string()))?;

    let owner = public_key_hex(sk_hex)?;
    let pooled: HashSet<OutPoint> = pool.spent_outpoints();
    let candidates: Vec<UnspentOutput> = utxo
        .unspent(Some(&owner))
        .into_iter()
        .filter(|u| !pooled.contains(&OutPoint::new(u.output_id.clone(), u.output_index)))
        .collect();
    let (included, leftover) = select_outputs(amount, candidates)?;

    let inputs = included
        .iter()
        .map(|u| TxInput::unsigned(u.output_id.clone(), u.output_index))
        .collect();
    let mut outputs = vec![TxOutput::new(receiver, amount)];
    if leftover > 0 {
        outputs.push(TxOutput::new(owner, leftover));
    }

    let mut tx = Transaction::new(inputs, outputs);
    for i in 0..tx.inputs.len() {
        tx.inputs[i].signature = sign_input(&tx, i, sk_hex, utxo)?;
    }
    Ok(tx)
}

/// A node's own signing key and the address derived from it.
#[derive(Clone)]
pub struct Wallet {
    private_key: String,
    address: String,
}

impl Wallet {
    pub fn from_private_key(private_key: &str) -> Result<Self, WalletError> {
        let address = public_key_hex(private_key)?;
        Ok(Self {
            private_key: private_key.to_lowercase(),
            address,
        })
    }

    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (sk, pk) = secp.generate_keypair(&mut OsRng);
        Self {
            private_key: hex::encode(sk.secret_bytes()),
            address: hex::encode(pk.serialize_uncompressed()),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn balance(&self, utxo: &UtxoSet) -> u64 {
        utxo.balance(&self.address)
    }

    pub fn unspent(&self, utxo: &UtxoSet) -> Vec<UnspentOutput> {
        utxo.unspent(Some(&self.address))
    }

    pub fn create_transaction(
        &self,
        receiver: &str,
        amount: u64,
        utxo: &UtxoSet,
        pool: &TxPool,
    ) -> Result<Transaction, WalletError> {
        create_transaction(receiver, amount, &self.private_key, utxo, pool)
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
