use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::utxo::OutPoint;
use crate::error::TxError;

/// Fixed reward carried by every block's grant transaction.
pub const COINBASE_AMOUNT: u64 = 50;

/// Length of a hex-encoded uncompressed secp256k1 public key.
pub const ADDRESS_HEX_LEN: usize = 130;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// Id of the transaction whose output is being spent.
    #[serde(rename = "txOutId")]
    pub referenced_output_id: String,
    #[serde(rename = "txOutIndex")]
    pub referenced_output_index: u32,
    /// Hex-encoded DER ECDSA signature over the spending transaction's id.
    pub signature: String,
}

impl TxInput {
    pub fn unsigned(referenced_output_id: impl Into<String>, referenced_output_index: u32) -> Self {
        Self {
            referenced_output_id: referenced_output_id.into(),
            referenced_output_index,
            signature: String::new(),
        }
    }

    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.referenced_output_id.clone(), self.referenced_output_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub address: String,
    pub amount: u64,
}

impl TxOutput {
    pub fn new(address: impl Into<String>, amount: u64) -> Self {
        Self {
            address: address.into(),
            amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Content hash of the inputs' references and the outputs.
    pub id: String,
    #[serde(rename = "txIns")]
    pub inputs: Vec<TxInput>,
    #[serde(rename = "txOuts")]
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    /// Build a transaction and compute its id from its content.
    /// Signatures are not part of the id, so inputs can be signed afterwards.
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        let mut tx = Self {
            id: String::new(),
            inputs,
            outputs,
        };
        tx.id = tx.compute_id();
        tx
    }

    /// The reward transaction that must open the block at `block_index`.
    pub fn grant(address: &str, block_index: u64) -> Self {
        // Indices past u32::MAX cannot be represented and never validate.
        let input = TxInput::unsigned("", block_index as u32);
        Self::new(vec![input], vec![TxOutput::new(address, COINBASE_AMOUNT)])
    }

    pub fn compute_id(&self) -> String {
        let mut preimage = String::new();
        for input in &self.inputs {
            preimage.push_str(&input.referenced_output_id);
            preimage.push_str(&input.referenced_output_index.to_string());
        }
        for output in &self.outputs {
            preimage.push_str(&output.address);
            preimage.push_str(&output.amount.to_string());
        }
        hex::encode(Sha256::digest(preimage.as_bytes()))
    }

    pub fn has_valid_id(&self) -> bool {
        self.compute_id() == self.id
    }

    pub fn total_output_amount(&self) -> u128 {
        self.outputs.iter().map(|o| o.amount as u128).sum()
    }

    pub fn outpoints(&self) -> impl Iterator<Item = OutPoint> + '_ {
        self.inputs.iter().map(TxInput::outpoint)
    }

    /// Canonical text committed to by the block hash. Unlike the id it
    /// includes signatures, so a block cannot be re-signed after mining.
    pub fn canonical(&self) -> String {
        let mut out = self.id.clone();
        for input in &self.inputs {
            out.push_str(&input.referenced_output_id);
            out.push_str(&input.referenced_output_index.to_string());
            out.push_str(&input.signature);
        }
        for output in &self.outputs {
            out.push_str(&output.address);
            out.push_str(&output.amount.to_string());
        }
        out
    }

    /// Domain checks that typed decoding cannot express.
    pub fn validate_shape(&self) -> Result<(), TxError> {
        for output in &self.outputs {
            validate_address(&output.address)?;
            if output.amount == 0 {
                return Err(TxError::Shape(format!(
                    "zero amount output in tx {}",
                    self.id
                )));
            }
        }
        Ok(())
    }
}

/// An address is an uncompressed public key: `04` followed by X and Y, hex encoded.
pub fn validate_address(address: &str) -> Result<(), TxError> {
    if address.len() != ADDRESS_HEX_LEN {
        return Err(TxError::Shape("invalid public key length".into()));
    }
    if !address.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(TxError::Shape(
            "public key must contain only hex characters".into(),
        ));
    }
    if !address.starts_with("04") {
        return Err(TxError::Shape("public key must start with 04".into()));
    }
    Ok(())
}
