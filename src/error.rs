//! Rejection reasons for every layer of the node.
//!
//! Consensus code never panics on bad input: blocks, transactions, chains and
//! peer messages are rejected with one of these values and the `Display`
//! string is what gets logged or returned to an API caller.

use thiserror::Error;

/// Why a single transaction (or a block's transaction batch) was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxError {
    #[error("invalid transaction shape: {0}")]
    Shape(String),

    #[error("invalid transaction id: {0}")]
    InvalidId(String),

    #[error("referenced output {id}:{index} is not unspent")]
    MissingOutput { id: String, index: u32 },

    #[error("invalid signature on input {input} of tx {tx}")]
    BadSignature { tx: String, input: usize },

    #[error("amount mismatch: inputs {inputs}, outputs {outputs}")]
    AmountMismatch { inputs: u128, outputs: u128 },

    #[error("invalid grant transaction: {0}")]
    Grant(&'static str),

    #[error("duplicate input {id}:{index}")]
    DuplicateInput { id: String, index: u32 },

    #[error("input {id}:{index} is already spent by a pooled transaction")]
    PoolConflict { id: String, index: u32 },

    #[error("transaction {0} is already pooled")]
    AlreadyPooled(String),
}

/// Why a block (or a chain of blocks) failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockError {
    #[error("invalid index: expected {expected}, got {got}")]
    Index { expected: u64, got: u64 },

    #[error("invalid previous hash at index {0}")]
    PreviousHash(u64),

    #[error("invalid timestamp {timestamp} at index {index}")]
    Timestamp { index: u64, timestamp: i64 },

    #[error("hash does not match content at index {index}: {hash}")]
    HashMismatch { index: u64, hash: String },

    #[error("hash {hash} does not satisfy difficulty {difficulty}")]
    Difficulty { hash: String, difficulty: u32 },

    #[error("block 0 is not the genesis block")]
    Genesis,

    #[error("chain is empty")]
    EmptyChain,

    #[error("invalid transactions at index {index}: {source}")]
    Transactions {
        index: u64,
        #[source]
        source: TxError,
    },
}

/// Why a competing chain was not adopted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error(transparent)]
    Invalid(#[from] BlockError),

    #[error("candidate work {candidate} is below current work {current}")]
    InsufficientWork { candidate: u128, current: u128 },
}

/// Undecodable or unknown peer messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown message type {0}")]
    UnknownType(u8),

    #[error("message type {0} requires a data payload")]
    MissingData(u8),
}

/// Wallet-side failures. `KeyMismatch` is a caller error, not a network one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("invalid private key")]
    InvalidKey,

    #[error("private key does not own output {id}:{index}")]
    KeyMismatch { id: String, index: u32 },

    #[error("referenced output {id}:{index} not found")]
    MissingOutput { id: String, index: u32 },

    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("invalid receiver address: {0}")]
    InvalidAddress(String),

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("transaction has no input {0}")]
    NoSuchInput(usize),
}

/// Operation-level failures surfaced to the (HTTP) boundary.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Transaction(#[from] TxError),

    #[error(transparent)]
    Block(#[from] BlockError),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error("mining cancelled: chain advanced past index {0}")]
    MiningCancelled(u64),
}
