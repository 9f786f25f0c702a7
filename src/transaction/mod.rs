pub mod model;
pub mod pool;
pub mod utxo;
pub mod validation;

pub use model::{COINBASE_AMOUNT, Transaction, TxInput, TxOutput, validate_address};
pub use pool::TxPool;
pub use utxo::{OutPoint, UnspentOutput, UtxoSet};
pub use validation::{
    TransactionValidator, UtxoValidator, process_block_transactions, validate_block_transactions,
    validate_grant_transaction, validate_transaction,
};
