//! The running node: consensus state behind one lock, an event channel and
//! the registry of in-flight mining jobs.

pub mod state;

pub use state::NodeState;

use chrono::Utc;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

use crate::blockchain::{Block, MiningTask, cumulative_difficulty};
use crate::error::{BlockError, ChainError, NodeError};
use crate::transaction::{Transaction, UnspentOutput};
use crate::wallet::Wallet;

/// Events published to subscribers (the peer relay, presentation layers).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    /// A new tail block was accepted (appended or via chain replacement).
    NewTail(Block),
    /// The pool changed; carries its current content.
    TxPoolChanged(Vec<Transaction>),
}

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Nonces tried between cancellation checks when mining synchronously.
const BLOCKING_BATCH: u64 = 1_000;

/// A mining attempt the node can abandon once the chain moves past it.
struct MiningJob {
    task: MiningTask,
    cancelled: Arc<AtomicBool>,
}

pub struct Node {
    state: Mutex<NodeState>,
    events: broadcast::Sender<NodeEvent>,
    wallet: Wallet,
    jobs: Mutex<Vec<(u64, Arc<AtomicBool>)>>,
}

impl Node {
    pub fn new(wallet: Wallet) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        info!("node wallet address {}", wallet.address());
        Self {
            state: Mutex::new(NodeState::new()),
            events,
            wallet,
            jobs: Mutex::new(Vec::new()),
        }
    }

    fn state(&self) -> MutexGuard<'_, NodeState> {
        self.state.lock().expect("mutex poisoned")
    }

    fn jobs(&self) -> MutexGuard<'_, Vec<(u64, Arc<AtomicBool>)>> {
        self.jobs.lock().expect("mutex poisoned")
    }

    fn publish(&self, event: NodeEvent) {
        // Nobody listening is fine: there may be no peers yet.
        let _ = self.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.events.subscribe()
    }

    /* ---------- Queries ---------- */

    pub fn get_chain(&self) -> Vec<Block> {
        self.state().ledger().blocks().to_vec()
    }

    pub fn tail(&self) -> Block {
        self.state().tail().clone()
    }

    pub fn get_block_by_hash(&self, hash: &str) -> Option<Block> {
        self.state().ledger().block_by_hash(hash).cloned()
    }

    pub fn get_unspent(&self, address: Option<&str>) -> Vec<UnspentOutput> {
        self.state().utxo().unspent(address)
    }

    pub fn get_tx_pool(&self) -> Vec<Transaction> {
        self.state().pool().transactions().to_vec()
    }

    pub fn get_balance(&self, address: &str) -> u64 {
        self.state().utxo().balance(address)
    }

    pub fn wallet_address(&self) -> &str {
        self.wallet.address()
    }

    pub fn my_unspent(&self) -> Vec<UnspentOutput> {
        self.wallet.unspent(self.state().utxo())
    }

    pub fn my_balance(&self) -> u64 {
        self.wallet.balance(self.state().utxo())
    }

    pub fn cumulative_difficulty(&self) -> u128 {
        cumulative_difficulty(self.state().ledger().blocks())
    }

    pub fn next_difficulty(&self) -> u32 {
        self.state().ledger().next_difficulty()
    }

    /// Copy of the whole consensus state, for reporting.
    pub fn snapshot(&self) -> NodeState {
        self.state().clone()
    }

    /* ---------- Chain updates ---------- */

    /// Append a single block (locally mined or from a peer).
    pub fn append_block(&self, block: Block) -> Result<(), BlockError> {
        let (index, hash) = (block.index, block.hash.clone());
        let tail = {
            let mut state = self.state();
            state.append_block(block).inspect_err(|e| {
                warn!("block {index} ({hash}) rejected: {e}");
            })?;
            state.tail().clone()
        };
        info!("block {index} appended: {hash}");
        self.on_new_tail(tail);
        Ok(())
    }

    /// Replace the local chain with a heavier valid one.
    pub fn replace_chain(&self, candidate: Vec<Block>) -> Result<(), ChainError> {
        let len = candidate.len();
        let tail = {
            let mut state = self.state();
            state.replace_chain(candidate).inspect_err(|e| {
                warn!("received chain of {len} blocks rejected: {e}");
            })?;
            state.tail().clone()
        };
        info!("chain replaced: {len} blocks, tail {}", tail.hash);
        self.on_new_tail(tail);
        Ok(())
    }

    fn on_new_tail(&self, tail: Block) {
        self.cancel_jobs_up_to(tail.index);
        self.publish(NodeEvent::NewTail(tail));
    }

    /* ---------- Transactions ---------- */

    /// Admit a pre-signed transaction into the pool.
    pub fn submit_transaction(&self, tx: Transaction) -> Result<Transaction, NodeError> {
        let pool = {
            let mut state = self.state();
            state.add_to_pool(tx.clone()).inspect_err(|e| {
                warn!("tx {} rejected: {e}", tx.id);
            })?;
            state.pool().transactions().to_vec()
        };
        info!("tx {} added to pool", tx.id);
        self.publish(NodeEvent::TxPoolChanged(pool));
        Ok(tx)
    }

    /// Admit transactions received from a peer. Failures are logged and
    /// skipped. Returns how many were admitted.
    pub fn receive_transactions(&self, txs: Vec<Transaction>) -> usize {
        let (admitted, pool) = {
            let mut state = self.state();
            let mut admitted = 0;
            for tx in txs {
                let id = tx.id.clone();
                match state.add_to_pool(tx) {
                    Ok(()) => admitted += 1,
                    Err(e) => debug!("peer tx {id} not pooled: {e}"),
                }
            }
            (admitted, state.pool().transactions().to_vec())
        };
        if admitted > 0 {
            info!("{admitted} peer txs added to pool");
            self.publish(NodeEvent::TxPoolChanged(pool));
        }
        admitted
    }

    /// Build a transaction from the node wallet and pool it.
    pub fn send_transaction(&self, receiver: &str, amount: u64) -> Result<Transaction, NodeError> {
        let tx = {
            let state = self.state();
            self.wallet
                .create_transaction(receiver, amount, state.utxo(), state.pool())?
        };
        self.submit_transaction(tx)
    }

    /* ---------- Mining ---------- */

    /// Snapshot the tip and register a job for the next block. `build` gets
    /// the state and the next index and returns the block's transactions.
    /// The job is registered before the state lock is released, so a tail
    /// accepted right after this call still cancels it.
    fn prepare<F>(&self, build: F) -> Result<MiningJob, NodeError>
    where
        F: FnOnce(&NodeState, u64) -> Result<Vec<Transaction>, NodeError>,
    {
        let state = self.state();
        let tail = state.tail();
        let index = tail.index + 1;
        let transactions = build(&*state, index)?;
        let task = MiningTask::new(
            index,
            tail.hash.clone(),
            Utc::now().timestamp(),
            transactions,
            state.ledger().next_difficulty(),
        );
        Ok(self.start_job(task))
    }

    /// Mine the given transactions and append the block. The caller
    /// supplies the grant. The lock is not held while searching.
    pub async fn append_mined_block(
        &self,
        transactions: Vec<Transaction>,
        batch: u64,
    ) -> Result<Block, NodeError> {
        let job = self.prepare(|_, _| Ok(transactions))?;
        self.run_job(job, batch).await
    }

    fn next_block_transactions(&self, state: &NodeState, index: u64) -> Vec<Transaction> {
        let mut txs = vec![Transaction::grant(self.wallet.address(), index)];
        txs.extend(state.pool().transactions().iter().cloned());
        txs
    }

    /// Mine a block granting the reward to the node wallet and confirming
    /// the whole pool. Blocks the calling thread until the block is found
    /// or the chain reaches its index.
    pub fn mine_next_block(&self) -> Result<Block, NodeError> {
        let mut job = self.prepare(|state, index| Ok(self.next_block_transactions(state, index)))?;
        loop {
            if let Some(result) = self.poll_job(&mut job, BLOCKING_BATCH) {
                return result;
            }
        }
    }

    /// Cooperative variant of [`Node::mine_next_block`]: tries `batch`
    /// nonces, then yields to the runtime. Fails with
    /// [`NodeError::MiningCancelled`] if the chain reaches the block's index
    /// first.
    pub async fn mine_next_block_async(&self, batch: u64) -> Result<Block, NodeError> {
        let job = self.prepare(|state, index| Ok(self.next_block_transactions(state, index)))?;
        self.run_job(job, batch).await
    }

    /// Mine a block holding the grant and one new wallet transaction.
    pub async fn mine_transaction(
        &self,
        receiver: &str,
        amount: u64,
        batch: u64,
    ) -> Result<Block, NodeError> {
        let job = self.prepare(|state, index| {
            let tx = self
                .wallet
                .create_transaction(receiver, amount, state.utxo(), state.pool())?;
            Ok(vec![Transaction::grant(self.wallet.address(), index), tx])
        })?;
        self.run_job(job, batch).await
    }

    fn start_job(&self, task: MiningTask) -> MiningJob {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.jobs().push((task.index(), cancelled.clone()));
        debug!(
            "mining job for block {} started (difficulty {})",
            task.index(),
            task.difficulty()
        );
        MiningJob { task, cancelled }
    }

    async fn run_job(&self, mut job: MiningJob, batch: u64) -> Result<Block, NodeError> {
        let batch = batch.max(1);
        loop {
            if let Some(result) = self.poll_job(&mut job, batch) {
                return result;
            }
            tokio::task::yield_now().await;
        }
    }

    /// Try one batch of nonces. `None` while the search goes on.
    fn poll_job(&self, job: &mut MiningJob, batch: u64) -> Option<Result<Block, NodeError>> {
        let index = job.task.index();
        if job.cancelled.load(Ordering::SeqCst) {
            info!(
                "mining job for block {index} cancelled after {} attempts",
                job.task.attempts()
            );
            return Some(Err(NodeError::MiningCancelled(index)));
        }
        let found = job.task.run_steps(batch)?;
        self.finish_job(&job.cancelled);
        Some(
            self.append_block(found.clone())
                .map(|()| found)
                .map_err(NodeError::from),
        )
    }

    fn finish_job(&self, flag: &Arc<AtomicBool>) {
        self.jobs().retain(|(_, f)| !Arc::ptr_eq(f, flag));
    }

    /// Abandon every job whose block can no longer extend the chain.
    fn cancel_jobs_up_to(&self, tail_index: u64) {
        self.jobs().retain(|(index, flag)| {
            if *index <= tail_index {
                flag.store(true, Ordering::SeqCst);
                false
            } else {
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::GENESIS_HASH;
    use crate::transaction::COINBASE_AMOUNT;

    fn node() -> Node {
        Node::new(Wallet::generate())
    }

    #[test]
    fn mining_pays_the_node_wallet() {
        let n = node();
        let block = n.mine_next_block().unwrap();
        assert_eq!(block.index, 1);
        assert_eq!(n.get_chain().len(), 2);
        assert_eq!(n.my_balance(), COINBASE_AMOUNT);
        assert_eq!(n.get_balance(n.wallet_address()), COINBASE_AMOUNT);
        assert_eq!(n.get_block_by_hash(&block.hash), Some(block));
    }

    #[test]
    fn mined_block_confirms_the_pool() {
        let n = node();
        let other = Wallet::generate();
        n.mine_next_block().unwrap();
        n.send_transaction(other.address(), 20).unwrap();
        assert_eq!(n.get_tx_pool().len(), 1);

        let block = n.mine_next_block().unwrap();
        assert_eq!(block.transactions.len(), 2);
        assert!(n.get_tx_pool().is_empty());
        assert_eq!(n.get_balance(other.address()), 20);
        assert_eq!(n.my_balance(), 30 + COINBASE_AMOUNT);
    }

    #[tokio::test]
    async fn mine_transaction_skips_the_pool() {
        let n = node();
        let other = Wallet::generate();
        n.mine_next_block().unwrap();
        let block = n.mine_transaction(other.address(), 5, 16).await.unwrap();
        assert_eq!(block.transactions.len(), 2);
        assert_eq!(n.get_balance(other.address()), 5);
    }

    #[tokio::test]
    async fn raw_block_with_bad_grant_is_rejected() {
        let n = node();
        let err = n.append_mined_block(vec![], 16).await.unwrap_err();
        assert!(matches!(err, NodeError::Block(BlockError::Transactions { .. })));
        assert_eq!(n.get_chain().len(), 1);
    }

    #[test]
    fn send_without_funds_fails() {
        let n = node();
        let err = n
            .send_transaction(Wallet::generate().address(), 1)
            .unwrap_err();
        assert!(matches!(err, NodeError::Wallet(_)));
        assert!(n.get_tx_pool().is_empty());
    }

    #[test]
    fn events_are_published() {
        let n = node();
        let mut rx = n.subscribe();
        let block = n.mine_next_block().unwrap();
        assert_eq!(rx.try_recv().unwrap(), NodeEvent::NewTail(block));

        let tx = n.send_transaction(Wallet::generate().address(), 1).unwrap();
        assert_eq!(rx.try_recv().unwrap(), NodeEvent::TxPoolChanged(vec![tx]));
    }

    #[test]
    fn peer_transactions_admit_valid_and_skip_invalid() {
        let n = node();
        let other = Wallet::generate();
        n.mine_next_block().unwrap();
        let tx = n
            .wallet
            .create_transaction(other.address(), 10, n.snapshot().utxo(), &Default::default())
            .unwrap();
        let mut forged = tx.clone();
        forged.outputs[0].amount += 1;

        let mut rx = n.subscribe();
        assert_eq!(n.receive_transactions(vec![forged, tx.clone(), tx.clone()]), 1);
        assert_eq!(rx.try_recv().unwrap(), NodeEvent::TxPoolChanged(vec![tx]));
        assert_eq!(n.receive_transactions(vec![]), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn async_mining_appends() {
        let n = node();
        let block = n.mine_next_block_async(16).await.unwrap();
        assert_eq!(n.tail(), block);
        assert!(n.jobs().is_empty());
    }

    #[tokio::test]
    async fn peer_block_at_same_index_cancels_mining() {
        let n = Arc::new(node());
        let peer = node();

        // A difficulty no nonce will meet, so only cancellation ends it.
        let grant = Transaction::grant(n.wallet_address(), 1);
        let task = MiningTask::new(1, GENESIS_HASH, Utc::now().timestamp(), vec![grant], 255);
        let job = n.start_job(task);
        let handle = tokio::spawn({
            let n = n.clone();
            async move { n.run_job(job, 8).await }
        });

        let competing = peer.mine_next_block().unwrap();
        n.append_block(competing).unwrap();

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(NodeError::MiningCancelled(1))));
        assert!(n.jobs().is_empty());
    }

    #[test]
    fn out_of_range_peer_timestamp_leaves_node_usable() {
        let n = node();
        for ts in [i64::MIN, i64::MAX] {
            let grant = Transaction::grant(n.wallet_address(), 1);
            let block = crate::blockchain::mine(1, GENESIS_HASH, ts, vec![grant], 0);
            assert!(matches!(
                n.append_block(block),
                Err(BlockError::Timestamp { index: 1, .. })
            ));
        }
        assert_eq!(n.get_chain().len(), 1);
        assert_eq!(n.mine_next_block().unwrap().index, 1);
    }

    #[test]
    fn tail_accepted_right_after_prepare_cancels_the_job() {
        let n = node();
        let peer = node();
        let job = n
            .prepare(|state, index| Ok(n.next_block_transactions(state, index)))
            .unwrap();
        assert_eq!(job.task.index(), 1);

        n.append_block(peer.mine_next_block().unwrap()).unwrap();
        assert!(job.cancelled.load(Ordering::SeqCst));
        assert!(n.jobs().is_empty());
    }

    #[tokio::test]
    async fn peer_block_cancels_raw_and_transfer_mining() {
        let wallet = Wallet::generate();
        let (a, b) = (Arc::new(Node::new(wallet.clone())), Arc::new(Node::new(wallet)));

        // Block 1 at a high declared difficulty: the next search inherits it
        // and one nonce per batch is very unlikely to meet it.
        let now = Utc::now().timestamp();
        let grant = Transaction::grant(a.wallet_address(), 1);
        let heavy = crate::blockchain::mine(1, GENESIS_HASH, now, vec![grant], 16);
        a.append_block(heavy.clone()).unwrap();
        b.append_block(heavy.clone()).unwrap();
        assert_eq!(a.next_difficulty(), 16);

        let raw = tokio::spawn({
            let a = a.clone();
            let grant = Transaction::grant(a.wallet_address(), 2);
            async move { a.append_mined_block(vec![grant], 1).await }
        });
        let transfer = tokio::spawn({
            let b = b.clone();
            let receiver = Wallet::generate();
            async move { b.mine_transaction(receiver.address(), 5, 1).await }
        });
        while a.jobs().is_empty() || b.jobs().is_empty() {
            tokio::task::yield_now().await;
        }

        let grant = Transaction::grant(Wallet::generate().address(), 2);
        let competing = crate::blockchain::mine(2, &heavy.hash, now, vec![grant], 0);
        a.append_block(competing.clone()).unwrap();
        b.append_block(competing.clone()).unwrap();

        let raw = raw.await.unwrap();
        let transfer = transfer.await.unwrap();
        assert!(matches!(raw, Err(NodeError::MiningCancelled(2))));
        assert!(matches!(transfer, Err(NodeError::MiningCancelled(2))));
        assert_eq!(a.tail(), competing);
        assert_eq!(b.tail(), competing);
    }

    #[test]
    fn jobs_above_the_tail_survive() {
        let n = node();
        let task = MiningTask::new(5, "x", 0, vec![], 0);
        let job = n.start_job(task);
        n.cancel_jobs_up_to(4);
        assert!(!job.cancelled.load(Ordering::SeqCst));
        n.cancel_jobs_up_to(5);
        assert!(job.cancelled.load(Ordering::SeqCst));
    }

    #[test]
    fn heavier_chain_replaces_and_prunes_pool() {
        let n = node();
        let other = Wallet::generate();
        n.mine_next_block().unwrap();
        n.send_transaction(other.address(), 10).unwrap();

        let peer = node();
        for _ in 0..3 {
            peer.mine_next_block().unwrap();
        }
        n.replace_chain(peer.get_chain()).unwrap();
        assert_eq!(n.get_chain(), peer.get_chain());
        assert!(n.get_tx_pool().is_empty());
        assert_eq!(n.my_balance(), 0);
        assert!(n.cumulative_difficulty() >= 4);
    }
}
