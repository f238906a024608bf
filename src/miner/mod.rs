use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};
use thiserror::Error;

use crate::blockchain::{Blockchain, ChainError};

/// How often the auto-mining worker wakes up to check the pending pool.
pub const AUTO_MINE_INTERVAL: Duration = Duration::from_millis(3000);

/// Outcome of one successful mining run.
#[derive(Debug, Clone)]
pub struct MineOutcome {
    pub index: u64,
    pub hash: String,
    pub nonce: u64,
    pub difficulty: u32,
}

#[derive(Debug, Error)]
pub enum MinerError {
    /// A mining run is already in flight on this ledger. The caller should
    /// retry later; the scheduler never double-enters mining.
    #[error("a mining run is already in progress")]
    Busy,
    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Drives the ledger's mining, on demand or on a periodic timer.
///
/// Exactly one mining run may be in flight per ledger: concurrent runs would
/// race on the chain tip and corrupt linkage, so entry goes through an atomic
/// busy flag. The flag is owned by an RAII guard and therefore cleared exactly
/// once per run, whatever the outcome.
pub struct Miner {
    ledger: Arc<Mutex<Blockchain>>,
    reward_address: String,
    interval: Duration,
    busy: Arc<AtomicBool>,
    auto: Option<AutoMiner>,
}

struct AutoMiner {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl Miner {
    /// Scheduler over `ledger`. Auto-mined rewards go to `reward_address`.
    pub fn new(ledger: Arc<Mutex<Blockchain>>, reward_address: impl Into<String>) -> Self {
        Self {
            ledger,
            reward_address: reward_address.into(),
            interval: AUTO_MINE_INTERVAL,
            busy: Arc::new(AtomicBool::new(false)),
            auto: None,
        }
    }

    /// Override the auto-mining tick interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Mine the pending pool into one block, rewarding `miner_address`.
    ///
    /// The Proof-of-Work search runs *outside* the ledger lock, so
    /// transaction submission stays non-blocking while a block is sealed;
    /// those transactions land in the next pool.
    pub fn mine_once(&self, miner_address: &str) -> Result<MineOutcome, MinerError> {
        mine_guarded(&self.ledger, &self.busy, miner_address)
    }

    /// Flip auto-mining and return the new state. Enabling spawns a worker
    /// that mines once per tick whenever the pool is non-empty; ticks that
    /// would overlap an in-flight run are skipped, not queued. Disabling
    /// stops the worker before it can schedule another run, but never
    /// interrupts a seal already in progress.
    pub fn toggle_auto_mining(&mut self) -> bool {
        if self.auto.is_some() {
            self.stop_auto_mining();
            false
        } else {
            let (stop_tx, stop_rx) = mpsc::channel();
            let ledger = Arc::clone(&self.ledger);
            let busy = Arc::clone(&self.busy);
            let address = self.reward_address.clone();
            let interval = self.interval;
            let handle =
                thread::spawn(move || auto_mine_loop(ledger, busy, address, interval, stop_rx));
            self.auto = Some(AutoMiner {
                stop: stop_tx,
                handle,
            });
            info!("auto-mining enabled (interval {:?})", self.interval);
            true
        }
    }

    /// Apply a difficulty typed by the operator. Malformed input is ignored
    /// and the previous difficulty kept; a valid value takes effect on the
    /// next mining run only. Returns whether the input was applied.
    pub fn on_difficulty_change(&self, input: &str) -> bool {
        let Ok(difficulty) = input.trim().parse::<u32>() else {
            warn!("ignoring malformed difficulty input {input:?}");
            return false;
        };
        self.ledger
            .lock()
            .expect("ledger mutex poisoned")
            .set_difficulty(difficulty);
        info!("difficulty set to {difficulty} for future blocks");
        true
    }

    pub fn is_auto_mining(&self) -> bool {
        self.auto.is_some()
    }

    pub fn mining_in_progress(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn stop_auto_mining(&mut self) {
        if let Some(auto) = self.auto.take() {
            // Dropping the sender wakes the worker out of its timed wait.
            drop(auto.stop);
            let _ = auto.handle.join();
            info!("auto-mining disabled");
        }
    }
}

impl Drop for Miner {
    fn drop(&mut self) {
        self.stop_auto_mining();
    }
}

/// Single-flight mining: stage under the lock, seal outside it, commit under
/// the lock again. The busy guard is released on every path.
fn mine_guarded(
    ledger: &Mutex<Blockchain>,
    busy: &AtomicBool,
    miner_address: &str,
) -> Result<MineOutcome, MinerError> {
    if busy
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Err(MinerError::Busy);
    }
    let _busy = BusyGuard(busy);

    let (draft, settings, hasher) = {
        let bc = ledger.lock().expect("ledger mutex poisoned");
        (bc.stage_block(), bc.pow_settings(), bc.hasher())
    };
    debug!(
        "mining block #{} with {} txs at difficulty {}",
        draft.index(),
        draft.transactions().len(),
        settings.difficulty
    );

    let block = draft.seal(hasher.as_ref(), settings)?;

    let mut bc = ledger.lock().expect("ledger mutex poisoned");
    let block = bc.commit_block(block, miner_address)?;
    Ok(MineOutcome {
        index: block.index,
        hash: block.hash.clone(),
        nonce: block.nonce,
        difficulty: settings.difficulty,
    })
}

fn auto_mine_loop(
    ledger: Arc<Mutex<Blockchain>>,
    busy: Arc<AtomicBool>,
    reward_address: String,
    interval: Duration,
    stop: Receiver<()>,
) {
    loop {
        let has_pending = {
            let bc = ledger.lock().expect("ledger mutex poisoned");
            !bc.pending_transactions().is_empty()
        };
        if has_pending {
            match mine_guarded(&ledger, &busy, &reward_address) {
                Ok(outcome) => debug!("auto-mined block #{}", outcome.index),
                Err(MinerError::Busy) => debug!("tick skipped, mining already in progress"),
                Err(MinerError::Chain(e)) => warn!("auto-mining run failed: {e}"),
            }
        }
        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => continue,
            // Stop requested or the scheduler went away.
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::Receiver;

    use super::*;
    use crate::crypto::HashProvider;
    use crate::transaction::{SYSTEM_ADDRESS, Transaction};

    /// Test provider whose digests announce themselves and then block until
    /// the test hands out a permit. Every digest consumes one permit and
    /// trivially meets any difficulty, which lets tests freeze a mining run
    /// at a known point (after staging, inside the seal).
    struct GatedHasher {
        entered: Sender<()>,
        permits: Mutex<Receiver<()>>,
    }

    impl HashProvider for GatedHasher {
        fn digest(&self, _input: &str) -> String {
            let _ = self.entered.send(());
            self.permits
                .lock()
                .expect("permit mutex poisoned")
                .recv()
                .expect("test dropped the permit sender");
            "0".repeat(64)
        }
    }

    fn gated_ledger() -> (Sender<()>, Receiver<()>, Arc<Mutex<Blockchain>>) {
        let (permit_tx, permit_rx) = mpsc::channel();
        let (entered_tx, entered_rx) = mpsc::channel();
        permit_tx.send(()).unwrap(); // genesis digest
        let ledger = Arc::new(Mutex::new(Blockchain::with_hasher(
            1,
            Arc::new(GatedHasher {
                entered: entered_tx,
                permits: Mutex::new(permit_rx),
            }),
        )));
        entered_rx.recv().unwrap(); // drain the genesis announcement
        (permit_tx, entered_rx, ledger)
    }

    fn wait_until(mut cond: impl FnMut() -> bool) {
        for _ in 0..2_000 {
            if cond() {
                return;
            }
            thread::sleep(Duration::from_millis(1));
        }
        panic!("condition not reached within 2s");
    }

    #[test]
    fn mine_once_appends_and_rolls_the_pool() {
        let ledger = Arc::new(Mutex::new(Blockchain::new(1)));
        ledger
            .lock()
            .unwrap()
            .create_transaction(Transaction::new(SYSTEM_ADDRESS, "W1", 200));

        let miner = Miner::new(Arc::clone(&ledger), "W1");
        let outcome = miner.mine_once("W1").unwrap();
        assert_eq!(outcome.index, 1);
        assert!(outcome.hash.starts_with('0'));
        assert!(!miner.mining_in_progress());

        let bc = ledger.lock().unwrap();
        assert_eq!(bc.len(), 2);
        assert_eq!(bc.pending_transactions().len(), 1);
        assert!(bc.pending_transactions()[0].is_reward());
    }

    #[test]
    fn concurrent_mining_is_refused() {
        let (permit_tx, entered_rx, ledger) = gated_ledger();
        ledger
            .lock()
            .unwrap()
            .create_transaction(Transaction::new(SYSTEM_ADDRESS, "W1", 5));
        let miner = Miner::new(Arc::clone(&ledger), "W1");

        thread::scope(|s| {
            let first = s.spawn(|| miner.mine_once("W1"));
            entered_rx.recv().unwrap(); // the seal is now frozen in digest()
            assert!(miner.mining_in_progress());

            assert!(matches!(miner.mine_once("W2"), Err(MinerError::Busy)));

            permit_tx.send(()).unwrap(); // release the frozen seal
            let outcome = first.join().unwrap().unwrap();
            assert_eq!(outcome.index, 1);
        });

        assert!(!miner.mining_in_progress());
        assert_eq!(ledger.lock().unwrap().len(), 2);
    }

    #[test]
    fn submissions_during_a_run_land_in_the_next_pool() {
        let (permit_tx, entered_rx, ledger) = gated_ledger();
        ledger
            .lock()
            .unwrap()
            .create_transaction(Transaction::new(SYSTEM_ADDRESS, "W1", 5));
        let miner = Miner::new(Arc::clone(&ledger), "W1");

        let late = Transaction::new("W1", "W2", 3);
        thread::scope(|s| {
            let run = s.spawn(|| miner.mine_once("W1"));
            entered_rx.recv().unwrap(); // snapshot taken, seal in progress

            // The ledger lock is free while the seal runs.
            ledger.lock().unwrap().create_transaction(late.clone());

            permit_tx.send(()).unwrap();
            run.join().unwrap().unwrap();
        });

        let bc = ledger.lock().unwrap();
        assert_eq!(bc.last_block().transactions.len(), 1);
        let pending = bc.pending_transactions();
        assert_eq!(pending.len(), 2);
        assert!(pending[0].is_reward());
        assert_eq!(pending[1], late);
    }

    #[test]
    fn failed_run_clears_the_busy_flag() {
        let ledger = Arc::new(Mutex::new(Blockchain::new(64)));
        ledger.lock().unwrap().set_attempt_cap(10);
        ledger
            .lock()
            .unwrap()
            .create_transaction(Transaction::new(SYSTEM_ADDRESS, "W1", 5));

        let miner = Miner::new(Arc::clone(&ledger), "W1");
        assert!(matches!(
            miner.mine_once("W1"),
            Err(MinerError::Chain(ChainError::PowExhausted { .. }))
        ));
        assert!(!miner.mining_in_progress());

        // The same scheduler can mine again once the difficulty is sane.
        assert!(miner.on_difficulty_change("1"));
        miner.mine_once("W1").unwrap();
        assert_eq!(ledger.lock().unwrap().len(), 2);
    }

    #[test]
    fn auto_mining_drains_the_pool_and_stops_cleanly() {
        let ledger = Arc::new(Mutex::new(Blockchain::new(1)));
        ledger
            .lock()
            .unwrap()
            .create_transaction(Transaction::new(SYSTEM_ADDRESS, "W1", 5));

        let mut miner =
            Miner::new(Arc::clone(&ledger), "W1").with_interval(Duration::from_millis(10));
        assert!(miner.toggle_auto_mining());
        assert!(miner.is_auto_mining());

        // The pool is never empty (every run leaves a reward behind), so the
        // worker keeps producing blocks until switched off.
        wait_until(|| ledger.lock().unwrap().len() >= 3);

        assert!(!miner.toggle_auto_mining());
        assert!(!miner.is_auto_mining());
        assert!(!miner.mining_in_progress());

        // No ticks fire after disabling.
        let len = ledger.lock().unwrap().len();
        thread::sleep(Duration::from_millis(60));
        assert_eq!(ledger.lock().unwrap().len(), len);
    }

    #[test]
    fn malformed_difficulty_input_is_ignored() {
        let ledger = Arc::new(Mutex::new(Blockchain::new(2)));
        let miner = Miner::new(Arc::clone(&ledger), "W1");

        assert!(!miner.on_difficulty_change("three"));
        assert!(!miner.on_difficulty_change(""));
        assert!(!miner.on_difficulty_change("-1"));
        assert_eq!(ledger.lock().unwrap().difficulty(), 2);

        assert!(miner.on_difficulty_change(" 3 "));
        assert_eq!(ledger.lock().unwrap().difficulty(), 3);
    }
}
