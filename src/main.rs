use std::env;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use dotenvy::dotenv;
use log::info;
use rand::Rng;

use blockbuilder::blockchain::{Blockchain, DEFAULT_DIFFICULTY};
use blockbuilder::miner::Miner;
use blockbuilder::transaction::{SYSTEM_ADDRESS, Transaction};

/// Demo session: two wallets get seeded from the system, a block is mined,
/// a transfer is checked against the sender's balance (caller policy — the
/// ledger itself never rejects), then auto-mining runs for a few ticks.
fn main() {
    let _ = dotenv();
    env_logger::init();

    let difficulty: u32 = env::var("DIFFICULTY")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_DIFFICULTY);
    let interval_ms: u64 = env::var("AUTO_MINE_INTERVAL_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);

    println!("⛓️ Starting in-memory ledger (difficulty {difficulty})");

    let ledger = Arc::new(Mutex::new(Blockchain::new(difficulty)));
    let (alice, bob) = {
        let bc = ledger.lock().expect("ledger mutex poisoned");
        (bc.create_wallet(), bc.create_wallet())
    };
    info!("wallets: alice={} bob={}", alice.address, bob.address);

    // Seed both wallets with minted coins and mine the opening block.
    let mut rng = rand::thread_rng();
    {
        let mut bc = ledger.lock().expect("ledger mutex poisoned");
        for wallet in [&alice, &bob] {
            let amount = rng.gen_range(100..=500);
            bc.create_transaction(Transaction::new(SYSTEM_ADDRESS, &wallet.address, amount));
        }
    }

    let mut miner = Miner::new(Arc::clone(&ledger), &alice.address)
        .with_interval(Duration::from_millis(interval_ms));
    match miner.mine_once(&alice.address) {
        Ok(outcome) => println!(
            "mined block #{} (hash={}, nonce={})",
            outcome.index, outcome.hash, outcome.nonce
        ),
        Err(e) => println!("initial mining failed: {e}"),
    }
    print_balances(&ledger, &[("alice", &alice.address), ("bob", &bob.address)]);

    // Transfer alice -> bob, funds checked here and not by the ledger.
    let amount = 50;
    {
        let mut bc = ledger.lock().expect("ledger mutex poisoned");
        if bc.get_balance_of_address(&alice.address) >= amount as i128 {
            bc.create_transaction(Transaction::new(&alice.address, &bob.address, amount));
        } else {
            println!("insufficient balance: mine a reward first");
        }
    }

    // Let the timer pick up the transfer and the rollover rewards.
    miner.toggle_auto_mining();
    thread::sleep(Duration::from_millis(interval_ms * 2 + interval_ms / 2));
    miner.toggle_auto_mining();

    let bc = ledger.lock().expect("ledger mutex poisoned");
    println!(
        "final chain: {} blocks, valid={}, {} pending",
        bc.len(),
        bc.is_valid_chain(),
        bc.pending_transactions().len()
    );
    drop(bc);
    print_balances(&ledger, &[("alice", &alice.address), ("bob", &bob.address)]);
}

fn print_balances(ledger: &Arc<Mutex<Blockchain>>, wallets: &[(&str, &str)]) {
    let bc = ledger.lock().expect("ledger mutex poisoned");
    for (name, address) in wallets {
        println!("{name}: {} coins", bc.get_balance_of_address(address));
    }
}
