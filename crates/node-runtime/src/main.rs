//! Devnet node binary.
//!
//! Runs a single-member committee that authors, self-certifies and stores a
//! short run of blocks, then shuts down cleanly. Multi-node deployments
//! supply a real `NodeConfig` with peers instead.

use anyhow::Result;
use node_runtime::{Node, NodeConfig};
use shared_types::U256;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let block_count: u64 = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(10);

    let mut node = Node::new(NodeConfig::default())?;
    node.start();

    for block_id in 1..=block_count {
        if node.lifecycle().exit_requested() {
            break;
        }
        for n in 0..3 {
            node.submit_transaction(format!("devnet-tx:{block_id}:{n}").into_bytes());
        }
        node.begin_block(block_id, U256::zero());
        std::thread::sleep(Duration::from_millis(500));
        node.context().set_last_committed_block(block_id);
    }

    let metrics = node.context().metrics();
    info!(
        proposals = metrics.get_proposals_stored(),
        proofs = metrics.get_proofs_emitted(),
        "devnet run finished"
    );

    node.shutdown();
    Ok(())
}
