//! # Node Agent Operator
//!
//! Operator binary: initializes the runtime and drives the control loops
//! until shutdown.

use anyhow::Result;
use node_agent_operator::runtime::initialization::initialize;
use node_agent_operator::runtime::watch_loop::run_watch_loop;

#[tokio::main]
async fn main() -> Result<()> {
    let init_result = initialize().await?;

    run_watch_loop(
        init_result.client,
        init_result.context,
        init_result.server_state,
    )
    .await
}
