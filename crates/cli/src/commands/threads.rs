//! `parley threads`: list every checkpointed thread.

use anyhow::Context;
use parley_config::AppConfig;

pub async fn run(config: &AppConfig) -> anyhow::Result<()> {
    let store = parley_store::build_from_config(&config.store)
        .await
        .context("Failed to open checkpoint store")?;

    let ids = store.list_thread_ids().await?;
    if ids.is_empty() {
        println!("No threads yet. Start one with `parley chat`.");
        return Ok(());
    }

    for id in ids {
        let checkpoints = store.list(&id).await?;
        match checkpoints.last() {
            Some(last) => println!(
                "{id}  ({} turns, {} messages, updated {})",
                checkpoints.len(),
                last.message_count,
                last.created_at.format("%Y-%m-%d %H:%M")
            ),
            None => println!("{id}"),
        }
    }
    Ok(())
}
