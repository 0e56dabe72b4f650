//! `parley history <thread>`: print a thread's latest checkpoint.

use anyhow::Context;
use parley_config::AppConfig;
use parley_core::message::{Message, Role, ThreadId};

pub async fn run(config: &AppConfig, thread: String) -> anyhow::Result<()> {
    let store = parley_store::build_from_config(&config.store)
        .await
        .context("Failed to open checkpoint store")?;
    let thread_id = ThreadId::from(thread);

    let Some(checkpoint) = store.latest(&thread_id).await? else {
        println!("Thread {thread_id} has no saved messages.");
        return Ok(());
    };

    println!("Thread {thread_id} (checkpoint {})", checkpoint.seq);
    println!();
    for message in &checkpoint.messages {
        println!("{}", render(message));
    }
    Ok(())
}

fn render(message: &Message) -> String {
    match message.role {
        Role::User => format!("You > {}", message.content),
        Role::Assistant if message.requests_tools() => message
            .tool_calls
            .iter()
            .map(|c| format!("  -> {}({})", c.name, c.arguments))
            .collect::<Vec<_>>()
            .join("\n"),
        Role::Assistant => format!("Assistant > {}", message.content),
        Role::Tool => format!("  <- {}", message.content),
        Role::System => format!("[system] {}", message.content),
    }
}
