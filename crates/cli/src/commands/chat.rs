//! `parley chat`: single message or interactive REPL on one thread.

use anyhow::Context;
use parley_config::AppConfig;
use parley_core::message::ThreadId;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(config: &AppConfig, thread: Option<String>, message: Option<String>) -> anyhow::Result<()> {
    let service = super::build_service(config).await?;
    let thread_id = thread.map(ThreadId::from).unwrap_or_else(ThreadId::generate);

    if let Some(msg) = message {
        let answer = service
            .send(&thread_id, &msg)
            .await
            .with_context(|| format!("Turn failed on thread {thread_id}"))?;
        println!("{answer}");
        return Ok(());
    }

    println!();
    println!("  Parley: interactive chat");
    println!();
    println!("  Thread:  {thread_id}");
    println!("  Model:   {}", config.model.model);
    println!("  Tools:   {}", service.tool_definitions().iter().map(|t| t.name.as_str()).collect::<Vec<_>>().join(", "));
    println!();
    println!("  Type your message and press Enter.");
    println!("  /threads lists saved threads, /exit quits.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        match input {
            "" => continue,
            "/exit" | "/quit" => break,
            "/threads" => {
                for id in service.list_threads().await? {
                    let marker = if id == thread_id { "*" } else { " " };
                    println!("  {marker} {id}");
                }
                continue;
            }
            _ => {}
        }

        match service.send(&thread_id, input).await {
            Ok(answer) => {
                println!();
                for line in answer.lines() {
                    println!("  Assistant > {line}");
                }
                println!();
            }
            // A failed turn leaves the thread at its last checkpoint.
            Err(e) => {
                eprintln!("  [Error] {e}");
                println!();
            }
        }
    }

    println!();
    println!("  Resume this conversation with: parley chat --thread {thread_id}");
    Ok(())
}
