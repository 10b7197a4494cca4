//! `delve chat`: Run the research agent in the terminal.

use delve_agent::{RunHandle, StreamEvent};
use delve_config::AppConfig;
use delve_core::message::Message;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::build_context;

pub async fn run(
    config: AppConfig,
    message: Option<String>,
    ephemeral: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = build_context(&config, ephemeral).await?;
    let mut history: Vec<Message> = Vec::new();

    if let Some(msg) = message {
        history.push(Message::user(msg));
        run_turn(&ctx, &mut history).await?;
        ctx.dispose().await;
        return Ok(());
    }

    println!();
    println!("  Delve: Interactive Research");
    println!();
    println!("  Model:  {}", config.default_model);
    println!("  Tools:  {}", ctx.research_loop.tool_names().join(", "));
    println!();
    println!("  Type your question and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        history.push(Message::user(line));
        run_turn(&ctx, &mut history).await?;
    }

    ctx.dispose().await;
    println!();
    println!("  Goodbye!");
    Ok(())
}

/// Run one research turn, printing events as they arrive and extending
/// `history` with the appended messages.
async fn run_turn(
    ctx: &delve_gateway::AppContext,
    history: &mut Vec<Message>,
) -> Result<(), Box<dyn std::error::Error>> {
    let RunHandle { mut events, task } = ctx.research_loop.spawn(history.clone());

    println!();
    let mut stdout = std::io::stdout();
    while let Some(event) = events.recv().await {
        if let Some(text) = render(&event) {
            write!(stdout, "{text}")?;
            stdout.flush()?;
        }
    }
    println!();

    let outcome = task.await?;
    history.extend(outcome.new_messages);
    Ok(())
}

/// Terminal rendering of one event. `None` for events with nothing to show.
fn render(event: &StreamEvent) -> Option<String> {
    match event {
        StreamEvent::TextChunk(text) => Some(text.clone()),
        StreamEvent::ToolCallAnnounced(call) => {
            Some(format!("\n  [tool] {}({})\n", call.name, call.arguments))
        }
        StreamEvent::ToolResult(result) => {
            let label = if result.error { "failed" } else { "ok" };
            Some(format!(
                "  [result {label}] {}\n",
                truncate(&result.content, 200)
            ))
        }
        StreamEvent::Error(message) => Some(format!("\n  [Error] {}\n", message.trim())),
        StreamEvent::FinalResponse(_) => None,
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}
