//! Support Session
//!
//! This example walks a support conversation through the guided flow.
//!
//! Key concepts:
//! - Starting a session with `flow::configure()`
//! - Answering questions with `AnswerUser` events
//! - Waiting for invoked lookups to settle
//! - Checkpointing a conversation and resuming it
//!
//! Run with: cargo run --example support_session
//! Set RUST_LOG=chartflow=debug to see every microstep.

use chartflow::checkpoint::Checkpoint;
use chartflow::flow::{self, answer, Answer, FlowContext, LookupConfig};
use chartflow::interpreter::{SessionConfig, SessionHandle, Snapshot};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn print_transcript(snapshot: &Snapshot<FlowContext>) {
    println!("  state: {}", snapshot.state());
    for entry in &snapshot.context.chat {
        let answer = entry.answer.as_deref().unwrap_or("...");
        println!("  bot:  {}", entry.question);
        println!("  user: {answer}");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chartflow=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("=== Ordering a peripheral ===\n");
    let session = flow::configure()?;
    session.send(Answer::new("intro", "new_ticket").with_label("I need something").into_event())?;
    session.send(Answer::new("newTicket", "monitor").with_label("A monitor").into_event())?;
    let ordered = session.wait_until(|s| s.matches("itemOrdered")).await?;
    print_transcript(&ordered);
    println!("  results: {:?}\n", ordered.context.results);
    session.stop()?;
    session.join().await?;

    println!("=== Following up on a ticket ===\n");
    let session = flow::configure()?;
    session.send(answer("intro", "find_ticket"))?;
    session.send(answer("findTicket", "202"))?;
    let asked = session.wait_until(|s| s.matches("pingTicket.question")).await?;
    print_transcript(&asked);

    // Persist mid-conversation and continue in a fresh session.
    let machine = flow::machine(LookupConfig::default())?;
    let saved = Checkpoint::new(session.id(), asked, Default::default()).to_json()?;
    session.stop()?;
    session.join().await?;

    let checkpoint: Checkpoint<FlowContext> = Checkpoint::from_json(&saved)?;
    let resumed = SessionHandle::resume(machine, checkpoint, SessionConfig::default())?;
    resumed.send(Answer::new("pingTicket", "ping_order").with_label("Yes").into_event())?;
    let pinged = resumed.wait_until(|s| s.matches("pingTicket.done")).await?;
    println!("\n  after resume:");
    print_transcript(&pinged);
    resumed.stop()?;
    resumed.join().await?;

    Ok(())
}
