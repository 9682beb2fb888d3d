//! Two service instances sharing one circuit.
//!
//! This example shows how to:
//! - Share a storage backend between two breaker factories
//! - Trip the circuit from one instance and observe it from the other
//! - Recover through the half-open state
//!
//! Run with: cargo run --example shared_breaker

use sharedbreaker::prelude::*;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
#[error("upstream returned 503")]
struct Unavailable;

fn instance(backend: &InMemoryBackend, id: &'static str) -> Result<CircuitBreakerFactory, SettingsError> {
    CircuitBreakerFactory::from_options([
        with_storage_backend(backend.clone()),
        with_failure_count_threshold(2),
        with_close_threshold(2),
        with_allow_after(Duration::from_millis(200)),
        with_logger(TracingLogger::new()),
        with_state_change_callback(move |name, _ctx, from, to| {
            println!("[{id}] {name}: {from} -> {to}");
        }),
    ])
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("=== Sharedbreaker Shared Circuit Example ===\n");

    // In production this would be a RedisBackend reachable by every instance
    let backend = InMemoryBackend::new();
    let east = instance(&backend, "east")?;
    let west = instance(&backend, "west")?;

    let mut east_breaker = east.breaker_for("inventory", CircuitContext::new());
    let mut west_breaker = west.breaker_for("inventory", CircuitContext::new());

    // East sees the upstream failing until the circuit opens
    for attempt in 1..=3 {
        let execution: Execution<(), Unavailable> =
            east_breaker.execute(|| async { Err(Unavailable) }).await;
        println!(
            "east attempt {attempt}: work ran = {}, circuit = {:?}",
            execution.was_admitted(),
            execution.circuit
        );
    }

    // West never saw a failure, but the circuit is shared
    println!("\nwest sees the circuit as {}", west_breaker.state().await?);
    let execution: Execution<&str, Unavailable> =
        west_breaker.execute(|| async { Ok("in stock") }).await;
    if let Some(err) = execution.circuit_error() {
        println!("west was rejected: {err}");
    }

    // After the open period, probes from either instance close the circuit
    tokio::time::sleep(Duration::from_millis(250)).await;
    println!("\nafter waiting the circuit is {}", west_breaker.state().await?);

    for breaker in [&mut west_breaker, &mut east_breaker] {
        let execution: Execution<&str, Unavailable> =
            breaker.execute(|| async { Ok("in stock") }).await;
        println!(
            "{} probe: {:?}",
            breaker.name(),
            execution.work.and_then(Result::ok)
        );
    }

    let info = west_breaker.information().await?;
    println!(
        "\nfinal state: {} (generation {}, {} requests counted)",
        info.state, info.generation, info.total
    );

    Ok(())
}
