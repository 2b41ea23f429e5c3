//! Baud negotiation example
//!
//! Probes the receiver on the given port across the default candidate
//! rates, then moves it to the target operating rate.
//!
//! Usage:
//!   cargo run --example probe_baud -- /dev/ttyACM0 [target_baud]

use navbridge_core::core::negotiate;
use navbridge_core::{NegotiatorConfig, SerialConfig, SerialLink};

fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    let (port, target) = match args.len() {
        3 => (args[1].clone(), args[2].parse().unwrap_or(230_400)),
        2 => (args[1].clone(), 230_400),
        _ => {
            // List available ports
            println!("Usage: probe_baud <port> [target_baud]");
            println!("\nAvailable ports:");
            for port in serialport::available_ports()? {
                println!("  {}", port.port_name);
            }
            return Ok(());
        }
    };

    let mut config = NegotiatorConfig::default();
    config.target = target;
    if !config.candidates.contains(&target) {
        config.candidates.push(target);
    }

    println!("Probing {} for a receiver...", port);

    let mut line = SerialLink::open(&SerialConfig::new(&port, config.candidates[0]))?;
    let outcome = negotiate::negotiate(&mut line, &config)?;

    println!(
        "Receiver answered after {} probe(s); link now at {} baud.",
        outcome.attempts, outcome.baud
    );
    Ok(())
}
