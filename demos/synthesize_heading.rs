//! Heading synthesis example
//!
//! Feeds a short canned capture of NAV-RELPOSNED frames through the UBX
//! parser and the heading synthesizer, printing every sentence that would
//! go on the wire.
//!
//! Usage:
//!   cargo run --example synthesize_heading

use navbridge_core::core::ubx;
use navbridge_core::HeadingSynthesizer;

fn relposned(heading_e5: i32, flags: u32) -> Vec<u8> {
    let mut payload = vec![0u8; ubx::RELPOSNED_LEN];
    payload[0] = 1;
    payload[24..28].copy_from_slice(&heading_e5.to_le_bytes());
    payload[60..64].copy_from_slice(&flags.to_le_bytes());
    ubx::frame(
        ubx::msg::NAV_RELPOSNED.0,
        ubx::msg::NAV_RELPOSNED.1,
        &payload,
    )
    .to_vec()
}

fn main() -> anyhow::Result<()> {
    // Two fixed solutions, one float, one with the heading not yet valid.
    let capture = [
        relposned(0, 0x0103),
        relposned(9_000_000, 0x0103),
        relposned(4_500_000, 0x0001),
        relposned(27_000_000, 0x0003),
        relposned(18_000_000, 0x0103),
    ];

    let mut parser = ubx::UbxParser::new();
    let mut synth = HeadingSynthesizer::new();

    for frame in &capture {
        for &byte in frame {
            if let Some(parsed) = parser.consume(byte) {
                if let Some(packet) = ubx::decode_relposned(&parsed.payload) {
                    match synth.on_packet(&packet)? {
                        Some(sentence) => print!("{}", String::from_utf8_lossy(&sentence)),
                        None => println!("(skipped: solution not trustworthy)"),
                    }
                }
            }
        }
    }

    println!(
        "\nemitted {} sentences, skipped {}",
        synth.emitted(),
        synth.skipped()
    );
    Ok(())
}
