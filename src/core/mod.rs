//! Core module containing the main functionality of Navbridge
//!
//! This module provides:
//! - Transport layer (serial links to the receivers, UDP toward the network)
//! - NMEA sentence checksum and formatting
//! - Bounded line framing for the relay path
//! - UBX protocol support (frame builders, parser, NAV-RELPOSNED decode)
//! - Baud rate auto-negotiation
//! - Receiver channels with role-specific output profiles
//! - Heading sentence synthesis
//! - Bidirectional channel routing
//! - The background relay service

pub mod frame;
pub mod heading;
pub mod negotiate;
pub mod receiver;
pub mod router;
pub mod sentence;
pub mod service;
pub mod transport;
pub mod ubx;

#[cfg(test)]
pub(crate) mod testutil;
