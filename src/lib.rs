//! This crate provides an interface for communicating with and controlling the Manson HCS series of
//! programmable bench power supplies.
//!
//! It supports `no-std` environments when built without the default `std` feature. The serial port
//! transport and [`HcsPsu::watch`](psu::HcsPsu) monitoring loop need `std`.
//!
//! Supported PSU models (firmware `REV3.3`):
//! * HCS-3102
//! * HCS-3014
//! * HCS-3204
//!
//! The PSUs speak a line based ASCII protocol. Every command is a four letter verb followed by fixed-width
//! decimal arguments and a carriage return. Every reply is an optional data line followed by `OK`.
//!
//! The serial port used for PSU comms should be configured like so:
//! * Baud rate: 9600
//! * Data bits: 8
//! * Stop bits: 1
//! * Parity: None

#![cfg_attr(not(feature = "std"), no_std)]

pub mod error;
pub mod parser;
pub mod preset;
pub mod psu;
pub mod scaling;
#[cfg(feature = "std")]
pub mod serial;
pub mod transaction;
pub mod transport;
pub mod types;
#[cfg(feature = "std")]
pub mod watch;

#[cfg(test)]
mod mock_transport;
