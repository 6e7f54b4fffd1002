//! # librms
//!
//! A pure Rust library for Microsoft Rights Management Services (Azure RMS)
//! protected messages.
//!
//! A protected email arrives with a `message.rpmsg` attachment. This crate
//! unwraps that container into the compound file it carries, and decrypts
//! protected content with the key from an end-user license.
//!
//! ## Features
//!
//! - Pure Rust implementation with no unsafe code
//! - Streaming rpmsg decoding (magic check, segment framing, zlib inflate)
//! - rpmsg container writing for round-trips and tooling
//! - End-user license parsing and legacy AES-ECB content key decryption
//!   (feature `crypto`, enabled by default)
//! - Blocking licensing service client (feature `client`)
//!
//! ## Example
//!
//! ```no_run
//! use std::fs::File;
//! use std::io;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut reader = librms::rpmsg::decode(File::open("message.rpmsg")?)?;
//! let written = io::copy(&mut reader, &mut File::create("message.compound")?)?;
//! println!("Decoded {} bytes", written);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod license;
pub mod rpmsg;

#[cfg(feature = "client")]
pub mod client;

pub use error::{Error, Result};
pub use license::{EndUserLicense, Key, Policy, UserRight};
pub use rpmsg::{DecoderConfig, InflateReader, RpmsgWriter, WriterConfig};

#[cfg(feature = "client")]
pub use client::{Client, ClientConfig, Template};
