//! `imapdump`: resumable bulk export of an IMAP folder to `.eml` files.
//!
//! This crate provides the library behind the `imapdump` binary: the mail
//! session transport, folder resolution, message persistence with attachment
//! extraction, and the progress ledger that lets an interrupted export pick up
//! where it stopped.

pub mod config;
pub mod download;
pub mod error;
pub mod export;
pub mod folder;
pub mod ledger;
pub mod model;
pub mod parser;
pub mod transport;
