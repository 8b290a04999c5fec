//! Session Recorder - chunked microphone recording for a remote service
//!
//! This crate captures microphone audio, slices it into sequenced chunks
//! on a fixed cadence and uploads each chunk to a recording service while
//! the session is still running. Stopping the session finalizes it
//! remotely and fetches the resulting transcription.
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: Sessions, chunks, the controller lifecycle, config and errors
//! - **Application**: The recording session controller, chunk producer,
//!   upload pipeline and port interfaces (traits)
//! - **Infrastructure**: Adapter implementations (cpal capture, HTTP
//!   service, credential and config files, notifications)
//! - **CLI**: Command-line interface, argument parsing and output

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
