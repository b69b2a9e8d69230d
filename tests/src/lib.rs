//! # IOF Test Suite
//!
//! End-to-end scenarios between a host-side [`Initiator`](iof_channel::Initiator)
//! and a frame-side [`Responder`](iof_channel::Responder) paired over the
//! in-memory hub.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── harness.rs        # Paired-session fixture, recorders, logging
//! └── integration/
//!     ├── handshake.rs  # Connection establishment and loss
//!     ├── events.rs     # Named events, once semantics, removal
//!     ├── correlation.rs# Request/reply, timeouts, duplicates
//!     └── origin.rs     # Origin and source enforcement
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p iof-tests
//! cargo test -p iof-tests integration::origin::
//! ```

pub mod harness;
