//! The image pipeline: acquire bytes, transcode them, resolve concurrently.
//!
//! Split by stage so each one tests in isolation:
//! * [`acquire`] — classify a reference (URL / inline data / local path) and
//!   obtain raw bytes, with linear-backoff retry for network fetches.
//! * [`transcode`] — decode, resize down to the width ceiling, re-encode.
//! * [`resolve`] — cache-aware orchestration of the other two, settling all
//!   references concurrently with per-image failure isolation.

pub mod acquire;
pub mod resolve;
pub mod transcode;
