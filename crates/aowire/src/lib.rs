//! `aowire`: IO helpers for the `%`-delimited AO2 wire protocol.
//!
//! - `%`-delimited record framing without copying (`BytesMut::split_to(..)`),
//! - a fixed-rate pacer used to throttle per-connection packet handling.

pub mod pacer;
pub mod record;
