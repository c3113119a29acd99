//! Built-in message labels.
//!
//! A label names the kind of exchange an envelope belongs to. Each label
//! pairs one request payload with one response payload.

/// Handshake traffic: `Init` requests answered by `Setup` responses.
pub const ANNOUNCE: u8 = 1;

/// Method invocation: `Input` requests answered by `Output` responses.
pub const INVOKE: u8 = 2;

/// Returns a human-readable name for a label.
pub fn label_name(label: u8) -> &'static str {
    match label {
        ANNOUNCE => "ANNOUNCE",
        INVOKE => "INVOKE",
        _ => "UNKNOWN",
    }
}

/// Returns true if the label is one this crate knows how to route.
pub fn is_known(label: u8) -> bool {
    matches!(label, ANNOUNCE | INVOKE)
}
