//! UDP delivery channel.
//!
//! The server pushes the base64 form of a secret message as one datagram; the
//! client waits for it with a bounded number of timed attempts. Nothing on this
//! channel is acknowledged or resent.

pub mod receiver;
pub mod sender;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Largest datagram the receiver accepts (64 KiB is the theoretical UDP max)
pub const MAX_DATAGRAM_SIZE: usize = 65535;

/// Base64 text of the message's UTF-8 bytes.
pub fn encode_payload(message: &str) -> String {
    STANDARD.encode(message.as_bytes())
}

/// Inverse of [`encode_payload`]. Surrounding whitespace is ignored.
pub fn decode_payload(data: &[u8]) -> Result<String, String> {
    let text = std::str::from_utf8(data).map_err(|e| format!("not text: {}", e))?;
    let bytes = STANDARD
        .decode(text.trim())
        .map_err(|e| format!("not base64: {}", e))?;
    String::from_utf8(bytes).map_err(|e| format!("not UTF-8: {}", e))
}

pub use receiver::{DeliveryReceiver, ReceivePolicy};
pub use sender::send_payload;
