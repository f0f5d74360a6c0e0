/// Generate a compact correlation ID (8 hex characters) from the first 4 bytes of a UUID v4.
///
/// Short enough to scan in logs, with ~4 billion values to keep collisions rare.
pub fn generate_correlation_id() -> String {
    let uuid = uuid::Uuid::new_v4();
    hex::encode(&uuid.as_bytes()[..4])
}

/// Mask a secret for log output, keeping only its length visible.
pub fn redact(secret: &str) -> String {
    format!("<{} chars>", secret.chars().count())
}
