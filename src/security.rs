//! Security helpers (id/password/code/token generation, constant-time compare)

use rand::Rng;
use subtle::ConstantTimeEq;

/// Generate a meeting id: 8 random bytes as uppercase hex (16 chars).
///
/// No collision check is performed; at 64 bits of entropy against a
/// registry whose entries live at most a few hours, a collision is an
/// accepted risk rather than a handled case.
pub fn generate_meeting_id() -> String {
    random_hex_upper(8)
}

/// Generate a meeting password: 4 random bytes as uppercase hex (8 chars).
pub fn generate_meeting_password() -> String {
    random_hex_upper(4)
}

/// Generate a 6-digit numeric one-time code ("100000".."999999").
pub fn generate_otp_code() -> String {
    let mut rng = rand::rng();
    let n: u32 = rng.random_range(100_000..1_000_000);
    n.to_string()
}

/// Generate a bearer token: 32 random bytes as lowercase hex.
/// Tokens are opaque secrets; possession is the only proof of auth.
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let mut bytes = [0u8; 32];
    rng.fill(&mut bytes);
    hex::encode(bytes)
}

fn random_hex_upper(len: usize) -> String {
    let mut rng = rand::rng();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes[..]);
    hex::encode(bytes).to_uppercase()
}

/// Constant-time equality for secret strings (passwords, codes).
pub fn ct_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_meeting_id_format() {
        let id = generate_meeting_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn test_meeting_password_format() {
        let password = generate_meeting_password();
        assert_eq!(password.len(), 8);
        assert!(password
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn test_otp_code_is_six_digits() {
        for _ in 0..50 {
            let code = generate_otp_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_token_is_256_bit_hex() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert_ne!(token, generate_token());
    }

    #[test]
    fn test_ct_eq() {
        assert!(ct_eq("A1B2C3D4", "A1B2C3D4"));
        assert!(!ct_eq("A1B2C3D4", "A1B2C3D5"));
        assert!(!ct_eq("A1B2", "A1B2C3D4"));
    }
}
