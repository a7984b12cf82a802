use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded HMAC-SHA256, the signature format the payment provider uses for both the client callback and the
/// webhook body.
pub fn calculate_hmac_hex(secret: &str, data: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any size");
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time verification of a hex-encoded HMAC-SHA256 signature.
pub fn verify_hmac_hex(secret: &str, data: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature) else {
        return false;
    };
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any size");
    mac.update(data);
    mac.verify_slice(&expected).is_ok()
}
