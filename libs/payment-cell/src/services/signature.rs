use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn signed_payload(order_id: &str, payment_id: &str) -> String {
    format!("{}|{}", order_id, payment_id)
}

/// Hex HMAC-SHA256 of `order_id|payment_id`, as the gateway signs its callbacks.
pub fn sign(secret: &str, order_id: &str, payment_id: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(signed_payload(order_id, payment_id).as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

pub fn verify(secret: &str, order_id: &str, payment_id: &str, signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(signed_payload(order_id, payment_id).as_bytes());
    mac.verify_slice(&expected).is_ok()
}
