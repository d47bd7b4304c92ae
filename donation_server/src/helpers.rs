use hmac::{Hmac, Mac};
use sha2::Sha512;
use subtle::ConstantTimeEq;

type HmacSha512 = Hmac<Sha512>;

/// Checks a Paystack webhook signature against the raw request body.
///
/// Paystack signs the exact bytes it sends with HMAC-SHA512 and puts the lowercase hex digest in the
/// `x-paystack-signature` header. The MAC is computed over the raw body, never a re-serialized object, since any
/// re-encoding breaks it. The comparison is constant-time. A malformed (non-hex) signature simply fails
/// verification.
pub fn verify_paystack_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(mut mac) = HmacSha512::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let expected = mac.finalize().into_bytes();
    let Ok(provided) = hex::decode(signature.trim()) else {
        return false;
    };
    expected.as_slice().ct_eq(provided.as_slice()).into()
}

/// Signs a payload the way Paystack does. Used by tooling and tests to produce valid deliveries.
pub fn sign_paystack_payload(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}
