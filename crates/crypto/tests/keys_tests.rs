//! Integration tests for watermarked signatures and key hashing.

use stele_crypto::{PublicKey, SecretKey, Signature, Watermark};

#[test]
fn test_sign_verify_all_watermarks() {
    let secret = SecretKey::from_seed(&[10u8; 32]);
    for watermark in [
        Watermark::BlockHeader,
        Watermark::Endorsement,
        Watermark::Operation,
    ] {
        let sig = secret.sign(watermark, b"message");
        assert!(secret.public_key().verify(watermark, b"message", &sig));
        assert!(!secret.public_key().verify(watermark, b"other", &sig));
    }
}

#[test]
fn test_signature_not_portable_across_watermarks() {
    let secret = SecretKey::from_seed(&[11u8; 32]);
    let sig = secret.sign(Watermark::BlockHeader, b"header bytes");
    assert!(!secret
        .public_key()
        .verify(Watermark::Operation, b"header bytes", &sig));
    assert!(!secret
        .public_key()
        .verify(Watermark::Endorsement, b"header bytes", &sig));
}

#[test]
fn test_public_key_hash_is_stable_across_encoding() {
    let secret = SecretKey::from_seed(&[12u8; 32]);
    let restored = PublicKey::from_bytes(secret.public_key().as_bytes()).unwrap();
    assert_eq!(restored.hash(), secret.public_key_hash());
}

#[test]
fn test_distinct_seeds_distinct_keys() {
    let a = SecretKey::from_seed(&[13u8; 32]);
    let b = SecretKey::from_seed(&[14u8; 32]);
    assert_ne!(a.public_key_hash(), b.public_key_hash());
}

#[test]
fn test_signature_bytes_roundtrip() {
    let secret = SecretKey::from_seed(&[15u8; 32]);
    let sig = secret.sign(Watermark::Operation, b"payload");
    let restored = Signature::from_bytes(&sig.to_bytes()).unwrap();
    assert_eq!(restored, sig);
    assert!(secret
        .public_key()
        .verify(Watermark::Operation, b"payload", &restored));
}

#[test]
fn test_zeroed_signature_never_verifies() {
    let secret = SecretKey::from_seed(&[16u8; 32]);
    assert!(!secret
        .public_key()
        .verify(Watermark::Operation, b"payload", &Signature::ZERO));
}

#[test]
fn test_generated_keys_sign_and_verify() {
    let mut rng = rand::thread_rng();
    let secret = SecretKey::generate(&mut rng);
    let sig = secret.sign(Watermark::Operation, b"payload");
    assert!(secret.public_key().verify(Watermark::Operation, b"payload", &sig));
}
