//! PIN wrapping of the private key.

mod common;

use common::{enrolled_storage, test_config};
use pdf_pinsign::config::SignerConfig;
use pdf_pinsign::signatures::{
    decode_public_key, sign_digest, DocumentHasher, KeyWrapCodec, WrappedPrivateKey, NONCE_LEN,
    TAG_LEN,
};
use pdf_pinsign::storage::{DirectoryStorage, KeyStorage, MemoryStorage};
use pdf_pinsign::{Enrollment, Error};
use proptest::prelude::*;
use rsa::pkcs8::EncodePublicKey;
use rand::rngs::OsRng;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::sync::OnceLock;

/// `private_key.enc` as written by the desktop enrollment tool: a PKCS#1 PEM
/// sealed with AES-256-EAX under SHA-256("1234"), stored as nonce || tag || ct.
const LEGACY_WRAPPED: &[u8] = include_bytes!("fixtures/legacy_private_key.enc");
const LEGACY_PUBLIC: &[u8] = include_bytes!("fixtures/legacy_public_key.key");

fn wrapped_1234() -> WrappedPrivateKey {
    let storage = enrolled_storage("1234");
    WrappedPrivateKey::from_bytes(storage.read_bytes("private_key.enc").unwrap())
}

#[test]
fn test_correct_pin_unwraps_matching_key() {
    let storage = enrolled_storage("1234");
    let codec = KeyWrapCodec::new(test_config());

    let private_key = codec.unwrap_from("1234", &storage).unwrap();
    let derived = RsaPublicKey::from(&private_key)
        .to_public_key_pem(rsa::pkcs8::LineEnding::LF)
        .unwrap();
    assert_eq!(derived.as_bytes(), storage.read_bytes("public_key.key").unwrap());
}

#[test]
fn test_wrong_pin_is_rejected() {
    let codec = KeyWrapCodec::new(test_config());
    let err = codec.unwrap("0000", &wrapped_1234()).unwrap_err();
    assert!(matches!(err, Error::WrongPinOrCorrupted));
    assert!(err.is_wrong_pin_family());
}

#[test]
fn test_bit_flips_are_detected() {
    let codec = KeyWrapCodec::new(test_config());
    let original = wrapped_1234().into_bytes();

    // One flip in the nonce, the tag, and the start and end of the ciphertext
    let positions = [0, NONCE_LEN + 3, NONCE_LEN + TAG_LEN, original.len() - 1];
    for pos in positions {
        let mut tampered = original.clone();
        tampered[pos] ^= 0x01;
        let result = codec.unwrap("1234", &WrappedPrivateKey::from_bytes(tampered));
        assert!(
            matches!(result, Err(Error::WrongPinOrCorrupted)),
            "flip at byte {} was not detected",
            pos
        );
    }
}

#[test]
fn test_truncated_file() {
    let codec = KeyWrapCodec::new(test_config());
    let original = wrapped_1234().into_bytes();

    for len in [0, 10, NONCE_LEN + TAG_LEN - 1, NONCE_LEN + TAG_LEN, original.len() - 1] {
        let truncated = WrappedPrivateKey::from_bytes(original[..len].to_vec());
        assert!(matches!(codec.unwrap("1234", &truncated), Err(Error::WrongPinOrCorrupted)));
    }
}

#[test]
fn test_layout_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let storage = DirectoryStorage::new(dir.path());
    Enrollment::new(test_config()).enroll("4321", &storage).unwrap();

    let wrapped = std::fs::read(dir.path().join("private_key.enc")).unwrap();
    assert!(wrapped.len() > NONCE_LEN + TAG_LEN);
    assert!(!wrapped.windows(5).any(|w| w == b"BEGIN"), "private key stored in clear");

    let public = std::fs::read_to_string(dir.path().join("public_key.key")).unwrap();
    assert!(public.starts_with("-----BEGIN PUBLIC KEY-----"));
}

#[test]
fn test_missing_key_file() {
    let dir = tempfile::tempdir().unwrap();
    let storage = DirectoryStorage::new(dir.path());
    let result = KeyWrapCodec::new(test_config()).unwrap_from("1234", &storage);
    match result {
        Err(Error::KeyNotFound(path)) => assert!(path.ends_with("private_key.enc")),
        other => panic!("expected KeyNotFound, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_custom_file_names() {
    let config = test_config()
        .with_private_key_file("alice.enc")
        .with_public_key_file("alice.pub");
    let storage = MemoryStorage::new();
    Enrollment::new(config.clone()).enroll("1234", &storage).unwrap();

    assert_eq!(storage.file_names(), vec!["alice.enc", "alice.pub"]);
    assert!(!storage.has_keys());
    assert!(KeyWrapCodec::new(config).unwrap_from("1234", &storage).is_ok());
}

#[test]
fn test_unwraps_key_file_from_enrollment_tool() {
    let codec = KeyWrapCodec::new(test_config());
    let wrapped = WrappedPrivateKey::from_bytes(LEGACY_WRAPPED.to_vec());

    let private_key = codec.unwrap("1234", &wrapped).unwrap();
    assert_eq!(RsaPublicKey::from(&private_key), decode_public_key(LEGACY_PUBLIC).unwrap());

    let err = codec.unwrap("4321", &wrapped).unwrap_err();
    assert!(matches!(err, Error::WrongPinOrCorrupted));
}

#[test]
fn test_key_file_from_enrollment_tool_signs() {
    let storage = MemoryStorage::new();
    storage.put("private_key.enc", LEGACY_WRAPPED.to_vec());
    storage.put("public_key.key", LEGACY_PUBLIC.to_vec());

    let private_key = KeyWrapCodec::new(test_config()).unwrap_from("1234", &storage).unwrap();
    let digest = DocumentHasher::digest(b"document bytes");
    let signature = sign_digest(&private_key, &digest).unwrap();
    assert_eq!(signature.len(), 128);
}

fn small_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| RsaPrivateKey::new(&mut OsRng, 1024).expect("keygen"))
}

#[test]
fn test_default_key_size_gives_512_byte_signatures() {
    let config = SignerConfig::default();
    assert_eq!(config.key_bits, 4096);

    let storage = MemoryStorage::new();
    Enrollment::new(config.clone()).enroll("1234", &storage).unwrap();
    let private_key = KeyWrapCodec::new(config).unwrap_from("1234", &storage).unwrap();

    let signature = sign_digest(&private_key, &DocumentHasher::digest(b"x")).unwrap();
    assert_eq!(signature.len(), 512);
    assert_eq!(signature.to_hex().len(), 1024);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_any_pin_unwraps_what_it_wrapped(pin in "\\PC{1,12}") {
        let codec = KeyWrapCodec::new(test_config());
        let wrapped = codec.wrap(&pin, small_key()).unwrap();
        prop_assert_eq!(&codec.unwrap(&pin, &wrapped).unwrap(), small_key());

        let other = format!("{}0", pin);
        prop_assert!(matches!(codec.unwrap(&other, &wrapped), Err(Error::WrongPinOrCorrupted)));
    }

    #[test]
    fn prop_only_the_enrolled_pin_unwraps(pin in "[0-9]{4,8}") {
        let codec = KeyWrapCodec::new(test_config());
        let result = codec.unwrap(&pin, &wrapped_1234());
        if pin == "1234" {
            prop_assert!(result.is_ok());
        } else {
            prop_assert!(matches!(result, Err(Error::WrongPinOrCorrupted)));
        }
    }
}
