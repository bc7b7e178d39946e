//! PIN-based wrapping of the RSA private key.
//!
//! The private key is exported as PKCS#1 PEM and sealed with AES-256-EAX
//! (16-byte nonce, 16-byte tag) under `SHA256(pin)`. The stored layout is
//! `nonce || tag || ciphertext`. A wrong PIN and a modified file both fail
//! the tag check, and no plaintext is released in either case.

use super::types::{PinHash, PlainPublicKey, WrappedPrivateKey, NONCE_LEN};
use crate::config::SignerConfig;
use crate::error::{Error, Result};
use crate::progress::{report, NoProgress, ProgressObserver, Stage};
use crate::storage::KeyStorage;
use aes::Aes256;
use eax::aead::generic_array::GenericArray;
use eax::aead::{AeadInPlace, KeyInit};
use eax::Eax;
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey, LineEnding};
use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use zeroize::Zeroizing;

/// AES-256 in EAX mode. Nonce and tag are both one block.
type WrapCipher = Eax<Aes256>;

/// Wraps and unwraps private keys under a PIN.
#[derive(Debug, Clone, Default)]
pub struct KeyWrapCodec {
    config: SignerConfig,
}

impl KeyWrapCodec {
    /// Create a codec with the given configuration.
    pub fn new(config: SignerConfig) -> Self {
        Self { config }
    }

    /// Configuration in use.
    pub fn config(&self) -> &SignerConfig {
        &self.config
    }

    /// Generate a fresh keypair and wrap the private half under `pin`.
    pub fn generate(&self, pin: &str) -> Result<(WrappedPrivateKey, PlainPublicKey)> {
        self.generate_reporting(pin, &NoProgress)
    }

    /// [`generate`](Self::generate), reporting key generation, PIN hashing
    /// and wrapping to `observer`.
    pub fn generate_reporting(
        &self,
        pin: &str,
        observer: &dyn ProgressObserver,
    ) -> Result<(WrappedPrivateKey, PlainPublicKey)> {
        if pin.is_empty() {
            return Err(Error::EmptyPin);
        }

        log::info!("Generating {}-bit RSA keypair", self.config.key_bits);
        let private_key = RsaPrivateKey::new(&mut OsRng, self.config.key_bits).map_err(|e| {
            log::error!("RSA key generation failed: {}", e);
            Error::KeyGeneration(e.to_string())
        })?;
        report(observer, Stage::KeyGenerated);

        let pin_hash = PinHash::derive(pin)?;
        report(observer, Stage::PinHashed);

        let wrapped = wrap_with(&pin_hash, &private_key)?;
        report(observer, Stage::KeyWrapped);

        let public_key = export_public_key(&RsaPublicKey::from(&private_key))?;
        Ok((wrapped, public_key))
    }

    /// Wrap an existing private key under `pin` with a fresh nonce.
    pub fn wrap(&self, pin: &str, private_key: &RsaPrivateKey) -> Result<WrappedPrivateKey> {
        wrap_with(&PinHash::derive(pin)?, private_key)
    }

    /// Recover the private key from its wrapped form.
    pub fn unwrap(&self, pin: &str, wrapped: &WrappedPrivateKey) -> Result<RsaPrivateKey> {
        self.unwrap_reporting(pin, wrapped, &NoProgress)
    }

    /// [`unwrap`](Self::unwrap), reporting each step to `observer`.
    pub fn unwrap_reporting(
        &self,
        pin: &str,
        wrapped: &WrappedPrivateKey,
        observer: &dyn ProgressObserver,
    ) -> Result<RsaPrivateKey> {
        report(observer, Stage::UnwrapStart);
        let pin_hash = PinHash::derive(pin)?;
        report(observer, Stage::UnwrapKeyDerived);

        let (nonce, tag, ciphertext) = wrapped.split()?;
        report(observer, Stage::UnwrapSplit);

        let cipher = WrapCipher::new(GenericArray::from_slice(pin_hash.as_bytes()));
        let mut plaintext = Zeroizing::new(ciphertext.to_vec());
        cipher
            .decrypt_in_place_detached(
                GenericArray::from_slice(nonce),
                b"",
                plaintext.as_mut_slice(),
                GenericArray::from_slice(tag),
            )
            .map_err(|_| {
                log::warn!("Wrapped key failed authentication");
                Error::WrongPinOrCorrupted
            })?;
        report(observer, Stage::UnwrapDecrypted);

        let private_key = decode_private_key(&plaintext)?;
        report(observer, Stage::KeyUnwrapped);
        Ok(private_key)
    }

    /// Read the wrapped key file from `storage` and unwrap it.
    pub fn unwrap_from(&self, pin: &str, storage: &dyn KeyStorage) -> Result<RsaPrivateKey> {
        self.unwrap_from_reporting(pin, storage, &NoProgress)
    }

    pub(crate) fn unwrap_from_reporting(
        &self,
        pin: &str,
        storage: &dyn KeyStorage,
        observer: &dyn ProgressObserver,
    ) -> Result<RsaPrivateKey> {
        let bytes = storage.read_bytes(&self.config.private_key_file)?;
        self.unwrap_reporting(pin, &WrappedPrivateKey::from_bytes(bytes), observer)
    }
}

fn wrap_with(pin_hash: &PinHash, private_key: &RsaPrivateKey) -> Result<WrappedPrivateKey> {
    let pem = private_key
        .to_pkcs1_pem(LineEnding::LF)
        .map_err(|e| Error::KeyExport(e.to_string()))?;

    let mut nonce = [0u8; NONCE_LEN];
    OsRng
        .try_fill_bytes(&mut nonce)
        .map_err(|e| Error::KeyGeneration(format!("nonce generation failed: {}", e)))?;

    let cipher = WrapCipher::new(GenericArray::from_slice(pin_hash.as_bytes()));
    let mut buffer = Zeroizing::new(pem.as_bytes().to_vec());
    let tag = cipher
        .encrypt_in_place_detached(GenericArray::from_slice(&nonce), b"", buffer.as_mut_slice())
        .map_err(|e| Error::KeyExport(format!("key encryption failed: {}", e)))?;

    Ok(WrappedPrivateKey::from_parts(&nonce, &tag, &buffer))
}

/// SubjectPublicKeyInfo PEM export.
pub fn export_public_key(public_key: &RsaPublicKey) -> Result<PlainPublicKey> {
    public_key
        .to_public_key_pem(LineEnding::LF)
        .map(PlainPublicKey::from_pem)
        .map_err(|e| Error::KeyExport(e.to_string()))
}

/// Parse decrypted key material: PEM or DER, PKCS#1 or PKCS#8.
fn decode_private_key(plaintext: &[u8]) -> Result<RsaPrivateKey> {
    if let Ok(text) = std::str::from_utf8(plaintext) {
        if let Ok(key) = RsaPrivateKey::from_pkcs1_pem(text) {
            return Ok(key);
        }
        if let Ok(key) = RsaPrivateKey::from_pkcs8_pem(text) {
            return Ok(key);
        }
    }
    if let Ok(key) = RsaPrivateKey::from_pkcs1_der(plaintext) {
        return Ok(key);
    }
    RsaPrivateKey::from_pkcs8_der(plaintext).map_err(|e| {
        log::error!("Decrypted key material is not a private key");
        Error::CorruptedKeyEncoding(e.to_string())
    })
}
