//! First-time key setup on a storage target.

use super::keywrap::KeyWrapCodec;
use super::types::PlainPublicKey;
use crate::config::SignerConfig;
use crate::error::{Error, Result};
use crate::progress::{report, NoProgress, ProgressObserver, Stage};
use crate::storage::KeyStorage;

/// Creates a keypair and stores it, wrapped, on a storage target.
///
/// Enrolling again on the same target replaces both key files.
#[derive(Debug, Clone)]
pub struct Enrollment<O = NoProgress> {
    codec: KeyWrapCodec,
    observer: O,
}

impl Enrollment {
    /// Create an enrollment with the given configuration.
    pub fn new(config: SignerConfig) -> Self {
        Self {
            codec: KeyWrapCodec::new(config),
            observer: NoProgress,
        }
    }
}

impl Default for Enrollment {
    fn default() -> Self {
        Self::new(SignerConfig::default())
    }
}

impl<O: ProgressObserver> Enrollment<O> {
    /// Report progress to `observer`.
    pub fn with_observer<P: ProgressObserver>(self, observer: P) -> Enrollment<P> {
        Enrollment {
            codec: self.codec,
            observer,
        }
    }

    /// Generate a keypair protected by `pin` and write both key files to
    /// `storage`. Returns the public key.
    ///
    /// The public key is written first. If the private key cannot be written
    /// afterwards, the previous public key (if any) is put back so the target
    /// keeps a matching pair. A failed enrollment should be retried.
    pub fn enroll(&self, pin: &str, storage: &dyn KeyStorage) -> Result<PlainPublicKey> {
        report(&self.observer, Stage::EnrollInit);
        if pin.is_empty() {
            return Err(Error::EmptyPin);
        }
        let target = storage.selected_target().ok_or(Error::NoStorageTarget)?;
        log::info!("Enrolling new keys on {}", target.display());

        let (wrapped, public_key) = self.codec.generate_reporting(pin, &self.observer)?;

        let config = self.codec.config();
        let previous_public = storage.read_bytes(&config.public_key_file).ok();
        storage.save_bytes(public_key.as_bytes(), &config.public_key_file)?;
        if let Err(e) = storage.save_bytes(wrapped.as_bytes(), &config.private_key_file) {
            log::error!("Saving {} failed: {}", config.private_key_file, e);
            if let Some(previous) = previous_public {
                if let Err(restore) = storage.save_bytes(&previous, &config.public_key_file) {
                    log::warn!("Could not restore previous {}: {}", config.public_key_file, restore);
                }
            }
            return Err(e);
        }
        report(&self.observer, Stage::KeysSaved);

        log::info!("Enrollment complete on {}", target.display());
        report(&self.observer, Stage::EnrollDone);
        Ok(public_key)
    }
}
