//! Progress reporting.
//!
//! Long operations report each completed stage synchronously to an observer.
//! Percentages follow the steps shown by the enrollment and signing tools.

/// A stage boundary in one of the long-running operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Enrollment started
    EnrollInit,
    /// RSA keypair generated
    KeyGenerated,
    /// PIN hashed into the wrapping key
    PinHashed,
    /// Private key wrapped
    KeyWrapped,
    /// Both key files written
    KeysSaved,
    /// Enrollment finished
    EnrollDone,

    /// Wrapped key is being read
    UnwrapStart,
    /// Wrapping key derived from the PIN
    UnwrapKeyDerived,
    /// Wrapped key split into nonce, tag and ciphertext
    UnwrapSplit,
    /// Ciphertext authenticated and decrypted
    UnwrapDecrypted,
    /// Private key parsed and ready
    KeyUnwrapped,

    /// Signing started
    SignInit,
    /// Document canonicalized and hashed
    Hashed,
    /// Digest signed
    Signed,
    /// Signature placed in the document information dictionary
    Embedded,
    /// Signed copy persisted
    Saved,

    /// Signature read from the document
    SignatureExtracted,
    /// Signature checked against the recomputed digest
    Verified,
    /// Verification finished
    VerifyDone,
}

impl Stage {
    /// Completion percentage at this stage.
    pub fn percent(self) -> u8 {
        match self {
            Stage::EnrollInit => 10,
            Stage::KeyGenerated => 30,
            Stage::PinHashed => 50,
            Stage::KeyWrapped => 65,
            Stage::KeysSaved => 80,
            Stage::EnrollDone => 95,
            Stage::UnwrapStart => 10,
            Stage::UnwrapKeyDerived => 30,
            Stage::UnwrapSplit => 55,
            Stage::UnwrapDecrypted => 75,
            Stage::KeyUnwrapped => 99,
            Stage::SignInit => 20,
            Stage::Hashed => 40,
            Stage::Signed => 60,
            Stage::Embedded => 80,
            Stage::Saved => 95,
            Stage::SignatureExtracted => 50,
            Stage::Verified => 80,
            Stage::VerifyDone => 100,
        }
    }

    /// Human-readable description.
    pub fn message(self) -> &'static str {
        match self {
            Stage::EnrollInit => "Initializing key generation",
            Stage::KeyGenerated => "RSA keypair generated",
            Stage::PinHashed => "PIN hashed",
            Stage::KeyWrapped => "Private key encrypted",
            Stage::KeysSaved => "Key files saved",
            Stage::EnrollDone => "Enrollment complete",
            Stage::UnwrapStart => "Reading encrypted private key",
            Stage::UnwrapKeyDerived => "Deriving decryption key from PIN",
            Stage::UnwrapSplit => "Parsing encrypted key data",
            Stage::UnwrapDecrypted => "Private key decrypted",
            Stage::KeyUnwrapped => "Private key ready",
            Stage::SignInit => "Initializing signing",
            Stage::Hashed => "Document hashed",
            Stage::Signed => "Document signed",
            Stage::Embedded => "Signature embedded",
            Stage::Saved => "Signed document saved",
            Stage::SignatureExtracted => "Signature extracted",
            Stage::Verified => "Signature checked",
            Stage::VerifyDone => "Verification complete",
        }
    }
}

/// One progress notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// Stage just completed
    pub stage: Stage,
    /// Completion percentage (0-100)
    pub percent: u8,
    /// Description of the stage
    pub message: &'static str,
}

impl From<Stage> for Progress {
    fn from(stage: Stage) -> Self {
        Self {
            stage,
            percent: stage.percent(),
            message: stage.message(),
        }
    }
}

/// Receives progress notifications.
pub trait ProgressObserver {
    /// Called synchronously after each stage completes.
    fn on_progress(&self, progress: &Progress);
}

/// Observer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&self, _progress: &Progress) {}
}

impl<F> ProgressObserver for F
where
    F: Fn(&Progress),
{
    fn on_progress(&self, progress: &Progress) {
        self(progress)
    }
}

pub(crate) fn report(observer: &dyn ProgressObserver, stage: Stage) {
    let progress = Progress::from(stage);
    log::debug!("Progress {}%: {}", progress.percent, progress.message);
    observer.on_progress(&progress);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_closure_observer() {
        let seen = RefCell::new(Vec::new());
        let observer = |p: &Progress| seen.borrow_mut().push(p.percent);
        report(&observer, Stage::SignInit);
        report(&observer, Stage::Saved);
        assert_eq!(*seen.borrow(), vec![20, 95]);
    }

    #[test]
    fn test_signing_percentages_increase() {
        let stages = [Stage::SignInit, Stage::Hashed, Stage::Signed, Stage::Embedded, Stage::Saved];
        let percents: Vec<u8> = stages.iter().map(|s| s.percent()).collect();
        assert!(percents.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_progress_from_stage() {
        let p = Progress::from(Stage::VerifyDone);
        assert_eq!(p.percent, 100);
        assert_eq!(p.message, "Verification complete");
    }
}
