//! PIN signing tool.
//!
//! Uses a directory (typically a mounted USB stick) as key storage.
//!
//! Usage:
//!   pinsign enroll --storage /media/usb0 --pin 1234
//!   pinsign sign --storage /media/usb0 --pin 1234 contract.pdf [--output out.pdf]
//!   pinsign verify --storage /media/usb0 contract_signed.pdf
//!   pinsign verify --public-key public_key.key contract_signed.pdf
//!
//! The PIN may also come from the `PINSIGN_PIN` environment variable.
//! `--config settings.json` loads a serialized `SignerConfig`.

use pdf_pinsign::{
    DirectoryStorage, Enrollment, Progress, SignerConfig, SigningService, VerificationOutcome,
    VerificationService,
};
use std::path::PathBuf;
use std::process::ExitCode;

const PIN_ENV: &str = "PINSIGN_PIN";

#[derive(Debug, Default)]
struct CliArgs {
    command: String,
    storage: Option<PathBuf>,
    pin: Option<String>,
    public_key: Option<PathBuf>,
    output: Option<PathBuf>,
    config: Option<PathBuf>,
    key_bits: Option<usize>,
    document: Option<PathBuf>,
    quiet: bool,
}

impl CliArgs {
    fn from_args() -> Result<Self, String> {
        let args: Vec<String> = std::env::args().collect();
        let mut parsed = CliArgs::default();

        let mut i = 1;
        while i < args.len() {
            let arg = args[i].as_str();
            let mut value = || {
                i += 1;
                args.get(i).cloned().ok_or_else(|| format!("{} needs a value", arg))
            };
            match arg {
                "--storage" | "-s" => parsed.storage = Some(PathBuf::from(value()?)),
                "--pin" | "-p" => parsed.pin = Some(value()?),
                "--public-key" | "-k" => parsed.public_key = Some(PathBuf::from(value()?)),
                "--output" | "-o" => parsed.output = Some(PathBuf::from(value()?)),
                "--config" | "-c" => parsed.config = Some(PathBuf::from(value()?)),
                "--key-bits" => {
                    let bits = value()?;
                    parsed.key_bits =
                        Some(bits.parse().map_err(|_| format!("invalid key size: {}", bits))?);
                },
                "--quiet" | "-q" => parsed.quiet = true,
                _ if arg.starts_with('-') => return Err(format!("unknown option: {}", arg)),
                _ if parsed.command.is_empty() => parsed.command = arg.to_string(),
                _ if parsed.document.is_none() => parsed.document = Some(PathBuf::from(arg)),
                _ => return Err(format!("unexpected argument: {}", arg)),
            }
            i += 1;
        }

        if parsed.pin.is_none() {
            parsed.pin = std::env::var(PIN_ENV).ok();
        }
        Ok(parsed)
    }

    fn signer_config(&self) -> Result<SignerConfig, String> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
                serde_json::from_str(&text)
                    .map_err(|e| format!("invalid config {}: {}", path.display(), e))?
            },
            None => SignerConfig::default(),
        };
        if let Some(bits) = self.key_bits {
            config = config.with_key_bits(bits);
        }
        Ok(config)
    }

    fn storage(&self) -> Result<DirectoryStorage, String> {
        self.storage
            .clone()
            .map(DirectoryStorage::new)
            .ok_or_else(|| "--storage is required".to_string())
    }

    fn pin(&self) -> Result<&str, String> {
        self.pin
            .as_deref()
            .ok_or_else(|| format!("--pin or {} is required", PIN_ENV))
    }

    fn document(&self) -> Result<&PathBuf, String> {
        self.document
            .as_ref()
            .ok_or_else(|| "a PDF file is required".to_string())
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  pinsign enroll --storage DIR --pin PIN [--key-bits N]");
    eprintln!("  pinsign sign --storage DIR --pin PIN FILE.pdf [--output OUT.pdf]");
    eprintln!("  pinsign verify (--storage DIR | --public-key KEY) FILE.pdf");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config FILE   load settings from JSON");
    eprintln!("  --quiet         no progress output");
}

fn main() -> ExitCode {
    env_logger::init();

    let args = match CliArgs::from_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage();
            return ExitCode::from(2);
        },
    };

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(2)
        },
    }
}

fn run(args: &CliArgs) -> Result<ExitCode, String> {
    let config = args.signer_config()?;
    let quiet = args.quiet;
    let observer = move |p: &Progress| {
        if !quiet {
            eprintln!("[{:>3}%] {}", p.percent, p.message);
        }
    };

    match args.command.as_str() {
        "enroll" => {
            let storage = args.storage()?;
            Enrollment::new(config)
                .with_observer(observer)
                .enroll(args.pin()?, &storage)
                .map_err(describe)?;
            println!("Keys written to {}", storage_path(&storage));
            Ok(ExitCode::SUCCESS)
        },
        "sign" => {
            let storage = args.storage()?;
            let service = SigningService::new(config).with_observer(observer);
            let document = args.document()?;
            let output = match &args.output {
                Some(output) => {
                    service
                        .sign_to(args.pin()?, &storage, document, output)
                        .map_err(describe)?;
                    output.clone()
                },
                None => service.sign(args.pin()?, &storage, document).map_err(describe)?,
            };
            println!("Signed: {}", output.display());
            Ok(ExitCode::SUCCESS)
        },
        "verify" => {
            let service = VerificationService::new(config).with_observer(observer);
            let document = args.document()?;
            let outcome = match &args.public_key {
                Some(key) => service.verify_with_key_file(key, document),
                None => service.verify_with_storage(&args.storage()?, document),
            }
            .map_err(describe)?;

            match outcome {
                VerificationOutcome::Valid => {
                    println!("Signature valid");
                    Ok(ExitCode::SUCCESS)
                },
                VerificationOutcome::Invalid(reason) => {
                    println!("Signature INVALID: {}", reason);
                    Ok(ExitCode::from(1))
                },
            }
        },
        "" => Err("no command given".to_string()),
        other => Err(format!("unknown command: {}", other)),
    }
}

fn storage_path(storage: &DirectoryStorage) -> String {
    use pdf_pinsign::KeyStorage;
    storage
        .selected_target()
        .map(|p| p.display().to_string())
        .unwrap_or_default()
}

fn describe(err: pdf_pinsign::Error) -> String {
    if err.is_wrong_pin_family() {
        "Invalid PIN or corrupted key file".to_string()
    } else {
        err.to_string()
    }
}
