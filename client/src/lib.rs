//! Licensed application shell.
//!
//! Validates `license.lic` against the vendor public key and this machine's
//! identity, then runs the gated business logic. The process exit code is
//! the license status code.

mod app;
mod service;

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use licensa_license::{LicenseValidator, PUBLIC_KEY_FILE, PublicKeySource, SystemIdentity};

pub use app::{AppController, print_fingerprint};
pub use service::{BusinessService, ServiceError};

/// Vendor public key baked in at build time, preferred over `--pub`.
pub const EMBEDDED_PUBLIC_KEY: Option<&str> = option_env!("LICENSA_EMBEDDED_PUBLIC_KEY");

/// Default license file name.
pub const DEFAULT_LICENSE_FILE: &str = "license.lic";

#[derive(Parser, Debug)]
#[command(name = "licensa-client")]
#[command(about = "License-protected application")]
pub struct Cli {
    /// Path to license file
    #[arg(long, default_value = DEFAULT_LICENSE_FILE)]
    pub lic: PathBuf,

    /// Path to public key (ignored when a key is embedded)
    #[arg(long = "pub", default_value = PUBLIC_KEY_FILE)]
    pub public_key: PathBuf,

    /// Skip MAC and hostname binding checks
    #[arg(long)]
    pub no_bindings: bool,

    /// Print this machine's MAC and hostname as JSON and exit
    #[arg(long)]
    pub fingerprint: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn key_source(&self) -> PublicKeySource {
        PublicKeySource::resolve(EMBEDDED_PUBLIC_KEY, &self.public_key)
    }

    /// Validator for the configured license, system identity and wall clock.
    pub fn validator(&self) -> LicenseValidator {
        LicenseValidator::new(&self.lic, self.key_source()).require_bindings(!self.no_bindings)
    }
}

/// Runs the client, returning the process exit code.
pub fn run(cli: &Cli, out: &mut dyn Write) -> Result<i32> {
    if cli.fingerprint {
        print_fingerprint(&SystemIdentity, out)?;
        return Ok(0);
    }
    AppController::new(cli.validator()).run(out)
}
