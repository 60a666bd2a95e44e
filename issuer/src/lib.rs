//! Command-line front end for the license authority.
//!
//! ```text
//! licensa-issuer genkeys [--force]
//! licensa-issuer create --customer "Acme" --expiry 2027-01-01 [--bind-mac ..] [--bind-hostname ..] [--out ..]
//! licensa-issuer verify --lic licenses/acme.lic
//! ```

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use licensa_license::{DEFAULT_KEYS_DIR, DEFAULT_LICENSES_DIR, Issuer, LicenseRequest, parse_expiry};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "licensa-issuer")]
#[command(about = "Generate and manage signed software licenses")]
pub struct Cli {
    /// Directory holding pub.pem and priv.pem
    #[arg(long, default_value = DEFAULT_KEYS_DIR)]
    pub keys_dir: PathBuf,

    /// Directory for licenses written without --out
    #[arg(long, default_value = DEFAULT_LICENSES_DIR)]
    pub licenses_dir: PathBuf,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate the signing key pair
    Genkeys {
        /// Overwrite existing keys (irreversible)
        #[arg(long)]
        force: bool,
    },
    /// Create and sign a new license
    Create {
        /// Customer name
        #[arg(long)]
        customer: String,

        /// Expiry date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_expiry)]
        expiry: NaiveDate,

        /// Output file path
        #[arg(long)]
        out: Option<PathBuf>,

        /// Bind to MAC address(es)
        #[arg(long = "bind-mac", num_args = 0..)]
        bind_mac: Vec<String>,

        /// Bind to hostname(s)
        #[arg(long = "bind-hostname", num_args = 0..)]
        bind_hostname: Vec<String>,
    },
    /// Check a license's signature and expiry
    Verify {
        /// Path to license file
        #[arg(long)]
        lic: PathBuf,
    },
}

impl Cli {
    /// Issuer rooted at the configured directories.
    pub fn issuer(&self) -> Issuer {
        Issuer::new(&self.keys_dir, self.licenses_dir.clone())
    }
}

/// Runs one command, writing user-facing output to `out`.
///
/// Returns the process exit code: 0 on success, 1 when `verify` rejects the
/// license. Operational failures are returned as errors.
pub fn run(cli: &Cli, out: &mut dyn Write) -> Result<i32> {
    run_with(&cli.issuer(), &cli.command, out)
}

/// Like [`run`] with an explicit issuer.
pub fn run_with(issuer: &Issuer, command: &Command, out: &mut dyn Write) -> Result<i32> {
    debug!("running {command:?}");
    match command {
        Command::Genkeys { force } => {
            let (public, private) = issuer
                .generate_keys(*force)
                .context("key generation failed")?;
            writeln!(out, "Generated key pair:")?;
            writeln!(out, "  Public key:  {}", public.display())?;
            writeln!(out, "  Private key: {}", private.display())?;
            writeln!(
                out,
                "\nKeep the private key secure! Distribute the public key with your application."
            )?;
            Ok(0)
        }
        Command::Create {
            customer,
            expiry,
            out: output,
            bind_mac,
            bind_hostname,
        } => {
            let request = LicenseRequest {
                customer: customer.clone(),
                expiry: *expiry,
                mac: bind_mac.clone(),
                host: bind_hostname.clone(),
                output: output.clone(),
            };
            let issued = issuer
                .create_license(request)
                .context("license creation failed")?;
            let license = &issued.license;

            writeln!(out, "License created successfully!")?;
            writeln!(out, "  Customer: {}", license.customer())?;
            writeln!(out, "  Expiry:   {}", license.expiry())?;
            if !license.bindings().mac.is_empty() {
                writeln!(out, "  MAC bindings: {}", license.bindings().mac.join(", "))?;
            }
            if !license.bindings().host.is_empty() {
                writeln!(out, "  Host bindings: {}", license.bindings().host.join(", "))?;
            }
            writeln!(out, "  Output: {}", issued.path.display())?;
            Ok(0)
        }
        Command::Verify { lic } => {
            let (valid, message) = issuer.verify_license(lic);
            if valid {
                writeln!(out, "✓ {message}")?;
                Ok(0)
            } else {
                writeln!(out, "✗ {message}")?;
                Ok(1)
            }
        }
    }
}
