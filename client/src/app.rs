//! Validate-then-run control flow.

use std::io::Write;

use anyhow::{Context, Result};
use licensa_license::{LicenseValidator, MachineFingerprint, MachineIdentity};
use tracing::debug;

use crate::service::BusinessService;

/// Gates the [`BusinessService`] behind license validation.
pub struct AppController {
    validator: LicenseValidator,
    service: BusinessService,
}

impl AppController {
    pub fn new(validator: LicenseValidator) -> Self {
        Self {
            validator,
            service: BusinessService::new(),
        }
    }

    /// Validates the license and, if it holds, runs the business logic.
    ///
    /// Returns the license status code as the exit code. Business logic
    /// failures are returned as errors.
    pub fn run(&mut self, out: &mut dyn Write) -> Result<i32> {
        debug!("validating {}", self.validator.license_path().display());
        let outcome = self.validator.validate();
        let message = outcome.message.clone();

        let customer = match outcome.gate(|license| license.customer().to_string()) {
            Ok(customer) => customer,
            Err(rejected) => {
                writeln!(out, "✗ License validation failed: {}", rejected.message)?;
                writeln!(out, "  Status code: {}", rejected.exit_code())?;
                return Ok(rejected.exit_code());
            }
        };

        writeln!(out, "✓ {message}")?;
        self.service.initialize(&customer);
        let result = self.service.execute().context("business logic failed");
        self.service.shutdown();
        writeln!(out, "{}", result?)?;
        Ok(0)
    }
}

/// Writes this machine's binding values as pretty JSON.
pub fn print_fingerprint(identity: &dyn MachineIdentity, out: &mut dyn Write) -> Result<()> {
    let fingerprint =
        MachineFingerprint::collect(identity).context("cannot collect machine fingerprint")?;
    serde_json::to_writer_pretty(&mut *out, &fingerprint)?;
    writeln!(out)?;
    Ok(())
}
