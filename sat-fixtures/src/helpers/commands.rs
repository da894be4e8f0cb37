use sat_client::shell::CommandOutput;

use super::{FixtureError, FixtureResult};

/// Turn a non-zero exit status into a [`FixtureError::Command`].
pub fn ensure_status(command: &str, output: CommandOutput) -> FixtureResult<CommandOutput> {
    if output.success() {
        return Ok(output);
    }
    tracing::error!("`{}` exited with {}: {}", command, output.status, output.stderr.trim());
    Err(FixtureError::Command {
        command: command.to_string(),
        status: output.status,
        stderr: output.stderr.trim().to_string(),
    })
}
