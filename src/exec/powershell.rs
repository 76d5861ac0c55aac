//! PowerShell process executor

use super::{quote, CommandExecutor, CommandOutput, ExecutionError};
use crate::config::Credentials;
use std::process::Command;

/// Environment variable carrying the run-as password into the child process
pub const PASSWORD_ENV: &str = "WFCLUSTER_RUN_AS_PASSWORD";

/// Default PowerShell binary
pub const DEFAULT_PROGRAM: &str = "powershell.exe";

/// Runs commands through `powershell.exe` and `Invoke-Command` as the
/// run-as account on the target host.
#[derive(Debug, Clone)]
pub struct PowerShellExecutor {
    /// PowerShell binary
    program: String,
    /// Host the cmdlets run on
    computer_name: String,
}

impl Default for PowerShellExecutor {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            computer_name: "localhost".to_string(),
        }
    }
}

impl PowerShellExecutor {
    pub fn new(computer_name: &str) -> Self {
        Self {
            computer_name: computer_name.to_string(),
            ..Default::default()
        }
    }

    /// Use a different PowerShell binary (e.g. `pwsh`)
    pub fn program(mut self, program: &str) -> Self {
        self.program = program.to_string();
        self
    }

    /// Script that runs `command` as `credentials` on the target host.
    ///
    /// The password is read from [`PASSWORD_ENV`] so it never appears on
    /// the command line.
    pub fn wrap(&self, command: &str, credentials: &Credentials) -> String {
        format!(
            "$ErrorActionPreference = 'Stop'; \
             $pw = ConvertTo-SecureString $env:{env} -AsPlainText -Force; \
             $cred = New-Object System.Management.Automation.PSCredential({user}, $pw); \
             Invoke-Command -ComputerName {host} -Credential $cred -ScriptBlock {{ \
             $ErrorActionPreference = 'Stop'; {command} }}",
            env = PASSWORD_ENV,
            user = quote(&credentials.principal()),
            host = quote(&self.computer_name),
            command = command,
        )
    }
}

impl CommandExecutor for PowerShellExecutor {
    fn run(&self, command: &str, credentials: &Credentials) -> Result<CommandOutput, ExecutionError> {
        tracing::debug!(command = %command, host = %self.computer_name, "running command");

        let script = self.wrap(command, credentials);
        let output = Command::new(&self.program)
            .args(["-NoLogo", "-NoProfile", "-NonInteractive", "-Command", &script])
            .env(PASSWORD_ENV, credentials.password())
            .output()
            .map_err(|err| ExecutionError::ExecutionStart {
                command: command.to_string(),
                err,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExecutionError::failure(command, output.status.code(), &stdout, &stderr));
        }

        tracing::debug!(command = %command, "command finished");
        Ok(CommandOutput::new(stdout))
    }
}
