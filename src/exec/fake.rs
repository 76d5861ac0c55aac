//! Recording executor for tests

use super::{CommandExecutor, CommandOutput, ExecutionError};
use crate::config::Credentials;
use std::sync::Mutex;

#[derive(Debug, Clone)]
enum Reply {
    Output(String),
    Fail,
    StartFailure,
}

/// An executor which records every command and answers from canned rules.
///
/// A rule matches when the command contains its pattern. Later rules win
/// over earlier ones; a command with no matching rule succeeds with empty
/// output.
#[derive(Debug, Default)]
pub struct FakeExecutor {
    rules: Mutex<Vec<(String, Reply)>>,
    commands: Mutex<Vec<String>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands containing `pattern` with `stdout`
    pub fn respond(&self, pattern: &str, stdout: &str) -> &Self {
        self.rules
            .lock()
            .unwrap()
            .push((pattern.to_string(), Reply::Output(stdout.to_string())));
        self
    }

    /// Fail commands containing `pattern`
    pub fn fail(&self, pattern: &str) -> &Self {
        self.rules.lock().unwrap().push((pattern.to_string(), Reply::Fail));
        self
    }

    /// Fail commands containing `pattern` as if the process could not start
    pub fn fail_to_start(&self, pattern: &str) -> &Self {
        self.rules
            .lock()
            .unwrap()
            .push((pattern.to_string(), Reply::StartFailure));
        self
    }

    /// Every command run so far, in order
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// Commands run so far that contain `pattern`
    pub fn commands_matching(&self, pattern: &str) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|c| c.contains(pattern))
            .collect()
    }
}

impl CommandExecutor for FakeExecutor {
    fn run(&self, command: &str, _credentials: &Credentials) -> Result<CommandOutput, ExecutionError> {
        self.commands.lock().unwrap().push(command.to_string());

        let reply = self
            .rules
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(pattern, _)| command.contains(pattern.as_str()))
            .map(|(_, reply)| reply.clone());

        match reply {
            Some(Reply::StartFailure) => Err(ExecutionError::ExecutionStart {
                command: command.to_string(),
                err: std::io::Error::new(std::io::ErrorKind::NotFound, "fake start failure"),
            }),
            Some(Reply::Fail) => Err(ExecutionError::failure(command, Some(1), "", "fake failure")),
            Some(Reply::Output(stdout)) => Ok(CommandOutput::new(stdout)),
            None => Ok(CommandOutput::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rules_and_recording() {
        let executor = FakeExecutor::new();
        executor.respond("Get-ClusterNode", "NODE1\r\n").fail("New-Cluster");
        let creds = Credentials::new("svc", "pw", None).unwrap();

        let output = executor.run("(Get-ClusterNode).Name", &creds).unwrap();
        assert_eq!(output.lines(), vec!["NODE1"]);
        assert!(executor.run("New-Cluster -Name X", &creds).is_err());
        assert_eq!(executor.run("Start-ClusterResource", &creds).unwrap(), CommandOutput::default());

        assert_eq!(executor.commands().len(), 3);
        assert_eq!(executor.commands_matching("New-Cluster").len(), 1);
    }

    #[test]
    fn test_later_rule_wins() {
        let executor = FakeExecutor::new();
        executor.respond("Get-Cluster", "OLD").respond("Get-Cluster", "NEW");
        let creds = Credentials::new("svc", "pw", None).unwrap();

        assert_eq!(executor.run("(Get-Cluster).Name", &creds).unwrap().value(), "NEW");
    }
}
