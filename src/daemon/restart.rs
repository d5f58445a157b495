use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartOutcome {
    /// A new process took over; this one should finish.
    Spawned(u32),
    /// This process reloads the configuration and keeps running.
    InPlace,
}

/// How the process picks up a modified configuration.
#[async_trait]
pub trait Restarter: Send + Sync {
    fn name(&self) -> &str;
    async fn restart(&self) -> Result<RestartOutcome>;
}

/// Starts the current executable again with the same arguments and
/// environment, sharing stdin/stdout/stderr.
#[derive(Debug, Default)]
pub struct ReExec {
    program: Option<std::path::PathBuf>,
    args: Option<Vec<String>>,
}

impl ReExec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `program args...` instead of the current executable.
    pub fn with_command(program: &str, args: &[&str]) -> Self {
        Self {
            program: Some(program.into()),
            args: Some(args.iter().map(|a| a.to_string()).collect()),
        }
    }
}

#[async_trait]
impl Restarter for ReExec {
    fn name(&self) -> &str {
        "re-exec"
    }

    async fn restart(&self) -> Result<RestartOutcome> {
        let program = match &self.program {
            Some(p) => p.clone(),
            None => std::env::current_exe().context("cannot find the current executable")?,
        };
        let args: Vec<String> = match &self.args {
            Some(a) => a.clone(),
            None => std::env::args().skip(1).collect(),
        };

        let child = Command::new(&program)
            .args(&args)
            .envs(std::env::vars_os())
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("failed to start {}", program.display()))?;
        Ok(RestartOutcome::Spawned(child.id()))
    }
}

/// Keeps the process and starts a new generation inside it.
#[derive(Debug, Default)]
pub struct InPlace;

#[async_trait]
impl Restarter for InPlace {
    fn name(&self) -> &str {
        "in-place"
    }

    async fn restart(&self) -> Result<RestartOutcome> {
        Ok(RestartOutcome::InPlace)
    }
}
