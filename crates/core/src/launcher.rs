/// External process invocation
///
/// Every command the switcher runs (asahi-bless through pkexec, session
/// logout helpers, the generic reboot fallback) goes through a
/// `ProcessLauncher` so the state machine can be exercised without
/// touching the real system.
use crate::error::CommandError;
use std::fmt;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// A program plus its argument list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Runs external programs and reports their outcome
pub trait ProcessLauncher: Send + Sync {
    /// Run to completion with stdout/stderr inherited from this process
    fn run(&self, invocation: &Invocation) -> Result<(), CommandError>;

    /// Run to completion and return captured stdout (stderr stays inherited)
    fn capture(&self, invocation: &Invocation) -> Result<String, CommandError>;
}

/// Launcher backed by `std::process::Command`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl ProcessLauncher for SystemLauncher {
    fn run(&self, invocation: &Invocation) -> Result<(), CommandError> {
        tracing::debug!("Running: {}", invocation);

        let status = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|source| CommandError::Launch {
                program: invocation.program_name(),
                source,
            })?;

        if !status.success() {
            return Err(CommandError::Status {
                program: invocation.program_name(),
                status,
            });
        }
        Ok(())
    }

    fn capture(&self, invocation: &Invocation) -> Result<String, CommandError> {
        tracing::debug!("Capturing: {}", invocation);

        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .map_err(|source| CommandError::Launch {
                program: invocation.program_name(),
                source,
            })?;

        if !output.status.success() {
            return Err(CommandError::Status {
                program: invocation.program_name(),
                status: output.status,
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording launcher shared by the directory and reboot tests

    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::io;

    /// Scripted result for one launched command
    pub enum Outcome {
        /// Success with the given stdout
        Ok(String),
        /// The program could not be started
        LaunchFails,
    }

    /// Records every invocation and replays scripted outcomes in order.
    /// Once the script runs out every command succeeds with empty output.
    #[derive(Default)]
    pub struct RecordingLauncher {
        calls: Mutex<Vec<Invocation>>,
        outcomes: Mutex<VecDeque<Outcome>>,
    }

    impl RecordingLauncher {
        pub fn with_outcomes(outcomes: Vec<Outcome>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                outcomes: Mutex::new(outcomes.into()),
            }
        }

        pub fn calls(&self) -> Vec<Invocation> {
            self.calls.lock().clone()
        }

        fn next(&self, invocation: &Invocation) -> Result<String, CommandError> {
            self.calls.lock().push(invocation.clone());
            match self.outcomes.lock().pop_front() {
                Some(Outcome::Ok(stdout)) => Ok(stdout),
                Some(Outcome::LaunchFails) => Err(CommandError::Launch {
                    program: invocation.program_name(),
                    source: io::Error::new(io::ErrorKind::NotFound, "scripted failure"),
                }),
                None => Ok(String::new()),
            }
        }
    }

    impl ProcessLauncher for RecordingLauncher {
        fn run(&self, invocation: &Invocation) -> Result<(), CommandError> {
            self.next(invocation).map(|_| ())
        }

        fn capture(&self, invocation: &Invocation) -> Result<String, CommandError> {
            self.next(invocation)
        }
    }
}
