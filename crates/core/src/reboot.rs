//! Reboot Orchestrator
//!
//! Picks how to ask for a reboot from the desktop session identifier:
//! - KDE: ksmserver logout over D-Bus, no confirmation, forced, reboot mode
//! - GNOME: `gnome-session-quit --reboot`
//! - anything else: `pkexec reboot`
//!
//! The chosen branch's failure is reported as is. It never falls through to
//! another branch.

use crate::config::CommandPaths;
use crate::error::RebootRequestError;
use crate::launcher::{Invocation, ProcessLauncher};
use std::sync::Arc;

/// Environment variable naming the desktop session
pub const SESSION_ENV: &str = "XDG_CURRENT_DESKTOP";

/// Desktop session, matched exactly against the identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DesktopSession {
    Kde,
    Gnome,
    Other(String),
}

impl DesktopSession {
    pub fn from_identifier(identifier: &str) -> Self {
        match identifier {
            "KDE" => DesktopSession::Kde,
            "GNOME" => DesktopSession::Gnome,
            other => DesktopSession::Other(other.to_string()),
        }
    }

    /// Read from `XDG_CURRENT_DESKTOP`; unset counts as an unknown session
    pub fn from_env() -> Self {
        Self::from_identifier(&std::env::var(SESSION_ENV).unwrap_or_default())
    }
}

/// Something that can restart the machine
pub trait RebootRequester: Send + Sync {
    fn request_reboot(&self) -> Result<(), RebootRequestError>;
}

pub struct RebootOrchestrator {
    launcher: Arc<dyn ProcessLauncher>,
    session: DesktopSession,
    paths: CommandPaths,
}

impl RebootOrchestrator {
    pub fn new(
        launcher: Arc<dyn ProcessLauncher>,
        session: DesktopSession,
        paths: CommandPaths,
    ) -> Self {
        Self {
            launcher,
            session,
            paths,
        }
    }

    /// Command for the current session
    pub fn invocation(&self) -> Invocation {
        match self.session {
            DesktopSession::Kde => Invocation::new("qdbus").args([
                "org.kde.ksmserver",
                "/KSMServer",
                "logout",
                "1",
                "1",
                "3",
            ]),
            DesktopSession::Gnome => Invocation::new("gnome-session-quit").arg("--reboot"),
            DesktopSession::Other(_) => Invocation::new(&self.paths.pkexec).arg("reboot"),
        }
    }
}

impl RebootRequester for RebootOrchestrator {
    fn request_reboot(&self) -> Result<(), RebootRequestError> {
        let invocation = self.invocation();
        tracing::info!("Requesting reboot for {:?} session: {}", self.session, invocation);
        self.launcher.run(&invocation)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::testing::{Outcome, RecordingLauncher};
    use std::path::PathBuf;

    fn orchestrator(identifier: &str, launcher: Arc<RecordingLauncher>) -> RebootOrchestrator {
        let paths = CommandPaths {
            pkexec: PathBuf::from("/usr/bin/pkexec"),
            bless: PathBuf::from("/usr/bin/asahi-bless"),
            self_exe: PathBuf::from("/usr/bin/asahi-reboot-switcher"),
        };
        RebootOrchestrator::new(launcher, DesktopSession::from_identifier(identifier), paths)
    }

    #[test]
    fn test_session_parsing_is_exact() {
        assert_eq!(DesktopSession::from_identifier("KDE"), DesktopSession::Kde);
        assert_eq!(DesktopSession::from_identifier("GNOME"), DesktopSession::Gnome);
        assert_eq!(
            DesktopSession::from_identifier("ubuntu:GNOME"),
            DesktopSession::Other("ubuntu:GNOME".to_string())
        );
    }

    #[test]
    fn test_kde_uses_ksmserver_logout() {
        let launcher = Arc::new(RecordingLauncher::default());
        orchestrator("KDE", launcher.clone()).request_reboot().unwrap();

        let calls = launcher.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, PathBuf::from("qdbus"));
        assert_eq!(
            calls[0].args,
            vec!["org.kde.ksmserver", "/KSMServer", "logout", "1", "1", "3"]
        );
    }

    #[test]
    fn test_gnome_uses_session_quit() {
        let launcher = Arc::new(RecordingLauncher::default());
        orchestrator("GNOME", launcher.clone()).request_reboot().unwrap();

        let calls = launcher.calls();
        assert_eq!(calls[0].program, PathBuf::from("gnome-session-quit"));
        assert_eq!(calls[0].args, vec!["--reboot"]);
    }

    #[test]
    fn test_unknown_and_empty_sessions_fall_back() {
        for identifier in ["XFCE", ""] {
            let launcher = Arc::new(RecordingLauncher::default());
            orchestrator(identifier, launcher.clone()).request_reboot().unwrap();

            let calls = launcher.calls();
            assert_eq!(calls[0].program, PathBuf::from("/usr/bin/pkexec"));
            assert_eq!(calls[0].args, vec!["reboot"]);
        }
    }

    #[test]
    fn test_failure_does_not_cascade() {
        let launcher = Arc::new(RecordingLauncher::with_outcomes(vec![Outcome::LaunchFails]));
        let result = orchestrator("KDE", launcher.clone()).request_reboot();

        assert!(result.is_err());
        assert_eq!(launcher.calls().len(), 1);
    }
}
