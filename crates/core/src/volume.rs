//! Boot Volume Directory
//!
//! Lists the bootable volumes known to the boot picker and changes the boot
//! configuration. The production directory drives `asahi-bless` through
//! pkexec by re-entering this binary, which forwards its arguments to the
//! trusted `asahi-bless` path.
//!
//! Listing format, one volume per line:
//! - `*1) Macintosh HD` (active volume)
//! - ` 2) Asahi Linux`
//!
//! Other unstarred lines (banners, headers) are skipped.

use crate::config::CommandPaths;
use crate::error::{DirectoryQueryError, DirectoryWriteError};
use crate::launcher::{Invocation, ProcessLauncher};
use std::sync::Arc;

/// One bootable entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    /// 1-based ordinal from the listing, used for boot-default requests
    pub index: usize,
    /// Full label as listed
    pub name: String,
    /// The currently booted volume
    pub active: bool,
}

impl Volume {
    pub fn new(index: usize, name: impl Into<String>, active: bool) -> Self {
        Self {
            index,
            name: name.into(),
            active,
        }
    }

    /// Label shown in the menu: the first name of a comma-separated volume group
    pub fn short_name(&self) -> &str {
        self.name
            .split(',')
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(self.name.trim())
    }
}

/// Source of truth for boot volumes and the boot configuration
pub trait VolumeDirectory: Send + Sync {
    /// Query the current volumes; no side effects
    fn list_volumes(&self) -> Result<Vec<Volume>, DirectoryQueryError>;

    /// Persist a new default boot volume by its 1-based index
    fn set_boot_default(&self, volume_index: usize) -> Result<(), DirectoryWriteError>;

    /// Point the boot configuration at macOS; `next` limits it to the next restart
    fn set_boot_next_macos(&self, next: bool) -> Result<(), DirectoryWriteError>;
}

/// Parse `asahi-bless --list-volumes` output
pub fn parse_volume_listing(output: &str) -> Result<Vec<Volume>, DirectoryQueryError> {
    let mut volumes: Vec<Volume> = Vec::new();

    for (line_no, raw) in output.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        let malformed = || DirectoryQueryError::Malformed {
            line_no: line_no + 1,
            line: raw.to_string(),
        };

        let (active, rest) = match line.strip_prefix('*') {
            Some(rest) => (true, rest.trim_start()),
            None => (false, line),
        };

        // Entries start with `N)`; anything else is banner text unless starred
        let entry = rest
            .split_once(')')
            .filter(|(index, _)| {
                let index = index.trim();
                !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit())
            });
        let Some((index, name)) = entry else {
            if active {
                return Err(malformed());
            }
            tracing::debug!("Skipping non-volume line {}: {:?}", line_no + 1, raw);
            continue;
        };

        let index: usize = index.trim().parse().map_err(|_| malformed())?;
        let name = name.trim();
        if index == 0 || name.is_empty() {
            return Err(malformed());
        }

        if active {
            if let Some(first) = volumes.iter().find(|v| v.active) {
                return Err(DirectoryQueryError::MultipleActive {
                    first: first.index,
                    second: index,
                });
            }
        }

        volumes.push(Volume::new(index, name, active));
    }

    Ok(volumes)
}

/// Volume directory backed by `asahi-bless` under pkexec
pub struct BlessDirectory {
    launcher: Arc<dyn ProcessLauncher>,
    paths: CommandPaths,
}

impl BlessDirectory {
    pub fn new(launcher: Arc<dyn ProcessLauncher>, paths: CommandPaths) -> Self {
        Self { launcher, paths }
    }

    /// `pkexec <self> <args>`; the elevated child forwards `args` to asahi-bless
    fn elevated<I, S>(&self, args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Invocation::new(&self.paths.pkexec)
            .arg(self.paths.self_exe.to_string_lossy())
            .args(args)
    }
}

impl VolumeDirectory for BlessDirectory {
    fn list_volumes(&self) -> Result<Vec<Volume>, DirectoryQueryError> {
        let stdout = self.launcher.capture(&self.elevated(["--list-volumes"]))?;
        let volumes = parse_volume_listing(&stdout)?;
        tracing::debug!("Listed {} volumes", volumes.len());
        Ok(volumes)
    }

    fn set_boot_default(&self, volume_index: usize) -> Result<(), DirectoryWriteError> {
        tracing::info!("Setting default boot volume to #{}", volume_index);
        let invocation =
            self.elevated(["--set-boot".to_string(), volume_index.to_string(), "--yes".to_string()]);
        self.launcher.run(&invocation)?;
        Ok(())
    }

    fn set_boot_next_macos(&self, next: bool) -> Result<(), DirectoryWriteError> {
        let mut args = vec!["--set-boot-macos"];
        if next {
            args.push("--next");
        }
        args.push("--yes");

        tracing::info!("Setting macOS as boot volume (next boot only: {})", next);
        self.launcher.run(&self.elevated(args))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::testing::{Outcome, RecordingLauncher};
    use std::path::PathBuf;

    fn paths() -> CommandPaths {
        CommandPaths {
            pkexec: PathBuf::from("/usr/bin/pkexec"),
            bless: PathBuf::from("/usr/bin/asahi-bless"),
            self_exe: PathBuf::from("/usr/bin/asahi-reboot-switcher"),
        }
    }

    #[test]
    fn test_parse_listing() {
        let volumes = parse_volume_listing("*1) Macintosh HD\n 2) Asahi Linux\n").unwrap();
        assert_eq!(
            volumes,
            vec![
                Volume::new(1, "Macintosh HD", true),
                Volume::new(2, "Asahi Linux", false),
            ]
        );
    }

    #[test]
    fn test_parse_listing_without_active() {
        let volumes = parse_volume_listing("1) Macintosh HD\n\n2) Asahi Linux").unwrap();
        assert_eq!(volumes.len(), 2);
        assert!(volumes.iter().all(|v| !v.active));
    }

    #[test]
    fn test_parse_empty_listing() {
        assert!(parse_volume_listing("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_skips_banner_lines() {
        let output = "Collecting volume information...\n*1) Macintosh HD\n 2) Asahi Linux\n";
        let volumes = parse_volume_listing(output).unwrap();
        assert_eq!(volumes.len(), 2);
        assert!(volumes[0].active);
    }

    #[test]
    fn test_parse_rejects_broken_entries() {
        let err = parse_volume_listing("*1) Macintosh HD\n2)\n").unwrap_err();
        assert!(matches!(err, DirectoryQueryError::Malformed { line_no: 2, .. }));

        let err = parse_volume_listing("0) Macintosh HD").unwrap_err();
        assert!(matches!(err, DirectoryQueryError::Malformed { line_no: 1, .. }));

        let err = parse_volume_listing("* Macintosh HD").unwrap_err();
        assert!(matches!(err, DirectoryQueryError::Malformed { line_no: 1, .. }));
    }

    #[test]
    fn test_parse_rejects_two_active() {
        let err = parse_volume_listing("*1) Macintosh HD\n*2) Asahi Linux").unwrap_err();
        assert!(matches!(
            err,
            DirectoryQueryError::MultipleActive { first: 1, second: 2 }
        ));
    }

    #[test]
    fn test_short_name() {
        let volume = Volume::new(1, "Macintosh HD, Macintosh HD - Data", true);
        assert_eq!(volume.short_name(), "Macintosh HD");
        assert_eq!(Volume::new(2, "Asahi Linux", false).short_name(), "Asahi Linux");
    }

    #[test]
    fn test_list_volumes_runs_elevated() {
        let launcher = Arc::new(RecordingLauncher::with_outcomes(vec![Outcome::Ok(
            " 1) Macintosh HD\n*2) Asahi Linux\n".to_string(),
        )]));
        let directory = BlessDirectory::new(launcher.clone(), paths());

        let volumes = directory.list_volumes().unwrap();
        assert!(volumes[1].active);

        let calls = launcher.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, PathBuf::from("/usr/bin/pkexec"));
        assert_eq!(
            calls[0].args,
            vec!["/usr/bin/asahi-reboot-switcher", "--list-volumes"]
        );
    }

    #[test]
    fn test_list_volumes_launch_failure() {
        let launcher = Arc::new(RecordingLauncher::with_outcomes(vec![Outcome::LaunchFails]));
        let directory = BlessDirectory::new(launcher, paths());

        let err = directory.list_volumes().unwrap_err();
        assert!(matches!(err, DirectoryQueryError::Command(_)));
    }

    #[test]
    fn test_set_boot_default_args() {
        let launcher = Arc::new(RecordingLauncher::default());
        let directory = BlessDirectory::new(launcher.clone(), paths());

        directory.set_boot_default(2).unwrap();
        assert_eq!(
            launcher.calls()[0].args,
            vec!["/usr/bin/asahi-reboot-switcher", "--set-boot", "2", "--yes"]
        );
    }

    #[test]
    fn test_set_boot_next_macos_args() {
        let launcher = Arc::new(RecordingLauncher::default());
        let directory = BlessDirectory::new(launcher.clone(), paths());

        directory.set_boot_next_macos(true).unwrap();
        directory.set_boot_next_macos(false).unwrap();

        let calls = launcher.calls();
        assert_eq!(&calls[0].args[1..], ["--set-boot-macos", "--next", "--yes"]);
        assert_eq!(&calls[1].args[1..], ["--set-boot-macos", "--yes"]);
    }

    #[test]
    fn test_write_failure_is_reported() {
        let launcher = Arc::new(RecordingLauncher::with_outcomes(vec![Outcome::LaunchFails]));
        let directory = BlessDirectory::new(launcher, paths());
        assert!(directory.set_boot_default(1).is_err());
    }
}
