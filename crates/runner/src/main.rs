//! asahi-reboot-switcher - System Tray Process
//!
//! This process manages:
//! - System tray icon with the startup disk menu
//! - The tray session thread (volume selection, reboot into macOS, quit)
//! - Argument forwarding to asahi-bless when started with arguments
//!
//! Forwarding mode is how the tray reaches asahi-bless with privileges: the
//! session runs `pkexec <this binary> <args>` and the elevated copy hands the
//! arguments to the trusted asahi-bless path.

use anyhow::{Context, Result};
use crossbeam_channel::unbounded;
use gtk::glib::{self, ControlFlow};
use reboot_switcher_core::{
    config::{self, AppConfig, CommandPaths},
    confirm::DialogGate,
    launcher::{ProcessLauncher, SystemLauncher},
    reboot::{DesktopSession, RebootOrchestrator},
    session::{SessionEvents, TraySession},
    tray_icon::{load_app_icon, TrayIconManager},
    volume::BlessDirectory,
};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries asahi-bless output in forwarding mode
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let Some(user) = uzers::get_user_by_uid(uzers::get_current_uid()) else {
        tracing::error!("Cannot determine the current user, exiting...");
        std::process::exit(1);
    };

    let app_config = config::load_config();
    let paths = CommandPaths::resolve(&app_config)?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    if !args.is_empty() {
        std::process::exit(forward_to_bless(&paths, &args));
    }

    if user.uid() == 0 {
        tracing::error!("Should not run as root, exiting...");
        std::process::exit(1);
    }

    tracing::info!("asahi-reboot-switcher starting as {:?}", user.name());
    run_tray(app_config, paths)
}

/// Run asahi-bless with our arguments and return its exit code
fn forward_to_bless(paths: &CommandPaths, args: &[String]) -> i32 {
    tracing::debug!("Forwarding {:?} to {:?}", args, paths.bless);

    match Command::new(&paths.bless).args(args).status() {
        Ok(status) if status.success() => 0,
        Ok(status) => {
            tracing::error!("asahi-bless failed: {}", status);
            status.code().unwrap_or(1)
        }
        Err(e) => {
            tracing::error!("Failed to run {:?}: {}", paths.bless, e);
            1
        }
    }
}

fn run_tray(app_config: AppConfig, paths: CommandPaths) -> Result<()> {
    gtk::init().context("Failed to initialize GTK")?;

    let launcher: Arc<dyn ProcessLauncher> = Arc::new(SystemLauncher);
    let directory = Arc::new(BlessDirectory::new(launcher.clone(), paths.clone()));
    let session_kind = DesktopSession::from_env();
    tracing::info!("Desktop session: {:?}", session_kind);
    let reboot = Arc::new(RebootOrchestrator::new(launcher, session_kind, paths));

    let (selection_tx, selection_rx) = unbounded();
    let (command_tx, command_rx) = unbounded();
    let (update_tx, update_rx) = unbounded();

    let icon = load_app_icon(app_config.icon_path.as_deref())?;
    let mut tray = TrayIconManager::new(icon).context("Failed to create tray manager")?;

    let mut session = TraySession::new(
        directory,
        Arc::new(DialogGate),
        reboot,
        app_config.macos_marker.clone(),
    )
    .with_updates(update_tx);

    let session_thread = std::thread::Builder::new()
        .name("tray-session".to_string())
        .spawn(move || {
            let mut events = SessionEvents::new(selection_rx, command_rx);
            session.run(&mut events);
        })
        .context("Failed to spawn session thread")?;

    // Menu clicks out, session updates in; both on the GTK thread
    glib::timeout_add_local(
        Duration::from_millis(app_config.update_poll_ms),
        move || {
            if tray.pump(&selection_tx, &command_tx, &update_rx) {
                ControlFlow::Continue
            } else {
                gtk::main_quit();
                ControlFlow::Break
            }
        },
    );

    tracing::info!("Entering GTK main loop");
    gtk::main();

    if session_thread.join().is_err() {
        tracing::error!("Session thread panicked");
    }
    tracing::info!("asahi-reboot-switcher shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn paths(bless: &str) -> CommandPaths {
        CommandPaths {
            pkexec: PathBuf::from("/usr/bin/pkexec"),
            bless: PathBuf::from(bless),
            self_exe: PathBuf::from("/usr/bin/asahi-reboot-switcher"),
        }
    }

    #[test]
    fn test_forward_missing_bless_fails() {
        let code = forward_to_bless(&paths("/nonexistent/asahi-bless"), &["--list-volumes".into()]);
        assert_eq!(code, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_forward_passes_exit_code() {
        assert_eq!(forward_to_bless(&paths("true"), &["--list-volumes".into()]), 0);
        assert_ne!(forward_to_bless(&paths("false"), &[]), 0);
    }
}
