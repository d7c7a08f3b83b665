//! Tray Session State Machine
//!
//! Owns the volume list and the selected position shown in the tray menu,
//! and reacts to two event sources:
//! - volume selections (menu position of the clicked volume)
//! - commands (reboot into macOS, quit)
//!
//! The session runs as one event loop on its own thread and is the only owner
//! of its state, so a selection can never race a refresh. The tray thread
//! only sees `TrayUpdate` snapshots.
//!
//! Phases: `Uninitialized → Ready → (Selecting | Rebooting) → Ready → … → Terminated`

use crate::confirm::{ConfirmationGate, Prompt};
use crate::reboot::RebootRequester;
use crate::volume::{Volume, VolumeDirectory};
use crossbeam_channel::{never, select, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Commands from the plain (non-volume) menu entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayCommand {
    Reboot,
    Quit,
}

/// One event as processed by the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Menu position of the selected volume
    Select(usize),
    Reboot,
    Quit,
}

impl From<TrayCommand> for SessionEvent {
    fn from(command: TrayCommand) -> Self {
        match command {
            TrayCommand::Reboot => SessionEvent::Reboot,
            TrayCommand::Quit => SessionEvent::Quit,
        }
    }
}

/// Snapshots sent from the session to the tray thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrayUpdate {
    /// Menu labels and the position to check
    Volumes { names: Vec<String>, selected: usize },
    /// Session terminated, tear down the tray
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Ready,
    Selecting,
    Rebooting,
    Terminated,
}

/// Whether `selected` reflects the directory or an unconfirmed user choice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStatus {
    Confirmed,
    /// Optimistically selected; waiting for a successful refresh
    Pending,
}

/// Loop control returned by event handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Terminate,
}

/// Read-through cache of the volume directory
#[derive(Debug, Clone, Default)]
struct SessionState {
    volumes: Vec<Volume>,
    selected: usize,
    pending: Option<usize>,
}

impl SessionState {
    /// Replace the snapshot wholesale and re-derive the selection
    fn apply(&mut self, volumes: Vec<Volume>) {
        self.selected = volumes.iter().position(|v| v.active).unwrap_or(0);
        self.volumes = volumes;

        if let Some(requested) = self.pending.take() {
            if requested == self.selected {
                debug!("Selection #{} confirmed by directory", requested);
            } else {
                warn!(
                    "Selection #{} not reflected by directory, active is #{}",
                    requested, self.selected
                );
            }
        }
    }
}

/// Receiving side of the session's event sources
pub struct SessionEvents {
    selections: Receiver<usize>,
    commands: Receiver<TrayCommand>,
    selections_closed: bool,
    commands_closed: bool,
}

impl SessionEvents {
    pub fn new(selections: Receiver<usize>, commands: Receiver<TrayCommand>) -> Self {
        Self {
            selections,
            commands,
            selections_closed: false,
            commands_closed: false,
        }
    }

    /// Next event, blocking until one arrives.
    ///
    /// Commands already queued are taken before queued selections. When both
    /// arrive while the loop is blocked, the pick between them is arbitrary.
    /// Each source keeps its issue order. Returns `None` once both sources
    /// are disconnected.
    pub fn next_event(&mut self) -> Option<SessionEvent> {
        loop {
            if self.selections_closed && self.commands_closed {
                return None;
            }

            match self.commands.try_recv() {
                Ok(command) => return Some(command.into()),
                Err(TryRecvError::Disconnected) => {
                    self.close_commands();
                    continue;
                }
                Err(TryRecvError::Empty) => {}
            }

            match self.selections.try_recv() {
                Ok(position) => return Some(SessionEvent::Select(position)),
                Err(TryRecvError::Disconnected) => {
                    self.close_selections();
                    continue;
                }
                Err(TryRecvError::Empty) => {}
            }

            let commands_disconnected = select! {
                recv(self.commands) -> msg => match msg {
                    Ok(command) => return Some(command.into()),
                    Err(_) => true,
                },
                recv(self.selections) -> msg => match msg {
                    Ok(position) => return Some(SessionEvent::Select(position)),
                    Err(_) => false,
                },
            };

            if commands_disconnected {
                self.close_commands();
            } else {
                self.close_selections();
            }
        }
    }

    fn close_commands(&mut self) {
        debug!("Command source disconnected");
        self.commands = never();
        self.commands_closed = true;
    }

    fn close_selections(&mut self) {
        debug!("Selection source disconnected");
        self.selections = never();
        self.selections_closed = true;
    }
}

/// The tray session
pub struct TraySession {
    directory: Arc<dyn VolumeDirectory>,
    gate: Arc<dyn ConfirmationGate>,
    reboot: Arc<dyn RebootRequester>,
    macos_marker: String,
    state: SessionState,
    phase: SessionPhase,
    updates: Option<Sender<TrayUpdate>>,
}

impl TraySession {
    pub fn new(
        directory: Arc<dyn VolumeDirectory>,
        gate: Arc<dyn ConfirmationGate>,
        reboot: Arc<dyn RebootRequester>,
        macos_marker: impl Into<String>,
    ) -> Self {
        Self {
            directory,
            gate,
            reboot,
            macos_marker: macos_marker.into(),
            state: SessionState::default(),
            phase: SessionPhase::Uninitialized,
            updates: None,
        }
    }

    /// Publish a `TrayUpdate` after every refresh and on termination
    pub fn with_updates(mut self, updates: Sender<TrayUpdate>) -> Self {
        self.updates = Some(updates);
        self
    }

    pub fn volumes(&self) -> &[Volume] {
        &self.state.volumes
    }

    pub fn selected(&self) -> usize {
        self.state.selected
    }

    pub fn selection_status(&self) -> SelectionStatus {
        if self.state.pending.is_some() {
            SelectionStatus::Pending
        } else {
            SelectionStatus::Confirmed
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// First load of the volume list
    pub fn initialize(&mut self) {
        self.refresh();
        self.phase = SessionPhase::Ready;
        info!(
            "Session ready with {} volumes, selected #{}",
            self.state.volumes.len(),
            self.state.selected
        );
    }

    /// Re-query the directory. A failed query keeps the previous snapshot.
    pub fn refresh(&mut self) {
        match self.directory.list_volumes() {
            Ok(volumes) => self.state.apply(volumes),
            Err(e) => error!("Failed to load volumes: {}", e),
        }
        self.publish();
    }

    /// Run until quit is confirmed or every event source disconnects
    pub fn run(&mut self, events: &mut SessionEvents) {
        if self.phase == SessionPhase::Uninitialized {
            self.initialize();
        }

        while let Some(event) = events.next_event() {
            if self.handle(event) == Flow::Terminate {
                break;
            }
        }

        if self.phase != SessionPhase::Terminated {
            info!("Event sources closed, ending session");
            self.terminate();
        }
    }

    pub fn handle(&mut self, event: SessionEvent) -> Flow {
        debug!("Handling {:?}", event);
        match event {
            SessionEvent::Select(position) => {
                self.handle_selection(position);
                Flow::Continue
            }
            SessionEvent::Reboot => {
                self.handle_reboot();
                Flow::Continue
            }
            SessionEvent::Quit => self.handle_quit(),
        }
    }

    /// User picked the volume at `position` in the menu
    pub fn handle_selection(&mut self, position: usize) {
        if position != self.state.selected {
            match self.state.volumes.get(position) {
                Some(volume) => {
                    let name = volume.short_name().to_string();
                    self.phase = SessionPhase::Selecting;
                    self.change_boot_default(position, &name);
                }
                None => warn!(
                    "Ignoring selection #{} outside of {} volumes",
                    position,
                    self.state.volumes.len()
                ),
            }
        }

        self.refresh();
        self.phase = SessionPhase::Ready;
    }

    fn change_boot_default(&mut self, position: usize, name: &str) {
        let prompt = Prompt::question(format!("Change default startup disk to {}?", name))
            .title("Confirm startup disk change")
            .ok_button("Change");

        if !self.gate.ask(&prompt) {
            info!("Startup disk change to {} cancelled", name);
            return;
        }

        if let Err(e) = self.directory.set_boot_default(position + 1) {
            error!("Failed to set boot volume: {}", e);
        }
        self.state.selected = position;
        self.state.pending = Some(position);
    }

    /// macOS counts as active when the active volume's name carries the marker
    pub fn is_macos_active(&self) -> bool {
        self.state
            .volumes
            .iter()
            .any(|v| v.active && v.short_name().contains(&self.macos_marker))
    }

    pub fn handle_reboot(&mut self) {
        self.phase = SessionPhase::Rebooting;
        if self.state.volumes.is_empty() {
            // Startup listing failed; macOS detection needs the volumes
            self.refresh();
        }
        self.reboot_to_macos();
        self.phase = SessionPhase::Ready;
    }

    fn reboot_to_macos(&self) {
        if self.is_macos_active() {
            info!("macOS is already active, rebooting...");
        } else {
            info!("macOS is not active, setting next boot override...");
            if let Err(e) = self.directory.set_boot_next_macos(true) {
                error!("{}", e);
                return;
            }
        }

        if let Err(e) = self.reboot.request_reboot() {
            error!("Failed to reboot to macOS: {}", e);
        }
    }

    pub fn handle_quit(&mut self) -> Flow {
        let prompt = Prompt::question("Quit Restart in macOS tray icon?")
            .title("Confirm quitting")
            .ok_button("Quit");

        if self.gate.ask(&prompt) {
            info!("Quit");
            self.terminate();
            Flow::Terminate
        } else {
            Flow::Continue
        }
    }

    fn terminate(&mut self) {
        self.phase = SessionPhase::Terminated;
        if let Some(updates) = &self.updates {
            let _ = updates.send(TrayUpdate::Shutdown);
        }
    }

    fn publish(&self) {
        if let Some(updates) = &self.updates {
            let names = self
                .state
                .volumes
                .iter()
                .map(|v| v.short_name().to_string())
                .collect();
            let _ = updates.send(TrayUpdate::Volumes {
                names,
                selected: self.state.selected,
            });
        }
    }
}
