/// System tray icon and menu for the reboot switcher
///
/// Menu layout:
/// - Restart in macOS...
/// - ---
/// - Default startup disk: (disabled label)
/// - one check item per volume, exactly one checked
/// - ---
/// - Quit
///
/// Lives on the GTK thread. Menu clicks are forwarded to the session over
/// channels and the check marks are only ever set from `TrayUpdate`s, so the
/// menu mirrors the session instead of its own click state.
use crate::session::{TrayCommand, TrayUpdate};
use anyhow::{anyhow, Result};
use crossbeam_channel::{Receiver, Sender};
use std::path::Path;
use tray_icon::menu::{CheckMenuItem, Menu, MenuEvent, MenuId, MenuItem, PredefinedMenuItem};
use tray_icon::{Icon, TrayIcon, TrayIconBuilder};

const ICON_SIZE: u32 = 32;
const TOOLTIP: &str = "Restart in macOS (tray icon)";
/// Position of the first volume item in the menu
const FIRST_VOLUME_POSITION: usize = 3;

/// Load the tray icon from a PNG, falling back to a generated one
pub fn load_app_icon(path: Option<&Path>) -> Result<Icon> {
    if let Some(path) = path.filter(|p| p.exists()) {
        match decode_icon(path) {
            Ok(icon) => return Ok(icon),
            Err(e) => tracing::warn!("Falling back to built-in icon: {}", e),
        }
    }

    // Fallback: dark grey square
    let icon_rgba: Vec<u8> = (0..ICON_SIZE * ICON_SIZE)
        .flat_map(|_| [0x30, 0x30, 0x30, 0xFF])
        .collect();
    Icon::from_rgba(icon_rgba, ICON_SIZE, ICON_SIZE)
        .map_err(|e| anyhow!("Failed to create fallback icon: {:?}", e))
}

fn decode_icon(path: &Path) -> Result<Icon> {
    let icon_data =
        std::fs::read(path).map_err(|e| anyhow!("Failed to read {:?}: {}", path, e))?;

    let img = image::load_from_memory(&icon_data)
        .map_err(|e| anyhow!("Failed to decode icon: {}", e))?;

    let img = img.resize_exact(ICON_SIZE, ICON_SIZE, image::imageops::FilterType::Lanczos3);
    let rgba = img.to_rgba8();

    Icon::from_rgba(rgba.into_raw(), ICON_SIZE, ICON_SIZE)
        .map_err(|e| anyhow!("Failed to create icon from image: {:?}", e))
}

/// What a menu click means for the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    /// Volume at this menu position
    Volume(usize),
    Command(TrayCommand),
}

/// Menu item ids mapped to actions
#[derive(Debug, Clone)]
pub struct MenuRoutes {
    pub reboot: MenuId,
    pub quit: MenuId,
    pub volumes: Vec<MenuId>,
}

impl MenuRoutes {
    pub fn route(&self, id: &MenuId) -> Option<MenuAction> {
        if *id == self.reboot {
            return Some(MenuAction::Command(TrayCommand::Reboot));
        }
        if *id == self.quit {
            return Some(MenuAction::Command(TrayCommand::Quit));
        }
        self.volumes
            .iter()
            .position(|v| v == id)
            .map(MenuAction::Volume)
    }
}

/// Tray icon with the volume menu
pub struct TrayIconManager {
    #[allow(dead_code)]
    tray_icon: TrayIcon,
    menu: Menu,
    volume_items: Vec<CheckMenuItem>,
    volume_names: Vec<String>,
    routes: MenuRoutes,
}

impl TrayIconManager {
    /// Create the tray icon with an empty volume list
    pub fn new(icon: Icon) -> Result<Self> {
        tracing::info!("Creating tray icon");

        let menu = Menu::new();
        let reboot_item = MenuItem::new("Restart in macOS...", true, None);
        let label_item = MenuItem::new("Default startup disk:", false, None);
        let quit_item = MenuItem::new("Quit", true, None);

        menu.append(&reboot_item)
            .map_err(|e| anyhow!("Failed to add reboot item: {}", e))?;
        menu.append(&PredefinedMenuItem::separator())
            .map_err(|e| anyhow!("Failed to add separator: {}", e))?;
        menu.append(&label_item)
            .map_err(|e| anyhow!("Failed to add label item: {}", e))?;
        menu.append(&PredefinedMenuItem::separator())
            .map_err(|e| anyhow!("Failed to add separator: {}", e))?;
        menu.append(&quit_item)
            .map_err(|e| anyhow!("Failed to add quit item: {}", e))?;

        let routes = MenuRoutes {
            reboot: reboot_item.id().clone(),
            quit: quit_item.id().clone(),
            volumes: Vec::new(),
        };

        let tray_icon = TrayIconBuilder::new()
            .with_tooltip(TOOLTIP)
            .with_icon(icon)
            .with_menu(Box::new(menu.clone()))
            .build()
            .map_err(|e| anyhow!("Failed to create tray icon: {}", e))?;

        tracing::info!("Tray icon created successfully with context menu");

        Ok(Self {
            tray_icon,
            menu,
            volume_items: Vec::new(),
            volume_names: Vec::new(),
            routes,
        })
    }

    /// Rebuild the volume items if the names changed, then check `selected`
    pub fn set_volumes(&mut self, names: &[String], selected: usize) -> Result<()> {
        if names != self.volume_names.as_slice() {
            for item in self.volume_items.drain(..) {
                self.menu
                    .remove(&item)
                    .map_err(|e| anyhow!("Failed to remove volume item: {}", e))?;
            }

            for (i, name) in names.iter().enumerate() {
                let item = CheckMenuItem::new(name, true, false, None);
                self.menu
                    .insert(&item, FIRST_VOLUME_POSITION + i)
                    .map_err(|e| anyhow!("Failed to add volume item {}: {}", name, e))?;
                self.volume_items.push(item);
            }

            self.routes.volumes = self.volume_items.iter().map(|i| i.id().clone()).collect();
            self.volume_names = names.to_vec();
            tracing::debug!("Volume menu rebuilt with {} entries", names.len());
        }

        for (i, item) in self.volume_items.iter().enumerate() {
            item.set_checked(i == selected);
        }
        Ok(())
    }

    /// Forward pending menu clicks and apply pending session updates.
    /// Returns `false` once the session asked the tray to shut down.
    pub fn pump(
        &mut self,
        selections: &Sender<usize>,
        commands: &Sender<TrayCommand>,
        updates: &Receiver<TrayUpdate>,
    ) -> bool {
        while let Ok(event) = MenuEvent::receiver().try_recv() {
            match self.routes.route(&event.id) {
                Some(MenuAction::Volume(position)) => {
                    tracing::debug!("Volume #{} clicked", position);
                    let _ = selections.send(position);
                }
                Some(MenuAction::Command(command)) => {
                    tracing::info!("{:?} menu clicked", command);
                    let _ = commands.send(command);
                }
                None => tracing::debug!("Unrouted menu event: {:?}", event.id),
            }
        }

        while let Ok(update) = updates.try_recv() {
            match update {
                TrayUpdate::Volumes { names, selected } => {
                    if let Err(e) = self.set_volumes(&names, selected) {
                        tracing::error!("Failed to update volume menu: {}", e);
                    }
                }
                TrayUpdate::Shutdown => return false,
            }
        }
        true
    }
}
