//! Configuration system for Vigil
//!
//! Loads configuration from TOML file at `~/.config/vigil/config.toml`
//! Auto-generates default config file on first run if missing.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// X display to connect to; None uses $DISPLAY
    pub display: Option<String>,
    pub window: WindowConfig,
    pub placement: PlacementConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            display: None,
            window: WindowConfig::default(),
            placement: PlacementConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, or use defaults if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            info!("Config file not found at {:?}, using defaults", config_path);
            if let Err(e) = Self::save_default(&config_path) {
                warn!("Failed to create default config file: {}", e);
            }
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&content)
            .context("Failed to parse config file")?;

        info!("Configuration loaded from {:?}", config_path);
        debug!("Config: {:?}", config);

        Ok(config)
    }

    /// Get the path to the config file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("vigil");

        Ok(config_dir.join("config.toml"))
    }

    /// Save default configuration to file
    fn save_default(path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let default_config = Self::default();
        let toml_string = toml::to_string_pretty(&default_config)
            .context("Failed to serialize default config")?;

        fs::write(path, toml_string)
            .context("Failed to write default config file")?;

        info!("Created default config file at {:?}", path);
        Ok(())
    }
}

/// Overlay window configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Create an own window instead of drawing onto the desktop window
    pub own_window: bool,
    /// Window type: "normal", "desktop", "dock", "panel", "utility", "override"
    pub kind: WindowType,
    /// WM hints: any of "undecorated", "below", "above", "sticky",
    /// "skip_taskbar", "skip_pager"
    pub hints: Vec<String>,
    /// Window title
    pub title: String,
    /// WM_CLASS name and class
    pub class: String,
    /// Request a 32-bit ARGB visual for true transparency
    pub argb_visual: bool,
    /// Background alpha when an ARGB visual is in use (0 = fully transparent)
    pub argb_value: u8,
    /// Pseudo-transparency: inherit the parent's background
    pub transparent: bool,
    /// Background color (hex: 0xRRGGBB)
    pub background_colour: u32,
    /// Border width in pixels
    pub border_width: u16,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            own_window: true,
            kind: WindowType::Normal,
            hints: vec![
                "undecorated".to_string(),
                "below".to_string(),
                "sticky".to_string(),
                "skip_taskbar".to_string(),
                "skip_pager".to_string(),
            ],
            title: "vigil".to_string(),
            class: "Vigil".to_string(),
            argb_visual: false,
            argb_value: 255,
            transparent: true,
            background_colour: 0x000000,
            border_width: 1,
        }
    }
}

/// Overlay window type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowType {
    Normal,
    Desktop,
    Dock,
    Panel,
    Utility,
    /// override-redirect: bypasses WM decoration and management entirely
    Override,
}

impl WindowType {
    /// Whether windows of this type are managed by the window manager
    pub fn is_managed(&self) -> bool {
        !matches!(self, WindowType::Override)
    }
}

/// Placement configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementConfig {
    /// Text/window alignment within the workarea
    pub alignment: Alignment,
    /// Monitor head to restrict the workarea to (RandR index)
    pub head_index: Option<usize>,
    /// Window width in pixels
    pub width: u32,
    /// Window height in pixels
    pub height: u32,
    /// Horizontal gap from the aligned edge
    pub gap_x: i32,
    /// Vertical gap from the aligned edge
    pub gap_y: i32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            alignment: Alignment::TopLeft,
            head_index: None,
            width: 320,
            height: 480,
            gap_x: 12,
            gap_y: 12,
        }
    }
}

/// Window alignment within the workarea
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    TopLeft,
    TopMiddle,
    TopRight,
    MiddleLeft,
    MiddleMiddle,
    MiddleRight,
    BottomLeft,
    BottomMiddle,
    BottomRight,
    /// No automatic placement
    None,
}

impl Alignment {
    /// Whether the window is anchored to at least one screen edge.
    /// Middle/none alignments float and cannot reserve edge space.
    pub fn is_edge_anchored(&self) -> bool {
        !matches!(self, Alignment::MiddleMiddle | Alignment::None)
    }

    pub fn is_left(&self) -> bool {
        matches!(
            self,
            Alignment::TopLeft | Alignment::MiddleLeft | Alignment::BottomLeft
        )
    }

    pub fn is_right(&self) -> bool {
        matches!(
            self,
            Alignment::TopRight | Alignment::MiddleRight | Alignment::BottomRight
        )
    }

    pub fn is_top(&self) -> bool {
        matches!(
            self,
            Alignment::TopLeft | Alignment::TopMiddle | Alignment::TopRight
        )
    }

    pub fn is_bottom(&self) -> bool {
        matches!(
            self,
            Alignment::BottomLeft | Alignment::BottomMiddle | Alignment::BottomRight
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrips_through_toml() {
        let config = Config::default();
        let s = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&s).unwrap();
        assert_eq!(back.window.kind, WindowType::Normal);
        assert_eq!(back.placement.alignment, Alignment::TopLeft);
        assert!(back.window.own_window);
    }

    #[test]
    fn middle_middle_is_not_edge_anchored() {
        assert!(!Alignment::MiddleMiddle.is_edge_anchored());
        assert!(!Alignment::None.is_edge_anchored());
        assert!(Alignment::TopMiddle.is_edge_anchored());
        assert!(Alignment::BottomRight.is_edge_anchored());
    }
}
