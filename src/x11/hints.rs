//! Window hints
//!
//! The requested-hints bitmask and the property writes that publish it:
//! Motif decoration hints, legacy _WIN_LAYER plus modern _NET_WM_STATE
//! stacking, sticky, and taskbar/pager skipping.

use anyhow::Result;
use bitflags::bitflags;
use tracing::{debug, warn};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;
use x11rb::wrapper::ConnectionExt as _;

use crate::config::WindowType;
use crate::x11::atoms::Atoms;
use crate::x11::wm::WmQuirks;

// ICCCM WM_HINTS initial_state values
pub const WITHDRAWN_STATE: u32 = 0;
pub const NORMAL_STATE: u32 = 1;

// WM_HINTS flag bits
pub const INPUT_HINT: u32 = 1 << 0;
pub const STATE_HINT: u32 = 1 << 1;

// _WIN_LAYER values
const WIN_LAYER_BELOW: u32 = 0;
const WIN_LAYER_ABOVE: u32 = 6;

bitflags! {
    /// Requested window-manager hints
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WindowHints: u16 {
        const UNDECORATED  = 1 << 0;
        const BELOW        = 1 << 1;
        const ABOVE        = 1 << 2;
        const STICKY       = 1 << 3;
        const SKIP_TASKBAR = 1 << 4;
        const SKIP_PAGER   = 1 << 5;
    }
}

impl WindowHints {
    /// Parse configured hint names; unknown names are logged and skipped
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let mut hints = WindowHints::empty();
        for name in names {
            match name.as_ref() {
                "undecorated" => hints |= WindowHints::UNDECORATED,
                "below" => hints |= WindowHints::BELOW,
                "above" => hints |= WindowHints::ABOVE,
                "sticky" => hints |= WindowHints::STICKY,
                "skip_taskbar" => hints |= WindowHints::SKIP_TASKBAR,
                "skip_pager" => hints |= WindowHints::SKIP_PAGER,
                other => warn!("unknown window hint {:?}, ignoring", other),
            }
        }
        hints
    }
}

/// ICCCM initial state for a freshly created window.
///
/// Docks and panels must start withdrawn for Fluxbox to move them into the
/// slit, but most other WMs explicitly ignore withdrawn windows, so the
/// state is keyed on the detected WM.
pub fn initial_wm_state(kind: WindowType, quirks: &WmQuirks) -> u32 {
    if matches!(kind, WindowType::Dock | WindowType::Panel) && quirks.dock_needs_withdrawn {
        WITHDRAWN_STATE
    } else {
        NORMAL_STATE
    }
}

/// The _NET_WM_WINDOW_TYPE atom for a window type. Panel shares the dock
/// type on the wire.
pub fn window_type_atom(atoms: &Atoms, kind: WindowType) -> Option<Atom> {
    match kind {
        WindowType::Desktop => Some(atoms.net_wm_window_type_desktop),
        WindowType::Dock | WindowType::Panel => Some(atoms.net_wm_window_type_dock),
        WindowType::Utility => Some(atoms.net_wm_window_type_utility),
        WindowType::Normal => Some(atoms.net_wm_window_type_normal),
        WindowType::Override => None,
    }
}

/// The _NET_WM_STATE atoms implied by a hints mask
pub fn state_atoms(atoms: &Atoms, hints: WindowHints) -> Vec<Atom> {
    let mut states = Vec::new();
    if hints.contains(WindowHints::BELOW) {
        states.push(atoms.net_wm_state_below);
    }
    if hints.contains(WindowHints::ABOVE) {
        states.push(atoms.net_wm_state_above);
    }
    if hints.contains(WindowHints::STICKY) {
        states.push(atoms.net_wm_state_sticky);
    }
    if hints.contains(WindowHints::SKIP_TASKBAR) {
        states.push(atoms.net_wm_state_skip_taskbar);
    }
    if hints.contains(WindowHints::SKIP_PAGER) {
        states.push(atoms.net_wm_state_skip_pager);
    }
    states
}

/// Publish the requested hints on a WM-managed window
pub fn apply_hints<C: Connection>(
    conn: &C,
    atoms: &Atoms,
    win: Window,
    hints: WindowHints,
) -> Result<()> {
    if hints.contains(WindowHints::UNDECORATED) {
        debug!("hint - undecorated");
        conn.change_property32(
            PropMode::REPLACE,
            win,
            atoms.motif_wm_hints,
            atoms.motif_wm_hints,
            &motif_undecorated(),
        )?;
    }

    // Below/above publish both the legacy layer and the modern state atom
    // so older WMs still honor the stacking request
    if hints.contains(WindowHints::BELOW) {
        debug!("hint - below");
        conn.change_property32(
            PropMode::APPEND,
            win,
            atoms.win_layer,
            AtomEnum::CARDINAL,
            &[WIN_LAYER_BELOW],
        )?;
    }
    if hints.contains(WindowHints::ABOVE) {
        debug!("hint - above");
        conn.change_property32(
            PropMode::APPEND,
            win,
            atoms.win_layer,
            AtomEnum::CARDINAL,
            &[WIN_LAYER_ABOVE],
        )?;
    }

    if hints.contains(WindowHints::STICKY) {
        debug!("hint - sticky");
        // all-desktops membership
        conn.change_property32(
            PropMode::APPEND,
            win,
            atoms.net_wm_desktop,
            AtomEnum::CARDINAL,
            &[0xFFFF_FFFF],
        )?;
    }

    let states = state_atoms(atoms, hints);
    if !states.is_empty() {
        conn.change_property32(
            PropMode::APPEND,
            win,
            atoms.net_wm_state,
            AtomEnum::ATOM,
            &states,
        )?;
    }

    Ok(())
}

/// Motif hints payload requesting no decorations
pub fn motif_undecorated() -> [u32; 5] {
    // flags = MWM_HINTS_DECORATIONS, decorations = 0
    [2, 0, 0, 0, 0]
}
