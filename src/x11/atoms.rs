//! Atom interning
//!
//! All atoms the overlay touches, interned once at connection setup.

use anyhow::Result;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;

/// Holds all interned atoms
#[derive(Debug)]
pub struct Atoms {
    // Desktop introspection
    pub net_current_desktop: Atom,
    pub net_number_of_desktops: Atom,
    pub net_desktop_names: Atom,
    pub net_virtual_roots: Atom,
    // Window stack queries
    pub net_client_list: Atom,
    pub net_client_list_stacking: Atom,
    // WM identification
    pub net_supporting_wm_check: Atom,
    pub net_wm_name: Atom,
    pub utf8_string: Atom,
    // Window type
    pub net_wm_window_type: Atom,
    pub net_wm_window_type_desktop: Atom,
    pub net_wm_window_type_dock: Atom,
    pub net_wm_window_type_utility: Atom,
    pub net_wm_window_type_normal: Atom,
    // Window state
    pub net_wm_state: Atom,
    pub net_wm_state_below: Atom,
    pub net_wm_state_above: Atom,
    pub net_wm_state_sticky: Atom,
    pub net_wm_state_skip_taskbar: Atom,
    pub net_wm_state_skip_pager: Atom,
    pub net_wm_desktop: Atom,
    // Decoration and stacking hints
    pub motif_wm_hints: Atom,
    pub win_layer: Atom,
    // Struts
    pub net_wm_strut: Atom,
    pub net_wm_strut_partial: Atom,
    // ICCCM
    pub wm_protocols: Atom,
    pub wm_hints: Atom,
    // Resource database
    pub resource_manager: Atom,
}

impl Atoms {
    /// Intern all required atoms
    pub fn new<C: Connection>(conn: &C) -> Result<Self> {
        // Helper to intern a single atom
        let intern = |name: &str| -> Result<Atom> {
            Ok(conn.intern_atom(false, name.as_bytes())?.reply()?.atom)
        };

        Ok(Self {
            net_current_desktop: intern("_NET_CURRENT_DESKTOP")?,
            net_number_of_desktops: intern("_NET_NUMBER_OF_DESKTOPS")?,
            net_desktop_names: intern("_NET_DESKTOP_NAMES")?,
            net_virtual_roots: intern("_NET_VIRTUAL_ROOTS")?,
            net_client_list: intern("_NET_CLIENT_LIST")?,
            net_client_list_stacking: intern("_NET_CLIENT_LIST_STACKING")?,
            net_supporting_wm_check: intern("_NET_SUPPORTING_WM_CHECK")?,
            net_wm_name: intern("_NET_WM_NAME")?,
            utf8_string: intern("UTF8_STRING")?,
            net_wm_window_type: intern("_NET_WM_WINDOW_TYPE")?,
            net_wm_window_type_desktop: intern("_NET_WM_WINDOW_TYPE_DESKTOP")?,
            net_wm_window_type_dock: intern("_NET_WM_WINDOW_TYPE_DOCK")?,
            net_wm_window_type_utility: intern("_NET_WM_WINDOW_TYPE_UTILITY")?,
            net_wm_window_type_normal: intern("_NET_WM_WINDOW_TYPE_NORMAL")?,
            net_wm_state: intern("_NET_WM_STATE")?,
            net_wm_state_below: intern("_NET_WM_STATE_BELOW")?,
            net_wm_state_above: intern("_NET_WM_STATE_ABOVE")?,
            net_wm_state_sticky: intern("_NET_WM_STATE_STICKY")?,
            net_wm_state_skip_taskbar: intern("_NET_WM_STATE_SKIP_TASKBAR")?,
            net_wm_state_skip_pager: intern("_NET_WM_STATE_SKIP_PAGER")?,
            net_wm_desktop: intern("_NET_WM_DESKTOP")?,
            motif_wm_hints: intern("_MOTIF_WM_HINTS")?,
            win_layer: intern("_WIN_LAYER")?,
            net_wm_strut: intern("_NET_WM_STRUT")?,
            net_wm_strut_partial: intern("_NET_WM_STRUT_PARTIAL")?,
            wm_protocols: intern("WM_PROTOCOLS")?,
            wm_hints: intern("WM_HINTS")?,
            resource_manager: intern("RESOURCE_MANAGER")?,
        })
    }
}
