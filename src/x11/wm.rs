//! Window manager identification
//!
//! Resolves the running window manager once at startup and keeps all
//! per-WM compatibility knowledge in a single quirk table, instead of
//! scattering identity comparisons through the protocol code.

use anyhow::Result;
use tracing::{debug, info};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;

use crate::x11::atoms::Atoms;

/// Known window managers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowManagerKind {
    Compiz,
    Enlightenment,
    Fluxbox,
    I3,
    Kwin,
    Mutter,
    Openbox,
    Xfwm4,
    Unknown,
}

/// Per-WM behavior differences, resolved once from the identity
#[derive(Debug, Clone, Copy)]
pub struct WmQuirks {
    /// Honors the start/end bounds of _NET_WM_STRUT_PARTIAL when picking
    /// which windows to push aside
    pub strut_cutout: bool,
    /// Only ever inspects top/bottom struts; vertical reservations are
    /// ignored no matter the window shape
    pub horizontal_struts_only: bool,
    /// Requires WithdrawnState on dock/panel windows to slot them; other
    /// WMs would ignore a withdrawn window entirely
    pub dock_needs_withdrawn: bool,
    /// Does not honor strut hints at all
    pub no_strut_support: bool,
}

impl WindowManagerKind {
    /// Classify a _NET_WM_NAME string
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("compiz") {
            WindowManagerKind::Compiz
        } else if lower.contains("enlightenment") {
            WindowManagerKind::Enlightenment
        } else if lower.contains("fluxbox") {
            WindowManagerKind::Fluxbox
        } else if lower.contains("i3") {
            WindowManagerKind::I3
        } else if lower.contains("kwin") {
            WindowManagerKind::Kwin
        } else if lower.contains("mutter") || lower.contains("gnome shell") {
            WindowManagerKind::Mutter
        } else if lower.contains("openbox") {
            WindowManagerKind::Openbox
        } else if lower.contains("xfwm") {
            WindowManagerKind::Xfwm4
        } else {
            WindowManagerKind::Unknown
        }
    }

    /// The quirk table
    pub fn quirks(&self) -> WmQuirks {
        WmQuirks {
            strut_cutout: matches!(
                self,
                WindowManagerKind::Compiz
                    | WindowManagerKind::Fluxbox
                    | WindowManagerKind::I3
                    | WindowManagerKind::Kwin
            ),
            horizontal_struts_only: matches!(self, WindowManagerKind::I3),
            dock_needs_withdrawn: matches!(self, WindowManagerKind::Fluxbox),
            no_strut_support: matches!(self, WindowManagerKind::Enlightenment),
        }
    }
}

/// Resolved window manager identity, read-only for the process lifetime
#[derive(Debug, Clone)]
pub struct WindowManager {
    pub kind: WindowManagerKind,
    pub name: String,
}

impl WindowManager {
    /// Detect the running WM via _NET_SUPPORTING_WM_CHECK.
    ///
    /// The root property names a child window owned by the WM; that
    /// window's _NET_WM_NAME carries the WM's name. Any failure along the
    /// chain yields Unknown.
    pub fn detect<C: Connection>(conn: &C, atoms: &Atoms, root: Window) -> Result<Self> {
        let check_win = conn
            .get_property(
                false,
                root,
                atoms.net_supporting_wm_check,
                AtomEnum::WINDOW,
                0,
                1,
            )?
            .reply()
            .ok()
            .and_then(|r| r.value32().and_then(|mut v| v.next()));

        let name = match check_win {
            Some(win) if win != 0 => conn
                .get_property(false, win, atoms.net_wm_name, atoms.utf8_string, 0, 256)?
                .reply()
                .ok()
                .filter(|r| r.format == 8 && r.value_len > 0)
                .map(|r| String::from_utf8_lossy(&r.value).into_owned()),
            _ => None,
        };

        let wm = match name {
            Some(name) => {
                let kind = WindowManagerKind::from_name(&name);
                info!("window manager: {} ({:?})", name, kind);
                WindowManager { kind, name }
            }
            None => {
                debug!("no _NET_SUPPORTING_WM_CHECK owner; window manager unknown");
                WindowManager {
                    kind: WindowManagerKind::Unknown,
                    name: String::new(),
                }
            }
        };

        Ok(wm)
    }

    pub fn quirks(&self) -> WmQuirks {
        self.kind.quirks()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_wm_names() {
        assert_eq!(WindowManagerKind::from_name("Fluxbox"), WindowManagerKind::Fluxbox);
        assert_eq!(WindowManagerKind::from_name("i3"), WindowManagerKind::I3);
        assert_eq!(WindowManagerKind::from_name("KWin"), WindowManagerKind::Kwin);
        assert_eq!(WindowManagerKind::from_name("GNOME Shell"), WindowManagerKind::Mutter);
        assert_eq!(WindowManagerKind::from_name("Xfwm4"), WindowManagerKind::Xfwm4);
        assert_eq!(WindowManagerKind::from_name("dwm"), WindowManagerKind::Unknown);
    }

    #[test]
    fn cutout_allow_list() {
        for kind in [
            WindowManagerKind::Compiz,
            WindowManagerKind::Fluxbox,
            WindowManagerKind::I3,
            WindowManagerKind::Kwin,
        ] {
            assert!(kind.quirks().strut_cutout, "{:?}", kind);
        }
        assert!(!WindowManagerKind::Openbox.quirks().strut_cutout);
        assert!(!WindowManagerKind::Unknown.quirks().strut_cutout);
    }

    #[test]
    fn i3_only_inspects_horizontal_struts() {
        assert!(WindowManagerKind::I3.quirks().horizontal_struts_only);
        assert!(!WindowManagerKind::Kwin.quirks().horizontal_struts_only);
    }

    #[test]
    fn fluxbox_is_the_only_withdrawn_dock_wm() {
        for kind in [
            WindowManagerKind::Compiz,
            WindowManagerKind::Enlightenment,
            WindowManagerKind::I3,
            WindowManagerKind::Kwin,
            WindowManagerKind::Mutter,
            WindowManagerKind::Openbox,
            WindowManagerKind::Xfwm4,
            WindowManagerKind::Unknown,
        ] {
            assert!(!kind.quirks().dock_needs_withdrawn, "{:?}", kind);
        }
        assert!(WindowManagerKind::Fluxbox.quirks().dock_needs_withdrawn);
    }

    #[test]
    fn enlightenment_has_no_strut_support() {
        assert!(WindowManagerKind::Enlightenment.quirks().no_strut_support);
        assert!(!WindowManagerKind::Fluxbox.quirks().no_strut_support);
    }
}
