//! Desktop introspection
//!
//! Caches current desktop, desktop count, and desktop names from the root
//! window, refreshed selectively when the server signals a property change.
//! A failed fetch leaves the previous cached value in place.

use anyhow::Result;
use tracing::debug;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;

use crate::x11::atoms::Atoms;

/// Cached desktop state
#[derive(Debug, Clone, Default)]
pub struct DesktopInfo {
    /// Current desktop, 1-based
    pub current: u32,
    /// Total number of desktops
    pub count: u32,
    /// Raw _NET_DESKTOP_NAMES blob: UTF-8 strings separated by NUL bytes
    pub all_names: Vec<u8>,
    /// Resolved name of the current desktop
    pub name: String,
}

/// Extract the nth (1-based) NUL-delimited name from a names blob.
/// Returns None when n is zero or past the delimited count.
pub fn nth_name(blob: &[u8], n: u32) -> Option<String> {
    if n == 0 {
        return None;
    }
    // A trailing NUL produces one empty slice past the last real name;
    // treat it as out of range.
    blob.split(|&b| b == 0)
        .nth(n as usize - 1)
        .filter(|s| !s.is_empty())
        .map(|s| String::from_utf8_lossy(s).into_owned())
}

impl DesktopInfo {
    /// Refresh cached values.
    ///
    /// `changed` carries the atom from a PropertyNotify so only the
    /// affected value is re-fetched; None means first-time initialization,
    /// which fetches everything and additionally makes sure the root
    /// window delivers property-change notifications to us (added to the
    /// existing mask so other listeners keep theirs).
    pub fn refresh<C: Connection>(
        &mut self,
        conn: &C,
        atoms: &Atoms,
        root: Window,
        changed: Option<Atom>,
    ) -> Result<()> {
        match changed {
            None => {
                self.fetch_current(conn, atoms, root);
                self.fetch_count(conn, atoms, root);
                self.fetch_names(conn, atoms, root);
                self.resolve_name();
                self.subscribe(conn, root)?;
            }
            Some(atom) if atom == atoms.net_current_desktop => {
                self.fetch_current(conn, atoms, root);
                self.resolve_name();
            }
            Some(atom) if atom == atoms.net_number_of_desktops => {
                self.fetch_count(conn, atoms, root);
            }
            Some(atom) if atom == atoms.net_desktop_names => {
                self.fetch_names(conn, atoms, root);
                self.resolve_name();
            }
            Some(_) => {}
        }
        Ok(())
    }

    fn fetch_current<C: Connection>(&mut self, conn: &C, atoms: &Atoms, root: Window) {
        // _NET_CURRENT_DESKTOP is 0-based on the wire
        if let Some(v) = fetch_cardinal(conn, root, atoms.net_current_desktop) {
            self.current = v + 1;
        }
    }

    fn fetch_count<C: Connection>(&mut self, conn: &C, atoms: &Atoms, root: Window) {
        if let Some(v) = fetch_cardinal(conn, root, atoms.net_number_of_desktops) {
            self.count = v;
        }
    }

    fn fetch_names<C: Connection>(&mut self, conn: &C, atoms: &Atoms, root: Window) {
        let reply = conn
            .get_property(
                false,
                root,
                atoms.net_desktop_names,
                atoms.utf8_string,
                0,
                u32::MAX,
            )
            .ok()
            .and_then(|c| c.reply().ok());
        if let Some(reply) = reply {
            if reply.type_ == atoms.utf8_string && reply.format == 8 && reply.value_len > 0 {
                self.all_names = reply.value;
            }
        }
    }

    fn resolve_name(&mut self) {
        if let Some(name) = nth_name(&self.all_names, self.current) {
            self.name = name;
        }
        debug!(
            "desktop {}/{} ({})",
            self.current, self.count, self.name
        );
    }

    /// Set PropertyChangeMask on the root window, if not already set
    fn subscribe<C: Connection>(&self, conn: &C, root: Window) -> Result<()> {
        let attrs = conn.get_window_attributes(root)?.reply()?;
        if !attrs.your_event_mask.contains(EventMask::PROPERTY_CHANGE) {
            conn.change_window_attributes(
                root,
                &ChangeWindowAttributesAux::new()
                    .event_mask(attrs.your_event_mask | EventMask::PROPERTY_CHANGE),
            )?;
        }
        Ok(())
    }
}

/// Read a single 32-bit CARDINAL property; None on any mismatch or failure
pub fn fetch_cardinal<C: Connection>(conn: &C, window: Window, atom: Atom) -> Option<u32> {
    if atom == x11rb::NONE {
        return None;
    }
    let reply = conn
        .get_property(false, window, atom, AtomEnum::CARDINAL, 0, 1)
        .ok()?
        .reply()
        .ok()?;
    if reply.type_ != Atom::from(AtomEnum::CARDINAL) || reply.format != 32 || reply.value_len != 1 {
        return None;
    }
    let value = reply.value32()?.next();
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nth_name_extracts_by_delimiter_count() {
        let blob = b"Work\0Web\0Games\0";
        assert_eq!(nth_name(blob, 1).as_deref(), Some("Work"));
        assert_eq!(nth_name(blob, 2).as_deref(), Some("Web"));
        assert_eq!(nth_name(blob, 3).as_deref(), Some("Games"));
    }

    #[test]
    fn nth_name_out_of_range_leaves_cache_untouched() {
        let blob = b"Work\0Web\0Games\0";
        assert_eq!(nth_name(blob, 4), None);
        assert_eq!(nth_name(blob, 0), None);

        let mut info = DesktopInfo {
            current: 9,
            name: "Games".to_string(),
            all_names: blob.to_vec(),
            ..Default::default()
        };
        info.resolve_name();
        assert_eq!(info.name, "Games");
    }

    #[test]
    fn nth_name_on_empty_blob() {
        assert_eq!(nth_name(b"", 1), None);
        assert_eq!(nth_name(b"", 2), None);
    }

    #[test]
    fn resolve_name_updates_from_blob() {
        let mut info = DesktopInfo {
            current: 2,
            all_names: b"Work\0Web\0Games\0".to_vec(),
            ..Default::default()
        };
        info.resolve_name();
        assert_eq!(info.name, "Web");
    }
}
