//! Root resource database
//!
//! Snapshot of the RESOURCE_MANAGER property on the root window, reloaded
//! whole when the server signals the property changed. The old snapshot is
//! replaced in a single assignment so readers never observe a half-built
//! database.

use tracing::debug;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;

use crate::x11::atoms::Atoms;

/// Parsed RESOURCE_MANAGER entries
#[derive(Debug, Clone, Default)]
pub struct ResourceDb {
    entries: Vec<(String, String)>,
}

impl ResourceDb {
    /// Fetch and parse the current RESOURCE_MANAGER property. A missing or
    /// unreadable property yields an empty database.
    pub fn load<C: Connection>(conn: &C, atoms: &Atoms, root: Window) -> Self {
        let reply = conn
            .get_property(
                false,
                root,
                atoms.resource_manager,
                AtomEnum::STRING,
                0,
                u32::MAX,
            )
            .ok()
            .and_then(|c| c.reply().ok());

        let Some(reply) = reply else {
            return Self::default();
        };
        if reply.format != 8 || reply.value_len == 0 {
            return Self::default();
        }

        let text = String::from_utf8_lossy(&reply.value);
        let db = Self {
            entries: parse_resources(&text),
        };
        debug!("loaded {} resource entries", db.entries.len());
        db
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Xft.dpi as reported by the session, if set and numeric
    pub fn dpi(&self) -> Option<f64> {
        self.get("Xft.dpi").and_then(|v| v.parse().ok())
    }
}

/// Parse xrdb-style text: one `key: value` pair per line, `!` comments
fn parse_resources(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('!') {
                return None;
            }
            let (key, value) = line.split_once(':')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_xrdb_text() {
        let text = "! comment line\nXft.dpi:\t96\nXft.antialias: 1\n\nbroken line\n";
        let entries = parse_resources(text);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], ("Xft.dpi".to_string(), "96".to_string()));
    }

    #[test]
    fn dpi_accessor() {
        let db = ResourceDb {
            entries: parse_resources("Xft.dpi: 120.5\n"),
        };
        assert_eq!(db.dpi(), Some(120.5));

        let no_dpi = ResourceDb {
            entries: parse_resources("Xft.antialias: 1\n"),
        };
        assert_eq!(no_dpi.dpi(), None);

        let junk = ResourceDb {
            entries: parse_resources("Xft.dpi: not-a-number\n"),
        };
        assert_eq!(junk.dpi(), None);
    }
}
