//! Workarea resolution
//!
//! The usable screen rectangle: the full display by default, narrowed to
//! one RandR monitor's bounds when a head index is configured and valid.

use anyhow::Result;
use tracing::{debug, warn};
use x11rb::connection::Connection;
use x11rb::protocol::randr::ConnectionExt as _;
use x11rb::protocol::xproto::Window;

use crate::geometry::Rect;

/// Compute the workarea for the screen.
///
/// Falls back to the full display silently when RandR is absent or
/// reports no monitors; an out-of-range head index keeps the full display
/// but logs a warning.
pub fn update_workarea<C: Connection>(
    conn: &C,
    root: Window,
    display_width: u16,
    display_height: u16,
    head_index: Option<usize>,
) -> Result<Rect> {
    // default work area is the whole display
    let full = Rect::new(0, 0, display_width as u32, display_height as u32);

    let Some(head) = head_index else {
        return Ok(full);
    };

    if conn
        .extension_information(x11rb::protocol::randr::X11_EXTENSION_NAME)?
        .is_none()
    {
        return Ok(full);
    }

    let monitors = match conn.randr_get_monitors(root, true)?.reply() {
        Ok(reply) => reply.monitors,
        Err(_) => {
            warn!("RandR monitor query failed, ignoring head settings");
            return Ok(full);
        }
    };

    if monitors.is_empty() {
        return Ok(full);
    }

    let Some(mon) = monitors.get(head) else {
        warn!("invalid head index {}, ignoring head settings", head);
        return Ok(full);
    };

    let area = Rect::new(mon.x as i32, mon.y as i32, mon.width as u32, mon.height as u32);
    debug!(
        "workarea fixed to head {}: {} {} {} {}",
        head, area.x, area.y, area.width, area.height
    );
    Ok(area)
}
