//! Reserved-space (strut) publishing
//!
//! Computes the edge reservation that keeps other windows from being
//! placed over the overlay and publishes it in both the legacy 4-value
//! and modern 12-value property forms.
//!
//! Most WMs simply subtract the primary strut side from the workarea, so
//! picking the wrong side can eat far more screen than the window covers.
//! WMs on the cutout allow-list honor the partial start/end bounds and get
//! an alignment-driven reservation; everyone else gets the nearest edge.

use anyhow::Result;
use std::sync::Once;
use tracing::{debug, warn};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;
use x11rb::wrapper::ConnectionExt as _;

use crate::config::Alignment;
use crate::geometry::Rect;
use crate::x11::atoms::Atoms;
use crate::x11::wm::{WindowManager, WmQuirks};

// Slot indices within the 12-value strut array
const LEFT: usize = 0;
const RIGHT: usize = 1;
const TOP: usize = 2;
const BOTTOM: usize = 3;
const LEFT_START_Y: usize = 4;
const LEFT_END_Y: usize = 5;
const RIGHT_START_Y: usize = 6;
const RIGHT_END_Y: usize = 7;
const TOP_START_X: usize = 8;
const TOP_END_X: usize = 9;
const BOTTOM_START_X: usize = 10;
const BOTTOM_END_X: usize = 11;

fn clamp_w(v: i32, max: i32) -> u32 {
    v.clamp(0, max) as u32
}

/// Compute the strut array for the given window geometry.
///
/// Returns None when nothing can be reserved (cutout-capable WM with a
/// window centered on both axes). All values are clamped into
/// `[0, display dimension]` so the server never rejects them.
pub fn compute_struts(
    window: Rect,
    display_width: i32,
    display_height: i32,
    align: Alignment,
    quirks: &WmQuirks,
) -> Option<[u32; 12]> {
    let mut sizes = [0u32; 12];

    if quirks.strut_cutout {
        // Space can only be reserved against an edge the window touches
        if !align.is_edge_anchored() {
            return None;
        }

        // Pick the axis once from the window shape so corner alignments
        // don't flap between edges. Wide windows prefer top/bottom, as do
        // WMs that ignore vertical docks outright.
        let wide = window.width > window.height || quirks.horizontal_struts_only;
        if wide {
            if align.is_top() {
                sizes[TOP] = clamp_w(window.end_y(), display_height);
                sizes[TOP_START_X] = clamp_w(window.x, display_width);
                sizes[TOP_END_X] = clamp_w(window.end_x(), display_width);
            } else if align.is_bottom() {
                sizes[BOTTOM] = (display_height - window.y.clamp(0, display_height)) as u32;
                sizes[BOTTOM_START_X] = clamp_w(window.x, display_width);
                sizes[BOTTOM_END_X] = clamp_w(window.end_x(), display_width);
            } else if align.is_left() {
                sizes[LEFT] = clamp_w(window.end_x(), display_width);
                sizes[LEFT_START_Y] = clamp_w(window.y, display_height);
                sizes[LEFT_END_Y] = clamp_w(window.end_y(), display_height);
            } else if align.is_right() {
                sizes[RIGHT] = (display_width - window.x.clamp(0, display_width)) as u32;
                sizes[RIGHT_START_Y] = clamp_w(window.y, display_height);
                sizes[RIGHT_END_Y] = clamp_w(window.end_y(), display_height);
            }
        } else {
            // thin window: prefer left/right placement
            if align.is_left() {
                sizes[LEFT] = clamp_w(window.end_x(), display_width);
                sizes[LEFT_START_Y] = clamp_w(window.y, display_height);
                sizes[LEFT_END_Y] = clamp_w(window.end_y(), display_height);
            } else if align.is_right() {
                sizes[RIGHT] = (display_width - window.x.clamp(0, display_width)) as u32;
                sizes[RIGHT_START_Y] = clamp_w(window.y, display_height);
                sizes[RIGHT_END_Y] = clamp_w(window.end_y(), display_height);
            } else if align.is_top() {
                sizes[TOP] = clamp_w(window.end_y(), display_height);
                sizes[TOP_START_X] = clamp_w(window.x, display_width);
                sizes[TOP_END_X] = clamp_w(window.end_x(), display_width);
            } else if align.is_bottom() {
                sizes[BOTTOM] = (display_height - window.y.clamp(0, display_height)) as u32;
                sizes[BOTTOM_START_X] = clamp_w(window.x, display_width);
                sizes[BOTTOM_END_X] = clamp_w(window.end_x(), display_width);
            }
        }
    } else {
        // WMs without cutout support get the nearest edge, full-span,
        // regardless of alignment.
        if window.width < window.height {
            let space_left = window.end_x();
            let space_right = display_width - window.x;
            if space_left < space_right {
                sizes[LEFT] = clamp_w(window.end_x(), display_width);
                sizes[LEFT_START_Y] = 0;
                sizes[LEFT_END_Y] = display_height as u32;
            } else {
                // measured from x in case the window isn't flush with the
                // right side of the screen
                sizes[RIGHT] = (display_width - window.x.clamp(0, display_width)) as u32;
                sizes[RIGHT_START_Y] = 0;
                sizes[RIGHT_END_Y] = display_height as u32;
            }
        } else {
            let space_top = window.end_y();
            let space_bottom = display_height - window.y;
            if space_top < space_bottom {
                sizes[TOP] = clamp_w(window.end_y(), display_height);
                sizes[TOP_START_X] = 0;
                sizes[TOP_END_X] = display_width as u32;
            } else {
                sizes[BOTTOM] = (display_height - window.y.clamp(0, display_height)) as u32;
                sizes[BOTTOM_START_X] = 0;
                sizes[BOTTOM_END_X] = display_width as u32;
            }
        }
    }

    Some(sizes)
}

/// Compute and publish struts for the overlay window.
pub fn set_struts<C: Connection>(
    conn: &C,
    atoms: &Atoms,
    wm: &WindowManager,
    win: Window,
    window_geometry: Rect,
    display_width: u16,
    display_height: u16,
    align: Alignment,
) -> Result<()> {
    static STRUT_WARNING: Once = Once::new();
    let quirks = wm.quirks();
    if quirks.no_strut_support {
        STRUT_WARNING.call_once(|| {
            warn!(
                "window manager {} doesn't support strut hints; \
                 reserved area functionality might not work correctly",
                wm.name
            );
        });
    }

    let Some(sizes) = compute_struts(
        window_geometry,
        display_width as i32,
        display_height as i32,
        align,
        &quirks,
    ) else {
        return Ok(());
    };

    debug!(
        "reserved space: left={}, right={}, top={}, bottom={}",
        sizes[LEFT], sizes[RIGHT], sizes[TOP], sizes[BOTTOM]
    );

    conn.change_property32(
        PropMode::REPLACE,
        win,
        atoms.net_wm_strut,
        AtomEnum::CARDINAL,
        &sizes[..4],
    )?;

    debug!(
        "reserved space edges: left_y={}..{}, right_y={}..{}, top_x={}..{}, bottom_x={}..{}",
        sizes[LEFT_START_Y],
        sizes[LEFT_END_Y],
        sizes[RIGHT_START_Y],
        sizes[RIGHT_END_Y],
        sizes[TOP_START_X],
        sizes[TOP_END_X],
        sizes[BOTTOM_START_X],
        sizes[BOTTOM_END_X]
    );

    conn.change_property32(
        PropMode::REPLACE,
        win,
        atoms.net_wm_strut_partial,
        AtomEnum::CARDINAL,
        &sizes,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::x11::wm::WindowManagerKind;

    fn cutout() -> WmQuirks {
        WindowManagerKind::Kwin.quirks()
    }

    fn no_cutout() -> WmQuirks {
        WindowManagerKind::Openbox.quirks()
    }

    #[test]
    fn idempotent_for_unchanged_inputs() {
        let win = Rect::new(0, 0, 300, 900);
        let a = compute_struts(win, 1920, 1080, Alignment::TopLeft, &cutout());
        let b = compute_struts(win, 1920, 1080, Alignment::TopLeft, &cutout());
        assert_eq!(a, b);
        let c = compute_struts(win, 1920, 1080, Alignment::TopLeft, &no_cutout());
        let d = compute_struts(win, 1920, 1080, Alignment::TopLeft, &no_cutout());
        assert_eq!(c, d);
    }

    #[test]
    fn values_clamped_to_display_bounds() {
        // window hangs past the right and bottom edges
        let win = Rect::new(1800, 900, 400, 400);
        for quirks in [cutout(), no_cutout()] {
            for align in [Alignment::BottomRight, Alignment::MiddleRight] {
                if let Some(sizes) = compute_struts(win, 1920, 1080, align, &quirks) {
                    for (i, v) in sizes.iter().enumerate() {
                        let max = match i {
                            LEFT | RIGHT | TOP_START_X | TOP_END_X | BOTTOM_START_X
                            | BOTTOM_END_X => 1920,
                            _ => 1080,
                        };
                        assert!(*v <= max, "slot {} = {} exceeds {}", i, v, max);
                    }
                }
            }
        }
    }

    #[test]
    fn centered_window_reserves_nothing_with_cutout() {
        let win = Rect::new(800, 400, 320, 280);
        assert_eq!(
            compute_struts(win, 1920, 1080, Alignment::MiddleMiddle, &cutout()),
            None
        );
        assert_eq!(
            compute_struts(win, 1920, 1080, Alignment::None, &cutout()),
            None
        );
    }

    #[test]
    fn wide_window_prefers_top_bottom() {
        let win = Rect::new(0, 0, 1920, 40);
        let sizes = compute_struts(win, 1920, 1080, Alignment::TopLeft, &cutout()).unwrap();
        assert_eq!(sizes[TOP], 40);
        assert_eq!(sizes[LEFT], 0);
        assert_eq!(sizes[TOP_START_X], 0);
        assert_eq!(sizes[TOP_END_X], 1920);
    }

    #[test]
    fn thin_window_prefers_left_right() {
        let win = Rect::new(0, 0, 300, 1080);
        let sizes = compute_struts(win, 1920, 1080, Alignment::TopLeft, &cutout()).unwrap();
        assert_eq!(sizes[LEFT], 300);
        assert_eq!(sizes[TOP], 0);
        assert_eq!(sizes[LEFT_START_Y], 0);
        assert_eq!(sizes[LEFT_END_Y], 1080);
    }

    #[test]
    fn i3_always_uses_horizontal_axis() {
        // thin and tall, but i3 ignores vertical struts entirely
        let win = Rect::new(0, 0, 300, 1080);
        let quirks = WindowManagerKind::I3.quirks();
        let sizes = compute_struts(win, 1920, 1080, Alignment::TopLeft, &quirks).unwrap();
        assert_eq!(sizes[LEFT], 0);
        assert_eq!(sizes[TOP], 1080);
    }

    #[test]
    fn no_cutout_picks_nearer_edge_ignoring_alignment() {
        // tall window hugging the left side; alignment says right
        let win = Rect::new(0, 0, 300, 900);
        let sizes = compute_struts(win, 1920, 1080, Alignment::MiddleRight, &no_cutout()).unwrap();
        assert_eq!(sizes[LEFT], 300);
        assert_eq!(sizes[RIGHT], 0);
        // full-span partial bounds
        assert_eq!(sizes[LEFT_START_Y], 0);
        assert_eq!(sizes[LEFT_END_Y], 1080);
    }

    #[test]
    fn no_cutout_tall_window_on_right() {
        let win = Rect::new(1620, 0, 300, 900);
        let sizes =
            compute_struts(win, 1920, 1080, Alignment::MiddleMiddle, &no_cutout()).unwrap();
        assert_eq!(sizes[RIGHT], 300);
        assert_eq!(sizes[LEFT], 0);
    }

    #[test]
    fn no_cutout_wide_window_on_bottom() {
        let win = Rect::new(0, 1040, 1920, 40);
        let sizes =
            compute_struts(win, 1920, 1080, Alignment::MiddleMiddle, &no_cutout()).unwrap();
        assert_eq!(sizes[BOTTOM], 40);
        assert_eq!(sizes[TOP], 0);
        assert_eq!(sizes[BOTTOM_START_X], 0);
        assert_eq!(sizes[BOTTOM_END_X], 1920);
    }
}
