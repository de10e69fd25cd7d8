//! Text readouts
//!
//! Small formatting helpers turning session state into display strings.
//! Everything that touches unbounded server data is capped so a hostile
//! property cannot blow up the output buffer.

use anyhow::Result;
use x11rb::connection::Connection;
use x11rb::protocol::randr::ConnectionExt as _;
use x11rb::protocol::xproto::{ConnectionExt as _, Window};

use crate::x11::desktop::DesktopInfo;
use crate::x11::wm::WindowManager;

/// Cap applied to strings sourced from X properties
pub const TEXT_BUFFER_SIZE: usize = 256;

/// Append at most `cap` bytes of `s`, truncating on a char boundary
pub fn push_capped(out: &mut String, s: &str, cap: usize) {
    if s.len() <= cap {
        out.push_str(s);
        return;
    }
    let mut end = cap;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    out.push_str(&s[..end]);
}

pub fn format_desktop_number(info: &DesktopInfo) -> String {
    info.current.to_string()
}

pub fn format_desktop_count(info: &DesktopInfo) -> String {
    info.count.to_string()
}

pub fn format_desktop_name(info: &DesktopInfo) -> String {
    let mut out = String::new();
    push_capped(&mut out, &info.name, TEXT_BUFFER_SIZE);
    out
}

/// "current/total (name)"
pub fn format_desktop(info: &DesktopInfo) -> String {
    let mut out = format!("{}/{}", info.current, info.count);
    if !info.name.is_empty() {
        out.push_str(" (");
        push_capped(&mut out, &info.name, TEXT_BUFFER_SIZE);
        out.push(')');
    }
    out
}

pub fn format_wm_name(wm: &WindowManager) -> String {
    let mut out = String::new();
    push_capped(&mut out, &wm.name, TEXT_BUFFER_SIZE);
    out
}

/// Monitor the overlay is pinned to; the whole screen counts as head 0
pub fn format_monitor(head_index: Option<usize>) -> String {
    head_index.unwrap_or(0).to_string()
}

/// Number of RandR monitors, or 1 when RandR is unavailable
pub fn monitor_count<C: Connection>(conn: &C, root: Window) -> u32 {
    let has_randr = conn
        .extension_information(x11rb::protocol::randr::X11_EXTENSION_NAME)
        .ok()
        .flatten()
        .is_some();
    if !has_randr {
        return 1;
    }
    conn.randr_get_monitors(root, true)
        .ok()
        .and_then(|c| c.reply().ok())
        .map(|r| r.monitors.len() as u32)
        .filter(|&n| n > 0)
        .unwrap_or(1)
}

/// Keyboard lock states, read from the server LED mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockKeys {
    pub caps: bool,
    pub num: bool,
    pub scroll: bool,
}

impl LockKeys {
    // Core protocol LED assignments
    const CAPS_LED: u32 = 1 << 0;
    const NUM_LED: u32 = 1 << 1;
    const SCROLL_LED: u32 = 1 << 2;

    pub fn from_led_mask(led_mask: u32) -> Self {
        Self {
            caps: led_mask & Self::CAPS_LED != 0,
            num: led_mask & Self::NUM_LED != 0,
            scroll: led_mask & Self::SCROLL_LED != 0,
        }
    }

    pub fn query<C: Connection>(conn: &C) -> Result<Self> {
        let reply = conn.get_keyboard_control()?.reply()?;
        Ok(Self::from_led_mask(reply.led_mask))
    }
}

pub fn on_off(state: bool) -> &'static str {
    if state {
        "On"
    } else {
        "Off"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capped_push_respects_char_boundaries() {
        let mut out = String::new();
        // 'é' is two bytes; a cap of 3 lands mid-char
        push_capped(&mut out, "ééé", 3);
        assert_eq!(out, "é");

        let mut out = String::new();
        push_capped(&mut out, "short", 64);
        assert_eq!(out, "short");

        let mut out = String::new();
        push_capped(&mut out, "abcdef", 4);
        assert_eq!(out, "abcd");
    }

    #[test]
    fn desktop_readout_formats() {
        let info = DesktopInfo {
            current: 2,
            count: 4,
            name: "Web".to_string(),
            ..Default::default()
        };
        assert_eq!(format_desktop_number(&info), "2");
        assert_eq!(format_desktop_count(&info), "4");
        assert_eq!(format_desktop_name(&info), "Web");
        assert_eq!(format_desktop(&info), "2/4 (Web)");

        let unnamed = DesktopInfo {
            current: 1,
            count: 1,
            ..Default::default()
        };
        assert_eq!(format_desktop(&unnamed), "1/1");
    }

    #[test]
    fn lock_keys_decode_led_mask() {
        let all = LockKeys::from_led_mask(0b111);
        assert_eq!(
            all,
            LockKeys {
                caps: true,
                num: true,
                scroll: true
            }
        );
        let num_only = LockKeys::from_led_mask(0b010);
        assert!(!num_only.caps && num_only.num && !num_only.scroll);
        assert_eq!(on_off(num_only.num), "On");
        assert_eq!(on_off(num_only.caps), "Off");
    }

    #[test]
    fn monitor_readout_defaults_to_zero() {
        assert_eq!(format_monitor(None), "0");
        assert_eq!(format_monitor(Some(1)), "1");
    }
}
