//! Input backend and event propagation
//!
//! When the server speaks XInput 2 the overlay listens through it and
//! synthesizes core pointer events; otherwise it falls back to core
//! protocol event selection. Pointer events the overlay does not consume
//! are re-targeted at the topmost client window underneath the pointer.

use anyhow::Result;
use tracing::{debug, info};
use x11rb::connection::Connection;
use x11rb::protocol::xinput::{self, ConnectionExt as _, Device, DeviceType, XIEventMask};
use x11rb::protocol::xproto::*;
use x11rb::protocol::Event;

use crate::config::WindowType;
use crate::geometry::Rect;
use crate::x11::atoms::Atoms;
use crate::x11::window::atom_window_list;

/// Cap on windows visited during the fallback tree walk
const MAX_TREE_WALK: usize = 4096;

/// Pointer device known to the server
#[derive(Debug, Clone)]
pub struct PointerDevice {
    pub id: u16,
    pub name: String,
}

/// Pointer devices captured at startup.
///
/// The cache is not refreshed on hierarchy changes; a device plugged in
/// later is simply not filtered against, which errs on the side of
/// forwarding its events.
#[derive(Debug, Clone, Default)]
pub struct DeviceCache {
    pub pointers: Vec<PointerDevice>,
}

impl DeviceCache {
    pub fn query<C: Connection>(conn: &C) -> Result<Self> {
        let reply = conn
            .xinput_xi_query_device(u16::from(Device::ALL))?
            .reply()?;
        let pointers = reply
            .infos
            .into_iter()
            .filter(|d| {
                matches!(
                    d.type_,
                    DeviceType::MASTER_POINTER | DeviceType::SLAVE_POINTER
                )
            })
            .map(|d| PointerDevice {
                id: d.deviceid,
                name: String::from_utf8_lossy(&d.name).into_owned(),
            })
            .collect::<Vec<_>>();
        debug!("found {} pointer devices", pointers.len());
        Ok(Self { pointers })
    }

    pub fn is_pointer(&self, id: u16) -> bool {
        self.pointers.is_empty() || self.pointers.iter().any(|d| d.id == id)
    }
}

/// How pointer input reaches us
#[derive(Debug)]
pub enum InputBackend {
    /// XInput 2 negotiated; `opcode` identifies the extension's events
    Xi2 { opcode: u8, devices: DeviceCache },
    /// Core protocol events only
    Core,
}

impl InputBackend {
    pub fn xinput_active(&self) -> bool {
        matches!(self, InputBackend::Xi2 { .. })
    }

    /// Negotiate XInput 2 and select events on the root window (and our
    /// own window, when we have one). Any failure along the way degrades
    /// to the core backend.
    pub fn setup<C: Connection>(
        conn: &C,
        root: Window,
        own_window: Option<Window>,
    ) -> Result<Self> {
        let Some(ext) = conn.extension_information(xinput::X11_EXTENSION_NAME)? else {
            debug!("XInput extension not present");
            return Ok(InputBackend::Core);
        };

        match conn.xinput_xi_query_version(2, 0)?.reply() {
            Ok(v) if v.major_version >= 2 => {
                debug!("XInput {}.{} negotiated", v.major_version, v.minor_version)
            }
            _ => {
                debug!("XInput 2 not supported by server");
                return Ok(InputBackend::Core);
            }
        }

        let devices = DeviceCache::query(conn)?;

        let mut root_mask = XIEventMask::HIERARCHY | XIEventMask::MOTION;
        if own_window.is_none() {
            root_mask |= XIEventMask::BUTTON_PRESS | XIEventMask::BUTTON_RELEASE;
        }
        conn.xinput_xi_select_events(
            root,
            &[xinput::EventMask {
                deviceid: u16::from(Device::ALL),
                mask: vec![root_mask],
            }],
        )?;

        if let Some(win) = own_window {
            conn.xinput_xi_select_events(
                win,
                &[xinput::EventMask {
                    deviceid: u16::from(Device::ALL),
                    mask: vec![XIEventMask::BUTTON_PRESS | XIEventMask::BUTTON_RELEASE],
                }],
            )?;
        }

        info!("using XInput 2 for pointer events");
        Ok(InputBackend::Xi2 {
            opcode: ext.major_opcode,
            devices,
        })
    }
}

/// Core event mask for the overlay window.
///
/// Exposure and property changes are always wanted. Structure and button
/// events only apply to an owned window, and button/motion selection is
/// skipped entirely when XInput 2 delivers them instead.
pub fn select_event_mask(own_window: bool, kind: WindowType, xinput_active: bool) -> EventMask {
    let mut mask = EventMask::EXPOSURE | EventMask::PROPERTY_CHANGE;
    if own_window && kind.is_managed() {
        mask |= EventMask::STRUCTURE_NOTIFY;
        if !xinput_active {
            mask |= EventMask::BUTTON_PRESS | EventMask::BUTTON_RELEASE;
            if kind != WindowType::Desktop {
                mask |= EventMask::POINTER_MOTION
                    | EventMask::ENTER_WINDOW
                    | EventMask::LEAVE_WINDOW;
            }
        }
    }
    mask
}

/// A core input event eligible for forwarding
#[derive(Debug, Clone)]
pub enum CoreEvent {
    KeyPress(KeyPressEvent),
    KeyRelease(KeyReleaseEvent),
    Press(ButtonPressEvent),
    Release(ButtonReleaseEvent),
    Motion(MotionNotifyEvent),
    Enter(EnterNotifyEvent),
    Leave(LeaveNotifyEvent),
}

impl CoreEvent {
    fn root_pos(&self) -> (i16, i16) {
        match self {
            CoreEvent::KeyPress(e) | CoreEvent::KeyRelease(e) => (e.root_x, e.root_y),
            CoreEvent::Press(e) | CoreEvent::Release(e) => (e.root_x, e.root_y),
            CoreEvent::Motion(e) => (e.root_x, e.root_y),
            CoreEvent::Enter(e) | CoreEvent::Leave(e) => (e.root_x, e.root_y),
        }
    }
}

/// Classify an event for forwarding; anything else is consumed locally
/// without touching the server. Forwarding arbitrary event types risks
/// event loops.
pub fn forwardable(event: &Event) -> Option<CoreEvent> {
    match event {
        Event::KeyPress(e) => Some(CoreEvent::KeyPress(*e)),
        Event::KeyRelease(e) => Some(CoreEvent::KeyRelease(*e)),
        Event::ButtonPress(e) => Some(CoreEvent::Press(*e)),
        Event::ButtonRelease(e) => Some(CoreEvent::Release(*e)),
        Event::MotionNotify(e) => Some(CoreEvent::Motion(*e)),
        Event::EnterNotify(e) => Some(CoreEvent::Enter(*e)),
        Event::LeaveNotify(e) => Some(CoreEvent::Leave(*e)),
        _ => None,
    }
}

fn fp1616(v: xinput::Fp1616) -> i16 {
    (v >> 16) as i16
}

fn synth_button(e: &xinput::ButtonPressEvent, response_type: u8) -> ButtonPressEvent {
    ButtonPressEvent {
        response_type,
        detail: e.detail as u8,
        sequence: e.sequence,
        time: e.time,
        root: e.root,
        event: e.event,
        child: e.child,
        root_x: fp1616(e.root_x),
        root_y: fp1616(e.root_y),
        event_x: fp1616(e.event_x),
        event_y: fp1616(e.event_y),
        state: KeyButMask::from(e.mods.effective as u16),
        same_screen: true,
    }
}

fn synth_motion(e: &xinput::MotionEvent) -> MotionNotifyEvent {
    MotionNotifyEvent {
        response_type: MOTION_NOTIFY_EVENT,
        detail: Motion::NORMAL,
        sequence: e.sequence,
        time: e.time,
        root: e.root,
        event: e.event,
        child: e.child,
        root_x: fp1616(e.root_x),
        root_y: fp1616(e.root_y),
        event_x: fp1616(e.event_x),
        event_y: fp1616(e.event_y),
        state: KeyButMask::from(e.mods.effective as u16),
        same_screen: true,
    }
}

/// Turn an XInput 2 event into the core events to forward.
///
/// Scroll wheel buttons (4..=7) arrive as a lone XI2 press; clients built
/// on the core protocol expect a press/release pair, so both are
/// synthesized here and the matching XI2 release is swallowed.
pub fn core_from_xi2(event: &Event, devices: &DeviceCache) -> Vec<CoreEvent> {
    match event {
        Event::XinputButtonPress(e) => {
            let press = CoreEvent::Press(synth_button(e, BUTTON_PRESS_EVENT));
            if (4..=7).contains(&e.detail) {
                vec![
                    press,
                    CoreEvent::Release(synth_button(e, BUTTON_RELEASE_EVENT)),
                ]
            } else {
                vec![press]
            }
        }
        Event::XinputButtonRelease(e) => {
            if (4..=7).contains(&e.detail) {
                Vec::new()
            } else {
                vec![CoreEvent::Release(synth_button(e, BUTTON_RELEASE_EVENT))]
            }
        }
        Event::XinputMotion(e) => {
            if devices.is_pointer(e.sourceid) {
                vec![CoreEvent::Motion(synth_motion(e))]
            } else {
                Vec::new()
            }
        }
        _ => Vec::new(),
    }
}

/// Topmost window in a bottom-to-top stack containing the point,
/// never the overlay itself.
pub fn topmost_hit(stack: &[(Window, Rect)], x: i32, y: i32, skip: Window) -> Option<Window> {
    stack
        .iter()
        .rev()
        .filter(|(w, _)| *w != skip)
        .find(|(_, r)| r.contains(x, y))
        .map(|(w, _)| *w)
}

/// Client windows, bottom to top.
///
/// Prefers _NET_CLIENT_LIST_STACKING, falls back to _NET_CLIENT_LIST, and
/// as a last resort walks the window tree collecting windows that carry
/// WM_HINTS (the ICCCM marker for client windows).
fn client_stack<C: Connection>(conn: &C, atoms: &Atoms, root: Window) -> Result<Vec<Window>> {
    let stack = atom_window_list(conn, root, atoms.net_client_list_stacking)?;
    if !stack.is_empty() {
        return Ok(stack);
    }
    let stack = atom_window_list(conn, root, atoms.net_client_list)?;
    if !stack.is_empty() {
        return Ok(stack);
    }
    Ok(hinted_descendants(conn, atoms, root))
}

fn has_wm_hints<C: Connection>(conn: &C, atoms: &Atoms, win: Window) -> bool {
    conn.get_property(false, win, atoms.wm_hints, atoms.wm_hints, 0, 0)
        .ok()
        .and_then(|c| c.reply().ok())
        .map(|r| r.type_ != x11rb::NONE)
        .unwrap_or(false)
}

fn hinted_descendants<C: Connection>(conn: &C, atoms: &Atoms, root: Window) -> Vec<Window> {
    let mut found = Vec::new();
    let mut queue = vec![root];
    let mut visited = 0usize;
    while let Some(win) = queue.pop() {
        visited += 1;
        if visited > MAX_TREE_WALK {
            break;
        }
        let Ok(cookie) = conn.query_tree(win) else {
            continue;
        };
        let Ok(tree) = cookie.reply() else {
            continue;
        };
        for child in tree.children {
            if has_wm_hints(conn, atoms, child) {
                found.push(child);
            }
            queue.push(child);
        }
    }
    found
}

/// Root-relative rectangles of the mapped windows in the stack.
///
/// Clients may be reparented into WM frames; hit testing runs against the
/// top-level frame's rectangle while the client stays the delivery target.
fn window_rects<C: Connection>(
    conn: &C,
    root: Window,
    windows: Vec<Window>,
) -> Vec<(Window, Rect)> {
    windows
        .into_iter()
        .filter_map(|w| {
            let frame = crate::x11::window::top_level_parent(conn, root, w).unwrap_or(w);
            let attrs = conn.get_window_attributes(frame).ok()?.reply().ok()?;
            if attrs.map_state != MapState::VIEWABLE {
                return None;
            }
            let geom = conn.get_geometry(frame).ok()?.reply().ok()?;
            let pos = conn
                .translate_coordinates(frame, root, 0, 0)
                .ok()?
                .reply()
                .ok()?;
            Some((
                w,
                Rect::new(pos.dst_x as i32, pos.dst_y as i32, geom.width as u32, geom.height as u32),
            ))
        })
        .collect()
}

fn deliver_mask(event: &CoreEvent) -> EventMask {
    match event {
        CoreEvent::KeyPress(_) => EventMask::KEY_PRESS,
        CoreEvent::KeyRelease(_) => EventMask::KEY_RELEASE,
        CoreEvent::Enter(_) => EventMask::ENTER_WINDOW,
        CoreEvent::Leave(_) => EventMask::LEAVE_WINDOW,
        CoreEvent::Press(_) => EventMask::BUTTON_PRESS,
        CoreEvent::Release(_) => EventMask::BUTTON_RELEASE,
        CoreEvent::Motion(e) => {
            let mut mask = EventMask::POINTER_MOTION;
            let buttons = [
                (KeyButMask::BUTTON1, EventMask::BUTTON1_MOTION),
                (KeyButMask::BUTTON2, EventMask::BUTTON2_MOTION),
                (KeyButMask::BUTTON3, EventMask::BUTTON3_MOTION),
                (KeyButMask::BUTTON4, EventMask::BUTTON4_MOTION),
                (KeyButMask::BUTTON5, EventMask::BUTTON5_MOTION),
            ];
            for (held, motion) in buttons {
                if e.state.contains(held) {
                    mask |= motion | EventMask::BUTTON_MOTION;
                }
            }
            mask
        }
    }
}

macro_rules! retarget {
    ($e:expr, $target:expr, $coords:expr) => {{
        let mut e = $e;
        e.event = $target;
        e.event_x = $coords.dst_x;
        e.event_y = $coords.dst_y;
        e.child = $coords.child;
        e
    }};
}

/// Forward an input event to the topmost client window beneath the
/// pointer (the desktop window when nothing else is hit), releasing any
/// implicit pointer grab first. A button press also hands the target
/// input focus.
pub fn propagate_event<C: Connection>(
    conn: &C,
    atoms: &Atoms,
    root: Window,
    self_window: Window,
    desktop: Window,
    event: CoreEvent,
) -> Result<()> {
    let (root_x, root_y) = event.root_pos();

    let stack = client_stack(conn, atoms, root)?;
    let rects = window_rects(conn, root, stack);
    let target = topmost_hit(&rects, root_x as i32, root_y as i32, self_window)
        .unwrap_or(desktop);
    if target == self_window {
        return Ok(());
    }

    let coords = conn
        .translate_coordinates(root, target, root_x, root_y)?
        .reply()?;

    // The press that reached us may have started an implicit grab; the
    // target cannot receive events while it holds
    conn.ungrab_pointer(x11rb::CURRENT_TIME)?;

    let mask = deliver_mask(&event);
    match event {
        CoreEvent::KeyPress(e) => {
            conn.send_event(false, target, mask, retarget!(e, target, coords))?;
        }
        CoreEvent::KeyRelease(e) => {
            conn.send_event(false, target, mask, retarget!(e, target, coords))?;
        }
        CoreEvent::Press(e) => {
            let e = retarget!(e, target, coords);
            conn.send_event(false, target, mask, e)?;
            conn.set_input_focus(InputFocus::PARENT, target, e.time)?;
        }
        CoreEvent::Release(e) => {
            conn.send_event(false, target, mask, retarget!(e, target, coords))?;
        }
        CoreEvent::Motion(e) => {
            conn.send_event(false, target, mask, retarget!(e, target, coords))?;
        }
        CoreEvent::Enter(e) => {
            conn.send_event(false, target, mask, retarget!(e, target, coords))?;
        }
        CoreEvent::Leave(e) => {
            conn.send_event(false, target, mask, retarget!(e, target, coords))?;
        }
    }
    conn.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn button_event(detail: u8, state: KeyButMask) -> ButtonPressEvent {
        ButtonPressEvent {
            response_type: BUTTON_PRESS_EVENT,
            detail,
            sequence: 0,
            time: 1000,
            root: 1,
            event: 2,
            child: 0,
            root_x: 50,
            root_y: 60,
            event_x: 50,
            event_y: 60,
            state,
            same_screen: true,
        }
    }

    #[test]
    fn event_mask_shrinks_when_xinput_handles_pointer() {
        let core = select_event_mask(true, WindowType::Normal, false);
        assert!(core.contains(EventMask::BUTTON_PRESS));
        assert!(core.contains(EventMask::POINTER_MOTION));
        assert!(core.contains(EventMask::STRUCTURE_NOTIFY));

        let xi2 = select_event_mask(true, WindowType::Normal, true);
        assert!(!xi2.contains(EventMask::BUTTON_PRESS));
        assert!(!xi2.contains(EventMask::POINTER_MOTION));
        assert!(xi2.contains(EventMask::STRUCTURE_NOTIFY));
        assert!(xi2.contains(EventMask::EXPOSURE | EventMask::PROPERTY_CHANGE));
    }

    #[test]
    fn desktop_window_skips_motion_selection() {
        let mask = select_event_mask(true, WindowType::Desktop, false);
        assert!(mask.contains(EventMask::BUTTON_PRESS));
        assert!(!mask.contains(EventMask::POINTER_MOTION));
        assert!(!mask.contains(EventMask::ENTER_WINDOW));
    }

    #[test]
    fn unowned_and_override_windows_get_passive_mask() {
        let mask = select_event_mask(false, WindowType::Normal, false);
        assert_eq!(mask, EventMask::EXPOSURE | EventMask::PROPERTY_CHANGE);

        // override-redirect windows bypass the WM; no button processing
        let mask = select_event_mask(true, WindowType::Override, false);
        assert_eq!(mask, EventMask::EXPOSURE | EventMask::PROPERTY_CHANGE);
    }

    #[test]
    fn hit_testing_prefers_topmost_and_never_self() {
        let me = 99;
        let stack = vec![
            (10, Rect::new(0, 0, 200, 200)),
            (11, Rect::new(50, 50, 100, 100)),
            (me, Rect::new(0, 0, 500, 500)),
        ];
        // stack is bottom to top; 11 overlaps 10 at (60, 60)
        assert_eq!(topmost_hit(&stack, 60, 60, me), Some(11));
        assert_eq!(topmost_hit(&stack, 10, 10, me), Some(10));
        assert_eq!(topmost_hit(&stack, 400, 400, me), None);
    }

    #[test]
    fn forwardable_ignores_non_pointer_events() {
        let expose = ExposeEvent {
            response_type: EXPOSE_EVENT,
            sequence: 0,
            window: 5,
            x: 0,
            y: 0,
            width: 10,
            height: 10,
            count: 0,
        };
        assert!(forwardable(&Event::Expose(expose)).is_none());

        let press = button_event(1, KeyButMask::default());
        assert!(matches!(
            forwardable(&Event::ButtonPress(press)),
            Some(CoreEvent::Press(_))
        ));
    }

    #[test]
    fn motion_mask_includes_held_buttons() {
        let motion = MotionNotifyEvent {
            response_type: MOTION_NOTIFY_EVENT,
            detail: Motion::NORMAL,
            sequence: 0,
            time: 1000,
            root: 1,
            event: 2,
            child: 0,
            root_x: 0,
            root_y: 0,
            event_x: 0,
            event_y: 0,
            state: KeyButMask::BUTTON1,
            same_screen: true,
        };
        let mask = deliver_mask(&CoreEvent::Motion(motion));
        assert!(mask.contains(EventMask::POINTER_MOTION));
        assert!(mask.contains(EventMask::BUTTON1_MOTION));
        assert!(mask.contains(EventMask::BUTTON_MOTION));
        assert!(!mask.contains(EventMask::BUTTON2_MOTION));
    }

    #[test]
    fn fp1616_truncates_fraction() {
        assert_eq!(fp1616(100 << 16), 100);
        assert_eq!(fp1616((100 << 16) | 0x8000), 100);
        assert_eq!(fp1616(-(3 << 16)), -3);
    }

    fn xi2_button(detail: u32) -> xinput::ButtonPressEvent {
        xinput::ButtonPressEvent {
            response_type: 35,
            extension: 131,
            sequence: 0,
            length: 0,
            event_type: 4,
            deviceid: 2,
            time: 1000,
            detail,
            root: 1,
            event: 2,
            child: 0,
            root_x: 320 << 16,
            root_y: 240 << 16,
            event_x: 320 << 16,
            event_y: 240 << 16,
            sourceid: 9,
            flags: xinput::PointerEventFlags::default(),
            mods: xinput::ModifierInfo::default(),
            group: xinput::GroupInfo::default(),
            button_mask: Vec::new(),
            valuator_mask: Vec::new(),
            axisvalues: Vec::new(),
        }
    }

    #[test]
    fn wheel_press_synthesizes_press_release_pair() {
        let cache = DeviceCache::default();
        let events = core_from_xi2(&Event::XinputButtonPress(xi2_button(4)), &cache);
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], CoreEvent::Press(e) if e.detail == 4 && e.root_x == 320));
        assert!(matches!(&events[1], CoreEvent::Release(e) if e.detail == 4));

        // the matching XI2 release is swallowed
        let release = core_from_xi2(&Event::XinputButtonRelease(xi2_button(4)), &cache);
        assert!(release.is_empty());
    }

    #[test]
    fn ordinary_buttons_pass_through_one_to_one() {
        let cache = DeviceCache::default();
        let press = core_from_xi2(&Event::XinputButtonPress(xi2_button(1)), &cache);
        assert_eq!(press.len(), 1);
        let release = core_from_xi2(&Event::XinputButtonRelease(xi2_button(1)), &cache);
        assert_eq!(release.len(), 1);
    }

    #[test]
    fn motion_from_unknown_device_is_dropped_when_cache_nonempty() {
        let cache = DeviceCache {
            pointers: vec![PointerDevice {
                id: 11,
                name: "test pointer".into(),
            }],
        };
        // sourceid 9 is not in the cache
        let events = core_from_xi2(&Event::XinputMotion(xi2_button(0)), &cache);
        assert!(events.is_empty());

        let empty = DeviceCache::default();
        let events = core_from_xi2(&Event::XinputMotion(xi2_button(0)), &empty);
        assert_eq!(events.len(), 1);
    }
}
