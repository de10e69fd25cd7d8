//! Overlay window creation and classification
//!
//! Decides whether to draw directly onto the desktop window or to create
//! an owned window, discovers the desktop window beneath virtual roots,
//! selects an ARGB visual when true transparency is requested, and
//! publishes the WM-facing properties of managed windows.

use anyhow::Result;
use tracing::{debug, info};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;
use x11rb::wrapper::ConnectionExt as _;

use crate::config::{Alignment, Config, WindowType};
use crate::geometry::Rect;
use crate::x11::atoms::Atoms;
use crate::x11::desktop::fetch_cardinal;
use crate::x11::hints::{
    apply_hints, initial_wm_state, window_type_atom, WindowHints, INPUT_HINT, STATE_HINT,
};
use crate::x11::wm::WindowManager;

/// Bound on desktop-window discovery; prevents runaway traversal on
/// malformed window trees
pub const MAX_TREE_DEPTH: usize = 10;

/// Bound on the parent walk used for pseudo-transparency
pub const MAX_BACKGROUND_CHAIN: usize = 50;

/// Window lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowState {
    #[default]
    Uninitialized,
    Created,
    /// Terminal until process-level re-initialization
    Destroyed,
}

/// The overlay window record
#[derive(Debug, Clone, Default)]
pub struct OverlayWindow {
    pub state: WindowState,
    /// Screen root (or the virtual root covering the current desktop)
    pub root: Window,
    /// The window representing the desktop background
    pub desktop: Window,
    /// Our own drawable; equals `desktop` when not using an owned window
    pub window: Window,
    pub drawable: Window,
    pub visual: Visualid,
    pub depth: u8,
    pub colormap: Colormap,
    /// Whether `colormap` was allocated for an ARGB visual and must be freed
    pub own_colormap: bool,
    pub gc: Option<Gcontext>,
    pub geometry: Rect,
    pub argb_visual: bool,
    pub event_mask: EventMask,
}

/// Abstraction over the window tree so desktop-window discovery can run
/// against a synthetic tree in tests
pub trait WindowTree {
    fn child_windows(&self, win: Window) -> Vec<Window>;
    /// Size of a viewable, non-override-redirect window; None otherwise
    fn mapped_size(&self, win: Window) -> Option<(u16, u16)>;
}

struct ConnTree<'a, C: Connection>(&'a C);

impl<C: Connection> WindowTree for ConnTree<'_, C> {
    fn child_windows(&self, win: Window) -> Vec<Window> {
        self.0
            .query_tree(win)
            .ok()
            .and_then(|c| c.reply().ok())
            .map(|r| r.children)
            .unwrap_or_default()
    }

    fn mapped_size(&self, win: Window) -> Option<(u16, u16)> {
        let attrs = self.0.get_window_attributes(win).ok()?.reply().ok()?;
        if attrs.map_state != MapState::VIEWABLE || attrs.override_redirect {
            return None;
        }
        let geom = self.0.get_geometry(win).ok()?.reply().ok()?;
        Some((geom.width, geom.height))
    }
}

/// Descend from `start` towards a mapped descendant matching the given
/// size, at most [`MAX_TREE_DEPTH`] levels deep.
pub fn descend_to_size<T: WindowTree>(tree: &T, start: Window, w: u16, h: u16) -> Window {
    let mut win = start;
    for _ in 0..MAX_TREE_DEPTH {
        let next = tree
            .child_windows(win)
            .into_iter()
            .find(|&child| tree.mapped_size(child) == Some((w, h)));
        match next {
            Some(child) => win = child,
            None => break,
        }
    }
    win
}

/// Walk up to the ancestor that is a direct child of the root window.
/// The walk is bounded like the pseudo-transparency chain.
pub fn top_level_parent<C: Connection>(conn: &C, root: Window, win: Window) -> Result<Window> {
    let mut current = win;
    for _ in 0..MAX_BACKGROUND_CHAIN {
        if current == root {
            break;
        }
        let tree = conn.query_tree(current)?.reply()?;
        if tree.parent == root || tree.parent == x11rb::NONE {
            break;
        }
        current = tree.parent;
    }
    Ok(current)
}

/// Read a window-list property (_NET_VIRTUAL_ROOTS, _NET_CLIENT_LIST, ...)
pub fn atom_window_list<C: Connection>(
    conn: &C,
    window: Window,
    atom: Atom,
) -> Result<Vec<Window>> {
    if atom == x11rb::NONE {
        return Ok(Vec::new());
    }
    let reply = conn
        .get_property(false, window, atom, AtomEnum::WINDOW, 0, u32::MAX)?
        .reply();
    match reply {
        Ok(r) if r.format == 32 && r.value_len > 0 => {
            Ok(r.value32().map(|v| v.collect()).unwrap_or_default())
        }
        _ => Ok(Vec::new()),
    }
}

/// Resolve the virtual root for the current desktop.
///
/// Some WMs (swm, tvtwm, amiwm, enlightenment, ...) manage workspaces by
/// reparenting everything under per-desktop children of the real root.
pub fn virtual_root<C: Connection>(conn: &C, atoms: &Atoms, screen: &Screen) -> Result<Window> {
    let root = screen.root;

    let vroots = atom_window_list(conn, root, atoms.net_virtual_roots)?;
    if vroots.is_empty() {
        return Ok(root);
    }

    let Some(current) = fetch_cardinal(conn, root, atoms.net_current_desktop) else {
        return Ok(root);
    };

    Ok(vroots.get(current as usize).copied().unwrap_or(root))
}

/// Find the desktop window: the descendant of `vroot` whose mapped size
/// matches the full display, then (refined) the workarea.
pub fn find_desktop_window<C: Connection>(
    conn: &C,
    screen: &Screen,
    vroot: Window,
    workarea: Rect,
) -> Window {
    let tree = ConnTree(conn);
    let mut desktop =
        descend_to_size(&tree, vroot, screen.width_in_pixels, screen.height_in_pixels);
    desktop = descend_to_size(&tree, desktop, workarea.width as u16, workarea.height as u16);

    if desktop != vroot {
        info!(
            "desktop window (0x{:x}) is subwindow of root window (0x{:x})",
            desktop, vroot
        );
    } else {
        info!("desktop window (0x{:x}) is root window", desktop);
    }
    desktop
}

/// Scan the screen's visuals for a 32-bit ARGB visual with standard RGB
/// channel masks
pub fn find_argb_visual(screen: &Screen) -> Option<(Visualid, u8)> {
    argb_visual_in_depths(&screen.allowed_depths)
}

fn argb_visual_in_depths(depths: &[Depth]) -> Option<(Visualid, u8)> {
    for depth in depths {
        if depth.depth != 32 {
            continue;
        }
        for visual in &depth.visuals {
            if visual.red_mask == 0xff0000
                && visual.green_mask == 0x00ff00
                && visual.blue_mask == 0x0000ff
            {
                return Some((visual.visual_id, depth.depth));
            }
        }
    }
    None
}

/// Window position for the configured alignment within the workarea
pub fn initial_position(
    workarea: Rect,
    width: u32,
    height: u32,
    align: Alignment,
    gap_x: i32,
    gap_y: i32,
) -> (i32, i32) {
    let w = width as i32;
    let h = height as i32;
    let x = if align.is_left() {
        workarea.x + gap_x
    } else if align.is_right() {
        workarea.end_x() - w - gap_x
    } else {
        workarea.x + (workarea.width as i32 - w) / 2
    };
    let y = if align.is_top() {
        workarea.y + gap_y
    } else if align.is_bottom() {
        workarea.end_y() - h - gap_y
    } else {
        workarea.y + (workarea.height as i32 - h) / 2
    };
    (x, y)
}

/// Create the overlay window (or adopt the desktop window).
pub fn create_window<C: Connection>(
    conn: &C,
    screen: &Screen,
    atoms: &Atoms,
    wm: &WindowManager,
    config: &Config,
    workarea: Rect,
) -> Result<OverlayWindow> {
    let vroot = virtual_root(conn, atoms, screen)?;
    let desktop = find_desktop_window(conn, screen, vroot, workarea);

    let mut win = OverlayWindow {
        root: vroot,
        desktop,
        visual: screen.root_visual,
        depth: screen.root_depth,
        colormap: screen.default_colormap,
        ..Default::default()
    };

    if !config.window.own_window {
        win.window = desktop;
        if let Ok(geom) = conn.get_geometry(desktop)?.reply() {
            win.geometry = Rect::new(
                geom.x as i32,
                geom.y as i32,
                geom.width as u32,
                geom.height as u32,
            );
        }
        info!("drawing to desktop window");
    } else {
        create_own_window(conn, screen, atoms, wm, config, workarea, &mut win)?;
    }

    // Drawable is same as window; double buffering may change this later
    win.drawable = win.window;

    let gc = conn.generate_id()?;
    conn.create_gc(gc, win.drawable, &CreateGCAux::new().graphics_exposures(0))?;
    win.gc = Some(gc);

    conn.flush()?;
    win.state = WindowState::Created;
    Ok(win)
}

fn create_own_window<C: Connection>(
    conn: &C,
    screen: &Screen,
    atoms: &Atoms,
    wm: &WindowManager,
    config: &Config,
    workarea: Rect,
    win: &mut OverlayWindow,
) -> Result<()> {
    let kind = config.window.kind;

    // Sanity floor so we never request an invalid 0x0 window
    let b = (config.window.border_width as u32).max(1);
    let width = config.placement.width.max(b) as u16;
    let height = config.placement.height.max(b) as u16;
    let (mut x, mut y) = initial_position(
        workarea,
        width as u32,
        height as u32,
        config.placement.alignment,
        config.placement.gap_x,
        config.placement.gap_y,
    );

    if config.window.argb_visual {
        if let Some((visual, depth)) = find_argb_visual(screen) {
            debug!("found ARGB visual");
            let colormap = conn.generate_id()?;
            conn.create_colormap(ColormapAlloc::NONE, colormap, screen.root, visual)?;
            win.visual = visual;
            win.depth = depth;
            win.colormap = colormap;
            win.own_colormap = true;
            win.argb_visual = true;
        } else {
            debug!("no ARGB visual found");
        }
    }

    let wid = conn.generate_id()?;

    if kind == WindowType::Override {
        // An override-redirect window: no WM hints or button processing
        let mut aux = CreateWindowAux::new()
            .override_redirect(1)
            .backing_store(BackingStore::ALWAYS)
            .event_mask(EventMask::STRUCTURE_NOTIFY | EventMask::EXPOSURE);
        if win.argb_visual {
            aux = aux.border_pixel(0).colormap(win.colormap);
        } else {
            aux = aux.background_pixmap(BackPixmap::PARENT_RELATIVE);
        }

        // Parent is the desktop window (which might be a child of root)
        conn.create_window(
            win.depth,
            wid,
            win.desktop,
            x as i16,
            y as i16,
            width,
            height,
            0,
            WindowClass::INPUT_OUTPUT,
            win.visual,
            &aux,
        )?;
        conn.configure_window(wid, &ConfigureWindowAux::new().stack_mode(StackMode::BELOW))?;
        set_class(conn, wid, &config.window.class)?;
        info!("window type - override");
    } else {
        // A window managed by the window manager: process hints and buttons
        if kind == WindowType::Dock {
            x = 0;
            y = 0;
        }

        let mut aux = CreateWindowAux::new()
            .backing_store(BackingStore::ALWAYS)
            .event_mask(
                EventMask::STRUCTURE_NOTIFY
                    | EventMask::EXPOSURE
                    | EventMask::BUTTON_PRESS
                    | EventMask::BUTTON_RELEASE,
            );
        if kind == WindowType::Utility {
            aux = aux.save_under(1);
        }
        if win.argb_visual {
            aux = aux.border_pixel(0).colormap(win.colormap);
        } else {
            aux = aux.background_pixmap(BackPixmap::PARENT_RELATIVE);
        }

        // Parent is the root window so the WM can take control
        conn.create_window(
            win.depth,
            wid,
            screen.root,
            x as i16,
            y as i16,
            width,
            height,
            0,
            WindowClass::INPUT_OUTPUT,
            win.visual,
            &aux,
        )?;

        let hints = WindowHints::from_names(&config.window.hints);

        // Allow only decorated windows to be given input focus by the WM
        let input = !hints.contains(WindowHints::UNDECORATED);
        let initial_state = initial_wm_state(kind, &wm.quirks());
        conn.change_property32(
            PropMode::REPLACE,
            wid,
            atoms.wm_hints,
            atoms.wm_hints,
            &[
                INPUT_HINT | STATE_HINT,
                input as u32,
                initial_state,
                0,
                0,
                0,
                0,
                0,
                0,
            ],
        )?;

        set_class(conn, wid, &config.window.class)?;
        set_title(conn, atoms, wid, &config.window.title)?;

        // Empty WM_PROTOCOLS property
        conn.change_property32(PropMode::REPLACE, wid, atoms.wm_protocols, AtomEnum::ATOM, &[])?;

        if let Some(type_atom) = window_type_atom(atoms, kind) {
            conn.change_property32(
                PropMode::REPLACE,
                wid,
                atoms.net_wm_window_type,
                AtomEnum::ATOM,
                &[type_atom],
            )?;
            info!("window type - {:?}", kind);
        }

        apply_hints(conn, atoms, wid, hints)?;
    }

    win.window = wid;
    win.geometry = Rect::new(x, y, width as u32, height as u32);
    info!("drawing to created window (0x{:x})", wid);
    conn.map_window(wid)?;
    Ok(())
}

fn set_class<C: Connection>(conn: &C, win: Window, class: &str) -> Result<()> {
    let mut value = Vec::with_capacity(class.len() * 2 + 2);
    value.extend_from_slice(class.as_bytes());
    value.push(0);
    value.extend_from_slice(class.as_bytes());
    value.push(0);
    conn.change_property8(PropMode::REPLACE, win, AtomEnum::WM_CLASS, AtomEnum::STRING, &value)?;
    Ok(())
}

fn set_title<C: Connection>(conn: &C, atoms: &Atoms, win: Window, title: &str) -> Result<()> {
    conn.change_property8(
        PropMode::REPLACE,
        win,
        AtomEnum::WM_NAME,
        AtomEnum::STRING,
        title.as_bytes(),
    )?;
    conn.change_property8(
        PropMode::REPLACE,
        win,
        atoms.net_wm_name,
        atoms.utf8_string,
        title.as_bytes(),
    )?;
    Ok(())
}

/// Apply the configured background: real transparency on an ARGB visual,
/// otherwise ParentRelative chaining up the ancestry (pseudo-transparency),
/// otherwise the plain background color.
pub fn set_transparent_background<C: Connection>(
    conn: &C,
    screen: &Screen,
    win: &OverlayWindow,
    config: &Config,
) -> Result<()> {
    if win.argb_visual {
        let alpha = if config.window.transparent {
            0
        } else {
            config.window.argb_value as u32
        };
        let pixel = (alpha << 24) | (config.window.background_colour & 0x00FF_FFFF);
        conn.change_window_attributes(
            win.window,
            &ChangeWindowAttributesAux::new().background_pixel(pixel),
        )?;
        return Ok(());
    }

    if config.window.transparent {
        let mut parent = win.window;
        for _ in 0..MAX_BACKGROUND_CHAIN {
            if parent == screen.root {
                break;
            }
            conn.change_window_attributes(
                parent,
                &ChangeWindowAttributesAux::new().background_pixmap(BackPixmap::PARENT_RELATIVE),
            )?;
            let Ok(tree) = conn.query_tree(parent)?.reply() else {
                break;
            };
            parent = tree.parent;
        }
        return Ok(());
    }

    conn.change_window_attributes(
        win.window,
        &ChangeWindowAttributesAux::new()
            .background_pixel(config.window.background_colour & 0x00FF_FFFF),
    )?;
    Ok(())
}

/// Free graphics resources and zero the window record in one step; no
/// partial teardown state is observable afterwards.
pub fn destroy_window<C: Connection>(
    conn: &C,
    win: &mut OverlayWindow,
    own_window: bool,
) -> Result<()> {
    if win.state == WindowState::Created {
        if let Some(gc) = win.gc {
            conn.free_gc(gc)?;
        }
        if win.own_colormap {
            conn.free_colormap(win.colormap)?;
        }
        if own_window && win.window != 0 && win.window != win.desktop {
            conn.destroy_window(win.window)?;
        }
        conn.flush()?;
    }
    *win = OverlayWindow {
        state: WindowState::Destroyed,
        ..Default::default()
    };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeTree {
        children: HashMap<Window, Vec<Window>>,
        sizes: HashMap<Window, (u16, u16)>,
    }

    impl WindowTree for FakeTree {
        fn child_windows(&self, win: Window) -> Vec<Window> {
            self.children.get(&win).cloned().unwrap_or_default()
        }

        fn mapped_size(&self, win: Window) -> Option<(u16, u16)> {
            self.sizes.get(&win).copied()
        }
    }

    #[test]
    fn descends_to_matching_child() {
        let tree = FakeTree {
            children: HashMap::from([(1, vec![2, 3]), (3, vec![4])]),
            sizes: HashMap::from([(2, (100, 100)), (3, (1920, 1080)), (4, (1920, 1080))]),
        };
        assert_eq!(descend_to_size(&tree, 1, 1920, 1080), 4);
    }

    #[test]
    fn stays_put_when_nothing_matches() {
        let tree = FakeTree {
            children: HashMap::from([(1, vec![2])]),
            sizes: HashMap::from([(2, (640, 480))]),
        };
        assert_eq!(descend_to_size(&tree, 1, 1920, 1080), 1);
    }

    #[test]
    fn terminates_on_cyclic_tree() {
        // window 1 <-> 2, both claiming the target size
        let tree = FakeTree {
            children: HashMap::from([(1, vec![2]), (2, vec![1])]),
            sizes: HashMap::from([(1, (1920, 1080)), (2, (1920, 1080))]),
        };
        // must return within MAX_TREE_DEPTH iterations instead of looping
        let result = descend_to_size(&tree, 1, 1920, 1080);
        assert!(result == 1 || result == 2);
    }

    #[test]
    fn terminates_on_pathologically_deep_tree() {
        let mut children = HashMap::new();
        let mut sizes = HashMap::new();
        for i in 1u32..100 {
            children.insert(i, vec![i + 1]);
            sizes.insert(i + 1, (1920, 1080));
        }
        let tree = FakeTree { children, sizes };
        // ten levels at most
        assert_eq!(descend_to_size(&tree, 1, 1920, 1080), 11);
    }

    #[test]
    fn argb_scan_requires_standard_masks() {
        let argb = Visualtype {
            visual_id: 42,
            class: VisualClass::TRUE_COLOR,
            bits_per_rgb_value: 8,
            colormap_entries: 256,
            red_mask: 0xff0000,
            green_mask: 0x00ff00,
            blue_mask: 0x0000ff,
        };
        let bgr = Visualtype {
            visual_id: 43,
            red_mask: 0x0000ff,
            green_mask: 0x00ff00,
            blue_mask: 0xff0000,
            ..argb
        };

        let depths = vec![
            Depth { depth: 24, visuals: vec![argb] },
            Depth { depth: 32, visuals: vec![bgr, argb] },
        ];
        assert_eq!(argb_visual_in_depths(&depths), Some((42, 32)));

        let no_match = vec![Depth { depth: 32, visuals: vec![bgr] }];
        assert_eq!(argb_visual_in_depths(&no_match), None);
    }

    #[test]
    fn positions_follow_alignment() {
        let area = Rect::new(0, 0, 1920, 1080);
        assert_eq!(
            initial_position(area, 300, 400, Alignment::TopLeft, 10, 20),
            (10, 20)
        );
        assert_eq!(
            initial_position(area, 300, 400, Alignment::BottomRight, 10, 20),
            (1610, 660)
        );
        assert_eq!(
            initial_position(area, 300, 400, Alignment::MiddleMiddle, 10, 20),
            (810, 340)
        );
    }
}
