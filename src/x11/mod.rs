//! X11 session
//!
//! Owns the connection and everything derived from it: interned atoms, the
//! detected window manager, the workarea, desktop state, the overlay
//! window, the input backend, and the root resource database.

pub mod atoms;
pub mod desktop;
pub mod error;
pub mod hints;
pub mod input;
pub mod resources;
pub mod strut;
pub mod window;
pub mod wm;
pub mod workarea;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{ChangeWindowAttributesAux, ConnectionExt as _, Screen};
use x11rb::rust_connection::RustConnection;

use crate::config::Config;
use crate::geometry::Rect;

use atoms::Atoms;
use desktop::DesktopInfo;
use error::FatalError;
use input::InputBackend;
use resources::ResourceDb;
use window::{OverlayWindow, WindowState};
use wm::WindowManager;

/// Everything the overlay holds against one X server connection
pub struct X11Context {
    pub conn: Arc<RustConnection>,
    pub screen_num: usize,
    pub atoms: Atoms,
    pub wm: WindowManager,
    pub workarea: Rect,
    pub desktop: DesktopInfo,
    pub window: OverlayWindow,
    pub input: InputBackend,
    pub resources: ResourceDb,
}

impl X11Context {
    /// Connect to the X server and bring up the full session: atoms, WM
    /// detection, workarea, desktop state, the overlay window, input event
    /// selection, and the resource database.
    pub fn connect(config: &Config) -> Result<Self> {
        let display = config.display.as_deref();
        let (conn, screen_num) = x11rb::connect(display).map_err(|e| {
            FatalError::OpenDisplay(format!(
                "{}: {}",
                display.unwrap_or("from $DISPLAY"),
                e
            ))
        })?;
        let conn = Arc::new(conn);
        info!("connected to X server (screen {})", screen_num);

        let atoms = Atoms::new(&*conn)?;
        let screen = conn.setup().roots[screen_num].clone();
        let root = screen.root;

        let wm = WindowManager::detect(&*conn, &atoms, root)?;

        let workarea = workarea::update_workarea(
            &*conn,
            root,
            screen.width_in_pixels,
            screen.height_in_pixels,
            config.placement.head_index,
        )?;

        let mut desktop = DesktopInfo::default();
        desktop.refresh(&*conn, &atoms, root, None)?;

        let mut win = window::create_window(&*conn, &screen, &atoms, &wm, config, workarea)?;

        // An owned window distinct from the desktop window; drawing onto
        // the desktop never selects button events there
        let owned = config.window.own_window && win.window != win.desktop;
        let input = InputBackend::setup(&*conn, root, owned.then_some(win.window))?;

        let mask = input::select_event_mask(
            config.window.own_window,
            config.window.kind,
            input.xinput_active(),
        );
        conn.change_window_attributes(
            win.window,
            &ChangeWindowAttributesAux::new().event_mask(mask),
        )?;
        win.event_mask = mask;
        conn.flush()?;

        let resources = ResourceDb::load(&*conn, &atoms, root);

        Ok(Self {
            conn,
            screen_num,
            atoms,
            wm,
            workarea,
            desktop,
            window: win,
            input,
            resources,
        })
    }

    pub fn screen(&self) -> &Screen {
        &self.conn.setup().roots[self.screen_num]
    }

    pub fn root(&self) -> u32 {
        self.screen().root
    }

    /// Recompute the workarea, e.g. after a head-related change
    pub fn refresh_workarea(&mut self, head_index: Option<usize>) -> Result<()> {
        let screen = self.screen();
        let (root, w, h) = (screen.root, screen.width_in_pixels, screen.height_in_pixels);
        self.workarea = workarea::update_workarea(&*self.conn, root, w, h, head_index)?;
        Ok(())
    }

    /// Publish struts reserving the overlay's edge of the screen
    pub fn publish_struts(&self, align: crate::config::Alignment) -> Result<()> {
        if self.window.state != WindowState::Created {
            return Ok(());
        }
        let screen = self.screen();
        strut::set_struts(
            &*self.conn,
            &self.atoms,
            &self.wm,
            self.window.window,
            self.window.geometry,
            screen.width_in_pixels,
            screen.height_in_pixels,
            align,
        )
    }

    /// Reload the root resource database snapshot
    pub fn reload_resources(&mut self) {
        self.resources = ResourceDb::load(&*self.conn, &self.atoms, self.root());
    }

    /// Tear down the overlay window and its graphics resources
    pub fn destroy(&mut self, config: &Config) -> Result<()> {
        window::destroy_window(&*self.conn, &mut self.window, config.window.own_window)
    }
}
