//!
//! A desktop overlay for X11: draws into (or just above) the desktop
//! background, reserves screen space via struts, tracks desktops and the
//! window manager, and forwards pointer input to the windows beneath it.

mod config;
mod geometry;
mod text;
mod x11;

use anyhow::Result;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use x11rb::connection::Connection;
use x11rb::protocol::Event;

use config::Config;
use x11::error::{fatal_io, log_protocol_error};
use x11::input::{self, InputBackend};
use x11::window;
use x11::X11Context;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "vigil=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting vigil");

    let config = Config::load()?;
    let mut ctx = X11Context::connect(&config)?;

    info!(
        "desktop {} under {} ({} monitor(s), pinned to {})",
        text::format_desktop(&ctx.desktop),
        text::format_wm_name(&ctx.wm),
        text::monitor_count(&*ctx.conn, ctx.root()),
        text::format_monitor(ctx_head(&config)),
    );
    if let Ok(locks) = text::LockKeys::query(&*ctx.conn) {
        debug!(
            "lock keys: caps {} num {} scroll {}",
            text::on_off(locks.caps),
            text::on_off(locks.num),
            text::on_off(locks.scroll)
        );
    }

    window::set_transparent_background(&*ctx.conn, ctx.screen(), &ctx.window, &config)?;
    if config.window.own_window && config.window.kind.is_managed() {
        ctx.publish_struts(config.placement.alignment)?;
    }
    ctx.conn.flush()?;

    run(&mut ctx, &config)?;

    ctx.destroy(&config)?;
    info!("shutting down");
    Ok(())
}

fn ctx_head(config: &Config) -> Option<usize> {
    config.placement.head_index
}

/// Blocking event loop; returns when the overlay window goes away
fn run(ctx: &mut X11Context, config: &Config) -> Result<()> {
    loop {
        let event = match ctx.conn.wait_for_event() {
            Ok(event) => event,
            Err(e) => fatal_io(e),
        };
        if handle_event(ctx, config, event)? {
            return Ok(());
        }
    }
}

/// Handle one event; returns true when the loop should stop
fn handle_event(ctx: &mut X11Context, config: &Config, event: Event) -> Result<bool> {
    let root = ctx.root();
    let self_window = ctx.window.window;

    match &event {
        Event::PropertyNotify(ev) if ev.window == root => {
            if ev.atom == ctx.atoms.resource_manager {
                debug!("root resource database changed");
                ctx.reload_resources();
                if let Some(dpi) = ctx.resources.dpi() {
                    debug!("Xft.dpi = {}", dpi);
                }
            } else {
                ctx.desktop.refresh(&*ctx.conn, &ctx.atoms, root, Some(ev.atom))?;
            }
        }

        Event::ConfigureNotify(ev) if ev.window == self_window => {
            let moved = ctx.window.geometry.x != ev.x as i32
                || ctx.window.geometry.y != ev.y as i32
                || ctx.window.geometry.width != ev.width as u32
                || ctx.window.geometry.height != ev.height as u32;
            if moved {
                ctx.window.geometry = geometry::Rect::new(
                    ev.x as i32,
                    ev.y as i32,
                    ev.width as u32,
                    ev.height as u32,
                );
                debug!(
                    "window moved to {},{} {}x{}",
                    ev.x, ev.y, ev.width, ev.height
                );
                // Reservations track the window, not the other way around
                if config.window.own_window && config.window.kind.is_managed() {
                    ctx.publish_struts(config.placement.alignment)?;
                    ctx.conn.flush()?;
                }
            }
        }

        Event::Expose(ev) if ev.count == 0 => {
            window::set_transparent_background(&*ctx.conn, ctx.screen(), &ctx.window, config)?;
            ctx.conn.flush()?;
        }

        Event::DestroyNotify(ev) if ev.window == self_window => {
            info!("overlay window destroyed externally");
            return Ok(true);
        }

        Event::XinputHierarchy(_) => {
            // Device cache is intentionally left as captured at startup
            debug!("input device hierarchy changed");
        }

        Event::Error(err) => log_protocol_error(err),

        _ => {}
    }

    // Input events the overlay doesn't consume go to the window below
    let desktop = ctx.window.desktop;
    match &ctx.input {
        InputBackend::Xi2 { devices, .. } => {
            for core in input::core_from_xi2(&event, devices) {
                input::propagate_event(&*ctx.conn, &ctx.atoms, root, self_window, desktop, core)?;
            }
        }
        InputBackend::Core => {
            if let Some(core) = input::forwardable(&event) {
                input::propagate_event(&*ctx.conn, &ctx.atoms, root, self_window, desktop, core)?;
            }
        }
    }

    Ok(false)
}
