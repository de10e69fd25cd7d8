//! Error handling
//!
//! Protocol errors are never fatal: they are named, logged, and dropped so
//! the connection keeps operating. Losing the transport to the X server is
//! unrecoverable and terminates the process.

use thiserror::Error;
use tracing::{debug, error};
use x11rb::errors::ConnectionError;
use x11rb::x11_utils::X11Error;

/// Fatal faults that end the process
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("connection to X server lost: {0}")]
    Transport(#[from] ConnectionError),
    #[error("can't open display {0}")]
    OpenDisplay(String),
}

/// Human-readable names for the standard X11 error codes (1..=17)
const ERROR_NAMES: [&str; 17] = [
    "request", "value", "window", "pixmap", "atom",
    "cursor", "font", "match", "drawable", "access",
    "alloc", "colormap", "G context", "ID choice", "name",
    "length", "implementation",
];

/// Best-effort name for a standard error code; None for extension errors
/// and out-of-range codes.
pub fn error_name(code: u8) -> Option<&'static str> {
    if (1..=17).contains(&code) {
        Some(ERROR_NAMES[code as usize - 1])
    } else {
        None
    }
}

/// Log a protocol error and carry on.
///
/// x11rb resolves the failing request's name and owning extension when the
/// protocol is known; otherwise we fall back to the fixed code table, and
/// failing that to the raw numeric code.
pub fn log_protocol_error(err: &X11Error) {
    let name = match (error_name(err.error_code), &err.extension_name) {
        (Some(base), Some(ext)) => format!("{} ({})", base, ext),
        (Some(base), None) => base.to_string(),
        (None, _) => format!("{}", err.error_code),
    };

    let request = match err.request_name {
        Some(req) => req.to_string(),
        None => format!(
            "error code: [major: {}, minor: {}]",
            err.major_opcode, err.minor_opcode
        ),
    };

    debug!(
        "X {} Error: XID: 0x{:x}, Serial: {}, {}",
        name, err.bad_value, err.sequence, request
    );
}

/// An IO error on the display connection leaves every pending drawing
/// operation meaningless; terminate with a diagnostic.
pub fn fatal_io(err: ConnectionError) -> ! {
    error!("X IO Error: {}", FatalError::Transport(err));
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_codes_resolve_to_names() {
        assert_eq!(error_name(1), Some("request"));
        assert_eq!(error_name(2), Some("value"));
        assert_eq!(error_name(3), Some("window"));
        assert_eq!(error_name(12), Some("colormap"));
        assert_eq!(error_name(17), Some("implementation"));
    }

    #[test]
    fn extension_codes_fall_through() {
        assert_eq!(error_name(0), None);
        assert_eq!(error_name(18), None);
        assert_eq!(error_name(255), None);
    }
}
