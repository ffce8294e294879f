//! Network connectivity check used as the "network connected" job constraint.

use std::fs;
use std::path::Path;
use tracing::debug;

/// Default network interface class directory
pub const NET_CLASS_ROOT: &str = "/sys/class/net";

/// Returns true if any non-loopback interface is up.
///
/// Interfaces reporting `unknown` operstate (tun, ppp, some wwan drivers)
/// count as up when they have carrier. If `root` cannot be read at all the
/// host is assumed to be connected, so the send is attempted and the HTTP
/// client decides.
pub fn is_network_connected<P: AsRef<Path>>(root: P) -> bool {
    let root = root.as_ref();

    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot read {}: {}, assuming connected", root.display(), e);
            return true;
        }
    };

    for entry in entries.flatten() {
        let iface = entry.path();
        if entry.file_name().to_str() == Some("lo") {
            continue;
        }

        let operstate = read_attr(&iface, "operstate");
        match operstate.as_deref() {
            Some("up") => {
                debug!("Interface {:?} is up", entry.file_name());
                return true;
            }
            Some("unknown") if read_attr(&iface, "carrier").as_deref() == Some("1") => {
                debug!("Interface {:?} has carrier", entry.file_name());
                return true;
            }
            _ => {}
        }
    }

    false
}

fn read_attr(iface: &Path, attr: &str) -> Option<String> {
    fs::read_to_string(iface.join(attr))
        .ok()
        .map(|s| s.trim().to_string())
}
