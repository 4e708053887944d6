/*!
 * Core file primitives shared by the builder and the splitter
 */

pub mod checksum;
pub mod link;
pub mod paths;

/// Human-readable byte count for `Bag-Size` (`1.5 MB`, decimal units)
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["KB", "MB", "GB", "TB", "PB"];
    if bytes < 1000 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = "B";
    for next in UNITS {
        if value < 1000.0 {
            break;
        }
        value /= 1000.0;
        unit = next;
    }
    format!("{:.1} {}", value, unit)
}
