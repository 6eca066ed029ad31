//! Status/control page served for every request

use crate::color::to_hex;
use crate::state::StateSnapshot;

const TEMPLATE: &str = include_str!("page.html");

/// Status line and headers sent ahead of the page
pub const RESPONSE_HEADER: &str =
    "HTTP/1.0 200 OK\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n";

/// Fill the page template from a state snapshot.
pub fn render_page(snapshot: &StateSnapshot) -> String {
    TEMPLATE
        .replace("{{SPEED}}", &snapshot.speed.to_string())
        .replace("{{COLOR}}", &to_hex(snapshot.color))
        .replace("{{REMEMBER}}", if snapshot.paint_mode { "checked" } else { "" })
}

/// Headers followed by the rendered page
pub fn render_response(snapshot: &StateSnapshot) -> String {
    let mut response = String::from(RESPONSE_HEADER);
    response.push_str(&render_page(snapshot));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{PRESET_COLORS, RGB8};

    fn snapshot(speed: u8, color: RGB8, paint_mode: bool) -> StateSnapshot {
        StateSnapshot {
            speed,
            color,
            paint_mode,
        }
    }

    #[test]
    fn test_all_placeholders_replaced() {
        let page = render_page(&snapshot(25, RGB8::new(255, 0, 0), false));
        assert!(!page.contains("{{"));
    }

    #[test]
    fn test_values_rendered() {
        let page = render_page(&snapshot(0, RGB8::new(0x12, 0xab, 0xef), true));
        assert!(page.contains("id=\"speed\" min=\"0\" max=\"100\" value=\"0\""));
        assert!(page.contains("value=\"#12abef\""));
        assert!(page.contains("id=\"remember\" checked"));
    }

    #[test]
    fn test_unchecked_remember() {
        let page = render_page(&snapshot(50, RGB8::new(0, 0, 0), false));
        assert!(page.contains("id=\"remember\" >"));
    }

    #[test]
    fn test_page_offers_every_preset() {
        let page = render_page(&snapshot(25, PRESET_COLORS[0], false));
        for color in PRESET_COLORS {
            assert!(page.contains(&format!("data-color=\"{}\"", to_hex(color))));
        }
    }

    #[test]
    fn test_response_header() {
        let response = render_response(&snapshot(25, PRESET_COLORS[0], false));
        assert!(response.starts_with(
            "HTTP/1.0 200 OK\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n<!DOCTYPE html>"
        ));
    }
}
