//! Status LED color

use crate::color::{scale, BLACK, RGB8};

/// Brightness of the status LED relative to the chase color
pub const STATUS_DIM: f32 = 0.1;

/// Half period of the flicker shown while a request is being serviced
pub const FLICKER_MS: u64 = 50;

/// Color for the status LED at time `now_ms`.
///
/// Mirrors the chase color at [`STATUS_DIM`]. While `busy` it alternates
/// between that and off every [`FLICKER_MS`].
#[must_use]
pub fn status_color(chase: RGB8, busy: bool, now_ms: u64) -> RGB8 {
    if busy && (now_ms / FLICKER_MS) % 2 == 1 {
        return BLACK;
    }
    scale(chase, STATUS_DIM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_is_dim_chase_color() {
        let color = status_color(RGB8::new(255, 100, 0), false, 12_345);
        assert_eq!(color, RGB8::new(25, 10, 0));
    }

    #[test]
    fn test_busy_flickers() {
        let chase = RGB8::new(200, 200, 200);
        let dim = RGB8::new(20, 20, 20);
        assert_eq!(status_color(chase, true, 0), dim);
        assert_eq!(status_color(chase, true, 49), dim);
        assert_eq!(status_color(chase, true, 50), BLACK);
        assert_eq!(status_color(chase, true, 99), BLACK);
        assert_eq!(status_color(chase, true, 100), dim);
    }
}
