//! Color helpers shared by the renderer, the control protocol and the button.

use derive_more::{Display, Error};

pub use rgb::RGB8;

/// All channels off
pub const BLACK: RGB8 = RGB8::new(0, 0, 0);

/// Quick colors offered by the control page, in page order.
///
/// A single button press steps through this list; the first entry is the
/// power-on chase color.
pub const PRESET_COLORS: [RGB8; 12] = [
    RGB8::new(0xff, 0x00, 0x00),
    RGB8::new(0xff, 0x88, 0x00),
    RGB8::new(0xff, 0xff, 0x00),
    RGB8::new(0x00, 0xff, 0x00),
    RGB8::new(0x00, 0xff, 0xff),
    RGB8::new(0x00, 0x00, 0xff),
    RGB8::new(0x88, 0x00, 0xff),
    RGB8::new(0xff, 0x00, 0xff),
    RGB8::new(0xff, 0x14, 0x93),
    RGB8::new(0xff, 0xff, 0xff),
    RGB8::new(0xff, 0xaa, 0x55),
    RGB8::new(0x88, 0xff, 0x00),
];

/// Why a hex color string was rejected
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum HexColorError {
    /// Not exactly six digits after the optional prefix
    #[display("expected 6 hex digits, got {len}")]
    Length { len: usize },
    /// Six characters, but at least one is not a hex digit
    #[display("invalid hex digits {digits:?}")]
    Digit { digits: String },
}

/// Parse `rrggbb` (optionally prefixed with `#` or its URL encoding `%23`).
///
/// Upper- and lowercase digits are both accepted.
pub fn parse_hex_color(text: &str) -> Result<RGB8, HexColorError> {
    let digits = text
        .strip_prefix('#')
        .or_else(|| text.strip_prefix("%23"))
        .unwrap_or(text);

    if digits.len() != 6 {
        return Err(HexColorError::Length { len: digits.len() });
    }

    let mut bytes = [0u8; 3];
    hex::decode_to_slice(digits, &mut bytes).map_err(|_| HexColorError::Digit {
        digits: digits.to_string(),
    })?;

    Ok(RGB8::new(bytes[0], bytes[1], bytes[2]))
}

/// Format as six lowercase hex digits, without a prefix.
#[must_use]
pub fn to_hex(color: RGB8) -> String {
    hex::encode([color.r, color.g, color.b])
}

/// Multiply every channel by `factor`, truncating toward zero.
///
/// `factor` is expected in `[0.0, 1.0]`; anything outside saturates at the
/// `u8` bounds.
#[inline]
#[must_use]
pub fn scale(color: RGB8, factor: f32) -> RGB8 {
    // `as` truncates toward zero and saturates at the u8 bounds
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let channel = |c: u8| (f32::from(c) * factor) as u8;
    RGB8::new(channel(color.r), channel(color.g), channel(color.b))
}

/// Per-channel maximum of two colors
#[inline]
#[must_use]
pub fn max_channels(a: RGB8, b: RGB8) -> RGB8 {
    RGB8::new(a.r.max(b.r), a.g.max(b.g), a.b.max(b.b))
}
