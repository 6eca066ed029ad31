//! Control protocol: `GET /?speed=40&color=ff8800&remember=1`
//!
//! Only the request line matters. Its query is split into `key=value`
//! segments, each turned into a typed [`ControlCommand`] and applied to the
//! shared state before the next one is parsed. The first malformed segment
//! stops processing; commands applied before it stay applied.

use derive_more::{Display, Error};
use log::{debug, warn};

use crate::color::{parse_hex_color, HexColorError, RGB8};
use crate::page;
use crate::state::SharedState;

/// One validated mutation carried by a control request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Already clamped to `0..=100`
    SetSpeed(u8),
    SetColor(RGB8),
    SetPaint(bool),
}

impl ControlCommand {
    pub fn apply(self, state: &SharedState) {
        match self {
            Self::SetSpeed(speed) => {
                state.set_speed(u32::from(speed));
            }
            Self::SetColor(color) => state.set_color(color),
            Self::SetPaint(enabled) => state.set_paint_mode(enabled),
        }
    }
}

/// Why a query segment was rejected
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum ControlError {
    /// Segment without a `=`
    #[display("malformed parameter {param:?}")]
    MalformedParam { param: String },
    /// `speed` value that is not a plain decimal number
    #[display("invalid speed {value:?}")]
    InvalidSpeed { value: String },
    #[display("invalid color {value:?}: {source}")]
    InvalidColor { value: String, source: HexColorError },
}

/// Query part of an HTTP request: everything after the first `?` of the
/// request line, up to the next space or the end of the line.
///
/// Returns `None` when the request line carries no query.
pub fn extract_query(request: &str) -> Option<&str> {
    let line = request.lines().next()?;
    let (_, rest) = line.split_once('?')?;
    Some(rest.split(' ').next().unwrap_or(rest))
}

/// Parse a query string lazily, one command per yielded item.
///
/// Empty segments are skipped and unknown keys are ignored.
pub fn parse_query(query: &str) -> QueryParser<'_> {
    QueryParser {
        segments: query.split('&'),
    }
}

/// Iterator returned by [`parse_query`]
pub struct QueryParser<'a> {
    segments: core::str::Split<'a, char>,
}

impl Iterator for QueryParser<'_> {
    type Item = Result<ControlCommand, ControlError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let segment = self.segments.next()?;
            if segment.is_empty() {
                continue;
            }
            let Some((key, value)) = segment.split_once('=') else {
                return Some(Err(ControlError::MalformedParam {
                    param: segment.to_string(),
                }));
            };
            match key {
                "speed" => return Some(parse_speed(value)),
                "color" => return Some(parse_color(value)),
                "remember" => return Some(Ok(ControlCommand::SetPaint(value == "1"))),
                _ => debug!("Ignoring unknown control parameter {key:?}"),
            }
        }
    }
}

fn parse_speed(value: &str) -> Result<ControlCommand, ControlError> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ControlError::InvalidSpeed {
            value: value.to_string(),
        });
    }
    // All digits: the only possible failure is overflow, which clamps anyway
    let speed = value.parse::<u32>().unwrap_or(u32::MAX);
    #[allow(clippy::cast_possible_truncation)]
    let clamped = speed.min(u32::from(crate::state::MAX_SPEED)) as u8;
    Ok(ControlCommand::SetSpeed(clamped))
}

fn parse_color(value: &str) -> Result<ControlCommand, ControlError> {
    parse_hex_color(value)
        .map(ControlCommand::SetColor)
        .map_err(|source| ControlError::InvalidColor {
            value: value.to_string(),
            source,
        })
}

/// What a request changed
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RequestOutcome {
    /// Commands applied, in order
    pub applied: Vec<ControlCommand>,
    /// The error that stopped processing, if any
    pub error: Option<ControlError>,
}

/// Parse a raw request and apply its commands to `state`.
///
/// Invalid UTF-8 is replaced before parsing. A malformed segment is logged
/// and ends processing; it never fails the request.
pub fn apply_request(state: &SharedState, raw: &[u8]) -> RequestOutcome {
    let request = String::from_utf8_lossy(raw);
    let mut outcome = RequestOutcome::default();

    let Some(query) = extract_query(&request) else {
        return outcome;
    };

    for command in parse_query(query) {
        match command {
            Ok(command) => {
                debug!("Applying {command:?}");
                command.apply(state);
                outcome.applied.push(command);
            }
            Err(e) => {
                warn!("Rejected control request: {e}");
                outcome.error = Some(e);
                break;
            }
        }
    }
    outcome
}

/// Apply a raw request and build the full HTTP response for it.
///
/// Every request, malformed or not, gets the status page.
pub fn handle_request(state: &SharedState, raw: &[u8]) -> String {
    apply_request(state, raw);
    page::render_response(&state.snapshot())
}
