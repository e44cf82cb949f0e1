//! Decoding of reply payloads.
//!
//! Payloads come in two shapes: runs of fixed-width, zero-padded decimal fields, and short status tokens
//! that map onto a closed set of outcomes.

use core::str::FromStr;

use crate::{error::ProtocolError, transaction::Line};

/// Split `payload` into `N` all-digit groups of the given widths.
///
/// The payload must be exactly the sum of the widths long. Scaling the values is up to the caller.
pub fn parse_digit_groups<const N: usize>(
    payload: &str,
    widths: [usize; N],
) -> Result<[u16; N], ProtocolError> {
    let unexpected = || ProtocolError::UnexpectedResponse(to_line(payload));

    if payload.len() != widths.iter().sum::<usize>() || !payload.bytes().all(|b| b.is_ascii_digit()) {
        return Err(unexpected());
    }

    let mut groups = [0u16; N];
    let mut offset = 0;
    for (group, width) in groups.iter_mut().zip(widths) {
        *group = payload[offset..offset + width]
            .parse()
            .map_err(|_| unexpected())?;
        offset += width;
    }
    Ok(groups)
}

/// Look `payload` up in the token table of `E`. Unknown tokens are an error, never a default.
pub fn parse_token<E: FromStr>(payload: &str) -> Result<E, ProtocolError> {
    E::from_str(payload).map_err(|_| ProtocolError::UnexpectedResponse(to_line(payload)))
}

/// Copy `text` into a reply line, cutting it short if it does not fit.
pub(crate) fn to_line(text: &str) -> Line {
    let mut line = Line::new();
    for c in text.chars() {
        if line.push(c).is_err() {
            break;
        }
    }
    line
}
