//-
// Copyright (c) 2020, Jason Lingle
//
// This file is part of Mailpar.
//
// Mailpar is free software: you can  redistribute it and/or modify it under the
// terms of  the GNU General Public  License as published by  the Free Software
// Foundation, either version  3 of the License, or (at  your option) any later
// version.
//
// Mailpar is distributed  in the hope that  it will be useful,  but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Mailpar. If not, see <http://www.gnu.org/licenses/>.

use std::borrow::Cow;

/// Decodes quoted-printable encoding, as described by RFC 2045.
///
/// Encoded bytes and soft line endings are both handled, the latter by
/// discarding. UNIX line endings are handled as well as DOS line endings, and
/// whitespace between the `=` and the line ending of a soft line break is
/// tolerated. An `=` at the very end of the input is also treated as a soft
/// line break.
///
/// This never fails. Invalid sequences are passed through untransformed.
/// 8-bit characters are passed through, including invalid UTF-8.
pub fn qp_decode(s: &[u8]) -> Cow<[u8]> {
    if memchr::memchr(b'=', s).is_none() {
        return Cow::Borrowed(s);
    }

    let mut transformed = Vec::with_capacity(s.len());
    let mut rest = s;
    while let Some(eq) = memchr::memchr(b'=', rest) {
        transformed.extend_from_slice(&rest[..eq]);
        let after = &rest[eq + 1..];

        if let Some(len) = soft_line_break(after) {
            rest = &after[len..];
            continue;
        }

        let hi = after.get(0).copied().and_then(hex_value);
        let lo = after.get(1).copied().and_then(hex_value);
        match (hi, lo) {
            (Some(hi), Some(lo)) => {
                transformed.push(hi << 4 | lo);
                rest = &after[2..];
            },
            _ => {
                transformed.push(b'=');
                rest = after;
            },
        }
    }
    transformed.extend_from_slice(rest);

    Cow::Owned(transformed)
}

/// If `after_eq` (the text after an `=`) begins a soft line break, return
/// the number of bytes the break occupies.
fn soft_line_break(after_eq: &[u8]) -> Option<usize> {
    let padding = after_eq
        .iter()
        .take_while(|&&b| b' ' == b || b'\t' == b)
        .count();
    match after_eq[padding..] {
        [] => Some(padding),
        [b'\n', ..] => Some(padding + 1),
        [b'\r', b'\n', ..] => Some(padding + 2),
        _ => None,
    }
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}
