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

//! Body decoding: transfer encoding first, then charset.
//!
//! Nothing here fails. Damaged transfer encoding yields as much as could be
//! decoded, and text in a charset we don't know is still returned with every
//! byte accounted for.

use std::borrow::Cow;
use std::str;

use encoding_rs::Encoding;
use log::trace;

use super::model::TransferEncoding;
use super::quoted_printable::qp_decode;

/// Undo the transfer encoding of `data`.
///
/// Identity encodings borrow `data` unchanged.
pub fn decode_transfer(data: &[u8], cte: TransferEncoding) -> Cow<[u8]> {
    if cte.is_identity() {
        return Cow::Borrowed(data);
    }

    match cte {
        TransferEncoding::Base64 => Cow::Owned(decode_base64(data)),
        TransferEncoding::QuotedPrintable => qp_decode(data),
        _ => Cow::Borrowed(data),
    }
}

/// Decode base64 the way a mail reader must.
///
/// Whitespace anywhere in the input is ignored. Decoding stops at the first
/// `=` (padding) or at the first byte which is neither whitespace nor part of
/// the base64 alphabet, and whatever was decoded up to that point is
/// returned. A trailing partial quantum still produces the bytes it fully
/// encodes.
pub fn decode_base64(data: &[u8]) -> Vec<u8> {
    let mut clean = Vec::with_capacity(data.len());
    for &byte in data {
        match byte {
            b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'+' | b'/' => {
                clean.push(byte)
            },
            b' ' | b'\t' | b'\r' | b'\n' | b'\x0b' | b'\x0c' => (),
            _ => break,
        }
    }

    let whole_quanta = clean.len() / 4 * 4;
    let mut decoded = Vec::with_capacity(clean.len() / 4 * 3 + 2);
    // Only alphabet characters in complete quanta remain, so this should
    // never fail.
    if let Err(e) = base64::decode_config_buf(
        &clean[..whole_quanta],
        base64::STANDARD,
        &mut decoded,
    ) {
        trace!("Unexpected base64 error on cleaned input: {}", e);
    }

    let tail = clean[whole_quanta..]
        .iter()
        .filter_map(|&b| sextet(b))
        .collect::<Vec<u8>>();
    if tail.len() >= 2 {
        decoded.push(tail[0] << 2 | tail[1] >> 4);
    }
    if tail.len() >= 3 {
        decoded.push(tail[1] << 4 | tail[2] >> 2);
    }

    decoded
}

fn sextet(b: u8) -> Option<u8> {
    match b {
        b'A'..=b'Z' => Some(b - b'A'),
        b'a'..=b'z' => Some(b - b'a' + 26),
        b'0'..=b'9' => Some(b - b'0' + 52),
        b'+' => Some(62),
        b'/' => Some(63),
        _ => None,
    }
}

/// Look up the encoding for a MIME charset name.
///
/// Labels are resolved per the WHATWG Encoding Standard, which is what
/// mail clients in practice do. This means that, for example, `us-ascii` and
/// `iso-8859-1` both resolve to windows-1252.
pub fn lookup_charset(charset: &str) -> Option<&'static Encoding> {
    Encoding::for_label_no_replacement(charset.trim().as_bytes())
}

/// Convert `data` in `charset` to text.
///
/// If `charset` is absent or unknown, `decode_fallback` is used instead.
pub fn decode_charset<'a>(
    data: &'a [u8],
    charset: Option<&str>,
) -> Cow<'a, str> {
    match charset.and_then(lookup_charset) {
        Some(encoding) => encoding.decode_with_bom_removal(data).0,
        None => {
            if let Some(charset) = charset {
                trace!("Unknown charset {:?}, using fallback", charset);
            }
            decode_fallback(data)
        },
    }
}

/// Byte-preserving conversion of `data` to text.
///
/// Valid UTF-8 is taken as is. Anything else is read as ISO-8859-1, i.e.,
/// each byte becomes the code point of the same value, so no byte is ever
/// lost or replaced.
pub fn decode_fallback(data: &[u8]) -> Cow<str> {
    match str::from_utf8(data) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => Cow::Owned(data.iter().copied().map(char::from).collect()),
    }
}
