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

//! RFC 2047 "encoded words" in unstructured header values.

use std::borrow::Cow;

use lazy_static::lazy_static;
use regex::Regex;

use super::content_encoding::{decode_base64, lookup_charset};
use super::quoted_printable::qp_decode;

lazy_static! {
    static ref ENCODED_WORD: Regex =
        Regex::new(r"^=\?([!->@-~]*)\?([!->@-~]*)\?([!->@-~]*)\?=$").unwrap();
}

/// Decode all encoded words in the unstructured header value `value`.
///
/// Whitespace between two adjacent encoded words is removed; all other
/// whitespace is left alone. Words which look like encoded words but cannot
/// be decoded (e.g., because the charset is unknown) are kept verbatim.
pub fn decode_unstructured(value: &str) -> Cow<str> {
    if !value.contains("=?") {
        return Cow::Borrowed(value);
    }

    let mut out = String::with_capacity(value.len());
    let mut prev_encoded = false;
    let mut rest = value;
    while !rest.is_empty() {
        let after_ws = rest.trim_start();
        let ws = &rest[..rest.len() - after_ws.len()];
        let word_len = after_ws
            .find(char::is_whitespace)
            .unwrap_or_else(|| after_ws.len());
        let word = &after_ws[..word_len];
        rest = &after_ws[word_len..];

        if word.is_empty() {
            out.push_str(ws);
            break;
        }

        match ew_decode(word) {
            Some(decoded) => {
                if !prev_encoded {
                    out.push_str(ws);
                }
                out.push_str(&decoded);
                prev_encoded = true;
            },
            None => {
                out.push_str(ws);
                out.push_str(word);
                prev_encoded = false;
            },
        }
    }

    Cow::Owned(out)
}

/// Test if `word` (in its entirety) is an encoded word, and if so, decode it.
///
/// Returns `None` if it is not an encoded word or could not be decoded.
///
/// Like Thunderbird, we do not enforce the 75-character limit RFC 2047
/// places on encoded words, since there are agents that produce longer ones.
fn ew_decode(word: &str) -> Option<String> {
    let captures = ENCODED_WORD.captures(word)?;

    // RFC 2231 allows a language suffix on the charset
    let charset = captures.get(1)?.as_str().split('*').next()?;
    let transfer_encoding = captures.get(2)?.as_str();
    let content = captures.get(3)?.as_str().as_bytes();

    let encoding = lookup_charset(charset)?;
    let content: Cow<[u8]> = match transfer_encoding {
        "q" | "Q" => {
            // _ stands for ASCII space regardless of charset
            if content.contains(&b'_') {
                let spaced = content
                    .iter()
                    .map(|&b| if b'_' == b { b' ' } else { b })
                    .collect::<Vec<u8>>();
                Cow::Owned(qp_decode(&spaced).into_owned())
            } else {
                qp_decode(content)
            }
        },
        "b" | "B" => Cow::Owned(decode_base64(content)),
        _ => return None,
    };

    Some(encoding.decode_with_bom_removal(&content).0.into_owned())
}
