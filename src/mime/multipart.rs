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

//! Splitting of multipart bodies on their boundary delimiters.

use std::ops::Range;

use memchr::memchr;

/// The result of splitting a multipart body.
///
/// All ranges are absolute offsets into the buffer passed to `split`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Split {
    /// Everything before the first delimiter line, not including the line
    /// ending which belongs to that delimiter. If there is no delimiter at
    /// all, this is the whole body.
    pub preamble: Range<usize>,
    /// The raw content of each body part, in order.
    pub parts: Vec<Range<usize>>,
    /// Everything after the closing delimiter line, or `None` if there was no
    /// closing delimiter.
    pub epilogue: Option<Range<usize>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Delimiter {
    Separator,
    Terminator,
}

/// Split `data[body]` on `boundary` (which does not include the leading
/// `--`).
///
/// Delimiters are only recognised at the start of a line. The line ending
/// before a delimiter is part of the delimiter, not of the preceding body
/// part. If the closing delimiter is missing, the last body part runs to the
/// end of `body`.
pub fn split(data: &[u8], body: Range<usize>, boundary: &[u8]) -> Split {
    let mut preamble = body.clone();
    let mut parts = Vec::new();
    let mut current: Option<usize> = None;

    let mut line_start = body.start;
    while line_start < body.end {
        let line_end = memchr(b'\n', &data[line_start..body.end])
            .map_or(body.end, |ix| line_start + ix + 1);

        if let Some(delim) = delimiter(&data[line_start..line_end], boundary) {
            let lower = current.unwrap_or(body.start);
            let end = strip_preceding_line_ending(data, lower, line_start);
            match current {
                Some(start) => parts.push(start..end),
                None => preamble = body.start..end,
            }

            if Delimiter::Terminator == delim {
                return Split {
                    preamble,
                    parts,
                    epilogue: Some(line_end..body.end),
                };
            }

            current = Some(line_end);
        }

        line_start = line_end;
    }

    if let Some(start) = current {
        parts.push(start..body.end);
    }

    Split {
        preamble,
        parts,
        epilogue: None,
    }
}

fn delimiter(line: &[u8], boundary: &[u8]) -> Option<Delimiter> {
    if !line.starts_with(b"--") || !line[2..].starts_with(boundary) {
        return None;
    }

    let rest = &line[2 + boundary.len()..];
    if rest.starts_with(b"--") {
        Some(Delimiter::Terminator)
    } else if rest
        .iter()
        .all(|&b| b' ' == b || b'\t' == b || b'\r' == b || b'\n' == b)
    {
        Some(Delimiter::Separator)
    } else {
        None
    }
}

/// Given a delimiter line starting at `line_start`, return the end of the
/// content before it, excluding the CRLF or LF which precedes the delimiter.
/// The result is never less than `lower`.
fn strip_preceding_line_ending(
    data: &[u8],
    lower: usize,
    line_start: usize,
) -> usize {
    let mut end = line_start;
    if end > lower && b'\n' == data[end - 1] {
        end -= 1;
        if end > lower && b'\r' == data[end - 1] {
            end -= 1;
        }
    }
    end
}
