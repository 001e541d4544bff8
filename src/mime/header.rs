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

//! Tokenisation of RFC 822 header blocks.
//!
//! The tokeniser never copies anything out of the message. Every field is
//! described by ranges into the buffer it was found in, and the unfolded
//! "logical" value is only assembled when somebody asks for it.

use std::borrow::Cow;
use std::ops::Range;
use std::str;

use super::model::TransferEncoding;

/// A single header field, as ranges into the message buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderField {
    /// The whole field, including continuation lines and the final line
    /// ending.
    pub raw: Range<usize>,
    /// The field name, without surrounding whitespace.
    pub name: Range<usize>,
    /// One range per physical line making up the value, each stripped of
    /// fold whitespace and line ending. Lines that are blank after stripping
    /// are not represented.
    pub value: Vec<Range<usize>>,
}

/// An ordered header block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderBlock {
    /// The header block, from the first byte of the first field to the byte
    /// before the blank line which terminates it.
    pub range: Range<usize>,
    pub fields: Vec<HeaderField>,
}

impl HeaderField {
    pub fn name<'a>(&self, data: &'a [u8]) -> &'a str {
        // The tokeniser only creates fields whose name is valid UTF-8
        str::from_utf8(&data[self.name.clone()]).unwrap_or("")
    }

    pub fn is_named(&self, data: &[u8], name: &str) -> bool {
        data[self.name.clone()].eq_ignore_ascii_case(name.as_bytes())
    }

    /// Returns the unfolded value of this field.
    ///
    /// Continuation lines are joined to the previous line with a single
    /// space. This only needs to allocate when the field actually spans more
    /// than one line.
    pub fn logical_value<'a>(&self, data: &'a [u8]) -> Cow<'a, [u8]> {
        match self.value.len() {
            0 => Cow::Borrowed(&[]),
            1 => Cow::Borrowed(&data[self.value[0].clone()]),
            _ => {
                let mut joined = Vec::with_capacity(
                    self.value.iter().map(|r| r.len() + 1).sum(),
                );
                for (ix, segment) in self.value.iter().enumerate() {
                    if ix > 0 {
                        joined.push(b' ');
                    }
                    joined.extend_from_slice(&data[segment.clone()]);
                }
                Cow::Owned(joined)
            },
        }
    }
}

impl HeaderBlock {
    pub fn first(&self, data: &[u8], name: &str) -> Option<&HeaderField> {
        self.fields.iter().find(|f| f.is_named(data, name))
    }
}

/// Tokenise the header block starting at `range.start`.
///
/// Scanning stops at the first blank line or at `range.end`. Returns the
/// header block and the offset at which the body begins, which is `range.end`
/// if no blank line was found.
///
/// This never fails. Lines which are not headers are skipped.
pub fn tokenize(data: &[u8], range: Range<usize>) -> (HeaderBlock, usize) {
    let mut fields = Vec::new();
    let mut current: Option<HeaderField> = None;
    let mut pos = range.start;
    let end = range.end;

    let (header_end, body_start) = loop {
        if pos >= end {
            break (end, end);
        }

        let line_end = memchr::memchr(b'\n', &data[pos..end])
            .map(|lf| pos + lf + 1)
            .unwrap_or(end);
        let content_end = pos + content_length(&data[pos..line_end]);

        if content_end == pos {
            break (pos, line_end);
        }

        if is_fold_whitespace(data[pos]) {
            if let Some(ref mut field) = current {
                field.raw.end = line_end;
                if let Some(segment) = trim(data, pos..content_end) {
                    field.value.push(segment);
                }
            }
        } else {
            if let Some(field) = current.take() {
                fields.push(field);
            }

            current = start_field(data, pos, content_end, line_end);
        }

        pos = line_end;
    };

    if let Some(field) = current.take() {
        fields.push(field);
    }

    (
        HeaderBlock {
            range: range.start..header_end,
            fields,
        },
        body_start,
    )
}

fn start_field(
    data: &[u8],
    start: usize,
    content_end: usize,
    line_end: usize,
) -> Option<HeaderField> {
    let colon = start + memchr::memchr(b':', &data[start..content_end])?;
    let name = trim(data, start..colon)?;
    let name_bytes = &data[name.clone()];
    if name_bytes.iter().copied().any(is_fold_whitespace)
        || str::from_utf8(name_bytes).is_err()
    {
        return None;
    }

    Some(HeaderField {
        raw: start..line_end,
        name,
        value: trim(data, colon + 1..content_end).into_iter().collect(),
    })
}

/// The length of `line` without its line ending.
fn content_length(line: &[u8]) -> usize {
    let mut len = line.len();
    if len > 0 && b'\n' == line[len - 1] {
        len -= 1;
    }
    if len > 0 && b'\r' == line[len - 1] {
        len -= 1;
    }
    len
}

fn is_fold_whitespace(b: u8) -> bool {
    b' ' == b || b'\t' == b
}

fn trim(data: &[u8], mut range: Range<usize>) -> Option<Range<usize>> {
    while range.start < range.end
        && data[range.start].is_ascii_whitespace()
    {
        range.start += 1;
    }
    while range.end > range.start && data[range.end - 1].is_ascii_whitespace()
    {
        range.end -= 1;
    }

    if range.start < range.end {
        Some(range)
    } else {
        None
    }
}

/// Parse the value of a Content-Transfer-Encoding header.
///
/// Returns `None` if the value is not a recognised encoding.
pub fn parse_content_transfer_encoding(
    value: &[u8],
) -> Option<TransferEncoding> {
    let value = str::from_utf8(value).ok()?.trim();
    // Some agents put comments after the token
    let token = value
        .split(|c: char| c.is_ascii_whitespace() || '(' == c || ';' == c)
        .next()
        .unwrap_or("");

    [
        TransferEncoding::SevenBit,
        TransferEncoding::EightBit,
        TransferEncoding::Binary,
        TransferEncoding::Base64,
        TransferEncoding::QuotedPrintable,
    ]
    .iter()
    .copied()
    .find(|cte| cte.as_str().eq_ignore_ascii_case(token))
}

#[cfg(test)]
mod test {
    use super::*;

    fn names(data: &[u8], block: &HeaderBlock) -> Vec<String> {
        block
            .fields
            .iter()
            .map(|f| f.name(data).to_owned())
            .collect()
    }

    fn values(data: &[u8], block: &HeaderBlock) -> Vec<String> {
        block
            .fields
            .iter()
            .map(|f| String::from_utf8_lossy(&f.logical_value(data)).into())
            .collect()
    }

    #[test]
    fn tokenize_simple() {
        let data = b"From: foo@bar.com\r\nSubject: hello\r\n\r\nbody\r\n";
        let (block, body_start) = tokenize(data, 0..data.len());

        assert_eq!(vec!["From", "Subject"], names(data, &block));
        assert_eq!(vec!["foo@bar.com", "hello"], values(data, &block));
        assert_eq!(0..35, block.range);
        assert_eq!(37, body_start);
        assert_eq!(b"body\r\n", &data[body_start..]);
        assert_eq!(0..19, block.fields[0].raw);
        assert_eq!(19..35, block.fields[1].raw);
    }

    #[test]
    fn tokenize_folded() {
        let data = b"Subject: hello\r\n  \tworld\r\n \r\n  again\r\n\
                     X-Foo: bar\r\n\r\n";
        let (block, body_start) = tokenize(data, 0..data.len());

        assert_eq!(vec!["Subject", "X-Foo"], names(data, &block));
        assert_eq!(vec!["hello world again", "bar"], values(data, &block));
        // A whitespace-only continuation doesn't end the block
        assert_eq!(0..38, block.fields[0].raw);
        assert_eq!(data.len(), body_start);

        // Single-line values are borrowed straight from the buffer
        assert!(matches!(
            block.fields[1].logical_value(data),
            Cow::Borrowed(_)
        ));
    }

    #[test]
    fn tokenize_unix_line_endings() {
        let data = b"A: 1\nB:2\n  3\n\nbody";
        let (block, body_start) = tokenize(data, 0..data.len());

        assert_eq!(vec!["A", "B"], names(data, &block));
        assert_eq!(vec!["1", "2 3"], values(data, &block));
        assert_eq!(0..13, block.range);
        assert_eq!(b"body", &data[body_start..]);
    }

    #[test]
    fn tokenize_without_blank_line() {
        let data = b"A: 1\r\nB: 2";
        let (block, body_start) = tokenize(data, 0..data.len());

        assert_eq!(vec!["1", "2"], values(data, &block));
        assert_eq!(0..data.len(), block.range);
        assert_eq!(data.len(), body_start);
    }

    #[test]
    fn tokenize_empty_header_block() {
        let data = b"\r\nhello world\r\n";
        let (block, body_start) = tokenize(data, 0..data.len());

        assert!(block.fields.is_empty());
        assert_eq!(0..0, block.range);
        assert_eq!(2, body_start);

        let (block, body_start) = tokenize(b"", 0..0);
        assert!(block.fields.is_empty());
        assert_eq!(0, body_start);
    }

    #[test]
    fn tokenize_skips_garbage() {
        let data = b" orphan continuation\r\n\
                     not a header\r\n\
                     \x20 continues nothing\r\n\
                     From foo@bar.com Mon Jan  1 00:00:00 2020\r\n\
                     : no name\r\n\
                     \xFF\xFE: bad name\r\n\
                     Good : yes\r\n\
                     \r\n";
        let (block, body_start) = tokenize(data, 0..data.len());

        assert_eq!(vec!["Good"], names(data, &block));
        assert_eq!(vec!["yes"], values(data, &block));
        assert_eq!(data.len(), body_start);
    }

    #[test]
    fn tokenize_subrange() {
        let data = b"junkA: 1\r\n\r\nbodyjunk";
        let (block, body_start) = tokenize(data, 4..data.len() - 4);

        assert_eq!(vec!["A"], names(data, &block));
        assert_eq!(4..10, block.range);
        assert_eq!(12, body_start);
    }

    #[test]
    fn empty_value() {
        let data = b"Subject:\r\nX: \r\n\r\n";
        let (block, _) = tokenize(data, 0..data.len());
        assert_eq!(vec!["", ""], values(data, &block));
    }

    #[test]
    fn test_parse_content_transfer_encoding() {
        assert_eq!(
            Some(TransferEncoding::Base64),
            parse_content_transfer_encoding(b" BASE64 ")
        );
        assert_eq!(
            Some(TransferEncoding::QuotedPrintable),
            parse_content_transfer_encoding(b"Quoted-Printable")
        );
        assert_eq!(
            Some(TransferEncoding::SevenBit),
            parse_content_transfer_encoding(b"7bit (plain)")
        );
        assert_eq!(
            Some(TransferEncoding::EightBit),
            parse_content_transfer_encoding(b"8Bit")
        );
        assert_eq!(None, parse_content_transfer_encoding(b"x-uuencode"));
        assert_eq!(None, parse_content_transfer_encoding(b"\xFF"));
    }
}
