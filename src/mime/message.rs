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

//! The read-only view of a parsed message.
//!
//! A `Message` owns the raw bytes and the part tree. Everything else in this
//! module is a cheap, copyable view borrowing the `Message`, so nothing
//! derived from a message can outlive its bytes.
//!
//! Every view offers both the raw form of what it describes (offsets,
//! lengths, and the exact bytes) and decoded forms. Decoded forms are
//! computed on each call and never cached.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use super::content_encoding::{decode_charset, decode_transfer};
use super::content_type::is_token_byte;
use super::encoded_word::decode_unstructured;
use super::grovel;
use super::header::{HeaderBlock, HeaderField};
use super::model::*;
use crate::support::error::Error;
use crate::support::parse_config::ParseConfig;

/// A parsed message.
///
/// The part tree is built once, when the message is parsed, and is immutable
/// afterwards.
#[derive(Clone)]
pub struct Message {
    data: Arc<[u8]>,
    nodes: Vec<PartNode>,
}

/// One part of a message. The root part is the message itself.
#[derive(Clone, Copy)]
pub struct Part<'a> {
    message: &'a Message,
    node: &'a PartNode,
}

/// The header block of a part.
#[derive(Clone, Copy)]
pub struct Headers<'a> {
    data: &'a [u8],
    block: &'a HeaderBlock,
}

/// A single header field.
#[derive(Clone, Copy)]
pub struct Header<'a> {
    data: &'a [u8],
    field: &'a HeaderField,
}

/// Generates methods on `Message` which forward to its root part.
macro_rules! delegate_to_root {
    ($($(#[$meta:meta])*
       fn $name:ident(&self $(, $arg:ident: $argty:ty)*) -> $ret:ty;)*) => {
        $(
            $(#[$meta])*
            pub fn $name(&self $(, $arg: $argty)*) -> $ret {
                self.root().$name($($arg),*)
            }
        )*
    };
}

impl Message {
    /// Parse `data` with the default limits.
    ///
    /// This never fails. Malformed input produces the best tree that can be
    /// made of it.
    pub fn parse(data: impl Into<Arc<[u8]>>) -> Self {
        Self::parse_with_config(data, &ParseConfig::default())
    }

    /// Parse `data` with the given limits.
    pub fn parse_with_config(
        data: impl Into<Arc<[u8]>>,
        config: &ParseConfig,
    ) -> Self {
        let data = data.into();
        let nodes = grovel::build(&data, config);
        Message { data, nodes }
    }

    /// The part representing the whole message.
    pub fn root(&self) -> Part<'_> {
        self.part(0)
    }

    /// The raw bytes of the whole message.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The total number of parts, including the root.
    pub fn part_count(&self) -> usize {
        self.nodes.len()
    }

    /// Find the part at `path`, where the empty path is the root.
    pub fn part_at(&self, path: &[usize]) -> Result<Part<'_>, Error> {
        let mut part = self.root();
        for &ix in path {
            part = part
                .subpart(ix)
                .map_err(|_| Error::NoSuchPart(path.to_vec()))?;
        }
        Ok(part)
    }

    /// Iterate over every part of the message, depth-first, starting with
    /// the root.
    pub fn parts(&self) -> impl Iterator<Item = Part<'_>> + '_ {
        self.nodes.iter().map(move |node| Part {
            message: self,
            node,
        })
    }

    fn part(&self, ix: usize) -> Part<'_> {
        Part {
            message: self,
            node: &self.nodes[ix],
        }
    }

    delegate_to_root! {
        fn path(&self) -> &[usize];
        fn offset(&self) -> usize;
        fn raw_byte_offset(&self) -> usize;
        fn raw_length(&self) -> usize;
        fn raw_bytes(&self) -> &[u8];
        fn body_offset(&self) -> usize;
        fn raw_body_offset(&self) -> usize;
        fn raw_body_length(&self) -> usize;
        fn body_raw(&self) -> &[u8];
        fn get_body_raw(&self) -> &[u8];
        fn body_encoding(&self) -> TransferEncoding;
        fn body_encoded(&self) -> Cow<'_, [u8]>;
        fn get_body_encoded(&self) -> Cow<'_, [u8]>;
        fn body(&self) -> Cow<'_, str>;
        fn get_body(&self) -> Cow<'_, str>;
        fn content_type(&self) -> &ContentTypeInfo;
        fn mime_type(&self) -> &str;
        fn charset(&self) -> Option<&str>;
        fn params(&self) -> &Params;
        fn param(&self, name: &str) -> Result<Option<&str>, Error>;
        fn content_disposition(&self) -> &ContentDispositionInfo;
        fn filename(&self) -> Option<&str>;
        fn headers(&self) -> Headers<'_>;
        fn subpart_count(&self) -> usize;
        fn subpart(&self, index: usize) -> Result<Part<'_>, Error>;
        fn subparts(&self) -> impl Iterator<Item = Part<'_>> + '_;
        fn is_multipart(&self) -> bool;
        fn is_embedded_message(&self) -> bool;
        fn preamble(&self) -> Option<&[u8]>;
        fn epilogue(&self) -> Option<&[u8]>;
        fn walk(&self) -> Walk<'_>;
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Message")
            .field("length", &self.data.len())
            .field("parts", &self.nodes.len())
            .finish()
    }
}

impl<'a> Part<'a> {
    /// The indices leading from the root to this part.
    pub fn path(&self) -> &'a [usize] {
        &self.node.path
    }

    /// The nesting depth of this part; 0 for the root.
    pub fn depth(&self) -> usize {
        self.node.path.len()
    }

    /// The part containing this one, or `None` for the root.
    pub fn parent(&self) -> Option<Part<'a>> {
        self.node.parent.map(|ix| self.message.part(ix))
    }

    /// The absolute offset of the start of this part, headers included.
    pub fn offset(&self) -> usize {
        self.node.range.start
    }

    pub fn raw_byte_offset(&self) -> usize {
        self.offset()
    }

    pub fn raw_length(&self) -> usize {
        self.node.range.len()
    }

    /// The exact bytes of this part, headers included.
    pub fn raw_bytes(&self) -> &'a [u8] {
        &self.message.data[self.node.range.clone()]
    }

    /// The absolute offset of the start of the body.
    pub fn body_offset(&self) -> usize {
        self.node.body.start
    }

    pub fn raw_body_offset(&self) -> usize {
        self.body_offset()
    }

    pub fn raw_body_length(&self) -> usize {
        self.node.body.len()
    }

    /// The body exactly as it appears in the message.
    pub fn body_raw(&self) -> &'a [u8] {
        &self.message.data[self.node.body.clone()]
    }

    pub fn get_body_raw(&self) -> &'a [u8] {
        self.body_raw()
    }

    pub fn body_encoding(&self) -> TransferEncoding {
        self.node.transfer_encoding
    }

    /// The body with its transfer encoding removed.
    ///
    /// Broken base64 or quoted-printable does not cause an error; as much of
    /// the body as could be decoded is returned.
    pub fn body_encoded(&self) -> Cow<'a, [u8]> {
        decode_transfer(self.body_raw(), self.node.transfer_encoding)
    }

    pub fn get_body_encoded(&self) -> Cow<'a, [u8]> {
        self.body_encoded()
    }

    /// The body as text, with the transfer encoding removed and converted
    /// from its charset.
    ///
    /// If the charset is absent or unknown, valid UTF-8 is returned as is and
    /// anything else is read as ISO-8859-1.
    pub fn body(&self) -> Cow<'a, str> {
        let charset = self.charset();
        match self.body_encoded() {
            Cow::Borrowed(bytes) => decode_charset(bytes, charset),
            Cow::Owned(bytes) => {
                Cow::Owned(decode_charset(&bytes, charset).into_owned())
            },
        }
    }

    pub fn get_body(&self) -> Cow<'a, str> {
        self.body()
    }

    pub fn content_type(&self) -> &'a ContentTypeInfo {
        &self.node.content_type
    }

    /// The `type/subtype` of this part, in lower case.
    pub fn mime_type(&self) -> &'a str {
        &self.node.content_type.mime_type
    }

    pub fn charset(&self) -> Option<&'a str> {
        self.node.content_type.charset.as_deref()
    }

    /// All Content-Type parameters.
    pub fn params(&self) -> &'a Params {
        &self.node.content_type.params
    }

    /// Look up a single Content-Type parameter, case-insensitively.
    ///
    /// Fails if `name` could not possibly be a parameter name.
    pub fn param(&self, name: &str) -> Result<Option<&'a str>, Error> {
        if name.is_empty() || !name.bytes().all(is_token_byte) {
            return Err(Error::InvalidParameterName(name.to_owned()));
        }

        Ok(self.params().get(name))
    }

    pub fn content_disposition(&self) -> &'a ContentDispositionInfo {
        &self.node.content_disposition
    }

    /// The suggested file name, from the Content-Disposition `filename` or
    /// failing that the Content-Type `name`.
    pub fn filename(&self) -> Option<&'a str> {
        self.node
            .content_disposition
            .params
            .get("filename")
            .or_else(|| self.params().get("name"))
    }

    pub fn headers(&self) -> Headers<'a> {
        Headers {
            data: &self.message.data,
            block: &self.node.headers,
        }
    }

    pub fn subpart_count(&self) -> usize {
        self.node.kind.children().len()
    }

    pub fn subpart(&self, index: usize) -> Result<Part<'a>, Error> {
        let children = self.node.kind.children();
        children
            .get(index)
            .map(|&ix| self.message.part(ix))
            .ok_or(Error::SubpartOutOfRange {
                index,
                count: children.len(),
            })
    }

    pub fn subparts(&self) -> impl Iterator<Item = Part<'a>> + 'a {
        let message = self.message;
        self.node
            .kind
            .children()
            .iter()
            .map(move |&ix| message.part(ix))
    }

    /// Whether this part was split into body parts.
    ///
    /// A multipart which could not be split is not considered a multipart by
    /// this method, even though its content type says otherwise.
    pub fn is_multipart(&self) -> bool {
        match self.node.kind {
            PartKind::Multipart { .. } => true,
            _ => false,
        }
    }

    /// Whether this part contains an embedded message as its one subpart.
    pub fn is_embedded_message(&self) -> bool {
        match self.node.kind {
            PartKind::EmbeddedMessage { .. } => true,
            _ => false,
        }
    }

    /// The bytes of a multipart body before the first delimiter.
    pub fn preamble(&self) -> Option<&'a [u8]> {
        match self.node.kind {
            PartKind::Multipart { ref preamble, .. } => {
                Some(&self.message.data[preamble.clone()])
            },
            _ => None,
        }
    }

    /// The bytes of a multipart body after the closing delimiter.
    ///
    /// This is `None` if the multipart was never closed.
    pub fn epilogue(&self) -> Option<&'a [u8]> {
        match self.node.kind {
            PartKind::Multipart {
                epilogue: Some(ref epilogue),
                ..
            } => Some(&self.message.data[epilogue.clone()]),
            _ => None,
        }
    }

    /// Iterate over this part and all its descendants, depth-first.
    pub fn walk(&self) -> Walk<'a> {
        Walk { stack: vec![*self] }
    }
}

impl fmt::Debug for Part<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Part")
            .field("path", &self.node.path)
            .field("mime_type", &self.node.content_type.mime_type)
            .field("range", &self.node.range)
            .field("body", &self.node.body)
            .finish()
    }
}

/// Depth-first iterator over a part and its descendants.
#[derive(Clone, Debug)]
pub struct Walk<'a> {
    stack: Vec<Part<'a>>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = Part<'a>;

    fn next(&mut self) -> Option<Part<'a>> {
        let part = self.stack.pop()?;
        self.stack.extend(
            part.node
                .kind
                .children()
                .iter()
                .rev()
                .map(|&ix| part.message.part(ix)),
        );
        Some(part)
    }
}

impl<'a> Headers<'a> {
    /// The absolute offset of the header block.
    pub fn offset(&self) -> usize {
        self.block.range.start
    }

    pub fn raw_length(&self) -> usize {
        self.block.range.len()
    }

    /// The exact bytes of the header block, not including the blank line
    /// which ends it.
    pub fn raw_bytes(&self) -> &'a [u8] {
        &self.data[self.block.range.clone()]
    }

    pub fn len(&self) -> usize {
        self.block.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.block.fields.is_empty()
    }

    /// Iterate over all fields, in order.
    pub fn iter(&self) -> impl Iterator<Item = Header<'a>> + 'a {
        let data = self.data;
        self.block
            .fields
            .iter()
            .map(move |field| Header { data, field })
    }

    /// The first field called `name`, case-insensitively.
    pub fn first(&self, name: &str) -> Option<Header<'a>> {
        let data = self.data;
        self.block
            .first(data, name)
            .map(|field| Header { data, field })
    }

    /// All fields called `name`, case-insensitively, in order.
    pub fn all(&self, name: &str) -> Vec<Header<'a>> {
        self.iter().filter(|h| h.is_named(name)).collect()
    }
}

impl fmt::Debug for Headers<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a> Header<'a> {
    pub fn name(&self) -> &'a str {
        self.field.name(self.data)
    }

    fn is_named(&self, name: &str) -> bool {
        self.field.is_named(self.data, name)
    }

    pub fn offset(&self) -> usize {
        self.field.raw.start
    }

    pub fn raw_length(&self) -> usize {
        self.field.raw.len()
    }

    /// The exact bytes of the field, including continuation lines and the
    /// final line ending.
    pub fn raw_bytes(&self) -> &'a [u8] {
        &self.data[self.field.raw.clone()]
    }

    /// The unfolded value, without any further interpretation.
    pub fn raw_value(&self) -> Cow<'a, [u8]> {
        self.field.logical_value(self.data)
    }

    /// The unfolded value as text, with RFC 2047 encoded words decoded.
    ///
    /// Bytes which are not valid UTF-8 are replaced.
    pub fn value(&self) -> Cow<'a, str> {
        match self.raw_value() {
            Cow::Borrowed(bytes) => match String::from_utf8_lossy(bytes) {
                Cow::Borrowed(s) => decode_unstructured(s),
                Cow::Owned(s) => {
                    Cow::Owned(decode_unstructured(&s).into_owned())
                },
            },
            Cow::Owned(bytes) => Cow::Owned(
                decode_unstructured(&String::from_utf8_lossy(&bytes))
                    .into_owned(),
            ),
        }
    }
}

impl fmt::Debug for Header<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Header")
            .field("name", &self.name())
            .field("raw", &self.field.raw)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    fn crlf(s: &str) -> String {
        s.replace('\n', "\r\n")
    }

    const MULTIPART: &str = "\
From: Alice <alice@example.com>
Subject: =?ISO-8859-1?Q?Caf=E9?= menu
 for today
Content-Type: multipart/mixed; boundary=\"XYZ\"

This is the preamble.
--XYZ
Content-Type: text/plain; charset=iso-8859-1
Content-Transfer-Encoding: quoted-printable

Hi=20there=
friend =E9
--XYZ
Content-Type: application/octet-stream; name=\"data.bin\"
Content-Disposition: attachment; filename=\"hello.txt\"
Content-Transfer-Encoding: base64

aGVsbG8=
--XYZ
Content-Type: message/rfc822

Subject: inner

Inner body
--XYZ--
Epilogue
";

    #[test]
    fn root_covers_whole_buffer() {
        let raw = crlf(MULTIPART);
        let message = Message::parse(raw.as_bytes());

        assert_eq!(0, message.offset());
        assert_eq!(raw.len(), message.raw_length());
        assert_eq!(raw.as_bytes(), message.raw_bytes());
        assert_eq!(raw.as_bytes(), message.data());
        assert!(message.path().is_empty());
        assert_eq!(0, message.root().depth());
        assert!(message.root().parent().is_none());
    }

    #[test]
    fn multipart_structure() {
        let raw = crlf(MULTIPART);
        let message = Message::parse(raw.as_bytes());

        assert_eq!("multipart/mixed", message.mime_type());
        assert_eq!(Some("XYZ"), message.param("boundary").unwrap());
        assert!(message.is_multipart());
        assert_eq!(3, message.subpart_count());
        assert_eq!(5, message.part_count());
        assert_eq!(
            Some(&b"This is the preamble."[..]),
            message.preamble()
        );
        assert_eq!(Some(&b"Epilogue\r\n"[..]), message.epilogue());

        let mut prev_end = message.body_offset();
        for (ix, part) in message.subparts().enumerate() {
            assert_eq!(&[ix], part.path());
            assert_eq!(1, part.depth());
            assert!(part.parent().unwrap().path().is_empty());
            assert!(part.offset() >= prev_end);
            assert!(part.offset() + part.raw_length() <= raw.len());
            assert!(part.body_offset() >= part.offset());
            prev_end = part.offset() + part.raw_length();
        }
        assert!(prev_end <= message.body_offset() + message.raw_body_length());

        let embedded = message.subpart(2).unwrap();
        assert!(embedded.is_embedded_message());
        let inner = embedded.subpart(0).unwrap();
        assert_eq!(&[2, 0], inner.path());
        assert_eq!(2, inner.depth());
        assert_eq!(
            "inner",
            inner.headers().first("subject").unwrap().value()
        );
        assert_eq!("Inner body", inner.body());
        assert_eq!(
            inner.path(),
            message.part_at(&[2, 0]).unwrap().path()
        );

        assert_eq!(
            vec![vec![], vec![0], vec![1], vec![2], vec![2, 0]],
            message
                .walk()
                .map(|p| p.path().to_vec())
                .collect::<Vec<_>>()
        );
        assert_eq!(
            message.walk().map(|p| p.offset()).collect::<Vec<_>>(),
            message.parts().map(|p| p.offset()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn body_decoding() {
        let raw = crlf(MULTIPART);
        let message = Message::parse(raw.as_bytes());

        let text = message.subpart(0).unwrap();
        assert_eq!(TransferEncoding::QuotedPrintable, text.body_encoding());
        assert_eq!(b"Hi=20there=\r\nfriend =E9", text.body_raw());
        assert_eq!(b"Hi therefriend \xE9", &text.body_encoded()[..]);
        assert_eq!("Hi therefriend \u{E9}", text.body());
        assert_eq!(Some("iso-8859-1"), text.charset());

        let attachment = message.subpart(1).unwrap();
        assert_eq!(TransferEncoding::Base64, attachment.body_encoding());
        assert_eq!(b"aGVsbG8=", attachment.get_body_raw());
        assert_eq!(b"hello", &attachment.get_body_encoded()[..]);
        assert_eq!("hello", attachment.get_body());
        assert!(attachment.content_disposition().is_attachment());
        assert_eq!(Some("hello.txt"), attachment.filename());
        assert_eq!(Some("data.bin"), attachment.param("NAME").unwrap());
        assert_eq!(None, attachment.charset());
    }

    #[test]
    fn header_access() {
        let raw = crlf(MULTIPART);
        let message = Message::parse(raw.as_bytes());
        let headers = message.headers();

        assert_eq!(0, headers.offset());
        assert_eq!(3, headers.len());
        assert!(!headers.is_empty());
        assert!(headers.raw_bytes().starts_with(b"From: Alice"));
        assert!(headers.raw_bytes().ends_with(b"boundary=\"XYZ\"\r\n"));
        assert_eq!(
            message.body_offset(),
            headers.offset() + headers.raw_length() + 2
        );

        let ct = headers.first("content-type").unwrap();
        assert_eq!("Content-Type", ct.name());
        assert_eq!(
            &b"multipart/mixed; boundary=\"XYZ\""[..],
            &ct.raw_value()[..]
        );

        let subject = headers.first("SUBJECT").unwrap();
        assert_eq!(
            b"Subject: =?ISO-8859-1?Q?Caf=E9?= menu\r\n for today\r\n",
            subject.raw_bytes()
        );
        assert_eq!(subject.raw_bytes().len(), subject.raw_length());
        assert_eq!(
            subject.raw_bytes(),
            &raw.as_bytes()[subject.offset()..][..subject.raw_length()]
        );
        assert_eq!(
            &b"=?ISO-8859-1?Q?Caf=E9?= menu for today"[..],
            &subject.raw_value()[..]
        );
        assert_eq!("Caf\u{E9} menu for today", subject.value());

        assert!(headers.first("X-Missing").is_none());
        assert!(headers.all("X-Missing").is_empty());
        assert_eq!(
            vec!["From", "Subject", "Content-Type"],
            headers.iter().map(|h| h.name()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn repeated_headers() {
        let raw = crlf(
            "Received: from a\n\
             Received: from b\n\
             received: from c\n\
             \n",
        );
        let message = Message::parse(raw.as_bytes());
        let received = message.headers().all("RECEIVED");
        assert_eq!(
            vec!["from a", "from b", "from c"],
            received.iter().map(|h| h.value()).collect::<Vec<_>>()
        );
        assert_eq!(
            "from a",
            message.headers().first("received").unwrap().value()
        );
    }

    #[test]
    fn accessor_errors() {
        let raw = crlf(MULTIPART);
        let message = Message::parse(raw.as_bytes());

        assert_matches!(
            Err(Error::SubpartOutOfRange { index: 3, count: 3 }),
            message.subpart(3)
        );
        assert_matches!(
            Err(Error::SubpartOutOfRange { index: 0, count: 0 }),
            message.subpart(0).unwrap().subpart(0)
        );
        assert_matches!(Err(Error::NoSuchPart(_)), message.part_at(&[0, 0]));
        assert_matches!(Err(Error::NoSuchPart(_)), message.part_at(&[7]));
        assert_matches!(Ok(_), message.part_at(&[]));

        assert_matches!(
            Err(Error::InvalidParameterName(_)),
            message.param("")
        );
        assert_matches!(
            Err(Error::InvalidParameterName(_)),
            message.param("bound ary")
        );
        assert_matches!(
            Err(Error::InvalidParameterName(_)),
            message.param("a=b")
        );
        assert_matches!(Ok(None), message.param("charset"));
        assert_matches!(Ok(None), message.param("filename*"));
    }

    #[test]
    fn headers_only_message() {
        let raw = crlf("Subject: no body\nX-Foo: bar\n");
        let message = Message::parse(raw.as_bytes());

        assert_eq!(0, message.subpart_count());
        assert_eq!(raw.len(), message.body_offset());
        assert_eq!(0, message.raw_body_length());
        assert!(
            message.body_offset()
                >= message.headers().offset() + message.headers().raw_length()
        );
        assert_eq!("text/plain", message.mime_type());
        assert_eq!(Some("us-ascii"), message.charset());
        assert_eq!("", message.body());
        assert_eq!(2, message.headers().len());
    }

    #[test]
    fn empty_message() {
        let message = Message::parse(Vec::<u8>::new());
        assert_eq!(1, message.part_count());
        assert_eq!(0, message.raw_length());
        assert_eq!(0, message.body_offset());
        assert!(message.headers().is_empty());
        assert_eq!("", message.body());
        assert_eq!("inline", message.content_disposition().disposition);
        assert_eq!(TransferEncoding::SevenBit, message.body_encoding());
    }

    #[test]
    fn unterminated_multipart_absorbs_rest() {
        let raw = crlf(
            "Content-Type: multipart/mixed; boundary=b\n\
             \n\
             --b\n\
             \n\
             first\n\
             --b\n\
             \n\
             second and everything after\n\
             --not-the-boundary\n",
        );
        let message = Message::parse(raw.as_bytes());

        assert_eq!(2, message.subpart_count());
        assert_eq!(None, message.epilogue());
        let last = message.subpart(1).unwrap();
        assert_eq!(raw.len(), last.offset() + last.raw_length());
        assert_eq!(
            "second and everything after\r\n--not-the-boundary\r\n",
            last.body()
        );
    }

    #[test]
    fn unknown_charset_keeps_bytes() {
        let raw: &[u8] = b"Content-Type: text/plain; charset=x-martian\r\n\
                           \r\n\
                           caf\xE9";
        let message = Message::parse(raw);
        assert_eq!(Some("x-martian"), message.charset());
        assert_eq!("caf\u{E9}", message.body());
    }

    #[test]
    fn hostile_content_type() {
        let mut raw = b"Content-Type: text/plain ".to_vec();
        raw.extend(std::iter::repeat(b'(').take(200_000));
        raw.extend_from_slice(b"\r\n\r\nbody");
        let message = Message::parse(raw);
        assert_eq!("text/plain", message.mime_type());
        assert_eq!("body", message.body());

        let mut raw = "Content-Type: multipart/mixed; boundary=b".to_owned();
        for i in 0..100_000 {
            raw.push_str(&format!(";\r\n p{}*=x; p{}=y", i, i));
        }
        raw.push_str("\r\n\r\n--b\r\n\r\nchild\r\n--b--\r\n");
        let message = Message::parse(raw.into_bytes());
        assert_eq!(100_001, message.params().len());
        assert_eq!(Some("x"), message.param("p5").unwrap());
        assert_eq!("child", message.subpart(0).unwrap().body());
    }

    #[test]
    fn custom_limits() {
        let raw = crlf(MULTIPART);
        let message = Message::parse_with_config(
            raw.as_bytes(),
            &ParseConfig {
                max_depth: 1,
                ..ParseConfig::default()
            },
        );
        assert_eq!(4, message.part_count());
        let embedded = message.subpart(2).unwrap();
        assert!(!embedded.is_embedded_message());
        assert_eq!(0, embedded.subpart_count());
        assert_eq!("message/rfc822", embedded.mime_type());
    }

    #[test]
    fn message_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Message>();

        let message = Arc::new(Message::parse(crlf(MULTIPART).into_bytes()));
        let threads = (0..4)
            .map(|_| {
                let message = Arc::clone(&message);
                std::thread::spawn(move || message.walk().count())
            })
            .collect::<Vec<_>>();
        for thread in threads {
            assert_eq!(5, thread.join().unwrap());
        }
    }

    proptest! {
        #[test]
        fn parse_never_panics(
            data in prop::collection::vec(prop::num::u8::ANY, 0..256)
        ) {
            let message = Message::parse(data);
            for part in message.parts() {
                part.body();
                part.headers().iter().for_each(|h| { h.value(); });
            }
        }

        #[test]
        fn tree_invariants_hold(
            body in "(--b(--)?\r\n|Content-Type: (multipart/mixed; \
                     boundary=b|message/rfc822)\r\n|[a-z:]{0,6}\r\n|\r\n)\
                     {0,30}"
        ) {
            let raw = format!(
                "Content-Type: multipart/mixed; boundary=b\r\n\r\n{}",
                body
            );
            let message = Message::parse(raw.as_bytes());
            prop_assert_eq!(raw.len(), message.raw_length());

            for part in message.parts() {
                prop_assert!(part.body_offset() >= part.offset());
                prop_assert!(
                    part.body_offset() + part.raw_body_length()
                        <= part.offset() + part.raw_length()
                );

                let mut prev_end = part.body_offset();
                for (ix, child) in part.subparts().enumerate() {
                    let mut path = part.path().to_vec();
                    path.push(ix);
                    prop_assert_eq!(&path[..], child.path());
                    prop_assert!(child.offset() >= prev_end);
                    prev_end = child.offset() + child.raw_length();
                    prop_assert!(
                        prev_end
                            <= part.body_offset() + part.raw_body_length()
                    );
                }
            }
        }
    }
}
