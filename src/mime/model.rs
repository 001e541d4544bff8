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

use std::collections::HashSet;
use std::ops::Range;

use super::header::HeaderBlock;

/// An ordered collection of MIME parameters.
///
/// Names are stored in lower case and compared case-insensitively. Only the
/// first occurrence of any name is kept.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, String)>,
    names: HashSet<String>,
}

impl Params {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|&&(ref n, _)| n.eq_ignore_ascii_case(name))
            .map(|&(_, ref v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.entries
            .iter()
            .map(|&(ref n, ref v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add `name=value` unless `name` is already present.
    pub(crate) fn insert(&mut self, name: &str, value: String) {
        let name = name.to_ascii_lowercase();
        if !self.names.contains(&name) {
            self.names.insert(name.clone());
            self.entries.push((name, value));
        }
    }
}

/// The interpreted Content-Type of a part.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentTypeInfo {
    /// `type/subtype`, in lower case.
    pub mime_type: String,
    /// The charset, in lower case.
    ///
    /// For `text/*` types this defaults to `us-ascii`.
    pub charset: Option<String>,
    /// The multipart boundary, if there is a non-empty one.
    pub boundary: Option<String>,
    /// All parameters, including `charset` and `boundary` if present.
    pub params: Params,
}

impl ContentTypeInfo {
    pub fn new(mime_type: &str, params: Params) -> Self {
        let mime_type = mime_type.to_ascii_lowercase();
        let charset = params
            .get("charset")
            .map(|c| c.trim().to_ascii_lowercase())
            .filter(|c| !c.is_empty())
            .or_else(|| {
                if mime_type.starts_with("text/") {
                    Some("us-ascii".to_owned())
                } else {
                    None
                }
            });
        let boundary = params
            .get("boundary")
            .filter(|b| !b.is_empty())
            .map(str::to_owned);

        ContentTypeInfo {
            mime_type,
            charset,
            boundary,
            params,
        }
    }

    pub fn typ(&self) -> &str {
        self.mime_type.split('/').next().unwrap_or("")
    }

    pub fn subtype(&self) -> &str {
        self.mime_type.splitn(2, '/').nth(1).unwrap_or("")
    }

    pub fn is_type(&self, typ: &str) -> bool {
        self.typ().eq_ignore_ascii_case(typ)
    }

    pub fn is_subtype(&self, subtype: &str) -> bool {
        self.subtype().eq_ignore_ascii_case(subtype)
    }

    /// Whether the body of this type is a single embedded message.
    pub fn is_embedded_message(&self) -> bool {
        self.is_type("message")
            && (self.is_subtype("rfc822") || self.is_subtype("global"))
    }
}

/// The interpreted Content-Disposition of a part.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentDispositionInfo {
    /// The disposition token, in lower case.
    pub disposition: String,
    pub params: Params,
}

impl Default for ContentDispositionInfo {
    fn default() -> Self {
        ContentDispositionInfo {
            disposition: "inline".to_owned(),
            params: Params::default(),
        }
    }
}

impl ContentDispositionInfo {
    pub fn is_attachment(&self) -> bool {
        "attachment" == self.disposition
    }

    pub fn is_inline(&self) -> bool {
        "inline" == self.disposition
    }
}

/// Values for the Content-Transfer-Encoding header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferEncoding {
    SevenBit,
    EightBit,
    Binary,
    Base64,
    QuotedPrintable,
}

impl Default for TransferEncoding {
    fn default() -> Self {
        TransferEncoding::SevenBit
    }
}

impl TransferEncoding {
    pub fn as_str(self) -> &'static str {
        match self {
            TransferEncoding::SevenBit => "7bit",
            TransferEncoding::EightBit => "8bit",
            TransferEncoding::Binary => "binary",
            TransferEncoding::Base64 => "base64",
            TransferEncoding::QuotedPrintable => "quoted-printable",
        }
    }

    /// Whether the body needs no transfer decoding.
    pub fn is_identity(self) -> bool {
        match self {
            TransferEncoding::Base64 | TransferEncoding::QuotedPrintable => {
                false
            },
            _ => true,
        }
    }
}

/// One node of the part tree.
///
/// Nodes live in the arena owned by `Message` and refer to each other, and to
/// the message bytes, by index.
#[derive(Clone, Debug)]
pub(crate) struct PartNode {
    pub path: Vec<usize>,
    pub parent: Option<usize>,
    /// The whole part, headers and body.
    pub range: Range<usize>,
    pub headers: HeaderBlock,
    pub body: Range<usize>,
    pub content_type: ContentTypeInfo,
    pub content_disposition: ContentDispositionInfo,
    pub transfer_encoding: TransferEncoding,
    pub kind: PartKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum PartKind {
    /// Anything not split further, including containers refused by the
    /// parse limits and multiparts without a usable boundary.
    Leaf,
    Multipart {
        children: Vec<usize>,
        /// Bytes of the body before the first delimiter.
        preamble: Range<usize>,
        /// Bytes after the closing delimiter, or `None` if the multipart was
        /// never closed.
        epilogue: Option<Range<usize>>,
    },
    /// A message/rfc822 part, whose body is exactly one child.
    EmbeddedMessage { child: usize },
}

impl PartKind {
    pub fn children(&self) -> &[usize] {
        match *self {
            PartKind::Leaf => &[],
            PartKind::Multipart { ref children, .. } => children,
            PartKind::EmbeddedMessage { ref child } => {
                std::slice::from_ref(child)
            },
        }
    }
}
