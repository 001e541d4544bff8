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


//! A permissive MIME parser.
//!
//! `parse` turns the raw bytes of an email into a `Message`: a tree of parts
//! which can be inspected both as exact byte ranges of the original input
//! and as decoded content. Parsing never fails; malformed mail yields the
//! best structure that can be recovered from it.
//!
//! ```
//! let message = mailpar::parse(
//!     &b"Content-Type: multipart/mixed; boundary=XYZ\r\n\
//!        \r\n\
//!        --XYZ\r\n\
//!        Content-Transfer-Encoding: base64\r\n\
//!        \r\n\
//!        aGVsbG8=\r\n\
//!        --XYZ--\r\n"[..],
//! );
//!
//! assert_eq!("multipart/mixed", message.mime_type());
//! let part = message.subpart(0).unwrap();
//! assert_eq!(&[0], part.path());
//! assert_eq!("hello", part.body());
//! assert_eq!(b"aGVsbG8=", part.body_raw());
//! ```
//!
//! The crate logs through the `log` facade but never installs a logger.

#[cfg(test)]
macro_rules! assert_matches {
    ($expected:pat, $actual:expr) => {
        match $actual {
            $expected => (),
            unexpected => panic!(
                "Expected {} matches {}, got {:?}",
                stringify!($expected),
                stringify!($actual),
                unexpected
            ),
        }
    };
}

pub mod mime;
pub mod support;

use std::sync::Arc;

pub use crate::mime::message::{Header, Headers, Message, Part, Walk};
pub use crate::mime::model::{
    ContentDispositionInfo, ContentTypeInfo, Params, TransferEncoding,
};
pub use crate::support::error::Error;
pub use crate::support::parse_config::ParseConfig;

/// Parse a complete message with the default limits.
pub fn parse(data: impl Into<Arc<[u8]>>) -> Message {
    Message::parse(data)
}

/// Alias for `parse`.
pub fn from_bytes(data: impl Into<Arc<[u8]>>) -> Message {
    Message::parse(data)
}

/// Parse a complete message with explicit limits.
pub fn parse_with_config(
    data: impl Into<Arc<[u8]>>,
    config: &ParseConfig,
) -> Message {
    Message::parse_with_config(data, config)
}
