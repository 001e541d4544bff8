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

//! Construction of the part tree.
//!
//! The groveller walks a message top-down in a single pass. Each part is run
//! through the whole pipeline: its header block is tokenised, the headers
//! which control MIME structure are interpreted, and if the part is a
//! container, its body is split and each child is grovelled the same way.
//!
//! Nothing is decoded here. Nodes only describe where things are.

use std::ops::Range;

use log::debug;

use super::content_type::{parse_content_disposition, parse_content_type};
use super::header::{self, parse_content_transfer_encoding};
use super::model::*;
use super::multipart;
use crate::support::parse_config::ParseConfig;

const CT_TEXT_PLAIN: &str = "text/plain";
const CT_MESSAGE_RFC822: &str = "message/rfc822";

/// Build the part tree for `data`.
///
/// The nodes are returned in pre-order; the root is at index 0.
pub(crate) fn build(data: &[u8], config: &ParseConfig) -> Vec<PartNode> {
    let mut groveller = Groveller {
        data,
        config,
        nodes: Vec::new(),
    };
    groveller.part(0..data.len(), Vec::new(), None, CT_TEXT_PLAIN);
    groveller.nodes
}

struct Groveller<'a> {
    data: &'a [u8],
    config: &'a ParseConfig,
    nodes: Vec<PartNode>,
}

impl Groveller<'_> {
    /// Grovel the part occupying `range` and return its index.
    fn part(
        &mut self,
        range: Range<usize>,
        path: Vec<usize>,
        parent: Option<usize>,
        default_content_type: &str,
    ) -> usize {
        let data = self.data;
        let (headers, body_start) = header::tokenize(data, range.clone());
        let body = body_start..range.end;

        // Only the first of each of these headers counts
        let content_type = match headers.first(data, "Content-Type") {
            Some(field) => parse_content_type(
                &field.logical_value(data),
                default_content_type,
            ),
            None => ContentTypeInfo::new(
                default_content_type,
                Params::default(),
            ),
        };
        let content_disposition = headers
            .first(data, "Content-Disposition")
            .map(|field| parse_content_disposition(&field.logical_value(data)))
            .unwrap_or_default();
        let transfer_encoding = headers
            .first(data, "Content-Transfer-Encoding")
            .map(|field| {
                parse_content_transfer_encoding(&field.logical_value(data))
                    .unwrap_or(TransferEncoding::Binary)
            })
            .unwrap_or_default();

        let is_multipart = content_type.is_type("multipart");
        let is_embedded_message = content_type.is_embedded_message();
        let boundary = content_type.boundary.clone();
        let child_content_type = if is_multipart
            && content_type.is_subtype("digest")
        {
            CT_MESSAGE_RFC822
        } else {
            CT_TEXT_PLAIN
        };

        let ix = self.nodes.len();
        self.nodes.push(PartNode {
            path,
            parent,
            range,
            headers,
            body: body.clone(),
            content_type,
            content_disposition,
            transfer_encoding,
            kind: PartKind::Leaf,
        });

        let kind = if is_multipart {
            match boundary {
                Some(boundary) => {
                    self.multipart(ix, body, &boundary, child_content_type)
                },
                None => {
                    debug!(
                        "Multipart at {:?} has no boundary; \
                         treating it as a leaf",
                        self.nodes[ix].path
                    );
                    PartKind::Leaf
                },
            }
        } else if is_embedded_message && self.may_descend(ix) {
            let path = self.child_path(ix, 0);
            let child = self.part(body, path, Some(ix), CT_TEXT_PLAIN);
            PartKind::EmbeddedMessage { child }
        } else {
            PartKind::Leaf
        };

        self.nodes[ix].kind = kind;
        ix
    }

    fn multipart(
        &mut self,
        ix: usize,
        body: Range<usize>,
        boundary: &str,
        child_content_type: &str,
    ) -> PartKind {
        if !self.may_descend(ix) {
            return PartKind::Leaf;
        }

        let split = multipart::split(self.data, body, boundary.as_bytes());
        if split.epilogue.is_none() && !split.parts.is_empty() {
            debug!(
                "Multipart at {:?} is not terminated; \
                 the last part runs to the end of the body",
                self.nodes[ix].path
            );
        }

        let total = split.parts.len();
        let mut children = Vec::with_capacity(total);
        for (child_ix, range) in split.parts.into_iter().enumerate() {
            if self.at_part_limit() {
                debug!(
                    "Part limit reached in {:?}; dropping {} part(s)",
                    self.nodes[ix].path,
                    total - child_ix
                );
                break;
            }

            let path = self.child_path(ix, child_ix);
            children.push(self.part(
                range,
                path,
                Some(ix),
                child_content_type,
            ));
        }

        PartKind::Multipart {
            children,
            preamble: split.preamble,
            epilogue: split.epilogue,
        }
    }

    /// Whether the container at `ix` may have children.
    fn may_descend(&self, ix: usize) -> bool {
        let depth = self.nodes[ix].path.len();
        let max_depth = self.config.effective_max_depth();
        if depth >= max_depth as usize {
            debug!(
                "Container at {:?} exceeds maximum depth {}; \
                 treating it as a leaf",
                self.nodes[ix].path, max_depth
            );
            false
        } else if self.at_part_limit() {
            debug!(
                "Part limit reached before {:?}; treating it as a leaf",
                self.nodes[ix].path
            );
            false
        } else {
            true
        }
    }

    fn at_part_limit(&self) -> bool {
        // The root does not count against the limit
        self.nodes.len() > self.config.max_parts as usize
    }

    fn child_path(&self, ix: usize, child_ix: usize) -> Vec<usize> {
        let mut path = Vec::with_capacity(self.nodes[ix].path.len() + 1);
        path.extend_from_slice(&self.nodes[ix].path);
        path.push(child_ix);
        path
    }
}
