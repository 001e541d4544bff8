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

use serde::{Deserialize, Serialize};

use super::error::Error;

/// Limits applied while building the part tree.
///
/// These exist to bound the work done on adversarial input. Neither limit
/// ever causes parsing to fail; a part which would exceed them is simply kept
/// as an opaque leaf.
///
/// Can be embedded in a larger TOML configuration or loaded on its own with
/// `from_toml_str`:
///
/// ```toml
/// max_depth = 10
/// max_parts = 500
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ParseConfig {
    /// The maximum nesting depth of multipart and embedded message parts.
    ///
    /// The root is at depth 0. A container at this depth is not split.
    ///
    /// Values above `MAX_DEPTH_CEILING` are treated as `MAX_DEPTH_CEILING`,
    /// since the tree is built recursively.
    pub max_depth: u32,

    /// The maximum number of parts, not counting the root, that will be
    /// created for a single message.
    pub max_parts: u32,
}

pub const DEFAULT_MAX_DEPTH: u32 = 20;
pub const DEFAULT_MAX_PARTS: u32 = 1000;
/// The largest depth limit that is honoured, whatever `max_depth` says.
pub const MAX_DEPTH_CEILING: u32 = 128;

impl Default for ParseConfig {
    fn default() -> Self {
        ParseConfig {
            max_depth: DEFAULT_MAX_DEPTH,
            max_parts: DEFAULT_MAX_PARTS,
        }
    }
}

impl ParseConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, Error> {
        Ok(toml::from_str(s)?)
    }

    /// `max_depth`, clamped to `MAX_DEPTH_CEILING`.
    pub fn effective_max_depth(&self) -> u32 {
        self.max_depth.min(MAX_DEPTH_CEILING)
    }
}
