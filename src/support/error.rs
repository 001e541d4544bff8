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

use thiserror::Error;

/// Errors reported by the accessor surface.
///
/// Parsing itself never fails; these only arise when a caller asks for
/// something the parsed tree cannot provide.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Subpart {index} out of range; part has {count} subparts")]
    SubpartOutOfRange { index: usize, count: usize },
    #[error("Invalid parameter name: {0:?}")]
    InvalidParameterName(String),
    #[error("No part at path {0:?}")]
    NoSuchPart(Vec<usize>),
    #[error(transparent)]
    Config(#[from] toml::de::Error),
}
