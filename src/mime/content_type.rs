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

//! Parsing of Content-Type and Content-Disposition header values.
//!
//! The grammar is that of RFC 2045 section 5.1, made more forgiving in the
//! ways real mail requires: RFC 822 comments may appear between any tokens,
//! unquoted parameter values may contain `tspecials`, unterminated quoted
//! strings run to the end of the value, and a malformed parameter only costs
//! that one parameter. RFC 2231 continuations and extended values are
//! reassembled into plain parameters.

use std::borrow::Cow;
use std::collections::HashMap;

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take, take_while1},
    combinator::{map, opt},
    error::ErrorKind,
    multi::{fold_many0, many0_count},
    sequence::{delimited, preceded, terminated, tuple},
    IResult,
};

use super::content_encoding::{decode_charset, decode_fallback};
use super::model::{ContentDispositionInfo, ContentTypeInfo, Params};

/// RFC 2045 `token` characters: printable ASCII other than `tspecials`.
pub fn is_token_byte(b: u8) -> bool {
    match b {
        0..=b' ' | 127..=255 => false,
        b'(' | b')' | b'<' | b'>' | b'@' | b',' | b';' | b':' | b'\\'
        | b'"' | b'/' | b'[' | b']' | b'?' | b'=' => false,
        _ => true,
    }
}

fn is_wsp(b: u8) -> bool {
    b' ' == b || b'\t' == b || b'\r' == b || b'\n' == b
}

fn quoted_pair(i: &[u8]) -> IResult<&[u8], &[u8]> {
    preceded(tag("\\"), take(1usize))(i)
}

/// RFC 822 comment, which may nest.
///
/// Nesting is tracked with a counter rather than by recursion, so arbitrarily
/// deep comments cost no stack. An unterminated comment runs to the end of
/// the input.
fn comment(i: &[u8]) -> IResult<&[u8], ()> {
    if !i.starts_with(b"(") {
        return Err(nom::Err::Error((i, ErrorKind::Tag)));
    }

    let mut depth = 0usize;
    let mut pos = 0;
    while pos < i.len() {
        match i[pos] {
            b'\\' => pos += 1,
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if 0 == depth {
                    return Ok((&i[pos + 1..], ()));
                }
            },
            _ => (),
        }
        pos += 1;
    }

    Ok((&i[i.len()..], ()))
}

fn cfws(i: &[u8]) -> IResult<&[u8], ()> {
    map(
        many0_count(alt((map(take_while1(is_wsp), |_| ()), comment))),
        |_| (),
    )(i)
}

fn token(i: &[u8]) -> IResult<&[u8], &[u8]> {
    take_while1(is_token_byte)(i)
}

fn quoted_string(i: &[u8]) -> IResult<&[u8], Cow<[u8]>> {
    delimited(
        tag("\""),
        fold_many0(
            alt((is_not("\"\\"), quoted_pair)),
            Cow::Borrowed(&[] as &[u8]),
            |mut acc: Cow<[u8]>, item| {
                if acc.is_empty() {
                    acc = Cow::Borrowed(item);
                } else {
                    acc.to_mut().extend_from_slice(item);
                }
                acc
            },
        ),
        opt(tag("\"")),
    )(i)
}

// Unquoted parameter values are supposed to be tokens, but agents routinely
// generate things like `boundary=----=_Part_0` or `name=a/b.txt`.
fn bare_value(i: &[u8]) -> IResult<&[u8], &[u8]> {
    take_while1(|b| !is_wsp(b) && b';' != b && b'"' != b && b'(' != b)(i)
}

fn parameter(i: &[u8]) -> IResult<&[u8], (&[u8], Cow<[u8]>)> {
    tuple((
        delimited(cfws, token, tuple((cfws, tag("="), cfws))),
        terminated(
            alt((quoted_string, map(bare_value, Cow::Borrowed))),
            cfws,
        ),
    ))(i)
}

fn type_subtype(i: &[u8]) -> IResult<&[u8], (&[u8], &[u8])> {
    tuple((
        preceded(cfws, token),
        delimited(tuple((cfws, tag("/"), cfws)), token, cfws),
    ))(i)
}

/// Extract every well-formed `; name=value` pair from `i`.
///
/// Anything that doesn't parse is skipped up to the next semicolon.
fn raw_parameters(mut i: &[u8]) -> Vec<(&[u8], Cow<[u8]>)> {
    let mut ret = Vec::new();
    while let Some(semi) = memchr::memchr(b';', i) {
        i = &i[semi + 1..];
        if let Ok((rest, parm)) = parameter(i) {
            ret.push(parm);
            i = rest;
        }
    }
    ret
}

/// Parse a Content-Type header value.
///
/// `default_type` is used if the value has no intelligible `type/subtype`.
/// Any parameters are still extracted in that case.
pub fn parse_content_type(
    value: &[u8],
    default_type: &str,
) -> ContentTypeInfo {
    let (mime_type, rest) = match type_subtype(value) {
        Ok((rest, (typ, subtype))) => (
            Some(format!(
                "{}/{}",
                String::from_utf8_lossy(typ),
                String::from_utf8_lossy(subtype)
            )),
            rest,
        ),
        Err(_) => (None, value),
    };

    ContentTypeInfo::new(
        mime_type.as_deref().unwrap_or(default_type),
        collect_params(raw_parameters(rest)),
    )
}

/// Parse a Content-Disposition header value.
///
/// A value with no disposition token is treated as `inline`.
pub fn parse_content_disposition(value: &[u8]) -> ContentDispositionInfo {
    let (disposition, rest) = match terminated(preceded(cfws, token), cfws)(
        value,
    ) {
        Ok((rest, disposition)) => {
            (String::from_utf8_lossy(disposition).to_ascii_lowercase(), rest)
        },
        Err(_) => (ContentDispositionInfo::default().disposition, value),
    };

    ContentDispositionInfo {
        disposition,
        params: collect_params(raw_parameters(rest)),
    }
}

/// A parameter name split into its RFC 2231 components.
#[derive(Debug, PartialEq, Eq)]
struct SectionName<'a> {
    base: &'a str,
    section: Option<u32>,
    extended: bool,
}

fn split_section_name(name: &str) -> Option<SectionName<'_>> {
    let (name, extended) = if name.ends_with('*') {
        (&name[..name.len() - 1], true)
    } else {
        (name, false)
    };

    match name.rfind('*') {
        Some(star) => {
            let section = name[star + 1..].parse::<u32>().ok()?;
            Some(SectionName {
                base: &name[..star],
                section: Some(section),
                extended,
            })
        },
        None if extended => Some(SectionName {
            base: name,
            section: None,
            extended,
        }),
        None => None,
    }
}

enum Entry<'a> {
    Plain(String, Cow<'a, [u8]>),
    Sectioned(String),
}

struct Section<'a> {
    number: u32,
    extended: bool,
    value: Cow<'a, [u8]>,
}

fn collect_params(raw: Vec<(&[u8], Cow<[u8]>)>) -> Params {
    let mut entries = Vec::<Entry>::new();
    let mut sections = HashMap::<String, Vec<Section>>::new();

    for (name, value) in raw {
        let name = String::from_utf8_lossy(name).to_ascii_lowercase();
        match split_section_name(&name) {
            None => entries.push(Entry::Plain(name, value)),
            Some(sn) => {
                let section = Section {
                    number: sn.section.unwrap_or(0),
                    extended: sn.extended,
                    value,
                };

                if let Some(group) = sections.get_mut(sn.base) {
                    group.push(section);
                } else {
                    let base = sn.base.to_owned();
                    sections.insert(base.clone(), vec![section]);
                    entries.push(Entry::Sectioned(base));
                }
            },
        }
    }

    let mut params = Params::default();
    for entry in entries {
        match entry {
            Entry::Plain(name, value) => {
                // RFC 2231 4.1: prefer the extended form when both exist
                if !sections.contains_key(&name) {
                    params.insert(&name, decode_fallback(&value).into_owned());
                }
            },
            Entry::Sectioned(base) => {
                // Leave the (now empty) group in place so that a later plain
                // form is still suppressed.
                if let Some(group) = sections.get_mut(&base) {
                    let group = std::mem::replace(group, Vec::new());
                    params.insert(&base, join_sections(group));
                }
            },
        }
    }

    params
}

fn join_sections(mut group: Vec<Section>) -> String {
    group.sort_by_key(|s| s.number);

    let mut charset = None;
    let mut bytes = Vec::new();
    for (ix, section) in group.iter().enumerate() {
        let mut value: &[u8] = &section.value;
        if section.extended {
            if 0 == ix {
                // charset'language'value
                let mut split = value.splitn(3, |&b| b'\'' == b);
                if let (Some(cs), Some(_), Some(v)) =
                    (split.next(), split.next(), split.next())
                {
                    charset = Some(String::from_utf8_lossy(cs).into_owned())
                        .filter(|cs| !cs.is_empty());
                    value = v;
                }
            }
            bytes.extend(percent_encoding::percent_decode(value));
        } else {
            bytes.extend_from_slice(value);
        }
    }

    decode_charset(&bytes, charset.as_deref()).into_owned()
}
