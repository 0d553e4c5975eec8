//! Recursive-descent parser for the LVM2 textual metadata grammar.
//!
//! Mirrors the line-cursor style of `libvslvm_metadata_read_volume_group`
//! and friends in the original source: a single monotonically-advancing
//! line index, walked by a family of mutually-recursive `parse_*`
//! functions, one per grammar production in spec.md §4.6.

use std::collections::HashMap;

use crate::error::Error;
use crate::model::{LogicalVolumeValues, PhysicalVolume, Segment, Stripe, VolumeGroup};
use crate::text::{tokenize, ListElement, Line, Value};

struct Cursor<'a> {
    lines: &'a [Line],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn next(&mut self) -> Option<&'a Line> {
        let line = self.lines.get(self.pos);
        if line.is_some() {
            self.pos += 1;
        }
        line
    }
}

fn require_id(value: &Value) -> Result<String, Error> {
    match value {
        Value::Str(s) if s.len() == 38 => Ok(s.clone()),
        Value::Str(s) => Err(Error::invalid_data(format!(
            "identifier must be 38 characters, got {} ({s})",
            s.len()
        ))),
        _ => Err(Error::invalid_data("expected a quoted string identifier")),
    }
}

fn require_str(value: &Value) -> Result<String, Error> {
    match value {
        Value::Str(s) => Ok(s.clone()),
        _ => Err(Error::invalid_data("expected a quoted string value")),
    }
}

fn require_int(value: &Value) -> Result<u64, Error> {
    match value {
        Value::Int(n) => Ok(*n),
        _ => Err(Error::invalid_data("expected an integer value")),
    }
}

fn require_string_list(value: &Value) -> Result<Vec<String>, Error> {
    match value {
        Value::List(items) => Ok(items
            .iter()
            .filter_map(|item| match item {
                ListElement::Str(s) => Some(s.clone()),
                ListElement::Int(_) => None,
            })
            .collect()),
        _ => Err(Error::invalid_data("expected a list value")),
    }
}

fn sectors_to_bytes(sectors: u64) -> Result<u64, Error> {
    sectors
        .checked_mul(512)
        .ok_or_else(|| Error::overflow(format!("{sectors} sectors * 512 overflows u64")))
}

fn extents_to_bytes(extents: u64, extent_size_bytes: u64) -> Result<u64, Error> {
    extents
        .checked_mul(extent_size_bytes)
        .ok_or_else(|| Error::overflow(format!("{extents} extents * {extent_size_bytes} bytes overflows u64")))
}

/// Consumes lines until the matching `}` of a section whose opening line
/// has already been consumed, tracking nested sections by depth.
fn skip_section(cur: &mut Cursor) -> Result<(), Error> {
    let mut depth = 1usize;
    while depth > 0 {
        match cur
            .next()
            .ok_or_else(|| Error::invalid_data("unterminated section"))?
        {
            Line::SectionStart(_) => depth += 1,
            Line::SectionEnd => depth -= 1,
            Line::Assignment(_, _) => {}
        }
    }
    Ok(())
}

struct RawStripe {
    name: String,
    start_extent: u64,
}

struct RawSegment {
    name: String,
    start_extent: u64,
    extent_count: u64,
    type_tag: String,
    stripe_size_sectors: u64,
    stripes: Vec<RawStripe>,
}

struct RawLv {
    name: String,
    identifier: String,
    status: Vec<String>,
    segments: Vec<RawSegment>,
}

fn parse_stripes(value: &Value) -> Result<Vec<RawStripe>, Error> {
    let items = match value {
        Value::List(items) => items,
        _ => return Err(Error::invalid_data("stripes value must be a list")),
    };
    if items.len() % 2 != 0 {
        return Err(Error::invalid_data(
            "stripes list must alternate pv name and start extent",
        ));
    }
    let mut out = Vec::with_capacity(items.len() / 2);
    let mut iter = items.iter();
    while let (Some(name_item), Some(extent_item)) = (iter.next(), iter.next()) {
        let name = match name_item {
            ListElement::Str(s) => s.clone(),
            ListElement::Int(_) => {
                return Err(Error::invalid_data("expected pv name string in stripes list"))
            }
        };
        let start_extent = match extent_item {
            ListElement::Int(n) => *n,
            ListElement::Str(_) => {
                return Err(Error::invalid_data("expected start extent integer in stripes list"))
            }
        };
        out.push(RawStripe { name, start_extent });
    }
    Ok(out)
}

fn parse_segment_body(cur: &mut Cursor, name: String) -> Result<RawSegment, Error> {
    let mut start_extent = 0u64;
    let mut extent_count = 0u64;
    let mut type_tag = String::new();
    let mut stripe_size_sectors = 0u64;
    let mut stripes = Vec::new();

    loop {
        match cur
            .next()
            .ok_or_else(|| Error::invalid_data(format!("unterminated segment section: {name}")))?
        {
            Line::SectionEnd => break,
            Line::SectionStart(_) => skip_section(cur)?,
            Line::Assignment(key, value) => match key.as_str() {
                "start_extent" => start_extent = require_int(value)?,
                "extent_count" => extent_count = require_int(value)?,
                "type" => type_tag = require_str(value)?,
                "stripe_size" => stripe_size_sectors = require_int(value)?,
                "stripes" => stripes = parse_stripes(value)?,
                // stripe_count and any other key: accepted, ignored.
                _ => {}
            },
        }
    }

    Ok(RawSegment {
        name,
        start_extent,
        extent_count,
        type_tag,
        stripe_size_sectors,
        stripes,
    })
}

fn is_segment_section_name(name: &str) -> bool {
    name.strip_prefix("segment")
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

fn parse_lv_body(cur: &mut Cursor, name: String) -> Result<RawLv, Error> {
    let mut identifier = String::new();
    let mut status = Vec::new();
    let mut segments = Vec::new();

    loop {
        match cur
            .next()
            .ok_or_else(|| Error::invalid_data(format!("unterminated logical volume section: {name}")))?
        {
            Line::SectionEnd => break,
            Line::SectionStart(section) => {
                if is_segment_section_name(section) {
                    segments.push(parse_segment_body(cur, section.clone())?);
                } else {
                    skip_section(cur)?;
                }
            }
            Line::Assignment(key, value) => match key.as_str() {
                "id" => identifier = require_id(value)?,
                "status" => status = require_string_list(value)?,
                // flags, segment_count and anything else: accepted, ignored.
                _ => {}
            },
        }
    }

    Ok(RawLv {
        name,
        identifier,
        status,
        segments,
    })
}

fn parse_lv_list(cur: &mut Cursor) -> Result<Vec<RawLv>, Error> {
    let mut lvs = Vec::new();
    loop {
        match cur
            .next()
            .ok_or_else(|| Error::invalid_data("unterminated logical_volumes section"))?
        {
            Line::SectionEnd => break,
            Line::SectionStart(name) => lvs.push(parse_lv_body(cur, name.clone())?),
            Line::Assignment(key, _) => {
                return Err(Error::invalid_data(format!(
                    "unexpected assignment in logical_volumes section: {key}"
                )))
            }
        }
    }
    Ok(lvs)
}

fn parse_pv_body(cur: &mut Cursor, name: String) -> Result<PhysicalVolume, Error> {
    let mut identifier = String::new();
    let mut device_path = String::new();
    let mut size_bytes = 0u64;
    let mut pe_start_bytes = 0u64;
    let mut status = Vec::new();

    loop {
        match cur
            .next()
            .ok_or_else(|| Error::invalid_data(format!("unterminated physical volume section: {name}")))?
        {
            Line::SectionEnd => break,
            Line::SectionStart(_) => skip_section(cur)?,
            Line::Assignment(key, value) => match key.as_str() {
                "id" => identifier = require_id(value)?,
                "device" => device_path = require_str(value)?,
                "dev_size" => size_bytes = sectors_to_bytes(require_int(value)?)?,
                "pe_start" => pe_start_bytes = sectors_to_bytes(require_int(value)?)?,
                "status" => status = require_string_list(value)?,
                // flags, pe_count and anything else: accepted, ignored.
                _ => {}
            },
        }
    }

    Ok(PhysicalVolume {
        name,
        identifier,
        device_path,
        size_bytes,
        status,
        data_area_descriptors: Vec::new(),
        metadata_area_descriptors: Vec::new(),
        pe_start_bytes,
    })
}

fn parse_pv_list(cur: &mut Cursor) -> Result<Vec<PhysicalVolume>, Error> {
    let mut pvs = Vec::new();
    loop {
        match cur
            .next()
            .ok_or_else(|| Error::invalid_data("unterminated physical_volumes section"))?
        {
            Line::SectionEnd => break,
            Line::SectionStart(name) => pvs.push(parse_pv_body(cur, name.clone())?),
            Line::Assignment(key, _) => {
                return Err(Error::invalid_data(format!(
                    "unexpected assignment in physical_volumes section: {key}"
                )))
            }
        }
    }
    Ok(pvs)
}

fn finalize_lv(raw: RawLv, extent_size_bytes: u64) -> Result<LogicalVolumeValues, Error> {
    let mut segments = Vec::with_capacity(raw.segments.len());
    for raw_segment in raw.segments {
        let offset_bytes = extents_to_bytes(raw_segment.start_extent, extent_size_bytes)?;
        let size_bytes = extents_to_bytes(raw_segment.extent_count, extent_size_bytes)?;
        let mut stripes = Vec::with_capacity(raw_segment.stripes.len());
        for raw_stripe in raw_segment.stripes {
            let data_area_offset_bytes =
                extents_to_bytes(raw_stripe.start_extent, extent_size_bytes)?;
            stripes.push(Stripe {
                physical_volume_name: raw_stripe.name,
                data_area_offset_bytes,
            });
        }
        segments.push(Segment {
            name: raw_segment.name,
            offset_bytes,
            size_bytes,
            type_tag: raw_segment.type_tag,
            stripe_size_sectors: raw_segment.stripe_size_sectors,
            stripes,
        });
    }
    Ok(LogicalVolumeValues {
        name: raw.name,
        identifier: raw.identifier,
        status: raw.status,
        segments,
    })
}

fn parse_vg_body(cur: &mut Cursor, name: String) -> Result<VolumeGroup, Error> {
    let mut identifier = String::new();
    let mut seqno = 0u32;
    let mut status = Vec::new();
    let mut extent_size_bytes = 0u64;
    let mut physical_volumes = Vec::new();
    let mut raw_logical_volumes = Vec::new();

    loop {
        match cur
            .next()
            .ok_or_else(|| Error::invalid_data(format!("unterminated volume group section: {name}")))?
        {
            Line::SectionEnd => break,
            Line::SectionStart(section) if section == "physical_volumes" => {
                physical_volumes = parse_pv_list(cur)?;
            }
            Line::SectionStart(section) if section == "logical_volumes" => {
                raw_logical_volumes = parse_lv_list(cur)?;
            }
            Line::SectionStart(_other) => skip_section(cur)?,
            Line::Assignment(key, value) => match key.as_str() {
                "id" => identifier = require_id(value)?,
                "seqno" => {
                    let n = require_int(value)?;
                    seqno = u32::try_from(n)
                        .map_err(|_| Error::overflow(format!("seqno {n} exceeds u32 range")))?;
                }
                "extent_size" => extent_size_bytes = sectors_to_bytes(require_int(value)?)?,
                "status" => status = require_string_list(value)?,
                // flags, max_lv, max_pv, metadata_copies and anything else:
                // accepted, ignored.
                _ => {}
            },
        }
    }

    if identifier.is_empty() {
        return Err(Error::invalid_data("volume group is missing its id"));
    }
    if extent_size_bytes == 0 {
        return Err(Error::invalid_data("volume group is missing extent_size"));
    }

    let logical_volumes = raw_logical_volumes
        .into_iter()
        .map(|raw| finalize_lv(raw, extent_size_bytes))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(VolumeGroup {
        name,
        identifier,
        seqno,
        status,
        extent_size_bytes,
        physical_volumes,
        logical_volumes,
        pv_name_index: HashMap::new(),
    })
}

/// Parses a full metadata text payload into a `VolumeGroup`, including
/// building the `pv_name -> index` map used by the read path to resolve
/// stripes without a back-pointer (DESIGN.md Open Question 2).
pub fn parse_metadata(text: &str) -> Result<VolumeGroup, Error> {
    let lines = tokenize(text)?;
    let mut cur = Cursor { lines: &lines, pos: 0 };
    let vg_name = match cur.next() {
        Some(Line::SectionStart(name)) => name.clone(),
        _ => {
            return Err(Error::invalid_data(
                "metadata text must start with a volume group section",
            ))
        }
    };
    let mut vg = parse_vg_body(&mut cur, vg_name)?;
    vg.pv_name_index = vg
        .physical_volumes
        .iter()
        .enumerate()
        .map(|(idx, pv)| (pv.name.clone(), idx))
        .collect();

    Ok(vg)
}
