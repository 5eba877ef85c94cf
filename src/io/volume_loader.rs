// Copyright @yucwang 2026

//! Declarative XML volume descriptions.
//!
//! ```xml
//! <volume type="structuredRegular">
//!     <default name="n" value="2"/>
//!     <vector name="dimensions" value="$n, $n, $n"/>
//!     <vector name="gridSpacing" value="0.5, 0.5, 0.5"/>
//!     <data type="float">0 1 2 3 4 5 6 7</data>
//! </volume>
//! ```
//!
//! AMR volumes list `<block lower=".." upper=".." level="..">` elements,
//! sparse volumes `<leaf origin="..">`, each holding one `<data>`; particle
//! volumes list `<particle position=".." radius=".." weight=".."/>`. A
//! `<data fill="v"/>` element repeats `v` for as many voxels as its owner
//! needs.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::core::data::{Data, DataBuffer, DataType};
use crate::core::error::{Result, VklError};
use crate::core::native::{AmrMethod, VDB_LEAF_VOXELS};
use crate::core::volume::Volume;
use crate::math::constants::{Float, Vector3f, Vector3i};
use crate::volumes::amr::{AmrParams, AmrVolume};
use crate::volumes::particle::{ParticleParams, ParticleVolume};
use crate::volumes::structured::{StructuredParams, StructuredVolume};
use crate::volumes::vdb::{VdbParams, VdbVolume};

/// Commit parameters of one described volume.
#[derive(Clone, Debug)]
pub enum VolumeDescription {
    Structured(StructuredParams),
    Amr(AmrParams),
    Particle(ParticleParams),
    Vdb(VdbParams),
}

impl VolumeDescription {
    pub fn type_name(&self) -> &'static str {
        match self {
            VolumeDescription::Structured(_) => "structuredRegular",
            VolumeDescription::Amr(_) => "amr",
            VolumeDescription::Particle(_) => "particle",
            VolumeDescription::Vdb(_) => "vdb",
        }
    }

    pub fn commit(self) -> Result<Box<dyn Volume>> {
        Ok(match self {
            VolumeDescription::Structured(p) => Box::new(StructuredVolume::committed(p)?),
            VolumeDescription::Amr(p) => Box::new(AmrVolume::committed(p)?),
            VolumeDescription::Particle(p) => Box::new(ParticleVolume::committed(p)?),
            VolumeDescription::Vdb(p) => Box::new(VdbVolume::committed(p)?),
        })
    }
}

pub fn load_volume<P: AsRef<Path>>(path: P) -> Result<VolumeDescription> {
    let path = path.as_ref();
    let xml = fs::read_to_string(path)?;
    let description = parse_volume(&xml)?;
    log::info!("loaded {} volume description from {}", description.type_name(), path.display());
    Ok(description)
}

/// Voxel values as written in the document; sized once the owner is known.
#[derive(Clone, Debug)]
struct DataSource {
    data_type: DataType,
    values: Vec<f64>,
    fill: Option<f64>,
}

impl DataSource {
    fn resolve(&self, count: usize) -> Data {
        let values = match self.fill {
            Some(v) => vec![v; count],
            None => self.values.clone(),
        };
        let buffer = match self.data_type {
            DataType::UChar => DataBuffer::UChar(values.iter().map(|v| *v as u8).collect()),
            DataType::Short => DataBuffer::Short(values.iter().map(|v| *v as i16).collect()),
            DataType::UShort => DataBuffer::UShort(values.iter().map(|v| *v as u16).collect()),
            DataType::Int => DataBuffer::Int(values.iter().map(|v| *v as i32).collect()),
            DataType::UInt => DataBuffer::UInt(values.iter().map(|v| *v as u32).collect()),
            DataType::Double => DataBuffer::Double(values),
            _ => DataBuffer::Float(values.iter().map(|v| *v as f32).collect()),
        };
        Data::new(buffer)
    }
}

struct PendingBlock {
    lower: Vector3i,
    upper: Vector3i,
    level: usize,
    data: Option<DataSource>,
}

impl PendingBlock {
    fn cell_count(&self) -> Result<usize> {
        let mut extents = [0usize; 3];
        for axis in 0..3 {
            let extent = self.upper[axis] as i64 - self.lower[axis] as i64 + 1;
            extents[axis] = extent.max(0) as usize;
        }
        checked_count(&extents)
    }
}

struct PendingLeaf {
    origin: [i32; 3],
    data: Option<DataSource>,
}

#[derive(Default)]
struct VolumeBuilder {
    volume_type: Option<String>,
    defaults: HashMap<String, String>,
    properties: HashMap<String, String>,

    data: Option<DataSource>,
    collecting_text: bool,

    blocks: Vec<PendingBlock>,
    current_block: Option<PendingBlock>,
    leaves: Vec<PendingLeaf>,
    current_leaf: Option<PendingLeaf>,

    positions: Vec<Vector3f>,
    radii: Vec<Float>,
    weights: Vec<Float>,
    any_weight: bool,
}

impl VolumeBuilder {
    fn attributes(&self, e: &BytesStart) -> HashMap<String, String> {
        let mut out = HashMap::new();
        for attr in e.attributes().flatten() {
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            let value = resolve_value(&attr.unescape_value().unwrap_or_default(), &self.defaults);
            out.insert(key, value);
        }
        out
    }

    fn start(&mut self, e: &BytesStart, empty: bool) -> Result<()> {
        let attrs = self.attributes(e);
        match e.name().as_ref() {
            b"volume" => {
                let kind = attrs.get("type").ok_or_else(|| missing("volume.type"))?;
                self.volume_type = Some(kind.clone());
            }
            b"default" => {
                if let (Some(k), Some(v)) = (attrs.get("name"), attrs.get("value")) {
                    self.defaults.insert(k.clone(), v.clone());
                }
            }
            b"float" | b"integer" | b"boolean" | b"string" | b"vector" => {
                let name = attrs.get("name").ok_or_else(|| missing("property.name"))?;
                let value = attrs.get("value").ok_or_else(|| missing("property.value"))?;
                self.properties.insert(name.clone(), value.clone());
            }
            b"data" => {
                let data_type = match attrs.get("type") {
                    Some(t) => parse_data_type(t)?,
                    None => DataType::Float,
                };
                let fill = attrs.get("fill").map(|v| parse_f64(v)).transpose()?;
                self.data = Some(DataSource { data_type, values: Vec::new(), fill });
                self.collecting_text = !empty;
            }
            b"block" => {
                if empty {
                    return Err(missing("block.data"));
                }
                self.current_block = Some(PendingBlock {
                    lower: parse_vec3i(attrs.get("lower").ok_or_else(|| missing("block.lower"))?)?,
                    upper: parse_vec3i(attrs.get("upper").ok_or_else(|| missing("block.upper"))?)?,
                    level: parse_usize(attrs.get("level").map(String::as_str).unwrap_or("0"))?,
                    data: None,
                });
            }
            b"leaf" => {
                if empty {
                    return Err(missing("leaf.data"));
                }
                let o = parse_vec3i(attrs.get("origin").ok_or_else(|| missing("leaf.origin"))?)?;
                self.current_leaf = Some(PendingLeaf { origin: [o.x, o.y, o.z], data: None });
            }
            b"particle" => {
                self.positions.push(parse_vec3(attrs.get("position").ok_or_else(|| missing("particle.position"))?)?);
                self.radii.push(parse_float(attrs.get("radius").ok_or_else(|| missing("particle.radius"))?)?);
                match attrs.get("weight") {
                    Some(w) => {
                        self.weights.push(parse_float(w)?);
                        self.any_weight = true;
                    }
                    None => self.weights.push(1.0),
                }
            }
            other => {
                log::warn!("ignoring unknown element <{}>", String::from_utf8_lossy(other));
            }
        }
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<()> {
        if !self.collecting_text {
            return Ok(());
        }
        if let Some(data) = self.data.as_mut() {
            for token in text.split(|c: char| c.is_whitespace() || c == ',').filter(|s| !s.is_empty()) {
                data.values.push(parse_f64(token)?);
            }
        }
        Ok(())
    }

    fn end(&mut self, name: &[u8]) {
        match name {
            b"data" => self.collecting_text = false,
            b"block" => {
                if let Some(mut block) = self.current_block.take() {
                    block.data = self.data.take();
                    self.blocks.push(block);
                }
            }
            b"leaf" => {
                if let Some(mut leaf) = self.current_leaf.take() {
                    leaf.data = self.data.take();
                    self.leaves.push(leaf);
                }
            }
            _ => {}
        }
    }

    fn property<T, F>(&self, name: &str, parse: F) -> Result<Option<T>>
    where
        F: Fn(&str) -> Result<T>,
    {
        self.properties.get(name).map(|v| parse(v)).transpose()
    }

    fn grid(&self) -> Result<(Vector3f, Vector3f)> {
        let origin = self.property("gridOrigin", parse_vec3)?.unwrap_or_else(Vector3f::zeros);
        let spacing = self.property("gridSpacing", parse_vec3)?.unwrap_or_else(|| Vector3f::new(1.0, 1.0, 1.0));
        Ok((origin, spacing))
    }

    fn finish(self) -> Result<VolumeDescription> {
        let kind = self.volume_type.clone().ok_or_else(|| missing("volume"))?;
        match kind.as_str() {
            "structuredRegular" | "structured" => {
                let dims = self.property("dimensions", parse_vec3i)?.ok_or_else(|| missing("dimensions"))?;
                if dims.iter().any(|d| *d < 0) {
                    return Err(VklError::Parse(format!("negative dimensions {:?}", dims.as_slice())));
                }
                let dimensions = [dims.x as usize, dims.y as usize, dims.z as usize];
                let (origin, spacing) = self.grid()?;
                let source = self.data.as_ref().ok_or_else(|| missing("data"))?;
                Ok(VolumeDescription::Structured(StructuredParams {
                    dimensions,
                    origin,
                    spacing,
                    data: source.resolve(checked_count(&dimensions)?),
                }))
            }
            "amr" => {
                let (grid_origin, grid_spacing) = self.grid()?;
                let method = match self.property("method", |v| Ok(v.to_ascii_lowercase()))?.as_deref() {
                    None | Some("current") => AmrMethod::Current,
                    Some("finest") => AmrMethod::Finest,
                    Some("octant") => AmrMethod::Octant,
                    Some(other) => return Err(VklError::Parse(format!("unknown amr method: {}", other))),
                };
                let cell_width = self.property("cellWidth", parse_float_list)?.ok_or_else(|| missing("cellWidth"))?;
                let mut params = AmrParams { cell_width, method, grid_origin, grid_spacing, ..Default::default() };
                for block in &self.blocks {
                    let source = block.data.as_ref().ok_or_else(|| missing("block.data"))?;
                    params.block_bounds.push((block.lower, block.upper));
                    params.refinement_level.push(block.level);
                    params.block_data.push(source.resolve(block.cell_count()?));
                }
                Ok(VolumeDescription::Amr(params))
            }
            "particle" => {
                let defaults = ParticleParams::default();
                Ok(VolumeDescription::Particle(ParticleParams {
                    radius_support_factor: self
                        .property("radiusSupportFactor", parse_float)?
                        .unwrap_or(defaults.radius_support_factor),
                    clamp_max_cumulative_value: self
                        .property("clampMaxCumulativeValue", parse_float)?
                        .unwrap_or(defaults.clamp_max_cumulative_value),
                    estimate_value_ranges: self
                        .property("estimateValueRanges", parse_bool)?
                        .unwrap_or(defaults.estimate_value_ranges),
                    weights: if self.any_weight { Some(self.weights) } else { None },
                    positions: self.positions,
                    radii: self.radii,
                }))
            }
            "vdb" => {
                let (origin, spacing) = self.grid()?;
                let mut params = VdbParams { origin, spacing, ..Default::default() };
                for leaf in &self.leaves {
                    let source = leaf.data.as_ref().ok_or_else(|| missing("leaf.data"))?;
                    params.leaf_origins.push(leaf.origin);
                    params.leaf_data.push(source.resolve(VDB_LEAF_VOXELS));
                }
                Ok(VolumeDescription::Vdb(params))
            }
            other => Err(VklError::Parse(format!("unsupported volume type: {}", other))),
        }
    }
}

pub fn parse_volume(xml: &str) -> Result<VolumeDescription> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut builder = VolumeBuilder::default();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => builder.start(&e, false)?,
            Ok(Event::Empty(e)) => builder.start(&e, true)?,
            Ok(Event::Text(e)) => {
                let text = e.unescape().map_err(|err| VklError::Parse(err.to_string()))?;
                builder.text(&text)?;
            }
            Ok(Event::End(e)) => builder.end(e.name().as_ref()),
            Err(e) => {
                return Err(VklError::Parse(e.to_string()));
            }
            _ => {}
        }

        buf.clear();
    }

    builder.finish()
}

fn missing(field: &str) -> VklError {
    VklError::Parse(format!("missing field: {}", field))
}

fn resolve_value(raw: &str, defaults: &HashMap<String, String>) -> String {
    let mut out = raw.to_string();
    for (k, v) in defaults {
        out = out.replace(&format!("${}", k), v);
    }
    out
}

fn parse_data_type(value: &str) -> Result<DataType> {
    match value {
        "uchar" => Ok(DataType::UChar),
        "short" => Ok(DataType::Short),
        "ushort" => Ok(DataType::UShort),
        "int" => Ok(DataType::Int),
        "uint" => Ok(DataType::UInt),
        "float" => Ok(DataType::Float),
        "double" => Ok(DataType::Double),
        other => Err(VklError::Parse(format!("unknown data type: {}", other))),
    }
}

fn parse_f64(value: &str) -> Result<f64> {
    value.trim().parse::<f64>().map_err(|_| VklError::Parse(format!("invalid number: {}", value)))
}

fn parse_float(value: &str) -> Result<Float> {
    value.trim().parse::<Float>().map_err(|_| VklError::Parse(format!("invalid float: {}", value)))
}

fn parse_usize(value: &str) -> Result<usize> {
    value.trim().parse::<usize>().map_err(|_| VklError::Parse(format!("invalid integer: {}", value)))
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(VklError::Parse(format!("invalid boolean: {}", other))),
    }
}

fn parse_float_list(value: &str) -> Result<Vec<Float>> {
    value.split(|c: char| c.is_whitespace() || c == ',').filter(|s| !s.is_empty()).map(parse_float).collect()
}

fn parse_vec3(value: &str) -> Result<Vector3f> {
    let parts = parse_float_list(value)?;
    if parts.len() != 3 {
        return Err(VklError::Parse(format!("invalid vec3: {}", value)));
    }
    Ok(Vector3f::new(parts[0], parts[1], parts[2]))
}

fn checked_count(extents: &[usize]) -> Result<usize> {
    extents
        .iter()
        .try_fold(1usize, |acc, &n| acc.checked_mul(n))
        .ok_or_else(|| VklError::Parse(format!("voxel count of {:?} overflows", extents)))
}

fn parse_vec3i(value: &str) -> Result<Vector3i> {
    let parts = value
        .split(',')
        .map(|s| s.trim())
        .map(|s| s.parse::<i32>().map_err(|_| VklError::Parse(format!("invalid integer: {}", s))))
        .collect::<Result<Vec<i32>>>()?;
    if parts.len() != 3 {
        return Err(VklError::Parse(format!("invalid vec3i: {}", value)));
    }
    Ok(Vector3i::new(parts[0], parts[1], parts[2]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::range::Range1f;

    #[test]
    fn structured_with_defaults_and_text_data() {
        let xml = r#"
            <volume type="structuredRegular">
                <default name="n" value="2"/>
                <vector name="dimensions" value="$n, $n, $n"/>
                <vector name="gridSpacing" value="0.5, 0.5, 0.5"/>
                <data type="float">0 1 2 3
                    4 5 6 7</data>
            </volume>
        "#;
        let description = parse_volume(xml).unwrap();
        let params = match &description {
            VolumeDescription::Structured(p) => p.clone(),
            other => panic!("unexpected {}", other.type_name()),
        };
        assert_eq!(params.dimensions, [2, 2, 2]);
        assert_eq!(params.spacing, Vector3f::new(0.5, 0.5, 0.5));
        assert_eq!(params.data.len(), 8);

        let volume = description.commit().unwrap();
        assert_eq!(volume.value_range().unwrap(), Range1f::new(0.0, 7.0));
        assert_eq!(volume.bounding_box().unwrap().p_max, Vector3f::new(0.5, 0.5, 0.5));
    }

    #[test]
    fn amr_blocks_with_fill() {
        let xml = r#"
            <volume type="amr">
                <string name="method" value="Octant"/>
                <float name="cellWidth" value="1, 0.5"/>
                <block lower="0,0,0" upper="3,3,3" level="0"><data fill="1"/></block>
                <block lower="0,0,0" upper="1,1,1" level="1"><data type="double" fill="3"/></block>
            </volume>
        "#;
        let params = match parse_volume(xml).unwrap() {
            VolumeDescription::Amr(p) => p,
            other => panic!("unexpected {}", other.type_name()),
        };
        assert_eq!(params.method, AmrMethod::Octant);
        assert_eq!(params.cell_width, vec![1.0, 0.5]);
        assert_eq!(params.block_data[0].len(), 64);
        assert_eq!(params.block_data[1].data_type(), DataType::Double);
        // Mixed element types are a commit error, not a parse error.
        assert!(matches!(VolumeDescription::Amr(params).commit(), Err(VklError::Configuration(_))));
    }

    #[test]
    fn particles_and_sparse_leaves() {
        let xml = r#"
            <volume type="particle">
                <float name="clampMaxCumulativeValue" value="2"/>
                <particle position="0,0,0" radius="1"/>
                <particle position="1,0,0" radius="0.5"/>
            </volume>
        "#;
        let params = match parse_volume(xml).unwrap() {
            VolumeDescription::Particle(p) => p,
            other => panic!("unexpected {}", other.type_name()),
        };
        assert_eq!(params.positions.len(), 2);
        assert!(params.weights.is_none());
        assert_eq!(params.clamp_max_cumulative_value, 2.0);
        assert_eq!(params.radius_support_factor, 3.0);

        let xml = r#"
            <volume type="vdb">
                <leaf origin="0,0,8"><data fill="1.5"/></leaf>
            </volume>
        "#;
        let volume = parse_volume(xml).unwrap().commit().unwrap();
        assert!(volume.value_range().unwrap().contains(1.5));
    }

    #[test]
    fn malformed_documents_are_parse_errors() {
        assert!(matches!(parse_volume("<volume/>"), Err(VklError::Parse(_))));
        assert!(matches!(parse_volume(r#"<volume type="mesh"/>"#), Err(VklError::Parse(_))));
        let bad_number = r#"<volume type="structuredRegular"><vector name="dimensions" value="1,1,x"/></volume>"#;
        assert!(matches!(parse_volume(bad_number), Err(VklError::Parse(_))));
        assert!(matches!(load_volume("/nonexistent/volume.xml"), Err(VklError::Io(_))));
    }

    #[test]
    fn overflowing_voxel_counts_are_parse_errors() {
        let structured = r#"
            <volume type="structuredRegular">
                <vector name="dimensions" value="2147483647, 2147483647, 2147483647"/>
                <data fill="1"/>
            </volume>
        "#;
        assert!(matches!(parse_volume(structured), Err(VklError::Parse(_))));

        let amr = r#"
            <volume type="amr">
                <float name="cellWidth" value="1"/>
                <block lower="-2147483648,-2147483648,-2147483648" upper="2147483647,2147483647,2147483647">
                    <data fill="1"/>
                </block>
            </volume>
        "#;
        assert!(matches!(parse_volume(amr), Err(VklError::Parse(_))));
    }
}
