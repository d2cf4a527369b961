//! Compact tagged-record stream (`.pcb`).
//!
//! ## Wire Format
//!
//! A stream opens with [`MAGIC`] and a `u16` version, followed by records
//! until the end of data. All integers and floats are little-endian. Strings
//! are a `u32` byte length followed by UTF-8. Optional sizes are a presence
//! byte followed by a `u32` when present.
//!
//! | Tag | Record | Payload |
//! |-----|--------|---------|
//! | 0x01 | Component | id i32, name, x f64, y f64 |
//! | 0x02 | Link | id i32, from i32, to i32, graph i32, side u8, width opt |
//! | 0x03 | Pad | id i32, component i32, x f64, y f64, number i32, name, size opt |
//! | 0x04 | Node | id i32, x f64, y f64, side u8, size opt |
//! | 0x05 | Image layer | side i32, path, x f64, y f64, opacity f64 |
//! | 0x06 | Note | id i32, x f64, y f64, width f64, height f64, text |
//! | 0x07 | Last ids | point i32, link i32, track graph i32, component i32 |
//! | 0x08 | Config | front, back, highlighted, node, notes, wip, link width u32, pad size u32 |
//!
//! Pads follow the component they belong to.

use std::collections::HashMap;

use thiserror::Error;

use crate::config::{AppearanceConfig, Palette};
use crate::layer::Side;
use crate::registry::LastIds;
use crate::scene::{
    ComponentRecord, ImageLayerRecord, LinkRecord, NodeRecord, NoteRecord, PadRecord,
    PositionRecord, RectRecord, Scene,
};

pub const MAGIC: &[u8; 4] = b"PCBT";
pub const VERSION: u16 = 1;

const TAG_COMPONENT: u8 = 0x01;
const TAG_LINK: u8 = 0x02;
const TAG_PAD: u8 = 0x03;
const TAG_NODE: u8 = 0x04;
const TAG_IMAGE_LAYER: u8 = 0x05;
const TAG_NOTE: u8 = 0x06;
const TAG_LAST_IDS: u8 = 0x07;
const TAG_CONFIG: u8 = 0x08;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("missing stream header")]
    BadMagic,
    #[error("unsupported stream version {0}")]
    UnsupportedVersion(u16),
    #[error("unexpected end of data at byte {0}")]
    UnexpectedEnd(usize),
    #[error("invalid record tag 0x{0:02x}")]
    InvalidTag(u8),
    #[error("invalid side code {0}")]
    InvalidSide(u8),
    #[error("invalid UTF-8 string data")]
    InvalidUtf8,
    #[error("pad {pad} refers to unknown component {component}")]
    OrphanPad { pad: i32, component: i32 },
    #[error("more than one {0} record")]
    RepeatedRecord(&'static str),
}

pub fn encode(scene: &Scene) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(MAGIC);
    buf.extend(&VERSION.to_le_bytes());

    for component in &scene.components {
        buf.push(TAG_COMPONENT);
        write_i32(&mut buf, component.id);
        write_string(&mut buf, &component.name);
        write_position(&mut buf, component.position);

        for pad in &component.pads {
            buf.push(TAG_PAD);
            write_i32(&mut buf, pad.id);
            write_i32(&mut buf, component.id);
            write_f64(&mut buf, pad.x);
            write_f64(&mut buf, pad.y);
            write_i32(&mut buf, pad.number);
            write_string(&mut buf, &pad.name);
            write_opt_u32(&mut buf, pad.size);
        }
    }

    for node in &scene.nodes {
        buf.push(TAG_NODE);
        write_i32(&mut buf, node.id);
        write_position(&mut buf, node.position);
        buf.push(node.side.code());
        write_opt_u32(&mut buf, node.size);
    }

    for link in &scene.links {
        buf.push(TAG_LINK);
        write_i32(&mut buf, link.id);
        write_i32(&mut buf, link.from_node_id);
        write_i32(&mut buf, link.to_node_id);
        write_i32(&mut buf, link.graph_id);
        buf.push(link.side.code());
        write_opt_u32(&mut buf, link.width);
    }

    for layer in &scene.image_layers {
        buf.push(TAG_IMAGE_LAYER);
        write_i32(&mut buf, layer.id);
        write_string(&mut buf, &layer.image_path);
        write_position(&mut buf, layer.position);
        write_f64(&mut buf, layer.opacity);
    }

    for note in &scene.notes {
        buf.push(TAG_NOTE);
        write_i32(&mut buf, note.id);
        write_f64(&mut buf, note.rect.x);
        write_f64(&mut buf, note.rect.y);
        write_f64(&mut buf, note.rect.width);
        write_f64(&mut buf, note.rect.height);
        write_string(&mut buf, &note.text);
    }

    if let Some(ids) = scene.last_ids {
        buf.push(TAG_LAST_IDS);
        for value in [ids.point, ids.link, ids.track_graph, ids.component] {
            write_i32(&mut buf, value);
        }
    }

    if let Some(config) = &scene.config {
        let colors = &config.colors;
        buf.push(TAG_CONFIG);
        for color in [
            &colors.front,
            &colors.back,
            &colors.highlighted,
            &colors.node,
            &colors.notes,
            &colors.wip,
        ] {
            write_string(&mut buf, color);
        }
        write_u32(&mut buf, config.link_width);
        write_u32(&mut buf, config.pad_size);
    }

    buf
}

pub fn decode(bytes: &[u8]) -> Result<Scene, DecodeError> {
    let mut r = Reader::new(bytes);
    if r.take(MAGIC.len()).ok() != Some(&MAGIC[..]) {
        return Err(DecodeError::BadMagic);
    }
    let version = r.u16()?;
    if version != VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }

    let mut scene = Scene::default();
    let mut component_at: HashMap<i32, usize> = HashMap::new();

    while !r.is_at_end() {
        match r.u8()? {
            TAG_COMPONENT => {
                let id = r.i32()?;
                let name = r.string()?;
                let position = r.position()?;
                component_at.insert(id, scene.components.len());
                scene.components.push(ComponentRecord {
                    id,
                    name,
                    position,
                    pads: Vec::new(),
                });
            }
            TAG_PAD => {
                let id = r.i32()?;
                let component = r.i32()?;
                let pad = PadRecord {
                    id,
                    x: r.f64()?,
                    y: r.f64()?,
                    number: r.i32()?,
                    name: r.string()?,
                    size: r.opt_u32()?,
                };
                let owner = component_at
                    .get(&component)
                    .and_then(|&at| scene.components.get_mut(at))
                    .ok_or(DecodeError::OrphanPad { pad: id, component })?;
                owner.pads.push(pad);
            }
            TAG_NODE => {
                scene.nodes.push(NodeRecord {
                    id: r.i32()?,
                    position: r.position()?,
                    side: r.side()?,
                    size: r.opt_u32()?,
                });
            }
            TAG_LINK => {
                scene.links.push(LinkRecord {
                    id: r.i32()?,
                    from_node_id: r.i32()?,
                    to_node_id: r.i32()?,
                    graph_id: r.i32()?,
                    side: r.side()?,
                    width: r.opt_u32()?,
                });
            }
            TAG_IMAGE_LAYER => {
                scene.image_layers.push(ImageLayerRecord {
                    id: r.i32()?,
                    image_path: r.string()?,
                    position: r.position()?,
                    opacity: r.f64()?,
                });
            }
            TAG_NOTE => {
                scene.notes.push(NoteRecord {
                    id: r.i32()?,
                    rect: RectRecord {
                        x: r.f64()?,
                        y: r.f64()?,
                        width: r.f64()?,
                        height: r.f64()?,
                    },
                    text: r.string()?,
                });
            }
            TAG_LAST_IDS => {
                if scene.last_ids.is_some() {
                    return Err(DecodeError::RepeatedRecord("last ids"));
                }
                scene.last_ids = Some(LastIds {
                    point: r.i32()?,
                    link: r.i32()?,
                    track_graph: r.i32()?,
                    component: r.i32()?,
                });
            }
            TAG_CONFIG => {
                if scene.config.is_some() {
                    return Err(DecodeError::RepeatedRecord("config"));
                }
                let front = r.string()?;
                let back = r.string()?;
                let highlighted = r.string()?;
                let node = r.string()?;
                let notes = r.string()?;
                let wip = r.string()?;
                scene.config = Some(AppearanceConfig {
                    colors: Palette {
                        front,
                        back,
                        wip,
                        notes,
                        highlighted,
                        node,
                    },
                    link_width: r.u32()?,
                    pad_size: r.u32()?,
                });
            }
            tag => return Err(DecodeError::InvalidTag(tag)),
        }
    }

    Ok(scene)
}

fn write_u32(buf: &mut Vec<u8>, n: u32) {
    buf.extend(&n.to_le_bytes());
}

fn write_i32(buf: &mut Vec<u8>, n: i32) {
    buf.extend(&n.to_le_bytes());
}

fn write_f64(buf: &mut Vec<u8>, n: f64) {
    buf.extend(&n.to_le_bytes());
}

fn write_position(buf: &mut Vec<u8>, p: PositionRecord) {
    write_f64(buf, p.x);
    write_f64(buf, p.y);
}

fn write_string(buf: &mut Vec<u8>, s: &str) {
    write_u32(buf, s.len() as u32);
    buf.extend(s.as_bytes());
}

fn write_opt_u32(buf: &mut Vec<u8>, n: Option<u32>) {
    match n {
        Some(n) => {
            buf.push(1);
            write_u32(buf, n);
        }
        None => buf.push(0),
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(DecodeError::UnexpectedEnd(self.pos))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn i32(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    fn f64(&mut self) -> Result<f64, DecodeError> {
        Ok(f64::from_le_bytes(self.array()?))
    }

    fn position(&mut self) -> Result<PositionRecord, DecodeError> {
        Ok(PositionRecord {
            x: self.f64()?,
            y: self.f64()?,
        })
    }

    fn side(&mut self) -> Result<Side, DecodeError> {
        let code = self.u8()?;
        Side::from_code(code).ok_or(DecodeError::InvalidSide(code))
    }

    fn string(&mut self) -> Result<String, DecodeError> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
    }

    fn opt_u32(&mut self) -> Result<Option<u32>, DecodeError> {
        match self.u8()? {
            0 => Ok(None),
            _ => Ok(Some(self.u32()?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Vec<u8> {
        let mut buf = MAGIC.to_vec();
        buf.extend(&VERSION.to_le_bytes());
        buf
    }

    #[test]
    fn test_empty_scene() {
        let bytes = encode(&Scene::default());
        assert_eq!(bytes, header());
        assert_eq!(decode(&bytes).unwrap(), Scene::default());
    }

    #[test]
    fn test_pads_follow_their_component() {
        let scene = Scene {
            components: vec![ComponentRecord {
                id: 4,
                name: "R1".to_string(),
                position: PositionRecord { x: 1.0, y: 2.0 },
                pads: vec![PadRecord {
                    id: 9,
                    x: 3.0,
                    y: 4.0,
                    number: 1,
                    name: "A".to_string(),
                    size: Some(14),
                }],
            }],
            ..Scene::default()
        };

        let bytes = encode(&scene);
        assert_eq!(bytes[6], TAG_COMPONENT);
        assert_eq!(decode(&bytes).unwrap(), scene);
    }

    #[test]
    fn test_orphan_pad_is_rejected() {
        let mut bytes = header();
        bytes.push(TAG_PAD);
        write_i32(&mut bytes, 1);
        write_i32(&mut bytes, 77);
        write_f64(&mut bytes, 0.0);
        write_f64(&mut bytes, 0.0);
        write_i32(&mut bytes, 1);
        write_string(&mut bytes, "1");
        write_opt_u32(&mut bytes, None);

        assert_eq!(
            decode(&bytes),
            Err(DecodeError::OrphanPad {
                pad: 1,
                component: 77
            })
        );
    }

    #[test]
    fn test_malformed_streams() {
        assert_eq!(decode(b"PCB"), Err(DecodeError::BadMagic));
        assert_eq!(decode(b"{\"nodes\":[]}"), Err(DecodeError::BadMagic));

        let mut wrong_version = MAGIC.to_vec();
        wrong_version.extend(&7u16.to_le_bytes());
        assert_eq!(
            decode(&wrong_version),
            Err(DecodeError::UnsupportedVersion(7))
        );

        let mut bad_tag = header();
        bad_tag.push(0x42);
        assert_eq!(decode(&bad_tag), Err(DecodeError::InvalidTag(0x42)));

        let mut truncated = header();
        truncated.push(TAG_NODE);
        write_i32(&mut truncated, 1);
        assert_eq!(decode(&truncated), Err(DecodeError::UnexpectedEnd(11)));

        let mut bad_side = header();
        bad_side.push(TAG_NODE);
        write_i32(&mut bad_side, 1);
        write_f64(&mut bad_side, 0.0);
        write_f64(&mut bad_side, 0.0);
        bad_side.push(12);
        assert_eq!(decode(&bad_side), Err(DecodeError::InvalidSide(12)));
    }

    #[test]
    fn test_repeated_last_ids() {
        let scene = Scene {
            last_ids: Some(LastIds::default()),
            ..Scene::default()
        };
        let mut bytes = encode(&scene);
        let record = bytes[6..].to_vec();
        bytes.extend(record);
        assert_eq!(decode(&bytes), Err(DecodeError::RepeatedRecord("last ids")));
    }

    #[test]
    fn test_config_round_trip_keeps_color_order() {
        let mut config = AppearanceConfig::default();
        config.colors.highlighted = "#123456".to_string();
        config.colors.wip = "#ABCDEF".to_string();
        config.pad_size = 9;
        let scene = Scene {
            config: Some(config.clone()),
            ..Scene::default()
        };

        let decoded = decode(&encode(&scene)).unwrap();
        assert_eq!(decoded.config, Some(config));
    }
}
