//! In-memory snapshot of a board, shared by both file formats.
//!
//! The record types mirror the structured document field for field. The
//! binary codec encodes the same records, plus the counter record that the
//! structured document does not carry.

use kurbo::{Point as Position, Rect};
use serde::{Deserialize, Serialize};

use crate::bus::{EventKind, Subject};
use crate::codec::{LoadError, SaveError};
use crate::config::AppearanceConfig;
use crate::graph::{
    Board, Component, ComponentId, ImageLayer, Link, LinkId, Note, NoteId, Point, PointId,
    TrackGraphId,
};
use crate::layer::Side;
use crate::registry::{IdKind, LastIds};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub components: Vec<ComponentRecord>,
    /// Free points only; pads travel inside their component.
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub links: Vec<LinkRecord>,
    #[serde(default)]
    pub image_layers: Vec<ImageLayerRecord>,
    #[serde(default)]
    pub notes: Vec<NoteRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<AppearanceConfig>,
    /// Counters as they were when the scene was taken. Only the binary
    /// format persists them.
    #[serde(skip)]
    pub last_ids: Option<LastIds>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub x: f64,
    pub y: f64,
}

impl From<Position> for PositionRecord {
    fn from(p: Position) -> Self {
        Self { x: p.x, y: p.y }
    }
}

impl From<PositionRecord> for Position {
    fn from(p: PositionRecord) -> Self {
        Position::new(p.x, p.y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRecord {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub position: PositionRecord,
    #[serde(default)]
    pub pads: Vec<PadRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PadRecord {
    pub id: i32,
    pub x: f64,
    pub y: f64,
    pub number: i32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: i32,
    pub position: PositionRecord,
    #[serde(default = "default_node_side")]
    pub side: Side,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
}

fn default_node_side() -> Side {
    Side::Point
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub id: i32,
    pub from_node_id: i32,
    pub to_node_id: i32,
    /// `-1` until the link has been assigned to a track graph.
    #[serde(default = "unassigned")]
    pub graph_id: i32,
    pub side: Side,
    #[serde(default)]
    pub width: Option<u32>,
}

fn unassigned() -> i32 {
    -1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageLayerRecord {
    /// Numeric code of the side the image belongs to.
    pub id: i32,
    pub image_path: String,
    #[serde(default)]
    pub position: PositionRecord,
    #[serde(default = "opaque")]
    pub opacity: f64,
}

fn opaque() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RectRecord {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl From<Rect> for RectRecord {
    fn from(r: Rect) -> Self {
        Self {
            x: r.x0,
            y: r.y0,
            width: r.width(),
            height: r.height(),
        }
    }
}

impl From<RectRecord> for Rect {
    fn from(r: RectRecord) -> Self {
        Rect::new(r.x, r.y, r.x + r.width, r.y + r.height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteRecord {
    pub id: i32,
    pub rect: RectRecord,
    pub text: String,
}

impl Scene {
    /// Number of points, pads included.
    pub fn point_count(&self) -> usize {
        self.nodes.len() + self.components.iter().map(|c| c.pads.len()).sum::<usize>()
    }

    /// Largest id of each kind present in the records, `0` when there is none.
    pub fn max_ids(&self) -> LastIds {
        let pads = self.components.iter().flat_map(|c| &c.pads);
        let points = pads.map(|p| p.id).chain(self.nodes.iter().map(|n| n.id));
        LastIds {
            point: points.fold(0, i32::max),
            link: self.links.iter().map(|l| l.id).fold(0, i32::max),
            track_graph: self.links.iter().map(|l| l.graph_id).fold(0, i32::max),
            component: self.components.iter().map(|c| c.id).fold(0, i32::max),
        }
    }
}

fn check_id(kind: &'static str, id: i32) -> Result<(), LoadError> {
    if id < 1 {
        return Err(LoadError::InvalidId { kind, id });
    }
    Ok(())
}

/// A restored counter must still be able to issue the next id.
fn leave_headroom(kind: &'static str, counter: i32) -> Result<i32, LoadError> {
    if counter == i32::MAX {
        return Err(LoadError::IdOverflow { kind });
    }
    Ok(counter)
}

impl Board {
    /// Capture every live entity, the counters and the appearance.
    ///
    /// Fails if a link is missing an endpoint, since the file formats have no
    /// way to express one.
    pub fn snapshot(&self) -> Result<Scene, SaveError> {
        let components = self
            .components()
            .map(|component| ComponentRecord {
                id: component.id().0,
                name: component.name().to_string(),
                position: component.position().into(),
                pads: component
                    .pads()
                    .iter()
                    .filter_map(|&pad| self.point(pad))
                    .filter_map(|pad| {
                        let info = pad.pad()?;
                        Some(PadRecord {
                            id: pad.id().0,
                            x: pad.position().x,
                            y: pad.position().y,
                            number: info.number,
                            name: info.name.clone(),
                            size: pad.size(),
                        })
                    })
                    .collect(),
            })
            .collect();

        let nodes = self
            .points()
            .filter(|p| !p.is_pad())
            .map(|p| NodeRecord {
                id: p.id().0,
                position: p.position().into(),
                side: p.side(),
                size: p.size(),
            })
            .collect();

        let links = self
            .links()
            .map(|link| match (link.from(), link.to()) {
                (Some(from), Some(to)) => Ok(LinkRecord {
                    id: link.id().0,
                    from_node_id: from.0,
                    to_node_id: to.0,
                    graph_id: link.graph_id().map_or(-1, |g| g.0),
                    side: link.side(),
                    width: link.width(),
                }),
                _ => Err(SaveError::UnconnectedLink(link.id())),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let image_layers = self
            .image_layers()
            .map(|layer| {
                let image_path = layer
                    .image_path
                    .to_str()
                    .ok_or_else(|| SaveError::NonUtf8ImagePath(layer.image_path.clone()))?;
                Ok(ImageLayerRecord {
                    id: i32::from(layer.side.code()),
                    image_path: image_path.to_string(),
                    position: layer.position.into(),
                    opacity: layer.opacity,
                })
            })
            .collect::<Result<Vec<_>, SaveError>>()?;

        let notes = self
            .notes()
            .map(|note| NoteRecord {
                id: note.id().0,
                rect: note.rect().into(),
                text: note.text().to_string(),
            })
            .collect();

        Ok(Scene {
            components,
            nodes,
            links,
            image_layers,
            notes,
            config: Some(self.appearance().clone()),
            last_ids: Some(self.registry().last_ids()),
        })
    }

    /// Replace the board's contents with `scene`.
    ///
    /// The scene is rebuilt on a scratch board first, so a failure leaves
    /// this board exactly as it was. On success the board is cleared, the
    /// new contents are swapped in, and listeners hear about every component,
    /// note and linked point as if they had just been created. When the scene
    /// carries no appearance the current one is kept.
    pub fn load_scene(&mut self, scene: Scene) -> Result<(), LoadError> {
        let appearance = match scene.config.clone() {
            Some(config) => {
                config.validate()?;
                config
            }
            None => self.appearance().clone(),
        };
        let mut staging = Board::with_appearance(appearance);

        for record in &scene.components {
            check_id("component", record.id)?;
            let id = ComponentId(record.id);
            staging.insert_component(Component::new(id, record.name.clone()))?;
            staging.set_component_position(id, record.position.into())?;

            for pad in &record.pads {
                check_id("point", pad.id)?;
                let position = Position::new(pad.x, pad.y);
                let mut point = Point::new(PointId(pad.id), position, Side::Point);
                point.size = pad.size;
                staging.insert_point(point)?;
                staging.add_pad(id, PointId(pad.id), pad.number, pad.name.clone())?;
            }
        }

        for record in &scene.nodes {
            check_id("point", record.id)?;
            let mut point = Point::new(PointId(record.id), record.position.into(), record.side);
            point.size = record.size;
            staging.insert_point(point)?;
        }

        for record in &scene.links {
            check_id("link", record.id)?;
            let id = LinkId(record.id);
            for end in [record.from_node_id, record.to_node_id] {
                if staging.point(PointId(end)).is_none() {
                    return Err(LoadError::OrphanLink {
                        link: record.id,
                        point: end,
                    });
                }
            }

            let mut link = Link::new(id, record.side);
            link.width = record.width;
            link.graph_id = (record.graph_id >= 0).then_some(TrackGraphId(record.graph_id));
            staging.insert_link(link)?;
            staging.connect(
                id,
                Some(PointId(record.from_node_id)),
                Some(PointId(record.to_node_id)),
            )?;
        }

        for record in &scene.image_layers {
            let side = u8::try_from(record.id)
                .ok()
                .and_then(Side::from_code)
                .ok_or(LoadError::InvalidSide(record.id))?;
            if staging.image_layer(side).is_some() {
                return Err(LoadError::DuplicateId {
                    kind: "image layer",
                    id: record.id,
                });
            }
            staging.set_image_layer(ImageLayer {
                side,
                image_path: record.image_path.clone().into(),
                position: record.position.into(),
                opacity: record.opacity,
            });
        }

        let mut last_note = 0;
        for record in &scene.notes {
            check_id("note", record.id)?;
            staging.insert_note(Note {
                id: NoteId(record.id),
                rect: record.rect.into(),
                text: record.text.clone(),
            })?;
            last_note = last_note.max(record.id);
        }
        staging.set_last_note_id(leave_headroom("note", last_note)?);

        let seen = scene.max_ids();
        for kind in IdKind::ALL {
            let value = match scene.last_ids {
                Some(persisted) => {
                    let stored = persisted.get(kind);
                    if stored < 0 {
                        return Err(LoadError::NegativeCounter { kind, value: stored });
                    }
                    let largest = seen.get(kind);
                    if stored < largest {
                        log::warn!("{kind} counter {stored} is behind id {largest}");
                    }
                    stored.max(largest)
                }
                None => seen
                    .get(kind)
                    .checked_add(1)
                    .ok_or(LoadError::IdOverflow { kind: kind.name() })?,
            };
            let value = leave_headroom(kind.name(), value)?;
            staging.registry_mut().force_set(kind, value)?;
        }

        staging.validate()?;

        let components: Vec<ComponentId> = staging.components().map(|c| c.id()).collect();
        let notes: Vec<NoteId> = staging.notes().map(|n| n.id()).collect();
        let linked: Vec<PointId> = staging
            .points()
            .filter(|p| !p.is_pad() && p.degree() > 0)
            .map(|p| p.id())
            .collect();

        log::info!(
            "Loaded {} component(s), {} point(s), {} link(s), {} note(s)",
            components.len(),
            staging.point_count(),
            staging.link_count(),
            notes.len()
        );

        self.clear();
        self.adopt(staging);

        for id in components {
            self.publish(EventKind::ComponentCreated, Subject::Component(id));
        }
        for id in notes {
            self.publish(EventKind::NoteCreated, Subject::Note(id));
        }
        for id in linked {
            self.notify_link_changes(id);
        }
        Ok(())
    }
}
