//! Board sides and the layers that group items by side.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::graph::{LinkId, NoteId, PointId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Front,
    Back,
    #[serde(alias = "WIP")]
    WorkInProgress,
    Notes,
    /// Overlay for free points and component pads.
    #[serde(alias = "NODE")]
    Point,
}

impl Side {
    /// All sides, bottom-most first.
    pub const Z_ORDER: [Side; 5] = [
        Side::Back,
        Side::Front,
        Side::WorkInProgress,
        Side::Point,
        Side::Notes,
    ];

    pub fn z_value(self) -> i32 {
        match self {
            Side::Back => 0,
            Side::Front => 1,
            Side::WorkInProgress => 2,
            Side::Point => 3,
            Side::Notes => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Front => "FRONT",
            Side::Back => "BACK",
            Side::WorkInProgress => "WORK_IN_PROGRESS",
            Side::Notes => "NOTES",
            Side::Point => "POINT",
        }
    }

    /// Stable numeric code, used by the binary format and for image layer ids.
    pub fn code(self) -> u8 {
        match self {
            Side::Front => 0,
            Side::Back => 1,
            Side::WorkInProgress => 2,
            Side::Notes => 3,
            Side::Point => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<Side> {
        match code {
            0 => Some(Side::Front),
            1 => Some(Side::Back),
            2 => Some(Side::WorkInProgress),
            3 => Some(Side::Notes),
            4 => Some(Side::Point),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FRONT" => Ok(Side::Front),
            "BACK" => Ok(Side::Back),
            "WORK_IN_PROGRESS" | "WIP" => Ok(Side::WorkInProgress),
            "NOTES" => Ok(Side::Notes),
            "POINT" | "NODE" => Ok(Side::Point),
            _ => Err(format!("Unknown side: {s}")),
        }
    }
}

/// Anything that can be parented to a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemRef {
    Point(PointId),
    Link(LinkId),
    Note(NoteId),
}

impl From<PointId> for ItemRef {
    fn from(id: PointId) -> Self {
        ItemRef::Point(id)
    }
}

impl From<LinkId> for ItemRef {
    fn from(id: LinkId) -> Self {
        ItemRef::Link(id)
    }
}

impl From<NoteId> for ItemRef {
    fn from(id: NoteId) -> Self {
        ItemRef::Note(id)
    }
}

#[derive(Debug, Clone)]
pub struct Layer {
    pub side: Side,
    pub visible: bool,
    members: BTreeSet<ItemRef>,
}

impl Layer {
    fn new(side: Side) -> Self {
        Self {
            side,
            visible: true,
            members: BTreeSet::new(),
        }
    }

    pub fn contains(&self, item: impl Into<ItemRef>) -> bool {
        self.members.contains(&item.into())
    }

    pub fn members(&self) -> impl Iterator<Item = ItemRef> + '_ {
        self.members.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// The five fixed layers. Every placed item lives in exactly one of them.
#[derive(Debug, Clone)]
pub struct LayerStack {
    layers: BTreeMap<Side, Layer>,
    parent: HashMap<ItemRef, Side>,
}

impl Default for LayerStack {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerStack {
    pub fn new() -> Self {
        let layers = Side::Z_ORDER
            .iter()
            .map(|&side| (side, Layer::new(side)))
            .collect();
        Self {
            layers,
            parent: HashMap::new(),
        }
    }

    pub fn layer(&self, side: Side) -> &Layer {
        &self.layers[&side]
    }

    /// Layers bottom-most first.
    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        Side::Z_ORDER.iter().map(|side| &self.layers[side])
    }

    /// Parent `item` to `side`, detaching it from its previous layer.
    pub fn place(&mut self, item: impl Into<ItemRef>, side: Side) {
        let item = item.into();
        if let Some(previous) = self.parent.insert(item, side) {
            if let Some(layer) = self.layers.get_mut(&previous) {
                layer.members.remove(&item);
            }
        }
        if let Some(layer) = self.layers.get_mut(&side) {
            layer.members.insert(item);
        }
    }

    pub fn remove(&mut self, item: impl Into<ItemRef>) -> Option<Side> {
        let item = item.into();
        let side = self.parent.remove(&item)?;
        if let Some(layer) = self.layers.get_mut(&side) {
            layer.members.remove(&item);
        }
        Some(side)
    }

    pub fn layer_of(&self, item: impl Into<ItemRef>) -> Option<Side> {
        self.parent.get(&item.into()).copied()
    }

    pub fn set_visible(&mut self, side: Side, visible: bool) {
        if let Some(layer) = self.layers.get_mut(&side) {
            layer.visible = visible;
        }
    }

    pub fn is_visible(&self, side: Side) -> bool {
        self.layers[&side].visible
    }

    /// Drop every member. Visibility flags are kept.
    pub fn clear(&mut self) {
        for layer in self.layers.values_mut() {
            layer.members.clear();
        }
        self.parent.clear();
    }
}
