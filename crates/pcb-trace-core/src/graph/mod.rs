pub mod adjacency;
pub mod annotation;
pub mod component;
pub mod link;
pub mod point;

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use kurbo::{Line, Point as Position, Rect};
use thiserror::Error;

pub use annotation::{ImageLayer, Note};
pub use component::Component;
pub use link::{End, Link};
pub use point::{Emphasis, PadInfo, Point, PointKind};

use crate::bus::{EventKind, NotificationBus, Subject};
use crate::config::AppearanceConfig;
use crate::layer::{ItemRef, LayerStack, Side};
use crate::registry::{IdKind, IdRegistry, RegistryError};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub i32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(PointId);
entity_id!(LinkId);
entity_id!(ComponentId);
entity_id!(
    /// Group number stamped on links by the track-graph analysis.
    TrackGraphId
);
entity_id!(NoteId);

impl PointId {
    /// Id carried by points that are not registered with any board.
    pub const PHANTOM: PointId = PointId(-1);
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("point {0} does not exist")]
    UnknownPoint(PointId),
    #[error("link {0} does not exist")]
    UnknownLink(LinkId),
    #[error("component {0} does not exist")]
    UnknownComponent(ComponentId),
    #[error("note {0} does not exist")]
    UnknownNote(NoteId),
    #[error("phantom points cannot be part of a board")]
    PhantomPoint,
    #[error("point {pad} is already a pad of component {owner}")]
    PadAlreadyOwned { pad: PointId, owner: ComponentId },
    #[error("point {0} already exists")]
    DuplicatePoint(PointId),
    #[error("link {0} already exists")]
    DuplicateLink(LinkId),
    #[error("component {0} already exists")]
    DuplicateComponent(ComponentId),
    #[error("note {0} already exists")]
    DuplicateNote(NoteId),
    #[error("inconsistent board: {0}")]
    Inconsistent(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// A point taken off the board together with the links that went with it.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedPoint {
    pub point: Point,
    pub links: Vec<Link>,
    /// Slot the pad held in its component.
    pub pad_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemovedComponent {
    pub component: Component,
    pub pads: Vec<Point>,
    pub links: Vec<Link>,
}

/// The connectivity model of one board: points, links, components, notes and
/// image references, plus the context objects they depend on (id registry,
/// appearance, notification bus).
///
/// All mutation goes through the methods below. Each of them is either its
/// own inverse (`move_to`, `set_side`) or has one (`remove_*` / `restore_*`),
/// so an undo stack can be layered on top without touching internals.
#[derive(Debug)]
pub struct Board {
    points: BTreeMap<PointId, Point>,
    links: BTreeMap<LinkId, Link>,
    components: BTreeMap<ComponentId, Component>,
    notes: BTreeMap<NoteId, Note>,
    image_layers: BTreeMap<Side, ImageLayer>,
    layers: LayerStack,
    registry: IdRegistry,
    note_count: i32,
    active_side: Side,
    appearance: AppearanceConfig,
    bus: NotificationBus,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    pub fn new() -> Self {
        Self::with_appearance(AppearanceConfig::default())
    }

    pub fn with_appearance(appearance: AppearanceConfig) -> Self {
        Self {
            points: BTreeMap::new(),
            links: BTreeMap::new(),
            components: BTreeMap::new(),
            notes: BTreeMap::new(),
            image_layers: BTreeMap::new(),
            layers: LayerStack::new(),
            registry: IdRegistry::new(),
            note_count: 0,
            active_side: Side::Front,
            appearance,
            bus: NotificationBus::new(),
        }
    }

    pub fn point(&self, id: PointId) -> Option<&Point> {
        self.points.get(&id)
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(&id)
    }

    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(&id)
    }

    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.notes.get(&id)
    }

    /// Points (free points and pads) in id order.
    pub fn points(&self) -> impl Iterator<Item = &Point> {
        self.points.values()
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.notes.values()
    }

    pub fn image_layers(&self) -> impl Iterator<Item = &ImageLayer> {
        self.image_layers.values()
    }

    pub fn image_layer(&self, side: Side) -> Option<&ImageLayer> {
        self.image_layers.get(&side)
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
            && self.links.is_empty()
            && self.components.is_empty()
            && self.notes.is_empty()
            && self.image_layers.is_empty()
    }

    pub fn layers(&self) -> &LayerStack {
        &self.layers
    }

    pub fn set_layer_visible(&mut self, side: Side, visible: bool) {
        self.layers.set_visible(side, visible);
    }

    pub fn is_layer_visible(&self, side: Side) -> bool {
        self.layers.is_visible(side)
    }

    pub fn registry(&self) -> &IdRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut IdRegistry {
        &mut self.registry
    }

    /// Last note id handed out.
    pub fn last_note_id(&self) -> i32 {
        self.note_count
    }

    pub fn appearance(&self) -> &AppearanceConfig {
        &self.appearance
    }

    pub fn set_appearance(&mut self, appearance: AppearanceConfig) {
        self.appearance = appearance;
    }

    pub fn bus_mut(&mut self) -> &mut NotificationBus {
        &mut self.bus
    }

    pub fn subscribe<F>(&mut self, kind: EventKind, listener: F)
    where
        F: FnMut(EventKind, &Subject) + 'static,
    {
        self.bus.subscribe(kind, listener);
    }

    /// The side currently being edited.
    pub fn active_side(&self) -> Side {
        self.active_side
    }

    pub fn set_active_side(&mut self, side: Side) {
        self.active_side = side;
    }

    pub fn create_point(&mut self, position: Position, side: Side) -> PointId {
        let id = PointId(self.registry.generate(IdKind::Point));
        self.points.insert(id, Point::new(id, position, side));
        self.layers.place(id, side);
        log::debug!("Created point {id} at {position:?} on {side}");
        id
    }

    /// A link with no endpoints yet.
    pub fn create_link(&mut self, side: Side) -> LinkId {
        let id = LinkId(self.registry.generate(IdKind::Link));
        self.links.insert(id, Link::new(id, side));
        self.layers.place(id, side);
        id
    }

    pub fn create_component(&mut self, name: impl Into<String>) -> ComponentId {
        let id = ComponentId(self.registry.generate(IdKind::Component));
        let component = Component::new(id, name);
        log::debug!("Created {component}");
        self.components.insert(id, component);
        self.bus.publish(EventKind::ComponentCreated, Subject::Component(id));
        id
    }

    /// Make `pad` a contact of `component`, appended after its existing pads.
    /// The point moves to the POINT layer.
    pub fn add_pad(
        &mut self,
        component: ComponentId,
        pad: PointId,
        number: i32,
        name: impl Into<String>,
    ) -> Result<(), GraphError> {
        let owner = self
            .components
            .get_mut(&component)
            .ok_or(GraphError::UnknownComponent(component))?;
        let point = self
            .points
            .get_mut(&pad)
            .ok_or(GraphError::UnknownPoint(pad))?;

        if let Some(info) = point.pad() {
            if info.component == component {
                return Ok(());
            }
            return Err(GraphError::PadAlreadyOwned {
                pad,
                owner: info.component,
            });
        }

        point.kind = PointKind::Pad(PadInfo {
            component,
            number,
            name: name.into(),
        });
        point.side = Side::Point;
        point.emphasis = Emphasis::Persistent;
        owner.pads.push(pad);
        self.layers.place(pad, Side::Point);
        Ok(())
    }

    pub fn create_pad(
        &mut self,
        component: ComponentId,
        name: impl Into<String>,
        position: Position,
        number: i32,
    ) -> Result<PointId, GraphError> {
        if !self.components.contains_key(&component) {
            return Err(GraphError::UnknownComponent(component));
        }
        let pad = self.create_point(position, Side::Point);
        self.add_pad(component, pad, number, name)?;
        Ok(pad)
    }

    /// Set both endpoints of `link`. Re-connecting to the same points is a
    /// no-op for their link lists; replacing an endpoint detaches the link
    /// from the old point.
    pub fn connect(
        &mut self,
        link: LinkId,
        from: Option<PointId>,
        to: Option<PointId>,
    ) -> Result<(), GraphError> {
        self.ensure_link(link)?;
        for point in [from, to].into_iter().flatten() {
            self.ensure_point(point)?;
        }

        let mut touched: Vec<PointId> = Vec::with_capacity(4);
        touched.extend(self.replace_endpoint(link, End::From, from));
        touched.extend(self.replace_endpoint(link, End::To, to));
        touched.extend(from);
        touched.extend(to);

        self.track_points(link);
        self.after_endpoint_change(&touched);
        Ok(())
    }

    pub fn set_link_endpoint(
        &mut self,
        link: LinkId,
        end: End,
        point: Option<PointId>,
    ) -> Result<(), GraphError> {
        self.ensure_link(link)?;
        if let Some(point) = point {
            self.ensure_point(point)?;
        }

        let mut touched: Vec<PointId> = Vec::with_capacity(2);
        touched.extend(self.replace_endpoint(link, end, point));
        touched.extend(point);

        self.track_points(link);
        self.after_endpoint_change(&touched);
        Ok(())
    }

    /// Detach `link` from its endpoints and drop it. The endpoints stay.
    pub fn remove_link(&mut self, link: LinkId) -> Result<Link, GraphError> {
        self.take_link(link, None).ok_or(GraphError::UnknownLink(link))
    }

    /// Remove every link touching `point`, then the point itself. A pad also
    /// leaves its component's pad list.
    pub fn remove_point(&mut self, point: PointId) -> Result<RemovedPoint, GraphError> {
        let link_ids = self
            .points
            .get(&point)
            .ok_or(GraphError::UnknownPoint(point))?
            .links
            .clone();

        let links: Vec<Link> = link_ids
            .into_iter()
            .filter_map(|link| self.take_link(link, Some(point)))
            .collect();

        let Some(removed) = self.points.remove(&point) else {
            return Err(GraphError::UnknownPoint(point));
        };
        self.layers.remove(point);

        let mut pad_index = None;
        match removed.pad() {
            Some(info) => {
                if let Some(owner) = self.components.get_mut(&info.component) {
                    pad_index = owner.pads.iter().position(|&p| p == point);
                    owner.pads.retain(|&p| p != point);
                }
            }
            None => {
                self.bus.publish(EventKind::PointDeleted, Subject::Point(point));
            }
        }

        log::debug!("Removed point {point} and {} link(s)", links.len());
        Ok(RemovedPoint {
            point: removed,
            links,
            pad_index,
        })
    }

    /// Remove a component with all of its pads and every link attached to
    /// them. Either everything goes or nothing changes.
    pub fn remove_component(
        &mut self,
        component: ComponentId,
    ) -> Result<RemovedComponent, GraphError> {
        let pad_ids = self
            .components
            .get(&component)
            .ok_or(GraphError::UnknownComponent(component))?
            .pads
            .clone();
        if let Some(missing) = pad_ids.iter().find(|&&id| !self.points.contains_key(&id)) {
            return Err(GraphError::Inconsistent(format!(
                "component {component} lists missing pad {missing}"
            )));
        }

        let mut pads = Vec::with_capacity(pad_ids.len());
        let mut links = Vec::new();
        for &pad in &pad_ids {
            let removed = self.remove_point(pad)?;
            links.extend(removed.links);
            pads.push(removed.point);
        }

        let Some(mut removed) = self.components.remove(&component) else {
            return Err(GraphError::UnknownComponent(component));
        };
        removed.pads = pad_ids;
        self.bus.publish(EventKind::ComponentDeleted, Subject::Component(component));

        log::debug!("Removed {removed} with {} link(s)", links.len());
        Ok(RemovedComponent {
            component: removed,
            pads,
            links,
        })
    }

    /// Move `point` and re-derive the geometry of its links. Returns the
    /// previous position so the move can be undone with another `move_to`.
    pub fn move_to(&mut self, point: PointId, position: Position) -> Result<Position, GraphError> {
        let target = self
            .points
            .get_mut(&point)
            .ok_or(GraphError::UnknownPoint(point))?;
        let previous = std::mem::replace(&mut target.position, position);
        let links = target.links.clone();
        for link in links {
            self.track_points(link);
        }
        Ok(previous)
    }

    /// Assign `item` to `side` and re-parent it to that layer. Pads stay on
    /// POINT whatever is asked. Changing a link's side refreshes its endpoints.
    pub fn set_side(&mut self, item: impl Into<ItemRef>, side: Side) -> Result<(), GraphError> {
        match item.into() {
            ItemRef::Point(id) => {
                let point = self
                    .points
                    .get_mut(&id)
                    .ok_or(GraphError::UnknownPoint(id))?;
                let side = if point.is_pad() { Side::Point } else { side };
                point.side = side;
                self.layers.place(id, side);
            }
            ItemRef::Link(id) => {
                let link = self.links.get_mut(&id).ok_or(GraphError::UnknownLink(id))?;
                link.side = side;
                log::debug!("Link {id} moved to {side}");
                self.layers.place(id, side);
                self.track_points(id);
                self.refresh_link(id);
            }
            ItemRef::Note(id) => {
                if !self.notes.contains_key(&id) {
                    return Err(GraphError::UnknownNote(id));
                }
                self.layers.place(id, side);
            }
        }
        Ok(())
    }

    /// Re-derive emphasis. For a link this refreshes both endpoints.
    pub fn refresh(&mut self, item: impl Into<ItemRef>) -> Result<(), GraphError> {
        match item.into() {
            ItemRef::Point(id) => {
                self.ensure_point(id)?;
                self.refresh_point(id);
            }
            ItemRef::Link(id) => {
                self.ensure_link(id)?;
                self.refresh_link(id);
            }
            ItemRef::Note(id) => {
                if !self.notes.contains_key(&id) {
                    return Err(GraphError::UnknownNote(id));
                }
            }
        }
        Ok(())
    }

    /// Whether hovering `point` should let the user grab it: pads always do,
    /// free points only when one of their links is on the active side or on
    /// WORK_IN_PROGRESS.
    pub fn point_responds_to_hover(&self, point: PointId) -> Result<bool, GraphError> {
        let target = self
            .points
            .get(&point)
            .ok_or(GraphError::UnknownPoint(point))?;
        if target.is_pad() {
            return Ok(true);
        }
        Ok(target
            .links
            .iter()
            .filter_map(|id| self.links.get(id))
            .any(|link| link.side == self.active_side || link.side == Side::WorkInProgress))
    }

    pub fn set_graph_id(
        &mut self,
        link: LinkId,
        graph_id: Option<TrackGraphId>,
    ) -> Result<(), GraphError> {
        let target = self
            .links
            .get_mut(&link)
            .ok_or(GraphError::UnknownLink(link))?;
        target.graph_id = graph_id;
        Ok(())
    }

    pub fn set_link_width(&mut self, link: LinkId, width: Option<u32>) -> Result<(), GraphError> {
        let target = self
            .links
            .get_mut(&link)
            .ok_or(GraphError::UnknownLink(link))?;
        target.width = width;
        Ok(())
    }

    pub fn set_point_size(&mut self, point: PointId, size: Option<u32>) -> Result<(), GraphError> {
        let target = self
            .points
            .get_mut(&point)
            .ok_or(GraphError::UnknownPoint(point))?;
        target.size = size;
        Ok(())
    }

    pub fn set_link_highlighted(
        &mut self,
        link: LinkId,
        highlighted: bool,
    ) -> Result<(), GraphError> {
        let target = self
            .links
            .get_mut(&link)
            .ok_or(GraphError::UnknownLink(link))?;
        target.highlighted = highlighted;
        if !highlighted {
            self.refresh_link(link);
        }
        Ok(())
    }

    /// Returns the previous anchor position. Pads do not move with it.
    pub fn set_component_position(
        &mut self,
        component: ComponentId,
        position: Position,
    ) -> Result<Position, GraphError> {
        let target = self
            .components
            .get_mut(&component)
            .ok_or(GraphError::UnknownComponent(component))?;
        Ok(std::mem::replace(&mut target.position, position))
    }

    /// Outline of a component's pads, or `None` for an unknown or empty
    /// component.
    pub fn component_outline(&self, component: ComponentId) -> Option<Rect> {
        let owner = self.components.get(&component)?;
        component::outline(
            owner
                .pads
                .iter()
                .filter_map(|id| self.points.get(id))
                .map(|pad| pad.position),
        )
    }

    /// Put back a link returned by [`Board::remove_link`]. Both endpoints
    /// must exist.
    pub fn restore_link(&mut self, link: Link) -> Result<(), GraphError> {
        if self.links.contains_key(&link.id) {
            return Err(GraphError::DuplicateLink(link.id));
        }
        for point in link.endpoints() {
            self.ensure_point(point)?;
        }

        let id = link.id;
        let endpoints: Vec<PointId> = link.endpoints().collect();
        self.layers.place(id, link.side);
        self.links.insert(id, link);
        for &point in &endpoints {
            if let Some(target) = self.points.get_mut(&point) {
                target.attach(id);
            }
        }
        self.track_points(id);
        self.after_endpoint_change(&endpoints);
        Ok(())
    }

    /// Put back a point returned by [`Board::remove_point`], along with the
    /// links removed with it.
    pub fn restore_point(&mut self, removed: RemovedPoint) -> Result<(), GraphError> {
        let RemovedPoint {
            mut point,
            links,
            pad_index,
        } = removed;
        let id = point.id;

        if point.is_phantom() {
            return Err(GraphError::PhantomPoint);
        }
        if self.points.contains_key(&id) {
            return Err(GraphError::DuplicatePoint(id));
        }
        if let Some(info) = point.pad() {
            if !self.components.contains_key(&info.component) {
                return Err(GraphError::UnknownComponent(info.component));
            }
        }
        for link in &links {
            if self.links.contains_key(&link.id) {
                return Err(GraphError::DuplicateLink(link.id));
            }
            if let Some(other) = link
                .endpoints()
                .find(|&p| p != id && !self.points.contains_key(&p))
            {
                return Err(GraphError::UnknownPoint(other));
            }
        }

        point.links.clear();
        self.layers.place(id, point.side);
        if let Some(info) = point.pad() {
            if let Some(owner) = self.components.get_mut(&info.component) {
                let at = pad_index.unwrap_or(owner.pads.len()).min(owner.pads.len());
                owner.pads.insert(at, id);
            }
        }
        self.points.insert(id, point);

        for link in links {
            self.restore_link(link)?;
        }
        Ok(())
    }

    /// Put back a component returned by [`Board::remove_component`].
    pub fn restore_component(&mut self, removed: RemovedComponent) -> Result<(), GraphError> {
        let RemovedComponent {
            component,
            pads,
            links,
        } = removed;

        if self.components.contains_key(&component.id) {
            return Err(GraphError::DuplicateComponent(component.id));
        }
        let pad_ids: HashSet<PointId> = pads.iter().map(|p| p.id).collect();
        if let Some(pad) = pads.iter().find(|p| self.points.contains_key(&p.id)) {
            return Err(GraphError::DuplicatePoint(pad.id));
        }
        for link in &links {
            if self.links.contains_key(&link.id) {
                return Err(GraphError::DuplicateLink(link.id));
            }
            if let Some(other) = link
                .endpoints()
                .find(|p| !pad_ids.contains(p) && !self.points.contains_key(p))
            {
                return Err(GraphError::UnknownPoint(other));
            }
        }

        let id = component.id;
        self.components.insert(id, component);
        for mut pad in pads {
            pad.links.clear();
            self.layers.place(pad.id, pad.side);
            self.points.insert(pad.id, pad);
        }
        for link in links {
            self.restore_link(link)?;
        }
        self.bus.publish(EventKind::ComponentCreated, Subject::Component(id));
        Ok(())
    }

    pub fn create_note(&mut self, rect: Rect, text: impl Into<String>) -> NoteId {
        self.note_count += 1;
        let id = NoteId(self.note_count);
        self.notes.insert(
            id,
            Note {
                id,
                rect,
                text: text.into(),
            },
        );
        self.layers.place(id, Side::Notes);
        self.bus.publish(EventKind::NoteCreated, Subject::Note(id));
        id
    }

    pub fn set_note_text(
        &mut self,
        note: NoteId,
        text: impl Into<String>,
    ) -> Result<(), GraphError> {
        let target = self
            .notes
            .get_mut(&note)
            .ok_or(GraphError::UnknownNote(note))?;
        target.text = text.into();
        Ok(())
    }

    pub fn remove_note(&mut self, note: NoteId) -> Result<Note, GraphError> {
        let removed = self
            .notes
            .remove(&note)
            .ok_or(GraphError::UnknownNote(note))?;
        self.layers.remove(note);
        self.bus.publish(EventKind::NoteDeleted, Subject::Note(note));
        Ok(removed)
    }

    /// Reference a background image for `layer.side`, replacing any previous one.
    pub fn set_image_layer(&mut self, layer: ImageLayer) -> Option<ImageLayer> {
        self.image_layers.insert(layer.side, layer)
    }

    pub fn clear_image_layer(&mut self, side: Side) -> Option<ImageLayer> {
        self.image_layers.remove(&side)
    }

    /// Drop every entity and reset all counters. Listeners and layer
    /// visibility survive.
    pub fn clear(&mut self) {
        self.points.clear();
        self.links.clear();
        self.components.clear();
        self.notes.clear();
        self.image_layers.clear();
        self.layers.clear();
        self.registry.reset();
        self.note_count = 0;
        log::debug!("Board cleared");
        self.bus.publish(EventKind::SceneCleared, Subject::Scene);
    }

    /// Tell listeners how many links a free point now has.
    pub fn notify_link_changes(&mut self, point: PointId) {
        let Some(target) = self.points.get(&point) else {
            return;
        };
        if target.is_pad() {
            return;
        }
        let kind = if target.links.len() > 1 {
            EventKind::PointMadeMultipleLinks
        } else {
            EventKind::PointMadeSingleLink
        };
        self.bus.publish(kind, Subject::Point(point));
    }

    /// Check every structural invariant: link/point symmetry, pad ownership
    /// and layer membership.
    pub fn validate(&self) -> Result<(), GraphError> {
        let fail = |msg: String| Err(GraphError::Inconsistent(msg));

        for link in self.links.values() {
            let id = link.id;
            for end in link.endpoints() {
                match self.points.get(&end) {
                    None => return fail(format!("link {id} references missing point {end}")),
                    Some(point) if !point.links.contains(&id) => {
                        return fail(format!("point {end} does not list link {id}"));
                    }
                    Some(_) => {}
                }
            }
            if self.layers.layer_of(id) != Some(link.side) {
                return fail(format!("link {id} is not on layer {}", link.side));
            }
        }

        for point in self.points.values() {
            let id = point.id;
            let mut seen = HashSet::new();
            for &link in &point.links {
                if !seen.insert(link) {
                    return fail(format!("point {id} lists link {link} twice"));
                }
                match self.links.get(&link) {
                    Some(l) if l.touches(id) => {}
                    _ => return fail(format!("point {id} lists foreign link {link}")),
                }
            }
            if self.layers.layer_of(id) != Some(point.side) {
                return fail(format!("point {id} is not on layer {}", point.side));
            }
            if let Some(info) = point.pad() {
                let owner = info.component;
                let owned = self
                    .components
                    .get(&owner)
                    .is_some_and(|c| c.pads.contains(&id));
                if !owned || point.side != Side::Point {
                    return fail(format!("pad {id} is detached from component {owner}"));
                }
            }
        }

        for component in self.components.values() {
            let id = component.id;
            for pad in &component.pads {
                let owned_here = self
                    .points
                    .get(pad)
                    .and_then(|p| p.pad())
                    .is_some_and(|info| info.component == id);
                if !owned_here {
                    return fail(format!("component {id} lists foreign pad {pad}"));
                }
            }
        }
        Ok(())
    }

    pub(crate) fn insert_point(&mut self, point: Point) -> Result<(), GraphError> {
        if point.is_phantom() {
            return Err(GraphError::PhantomPoint);
        }
        if self.points.contains_key(&point.id) {
            return Err(GraphError::DuplicatePoint(point.id));
        }
        self.layers.place(point.id, point.side);
        self.points.insert(point.id, point);
        Ok(())
    }

    pub(crate) fn insert_component(&mut self, component: Component) -> Result<(), GraphError> {
        if self.components.contains_key(&component.id) {
            return Err(GraphError::DuplicateComponent(component.id));
        }
        self.components.insert(component.id, component);
        Ok(())
    }

    /// Insert an unconnected link under a fixed id.
    pub(crate) fn insert_link(&mut self, link: Link) -> Result<(), GraphError> {
        if self.links.contains_key(&link.id) {
            return Err(GraphError::DuplicateLink(link.id));
        }
        self.layers.place(link.id, link.side);
        self.links.insert(link.id, link);
        Ok(())
    }

    pub(crate) fn insert_note(&mut self, note: Note) -> Result<(), GraphError> {
        if self.notes.contains_key(&note.id) {
            return Err(GraphError::DuplicateNote(note.id));
        }
        self.layers.place(note.id, Side::Notes);
        self.notes.insert(note.id, note);
        Ok(())
    }

    pub(crate) fn set_last_note_id(&mut self, value: i32) {
        self.note_count = value.max(0);
    }

    /// Move every entity, counter and the appearance out of `other`, keeping
    /// this board's listeners, layer visibility and active side.
    pub(crate) fn adopt(&mut self, other: Board) {
        let Board {
            points,
            links,
            components,
            notes,
            image_layers,
            layers,
            registry,
            note_count,
            appearance,
            ..
        } = other;

        let visibility: Vec<(Side, bool)> = self
            .layers
            .iter()
            .map(|layer| (layer.side, layer.visible))
            .collect();

        self.points = points;
        self.links = links;
        self.components = components;
        self.notes = notes;
        self.image_layers = image_layers;
        self.layers = layers;
        self.registry = registry;
        self.note_count = note_count;
        self.appearance = appearance;

        for (side, visible) in visibility {
            self.layers.set_visible(side, visible);
        }
    }

    pub(crate) fn publish(&mut self, kind: EventKind, subject: Subject) {
        self.bus.publish(kind, subject);
    }

    fn ensure_point(&self, point: PointId) -> Result<(), GraphError> {
        if point == PointId::PHANTOM {
            return Err(GraphError::PhantomPoint);
        }
        if !self.points.contains_key(&point) {
            return Err(GraphError::UnknownPoint(point));
        }
        Ok(())
    }

    fn ensure_link(&self, link: LinkId) -> Result<(), GraphError> {
        if !self.links.contains_key(&link) {
            return Err(GraphError::UnknownLink(link));
        }
        Ok(())
    }

    /// Swap one endpoint and keep both link lists in step. Returns the point
    /// that lost the link, if any.
    fn replace_endpoint(
        &mut self,
        link: LinkId,
        end: End,
        point: Option<PointId>,
    ) -> Option<PointId> {
        let target = self.links.get_mut(&link)?;
        let previous = target.set_endpoint(end, point);
        let still_attached: Vec<PointId> = target.endpoints().collect();

        if let Some(new) = point {
            if let Some(p) = self.points.get_mut(&new) {
                p.attach(link);
            }
        }

        let old = previous.filter(|old| !still_attached.contains(old))?;
        if let Some(p) = self.points.get_mut(&old) {
            p.detach(link);
        }
        Some(old)
    }

    /// Recompute a link's segment from its endpoints' positions.
    fn track_points(&mut self, link: LinkId) {
        let Some(target) = self.links.get(&link) else {
            return;
        };
        let position = |id: Option<PointId>| {
            id.and_then(|id| self.points.get(&id)).map(|p| p.position)
        };
        let line = match (position(target.from), position(target.to)) {
            (Some(a), Some(b)) => Line::new(a, b),
            (Some(p), None) | (None, Some(p)) => Line::new(p, p),
            (None, None) => Line::new(Position::ORIGIN, Position::ORIGIN),
        };
        if let Some(target) = self.links.get_mut(&link) {
            target.line = line;
        }
    }

    fn refresh_link(&mut self, link: LinkId) {
        let endpoints: Vec<PointId> = match self.links.get(&link) {
            Some(target) => target.endpoints().collect(),
            None => return,
        };
        for point in endpoints {
            self.refresh_point(point);
        }
    }

    fn refresh_point(&mut self, point: PointId) {
        let Some(target) = self.points.get(&point) else {
            return;
        };
        let emphasis = if target.is_pad() {
            Emphasis::Persistent
        } else {
            let mut sides = target
                .links
                .iter()
                .filter_map(|id| self.links.get(id))
                .map(|link| link.side);
            let mixed = match sides.next() {
                Some(first) => sides.any(|side| side != first),
                None => false,
            };
            if mixed {
                Emphasis::Persistent
            } else {
                Emphasis::FadeOnHoverOut
            }
        };
        if let Some(target) = self.points.get_mut(&point) {
            target.emphasis = emphasis;
        }
    }

    fn after_endpoint_change(&mut self, touched: &[PointId]) {
        let mut done = HashSet::new();
        for &point in touched {
            if done.insert(point) {
                self.refresh_point(point);
                self.notify_link_changes(point);
            }
        }
    }

    /// Unhook and drop a link. `dying` is an endpoint about to be removed
    /// itself, which is neither refreshed nor announced.
    fn take_link(&mut self, link: LinkId, dying: Option<PointId>) -> Option<Link> {
        let removed = self.links.remove(&link)?;
        self.layers.remove(link);
        let endpoints: Vec<PointId> = removed.endpoints().collect();
        for point in &endpoints {
            if let Some(target) = self.points.get_mut(point) {
                target.detach(link);
            }
        }
        let survivors: Vec<PointId> = endpoints
            .into_iter()
            .filter(|&p| Some(p) != dying)
            .collect();
        self.after_endpoint_change(&survivors);
        log::debug!("Removed link {link}");
        Some(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::LastIds;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn record(board: &mut Board, kinds: &[EventKind]) -> Rc<RefCell<Vec<(EventKind, Subject)>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        for &kind in kinds {
            let events = events.clone();
            board.subscribe(kind, move |kind, subject| {
                events.borrow_mut().push((kind, *subject))
            });
        }
        events
    }

    fn two_points(board: &mut Board) -> (PointId, PointId, LinkId) {
        let a = board.create_point(Position::new(0.0, 0.0), Side::Front);
        let b = board.create_point(Position::new(100.0, 0.0), Side::Front);
        let link = board.create_link(Side::Front);
        board.connect(link, Some(a), Some(b)).unwrap();
        (a, b, link)
    }

    #[test]
    fn test_create_point_uses_registry() {
        let mut board = Board::new();
        let a = board.create_point(Position::ORIGIN, Side::Front);
        let b = board.create_point(Position::ORIGIN, Side::Back);
        assert_eq!(a, PointId(1));
        assert_eq!(b, PointId(2));
        assert!(board.point(a).unwrap().links().is_empty());
        assert_eq!(board.layers().layer_of(b), Some(Side::Back));
        assert_eq!(board.registry().last(IdKind::Point), 2);
    }

    #[test]
    fn test_move_and_side_change_scenario() {
        let mut board = Board::new();
        let (a, b, link) = two_points(&mut board);

        assert_eq!(
            board.link(link).unwrap().line(),
            Line::new((0.0, 0.0), (100.0, 0.0))
        );

        let before_b = board.point(b).unwrap().clone();
        let previous = board.move_to(a, Position::new(10.0, 10.0)).unwrap();
        assert_eq!(previous, Position::new(0.0, 0.0));
        assert_eq!(
            board.link(link).unwrap().line(),
            Line::new((10.0, 10.0), (100.0, 0.0))
        );
        assert_eq!(board.point(b).unwrap(), &before_b);

        board.set_side(link, Side::Back).unwrap();
        let moved = board.link(link).unwrap();
        assert_eq!(moved.side(), Side::Back);
        assert_eq!(moved.graph_id(), None);
        assert!(board.layers().layer(Side::Back).contains(link));
        assert!(!board.layers().layer(Side::Front).contains(link));
        board.validate().unwrap();
    }

    #[test]
    fn test_connect_is_idempotent() {
        let mut board = Board::new();
        let (a, b, link) = two_points(&mut board);
        board.connect(link, Some(a), Some(b)).unwrap();

        assert_eq!(board.point(a).unwrap().links(), &[link]);
        assert_eq!(board.point(b).unwrap().links(), &[link]);
        board.validate().unwrap();
    }

    #[test]
    fn test_connect_with_missing_endpoint_is_degenerate() {
        let mut board = Board::new();
        let a = board.create_point(Position::new(5.0, 5.0), Side::Front);
        let link = board.create_link(Side::Front);
        board.connect(link, Some(a), None).unwrap();

        let l = board.link(link).unwrap();
        assert!(!l.is_connected());
        assert_eq!(l.line().p0, l.line().p1);
        assert_eq!(board.point(a).unwrap().links(), &[link]);
    }

    #[test]
    fn test_connect_rejects_unknown_and_phantom_points() {
        let mut board = Board::new();
        let a = board.create_point(Position::ORIGIN, Side::Front);
        let link = board.create_link(Side::Front);

        assert_eq!(
            board.connect(link, Some(a), Some(PointId(99))),
            Err(GraphError::UnknownPoint(PointId(99)))
        );
        assert_eq!(
            board.connect(link, Some(PointId::PHANTOM), Some(a)),
            Err(GraphError::PhantomPoint)
        );
        assert!(board.point(a).unwrap().links().is_empty());
    }

    #[test]
    fn test_reconnect_detaches_previous_endpoint() {
        let mut board = Board::new();
        let (a, b, link) = two_points(&mut board);
        let c = board.create_point(Position::new(50.0, 50.0), Side::Front);

        board.set_link_endpoint(link, End::To, Some(c)).unwrap();

        assert!(board.point(b).unwrap().links().is_empty());
        assert_eq!(board.point(c).unwrap().links(), &[link]);
        assert_eq!(board.point(a).unwrap().links(), &[link]);
        assert_eq!(
            board.link(link).unwrap().line(),
            Line::new((0.0, 0.0), (50.0, 50.0))
        );
        board.validate().unwrap();
    }

    #[test]
    fn test_remove_link_keeps_endpoints() {
        let mut board = Board::new();
        let (a, b, link) = two_points(&mut board);

        let removed = board.remove_link(link).unwrap();
        assert_eq!(removed.id(), link);
        assert!(board.link(link).is_none());
        assert!(board.point(a).unwrap().links().is_empty());
        assert!(board.point(b).unwrap().links().is_empty());
        assert_eq!(board.layers().layer_of(link), None);
        assert_eq!(board.remove_link(link), Err(GraphError::UnknownLink(link)));
    }

    #[test]
    fn test_remove_point_cascades() {
        let mut board = Board::new();
        let (a, b, first) = two_points(&mut board);
        let c = board.create_point(Position::new(0.0, 50.0), Side::Front);
        let second = board.create_link(Side::Back);
        board.connect(second, Some(a), Some(c)).unwrap();
        let events = record(&mut board, &[EventKind::PointDeleted]);

        let removed = board.remove_point(a).unwrap();
        assert_eq!(removed.links.len(), 2);
        assert!(board.link(first).is_none());
        assert!(board.link(second).is_none());
        assert!(board.point(b).unwrap().links().is_empty());
        assert!(board.point(c).unwrap().links().is_empty());
        assert_eq!(
            events.borrow().as_slice(),
            &[(EventKind::PointDeleted, Subject::Point(a))]
        );
        board.validate().unwrap();
    }

    #[test]
    fn test_pads_are_forced_onto_point_layer() {
        let mut board = Board::new();
        let u1 = board.create_component("U1");
        let pad = board
            .create_pad(u1, "VCC", Position::new(1.0, 2.0), 1)
            .unwrap();

        board.set_side(pad, Side::Back).unwrap();
        let point = board.point(pad).unwrap();
        assert_eq!(point.side(), Side::Point);
        assert_eq!(point.emphasis(), Emphasis::Persistent);
        assert_eq!(point.pad().unwrap().component, u1);
        assert_eq!(board.component(u1).unwrap().pads(), &[pad]);
        board.validate().unwrap();
    }

    #[test]
    fn test_pad_belongs_to_one_component() {
        let mut board = Board::new();
        let u1 = board.create_component("U1");
        let u2 = board.create_component("U2");
        let pad = board.create_pad(u1, "1", Position::ORIGIN, 1).unwrap();

        assert_eq!(
            board.add_pad(u2, pad, 1, "1"),
            Err(GraphError::PadAlreadyOwned { pad, owner: u1 })
        );
        board.add_pad(u1, pad, 1, "1").unwrap();
        assert_eq!(board.component(u1).unwrap().pad_count(), 1);
        assert_eq!(board.component(u2).unwrap().pad_count(), 0);
        assert_eq!(
            board.create_pad(ComponentId(42), "x", Position::ORIGIN, 1),
            Err(GraphError::UnknownComponent(ComponentId(42)))
        );
    }

    #[test]
    fn test_removing_pad_keeps_remaining_numbers() {
        let mut board = Board::new();
        let u1 = board.create_component("U1");
        let pads: Vec<PointId> = (1..=3)
            .map(|n| {
                board
                    .create_pad(u1, format!("P{n}"), Position::new(n as f64, 0.0), n)
                    .unwrap()
            })
            .collect();

        board.remove_point(pads[1]).unwrap();
        let remaining = board.component(u1).unwrap().pads().to_vec();
        assert_eq!(remaining, vec![pads[0], pads[2]]);
        assert_eq!(board.point(pads[2]).unwrap().pad().unwrap().number, 3);
        board.validate().unwrap();
    }

    #[test]
    fn test_remove_component_removes_pads_and_links() {
        let mut board = Board::new();
        let u1 = board.create_component("U1");
        let p1 = board
            .create_pad(u1, "1", Position::new(0.0, 0.0), 1)
            .unwrap();
        let p2 = board
            .create_pad(u1, "2", Position::new(10.0, 0.0), 2)
            .unwrap();
        let free = board.create_point(Position::new(50.0, 50.0), Side::Front);

        let internal = board.create_link(Side::Front);
        board.connect(internal, Some(p1), Some(p2)).unwrap();
        let external = board.create_link(Side::Back);
        board.connect(external, Some(p2), Some(free)).unwrap();

        let events = record(&mut board, &[EventKind::ComponentDeleted]);
        let removed = board.remove_component(u1).unwrap();

        assert_eq!(removed.pads.len(), 2);
        assert_eq!(removed.links.len(), 2);
        assert_eq!(removed.component.pads(), &[p1, p2]);
        assert!(board.component(u1).is_none());
        assert_eq!(board.point_count(), 1);
        assert_eq!(board.link_count(), 0);
        assert!(board.point(free).unwrap().links().is_empty());
        assert_eq!(events.borrow().len(), 1);
        board.validate().unwrap();
    }

    #[test]
    fn test_remove_then_restore_component() {
        let mut board = Board::new();
        let u1 = board.create_component("U1");
        let p1 = board
            .create_pad(u1, "1", Position::new(0.0, 0.0), 1)
            .unwrap();
        let p2 = board
            .create_pad(u1, "2", Position::new(10.0, 0.0), 2)
            .unwrap();
        let free = board.create_point(Position::new(5.0, 20.0), Side::Front);
        let link = board.create_link(Side::Front);
        board.connect(link, Some(p2), Some(free)).unwrap();

        let removed = board.remove_component(u1).unwrap();
        board.restore_component(removed.clone()).unwrap();

        assert_eq!(board.component(u1).unwrap().pads(), &[p1, p2]);
        assert_eq!(board.point(free).unwrap().links(), &[link]);
        assert_eq!(board.point(p2).unwrap().links(), &[link]);
        assert_eq!(
            board.restore_component(removed),
            Err(GraphError::DuplicateComponent(u1))
        );
        board.validate().unwrap();
    }

    #[test]
    fn test_remove_then_restore_point() {
        let mut board = Board::new();
        let (a, b, link) = two_points(&mut board);
        let before = board.link(link).unwrap().clone();

        let removed = board.remove_point(a).unwrap();
        board.restore_point(removed).unwrap();

        assert_eq!(board.link(link).unwrap(), &before);
        assert_eq!(board.point(a).unwrap().links(), &[link]);
        assert_eq!(board.point(b).unwrap().links(), &[link]);
        board.validate().unwrap();
    }

    #[test]
    fn test_refresh_emphasis_follows_link_sides() {
        let mut board = Board::new();
        let (a, _, first) = two_points(&mut board);
        let c = board.create_point(Position::new(0.0, 50.0), Side::Front);
        let second = board.create_link(Side::Front);
        board.connect(second, Some(a), Some(c)).unwrap();
        assert_eq!(board.point(a).unwrap().emphasis(), Emphasis::FadeOnHoverOut);

        board.set_side(second, Side::Back).unwrap();
        assert_eq!(board.point(a).unwrap().emphasis(), Emphasis::Persistent);
        assert_eq!(board.point(c).unwrap().emphasis(), Emphasis::FadeOnHoverOut);

        board.set_side(first, Side::Back).unwrap();
        assert_eq!(board.point(a).unwrap().emphasis(), Emphasis::FadeOnHoverOut);

        board.set_side(first, Side::Front).unwrap();
        board.remove_link(first).unwrap();
        assert_eq!(board.point(a).unwrap().emphasis(), Emphasis::FadeOnHoverOut);
    }

    #[test]
    fn test_hover_follows_active_side() {
        let mut board = Board::new();
        let (a, _, link) = two_points(&mut board);
        let lonely = board.create_point(Position::ORIGIN, Side::Front);

        assert!(board.point_responds_to_hover(a).unwrap());
        assert!(!board.point_responds_to_hover(lonely).unwrap());

        board.set_active_side(Side::Back);
        assert!(!board.point_responds_to_hover(a).unwrap());

        board.set_side(link, Side::WorkInProgress).unwrap();
        assert!(board.point_responds_to_hover(a).unwrap());

        let u1 = board.create_component("U1");
        let pad = board.create_pad(u1, "1", Position::ORIGIN, 1).unwrap();
        assert!(board.point_responds_to_hover(pad).unwrap());
    }

    #[test]
    fn test_link_notifications() {
        let mut board = Board::new();
        let events = record(
            &mut board,
            &[EventKind::PointMadeSingleLink, EventKind::PointMadeMultipleLinks],
        );
        let (a, b, _) = two_points(&mut board);
        assert_eq!(
            events.borrow().as_slice(),
            &[
                (EventKind::PointMadeSingleLink, Subject::Point(a)),
                (EventKind::PointMadeSingleLink, Subject::Point(b)),
            ]
        );

        events.borrow_mut().clear();
        let c = board.create_point(Position::ORIGIN, Side::Front);
        let link = board.create_link(Side::Front);
        board.connect(link, Some(a), Some(c)).unwrap();
        assert_eq!(
            events.borrow().first(),
            Some(&(EventKind::PointMadeMultipleLinks, Subject::Point(a)))
        );
    }

    #[test]
    fn test_highlight_and_overrides() {
        let mut board = Board::new();
        let (a, _, link) = two_points(&mut board);

        board.set_link_highlighted(link, true).unwrap();
        assert!(board.link(link).unwrap().is_highlighted());
        board.set_link_highlighted(link, false).unwrap();
        assert!(!board.link(link).unwrap().is_highlighted());

        board.set_link_width(link, Some(3)).unwrap();
        board.set_point_size(a, Some(20)).unwrap();
        let width = board.link(link).unwrap().width();
        assert_eq!(board.appearance().effective_link_width(width), 3);
        assert_eq!(board.point(a).unwrap().size(), Some(20));
    }

    #[test]
    fn test_notes_and_image_layers() {
        let mut board = Board::new();
        let kinds = [EventKind::NoteCreated, EventKind::NoteDeleted];
        let events = record(&mut board, &kinds);

        let note = board.create_note(Rect::new(0.0, 0.0, 40.0, 20.0), "check R5");
        assert_eq!(note, NoteId(1));
        assert!(board.layers().layer(Side::Notes).contains(note));
        board.set_note_text(note, "R5 ok").unwrap();
        assert_eq!(board.note(note).unwrap().text(), "R5 ok");

        board.remove_note(note).unwrap();
        assert_eq!(events.borrow().len(), 2);

        let first = board.set_image_layer(ImageLayer::new(Side::Front, "front.png"));
        assert!(first.is_none());
        let old = board.set_image_layer(ImageLayer::new(Side::Front, "front2.png"));
        assert_eq!(old.unwrap().image_path.to_str(), Some("front.png"));
        assert_eq!(board.image_layers().count(), 1);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut board = Board::new();
        two_points(&mut board);
        let u1 = board.create_component("U1");
        board.create_pad(u1, "1", Position::ORIGIN, 1).unwrap();
        board.create_note(Rect::ZERO, "note");
        board.set_layer_visible(Side::Back, false);
        assert!(!board.is_layer_visible(Side::Back));
        let events = record(&mut board, &[EventKind::SceneCleared]);

        board.clear();

        assert!(board.is_empty());
        assert_eq!(board.registry().last_ids(), LastIds::default());
        assert_eq!(board.last_note_id(), 0);
        assert!(!board.layers().is_visible(Side::Back));
        let cleared = [(EventKind::SceneCleared, Subject::Scene)];
        assert_eq!(events.borrow().as_slice(), &cleared);
        assert_eq!(
            board.create_point(Position::ORIGIN, Side::Front),
            PointId(1)
        );
    }

    #[test]
    fn test_component_outline() {
        let mut board = Board::new();
        let u1 = board.create_component("U1");
        assert_eq!(board.component_outline(u1), None);
        board
            .create_pad(u1, "1", Position::new(0.0, 0.0), 1)
            .unwrap();
        board
            .create_pad(u1, "2", Position::new(30.0, 0.0), 2)
            .unwrap();
        assert_eq!(
            board.component_outline(u1),
            Some(Rect::new(-10.0, -10.0, 40.0, 10.0))
        );
    }
}
