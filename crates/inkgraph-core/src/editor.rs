//! The editor: one user's view of a shared record store.
//!
//! [`EditorCore`] owns everything a tool handler may touch (store handle,
//! history, camera, input state, preferences). [`Editor`] pairs it with the
//! state chart that routes input events to tools.

use crate::bindings::BindingIndex;
use crate::camera::{zoom_about, Camera, CameraController, CameraState};
use crate::error::{EditorError, Result};
use crate::history::{HistoryManager, MarkId};
use crate::input::{EventInfo, EventTarget, InputEvent, InputState, Instant};
use crate::options::EditorOptions;
use crate::preferences::UserPreferences;
use crate::records::{
    BindingId, BindingRecord, CameraId, CameraRecord, InstanceId, InstanceRecord, PageId, PageRecord, Record,
    RecordId, RecordScope, ShapeId, ShapeRecord, TypeName,
};
use crate::shapes::{set_shape_color, shape_color, GeoKind, SerializableColor, ShapeContext};
use crate::snapshot::StoreSnapshot;
use crate::statechart::StateChart;
use crate::store::{
    Computed, Dependency, HistoryMode, RecordStore, TransactOptions, Transaction, TransactionConfig,
};
use crate::tools::{self, ToolKind};
use kurbo::{Point, Rect, Vec2};
use peniko::Color;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Padding in screen pixels around content for `zoom_to_fit`.
const FIT_PADDING: f64 = 32.0;

/// Editor state reachable from tool handlers.
pub struct EditorCore {
    store: RecordStore,
    history: HistoryManager,
    controller: CameraController,
    input: InputState,
    prefs: UserPreferences,
    options: EditorOptions,
    instance_id: InstanceId,
    next_geo: GeoKind,
    sorted_shapes: Computed<Vec<ShapeRecord>>,
    binding_index: Computed<BindingIndex>,
}

impl std::fmt::Debug for EditorCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorCore")
            .field("instance_id", &self.instance_id)
            .field("store", &self.store)
            .field("history", &self.history)
            .finish_non_exhaustive()
    }
}

impl EditorCore {
    fn new(store: RecordStore, options: EditorOptions, prefs: UserPreferences) -> Self {
        let instance_id = InstanceId::new();
        let instance_key: RecordId = instance_id.clone().into();
        let lookup = instance_id.clone();
        let sorted_shapes = Computed::new(
            "current_page_shapes_sorted",
            vec![Dependency::Kind(TypeName::Shape), Dependency::Record(instance_key)],
            move |view| {
                view.instance(&lookup)
                    .map(|instance| {
                        view.shapes_on_page(&instance.current_page_id)
                            .into_iter()
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default()
            },
        );
        let binding_index = Computed::new("binding_index", vec![Dependency::Kind(TypeName::Binding)], BindingIndex::build);
        Self {
            store,
            history: HistoryManager::new(options.max_history),
            controller: CameraController::new(options.camera.clone(), options.viewport, options.camera_settle()),
            input: InputState::new(options.drag_distance, options.modifier_decay()),
            prefs,
            options,
            instance_id,
            next_geo: GeoKind::default(),
            sorted_shapes,
            binding_index,
        }
    }

    /// Make sure there is a page, this editor's instance record and a camera
    /// for the current page.
    fn ensure_session(&mut self) -> Result<()> {
        let instance_id = self.instance_id.clone();
        self.run(TransactionConfig::ignore_history(), |tx| {
            let first = tx.view().pages().first().map(|p| p.id.clone());
            let page = match first {
                Some(page) => page,
                None => {
                    let mut page = PageRecord::new("Page 1");
                    page.index = 1;
                    let id = page.id.clone();
                    tx.create(page)?;
                    id
                }
            };
            let existing = tx.instance(&instance_id).map(|i| i.current_page_id.clone());
            let current = match existing {
                Some(current) => current,
                None => {
                    let mut instance = InstanceRecord::new(page.clone());
                    instance.id = instance_id.clone();
                    tx.create(instance)?;
                    page
                }
            };
            ensure_camera(tx, &current)
        })
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn options(&self) -> &EditorOptions {
        &self.options
    }

    pub fn preferences(&self) -> &UserPreferences {
        &self.prefs
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn camera_controller(&self) -> &CameraController {
        &self.controller
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    /// Geo kind drawn by the geo tool.
    pub fn next_geo(&self) -> GeoKind {
        self.next_geo
    }

    pub fn set_next_geo(&mut self, kind: GeoKind) {
        self.next_geo = kind;
    }

    // --- transactions and history ---

    /// Run `f` in a transaction. Committed document changes are recorded in
    /// this editor's history unless `config.history` says otherwise. A
    /// read-only editor rejects any document change with
    /// [`EditorError::ReadOnly`].
    pub fn run<T>(&mut self, config: TransactionConfig, f: impl FnOnce(&mut Transaction<'_>) -> Result<T>) -> Result<T> {
        let read_only = self.is_read_only();
        let options = TransactOptions {
            config,
            ..TransactOptions::default()
        };
        let (value, diff) = self.store.transact_with(options, |tx| {
            let value = f(tx)?;
            if read_only && !tx.pending().filter_scope(RecordScope::Document).is_empty() {
                return Err(EditorError::ReadOnly);
            }
            Ok(value)
        })?;
        if config.history == HistoryMode::Record {
            self.history.record(&diff);
        }
        Ok(value)
    }

    pub fn mark_history_stopping_point(&mut self) -> MarkId {
        self.history.mark()
    }

    /// Revert to the previous stopping point. A no-op when read-only.
    pub fn undo(&mut self) -> Result<bool> {
        if self.is_read_only() {
            return Ok(false);
        }
        self.history.undo(&self.store)
    }

    pub fn redo(&mut self) -> Result<bool> {
        if self.is_read_only() {
            return Ok(false);
        }
        self.history.redo(&self.store)
    }

    pub fn bail(&mut self) -> Result<bool> {
        self.history.bail(&self.store)
    }

    pub fn bail_to_mark(&mut self, mark: MarkId) -> Result<bool> {
        self.history.bail_to_mark(&self.store, mark)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // --- shapes ---

    /// A new shape of `shape_type` on the current page, not yet created.
    pub fn new_shape(&self, shape_type: &str) -> Result<ShapeRecord> {
        Ok(ShapeRecord::new(shape_type, self.current_page_id()?))
    }

    pub fn create_shape(&mut self, shape: ShapeRecord) -> Result<ShapeId> {
        let mut ids = self.create_shapes(vec![shape])?;
        ids.pop().ok_or_else(|| EditorError::aborted("shape creation was rejected"))
    }

    /// Create shapes. Shapes with index 0 are stacked in front of
    /// everything on their page. Returns the ids of the shapes that were
    /// actually created.
    pub fn create_shapes(&mut self, shapes: Vec<ShapeRecord>) -> Result<Vec<ShapeId>> {
        self.run(TransactionConfig::default(), |tx| {
            let mut created = Vec::with_capacity(shapes.len());
            for mut shape in shapes {
                if shape.index == 0 {
                    shape.index = tx.view().next_shape_index(&shape.page_id);
                }
                if let Some(Record::Shape(shape)) = tx.create(shape)? {
                    created.push(shape.id);
                }
            }
            Ok(created)
        })
    }

    pub fn update_shape(&mut self, id: &ShapeId, edit: impl FnOnce(&mut ShapeRecord)) -> Result<Option<ShapeRecord>> {
        self.run(TransactionConfig::default(), |tx| tx.update_shape(id, edit))
    }

    /// Apply `edit` to every shape in `ids`.
    pub fn update_shapes(&mut self, ids: &[ShapeId], edit: impl Fn(&mut ShapeRecord)) -> Result<()> {
        self.run(TransactionConfig::default(), |tx| {
            for id in ids {
                tx.update_shape(id, &edit)?;
            }
            Ok(())
        })
    }

    pub fn delete_shapes(&mut self, ids: &[ShapeId]) -> Result<()> {
        self.run(TransactionConfig::default(), |tx| {
            tx.delete(ids.iter().map(RecordId::from))
        })
    }

    /// Lock the shapes, or unlock them if they are all locked already.
    pub fn toggle_lock(&mut self, ids: &[ShapeId]) -> Result<()> {
        let all_locked = ids
            .iter()
            .all(|id| self.store.shape(id).is_some_and(|s| s.is_locked));
        self.run(TransactionConfig::default().ignoring_shape_lock(), |tx| {
            for id in ids {
                tx.update_shape(id, |s| s.is_locked = !all_locked)?;
            }
            Ok(())
        })
    }

    // --- style ---

    /// The color shared by every selected shape, if there is one.
    pub fn selection_color(&self) -> Option<Color> {
        let shapes = self.selected_shapes();
        let (first, rest) = shapes.split_first()?;
        let color = shape_color(first)?;
        let rgba = SerializableColor::from(color);
        let same = rest
            .iter()
            .all(|shape| shape_color(shape).is_some_and(|c| SerializableColor::from(c) == rgba));
        same.then_some(color)
    }

    /// Make `color` the color of new shapes and recolor the selection.
    pub fn set_color(&mut self, color: Color) -> Result<()> {
        self.prefs.update(|prefs| prefs.color = color.into());
        let ids = self.selected_shape_ids();
        if ids.is_empty() {
            return Ok(());
        }
        self.update_shapes(&ids, |shape| set_shape_color(shape, color))
    }

    // --- bindings ---

    pub fn create_binding(&mut self, binding: BindingRecord) -> Result<BindingId> {
        let id = binding.id.clone();
        let created = self.run(TransactionConfig::default(), |tx| tx.create(binding))?;
        match created {
            Some(_) => Ok(id),
            None => Err(EditorError::aborted("binding creation was rejected")),
        }
    }

    pub fn update_binding(
        &mut self,
        id: &BindingId,
        edit: impl FnOnce(&mut BindingRecord),
    ) -> Result<Option<BindingRecord>> {
        self.run(TransactionConfig::default(), |tx| tx.update_binding(id, edit))
    }

    pub fn delete_bindings(&mut self, ids: &[BindingId]) -> Result<()> {
        self.run(TransactionConfig::default(), |tx| {
            tx.delete(ids.iter().map(RecordId::from))
        })
    }

    // --- pages ---

    /// Add a page after the existing ones. Does not switch to it.
    pub fn create_page(&mut self, name: &str) -> Result<PageId> {
        self.run(TransactionConfig::default(), |tx| {
            let mut page = PageRecord::new(name);
            page.index = tx.view().next_page_index();
            let id = page.id.clone();
            tx.create(page)?;
            Ok(id)
        })
    }

    /// Delete a page with its shapes. Editors on that page move to the first
    /// remaining page. The last page cannot be deleted.
    pub fn delete_page(&mut self, id: &PageId) -> Result<()> {
        if self.store.page(id).is_none() {
            return Err(EditorError::NotFound(id.into()));
        }
        if self.pages().len() <= 1 {
            return Err(EditorError::LastPage);
        }
        self.run(TransactionConfig::default(), |tx| tx.delete_one(id).map(|_| ()))?;
        let page = self.current_page_id()?;
        self.run(TransactionConfig::ignore_history(), |tx| ensure_camera(tx, &page))
    }

    pub fn set_current_page(&mut self, id: &PageId) -> Result<()> {
        if self.store.page(id).is_none() {
            return Err(EditorError::NotFound(id.into()));
        }
        let instance_id = self.instance_id.clone();
        self.run(TransactionConfig::ignore_history(), |tx| {
            tx.update_instance(&instance_id, |i| {
                if &i.current_page_id != id {
                    i.current_page_id = id.clone();
                    i.selected_shape_ids.clear();
                }
            })?;
            ensure_camera(tx, id)
        })
    }

    pub fn pages(&self) -> Vec<PageRecord> {
        self.store.read(|view| view.pages().into_iter().cloned().collect())
    }

    pub fn page(&self, id: &PageId) -> Option<PageRecord> {
        self.store.page(id)
    }

    // --- instance ---

    pub fn instance(&self) -> Result<InstanceRecord> {
        self.store
            .instance(&self.instance_id)
            .ok_or_else(|| EditorError::NotFound(self.instance_id.clone().into()))
    }

    pub fn current_page_id(&self) -> Result<PageId> {
        self.instance().map(|i| i.current_page_id)
    }

    pub fn is_read_only(&self) -> bool {
        self.store.instance(&self.instance_id).is_some_and(|i| i.is_read_only)
    }

    pub fn set_read_only(&mut self, read_only: bool) -> Result<()> {
        let instance_id = self.instance_id.clone();
        self.run(TransactionConfig::ignore_history(), |tx| {
            tx.update_instance(&instance_id, |i| i.is_read_only = read_only)
                .map(|_| ())
        })
    }

    // --- selection ---

    pub fn selected_shape_ids(&self) -> Vec<ShapeId> {
        self.instance().map(|i| i.selected_shape_ids).unwrap_or_default()
    }

    pub fn selected_shapes(&self) -> Vec<ShapeRecord> {
        self.selected_shape_ids()
            .iter()
            .filter_map(|id| self.store.shape(id))
            .collect()
    }

    /// Replace the selection. Every id must be a shape on the current page.
    pub fn select(&mut self, ids: &[ShapeId]) -> Result<()> {
        let page = self.current_page_id()?;
        for id in ids {
            match self.store.shape(id) {
                Some(shape) if shape.page_id == page => {}
                _ => return Err(EditorError::NotFound(id.into())),
            }
        }
        let mut selection: Vec<ShapeId> = Vec::with_capacity(ids.len());
        for id in ids {
            if !selection.contains(id) {
                selection.push(id.clone());
            }
        }
        let instance_id = self.instance_id.clone();
        self.run(TransactionConfig::ignore_history(), |tx| {
            tx.update_instance(&instance_id, |i| i.selected_shape_ids = selection)
                .map(|_| ())
        })
    }

    pub fn select_none(&mut self) -> Result<()> {
        if self.selected_shape_ids().is_empty() {
            return Ok(());
        }
        self.select(&[])
    }

    pub fn select_all(&mut self) -> Result<()> {
        let ids: Vec<ShapeId> = self
            .current_page_shapes_sorted()
            .iter()
            .filter(|s| s.parent_id.is_none())
            .map(|s| s.id.clone())
            .collect();
        self.select(&ids)
    }

    // --- queries ---

    pub fn get(&self, id: &RecordId) -> Option<Record> {
        self.store.get(id)
    }

    pub fn shape(&self, id: &ShapeId) -> Option<ShapeRecord> {
        self.store.shape(id)
    }

    pub fn binding(&self, id: &BindingId) -> Option<BindingRecord> {
        self.store.binding(id)
    }

    /// Shapes of the current page, back to front. Cached until a shape or
    /// this editor's instance changes.
    pub fn current_page_shapes_sorted(&self) -> Arc<Vec<ShapeRecord>> {
        self.sorted_shapes.get(&self.store)
    }

    /// Bindings by endpoint. Cached until a binding changes.
    pub fn binding_index(&self) -> Arc<BindingIndex> {
        self.binding_index.get(&self.store)
    }

    pub fn bindings_from(&self, shape: &ShapeId) -> Vec<BindingRecord> {
        self.resolve_bindings(self.binding_index().from_shape(shape))
    }

    pub fn bindings_to(&self, shape: &ShapeId) -> Vec<BindingRecord> {
        self.resolve_bindings(self.binding_index().to_shape(shape))
    }

    pub fn bindings_involving(&self, shape: &ShapeId) -> Vec<BindingRecord> {
        self.resolve_bindings(&self.binding_index().involving(shape))
    }

    fn resolve_bindings(&self, ids: &[BindingId]) -> Vec<BindingRecord> {
        ids.iter().filter_map(|id| self.store.binding(id)).collect()
    }

    pub fn shape_page_bounds(&self, id: &ShapeId) -> Option<Rect> {
        let schema = self.store.schema();
        self.store.read(|view| {
            let shape = view.shape(id)?;
            schema.shape_page_bounds(view, shape)
        })
    }

    /// Union of the page bounds of the selected shapes.
    pub fn selection_page_bounds(&self) -> Option<Rect> {
        self.selected_shape_ids()
            .iter()
            .filter_map(|id| self.shape_page_bounds(id))
            .reduce(|a, b| a.union(b))
    }

    /// Union of the page bounds of the current page's top-level shapes.
    pub fn current_page_bounds(&self) -> Option<Rect> {
        self.current_page_shapes_sorted()
            .iter()
            .filter(|s| s.parent_id.is_none())
            .filter_map(|s| self.shape_page_bounds(&s.id))
            .reduce(|a, b| a.union(b))
    }

    /// The frontmost top-level shape of the current page under `point`
    /// (page space). Grouped shapes resolve to their group.
    pub fn shape_at_point(&self, point: Point) -> Option<ShapeId> {
        let shapes = self.current_page_shapes_sorted();
        let schema = self.store.schema();
        self.store.read(|view| {
            let ctx = ShapeContext::new(view, &schema);
            shapes
                .iter()
                .rev()
                .filter(|s| s.parent_id.is_none())
                .find(|s| {
                    schema
                        .shape_util(&s.shape_type)
                        .is_some_and(|util| util.hit_test(s, ctx, point))
                })
                .map(|s| s.id.clone())
        })
    }

    // --- camera ---

    /// Camera of the current page.
    pub fn camera(&self) -> Camera {
        self.current_page_id()
            .ok()
            .and_then(|page| self.store.camera(&CameraId::for_page(&page)))
            .map(|c| c.camera())
            .unwrap_or_default()
    }

    pub fn camera_state(&self) -> CameraState {
        self.controller.state()
    }

    pub fn screen_to_page(&self, point: Point) -> Point {
        self.controller.screen_to_page(&self.camera(), point)
    }

    pub fn page_to_screen(&self, point: Point) -> Point {
        self.controller.page_to_screen(&self.camera(), point)
    }

    pub fn viewport_page_bounds(&self) -> Rect {
        self.controller.viewport_page_bounds(&self.camera())
    }

    pub fn viewport_screen_bounds(&self) -> Rect {
        self.controller.viewport()
    }

    /// Resize the viewport and re-apply the camera constraints.
    pub fn set_viewport(&mut self, viewport: Rect) -> Result<bool> {
        self.controller.set_viewport(viewport);
        let current = self.camera();
        self.write_camera(current, false)
    }

    /// Move the camera to `target`, subject to the constraints. Returns
    /// whether the camera changed; always false when the camera is locked.
    pub fn set_camera(&mut self, target: Camera) -> Result<bool> {
        self.write_camera(target, false)
    }

    fn write_camera(&mut self, target: Camera, reset: bool) -> Result<bool> {
        if self.controller.is_locked() {
            return Ok(false);
        }
        let current = self.camera();
        let next = self.controller.constrain(&current, target, reset);
        if !CameraController::changed(&current, &next) {
            return Ok(false);
        }
        let page = self.current_page_id()?;
        self.run(TransactionConfig::ignore_history(), |tx| {
            let mut record = tx
                .get(&CameraId::for_page(&page).into())
                .and_then(Record::as_camera)
                .cloned()
                .unwrap_or_else(|| CameraRecord::for_page(&page));
            record.set_camera(next);
            tx.put_one(record).map(|_| ())
        })?;
        self.controller.mark_moving(Instant::now());
        Ok(true)
    }

    /// Pan by a screen-space offset.
    pub fn pan_by(&mut self, delta: Vec2) -> Result<bool> {
        let current = self.camera();
        self.set_camera(Camera::new(
            current.x + delta.x / current.z,
            current.y + delta.y / current.z,
            current.z,
        ))
    }

    /// Multiply the zoom by `factor`, keeping `point` (screen space) fixed.
    pub fn zoom_by(&mut self, factor: f64, point: Point) -> Result<bool> {
        if factor <= 0.0 {
            return Ok(false);
        }
        let current = self.camera();
        let anchor = self.viewport_relative(point);
        self.set_camera(zoom_about(&current, anchor, current.z * factor))
    }

    /// Zoom to the next step, about `point` (screen space) or the viewport
    /// center.
    pub fn zoom_in(&mut self, point: Option<Point>) -> Result<bool> {
        let anchor = self.anchor(point);
        match self.controller.zoom_in(&self.camera(), anchor) {
            Some(target) => self.set_camera(target),
            None => Ok(false),
        }
    }

    pub fn zoom_out(&mut self, point: Option<Point>) -> Result<bool> {
        let anchor = self.anchor(point);
        match self.controller.zoom_out(&self.camera(), anchor) {
            Some(target) => self.set_camera(target),
            None => Ok(false),
        }
    }

    /// Back to the initial zoom, about the viewport center.
    pub fn reset_zoom(&mut self) -> Result<bool> {
        let anchor = self.anchor(None);
        let target = zoom_about(&self.camera(), anchor, self.controller.initial_zoom());
        self.set_camera(target)
    }

    /// Back to the initial zoom and the constraint origin.
    pub fn reset_camera(&mut self) -> Result<bool> {
        let current = self.camera();
        self.write_camera(current, true)
    }

    /// Fit `bounds` (page space) in the viewport.
    pub fn zoom_to_bounds(&mut self, bounds: Rect) -> Result<bool> {
        let target = self.controller.zoom_to_bounds(bounds, FIT_PADDING);
        self.set_camera(target)
    }

    /// Fit the current page's content in the viewport.
    pub fn zoom_to_fit(&mut self) -> Result<bool> {
        match self.current_page_bounds() {
            Some(bounds) => self.zoom_to_bounds(bounds),
            None => Ok(false),
        }
    }

    pub fn zoom_to_selection(&mut self) -> Result<bool> {
        match self.selection_page_bounds() {
            Some(bounds) => self.zoom_to_bounds(bounds),
            None => Ok(false),
        }
    }

    fn viewport_relative(&self, point: Point) -> Point {
        (point - self.controller.viewport().origin()).to_point()
    }

    fn anchor(&self, point: Option<Point>) -> Point {
        match point {
            Some(point) => self.viewport_relative(point),
            None => {
                let size = self.controller.viewport().size();
                Point::new(size.width / 2.0, size.height / 2.0)
            }
        }
    }

    // --- events ---

    /// Fold `event` into the input state and describe it for the state
    /// chart.
    pub fn event_info(&mut self, event: &InputEvent, now: Instant) -> EventInfo {
        self.controller.tick(now);
        let screen_point = event.point().unwrap_or_else(|| self.input.pointer());
        let page_point = self.screen_to_page(screen_point);
        self.input.update(event, page_point, now);
        let target = if event.is_pointer() {
            self.shape_at_point(page_point)
                .map_or(EventTarget::Canvas, EventTarget::Shape)
        } else {
            EventTarget::Canvas
        };
        EventInfo {
            event: event.clone(),
            screen_point,
            page_point,
            origin_screen_point: self.input.origin(),
            origin_page_point: self.input.origin_page(),
            screen_delta: self.input.delta(),
            is_pointer_down: self.input.is_pointer_down(),
            is_dragging: self.input.is_dragging(),
            modifiers: self.input.modifiers_at(now),
            target,
            now,
        }
    }

    // --- persistence ---

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot::capture(&self.store)
    }

    /// Replace the document with `snapshot`. Clears this editor's history.
    pub fn load_snapshot(&mut self, snapshot: &StoreSnapshot) -> Result<()> {
        snapshot.restore(&self.store)?;
        self.history.clear();
        self.ensure_session()
    }
}

fn ensure_camera(tx: &mut Transaction<'_>, page: &PageId) -> Result<()> {
    let camera = CameraId::for_page(page);
    if tx.get(&camera.into()).is_none() {
        tx.create(CameraRecord::for_page(page))?;
    }
    Ok(())
}

/// An editor instance: core state plus the tool state chart.
pub struct Editor {
    core: EditorCore,
    chart: StateChart,
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("core", &self.core)
            .field("chart", &self.chart)
            .finish()
    }
}

impl Deref for Editor {
    type Target = EditorCore;

    fn deref(&self) -> &EditorCore {
        &self.core
    }
}

impl DerefMut for Editor {
    fn deref_mut(&mut self) -> &mut EditorCore {
        &mut self.core
    }
}

impl Editor {
    /// An editor on `store` with the default tools.
    pub fn new(store: RecordStore, options: EditorOptions, prefs: UserPreferences) -> Result<Self> {
        Self::with_chart(store, options, prefs, tools::default_chart()?)
    }

    /// An editor driven by a custom state chart.
    pub fn with_chart(
        store: RecordStore,
        options: EditorOptions,
        prefs: UserPreferences,
        mut chart: StateChart,
    ) -> Result<Self> {
        let mut core = EditorCore::new(store, options, prefs);
        core.ensure_session()?;
        chart.start(&mut core)?;
        log::debug!("editor {} ready", core.instance_id);
        Ok(Self { core, chart })
    }

    pub fn core(&self) -> &EditorCore {
        &self.core
    }

    pub fn into_core(self) -> EditorCore {
        self.core
    }

    pub fn chart(&self) -> &StateChart {
        &self.chart
    }

    /// Handle an input event now.
    pub fn dispatch(&mut self, event: InputEvent) -> Result<()> {
        self.dispatch_at(event, Instant::now())
    }

    /// Handle an input event at a given time.
    pub fn dispatch_at(&mut self, event: InputEvent, now: Instant) -> Result<()> {
        let info = self.core.event_info(&event, now);
        self.chart.dispatch(&mut self.core, &info)
    }

    /// Active state names, root first.
    pub fn active_path(&self) -> Vec<&str> {
        self.chart.active_path()
    }

    pub fn is_in(&self, path: &str) -> bool {
        self.chart.is_in(path)
    }

    pub fn is_in_any<'p>(&self, paths: impl IntoIterator<Item = &'p str>) -> bool {
        self.chart.is_in_any(paths)
    }

    /// Switch tools. Any gesture in progress is abandoned.
    pub fn set_tool(&mut self, tool: ToolKind) -> Result<()> {
        if let Some(kind) = tool.geo_kind() {
            self.core.set_next_geo(kind);
        }
        self.chart.transition_to(&mut self.core, tool.path())
    }

    pub fn current_tool(&self) -> Option<ToolKind> {
        let next_geo = self.core.next_geo();
        ToolKind::ALL.into_iter().find(|tool| {
            self.chart.is_in(tool.path()) && tool.geo_kind().is_none_or(|kind| kind == next_geo)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraBehavior, CameraConstraints, CameraOptions};
    use std::time::Duration;

    fn editor() -> Editor {
        Editor::new(RecordStore::default(), EditorOptions::default(), UserPreferences::default()).unwrap()
    }

    fn geo(editor: &Editor, key: &str, x: f64, y: f64) -> ShapeRecord {
        editor
            .new_shape("geo")
            .unwrap()
            .with_id(ShapeId::from_key(key))
            .at(x, y)
    }

    fn add(editor: &mut Editor, key: &str, x: f64, y: f64) -> Result<ShapeId> {
        let shape = geo(editor, key, x, y);
        editor.create_shape(shape)
    }

    #[test]
    fn test_new_editor_has_page_instance_and_camera() {
        let editor = editor();
        let page = editor.current_page_id().unwrap();
        assert_eq!(editor.pages().len(), 1);
        assert!(editor.store().camera(&CameraId::for_page(&page)).is_some());
        assert_eq!(editor.active_path(), vec!["root", "select", "idle"]);
        assert!(!editor.can_undo());
    }

    #[test]
    fn test_create_shapes_stacks_in_front() {
        let mut editor = editor();
        let a = geo(&editor, "a", 0.0, 0.0);
        let b = geo(&editor, "b", 10.0, 0.0);
        editor.create_shapes(vec![a, b]).unwrap();
        let sorted = editor.current_page_shapes_sorted();
        let keys: Vec<&str> = sorted.iter().map(|s| s.id.key()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert!(sorted[0].index < sorted[1].index);
    }

    #[test]
    fn test_sorted_shapes_are_cached() {
        let mut editor = editor();
        add(&mut editor, "a", 0.0, 0.0).unwrap();
        let first = editor.current_page_shapes_sorted();
        assert!(Arc::ptr_eq(&first, &editor.current_page_shapes_sorted()));
        editor.pan_by(Vec2::new(10.0, 0.0)).unwrap();
        assert!(Arc::ptr_eq(&first, &editor.current_page_shapes_sorted()));
        editor.update_shape(&ShapeId::from_key("a"), |s| s.x = 5.0).unwrap();
        assert!(!Arc::ptr_eq(&first, &editor.current_page_shapes_sorted()));
    }

    #[test]
    fn test_read_only_rejects_document_changes() {
        let mut editor = editor();
        add(&mut editor, "a", 0.0, 0.0).unwrap();
        editor.set_read_only(true).unwrap();
        assert_eq!(
            add(&mut editor, "b", 0.0, 0.0),
            Err(EditorError::ReadOnly)
        );
        assert!(editor.shape(&ShapeId::from_key("b")).is_none());
        // Session changes still go through.
        editor.select(&[ShapeId::from_key("a")]).unwrap();
        assert!(!editor.undo().unwrap());
        assert_eq!(editor.shape(&ShapeId::from_key("a")).map(|s| s.x), Some(0.0));
    }

    #[test]
    fn test_pages() {
        let mut editor = editor();
        let first = editor.current_page_id().unwrap();
        assert_eq!(editor.delete_page(&first), Err(EditorError::LastPage));

        let second = editor.create_page("Page 2").unwrap();
        editor.set_current_page(&second).unwrap();
        assert_eq!(editor.current_page_id().unwrap(), second);
        assert!(editor.store().camera(&CameraId::for_page(&second)).is_some());

        add(&mut editor, "a", 0.0, 0.0).unwrap();
        editor.delete_page(&second).unwrap();
        assert_eq!(editor.current_page_id().unwrap(), first);
        assert!(editor.shape(&ShapeId::from_key("a")).is_none());
    }

    #[test]
    fn test_toggle_lock() {
        let mut editor = editor();
        add(&mut editor, "a", 0.0, 0.0).unwrap();
        let ids = [ShapeId::from_key("a")];
        editor.toggle_lock(&ids).unwrap();
        assert!(editor.shape(&ids[0]).unwrap().is_locked);
        editor.update_shape(&ids[0], |s| s.x = 50.0).unwrap();
        assert_eq!(editor.shape(&ids[0]).unwrap().x, 0.0);
        editor.toggle_lock(&ids).unwrap();
        assert!(!editor.shape(&ids[0]).unwrap().is_locked);
    }

    #[test]
    fn test_set_color_recolors_selection() {
        let mut editor = editor();
        add(&mut editor, "a", 0.0, 0.0).unwrap();
        add(&mut editor, "b", 200.0, 0.0).unwrap();
        add(&mut editor, "c", 400.0, 0.0).unwrap();
        assert_eq!(editor.selection_color(), None);

        editor.select(&[ShapeId::from_key("a"), ShapeId::from_key("b")]).unwrap();
        assert_eq!(
            editor.selection_color().map(SerializableColor::from),
            Some(SerializableColor::black())
        );

        let red = Color::from_rgba8(255, 0, 0, 255);
        editor.mark_history_stopping_point();
        editor.set_color(red).unwrap();
        assert_eq!(editor.shape(&ShapeId::from_key("a")).unwrap().prop_str("color"), Some("#ff0000"));
        assert_eq!(editor.shape(&ShapeId::from_key("c")).unwrap().prop_str("color"), Some("#000000"));
        assert_eq!(editor.selection_color().map(SerializableColor::from), Some(SerializableColor::from(red)));
        assert_eq!(editor.preferences().get().color, SerializableColor::new(255, 0, 0, 255));

        editor.select(&[ShapeId::from_key("a"), ShapeId::from_key("c")]).unwrap();
        assert_eq!(editor.selection_color(), None);

        editor.undo().unwrap();
        assert_eq!(editor.shape(&ShapeId::from_key("a")).unwrap().prop_str("color"), Some("#000000"));
    }

    #[test]
    fn test_select_requires_shapes_on_current_page() {
        let mut editor = editor();
        add(&mut editor, "a", 0.0, 0.0).unwrap();
        assert!(matches!(
            editor.select(&[ShapeId::from_key("missing")]),
            Err(EditorError::NotFound(_))
        ));
        editor.select(&[ShapeId::from_key("a"), ShapeId::from_key("a")]).unwrap();
        assert_eq!(editor.selected_shape_ids(), vec![ShapeId::from_key("a")]);
        editor.select_none().unwrap();
        assert!(editor.selected_shape_ids().is_empty());
    }

    #[test]
    fn test_shape_at_point_prefers_front() {
        let mut editor = editor();
        add(&mut editor, "back", 0.0, 0.0).unwrap();
        add(&mut editor, "front", 50.0, 50.0).unwrap();
        assert_eq!(editor.shape_at_point(Point::new(75.0, 75.0)), Some(ShapeId::from_key("front")));
        assert_eq!(editor.shape_at_point(Point::new(25.0, 25.0)), Some(ShapeId::from_key("back")));
        assert_eq!(editor.shape_at_point(Point::new(500.0, 500.0)), None);
        assert_eq!(
            editor.current_page_bounds(),
            Some(Rect::new(0.0, 0.0, 150.0, 150.0))
        );
    }

    #[test]
    fn test_camera_changes_are_not_undoable() {
        let mut editor = editor();
        assert!(editor.pan_by(Vec2::new(100.0, 50.0)).unwrap());
        assert_eq!(editor.camera(), Camera::new(100.0, 50.0, 1.0));
        assert!(!editor.can_undo());
        assert_eq!(editor.screen_to_page(Point::new(100.0, 50.0)), Point::ZERO);
    }

    #[test]
    fn test_locked_camera_does_not_move() {
        let options = EditorOptions {
            camera: CameraOptions {
                is_locked: true,
                ..CameraOptions::default()
            },
            ..EditorOptions::default()
        };
        let mut editor = Editor::new(RecordStore::default(), options, UserPreferences::default()).unwrap();
        assert!(!editor.pan_by(Vec2::new(10.0, 0.0)).unwrap());
        assert!(!editor.zoom_in(None).unwrap());
        assert_eq!(editor.camera(), Camera::default());
    }

    #[test]
    fn test_zoom_steps_about_center() {
        let mut editor = editor();
        editor.set_viewport(Rect::new(0.0, 0.0, 800.0, 600.0)).unwrap();
        assert!(editor.zoom_in(None).unwrap());
        assert_eq!(editor.camera().z, 2.0);
        // The viewport center stays on the same page point.
        assert_eq!(editor.screen_to_page(Point::new(400.0, 300.0)), Point::new(400.0, 300.0));
        assert!(editor.zoom_out(None).unwrap());
        assert!(editor.zoom_out(None).unwrap());
        assert_eq!(editor.camera().z, 0.5);
        editor.reset_zoom().unwrap();
        assert_eq!(editor.camera().z, 1.0);
    }

    #[test]
    fn test_viewport_resize_reapplies_constraints() {
        let options = EditorOptions {
            viewport: Rect::new(0.0, 0.0, 800.0, 600.0),
            camera: CameraOptions {
                constraints: Some(CameraConstraints::new(
                    Rect::new(0.0, 0.0, 1000.0, 1000.0),
                    CameraBehavior::Inside,
                )),
                ..CameraOptions::default()
            },
            ..EditorOptions::default()
        };
        let mut editor = Editor::new(RecordStore::default(), options, UserPreferences::default()).unwrap();
        editor.set_camera(Camera::new(-200.0, -400.0, 1.0)).unwrap();
        editor.set_viewport(Rect::new(0.0, 0.0, 900.0, 700.0)).unwrap();
        assert_eq!(editor.camera(), Camera::new(-100.0, -300.0, 1.0));
    }

    #[test]
    fn test_camera_settles_on_tick() {
        let mut editor = editor();
        editor.pan_by(Vec2::new(5.0, 0.0)).unwrap();
        assert!(matches!(editor.camera_state(), CameraState::Moving { .. }));
        editor
            .dispatch_at(InputEvent::Tick, Instant::now() + Duration::from_secs(1))
            .unwrap();
        assert_eq!(editor.camera_state(), CameraState::Idle);
    }

    #[test]
    fn test_snapshot_reload_restores_session() {
        let mut editor = editor();
        add(&mut editor, "a", 10.0, 10.0).unwrap();
        let snapshot = editor.snapshot();
        editor.delete_shapes(&[ShapeId::from_key("a")]).unwrap();
        editor.load_snapshot(&snapshot).unwrap();
        assert!(editor.shape(&ShapeId::from_key("a")).is_some());
        assert!(editor.instance().is_ok());
        assert!(!editor.can_undo());
        let page = editor.current_page_id().unwrap();
        assert!(editor.store().camera(&CameraId::for_page(&page)).is_some());
    }
}
