//! End-to-end behavior of the editor core: history, bindings, tools,
//! camera constraints and side effects working together.

use inkgraph_core::camera::{CameraBehavior, CameraConstraints, CameraOptions};
use inkgraph_core::shapes::ArrowShapeUtil;
use inkgraph_core::{
    ArrowBindingUtil, ArrowTerminal, BindingRecord, Decision, Editor, EditorOptions, InputEvent, Record, RecordStore,
    ShapeId, ShapeRecord, StoreSnapshot, TransactionConfig, TypeName, UserPreferences,
};
use kurbo::{Point, Rect, Vec2};
use serde_json::json;
use std::sync::{Arc, Mutex};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn editor_with(store: RecordStore, options: EditorOptions) -> Editor {
    init_logging();
    Editor::new(store, options, UserPreferences::default()).unwrap()
}

fn editor() -> Editor {
    editor_with(
        RecordStore::default(),
        EditorOptions {
            viewport: Rect::new(0.0, 0.0, 800.0, 600.0),
            ..EditorOptions::default()
        },
    )
}

fn geo(editor: &Editor, key: &str, x: f64, y: f64) -> ShapeRecord {
    editor
        .new_shape("geo")
        .unwrap()
        .with_id(ShapeId::from_key(key))
        .at(x, y)
        .with_props(json!({ "w": 100.0, "h": 100.0 }))
}

fn add(editor: &mut Editor, key: &str, x: f64, y: f64) -> inkgraph_core::Result<ShapeId> {
    let shape = geo(editor, key, x, y);
    editor.create_shape(shape)
}

#[test]
fn test_undo_all_then_redo_all_restores_each_state() {
    let mut editor = editor();
    let initial = editor.snapshot();

    let a = add(&mut editor, "a", 0.0, 0.0).unwrap();
    editor.mark_history_stopping_point();
    let b = add(&mut editor, "b", 200.0, 0.0).unwrap();
    editor.mark_history_stopping_point();
    editor.update_shape(&a, |s| s.x = 50.0).unwrap();
    editor.update_shapes(&[a.clone(), b.clone()], |s| s.y += 10.0).unwrap();
    editor.mark_history_stopping_point();
    editor.delete_shapes(std::slice::from_ref(&b)).unwrap();
    let last = editor.snapshot();

    while editor.can_undo() {
        editor.undo().unwrap();
    }
    assert_eq!(editor.snapshot(), initial);

    while editor.can_redo() {
        editor.redo().unwrap();
    }
    assert_eq!(editor.snapshot(), last);
    assert_eq!(editor.shape(&a).unwrap().y, 10.0);
    assert!(editor.shape(&b).is_none());
}

#[test]
fn test_deleting_bound_shape_removes_binding_and_undo_restores_it() {
    let mut editor = editor();
    let arrow = editor.new_shape("arrow").unwrap().with_id(ShapeId::from_key("arrow"));
    let arrow_id = editor.create_shape(arrow).unwrap();
    let target_id = add(&mut editor, "target", 300.0, 0.0).unwrap();
    let binding = BindingRecord::new("arrow", arrow_id.clone(), target_id.clone())
        .with_props(ArrowBindingUtil::props(ArrowTerminal::End, Point::new(0.5, 0.5)));
    let binding_id = editor.create_binding(binding).unwrap();

    let end = ArrowShapeUtil::page_terminal(&editor.shape(&arrow_id).unwrap(), "end");
    assert_eq!(end, Point::new(350.0, 50.0));
    assert_eq!(editor.bindings_to(&target_id).len(), 1);

    editor.mark_history_stopping_point();
    editor.delete_shapes(std::slice::from_ref(&target_id)).unwrap();
    assert!(editor.binding(&binding_id).is_none());
    assert!(editor.bindings_involving(&arrow_id).is_empty());
    // The arrow stays where it was pointing.
    let arrow = editor.shape(&arrow_id).unwrap();
    assert_eq!(ArrowShapeUtil::page_terminal(&arrow, "end"), Point::new(350.0, 50.0));

    editor.undo().unwrap();
    assert!(editor.shape(&target_id).is_some());
    assert!(editor.binding(&binding_id).is_some());
    assert_eq!(editor.bindings_from(&arrow_id).len(), 1);
}

#[test]
fn test_bail_to_mark_leaves_nothing_to_redo() {
    let mut editor = editor();
    let id = add(&mut editor, "a", 0.0, 0.0).unwrap();
    let mark = editor.mark_history_stopping_point();
    editor.update_shape(&id, |s| s.x = 100.0).unwrap();
    editor.update_shape(&id, |s| s.x = 200.0).unwrap();

    assert!(editor.bail_to_mark(mark).unwrap());
    assert_eq!(editor.shape(&id).unwrap().x, 0.0);
    assert!(!editor.can_redo());
    assert!(!editor.redo().unwrap());
    assert_eq!(editor.shape(&id).unwrap().x, 0.0);
}

#[test]
fn test_pointer_down_on_shape_enters_pointing_shape() {
    let mut editor = editor();
    let id = add(&mut editor, "a", 100.0, 100.0).unwrap();
    assert_eq!(editor.active_path(), vec!["root", "select", "idle"]);

    editor.dispatch(InputEvent::pointer_down(150.0, 150.0)).unwrap();
    assert_eq!(editor.active_path(), vec!["root", "select", "pointing_shape"]);
    assert_eq!(editor.selected_shape_ids(), vec![id]);

    editor.dispatch(InputEvent::Cancel).unwrap();
    assert!(editor.is_in("root.select.idle"));
}

#[test]
fn test_inside_constraint_keeps_viewport_within_bounds() {
    let bounds = Rect::new(0.0, 0.0, 1000.0, 1000.0);
    let options = EditorOptions {
        viewport: Rect::new(0.0, 0.0, 800.0, 600.0),
        camera: CameraOptions {
            constraints: Some(CameraConstraints::new(bounds, CameraBehavior::Inside)),
            ..CameraOptions::default()
        },
        ..EditorOptions::default()
    };
    let mut editor = editor_with(RecordStore::default(), options);

    let moves = [
        Vec2::new(5000.0, 0.0),
        Vec2::new(0.0, 5000.0),
        Vec2::new(-9000.0, -9000.0),
        Vec2::new(120.0, -40.0),
    ];
    for delta in moves {
        editor.pan_by(delta).unwrap();
        let view = editor.viewport_page_bounds();
        assert!(view.x0 >= bounds.x0 - 1e-9 && view.y0 >= bounds.y0 - 1e-9, "{view:?}");
        assert!(view.x1 <= bounds.x1 + 1e-9 && view.y1 <= bounds.y1 + 1e-9, "{view:?}");
    }

    editor.zoom_in(Some(Point::new(10.0, 10.0))).unwrap();
    editor.pan_by(Vec2::new(-9000.0, -9000.0)).unwrap();
    let view = editor.viewport_page_bounds();
    assert!(view.x1 <= bounds.x1 + 1e-9 && view.y1 <= bounds.y1 + 1e-9, "{view:?}");
}

#[test]
fn test_nested_transactions_notify_once_with_one_diff() {
    let mut editor = editor();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    editor.store().listen(move |change| {
        sink.lock().unwrap().push(change.diff.len());
    });

    let page = editor.current_page_id().unwrap();
    editor
        .run(TransactionConfig::default(), |tx| {
            tx.create(ShapeRecord::new("geo", page.clone()).with_id(ShapeId::from_key("outer")))?;
            tx.run(TransactionConfig::default(), |tx| {
                tx.create(ShapeRecord::new("geo", page.clone()).with_id(ShapeId::from_key("inner")))?;
                tx.update_shape(&ShapeId::from_key("outer"), |s| s.x = 5.0)?;
                Ok(())
            })
        })
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![2]);
    // One undo entry covers both levels.
    editor.undo().unwrap();
    assert!(editor.current_page_shapes_sorted().is_empty());
}

#[test]
fn test_veto_of_one_kind_keeps_sibling_creations() {
    let store = RecordStore::default();
    store.register_before_create(TypeName::Shape, |_, record, _| {
        if matches!(&record, Record::Shape(shape) if shape.shape_type == "arrow") {
            return Ok(Decision::Reject);
        }
        Ok(Decision::Proceed(record))
    });
    let mut editor = editor_with(store, EditorOptions::default());

    let page = editor.current_page_id().unwrap();
    let created = editor
        .create_shapes(vec![
            ShapeRecord::new("geo", page.clone()).with_id(ShapeId::from_key("first")),
            ShapeRecord::new("arrow", page.clone()).with_id(ShapeId::from_key("vetoed")),
            ShapeRecord::new("geo", page).with_id(ShapeId::from_key("second")),
        ])
        .unwrap();

    assert_eq!(created, vec![ShapeId::from_key("first"), ShapeId::from_key("second")]);
    assert!(editor.shape(&ShapeId::from_key("vetoed")).is_none());
    assert_eq!(editor.current_page_shapes_sorted().len(), 2);
}

#[test]
fn test_two_editors_share_one_store() {
    let store = RecordStore::default();
    let mut first = editor_with(store.clone(), EditorOptions::default());
    let second = editor_with(store, EditorOptions::default());
    assert_ne!(first.instance_id(), second.instance_id());

    let id = add(&mut first, "shared", 0.0, 0.0).unwrap();
    assert!(second.shape(&id).is_some());
    // History is per editor.
    assert!(first.can_undo());
    assert!(!second.can_undo());

    let json = first.snapshot().to_json().unwrap();
    assert_eq!(StoreSnapshot::from_json(&json).unwrap(), second.snapshot());
}
