//! InkGraph Core Library
//!
//! Platform-agnostic editor core for an infinite canvas: a transactional
//! record store with side effects, undo/redo history, bindings between
//! shapes, a hierarchical tool state chart and a constrained camera.

pub mod bindings;
pub mod camera;
pub mod editor;
pub mod error;
pub mod history;
pub mod input;
pub mod options;
pub mod preferences;
pub mod records;
pub mod schema;
pub mod shapes;
pub mod snap;
pub mod snapshot;
pub mod statechart;
pub mod store;
pub mod tools;

pub use bindings::{ArrowBindingUtil, ArrowTerminal, BindingIndex, BindingUtil, DeleteCleanup};
pub use camera::{Camera, CameraBehavior, CameraConstraints, CameraController, CameraOptions, CameraState, ZoomFit};
pub use editor::{Editor, EditorCore};
pub use error::{EditorError, ErrorCategory, Result};
pub use history::{HistoryManager, MarkId};
pub use input::{EventInfo, EventTarget, InputEvent, InputState, Modifiers, MouseButton};
pub use options::EditorOptions;
pub use preferences::{Preferences, UserPreferences};
pub use records::{
    BindingId, BindingRecord, CameraId, CameraRecord, InstanceId, InstanceRecord, PageId, PageRecord, Record,
    RecordId, RecordScope, ShapeId, ShapeRecord, TypeName,
};
pub use schema::Schema;
pub use shapes::{GeoKind, SerializableColor, ShapeUtil};
pub use snap::{snap_to_grid, SnapResult, GRID_SIZE};
pub use snapshot::{StoreSnapshot, SNAPSHOT_VERSION};
pub use statechart::{EventOutcome, Passthrough, StateBehavior, StateChart, StateContext, StateDef, Target};
pub use store::{
    ChangeSource, Computed, Decision, HistoryMode, RecordStore, RecordsDiff, SideEffects, StoreOptions, Transaction,
    TransactionConfig,
};
pub use tools::ToolKind;
