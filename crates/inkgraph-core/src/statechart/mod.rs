//! Hierarchical state chart driving tool interactions.
//!
//! The chart is an arena of plain nodes. Behavior lives in a table keyed by
//! each node's `kind`, so the same behavior can back several nodes and the
//! tree itself stays cloneable data.

mod scratch;

pub use scratch::Scratch;

use crate::editor::EditorCore;
use crate::error::{EditorError, Result};
use crate::input::EventInfo;
use std::collections::HashMap;
use std::sync::Arc;

/// Declarative description of a state and its children.
#[derive(Debug, Clone, PartialEq)]
pub struct StateDef {
    pub name: String,
    pub kind: String,
    pub initial: Option<String>,
    pub children: Vec<StateDef>,
}

impl StateDef {
    /// A state without children.
    pub fn leaf(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            initial: None,
            children: Vec::new(),
        }
    }

    /// A state with children, entering `initial` whenever it is entered.
    pub fn branch(
        name: impl Into<String>,
        kind: impl Into<String>,
        initial: impl Into<String>,
        children: Vec<StateDef>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            initial: Some(initial.into()),
            children,
        }
    }
}

/// Where a transition goes, relative to the node that requested it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Child(String),
    Sibling(String),
    /// A dotted path starting at the root, e.g. `root.select.idle`.
    Absolute(String),
}

impl Target {
    pub fn child(name: impl Into<String>) -> Self {
        Target::Child(name.into())
    }

    pub fn sibling(name: impl Into<String>) -> Self {
        Target::Sibling(name.into())
    }

    pub fn absolute(path: impl Into<String>) -> Self {
        Target::Absolute(path.into())
    }
}

/// What a node did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Pass the event on to the active child.
    Continue,
    /// Stop propagation.
    Halt,
    /// Stop propagation and move to another state.
    Transition(Target),
}

/// What a handler gets to work with: the editor and the node's own scratch
/// data.
pub struct StateContext<'a> {
    pub editor: &'a mut EditorCore,
    pub data: &'a mut Scratch,
}

/// Callbacks of one kind of state. All default to doing nothing.
#[allow(unused_variables)]
pub trait StateBehavior: Send + Sync {
    fn on_enter(&self, ctx: &mut StateContext<'_>, info: Option<&EventInfo>) -> Result<()> {
        Ok(())
    }

    fn on_exit(&self, ctx: &mut StateContext<'_>, info: Option<&EventInfo>) -> Result<()> {
        Ok(())
    }

    fn on_event(&self, ctx: &mut StateContext<'_>, info: &EventInfo) -> Result<EventOutcome> {
        Ok(EventOutcome::Continue)
    }
}

/// Behavior for states that only group children.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl StateBehavior for Passthrough {}

#[derive(Debug)]
struct StateNode {
    name: String,
    kind: String,
    parent: Option<usize>,
    children: Vec<usize>,
    initial: Option<usize>,
    active: Option<usize>,
    data: Scratch,
}

const ROOT: usize = 0;

/// A running state chart.
pub struct StateChart {
    nodes: Vec<StateNode>,
    behaviors: HashMap<String, Arc<dyn StateBehavior>>,
    started: bool,
}

impl std::fmt::Debug for StateChart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateChart")
            .field("active_path", &self.active_path())
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

impl StateChart {
    /// Build the arena from a definition tree.
    pub fn new(root: StateDef) -> Result<Self> {
        let mut chart = Self {
            nodes: Vec::new(),
            behaviors: HashMap::new(),
            started: false,
        };
        chart.insert(root, None)?;
        Ok(chart)
    }

    fn insert(&mut self, def: StateDef, parent: Option<usize>) -> Result<usize> {
        if def.name.is_empty() || def.name.contains('.') {
            return Err(EditorError::InvalidChart(format!("bad state name `{}`", def.name)));
        }
        let index = self.nodes.len();
        self.nodes.push(StateNode {
            name: def.name.clone(),
            kind: def.kind,
            parent,
            children: Vec::new(),
            initial: None,
            active: None,
            data: Scratch::default(),
        });
        let mut children = Vec::with_capacity(def.children.len());
        for child in def.children {
            if children.iter().any(|&c: &usize| self.nodes[c].name == child.name) {
                return Err(EditorError::InvalidChart(format!(
                    "duplicate state `{}` under `{}`",
                    child.name, def.name
                )));
            }
            children.push(self.insert(child, Some(index))?);
        }
        let initial = match def.initial {
            Some(name) => Some(
                children
                    .iter()
                    .copied()
                    .find(|&c| self.nodes[c].name == name)
                    .ok_or_else(|| {
                        EditorError::InvalidChart(format!("initial state `{name}` is not a child of `{}`", def.name))
                    })?,
            ),
            None if !children.is_empty() => {
                return Err(EditorError::InvalidChart(format!("`{}` has no initial state", def.name)));
            }
            None => None,
        };
        self.nodes[index].children = children;
        self.nodes[index].initial = initial;
        Ok(index)
    }

    /// Attach the behavior for every node of `kind`.
    pub fn with_behavior(mut self, kind: impl Into<String>, behavior: impl StateBehavior + 'static) -> Self {
        self.behaviors.insert(kind.into(), Arc::new(behavior));
        self
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Enter the root and its initial descendants.
    pub fn start(&mut self, editor: &mut EditorCore) -> Result<()> {
        if self.started {
            return Ok(());
        }
        if let Some(node) = self.nodes.iter().find(|n| !self.behaviors.contains_key(&n.kind)) {
            return Err(EditorError::MissingBehavior(node.kind.clone()));
        }
        let entered = self
            .enter(editor, ROOT, None)
            .and_then(|_| self.enter_initial(editor, ROOT, None));
        let leaf = match entered {
            Ok(leaf) => leaf,
            Err(err) => {
                for node in &mut self.nodes {
                    node.active = None;
                    node.data.clear();
                }
                return Err(err);
            }
        };
        self.started = true;
        log::debug!("state chart started in {}", self.path_of(leaf));
        Ok(())
    }

    /// Names along the active path, root first.
    pub fn active_path(&self) -> Vec<&str> {
        let mut path = Vec::new();
        if !self.started {
            return path;
        }
        let mut node = Some(ROOT);
        while let Some(index) = node {
            path.push(self.nodes[index].name.as_str());
            node = self.nodes[index].active;
        }
        path
    }

    /// The active path joined with dots.
    pub fn current_path(&self) -> String {
        self.active_path().join(".")
    }

    /// Whether `path` is a segment prefix of the active path.
    pub fn is_in(&self, path: &str) -> bool {
        let active = self.active_path();
        let segments: Vec<&str> = path.split('.').collect();
        segments.len() <= active.len() && active.iter().zip(&segments).all(|(a, b)| a == b)
    }

    pub fn is_in_any<'p>(&self, paths: impl IntoIterator<Item = &'p str>) -> bool {
        paths.into_iter().any(|p| self.is_in(p))
    }

    /// Send an event down the active path.
    ///
    /// If a handler fails, the active path is restored to what it was before
    /// the event; changes already committed to the store stay committed.
    pub fn dispatch(&mut self, editor: &mut EditorCore, info: &EventInfo) -> Result<()> {
        if !self.started {
            return Ok(());
        }
        let saved = self.snapshot();
        let mut stash = Vec::new();
        if let Err(err) = self.propagate(editor, info, &mut stash) {
            self.restore(saved, stash);
            log::error!("state chart handler failed in {}: {err}", self.current_path());
            return Err(err);
        }
        Ok(())
    }

    fn snapshot(&self) -> Vec<(Option<usize>, bool)> {
        (0..self.nodes.len())
            .map(|i| (self.nodes[i].active, self.is_active(i)))
            .collect()
    }

    fn restore(&mut self, saved: Vec<(Option<usize>, bool)>, stash: Vec<(usize, Scratch)>) {
        for (node, (active, was_active)) in self.nodes.iter_mut().zip(saved) {
            node.active = active;
            if !was_active {
                node.data.clear();
            }
        }
        for (index, data) in stash {
            self.nodes[index].data = data;
        }
    }

    fn propagate(&mut self, editor: &mut EditorCore, info: &EventInfo, stash: &mut Vec<(usize, Scratch)>) -> Result<()> {
        let mut node = Some(ROOT);
        while let Some(index) = node {
            let behavior = self.behavior(index)?;
            let outcome = {
                let mut ctx = StateContext {
                    editor: &mut *editor,
                    data: &mut self.nodes[index].data,
                };
                behavior.on_event(&mut ctx, info)?
            };
            match outcome {
                EventOutcome::Continue => node = self.nodes[index].active,
                EventOutcome::Halt => return Ok(()),
                EventOutcome::Transition(target) => {
                    let target = self.resolve(index, &target)?;
                    return self.transition(editor, target, Some(info), stash);
                }
            }
        }
        Ok(())
    }

    /// Move to the state at an absolute dotted path, outside of any event.
    pub fn transition_to(&mut self, editor: &mut EditorCore, path: &str) -> Result<()> {
        let target = self.resolve(ROOT, &Target::Absolute(path.to_string()))?;
        let saved = self.snapshot();
        let mut stash = Vec::new();
        if let Err(err) = self.transition(editor, target, None, &mut stash) {
            self.restore(saved, stash);
            return Err(err);
        }
        Ok(())
    }

    fn behavior(&self, index: usize) -> Result<Arc<dyn StateBehavior>> {
        let kind = &self.nodes[index].kind;
        self.behaviors
            .get(kind)
            .cloned()
            .ok_or_else(|| EditorError::MissingBehavior(kind.clone()))
    }

    fn resolve(&self, from: usize, target: &Target) -> Result<usize> {
        let child_named = |parent: usize, name: &str| {
            self.nodes[parent]
                .children
                .iter()
                .copied()
                .find(|&c| self.nodes[c].name == name)
        };
        let found = match target {
            Target::Child(name) => child_named(from, name),
            Target::Sibling(name) => self.nodes[from].parent.and_then(|p| child_named(p, name)),
            Target::Absolute(path) => {
                let mut segments = path.split('.');
                if segments.next() != Some(self.nodes[ROOT].name.as_str()) {
                    None
                } else {
                    segments.try_fold(ROOT, |node, name| child_named(node, name))
                }
            }
        };
        found.ok_or_else(|| {
            let name = match target {
                Target::Child(n) | Target::Sibling(n) | Target::Absolute(n) => n.clone(),
            };
            EditorError::UnknownState(name)
        })
    }

    fn ancestors(&self, index: usize) -> Vec<usize> {
        let mut chain = Vec::new();
        let mut node = self.nodes[index].parent;
        while let Some(parent) = node {
            chain.push(parent);
            node = self.nodes[parent].parent;
        }
        chain
    }

    fn is_active(&self, index: usize) -> bool {
        match self.nodes[index].parent {
            None => true,
            Some(parent) => self.nodes[parent].active == Some(index) && self.is_active(parent),
        }
    }

    fn transition(
        &mut self,
        editor: &mut EditorCore,
        target: usize,
        info: Option<&EventInfo>,
        stash: &mut Vec<(usize, Scratch)>,
    ) -> Result<()> {
        let ancestors = self.ancestors(target);
        // Deepest proper ancestor of the target that is currently active.
        // The root is never left; targeting it resets its initial path.
        let pivot = if target == ROOT {
            ROOT
        } else {
            match ancestors.iter().find(|&&a| self.is_active(a)) {
                Some(&pivot) => pivot,
                None => return Err(EditorError::UnknownState(self.path_of(target))),
            }
        };

        let mut leaving = Vec::new();
        let mut node = self.nodes[pivot].active;
        while let Some(index) = node {
            leaving.push(index);
            node = self.nodes[index].active;
        }
        for &index in leaving.iter().rev() {
            let behavior = self.behavior(index)?;
            behavior.on_exit(
                &mut StateContext {
                    editor: &mut *editor,
                    data: &mut self.nodes[index].data,
                },
                info,
            )?;
            self.nodes[index].active = None;
            stash.push((index, std::mem::take(&mut self.nodes[index].data)));
        }
        self.nodes[pivot].active = None;

        let mut entering: Vec<usize> = ancestors.iter().copied().take_while(|&a| a != pivot).collect();
        entering.reverse();
        if target != ROOT {
            entering.push(target);
        }
        let mut parent = pivot;
        for index in entering {
            self.nodes[parent].active = Some(index);
            self.enter(editor, index, info)?;
            parent = index;
        }
        let leaf = self.enter_initial(editor, target, info)?;

        log::debug!("state chart: {} -> {}", self.path_of(*leaving.last().unwrap_or(&pivot)), self.path_of(leaf));
        Ok(())
    }

    fn enter(&mut self, editor: &mut EditorCore, index: usize, info: Option<&EventInfo>) -> Result<()> {
        let behavior = self.behavior(index)?;
        behavior.on_enter(
            &mut StateContext {
                editor,
                data: &mut self.nodes[index].data,
            },
            info,
        )
    }

    fn enter_initial(&mut self, editor: &mut EditorCore, from: usize, info: Option<&EventInfo>) -> Result<usize> {
        let mut node = from;
        while let Some(initial) = self.nodes[node].initial {
            self.nodes[node].active = Some(initial);
            self.enter(editor, initial, info)?;
            node = initial;
        }
        Ok(node)
    }

    fn path_of(&self, index: usize) -> String {
        let mut names: Vec<&str> = self.ancestors(index).iter().map(|&a| self.nodes[a].name.as_str()).collect();
        names.reverse();
        names.push(&self.nodes[index].name);
        names.join(".")
    }
}
