//! Runtime
//!
//! The runtime is the central coordinator. It owns the instance tree, the
//! per-instance hook storage, the context provisions, and the update
//! scheduler, and it drives evaluation.
//!
//! # How It Works
//!
//! 1. The host mounts a component. The new instance starts dirty and is
//!    queued.
//!
//! 2. A setter call (or a context change) marks instances dirty. When the
//!    queue goes from empty to non-empty, `on_dirty` listeners are told so
//!    the host can schedule a flush.
//!
//! 3. `flush` runs passes. Each pass evaluates every queued instance once,
//!    shallowest first, then runs lifecycle callbacks and effects in
//!    evaluation order. Work queued by those (or by an instance marking
//!    itself while evaluating) lands in the next pass.
//!
//! # Locking
//!
//! All runtime state sits behind one `parking_lot::Mutex`. User code
//! (render functions, effects, lifecycle callbacks, dirty listeners) never
//! runs while it is held: hook storage is taken out of the instance record
//! for the duration of a render and put back afterwards.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use super::context::{Channel, ChannelId, ErasedValue};
use super::effect::{Cleanup, PendingEffect};
use super::hooks::HookList;
use super::lifecycle::{Lifecycle, LifecycleCallback, LifecyclePhase};
use super::render::{Component, RenderCx, RenderParts};
use super::state::DirtySink;
use super::subscriber::{DirtyListeners, ListenerId};
use crate::config::RuntimeConfig;
use crate::error::{CoreError, Result};
use crate::graph::{Children, DirtyState, InstanceId, InstanceTree, MarkOutcome, UpdateScheduler};
use crate::output::Output;

/// Everything the runtime keeps per mounted instance.
struct InstanceRecord {
    component: Arc<dyn Component>,
    /// Key under the parent, for instances declared with `RenderCx::child`.
    key: Option<String>,
    hooks: HookList,
    lifecycle: Lifecycle,
    provisions: HashMap<ChannelId, Arc<ErasedValue>>,
    /// Channels read during the last evaluation.
    reads: SmallVec<[ChannelId; 2]>,
    keyed: IndexMap<String, InstanceId>,
    output: Option<Output>,
    evaluations: usize,
}

impl InstanceRecord {
    fn new(component: Arc<dyn Component>, key: Option<String>) -> Self {
        Self {
            component,
            key,
            hooks: HookList::default(),
            lifecycle: Lifecycle::new(),
            provisions: HashMap::new(),
            reads: SmallVec::new(),
            keyed: IndexMap::new(),
            output: None,
            evaluations: 0,
        }
    }
}

/// Work left over from one evaluation, run once its pass is over.
struct Commit {
    callback: Option<LifecycleCallback>,
    effects: Vec<PendingEffect>,
    teardown: Vec<Teardown>,
}

impl Commit {
    /// Returns the number of effects run.
    fn run(self) -> usize {
        for teardown in self.teardown {
            teardown.run();
        }
        if let Some(callback) = self.callback {
            callback();
        }
        let count = self.effects.len();
        for effect in self.effects {
            effect.execute();
        }
        count
    }
}

/// Cleanup owed by an unmounted instance.
struct Teardown {
    instance: InstanceId,
    callback: Option<LifecycleCallback>,
    cleanups: Vec<Cleanup>,
}

impl Teardown {
    fn run(self) {
        trace!(instance = %self.instance, cleanups = self.cleanups.len(), "tearing down");
        for cleanup in self.cleanups {
            cleanup();
        }
        if let Some(callback) = self.callback {
            callback();
        }
    }
}

/// What one flush did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Number of passes run.
    pub passes: usize,

    /// Instances evaluated, in evaluation order.
    pub evaluated: Vec<InstanceId>,

    /// Number of effects run.
    pub effects_run: usize,
}

impl FlushReport {
    /// How often `id` was evaluated during the flush.
    pub fn evaluations_of(&self, id: InstanceId) -> usize {
        self.evaluated.iter().filter(|evaluated| **evaluated == id).count()
    }

    pub fn is_empty(&self) -> bool {
        self.evaluated.is_empty()
    }
}

/// Lock-protected runtime state.
struct Inner {
    config: RuntimeConfig,
    tree: InstanceTree,
    scheduler: UpdateScheduler,
    records: HashMap<InstanceId, InstanceRecord>,

    /// Per channel: each reader and the provider it resolved to (`None` if
    /// it saw the channel default).
    readers: HashMap<ChannelId, IndexMap<InstanceId, Option<InstanceId>>>,

    batch_depth: usize,

    /// First instance queued while a batch was open on an idle queue.
    deferred_notify: Option<InstanceId>,

    flushing: bool,
}

impl Inner {
    fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            tree: InstanceTree::new(),
            scheduler: UpdateScheduler::new(),
            records: HashMap::new(),
            readers: HashMap::new(),
            batch_depth: 0,
            deferred_notify: None,
            flushing: false,
        }
    }

    /// Create an instance and queue its first evaluation.
    ///
    /// Returns the new ID and whether listeners should be told.
    fn insert(
        &mut self,
        component: Arc<dyn Component>,
        parent: Option<InstanceId>,
        key: Option<String>,
    ) -> Result<(InstanceId, bool)> {
        let id = self.tree.insert(parent)?;
        self.records.insert(id, InstanceRecord::new(component, key));

        let depth = self.tree.get(id).map_or(0, |node| node.depth());
        let was_idle = self.scheduler.enqueue(id, depth, false);
        Ok((id, self.should_notify(was_idle, id)))
    }

    /// Mark an instance dirty and queue it.
    ///
    /// Returns whether listeners should be told.
    fn mark_dirty(&mut self, id: InstanceId) -> Result<bool> {
        let node = self.tree.get_mut(id).ok_or(CoreError::UnknownInstance(id))?;
        let depth = node.depth();

        let was_idle = match node.mark_dirty() {
            MarkOutcome::Queued => self.scheduler.enqueue(id, depth, false),
            MarkOutcome::DuringEvaluation => self.scheduler.enqueue(id, depth, true),
            MarkOutcome::AlreadyDirty => return Ok(false),
        };
        Ok(self.should_notify(was_idle, id))
    }

    fn should_notify(&mut self, was_idle: bool, id: InstanceId) -> bool {
        if !was_idle || self.flushing {
            return false;
        }
        if self.batch_depth > 0 {
            self.deferred_notify.get_or_insert(id);
            return false;
        }
        true
    }

    /// Resolve `channel` for `reader` and record the subscription.
    fn read_context(&mut self, reader: InstanceId, channel: ChannelId) -> Option<Arc<ErasedValue>> {
        let found = self.tree.ancestors(reader).find_map(|ancestor| {
            let value = self.records.get(&ancestor)?.provisions.get(&channel)?;
            Some((ancestor, Arc::clone(value)))
        });

        let provider = found.as_ref().map(|(provider, _)| *provider);
        self.readers.entry(channel).or_default().insert(reader, provider);
        if let Some(record) = self.records.get_mut(&reader) {
            if !record.reads.contains(&channel) {
                record.reads.push(channel);
            }
        }

        found.map(|(_, value)| value)
    }

    /// Readers to re-evaluate after `provider` touched its provision.
    ///
    /// A new provision affects readers below it that resolved to something
    /// further out; a changed or withdrawn one affects readers resolved to it.
    fn affected_readers(&self, provider: InstanceId, channel: ChannelId, added: bool) -> Vec<InstanceId> {
        let Some(readers) = self.readers.get(&channel) else {
            return Vec::new();
        };

        readers
            .iter()
            .filter(|(reader, resolved)| {
                if added {
                    self.tree.is_ancestor(provider, **reader)
                        && resolved.map_or(true, |outer| self.tree.is_ancestor(outer, provider))
                } else {
                    **resolved == Some(provider)
                }
            })
            .map(|(reader, _)| *reader)
            .collect()
    }

    /// Start evaluating `id`: take out what the render needs.
    fn begin_evaluation(&mut self, id: InstanceId) -> Result<(Arc<dyn Component>, HookList, bool)> {
        let record = self.records.get_mut(&id).ok_or(CoreError::UnknownInstance(id))?;
        let component = Arc::clone(&record.component);
        let hooks = std::mem::take(&mut record.hooks);
        let reads = std::mem::take(&mut record.reads);

        // Subscriptions are rebuilt by this render.
        for channel in reads {
            if let Some(readers) = self.readers.get_mut(&channel) {
                readers.shift_remove(&id);
            }
        }

        if let Some(node) = self.tree.get_mut(id) {
            node.begin_evaluation();
        }
        Ok((component, hooks, self.config.trace_evaluations))
    }

    /// Store the result of a render and reconcile its children and
    /// provisions.
    ///
    /// Returns the commit plus the readers that must be re-evaluated.
    fn complete_evaluation(
        &mut self,
        id: InstanceId,
        hooks: HookList,
        rendered: Result<Output>,
        parts: RenderParts,
    ) -> Result<(Commit, Vec<InstanceId>)> {
        let node = self.tree.get_mut(id).ok_or(CoreError::UnknownInstance(id))?;
        if node.finish_evaluation() {
            trace!(instance = %id, "dirtied during its own evaluation");
        }

        let record = self.records.get_mut(&id).ok_or(CoreError::UnknownInstance(id))?;
        record.hooks = hooks;
        let output = rendered?;

        let RenderParts {
            effects,
            keys,
            provided,
            lifecycle,
        } = parts;

        record.lifecycle.register(lifecycle);
        let callback = record.lifecycle.evaluated(id)?;
        record.output = Some(output);
        record.evaluations += 1;

        let stale: Vec<InstanceId> = record
            .keyed
            .iter()
            .filter(|(key, _)| !keys.contains(key.as_str()))
            .map(|(_, child)| *child)
            .collect();

        let withdrawn: Vec<ChannelId> = record
            .provisions
            .keys()
            .filter(|channel| !provided.contains(*channel))
            .copied()
            .collect();
        for channel in &withdrawn {
            record.provisions.remove(channel);
        }

        let mut teardown = Vec::new();
        for child in stale {
            teardown.extend(self.unmount_subtree(child)?);
        }

        // Keyed children follow declaration order.
        if let Some(record) = self.records.get_mut(&id) {
            record.keyed = keys
                .into_iter()
                .filter_map(|key| {
                    let child = record.keyed.get(&key).copied()?;
                    Some((key, child))
                })
                .collect();

            let keyed: Children = record.keyed.values().copied().collect();
            if let Some(node) = self.tree.get_mut(id) {
                let mut children = keyed.clone();
                children.extend(node.children().iter().copied().filter(|child| !keyed.contains(child)));
                node.set_children(children);
            }
        }

        let mut to_mark = Vec::new();
        for channel in withdrawn {
            to_mark.extend(self.affected_readers(id, channel, false));
        }

        let commit = Commit {
            callback,
            effects,
            teardown,
        };
        Ok((commit, to_mark))
    }

    /// Remove an instance and its subtree.
    ///
    /// Returns the teardown work in post-order.
    fn unmount_subtree(&mut self, id: InstanceId) -> Result<Vec<Teardown>> {
        let parent = self.tree.get(id).ok_or(CoreError::UnknownInstance(id))?.parent();
        let key = self.records.get(&id).and_then(|record| record.key.clone());
        if let (Some(parent), Some(key)) = (parent, key) {
            if let Some(parent_record) = self.records.get_mut(&parent) {
                if parent_record.keyed.get(&key) == Some(&id) {
                    parent_record.keyed.shift_remove(&key);
                }
            }
        }

        let removed = self.tree.remove_subtree(id)?;
        let mut teardown = Vec::with_capacity(removed.len());

        for removed_id in removed {
            self.scheduler.remove(removed_id);
            let Some(mut record) = self.records.remove(&removed_id) else {
                continue;
            };

            for channel in &record.reads {
                if let Some(readers) = self.readers.get_mut(channel) {
                    readers.shift_remove(&removed_id);
                }
            }

            let callback = record.lifecycle.transition(removed_id, LifecyclePhase::Unmounted)?;
            teardown.push(Teardown {
                instance: removed_id,
                callback,
                cleanups: record.hooks.drain_cleanups(),
            });
        }

        Ok(teardown)
    }
}

/// State shared between the runtime handle and every setter.
pub(crate) struct Shared {
    inner: Mutex<Inner>,
    listeners: DirtyListeners,
}

impl Shared {
    fn new(config: RuntimeConfig) -> Self {
        Self {
            inner: Mutex::new(Inner::new(config)),
            listeners: DirtyListeners::new(),
        }
    }

    /// Weak handle for setters.
    pub(crate) fn sink(self: &Arc<Self>) -> Weak<dyn DirtySink> {
        let sink: Arc<dyn DirtySink> = Arc::clone(self) as Arc<dyn DirtySink>;
        Arc::downgrade(&sink)
    }

    pub(crate) fn read_context(&self, reader: InstanceId, channel: ChannelId) -> Option<Arc<ErasedValue>> {
        self.inner.lock().read_context(reader, channel)
    }

    /// Set `provider`'s value for `channel`, re-queueing affected readers if
    /// it is new or differs from the last one.
    pub(crate) fn provide<T>(&self, provider: InstanceId, channel: ChannelId, value: T) -> Result<()>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
    {
        let to_mark = {
            let mut inner = self.inner.lock();
            let record = inner
                .records
                .get_mut(&provider)
                .ok_or(CoreError::UnknownInstance(provider))?;

            let previous = record.provisions.get(&channel);
            let added = previous.is_none();
            if previous.and_then(|old| old.downcast_ref::<T>()) == Some(&value) {
                return Ok(());
            }
            record.provisions.insert(channel, Arc::new(value));

            inner.affected_readers(provider, channel, added)
        };

        self.mark_all(to_mark)
    }

    /// Declare a keyed child of `parent`, reusing the instance if the key
    /// already exists.
    pub(crate) fn declare_child(
        &self,
        parent: InstanceId,
        key: String,
        component: Arc<dyn Component>,
    ) -> Result<InstanceId> {
        let (child, notify) = {
            let mut inner = self.inner.lock();
            let existing = inner
                .records
                .get(&parent)
                .ok_or(CoreError::UnknownInstance(parent))?
                .keyed
                .get(&key)
                .copied();

            match existing {
                Some(child) => {
                    if let Some(record) = inner.records.get_mut(&child) {
                        record.component = component;
                    }
                    (child, inner.mark_dirty(child)?)
                }
                None => {
                    let (child, notify) = inner.insert(component, Some(parent), Some(key.clone()))?;
                    if let Some(record) = inner.records.get_mut(&parent) {
                        record.keyed.insert(key, child);
                    }
                    (child, notify)
                }
            }
        };

        if notify {
            self.listeners.notify(child);
        }
        Ok(child)
    }

    fn mark_all(&self, ids: impl IntoIterator<Item = InstanceId>) -> Result<()> {
        let mut notify = None;
        {
            let mut inner = self.inner.lock();
            for id in ids {
                if inner.tree.contains(id) && inner.mark_dirty(id)? {
                    notify.get_or_insert(id);
                }
            }
        }

        if let Some(id) = notify {
            self.listeners.notify(id);
        }
        Ok(())
    }

    /// Evaluate one instance. The returned commit has not run yet.
    fn evaluate_instance(self: &Arc<Self>, id: InstanceId) -> Result<Commit> {
        let (component, mut hooks, trace_evaluations) = self.inner.lock().begin_evaluation(id)?;

        if trace_evaluations {
            trace!(
                instance = %id,
                component = component.name(),
                hooks = hooks.len(),
                "evaluating"
            );
        }

        hooks.begin();
        let mut cx = RenderCx::new(id, self, &mut hooks);
        let rendered = component.render(&mut cx);
        let parts = cx.into_parts();
        let rendered = rendered.and_then(|output| hooks.finish(id).map(|()| output));

        let (commit, to_mark) = self.inner.lock().complete_evaluation(id, hooks, rendered, parts)?;
        self.mark_all(to_mark)?;
        Ok(commit)
    }

    fn flush(self: &Arc<Self>) -> Result<FlushReport> {
        {
            let mut inner = self.inner.lock();
            if inner.flushing {
                return Ok(FlushReport::default());
            }
            inner.flushing = true;
            inner.scheduler.begin_flush();
        }

        let _guard = FlushGuard { shared: self };
        self.run_passes()
    }

    fn run_passes(self: &Arc<Self>) -> Result<FlushReport> {
        let (max_reentrant, max_passes) = {
            let inner = self.inner.lock();
            (inner.config.max_reentrant_passes, inner.config.max_flush_passes)
        };
        let mut report = FlushReport::default();

        loop {
            let mut commits = Vec::new();
            loop {
                let next = self.inner.lock().scheduler.pop();
                let Some(id) = next else {
                    break;
                };
                match self.evaluate_instance(id) {
                    Ok(commit) => {
                        commits.push(commit);
                        report.evaluated.push(id);
                    }
                    Err(err) => {
                        // Instances evaluated before the failure are already
                        // committed; their callbacks and teardowns still run.
                        warn!(instance = %id, error = %err, "evaluation failed, committing pass so far");
                        for commit in commits {
                            commit.run();
                        }
                        return Err(err);
                    }
                }
            }

            report.passes += 1;
            for commit in commits {
                report.effects_run += commit.run();
            }

            let mut inner = self.inner.lock();
            if let Some((instance, passes)) = inner.scheduler.reentrant_overflow(max_reentrant) {
                warn!(instance = %instance, passes, "instance keeps re-queueing itself");
                return Err(CoreError::ReentrantEvaluationOverflow { instance, passes });
            }
            if !inner.scheduler.advance_pass() {
                break;
            }
            if report.passes >= max_passes {
                if let Some(instance) = inner.scheduler.peek() {
                    warn!(instance = %instance, passes = report.passes, "flush did not settle");
                    return Err(CoreError::ReentrantEvaluationOverflow {
                        instance,
                        passes: report.passes,
                    });
                }
            }
        }

        debug!(
            passes = report.passes,
            evaluated = report.evaluated.len(),
            effects = report.effects_run,
            "flush complete"
        );
        Ok(report)
    }

    /// Close one batch level. Returns the deferred notification once the
    /// outermost batch closes.
    fn end_batch(&self) -> Option<InstanceId> {
        let mut inner = self.inner.lock();
        inner.batch_depth = inner.batch_depth.saturating_sub(1);
        if inner.batch_depth == 0 {
            inner.deferred_notify.take()
        } else {
            None
        }
    }
}

impl DirtySink for Shared {
    fn is_live(&self, instance: InstanceId) -> bool {
        self.inner.lock().tree.contains(instance)
    }

    fn mark_dirty(&self, instance: InstanceId) -> Result<()> {
        let notify = self.inner.lock().mark_dirty(instance)?;
        if notify {
            self.listeners.notify(instance);
        }
        Ok(())
    }
}

/// Clears the flushing flag even if a pass fails or panics.
struct FlushGuard<'a> {
    shared: &'a Shared,
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.shared.inner.lock();
        inner.flushing = false;
        inner.scheduler.end_flush();
    }
}

/// Holds one batch level open.
struct BatchGuard<'a> {
    shared: &'a Shared,
    open: bool,
}

impl<'a> BatchGuard<'a> {
    fn open(shared: &'a Shared) -> Self {
        shared.inner.lock().batch_depth += 1;
        Self { shared, open: true }
    }

    fn close(mut self) -> Option<InstanceId> {
        self.open = false;
        self.shared.end_batch()
    }
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        if self.open {
            if let Some(id) = self.shared.end_batch() {
                self.shared.listeners.notify(id);
            }
        }
    }
}

/// Handle to a component runtime.
///
/// Cloning is cheap; clones share the same state.
///
/// # Example
///
/// ```rust,ignore
/// let runtime = Runtime::new();
/// let root = runtime.mount(app, None)?;
/// runtime.flush()?;
/// println!("{}", runtime.render_tree(root).unwrap().to_json()?);
/// ```
#[derive(Clone)]
pub struct Runtime {
    shared: Arc<Shared>,
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            shared: Arc::new(Shared::new(config)),
        }
    }

    pub fn config(&self) -> RuntimeConfig {
        self.shared.inner.lock().config.clone()
    }

    // ------------------------------------------------------------------
    // Tree
    // ------------------------------------------------------------------

    /// Mount a component under `parent` (or as a root).
    ///
    /// The instance is queued; it is first evaluated by the next flush.
    pub fn mount<C>(&self, component: C, parent: Option<InstanceId>) -> Result<InstanceId>
    where
        C: Component,
    {
        let name = component.name();
        let (id, notify) = self.shared.inner.lock().insert(Arc::new(component), parent, None)?;
        debug!(instance = %id, component = name, "mounted");

        if notify {
            self.shared.listeners.notify(id);
        }
        Ok(id)
    }

    /// Remove an instance and everything below it.
    ///
    /// Effect cleanups and `on_unmount` callbacks run children first. Pending
    /// re-evaluations of removed instances are dropped.
    pub fn unmount(&self, id: InstanceId) -> Result<()> {
        let teardown = self.shared.inner.lock().unmount_subtree(id)?;
        debug!(instance = %id, removed = teardown.len(), "unmounted");

        for work in teardown {
            work.run();
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------

    /// Evaluate one instance now, outside any flush, and run its effects.
    pub fn evaluate(&self, id: InstanceId) -> Result<Output> {
        self.shared.inner.lock().scheduler.remove(id);
        let commit = self.shared.evaluate_instance(id)?;
        commit.run();
        self.output(id).ok_or(CoreError::UnknownInstance(id))
    }

    /// Evaluate everything that is dirty, pass by pass, until nothing is.
    ///
    /// Calling `flush` from inside a flush (for example from an effect) does
    /// nothing; the outer flush picks up the work.
    pub fn flush(&self) -> Result<FlushReport> {
        self.shared.flush()
    }

    /// Group setter calls into one logical event.
    ///
    /// `on_dirty` fires at most once, when the outermost batch closes.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        let guard = BatchGuard::open(&self.shared);
        let result = f();
        if let Some(id) = guard.close() {
            self.shared.listeners.notify(id);
        }
        result
    }

    /// Run `f` as one logical event, then flush.
    pub fn event(&self, f: impl FnOnce() -> Result<()>) -> Result<FlushReport> {
        let guard = BatchGuard::open(&self.shared);
        let result = f();
        let deferred = guard.close();

        match result {
            Ok(()) => self.flush(),
            Err(err) => {
                if let Some(id) = deferred {
                    self.shared.listeners.notify(id);
                }
                Err(err)
            }
        }
    }

    /// Call `callback` whenever the dirty queue goes from empty to non-empty
    /// outside a flush.
    pub fn on_dirty<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(InstanceId) + Send + Sync + 'static,
    {
        self.shared.listeners.add(callback)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.shared.listeners.remove(id)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Output of the instance's latest evaluation.
    pub fn output(&self, id: InstanceId) -> Option<Output> {
        self.shared.inner.lock().records.get(&id)?.output.clone()
    }

    /// Output with every child placeholder replaced by the child's output.
    pub fn render_tree(&self, id: InstanceId) -> Option<Output> {
        let inner = self.shared.inner.lock();
        let root = inner.records.get(&id)?.output.as_ref()?;
        Some(root.expand(&mut |child| inner.records.get(&child)?.output.clone()))
    }

    pub fn phase(&self, id: InstanceId) -> Option<LifecyclePhase> {
        Some(self.shared.inner.lock().records.get(&id)?.lifecycle.phase())
    }

    pub fn dirty_state(&self, id: InstanceId) -> Option<DirtyState> {
        Some(self.shared.inner.lock().tree.get(id)?.dirty_state())
    }

    /// Number of completed evaluations (0 for unknown instances).
    pub fn evaluation_count(&self, id: InstanceId) -> usize {
        self.shared
            .inner
            .lock()
            .records
            .get(&id)
            .map_or(0, |record| record.evaluations)
    }

    pub fn is_mounted(&self, id: InstanceId) -> bool {
        self.shared.inner.lock().tree.contains(id)
    }

    pub fn children(&self, id: InstanceId) -> Vec<InstanceId> {
        self.shared
            .inner
            .lock()
            .tree
            .get(id)
            .map(|node| node.children().to_vec())
            .unwrap_or_default()
    }

    pub fn parent(&self, id: InstanceId) -> Option<InstanceId> {
        self.shared.inner.lock().tree.get(id)?.parent()
    }

    /// The nearest ancestor of `id` providing `channel`, if any.
    pub fn provider_for<T>(&self, id: InstanceId, channel: &Channel<T>) -> Option<InstanceId>
    where
        T: Clone + Send + Sync + 'static,
    {
        let inner = self.shared.inner.lock();
        let channel = channel.id();
        inner.tree.ancestors(id).find(|ancestor| {
            inner
                .records
                .get(ancestor)
                .map_or(false, |record| record.provisions.contains_key(&channel))
        })
    }

    /// Number of instances waiting for evaluation.
    pub fn pending(&self) -> usize {
        self.shared.inner.lock().scheduler.len()
    }

    pub fn instance_count(&self) -> usize {
        self.shared.inner.lock().tree.len()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.inner.lock();
        f.debug_struct("Runtime")
            .field("instances", &inner.tree.len())
            .field("pending", &inner.scheduler.len())
            .field("listeners", &self.shared.listeners.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{component, Deps, RenderCx, Setter};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn label(text: &'static str) -> impl Component {
        component("Label", move |_cx: &mut RenderCx<'_>| Ok(Output::text(text)))
    }

    #[test]
    fn mount_queues_and_flush_evaluates() {
        let runtime = Runtime::new();
        let id = runtime.mount(label("hello"), None).unwrap();

        assert_eq!(runtime.pending(), 1);
        assert_eq!(runtime.phase(id), Some(LifecyclePhase::Created));

        let report = runtime.flush().unwrap();
        assert_eq!(report.evaluated, vec![id]);
        assert_eq!(runtime.output(id), Some(Output::text("hello")));
        assert_eq!(runtime.phase(id), Some(LifecyclePhase::Mounted));
        assert_eq!(runtime.dirty_state(id), Some(DirtyState::Clean));
    }

    #[test]
    fn setter_marks_owner_and_notifies_once() {
        let runtime = Runtime::new();
        let setter: Arc<Mutex<Option<Setter<i32>>>> = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&setter);
        let id = runtime
            .mount(
                component("Counter", move |cx: &mut RenderCx<'_>| {
                    let (count, set_count) = cx.use_state(0)?;
                    *slot.lock() = Some(set_count);
                    Ok(Output::text(count.to_string()))
                }),
                None,
            )
            .unwrap();
        runtime.flush().unwrap();

        let notified = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&notified);
        runtime.on_dirty(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let set_count = setter.lock().clone().unwrap();
        set_count.update(|n| n + 1).unwrap();
        set_count.update(|n| n + 1).unwrap();

        assert_eq!(notified.load(Ordering::SeqCst), 1);
        assert_eq!(runtime.dirty_state(id), Some(DirtyState::Dirty));

        runtime.flush().unwrap();
        assert_eq!(runtime.output(id), Some(Output::text("2")));
    }

    #[test]
    fn nested_flush_is_a_no_op() {
        let runtime = Runtime::new();
        let handle = runtime.clone();
        let inner_reports = Arc::new(Mutex::new(Vec::new()));
        let reports = Arc::clone(&inner_reports);

        runtime
            .mount(
                component("Flusher", move |cx: &mut RenderCx<'_>| {
                    let handle = handle.clone();
                    let reports = Arc::clone(&reports);
                    cx.use_effect(Deps::once(), move || {
                        reports.lock().push(handle.flush().unwrap());
                    })?;
                    Ok(Output::Empty)
                }),
                None,
            )
            .unwrap();

        runtime.flush().unwrap();
        assert_eq!(*inner_reports.lock(), vec![FlushReport::default()]);
    }

    #[test]
    fn provider_for_finds_nearest_ancestor() {
        let runtime = Runtime::new();
        let theme = Channel::new("light");

        let outer_theme = theme.clone();
        let outer = runtime
            .mount(
                component("Outer", move |cx: &mut RenderCx<'_>| {
                    cx.provide(&outer_theme, "dark")?;
                    Ok(Output::Empty)
                }),
                None,
            )
            .unwrap();
        let middle = runtime.mount(label("middle"), Some(outer)).unwrap();
        let leaf = runtime.mount(label("leaf"), Some(middle)).unwrap();
        runtime.flush().unwrap();

        assert_eq!(runtime.provider_for(leaf, &theme), Some(outer));
        assert_eq!(runtime.provider_for(outer, &theme), None);
    }

    #[test]
    fn unknown_instances_are_reported() {
        let runtime = Runtime::new();
        let ghost = InstanceId::new();

        assert!(matches!(runtime.unmount(ghost), Err(CoreError::UnknownInstance(id)) if id == ghost));
        assert!(matches!(runtime.evaluate(ghost), Err(CoreError::UnknownInstance(_))));
        assert!(runtime.mount(label("orphan"), Some(ghost)).is_err());
        assert_eq!(runtime.evaluation_count(ghost), 0);
    }

    #[test]
    fn failed_render_keeps_previous_output() {
        let runtime = Runtime::new();
        let fail = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&fail);

        let id = runtime
            .mount(
                component("Flaky", move |_cx: &mut RenderCx<'_>| {
                    if flag.load(Ordering::SeqCst) > 0 {
                        return Err(CoreError::MissingProvider {
                            channel: ChannelId::new(),
                        });
                    }
                    Ok(Output::text("ok"))
                }),
                None,
            )
            .unwrap();
        runtime.flush().unwrap();

        fail.store(1, Ordering::SeqCst);
        assert!(runtime.evaluate(id).is_err());
        assert_eq!(runtime.output(id), Some(Output::text("ok")));
        assert_eq!(runtime.evaluation_count(id), 1);
    }
}
