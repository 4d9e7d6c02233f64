//! Change pipeline: one `FileChangeEvent` in, at most one broadcast out.
//!
//! Per-event failures never escape. A read error, failed analysis or a panic
//! inside a step sends an `error` message naming the module, then degrades
//! the event to a `reload`.

use crate::analysis::{is_component_file, local_dependencies, resolve_dependencies, ComponentClassifier};
use crate::hash::ContentHashCache;
use crate::hub::ConnectionBroadcastHub;
use crate::models::{
    BroadcastMessage, ChangeKind, ComponentAnalysis, ComponentInfo, FileChangeEvent, FileKind,
    ModuleId, UpdateStrategy,
};
use crate::registry::ModuleDependencyRegistry;
use crate::strategy::UpdateStrategyPolicy;
use crate::utils::lock;
use std::fs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct HmrPipeline {
    root: PathBuf,
    registry: Arc<Mutex<ModuleDependencyRegistry>>,
    policy: UpdateStrategyPolicy,
    hub: Arc<ConnectionBroadcastHub>,
    cache: Arc<ContentHashCache>,
}

impl HmrPipeline {
    pub fn new(
        root: impl Into<PathBuf>,
        registry: Arc<Mutex<ModuleDependencyRegistry>>,
        policy: UpdateStrategyPolicy,
        hub: Arc<ConnectionBroadcastHub>,
        cache: Arc<ContentHashCache>,
    ) -> Self {
        Self {
            root: root.into(),
            registry,
            policy,
            hub,
            cache,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn classifier(&self) -> &dyn ComponentClassifier {
        self.policy.classifier().as_ref()
    }

    /// Classify only sources that look like UI components at all.
    fn analyze(&self, module_id: &ModuleId, content: &str) -> Option<ComponentAnalysis> {
        if !is_component_file(module_id, content) {
            return None;
        }
        self.classifier().analyze(module_id, content)
    }

    /// Register every pre-existing file before going live.
    ///
    /// Returns the number of modules registered.
    pub fn prime(&self, files: &[PathBuf]) -> usize {
        let mut registered = 0;
        for full_path in files {
            let hash = self.cache.fingerprint(full_path);
            if hash.is_empty() {
                continue;
            }

            let module_id = ModuleId::from_path(&self.root, full_path);
            let kind = FileKind::from_path(full_path);
            let content = if kind.is_component_like() {
                fs::read_to_string(full_path).ok()
            } else {
                None
            };
            let analysis = content
                .as_deref()
                .and_then(|content| self.analyze(&module_id, content));

            self.register(&module_id, hash, content.as_deref(), analysis.as_ref());
            registered += 1;
        }

        log::info!("[hmr:pipeline] Registered {} existing module(s)", registered);
        registered
    }

    /// Process one change event and broadcast the outcome.
    ///
    /// Returns the broadcast message, or `None` when the event was a
    /// duplicate and nothing was sent.
    pub fn handle_change(&self, event: &FileChangeEvent) -> Option<BroadcastMessage> {
        let module_id = event.path.clone();

        let message = if event.kind == ChangeKind::Removed {
            lock(&self.registry).remove(&module_id);
            self.cache.invalidate(Some(&event.full_path));
            BroadcastMessage::reload(
                module_id.as_str(),
                "",
                &module_id,
                format!("Module removed: {}", module_id),
            )
        } else {
            let outcome = catch_unwind(AssertUnwindSafe(|| self.plan(&module_id, event)));
            match outcome {
                Ok(Ok(Some(message))) => message,
                Ok(Ok(None)) => {
                    log::debug!("[hmr:pipeline] Unchanged content for {}, skipping", module_id);
                    return None;
                }
                Ok(Err(reason)) => {
                    log::warn!("[hmr:pipeline] {} degraded to reload: {}", module_id, reason);
                    self.degrade(&module_id, event, reason)
                }
                Err(_) => {
                    log::error!("[hmr:pipeline] Panic while processing {}", module_id);
                    self.degrade(
                        &module_id,
                        event,
                        format!("Internal error while processing {}", module_id),
                    )
                }
            }
        };

        let delivered = self.hub.broadcast(&message);
        log::info!(
            "[hmr:pipeline] {:?} {} -> {} ({} client(s))",
            event.kind,
            module_id,
            message.type_tag(),
            delivered
        );
        Some(message)
    }

    /// Report a failed event to clients, then fall back to a reload.
    fn degrade(&self, module_id: &ModuleId, event: &FileChangeEvent, reason: String) -> BroadcastMessage {
        self.hub
            .broadcast(&BroadcastMessage::error(reason.clone(), Some(module_id)));
        BroadcastMessage::reload(module_id.as_str(), &event.content_hash, module_id, reason)
    }

    /// Steps 3-5 for a non-removal event.
    ///
    /// `Ok(None)` means the module is known and its hash did not change.
    fn plan(&self, module_id: &ModuleId, event: &FileChangeEvent) -> Result<Option<BroadcastMessage>, String> {
        let kind = event.file_kind;
        let hash = event.content_hash.as_str();
        let file = module_id.as_str();

        let content = if kind.is_component_like() {
            Some(read_source(&event.full_path)?)
        } else {
            None
        };
        let analysis = content
            .as_deref()
            .and_then(|content| self.analyze(module_id, content));

        let previous_signature = {
            let mut registry = lock(&self.registry);
            let previous = registry.get(module_id).map(|r| r.signature.clone());
            if previous.is_some()
                && !registry.update(module_id, hash)
                && event.kind == ChangeKind::Modified
            {
                return Ok(None);
            }
            previous
        };
        self.register(module_id, hash.to_string(), content.as_deref(), analysis.as_ref());

        let decision = self.policy.decide(module_id, kind, analysis.as_ref());
        log::debug!(
            "[hmr:pipeline] {} -> {} ({})",
            module_id,
            decision.strategy,
            decision.reason
        );

        let message = match decision.strategy {
            UpdateStrategy::Hot if kind == FileKind::Stylesheet => BroadcastMessage::CssUpdate {
                file: file.to_string(),
                hash: hash.to_string(),
                module_id: module_id.clone(),
                update_type: UpdateStrategy::Hot,
                css_content: read_source(&event.full_path)?,
            },
            UpdateStrategy::Hot => {
                let dependents = lock(&self.registry).affected_by(module_id);
                BroadcastMessage::JsUpdate {
                    file: file.to_string(),
                    hash: hash.to_string(),
                    module_id: module_id.clone(),
                    update_type: UpdateStrategy::Hot,
                    dependent_count: dependents.len(),
                    message: decision.reason,
                }
            }
            UpdateStrategy::FastRefresh => {
                let source = read_source(&event.full_path)?;
                let Some(refreshed) = self.analyze(module_id, &source) else {
                    return Err("Component analysis failed".to_string());
                };
                let signature_changed = previous_signature
                    .filter(|previous| !previous.is_empty())
                    .is_some_and(|previous| previous != refreshed.signature);

                BroadcastMessage::ComponentRefresh {
                    file: file.to_string(),
                    hash: hash.to_string(),
                    module_id: module_id.clone(),
                    update_type: UpdateStrategy::FastRefresh,
                    component_code: source,
                    component_name: refreshed.name.clone(),
                    preserve_state: refreshed.has_local_state,
                    signature_changed,
                    message: format!("Fast refresh for {}", refreshed.name),
                }
            }
            UpdateStrategy::FullReload => {
                BroadcastMessage::reload(file, hash, module_id, decision.reason)
            }
        };

        Ok(Some(message))
    }

    /// Record the module with the resolved relative imports of its source,
    /// whether or not it classified as a component.
    fn register(
        &self,
        module_id: &ModuleId,
        hash: String,
        content: Option<&str>,
        analysis: Option<&ComponentAnalysis>,
    ) {
        let lexical = match (analysis, content) {
            (Some(analysis), _) => analysis.local_dependencies.clone(),
            (None, Some(content)) => local_dependencies(module_id, content),
            (None, None) => Vec::new(),
        };
        let dependencies = resolve_dependencies(&self.root, &lexical);
        lock(&self.registry).register(
            module_id.clone(),
            hash,
            dependencies,
            analysis.map(ComponentInfo::from),
        );
    }
}

fn read_source(path: &Path) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))
}

// ============================================================================
// Pipeline actor
// ============================================================================

/// Messages accepted by the pipeline actor.
#[derive(Debug)]
pub enum PipelineMessage {
    /// Process one settled change
    Change(FileChangeEvent),
    /// Stop the actor
    Shutdown,
}

/// Cloneable sender side of the pipeline mailbox.
#[derive(Clone)]
pub struct PipelineHandle {
    sender: mpsc::UnboundedSender<PipelineMessage>,
}

impl PipelineHandle {
    pub fn new(sender: mpsc::UnboundedSender<PipelineMessage>) -> Self {
        Self { sender }
    }

    /// Queue an event. Returns `false` once the actor has stopped.
    pub fn submit(&self, event: FileChangeEvent) -> bool {
        self.sender.send(PipelineMessage::Change(event)).is_ok()
    }

    pub fn shutdown(&self) {
        let _ = self.sender.send(PipelineMessage::Shutdown);
    }
}

/// Drain the mailbox, processing events one at a time, until `Shutdown`.
pub async fn run_pipeline(pipeline: Arc<HmrPipeline>, mut mailbox: mpsc::UnboundedReceiver<PipelineMessage>) {
    while let Some(message) = mailbox.recv().await {
        match message {
            PipelineMessage::Change(event) => {
                pipeline.handle_change(&event);
            }
            PipelineMessage::Shutdown => break,
        }
    }
    log::debug!("[hmr:pipeline] Actor stopped");
}

/// Spawn the pipeline actor.
///
/// Returns the mailbox handle and the actor task.
pub fn spawn_pipeline(pipeline: Arc<HmrPipeline>) -> (PipelineHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run_pipeline(pipeline, rx));
    (PipelineHandle::new(tx), task)
}
