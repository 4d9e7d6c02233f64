//! Live-update server
//!
//! Owns every component and wires them together:
//!
//! ```text
//! FileSystemWatcher --(settled event)--> pipeline actor --> ConnectionBroadcastHub
//!                                              |                     ^
//!                                     registry / cache        axum websocket route
//! ```
//!
//! Lifecycle is `Stopped -> Starting -> Running -> Stopping -> Stopped`.
//! A start that fails part-way falls back to `Stopped`.

pub mod http;
pub mod pipeline;

pub use http::{collect_stats, router, HmrState, HmrStats};
pub use pipeline::{run_pipeline, spawn_pipeline, HmrPipeline, PipelineHandle, PipelineMessage};

use crate::analysis::RegexComponentAnalyzer;
use crate::client::client_script;
use crate::config::HmrConfig;
use crate::error::{HmrError, HmrResult};
use crate::hash::ContentHashCache;
use crate::hub::{ConnectionBroadcastHub, CLOSE_NORMAL, SHUTDOWN_REASON};
use crate::registry::ModuleDependencyRegistry;
use crate::strategy::UpdateStrategyPolicy;
use crate::utils::lock;
use crate::watcher::{FileSystemWatcher, Subscription};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How long `stop` waits for the HTTP server to drain.
const HTTP_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Everything that only exists while the server runs.
struct Running {
    watcher: Arc<FileSystemWatcher>,
    subscription: Subscription,
    pipeline: PipelineHandle,
    actor: JoinHandle<()>,
    http: JoinHandle<()>,
    shutdown: CancellationToken,
    local_addr: SocketAddr,
    config: Arc<HmrConfig>,
}

pub struct HmrServer {
    config: HmrConfig,
    hub: Arc<ConnectionBroadcastHub>,
    registry: Arc<Mutex<ModuleDependencyRegistry>>,
    cache: Arc<ContentHashCache>,
    lifecycle: Arc<Mutex<ServerState>>,
    running: Mutex<Option<Running>>,
}

impl HmrServer {
    pub fn new(config: HmrConfig) -> Self {
        Self {
            config,
            hub: Arc::new(ConnectionBroadcastHub::new()),
            registry: Arc::new(Mutex::new(ModuleDependencyRegistry::new())),
            cache: Arc::new(ContentHashCache::new()),
            lifecycle: Arc::new(Mutex::new(ServerState::Stopped)),
            running: Mutex::new(None),
        }
    }

    /// Bind, start watching, and begin serving.
    ///
    /// Strategy:
    /// 1. Validate the configuration and bind the listener
    /// 2. Start the watcher and register every existing file
    /// 3. Spawn the pipeline actor and the HTTP server
    ///
    /// Calling `start` on a running server logs a warning and does nothing.
    pub async fn start(&self) -> HmrResult<()> {
        {
            let mut state = lock(&self.lifecycle);
            match *state {
                ServerState::Running => {
                    log::warn!("[hmr:server] Already running");
                    return Ok(());
                }
                ServerState::Starting | ServerState::Stopping => {
                    return Err(HmrError::InvalidState(format!(
                        "cannot start while {:?}",
                        *state
                    )));
                }
                ServerState::Stopped => *state = ServerState::Starting,
            }
        }

        match self.start_components().await {
            Ok(running) => {
                log::info!(
                    "[hmr:server] Live-update server ready: {} (client script {})",
                    running.config.ws_url(),
                    running.config.client_url()
                );
                log::info!(
                    "[hmr:server] Watching {}",
                    running.watcher.root().display()
                );
                *lock(&self.running) = Some(running);
                *lock(&self.lifecycle) = ServerState::Running;
                Ok(())
            }
            Err(e) => {
                log::error!("[hmr:server] Failed to start: {}", e);
                *lock(&self.lifecycle) = ServerState::Stopped;
                Err(e)
            }
        }
    }

    async fn start_components(&self) -> HmrResult<Running> {
        self.config.validate()?;

        let addr = self.config.socket_addr();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| HmrError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        // Port 0 binds an ephemeral port; advertise the real one
        let mut config = self.config.clone();
        config.port = local_addr.port();
        let config = Arc::new(config);

        let watcher = Arc::new(FileSystemWatcher::new(
            config.watch_dir.clone(),
            config.exclude_patterns.clone(),
            Duration::from_millis(config.debounce_ms),
            Arc::clone(&self.cache),
        ));

        let classifier = Arc::new(RegexComponentAnalyzer::new(
            config.class_components_fast_refresh,
        ));
        let pipeline = Arc::new(HmrPipeline::new(
            watcher.root().to_path_buf(),
            Arc::clone(&self.registry),
            UpdateStrategyPolicy::new(classifier, config.fast_refresh),
            Arc::clone(&self.hub),
            Arc::clone(&self.cache),
        ));

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = PipelineHandle::new(tx);
        let submitter = handle.clone();
        let subscription = watcher.subscribe(move |event| {
            if !submitter.submit(event.clone()) {
                log::debug!("[hmr:server] Pipeline stopped, dropping {}", event.path);
            }
        });

        // A restart re-scans from scratch; files deleted while stopped must not linger
        lock(&self.registry).clear();
        self.cache.invalidate(None);

        if let Err(e) = watcher.start() {
            subscription.unsubscribe();
            return Err(e);
        }

        pipeline.prime(&watcher.known_files());

        let actor = tokio::spawn(run_pipeline(pipeline, rx));

        let app = router(HmrState {
            config: Arc::clone(&config),
            hub: Arc::clone(&self.hub),
            registry: Arc::clone(&self.registry),
            cache: Arc::clone(&self.cache),
            watcher: Arc::clone(&watcher),
            lifecycle: Arc::clone(&self.lifecycle),
            script: Arc::new(client_script(&config)),
        });

        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let http = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                log::error!("[hmr:server] HTTP server error: {}", e);
            }
        });

        Ok(Running {
            watcher,
            subscription,
            pipeline: handle,
            actor,
            http,
            shutdown,
            local_addr,
            config,
        })
    }

    /// Stop watching, close every client, and shut the listener down.
    ///
    /// Stopping a server that is not running logs a warning and does nothing.
    pub async fn stop(&self) {
        {
            let mut state = lock(&self.lifecycle);
            if *state != ServerState::Running {
                log::warn!("[hmr:server] Not running ({:?}), nothing to stop", *state);
                return;
            }
            *state = ServerState::Stopping;
        }
        let running = lock(&self.running).take();

        if let Some(running) = running {
            let Running {
                watcher,
                subscription,
                pipeline,
                actor,
                mut http,
                shutdown,
                ..
            } = running;

            watcher.stop();
            subscription.unsubscribe();

            pipeline.shutdown();
            if let Err(e) = actor.await {
                log::warn!("[hmr:server] Pipeline actor ended abnormally: {}", e);
            }

            self.hub.close_all_connections(CLOSE_NORMAL, SHUTDOWN_REASON);

            shutdown.cancel();
            if tokio::time::timeout(HTTP_SHUTDOWN_GRACE, &mut http).await.is_err() {
                log::warn!("[hmr:server] HTTP server did not drain in time, aborting");
                http.abort();
            }
        }

        *lock(&self.lifecycle) = ServerState::Stopped;
        log::info!("[hmr:server] Stopped");
    }

    pub fn state(&self) -> ServerState {
        *lock(&self.lifecycle)
    }

    pub fn is_running(&self) -> bool {
        self.state() == ServerState::Running
    }

    /// Bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        lock(&self.running).as_ref().map(|running| running.local_addr)
    }

    pub fn config(&self) -> &HmrConfig {
        &self.config
    }

    pub fn hub(&self) -> &Arc<ConnectionBroadcastHub> {
        &self.hub
    }

    pub fn registry(&self) -> &Arc<Mutex<ModuleDependencyRegistry>> {
        &self.registry
    }

    /// Current statistics, or `None` while stopped.
    pub fn stats(&self) -> Option<HmrStats> {
        let running = lock(&self.running);
        let running = running.as_ref()?;
        Some(collect_stats(&HmrState {
            config: Arc::clone(&running.config),
            hub: Arc::clone(&self.hub),
            registry: Arc::clone(&self.registry),
            cache: Arc::clone(&self.cache),
            watcher: Arc::clone(&running.watcher),
            lifecycle: Arc::clone(&self.lifecycle),
            script: Arc::new(String::new()),
        }))
    }
}
