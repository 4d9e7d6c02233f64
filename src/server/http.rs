//! HTTP / WebSocket 端点
//!
//! 浏览器端通过这些路由取得客户端脚本并建立实时更新连接
//!
//! ## 路由结构
//!
//! ```text
//! GET     {wsPath}       - WebSocket 升级 (默认 /hmr)
//! GET     {clientPath}   - 客户端 reconciler 脚本 (默认 /hmr-client.js)
//! OPTIONS {clientPath}   - CORS 预检
//! GET     {statsPath}    - 统计信息 JSON (默认 /hmr/stats)
//! GET     /health        - 健康检查
//! ```

use super::ServerState;
use crate::config::HmrConfig;
use crate::hash::ContentHashCache;
use crate::hub::{ChannelConnection, ConnectionBroadcastHub, OutboundFrame};
use crate::registry::ModuleDependencyRegistry;
use crate::utils::lock;
use crate::watcher::FileSystemWatcher;
use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// 路由共享状态
#[derive(Clone)]
pub struct HmrState {
    pub config: Arc<HmrConfig>,
    pub hub: Arc<ConnectionBroadcastHub>,
    pub registry: Arc<Mutex<ModuleDependencyRegistry>>,
    pub cache: Arc<ContentHashCache>,
    pub watcher: Arc<FileSystemWatcher>,
    pub lifecycle: Arc<Mutex<ServerState>>,
    /// 预先渲染好的客户端脚本
    pub script: Arc<String>,
}

/// 构建路由表
pub fn router(state: HmrState) -> Router {
    let config = Arc::clone(&state.config);

    Router::new()
        .route(&config.ws_path, get(ws_handler))
        .route(
            &config.client_path,
            get(client_script_handler).options(preflight_handler),
        )
        .route(&config.stats_path, get(stats_handler).options(preflight_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

// ============================================================================
// 通用响应头
// ============================================================================

const CORS_HEADERS: [(HeaderName, &str); 3] = [
    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, OPTIONS"),
    (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
];

const NO_CACHE: [(HeaderName, &str); 1] =
    [(header::CACHE_CONTROL, "no-cache, no-store, must-revalidate")];

// ============================================================================
// 静态资源端点
// ============================================================================

/// 客户端脚本（禁用缓存，允许跨域）
async fn client_script_handler(State(state): State<HmrState>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/javascript; charset=utf-8"),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        NO_CACHE,
        CORS_HEADERS,
        state.script.as_str().to_owned(),
    )
        .into_response()
}

/// CORS 预检
async fn preflight_handler() -> Response {
    (StatusCode::NO_CONTENT, CORS_HEADERS).into_response()
}

// ============================================================================
// 系统端点
// ============================================================================

/// 健康检查端点
async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "zephra-hmr",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub css_hot_update: bool,
    pub js_hot_update: bool,
    pub fast_refresh: bool,
    pub smart_reloading: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigEcho {
    pub port: u16,
    pub ws_path: String,
    pub watch_dir: String,
    pub client_path: String,
}

/// `/hmr/stats` 响应体
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HmrStats {
    pub connected_clients: usize,
    pub total_updates: u64,
    pub last_update: Option<String>,
    pub total_modules: usize,
    pub hmr_capable_modules: usize,
    pub watched_directories: usize,
    pub pending_events: usize,
    pub cached_hashes: usize,
    pub is_running: bool,
    pub capabilities: Capabilities,
    pub config: ConfigEcho,
}

/// 汇总各组件统计
pub fn collect_stats(state: &HmrState) -> HmrStats {
    let hub = state.hub.stats();
    let registry = lock(&state.registry).stats();
    let watcher = state.watcher.stats();

    HmrStats {
        connected_clients: hub.connected_clients,
        total_updates: hub.total_updates,
        last_update: hub.last_update,
        total_modules: registry.total_modules,
        hmr_capable_modules: registry.hmr_capable_modules,
        watched_directories: watcher.watched_directories,
        pending_events: watcher.pending_events,
        cached_hashes: state.cache.stats().cached_entries,
        is_running: *lock(&state.lifecycle) == ServerState::Running,
        capabilities: Capabilities {
            css_hot_update: true,
            js_hot_update: true,
            fast_refresh: state.config.fast_refresh,
            smart_reloading: true,
        },
        config: ConfigEcho {
            port: state.config.port,
            ws_path: state.config.ws_path.clone(),
            watch_dir: state.watcher.root().display().to_string(),
            client_path: state.config.client_path.clone(),
        },
    }
}

/// 统计信息端点
async fn stats_handler(State(state): State<HmrState>) -> Response {
    (NO_CACHE, CORS_HEADERS, Json(collect_stats(&state))).into_response()
}

// ============================================================================
// WebSocket
// ============================================================================

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<HmrState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// 单个连接的生命周期
///
/// 出站消息经由 channel 交给 writer task，广播永远不会等待慢连接；
/// 读端只用于感知关闭，客户端无需发送任何业务消息。
async fn handle_socket(socket: WebSocket, state: HmrState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (connection, mut outbound) = ChannelConnection::new();
    let client_id = state.hub.add_client(Arc::new(connection));

    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            match frame {
                OutboundFrame::Text(text) => {
                    if ws_sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                OutboundFrame::Close { code, reason } => {
                    let _ = ws_sender
                        .send(Message::Close(Some(CloseFrame {
                            code,
                            reason: reason.into(),
                        })))
                        .await;
                    break;
                }
            }
        }
    });

    while let Some(message) = ws_receiver.next().await {
        match message {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                log::debug!("[hmr:http] Socket error for {}: {}", client_id, e);
                break;
            }
        }
    }

    state.hub.remove_client(&client_id);
    writer.abort();
}
