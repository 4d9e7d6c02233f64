use super::{ModuleId, UpdateStrategy};
use serde::{Deserialize, Serialize};

/// Server -> client live-update message.
///
/// The `type` tag and camelCase field names form the wire protocol the
/// browser reconciler understands. The send timestamp is not part of the
/// message itself: the hub stamps it at broadcast time, see [`StampedMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BroadcastMessage {
    #[serde(rename_all = "camelCase")]
    Connected { message: String },

    #[serde(rename_all = "camelCase")]
    CssUpdate {
        file: String,
        hash: String,
        module_id: ModuleId,
        update_type: UpdateStrategy,
        css_content: String,
    },

    #[serde(rename_all = "camelCase")]
    JsUpdate {
        file: String,
        hash: String,
        module_id: ModuleId,
        update_type: UpdateStrategy,
        dependent_count: usize,
        message: String,
    },

    #[serde(rename = "react-refresh", rename_all = "camelCase")]
    ComponentRefresh {
        file: String,
        hash: String,
        module_id: ModuleId,
        update_type: UpdateStrategy,
        component_code: String,
        component_name: String,
        preserve_state: bool,
        signature_changed: bool,
        message: String,
    },

    #[serde(rename_all = "camelCase")]
    Reload {
        file: String,
        hash: String,
        module_id: ModuleId,
        update_type: UpdateStrategy,
        message: String,
    },

    #[serde(rename_all = "camelCase")]
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        module_id: Option<ModuleId>,
    },
}

impl BroadcastMessage {
    pub fn connected() -> Self {
        BroadcastMessage::Connected {
            message: "HMR client connected successfully".to_string(),
        }
    }

    pub fn reload(file: &str, hash: &str, module_id: &ModuleId, reason: impl Into<String>) -> Self {
        BroadcastMessage::Reload {
            file: file.to_string(),
            hash: hash.to_string(),
            module_id: module_id.clone(),
            update_type: UpdateStrategy::FullReload,
            message: reason.into(),
        }
    }

    pub fn error(message: impl Into<String>, module_id: Option<&ModuleId>) -> Self {
        BroadcastMessage::Error {
            message: message.into(),
            module_id: module_id.cloned(),
        }
    }

    /// Wire tag, identical to the serialized `type` field.
    pub fn type_tag(&self) -> &'static str {
        match self {
            BroadcastMessage::Connected { .. } => "connected",
            BroadcastMessage::CssUpdate { .. } => "css-update",
            BroadcastMessage::JsUpdate { .. } => "js-update",
            BroadcastMessage::ComponentRefresh { .. } => "react-refresh",
            BroadcastMessage::Reload { .. } => "reload",
            BroadcastMessage::Error { .. } => "error",
        }
    }

    pub fn module_id(&self) -> Option<&ModuleId> {
        match self {
            BroadcastMessage::CssUpdate { module_id, .. }
            | BroadcastMessage::JsUpdate { module_id, .. }
            | BroadcastMessage::ComponentRefresh { module_id, .. }
            | BroadcastMessage::Reload { module_id, .. } => Some(module_id),
            BroadcastMessage::Error { module_id, .. } => module_id.as_ref(),
            BroadcastMessage::Connected { .. } => None,
        }
    }
}

/// A message plus the send timestamp (RFC 3339, UTC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampedMessage {
    #[serde(flatten)]
    pub message: BroadcastMessage,
    pub timestamp: String,
}

impl StampedMessage {
    pub fn new(message: BroadcastMessage, timestamp: String) -> Self {
        Self { message, timestamp }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_css_update_wire_format() {
        let msg = BroadcastMessage::CssUpdate {
            file: "styles.css".to_string(),
            hash: "1a2b".to_string(),
            module_id: ModuleId::new("styles.css"),
            update_type: UpdateStrategy::Hot,
            css_content: "body{}".to_string(),
        };
        let value = serde_json::to_value(StampedMessage::new(msg, "t".to_string())).unwrap();
        assert_eq!(value["type"], "css-update");
        assert_eq!(value["moduleId"], "styles.css");
        assert_eq!(value["cssContent"], "body{}");
        assert_eq!(value["updateType"], "hot");
        assert_eq!(value["timestamp"], "t");
    }

    #[test]
    fn test_component_refresh_uses_react_refresh_tag() {
        let msg = BroadcastMessage::ComponentRefresh {
            file: "components/Button.tsx".to_string(),
            hash: "h".to_string(),
            module_id: ModuleId::new("components/Button.tsx"),
            update_type: UpdateStrategy::FastRefresh,
            component_code: "code".to_string(),
            component_name: "Button".to_string(),
            preserve_state: false,
            signature_changed: false,
            message: "Fast refresh for Button".to_string(),
        };
        assert_eq!(msg.type_tag(), "react-refresh");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "react-refresh");
        assert_eq!(value["componentName"], "Button");
        assert_eq!(value["preserveState"], false);
        assert_eq!(value["updateType"], "fast-refresh");
    }

    #[test]
    fn test_stamped_message_parses_back() {
        let msg = BroadcastMessage::reload("a.html", "", &ModuleId::new("a.html"), "Document changed");
        let json = serde_json::to_string(&StampedMessage::new(msg.clone(), "now".to_string())).unwrap();
        let parsed: StampedMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.message, msg);
        assert_eq!(parsed.timestamp, "now");
    }

    #[test]
    fn test_error_omits_missing_module() {
        let msg = BroadcastMessage::error("boom", None);
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("moduleId"));
        assert!(msg.module_id().is_none());
    }
}
