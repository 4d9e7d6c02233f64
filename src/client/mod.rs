//! Browser-side reconciler script and HTML injection.

use crate::config::HmrConfig;

const CLIENT_TEMPLATE: &str = include_str!("../../assets/hmr-client.js");

/// Render the reconciler script for this server's websocket endpoint.
pub fn client_script(config: &HmrConfig) -> String {
    CLIENT_TEMPLATE
        .replace("__HMR_WS_PATH__", &js_string_escape(&config.ws_path))
        .replace("__HMR_PORT__", &config.port.to_string())
}

/// Insert a deferred `<script>` tag pointing at the client script.
///
/// Goes before `</head>`, else before `</body>`, else at the end. Returns
/// the HTML untouched when `enabled` is false.
pub fn inject_client_script(html: &str, enabled: bool, config: &HmrConfig) -> String {
    if !enabled {
        return html.to_string();
    }

    let tag = format!("<script src=\"{}\" defer></script>", config.client_url());

    for closing in ["</head>", "</body>"] {
        if let Some(idx) = html.find(closing) {
            log::debug!("[hmr:client] Injected client script before {}", closing);
            let mut out = String::with_capacity(html.len() + tag.len() + 4);
            out.push_str(&html[..idx]);
            out.push_str("  ");
            out.push_str(&tag);
            out.push('\n');
            out.push_str(&html[idx..]);
            return out;
        }
    }

    log::warn!("[hmr:client] No </head> or </body> found, appending client script");
    format!("{}\n{}", html, tag)
}

fn js_string_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_script_substitutes_endpoint() {
        let mut config = HmrConfig::default();
        config.port = 4100;
        config.ws_path = "/__live".to_string();

        let script = client_script(&config);
        assert!(script.contains("var WS_PATH = '/__live';"));
        assert!(script.contains("var PORT = '4100';"));
        assert!(!script.contains("__HMR_"));
        assert!(script.contains("window.__HMR__"));
    }

    #[test]
    fn test_inject_before_head() {
        let config = HmrConfig::default();
        let html = "<html><head><title>x</title></head><body></body></html>";
        let out = inject_client_script(html, true, &config);
        let script_at = out.find("<script src=\"http://localhost:3001/hmr-client.js\" defer>").unwrap();
        assert!(script_at < out.find("</head>").unwrap());
    }

    #[test]
    fn test_inject_before_body_then_append() {
        let config = HmrConfig::default();
        let out = inject_client_script("<body><p>hi</p></body>", true, &config);
        assert!(out.find("<script").unwrap() < out.find("</body>").unwrap());

        let out = inject_client_script("<p>fragment</p>", true, &config);
        assert!(out.starts_with("<p>fragment</p>\n<script"));
    }

    #[test]
    fn test_inject_disabled_returns_input() {
        let html = "<html><head></head></html>";
        assert_eq!(inject_client_script(html, false, &HmrConfig::default()), html);
    }
}
