//! Endpoint discovery and page-target selection.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use modium_core::{protocol, Error, Result};

/// Per-probe timeout while scanning candidate ports.
const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Port selection: an explicit port, or probe the known candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortSpec {
    Auto,
    Fixed(u16),
}

impl std::str::FromStr for PortSpec {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("auto") {
            Ok(PortSpec::Auto)
        } else {
            s.parse::<u16>()
                .map(PortSpec::Fixed)
                .map_err(|_| format!("invalid port: {s}"))
        }
    }
}

/// A candidate page context exposed by the debugging endpoint (`/json/list`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugTarget {
    pub id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub web_socket_debugger_url: Option<String>,
}

/// Resolve the debug port. An explicit port is trusted as-is; `auto` probes
/// the candidate list with a short reachability check per port.
pub async fn detect_port(host: &str, spec: PortSpec) -> Result<u16> {
    if let PortSpec::Fixed(port) = spec {
        return Ok(port);
    }

    let client = reqwest::Client::builder()
        .timeout(PROBE_TIMEOUT)
        .build()
        .map_err(|e| Error::Transport(format!("http client: {e}")))?;

    for &port in protocol::CANDIDATE_PORTS {
        let url = format!("http://{host}:{port}/json/version");
        match client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!("DevTools endpoint detected on port {port}");
                return Ok(port);
            }
            Ok(resp) => debug!("port {port} answered {}", resp.status()),
            Err(_) => {}
        }
    }

    Err(Error::EndpointNotFound(format!(
        "no DevTools endpoint on {host} (tried {:?}); start the app with \
         WEBVIEW2_ADDITIONAL_BROWSER_ARGUMENTS=--remote-debugging-port=<PORT>",
        protocol::CANDIDATE_PORTS
    )))
}

/// Enumerate page targets at a live endpoint.
pub async fn list_targets(host: &str, port: u16) -> Result<Vec<DebugTarget>> {
    let url = format!("http://{host}:{port}/json/list");
    let targets = reqwest::get(&url)
        .await
        .map_err(|e| Error::Transport(format!("target list: {e}")))?
        .json::<Vec<DebugTarget>>()
        .await
        .map_err(|e| Error::Transport(format!("target list: {e}")))?;
    Ok(targets)
}

/// Pick the page target this session will attach to. Immutable once chosen.
pub async fn pick_target(host: &str, port: u16) -> Result<DebugTarget> {
    let targets = list_targets(host, port).await?;
    select_target(&targets).cloned().ok_or(Error::NoTargetFound)
}

/// Priority: the app's own embedded pages, then any page-kind target, then
/// whatever came first.
pub fn select_target(targets: &[DebugTarget]) -> Option<&DebugTarget> {
    targets
        .iter()
        .find(|t| t.url.starts_with(protocol::APP_URL_PREFIX))
        .or_else(|| targets.iter().find(|t| t.kind == "page"))
        .or_else(|| targets.first())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn target(id: &str, url: &str, kind: &str) -> DebugTarget {
        DebugTarget {
            id: id.to_string(),
            url: url.to_string(),
            title: String::new(),
            kind: kind.to_string(),
            web_socket_debugger_url: None,
        }
    }

    #[test]
    fn test_port_spec_parse() {
        assert_eq!("auto".parse::<PortSpec>().unwrap(), PortSpec::Auto);
        assert_eq!("AUTO".parse::<PortSpec>().unwrap(), PortSpec::Auto);
        assert_eq!("9555".parse::<PortSpec>().unwrap(), PortSpec::Fixed(9555));
        assert!("ninety".parse::<PortSpec>().is_err());
    }

    #[test]
    fn test_select_prefers_app_pages() {
        let targets = vec![
            target("a", "devtools://devtools/inspector.html", "other"),
            target("b", "https://example.com", "page"),
            target("c", "tauri://localhost/library", "page"),
        ];
        assert_eq!(select_target(&targets).unwrap().id, "c");
    }

    #[test]
    fn test_select_falls_back_to_page_kind() {
        let targets = vec![
            target("a", "devtools://devtools/inspector.html", "other"),
            target("b", "https://example.com", "page"),
        ];
        assert_eq!(select_target(&targets).unwrap().id, "b");
    }

    #[test]
    fn test_select_falls_back_to_first() {
        let targets = vec![
            target("a", "about:blank", "iframe"),
            target("b", "about:blank", "worker"),
        ];
        assert_eq!(select_target(&targets).unwrap().id, "a");
        assert!(select_target(&[]).is_none());
    }

    /// Serve one canned HTTP response on an ephemeral port.
    async fn serve_once(body: String) -> u16 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            if let Ok((mut sock, _)) = listener.accept().await {
                let mut buf = [0u8; 2048];
                let _ = sock.read(&mut buf).await;
                let resp = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = sock.write_all(resp.as_bytes()).await;
                let _ = sock.shutdown().await;
            }
        });
        port
    }

    #[tokio::test]
    async fn test_list_targets_deserializes() {
        let body = serde_json::json!([
            {
                "id": "T1",
                "title": "Library",
                "type": "page",
                "url": "tauri://localhost/library",
                "webSocketDebuggerUrl": "ws://127.0.0.1:9555/devtools/page/T1"
            }
        ])
        .to_string();
        let port = serve_once(body).await;

        let targets = list_targets("127.0.0.1", port).await.unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].id, "T1");
        assert_eq!(targets[0].kind, "page");
        assert!(targets[0].web_socket_debugger_url.is_some());
    }

    #[tokio::test]
    async fn test_pick_target_empty_list() {
        let port = serve_once("[]".to_string()).await;
        match pick_target("127.0.0.1", port).await {
            Err(Error::NoTargetFound) => {}
            other => panic!("expected NoTargetFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_detect_port_fixed_passthrough() {
        let port = detect_port("127.0.0.1", PortSpec::Fixed(9333)).await.unwrap();
        assert_eq!(port, 9333);
    }
}
