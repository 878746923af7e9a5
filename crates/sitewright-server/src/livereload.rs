//! Live-reload protocol: broadcast hub, client script and HTML injection.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// WebSocket endpoint served by the reload server.
pub const SOCKET_PATH: &str = "/__livereload";

/// Client script path served by the reload server.
pub const SCRIPT_PATH: &str = "/__livereload.js";

/// Messages sent to connected browsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReloadMessage {
    /// Connection established
    Connected,

    /// Full page reload
    Reload,

    /// Swap the stylesheet at `path` without reloading
    Css { path: String },
}

/// Fans reload messages out to every connected client.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    sender: broadcast::Sender<ReloadMessage>,
}

impl ReloadHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Send to all clients. Having none connected is fine.
    pub fn send(&self, msg: ReloadMessage) {
        let _ = self.sender.send(msg);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadMessage> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Insert the client script tag before `</body>`, or append it when the
/// document has no body close tag.
pub fn inject_script(html: &str) -> String {
    let tag = format!(r#"<script src="{}"></script>"#, SCRIPT_PATH);

    match html.to_ascii_lowercase().rfind("</body>") {
        Some(idx) => {
            let mut out = String::with_capacity(html.len() + tag.len());
            out.push_str(&html[..idx]);
            out.push_str(&tag);
            out.push_str(&html[idx..]);
            out
        }
        None => format!("{}{}", html, tag),
    }
}

/// Browser side of the protocol. Connects back to the host that served it.
pub fn client_script() -> String {
    format!(
        r#"
(function() {{
  'use strict';

  var attempts = 0;

  function swapStylesheet(path) {{
    var links = document.querySelectorAll('link[rel="stylesheet"]');
    var swapped = false;
    links.forEach(function(link) {{
      var href = link.getAttribute('href') || '';
      if (href.split('?')[0].endsWith(path)) {{
        link.setAttribute('href', path + '?v=' + Date.now());
        swapped = true;
      }}
    }});
    if (!swapped) {{
      location.reload();
    }}
  }}

  function connect() {{
    var proto = location.protocol === 'https:' ? 'wss://' : 'ws://';
    var ws = new WebSocket(proto + location.host + '{socket}');

    ws.onopen = function() {{
      attempts = 0;
    }};

    ws.onmessage = function(event) {{
      var msg = JSON.parse(event.data);
      switch (msg.type) {{
        case 'reload':
          location.reload();
          break;
        case 'css':
          swapStylesheet(msg.path);
          break;
        case 'connected':
          console.log('[livereload] connected');
          break;
      }}
    }};

    ws.onclose = function() {{
      if (attempts < 10) {{
        attempts++;
        setTimeout(connect, 1000 * attempts);
      }}
    }};
  }}

  connect();
}})();
"#,
        socket = SOCKET_PATH
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn hub_broadcasts_messages() {
        let hub = ReloadHub::new();
        let mut rx = hub.subscribe();

        hub.send(ReloadMessage::Css {
            path: "/assets/css/style.css".to_string(),
        });

        assert_eq!(
            rx.try_recv().unwrap(),
            ReloadMessage::Css {
                path: "/assets/css/style.css".to_string()
            }
        );
    }

    #[test]
    fn sending_without_clients_is_harmless() {
        let hub = ReloadHub::new();
        hub.send(ReloadMessage::Reload);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn messages_use_type_tags() {
        assert_eq!(
            serde_json::to_string(&ReloadMessage::Reload).unwrap(),
            r#"{"type":"reload"}"#
        );
        assert_eq!(
            serde_json::to_string(&ReloadMessage::Css {
                path: "/a.css".to_string()
            })
            .unwrap(),
            r#"{"type":"css","path":"/a.css"}"#
        );
    }

    #[test]
    fn injects_before_body_close() {
        let html = inject_script("<html><BODY><p>x</p></BODY></html>");
        assert_eq!(
            html,
            r#"<html><BODY><p>x</p><script src="/__livereload.js"></script></BODY></html>"#
        );
    }

    #[test]
    fn appends_without_body() {
        let html = inject_script("<p>fragment</p>");
        assert!(html.ends_with(r#"<script src="/__livereload.js"></script>"#));
    }

    #[test]
    fn client_connects_to_socket_path() {
        assert!(client_script().contains("'/__livereload'"));
    }
}
