//! Modium DevTools — find the target's remote-debugging endpoint, pick a page
//! target, and drive a minimal CDP session over WebSocket.

pub mod endpoint;
pub mod session;

pub use endpoint::{detect_port, list_targets, pick_target, DebugTarget, PortSpec};
pub use session::{DevtoolsSession, RequestMeta, ResponseMeta};
