//! Modium Bridge — emulates the target application's internal IPC calls.
//!
//! The pieces compose around one live [`modium_devtools::DevtoolsSession`]:
//! [`TokenCapture`] passively recovers the invoke key, [`BridgeClient`] sends
//! synthetic calls indistinguishable from the app's own, and the
//! [`Reassembler`] rebuilds record payloads that stream past the callback
//! path in fragments.

pub mod bootstrap;
pub mod client;
pub mod listing;
pub mod probe;
pub mod reassembly;
pub mod recorder;
pub mod token;

pub use client::BridgeClient;
pub use listing::list_installed;
pub use reassembly::Reassembler;
pub use recorder::TrafficRecorder;
pub use token::TokenCapture;
