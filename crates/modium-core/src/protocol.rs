//! Constants of the target application's IPC bridge, as observed on the wire.
//!
//! Everything here was recovered from the running app: the debug ports its
//! WebView accepts, the header that carries the per-session invoke key, the
//! single POST endpoint its frontend funnels every backend call through, and
//! the endpoint names of the mod operations this tool emulates.

/// Debug ports probed in order when `--port auto` is used.
pub const CANDIDATE_PORTS: &[u16] = &[9555, 9666, 9222, 9333, 9777];

/// URL prefix of the embedded application's own pages.
pub const APP_URL_PREFIX: &str = "tauri://localhost";

/// Header carrying the short-lived invoke key (matched case-insensitively).
pub const INVOKE_KEY_HEADER: &str = "tauri-invoke-key";

/// Header naming the one-shot success callback handle.
pub const CALLBACK_HEADER: &str = "tauri-callback";

/// Header naming the one-shot error callback handle.
pub const ERROR_HEADER: &str = "tauri-error";

/// The single bridge transport endpoint every frontend call POSTs to.
pub const IPC_POST_URL: &str = "http://ipc.localhost/post_msg_to_backend";

/// Harmless plugin call used to provoke a keyed request out of the app.
pub const IPC_POKE_URL: &str = "http://ipc.localhost/plugin%3Awindow%7Cstart_dragging";

/// Bridge endpoint: toggle a mod's disabled flag.
pub const EP_SET_DISABLED: &str = "mod/set_disabled";

/// Bridge endpoint: rebuild the modded file overlay after toggles.
pub const EP_UPDATE_MODDED_FILES: &str = "mod/update_modded_files";

/// Bridge endpoint: resync game status after toggles.
pub const EP_SYNC_STATUS: &str = "game/sync_status";

/// Bridge endpoint: paginated installed-mod listing (streams its real answer).
pub const EP_INSTALLED_MODS: &str = "mod/installed_mods";

/// Bridge endpoint: alternate listing path kept as a fallback. Not assumed to
/// return the same data as [`EP_INSTALLED_MODS`].
pub const EP_INSTALLED_MODS_FOR_PRIORITY: &str = "mod/installed_mods_for_priority";

/// Sort order the app's own frontend requests listings with.
pub const LISTING_SORT: &str = "priority:desc,installed_at:desc";

/// Page size large enough to fetch a whole library in one page.
pub const LISTING_PAGE_SIZE: u64 = 200;
