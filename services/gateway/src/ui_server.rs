//! Static-file serving for the demo echo-client page.
//!
//! When built with `--features embed-ui`, serves the hand-written vanilla
//! JS page under `web/` (no frontend build toolchain — there is nothing to
//! compile). Without the feature, returns a placeholder explaining how to
//! rebuild with it.

use axum::http::{Method, Uri};
use axum::response::{IntoResponse, Response};

#[cfg(feature = "embed-ui")]
#[derive(rust_embed::Embed)]
#[folder = "web"]
struct UiAssets;

/// Serves the embedded demo UI, or a placeholder when it wasn't embedded.
///
/// Rejects non-`GET`/`HEAD` methods and the `/ws`/`/api` prefixes, which
/// are handled by dedicated routes before the fallback ever sees them —
/// the prefix check here is defense in depth for any path that slips
/// through the router unmatched.
pub async fn serve_ui(method: Method, uri: Uri) -> Response {
    match rt_ui_http::validate_ui_request(&method, &uri, &["/ws", "/api"]) {
        Err(e) => e.into_response(),
        Ok(raw_path) => {
            #[cfg(feature = "embed-ui")]
            {
                rt_ui_http::serve_embedded_ui::<UiAssets>(raw_path)
            }
            #[cfg(not(feature = "embed-ui"))]
            {
                let _ = raw_path;
                rt_ui_http::non_embedded_placeholder("gateway")
            }
        }
    }
}
