//! Operating-system captive portal probes.
//!
//! Phones and laptops request a well-known URL after joining a network and
//! open a login window when the answer is not the expected one. Every probe
//! is answered with a page that sends the device to the portal with its
//! session id.

use axum::extract::State;
use axum::response::Html;
use axum_extra::extract::cookie::CookieJar;

use crate::error::ApiError;
use crate::extractors::{ClientIp, remember_device, resolve_device};
use crate::state::AppState;

/// GET /generate_204, /connecttest.txt, /hotspot-detect.html
pub async fn captive_probe(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    jar: CookieJar,
) -> Result<(CookieJar, Html<String>), ApiError> {
    let device = resolve_device(&state, &ip, None, &jar).await;
    let jar = remember_device(jar, &device, state.config.session.cookie_max_age_days);

    let session = state.controller.ensure_session(&device.identity(), &ip).await?;
    tracing::debug!(session_id = session.id, ip = %ip, "Captive probe redirected");

    Ok((jar, Html(redirect_page(session.id))))
}

/// HTML that forwards the browser to the portal page of `session_id`.
fn redirect_page(session_id: i64) -> String {
    let target = format!("/?session={session_id}");
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n\
         <meta http-equiv=\"refresh\" content=\"0; url={target}\">\n\
         <script>window.location.replace(\"{target}\");</script>\n\
         </head>\n<body><a href=\"{target}\">Continue to the portal</a></body>\n</html>\n"
    )
}
