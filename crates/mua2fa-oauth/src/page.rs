//! The single HTML page the browser lands on after the OAuth callback.
//!
//! Its only content is one of the hints carried in the state. Hints come
//! from the client and are never trusted, so they are escaped before they
//! reach the page.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

pub const COMPLETE_COLOR: &str = "#066805";
pub const CANCEL_COLOR: &str = "#97242c";

/// Shown when the request did not even carry a readable state.
pub const BAD_REQUEST_HINT: &str = "Bad Request";

pub const HTML_CONTENT_TYPE: &str = "text/html;charset=utf-8";

pub fn render(color: &str, hint: &str) -> String {
    format!(
        concat!(
            r#"<!doctype html><html><head><meta charset="utf-8"><meta name="viewport" "#,
            r#"content="width=device-width,initial-scale=1"><title>MUA2FA</title></head>"#,
            r#"<body><pre style="height:88vh;font-size:4vh;display:flex;align-items:center;"#,
            r#"justify-content:center;text-align:center;color:{}">{}</pre></body></html>"#,
        ),
        color,
        escape(hint)
    )
}

/// A `text/html` response around [`render`].
pub fn respond(status: StatusCode, color: &str, hint: &str) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, HTML_CONTENT_TYPE)],
        render(color, hint),
    )
        .into_response()
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
