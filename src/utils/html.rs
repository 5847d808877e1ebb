//! HTML rendering for the webhook viewer page

use crate::services::inbox::WebhookEntry;

/// Secondi tra un refresh e l'altro mentre il risultato non è arrivato
const REFRESH_SECS: u32 = 3;

const STYLE: &str = "body{font-family:system-ui,sans-serif;background:#111827;color:#e5e7eb;padding:2rem;line-height:1.6}\
h1{border-bottom:2px solid #374151;padding-bottom:.5rem}\
.job-id{background:#3b82f6;color:#fff;padding:.2rem .6rem;border-radius:5px;font-family:monospace}\
.entry{background:#1f2937;border:1px solid #374151;border-radius:8px;margin-top:1.5rem}\
.entry-header{background:#374151;padding:.75rem 1rem;font-weight:700}\
pre{background:#0d1117;color:#c9d1d9;padding:1rem;margin:0;white-space:pre-wrap;word-wrap:break-word}\
.waiting{text-align:center;color:#9ca3af;margin-top:3rem}";

/// Escape dei caratteri speciali HTML
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Pagina del viewer: il payload ricevuto oppure un segnaposto che si
/// ricarica da solo finché il webhook non arriva
pub fn render_viewer(job_id: &str, entry: Option<&WebhookEntry>) -> String {
    let job_id = escape_html(job_id);
    let mut html = String::new();

    html.push_str("<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"UTF-8\">");
    if entry.is_none() {
        html.push_str(&format!(
            "<meta http-equiv=\"refresh\" content=\"{}\">",
            REFRESH_SECS
        ));
    }
    html.push_str(&format!(
        "<title>Webhook Viewer - {}</title><style>{}</style></head><body>",
        job_id, STYLE
    ));
    html.push_str(&format!(
        "<h1>Webhook Viewer</h1><p>Job ID: <span class=\"job-id\">{}</span></p>",
        job_id
    ));

    match entry {
        Some(entry) => {
            let pretty = serde_json::to_string_pretty(&entry.payload)
                .unwrap_or_else(|_| entry.payload.to_string());
            html.push_str(&format!(
                "<div class=\"entry\"><div class=\"entry-header\">Ricevuto il: {}</div><pre>{}</pre></div>",
                entry.received_at.format("%Y-%m-%d %H:%M:%S UTC"),
                escape_html(&pretty)
            ));
        }
        None => {
            html.push_str(
                "<div class=\"waiting\"><p>In attesa che il worker completi il job...</p>\
                 <p>La pagina si aggiorna automaticamente.</p></div>",
            );
        }
    }

    html.push_str("</body></html>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#x27;&lt;/a&gt;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_waiting_page_refreshes() {
        let html = render_viewer("abc", None);
        assert!(html.contains("http-equiv=\"refresh\""));
        assert!(html.contains("In attesa"));
        assert!(html.contains("abc"));
    }

    #[test]
    fn test_entry_page_shows_payload() {
        let entry = WebhookEntry {
            job_id: "abc".to_string(),
            payload: json!({"foo": "<bar>"}),
            received_at: chrono::Utc::now(),
        };
        let html = render_viewer("abc", Some(&entry));
        assert!(!html.contains("http-equiv=\"refresh\""));
        assert!(html.contains("&quot;foo&quot;: &quot;&lt;bar&gt;&quot;"));
    }

    #[test]
    fn test_job_id_is_escaped() {
        let html = render_viewer("<script>", None);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }
}
