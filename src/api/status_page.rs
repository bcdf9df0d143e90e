use std::fmt::Write;

use crate::gateway::SessionReport;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const TITLE: &str = "wagate - multi-session messaging gateway";

// -----------------------------------------------------------------------------
// ----- Rendering -------------------------------------------------------------

pub fn render(reports: &[SessionReport], active: usize, port: u16) -> String {
    let mut sessions = String::new();

    if reports.is_empty() {
        sessions.push_str("<p>No active sessions</p>\n");
    } else {
        for report in reports {
            let _ = write!(
                sessions,
                "<div><strong>{}:</strong> {}",
                escape(report.tenant.as_str()),
                report.status
            );
            if let Some(error) = &report.error {
                let _ = write!(sessions, " <em>({})</em>", escape(error));
            }
            sessions.push_str("</div>\n");
        }
    }

    format!(
        "<!DOCTYPE html>
<html>
<head>
    <title>{TITLE}</title>
    <meta charset=\"UTF-8\">
</head>
<body>
    <h1>{TITLE}</h1>
    <h2>Active sessions ({active})</h2>
{sessions}    <p>Port: {port}</p>
</body>
</html>
"
    )
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------
