use crate::domain::models::{DeviceEvent, EventType, format_timestamp};

const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html>
    <head>
        <meta charset="utf-8">
        <title>Debug Preview</title>
        <style type="text/css">
            * {
                font-family:"Lucida Sans Unicode", "Lucida Grande", sans-serif;
            }
        </style>
    </head>
    <body>
"#;

const PAGE_TAIL: &str = r#"
    </body>
</html>
"#;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventTally {
    pub entries: usize,
    pub exits: usize,
    pub incorrect: usize,
}

pub fn tally(events: &[DeviceEvent]) -> EventTally {
    events
        .iter()
        .fold(EventTally::default(), |mut tally, event| {
            match event.event_type {
                EventType::Entry => tally.entries += 1,
                EventType::Exit => tally.exits += 1,
                EventType::Other(_) => tally.incorrect += 1,
            }
            tally
        })
}

/// Renders the per-device debug listing. `events` must already be ordered
/// newest first.
pub fn render(device_id: i64, events: &[DeviceEvent]) -> String {
    let mut body = String::new();

    if events.is_empty() {
        body.push_str("No results found in query");
    } else {
        let tally = tally(events);
        body.push_str(&format!("<h1>ID Num: {device_id}</h1><br>"));
        body.push_str(&format!("<b>Entry count:</b> {}<br>", tally.entries));
        body.push_str(&format!("<b>Exit count: </b> {}<br>", tally.exits));
        body.push_str("<br><b>Debug for events:</b><br>");

        for event in events {
            body.push_str(&format!(
                "<i>{}</i>&nbsp;&nbsp;'{}'<br>",
                format_timestamp(&event.created_at),
                escape_html(event.event_type.as_str())
            ));
        }
    }

    format!("{PAGE_HEAD}{body}{PAGE_TAIL}")
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
