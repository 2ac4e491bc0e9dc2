//! Timed-text transcripts.
//!
//! The timed-text endpoint answers with XML of the form
//! `<transcript><text start=".." dur="..">words</text>…</transcript>`;
//! an empty body means no captions exist for the requested language.

use quick_xml::escape::unescape;
use quick_xml::events::Event;
use quick_xml::Reader;

/// Join the caption segments with single spaces. `None` when the document
/// holds no text.
pub fn parse_timedtext(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    let mut segments = Vec::new();
    let mut current: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"text" => {
                current = Some(String::new());
            }
            Ok(Event::Text(t)) => {
                if let Some(buf) = current.as_mut() {
                    match t.unescape() {
                        Ok(s) => buf.push_str(&s),
                        Err(_) => buf.push_str(&String::from_utf8_lossy(&t)),
                    }
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"text" => {
                if let Some(raw) = current.take() {
                    // Captions are escaped twice (`&amp;#39;`).
                    let text = match unescape(&raw) {
                        Ok(s) => s.into_owned(),
                        Err(_) => raw,
                    };
                    let joined = text.split_whitespace().collect::<Vec<_>>().join(" ");
                    if !joined.is_empty() {
                        segments.push(joined);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::debug!(error = %e, "timed-text XML malformed; keeping what parsed");
                break;
            }
            _ => {}
        }
    }

    (!segments.is_empty()).then(|| segments.join(" "))
}
