//! Channel references and ISO-8601 durations.

use std::sync::OnceLock;

use regex::Regex;
use tc_domain::error::{Error, Result};

/// How a channel was named by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRef {
    /// `@handle`, stored without the `@`.
    Handle(String),
    /// `UC…` channel id.
    Id(String),
}

impl std::fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelRef::Handle(h) => write!(f, "@{h}"),
            ChannelRef::Id(id) => f.write_str(id),
        }
    }
}

pub const INVALID_CHANNEL: &str =
    "Invalid channel URL. Use format: https://www.youtube.com/@handle or https://www.youtube.com/channel/UC...";

fn handle_url() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"youtube\.com/@([A-Za-z0-9_.-]+)").expect("valid regex"))
}

fn id_url() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"youtube\.com/channel/(UC[\w-]+)").expect("valid regex"))
}

fn bare() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(@)?([A-Za-z0-9_.-]{3,})$").expect("valid regex"))
}

/// Accepts `youtube.com/@handle`, `youtube.com/channel/UC…`, `@handle`,
/// a bare `UC…` id (24 chars) or a bare handle.
pub fn parse_channel_ref(input: &str) -> Result<ChannelRef> {
    let input = input.trim();
    if let Some(c) = handle_url().captures(input) {
        return Ok(ChannelRef::Handle(c[1].to_string()));
    }
    if let Some(c) = id_url().captures(input) {
        return Ok(ChannelRef::Id(c[1].to_string()));
    }
    if let Some(c) = bare().captures(input) {
        let name = &c[2];
        if c.get(1).is_none() && name.starts_with("UC") && name.len() == 24 {
            return Ok(ChannelRef::Id(name.to_string()));
        }
        return Ok(ChannelRef::Handle(name.to_string()));
    }
    Err(Error::Validation(INVALID_CHANNEL.into()))
}

fn iso_duration() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$").expect("valid regex")
    })
}

/// `PT1H2M3S` → 3723 seconds. Unparseable input yields `None`.
pub fn parse_duration(iso: &str) -> Option<u64> {
    let c = iso_duration().captures(iso.trim())?;
    let part = |i: usize| -> u64 {
        c.get(i)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };
    Some(part(1) * 86_400 + part(2) * 3_600 + part(3) * 60 + part(4))
}
