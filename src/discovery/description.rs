//! UPnP device description scraping
//!
//! Only three values are needed from a renderer's description document: its
//! friendly name, its UDN and the control URL of its AVTransport service.
//! Descriptions are small and regular, so plain tag scanning is enough.

use reqwest::Url;

/// Service type prefix of AVTransport
const AV_TRANSPORT_TYPE: &str = "urn:schemas-upnp-org:service:AVTransport:";

/// Values extracted from a device description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescription {
    /// `<friendlyName>`
    pub friendly_name: Option<String>,
    /// `<UDN>`
    pub udn: Option<String>,
    /// Absolute AVTransport control URL
    pub av_transport_control: Option<String>,
}

/// Parse a description document fetched from `location`
pub fn parse_description(xml: &str, location: &str) -> DeviceDescription {
    let base = tag_text(xml, "URLBase")
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .unwrap_or(location);

    let av_transport_control = blocks(xml, "service")
        .find(|service| {
            tag_text(service, "serviceType")
                .map(|t| t.trim().starts_with(AV_TRANSPORT_TYPE))
                .unwrap_or(false)
        })
        .and_then(|service| tag_text(service, "controlURL"))
        .and_then(|control| resolve_url(base, control.trim()));

    DeviceDescription {
        friendly_name: tag_text(xml, "friendlyName").map(|n| unescape(n.trim())),
        udn: tag_text(xml, "UDN").map(|u| u.trim().to_string()),
        av_transport_control,
    }
}

/// Text of the first `<tag>…</tag>` element
fn tag_text<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);

    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)? + start;
    Some(&xml[start..end])
}

/// Iterate over the contents of every `<tag>…</tag>` element
fn blocks<'a>(xml: &'a str, tag: &str) -> impl Iterator<Item = &'a str> + 'a {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let mut rest = xml;

    std::iter::from_fn(move || {
        let start = rest.find(&open)? + open.len();
        let end = rest[start..].find(&close)? + start;
        let block = &rest[start..end];
        rest = &rest[end + close.len()..];
        Some(block)
    })
}

fn resolve_url(base: &str, relative: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    base.join(relative).ok().map(|url| url.to_string())
}

/// Undo the five predefined XML entities
pub fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Escape text for inclusion in XML
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
