//! AVTransport control
//!
//! Minimal SOAP client for the two actions needed to start a renderer:
//! `SetAVTransportURI` followed by `Play`.

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

use super::description::escape;
use super::DiscoveryError;
use crate::endpoint::live::protocol_info;

/// AVTransport service type
pub const AV_TRANSPORT_URN: &str = "urn:schemas-upnp-org:service:AVTransport:1";

/// Build a SOAP envelope for an AVTransport action
///
/// Argument values are escaped.
pub fn soap_envelope(action: &str, args: &[(&str, &str)]) -> String {
    let mut body = String::new();
    for (name, value) in args {
        body.push_str(&format!("<{name}>{}</{name}>", escape(value)));
    }

    format!(
        concat!(
            r#"<?xml version="1.0" encoding="utf-8"?>"#,
            r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" "#,
            r#"s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">"#,
            r#"<s:Body><u:{action} xmlns:u="{urn}">{body}</u:{action}></s:Body>"#,
            r#"</s:Envelope>"#
        ),
        action = action,
        urn = AV_TRANSPORT_URN,
        body = body
    )
}

/// DIDL-Lite metadata describing a live video item
pub fn didl_metadata(url: &str, title: &str) -> String {
    format!(
        concat!(
            r#"<DIDL-Lite xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/" "#,
            r#"xmlns:dc="http://purl.org/dc/elements/1.1/" "#,
            r#"xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/">"#,
            r#"<item id="0" parentID="-1" restricted="1">"#,
            r#"<dc:title>{title}</dc:title>"#,
            r#"<upnp:class>object.item.videoItem</upnp:class>"#,
            r#"<res protocolInfo="{info}">{url}</res>"#,
            r#"</item></DIDL-Lite>"#
        ),
        title = escape(title),
        info = escape(&protocol_info()),
        url = escape(url)
    )
}

/// Invoke one AVTransport action
pub async fn invoke(
    client: &Client,
    control_url: &str,
    action: &str,
    args: &[(&str, &str)],
) -> Result<(), DiscoveryError> {
    let response = client
        .post(control_url)
        .header(CONTENT_TYPE, r#"text/xml; charset="utf-8""#)
        .header("SOAPACTION", format!("\"{}#{}\"", AV_TRANSPORT_URN, action))
        .body(soap_envelope(action, args))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(DiscoveryError::ActionFailed {
            action: action.to_string(),
            status: status.as_u16(),
        });
    }

    tracing::debug!(control_url = %control_url, action = %action, "AVTransport action done");
    Ok(())
}

/// Point a renderer at `url` and start playback
pub async fn set_uri_and_play(
    client: &Client,
    control_url: &str,
    url: &str,
    title: &str,
) -> Result<(), DiscoveryError> {
    let metadata = didl_metadata(url, title);

    invoke(
        client,
        control_url,
        "SetAVTransportURI",
        &[
            ("InstanceID", "0"),
            ("CurrentURI", url),
            ("CurrentURIMetaData", metadata.as_str()),
        ],
    )
    .await?;

    invoke(client, control_url, "Play", &[("InstanceID", "0"), ("Speed", "1")]).await
}
