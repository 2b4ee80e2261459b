//! SSDP renderer discovery
//!
//! Sends one `M-SEARCH` for media renderers, collects unicast replies for a
//! short window, then resolves each reply's description document. Renderer
//! details are cached so later `play` calls know where to send SOAP actions.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use reqwest::Client;
use tokio::net::UdpSocket;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::avtransport;
use super::description::parse_description;
use super::{Discovery, DiscoveryError};
use crate::device::DeviceInfo;

/// SSDP multicast group
pub const SSDP_MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

/// SSDP port
pub const SSDP_PORT: u16 = 1900;

/// Search target for DLNA media renderers
pub const MEDIA_RENDERER_ST: &str = "urn:schemas-upnp-org:device:MediaRenderer:1";

/// SSDP discovery configuration
#[derive(Debug, Clone)]
pub struct SsdpConfig {
    /// Local address to search from (selects the interface)
    pub bind_ip: Ipv4Addr,

    /// Search target (`ST` header)
    pub search_target: String,

    /// Maximum response delay requested from devices (`MX` header)
    pub mx: u8,

    /// How long to collect replies
    pub search_window: Duration,

    /// Timeout for description fetches and SOAP calls
    pub http_timeout: Duration,

    /// Multicast TTL
    pub multicast_ttl: u32,
}

impl Default for SsdpConfig {
    fn default() -> Self {
        Self {
            bind_ip: Ipv4Addr::UNSPECIFIED,
            search_target: MEDIA_RENDERER_ST.into(),
            mx: 2,
            search_window: Duration::from_secs(3),
            http_timeout: Duration::from_secs(5),
            multicast_ttl: 4,
        }
    }
}

impl SsdpConfig {
    /// Search from a specific local address
    pub fn bind_ip(mut self, ip: Ipv4Addr) -> Self {
        self.bind_ip = ip;
        self
    }

    /// Set the reply collection window
    pub fn search_window(mut self, window: Duration) -> Self {
        self.search_window = window;
        self
    }
}

/// A unicast reply to `M-SEARCH`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResponse {
    /// Device identifier (UDN part of the USN)
    pub usn: String,
    /// Description document URL
    pub location: String,
}

/// Build an `M-SEARCH` request
pub fn search_request(search_target: &str, mx: u8) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {}:{}\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: {}\r\n\
         ST: {}\r\n\
         \r\n",
        SSDP_MULTICAST_ADDR, SSDP_PORT, mx, search_target
    )
}

/// Parse a search reply
///
/// Returns None for anything that is not a `200 OK` carrying both `USN` and
/// `LOCATION`. The USN is reduced to its `uuid:` part so that one device
/// replying for several service types is seen once.
pub fn parse_search_response(datagram: &str) -> Option<SearchResponse> {
    let mut lines = datagram.split("\r\n");
    let status = lines.next()?;
    if !status.starts_with("HTTP/1.1 200") && !status.starts_with("HTTP/1.0 200") {
        return None;
    }

    let mut usn = None;
    let mut location = None;

    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();

        if name.eq_ignore_ascii_case("USN") {
            let udn = value.split("::").next().unwrap_or(value);
            usn = Some(udn.to_string());
        } else if name.eq_ignore_ascii_case("LOCATION") {
            location = Some(value.to_string());
        }
    }

    Some(SearchResponse {
        usn: usn.filter(|u| !u.is_empty())?,
        location: location.filter(|l| !l.is_empty())?,
    })
}

#[derive(Debug, Clone)]
struct RendererInfo {
    name: String,
    location: String,
    av_transport_control: Option<String>,
}

/// SSDP/UPnP implementation of [`Discovery`]
pub struct SsdpDiscovery {
    config: SsdpConfig,
    client: Client,
    renderers: RwLock<HashMap<String, RendererInfo>>,
}

impl SsdpDiscovery {
    /// Create a new discovery client
    pub fn new(config: SsdpConfig) -> Result<Self, DiscoveryError> {
        let client = Client::builder().timeout(config.http_timeout).build()?;

        Ok(Self {
            config,
            client,
            renderers: RwLock::new(HashMap::new()),
        })
    }

    /// Get the discovery configuration
    pub fn config(&self) -> &SsdpConfig {
        &self.config
    }

    async fn search(&self) -> Result<Vec<SearchResponse>, DiscoveryError> {
        let socket = UdpSocket::bind(SocketAddrV4::new(self.config.bind_ip, 0)).await?;
        socket.set_multicast_ttl_v4(self.config.multicast_ttl)?;

        let request = search_request(&self.config.search_target, self.config.mx);
        socket
            .send_to(request.as_bytes(), SocketAddrV4::new(SSDP_MULTICAST_ADDR, SSDP_PORT))
            .await?;

        let deadline = Instant::now() + self.config.search_window;
        let mut responses: Vec<SearchResponse> = Vec::new();
        let mut buf = [0u8; 2048];

        loop {
            let received = tokio::time::timeout_at(deadline, socket.recv_from(&mut buf)).await;
            let (len, peer) = match received {
                Ok(Ok(r)) => r,
                Ok(Err(e)) => {
                    tracing::debug!(error = %e, "SSDP receive error");
                    continue;
                }
                Err(_) => break,
            };

            let Some(response) = parse_search_response(&String::from_utf8_lossy(&buf[..len]))
            else {
                tracing::trace!(peer = %peer, "Ignoring SSDP datagram");
                continue;
            };

            if !responses.iter().any(|r| r.usn == response.usn) {
                tracing::debug!(peer = %peer, usn = %response.usn, "Renderer replied");
                responses.push(response);
            }
        }

        Ok(responses)
    }

    async fn describe(&self, response: &SearchResponse) -> Result<RendererInfo, DiscoveryError> {
        let xml = self
            .client
            .get(&response.location)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let desc = parse_description(&xml, &response.location);
        Ok(RendererInfo {
            name: desc.friendly_name.unwrap_or_else(|| response.usn.clone()),
            location: response.location.clone(),
            av_transport_control: desc.av_transport_control,
        })
    }
}

impl Discovery for SsdpDiscovery {
    async fn scan(&self) -> Result<Vec<DeviceInfo>, DiscoveryError> {
        let responses = self.search().await?;
        let known = self.renderers.read().await.clone();

        let mut current = HashMap::with_capacity(responses.len());
        for response in &responses {
            let cached = known
                .get(&response.usn)
                .filter(|info| info.location == response.location)
                .cloned();

            let info = match cached {
                Some(info) => info,
                None => match self.describe(response).await {
                    Ok(info) => info,
                    Err(e) => {
                        tracing::warn!(
                            usn = %response.usn,
                            location = %response.location,
                            error = %e,
                            "Failed to fetch renderer description"
                        );
                        continue;
                    }
                },
            };
            current.insert(response.usn.clone(), info);
        }

        let mut devices: Vec<DeviceInfo> = current
            .iter()
            .map(|(usn, info)| DeviceInfo::new(usn.clone(), info.name.clone()))
            .collect();
        devices.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.usn.cmp(&b.usn)));

        *self.renderers.write().await = current;

        tracing::debug!(count = devices.len(), "SSDP scan complete");
        Ok(devices)
    }

    async fn play(&self, usn: &str, url: &str) -> Result<(), DiscoveryError> {
        let info = self
            .renderers
            .read()
            .await
            .get(usn)
            .cloned()
            .ok_or_else(|| DiscoveryError::UnknownRenderer(usn.to_string()))?;

        let control_url = info
            .av_transport_control
            .ok_or_else(|| DiscoveryError::NoAvTransport(usn.to_string()))?;

        tracing::info!(usn = %usn, name = %info.name, url = %url, "Sending play to renderer");
        avtransport::set_uri_and_play(&self.client, &control_url, url, &info.name).await
    }
}
