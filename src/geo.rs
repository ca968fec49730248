// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! IP geolocation for session metadata and login notices.
//!
//! Lookups are best-effort: private addresses short-circuit, and any
//! transport or decoding failure falls back to [`GeoLocation::unknown`].

use std::net::IpAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GeoLocation {
    pub city: String,
    pub region: String,
    pub country: String,
    pub timezone: String,
}

impl GeoLocation {
    pub fn unknown() -> Self {
        Self {
            city: "Unknown".to_string(),
            region: "Unknown".to_string(),
            country: "Unknown".to_string(),
            timezone: "UTC".to_string(),
        }
    }
}

/// Subset of the ipwho.is response we read.
#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    success: bool,
    city: Option<String>,
    region: Option<String>,
    country: Option<String>,
    timezone: Option<LookupTimezone>,
}

#[derive(Debug, Deserialize)]
struct LookupTimezone {
    id: Option<String>,
}

impl From<LookupResponse> for GeoLocation {
    fn from(resp: LookupResponse) -> Self {
        let fallback = GeoLocation::unknown();
        Self {
            city: resp.city.unwrap_or(fallback.city),
            region: resp.region.unwrap_or(fallback.region),
            country: resp.country.unwrap_or(fallback.country),
            timezone: resp.timezone.and_then(|tz| tz.id).unwrap_or(fallback.timezone),
        }
    }
}

#[derive(Clone)]
pub struct GeoLocator {
    client: reqwest::Client,
    base_url: String,
}

impl GeoLocator {
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(LOOKUP_TIMEOUT).build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Resolve an address. Never fails.
    pub async fn locate(&self, ip: Option<IpAddr>) -> GeoLocation {
        let Some(ip) = ip.filter(|ip| !is_non_routable(ip)) else {
            return GeoLocation::unknown();
        };

        match self.fetch(ip).await {
            Ok(location) => location,
            Err(e) => {
                tracing::warn!(%ip, error = %e, "Geolocation lookup failed, using fallback");
                GeoLocation::unknown()
            }
        }
    }

    async fn fetch(&self, ip: IpAddr) -> Result<GeoLocation, reqwest::Error> {
        let resp: LookupResponse = self
            .client
            .get(format!("{}/{ip}", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !resp.success {
            return Ok(GeoLocation::unknown());
        }
        Ok(resp.into())
    }
}

/// Loopback, private, link-local, and unspecified addresses.
pub fn is_non_routable(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            let unique_local = (v6.segments()[0] & 0xfe00) == 0xfc00;
            let link_local = (v6.segments()[0] & 0xffc0) == 0xfe80;
            v6.is_loopback() || v6.is_unspecified() || unique_local || link_local
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_ranges_are_non_routable() {
        for ip in ["127.0.0.1", "10.1.2.3", "192.168.0.10", "172.16.5.4", "::1", "fd00::1", "fe80::1"] {
            assert!(is_non_routable(&ip.parse().unwrap()), "{ip}");
        }
        assert!(!is_non_routable(&"8.8.8.8".parse().unwrap()));
    }

    #[tokio::test]
    async fn private_ip_short_circuits_to_unknown() {
        // Unroutable base URL: a network call would fail, not hang
        let locator = GeoLocator::new("http://127.0.0.1:9").unwrap();
        let location = locator.locate(Some("192.168.1.1".parse().unwrap())).await;
        assert_eq!(location, GeoLocation::unknown());
        assert_eq!(locator.locate(None).await.timezone, "UTC");
    }

    #[test]
    fn response_maps_with_partial_fallback() {
        let resp: LookupResponse = serde_json::from_str(
            r#"{"success":true,"city":"Lagos","country":"Nigeria","timezone":{"id":"Africa/Lagos"}}"#,
        )
        .unwrap();
        let location = GeoLocation::from(resp);
        assert_eq!(location.city, "Lagos");
        assert_eq!(location.region, "Unknown");
        assert_eq!(location.timezone, "Africa/Lagos");
    }
}
