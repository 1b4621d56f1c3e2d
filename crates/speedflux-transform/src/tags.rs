//! Tag catalogs and the policy that selects from them.

use speedflux_core::{Settings, Tags};
use speedflux_probe::BandwidthPayload;

/// Selection entry meaning "every tag in the catalog".
pub const WILDCARD: &str = "*";

/// Which catalog tags get attached to a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagPolicy {
    namespace: Option<String>,
    selection: Option<Vec<String>>,
}

impl TagPolicy {
    pub fn new(namespace: Option<&str>, selection: Option<&[String]>) -> Self {
        Self {
            namespace: namespace.filter(|ns| !ns.is_empty()).map(str::to_string),
            selection: selection.map(|s| s.iter().map(|t| t.trim().to_string()).collect()),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.namespace(), settings.tags.as_deref())
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Pick tags out of `catalog`.
    ///
    /// - no selection: only `namespace`, when one is configured
    /// - selection containing `*`: the whole catalog
    /// - otherwise: `namespace` plus every selected name the catalog has;
    ///   unknown names are dropped
    pub fn resolve(&self, catalog: &Tags) -> Tags {
        let mut resolved = Tags::new();

        if let Some(selection) = &self.selection {
            if selection.iter().any(|t| t == WILDCARD) {
                return catalog.clone();
            }
            for name in selection {
                if let Some(value) = catalog.get(name) {
                    resolved.insert(name.clone(), value.clone());
                }
            }
        }

        if self.namespace.is_some() {
            if let Some(value) = catalog.get("namespace") {
                resolved.insert("namespace".to_string(), value.clone());
            }
        }

        resolved
    }
}

/// Every tag a bandwidth batch can carry.
pub fn bandwidth_catalog(payload: &BandwidthPayload, namespace: Option<&str>) -> Tags {
    let interface = &payload.interface;
    let server = &payload.server;

    let mut catalog = Tags::new();
    if let Some(ns) = namespace.filter(|ns| !ns.is_empty()) {
        catalog.insert("namespace".to_string(), ns.to_string());
    }
    let entries = [
        ("isp", payload.isp.clone()),
        ("interface", interface.name.clone()),
        ("internal_ip", interface.internal_ip.clone()),
        ("interface_mac", interface.mac_addr.clone()),
        ("vpn_enabled", interface.is_vpn.to_string()),
        ("external_ip", interface.external_ip.clone()),
        ("server_id", server.id.to_string()),
        ("server_name", server.name.clone()),
        ("server_location", server.location.clone()),
        ("server_country", server.country.clone()),
        ("server_host", server.host.clone()),
        ("server_port", server.port.to_string()),
        ("server_ip", server.ip.clone()),
        ("speedtest_id", payload.result.id.clone()),
        ("speedtest_url", payload.result.url.clone()),
    ];
    catalog.extend(entries.into_iter().map(|(k, v)| (k.to_string(), v)));
    catalog
}

/// The reduced catalog for a latency record.
pub fn latency_catalog(target: &str, namespace: Option<&str>) -> Tags {
    let mut catalog = Tags::new();
    catalog.insert("target".to_string(), target.to_string());
    if let Some(ns) = namespace.filter(|ns| !ns.is_empty()) {
        catalog.insert("namespace".to_string(), ns.to_string());
    }
    catalog
}
