use serde::{Deserialize, Serialize};

/// Response body of `GET /{ip}`.
///
/// Only the fields the prefilter decision needs are typed. The full body is
/// kept alongside as raw JSON by [`crate::IpDataLookup`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IpDataResponse {
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub carrier: Option<Carrier>,
    #[serde(default)]
    pub threat: Threat,
}

/// Mobile carrier info. Present only for IPs owned by a mobile network.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Carrier {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mcc: String,
    #[serde(default)]
    pub mnc: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Threat {
    #[serde(default)]
    pub is_tor: bool,
    #[serde(default)]
    pub is_icloud_relay: bool,
    #[serde(default)]
    pub is_proxy: bool,
    #[serde(default)]
    pub is_datacenter: bool,
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default)]
    pub is_known_attacker: bool,
    #[serde(default)]
    pub is_known_abuser: bool,
    #[serde(default)]
    pub is_threat: bool,
    #[serde(default)]
    pub is_bogon: bool,
}

impl Threat {
    /// True if any threat flag is raised.
    pub fn any(&self) -> bool {
        self.is_tor
            || self.is_icloud_relay
            || self.is_proxy
            || self.is_datacenter
            || self.is_anonymous
            || self.is_known_attacker
            || self.is_known_abuser
            || self.is_threat
            || self.is_bogon
    }
}

impl IpDataResponse {
    /// Whether a visitor from this IP is worth sending to company identification.
    ///
    /// Rejects empty lookups, mobile carrier IPs, and anything with a threat flag.
    pub fn should_identify(&self) -> bool {
        if self.ip.is_empty() {
            return false;
        }
        if self.carrier.is_some() {
            return false;
        }
        !self.threat.any()
    }
}
