use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A NetBird peer as returned by `GET /api/peers`.
///
/// Fields the API omits decode to their zero values; `last_seen` stays
/// `None` when absent so callers can skip the timestamp metric instead of
/// publishing the epoch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Peer {
    pub id: String,
    pub name: String,
    pub ip: String,
    pub connected: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub os: String,
    pub version: String,
    pub groups: Vec<GroupRef>,
    pub ssh_enabled: bool,
    pub hostname: String,
    pub dns_label: String,
    pub login_expired: bool,
    pub approval_required: bool,
    pub country_code: String,
    pub city_name: String,
    pub accessible_peers_count: i64,
}

/// Minimal group reference embedded in peer records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupRef {
    pub id: String,
    pub name: String,
}

/// A resource attached to a group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupResource {
    pub id: String,
    #[serde(rename = "type")]
    pub resource_type: String,
}

/// A NetBird group as returned by `GET /api/groups`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub peers_count: i64,
    pub resources_count: i64,
    pub issued: String,
    pub resources: Vec<GroupResource>,
}

/// A NetBird user account as returned by `GET /api/users`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
    pub status: String,
    pub last_login: Option<DateTime<Utc>>,
    pub auto_groups: Vec<String>,
    pub is_service_user: bool,
    pub is_blocked: bool,
    pub issued: String,
    pub permissions: UserPermissions,
}

/// Per-user permission map: module name -> action -> allowed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPermissions {
    pub is_restricted: bool,
    pub modules: HashMap<String, HashMap<String, bool>>,
}

/// A single nameserver entry inside a nameserver group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Nameserver {
    pub ip: String,
    pub ns_type: String,
    pub port: u16,
}

/// A DNS resolver policy unit as returned by `GET /api/dns/nameservers`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NameserverGroup {
    pub id: String,
    pub name: String,
    pub description: String,
    pub nameservers: Vec<Nameserver>,
    pub enabled: bool,
    pub primary: bool,
    pub groups: Vec<String>,
    pub domains: Vec<String>,
}

/// Account-wide DNS settings from `GET /api/dns/settings`. The API nests
/// the payload under an `items` wrapper.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsSettings {
    pub items: DnsSettingsItems,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsSettingsItems {
    pub disabled_management_groups: Vec<String>,
}

/// A routed network segment as returned by `GET /api/networks`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Network {
    pub id: String,
    pub name: String,
    pub description: String,
    pub routers: Vec<String>,
    pub resources: Vec<String>,
    pub policies: Vec<String>,
    pub routing_peers_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_missing_peer_fields_when_deserializing() {
        let peer: Peer = serde_json::from_value(serde_json::json!({
            "id": "peer-1",
            "name": "office-gw"
        }))
        .expect("peer should parse");

        assert_eq!(peer.id, "peer-1");
        assert_eq!(peer.name, "office-gw");
        assert!(!peer.connected);
        assert!(peer.last_seen.is_none());
        assert!(peer.groups.is_empty());
        assert_eq!(peer.accessible_peers_count, 0);
    }

    #[test]
    fn should_parse_full_peer_record() {
        let peer: Peer = serde_json::from_value(serde_json::json!({
            "id": "peer-1",
            "name": "office-gw",
            "ip": "100.64.0.1",
            "connected": true,
            "last_seen": "2024-05-01T10:30:00Z",
            "os": "linux",
            "groups": [{"id": "g1", "name": "all"}],
            "ssh_enabled": true,
            "hostname": "office-gw.local",
            "login_expired": false,
            "approval_required": false,
            "country_code": "DE",
            "city_name": "Berlin",
            "accessible_peers_count": 12
        }))
        .expect("peer should parse");

        assert!(peer.connected);
        assert_eq!(peer.groups.len(), 1);
        assert_eq!(peer.groups[0].name, "all");
        assert_eq!(peer.country_code, "DE");
        let last_seen = peer.last_seen.expect("last_seen present");
        assert_eq!(last_seen.timestamp(), 1_714_559_400);
    }

    #[test]
    fn should_rename_resource_type_field() {
        let group: Group = serde_json::from_value(serde_json::json!({
            "id": "g1",
            "name": "servers",
            "peers_count": 3,
            "resources_count": 2,
            "issued": "api",
            "resources": [
                {"id": "r1", "type": "host"},
                {"id": "r2", "type": "subnet"}
            ]
        }))
        .expect("group should parse");

        assert_eq!(group.resources[0].resource_type, "host");
        assert_eq!(group.resources[1].resource_type, "subnet");
    }

    #[test]
    fn should_parse_nested_user_permission_modules() {
        let user: User = serde_json::from_value(serde_json::json!({
            "id": "u1",
            "email": "ops@example.com",
            "role": "admin",
            "status": "active",
            "permissions": {
                "is_restricted": false,
                "modules": {
                    "peers": {"read": true, "write": false}
                }
            }
        }))
        .expect("user should parse");

        let peers_module = user
            .permissions
            .modules
            .get("peers")
            .expect("peers module present");
        assert_eq!(peers_module.get("read"), Some(&true));
        assert_eq!(peers_module.get("write"), Some(&false));
    }

    #[test]
    fn should_unwrap_dns_settings_items_envelope() {
        let settings: DnsSettings = serde_json::from_value(serde_json::json!({
            "items": {"disabled_management_groups": ["g1", "g2"]}
        }))
        .expect("settings should parse");

        assert_eq!(settings.items.disabled_management_groups.len(), 2);
    }

    #[test]
    fn should_default_empty_dns_settings() {
        let settings: DnsSettings =
            serde_json::from_value(serde_json::json!({})).expect("settings should parse");
        assert!(settings.items.disabled_management_groups.is_empty());
    }
}
