pub mod client;
pub mod error;
pub mod types;

pub use client::NetBirdClient;
pub use error::ApiError;
pub use types::{
    DnsSettings, DnsSettingsItems, Group, GroupRef, GroupResource, Nameserver, NameserverGroup,
    Network, Peer, User, UserPermissions,
};
