//! Session bus client
//!
//! Talks to the bus daemon's own administrative interface
//! (`org.freedesktop.DBus`) to request and release a well-known name and to
//! subscribe to the `NameLost` broadcast. The proxy is declared by hand
//! instead of using pre-baked helpers so the raw reply codes stay visible;
//! the daemon occasionally grows new codes and we want to diagnose those
//! rather than fail to deserialize.

use bitflags::bitflags;
use tracing::info;
use zbus::{Connection, proxy};

use crate::error::BusError;

/// Proxy for the bus daemon's administrative object
#[proxy(
    interface = "org.freedesktop.DBus",
    default_service = "org.freedesktop.DBus",
    default_path = "/org/freedesktop/DBus"
)]
pub trait BusDaemon {
    /// Ask the daemon for ownership of a well-known name
    fn request_name(&self, name: &str, flags: u32) -> zbus::Result<u32>;

    /// Give a previously requested name back to the daemon
    fn release_name(&self, name: &str) -> zbus::Result<u32>;

    /// Emitted (to the losing connection) when a name changes owner
    #[zbus(signal)]
    fn name_lost(&self, name: &str) -> zbus::Result<()>;
}

bitflags! {
    /// Flag word for RequestName, values per the D-Bus specification
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RequestFlags: u32 {
        const ALLOW_REPLACEMENT = 0x1;
        const REPLACE_EXISTING  = 0x2;
        const DO_NOT_QUEUE      = 0x4;
    }
}

/// Reply codes for RequestName
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestReply {
    /// We are now the primary owner of the name
    PrimaryOwner,
    /// Someone else owns it; we are queued behind them
    InQueue,
    /// Someone else owns it and we chose not to queue
    Exists,
    /// We already owned it
    AlreadyOwner,
}

impl RequestReply {
    pub fn from_code(code: u32) -> Result<Self, BusError> {
        match code {
            1 => Ok(Self::PrimaryOwner),
            2 => Ok(Self::InQueue),
            3 => Ok(Self::Exists),
            4 => Ok(Self::AlreadyOwner),
            other => Err(BusError::UnknownReplyCode(other)),
        }
    }
}

/// Reply codes for ReleaseName
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseReply {
    /// The name was released
    Released,
    /// Nobody owns that name on this bus
    NonExistent,
    /// The name exists but this connection does not own it
    NotOwner,
}

impl ReleaseReply {
    pub fn from_code(code: u32) -> Result<Self, BusError> {
        match code {
            1 => Ok(Self::Released),
            2 => Ok(Self::NonExistent),
            3 => Ok(Self::NotOwner),
            other => Err(BusError::UnknownReplyCode(other)),
        }
    }
}

pub struct BusClient {
    conn: Connection,
    daemon: BusDaemonProxy<'static>,
}

impl BusClient {
    /// Connect to the session bus and bind the daemon proxy
    pub async fn connect() -> Result<Self, BusError> {
        let conn = Connection::session().await.map_err(BusError::Connection)?;
        let daemon = BusDaemonProxy::new(&conn)
            .await
            .map_err(BusError::Connection)?;

        info!(
            "Connected to the session bus as {:?}",
            conn.unique_name().map(|n| n.as_str())
        );

        Ok(Self { conn, daemon })
    }

    /// Our private connection identifier on the bus, if assigned yet
    pub fn unique_name(&self) -> Option<&str> {
        self.conn.unique_name().map(|n| n.as_str())
    }

    /// Request ownership of `name`
    pub async fn request_name(
        &self,
        name: &str,
        flags: RequestFlags,
    ) -> Result<RequestReply, BusError> {
        let code = self
            .daemon
            .request_name(name, flags.bits())
            .await
            .map_err(|source| BusError::NameRequest {
                name: name.to_owned(),
                source,
            })?;
        RequestReply::from_code(code)
    }

    /// Release ownership of `name`
    pub async fn release_name(&self, name: &str) -> Result<ReleaseReply, BusError> {
        let code = self
            .daemon
            .release_name(name)
            .await
            .map_err(|source| BusError::Release {
                name: name.to_owned(),
                source,
            })?;
        ReleaseReply::from_code(code)
    }

    /// Stream of NameLost broadcasts from the daemon
    ///
    /// Subscribe before requesting the name, so the loss broadcast cannot
    /// race the subscription.
    pub async fn name_lost_signals(&self) -> Result<NameLostStream, BusError> {
        self.daemon
            .receive_name_lost()
            .await
            .map_err(BusError::Connection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_reply_codes() {
        assert_eq!(RequestReply::from_code(1).unwrap(), RequestReply::PrimaryOwner);
        assert_eq!(RequestReply::from_code(2).unwrap(), RequestReply::InQueue);
        assert_eq!(RequestReply::from_code(3).unwrap(), RequestReply::Exists);
        assert_eq!(RequestReply::from_code(4).unwrap(), RequestReply::AlreadyOwner);
    }

    #[test]
    fn test_release_reply_codes() {
        assert_eq!(ReleaseReply::from_code(1).unwrap(), ReleaseReply::Released);
        assert_eq!(ReleaseReply::from_code(2).unwrap(), ReleaseReply::NonExistent);
        assert_eq!(ReleaseReply::from_code(3).unwrap(), ReleaseReply::NotOwner);
    }

    #[test]
    fn test_unknown_reply_codes_are_diagnosed() {
        match RequestReply::from_code(0) {
            Err(BusError::UnknownReplyCode(0)) => {}
            other => panic!("expected UnknownReplyCode(0), got {:?}", other),
        }
        match ReleaseReply::from_code(9) {
            Err(BusError::UnknownReplyCode(9)) => {}
            other => panic!("expected UnknownReplyCode(9), got {:?}", other),
        }
    }

    #[test]
    fn test_request_flag_values_match_the_bus_spec() {
        assert_eq!(RequestFlags::ALLOW_REPLACEMENT.bits(), 0x1);
        assert_eq!(
            (RequestFlags::ALLOW_REPLACEMENT | RequestFlags::DO_NOT_QUEUE).bits(),
            0x5
        );
    }
}
