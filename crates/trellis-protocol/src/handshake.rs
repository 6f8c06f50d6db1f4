//! Handshake-derived peer properties and their local checks.
//!
//! The transport performs the physical handshake; the core consumes the
//! resulting properties and enforces version compatibility, clock skew, and
//! serialize-format agreement before a peer client goes live.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ProtocolError, Result};

/// The serialize format this crate implements (bincode bodies).
pub const SERIALIZE_FORMAT_BINCODE: u16 = 0;

/// A peer version: `major.minor.patch`, each 16 bits (6 bytes on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Version {
    /// Incompatible-change counter.
    pub major: u16,
    /// Compatible-addition counter.
    pub minor: u16,
    /// Fix counter, ignored in compatibility checks.
    pub patch: u16,
}

impl Version {
    /// Construct a version triple.
    #[must_use]
    pub fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse the 6-byte wire form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 6 {
            return Err(ProtocolError::Malformed(
                "version must be 6 bytes".to_string(),
            ));
        }
        Ok(Self {
            major: u16::from_be_bytes([bytes[0], bytes[1]]),
            minor: u16::from_be_bytes([bytes[2], bytes[3]]),
            patch: u16::from_be_bytes([bytes[4], bytes[5]]),
        })
    }

    /// The 6-byte wire form.
    #[must_use]
    pub fn to_bytes(self) -> [u8; 6] {
        let mut bytes = [0u8; 6];
        bytes[..2].copy_from_slice(&self.major.to_be_bytes());
        bytes[2..4].copy_from_slice(&self.minor.to_be_bytes());
        bytes[4..].copy_from_slice(&self.patch.to_be_bytes());
        bytes
    }

    /// Whether a remote at this version satisfies a local minimum in
    /// `major.minor` (patch is ignored).
    #[must_use]
    pub fn satisfies(self, local: Version) -> bool {
        (self.major, self.minor) >= (local.major, local.minor)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Properties of a handshaked remote peer, as handed over by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerProps {
    /// Remote protocol version.
    pub version: Version,
    /// Serialize format the remote proposes.
    pub serialize_format: u16,
    /// Remote wall clock in milliseconds, sampled at handshake.
    pub clock: u64,
    /// The key that performed the handshake.
    #[serde(with = "serde_bytes")]
    pub handshaked_public_key: Vec<u8>,
    /// Packed auth cert presented by the remote, if any.
    pub auth_cert: Option<serde_bytes::ByteBuf>,
    /// Key the auth cert authorizes (its owner).
    pub auth_cert_public_key: Option<serde_bytes::ByteBuf>,
    /// Remote application version string.
    pub app_version: Option<String>,
    /// Region the remote declares.
    pub region: Option<String>,
    /// Jurisdiction the remote declares.
    pub jurisdiction: Option<String>,
}

impl PeerProps {
    /// The key requests are attributed to: the auth cert's key when
    /// present, else the handshaked key.
    #[must_use]
    pub fn effective_public_key(&self) -> &[u8] {
        match &self.auth_cert_public_key {
            Some(key) => key,
            None => &self.handshaked_public_key,
        }
    }

    /// Enforce the local side's handshake requirements.
    ///
    /// - remote version at least the local one in `major.minor`
    /// - clock skew within `max_clock_skew` milliseconds when configured
    /// - the proposed serialize format among the supported ones
    pub fn validate_against(
        &self,
        local_version: Version,
        local_clock: u64,
        max_clock_skew: Option<u64>,
        supported_formats: &[u16],
    ) -> Result<()> {
        if !self.version.satisfies(local_version) {
            return Err(ProtocolError::Malformed(format!(
                "remote version {} below local {local_version}",
                self.version
            )));
        }
        if let Some(max_skew) = max_clock_skew {
            let skew = local_clock.abs_diff(self.clock);
            if skew > max_skew {
                return Err(ProtocolError::Malformed(format!(
                    "clock skew {skew} ms exceeds {max_skew} ms"
                )));
            }
        }
        if !supported_formats.contains(&self.serialize_format) {
            return Err(ProtocolError::Malformed(format!(
                "serialize format {} not supported",
                self.serialize_format
            )));
        }
        Ok(())
    }
}
