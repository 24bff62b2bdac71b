//! Channel identity.
//!
//! A channel is one physical radio endpoint. The deployment this crate was
//! written for has two (`coordinator` and `enddevice`), but any number of
//! distinct ids may be fed to a pipeline.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Well-known id of the coordinator endpoint.
pub const COORDINATOR: &str = "coordinator";
/// Well-known id of the end-device endpoint.
pub const END_DEVICE: &str = "enddevice";

/// Identity of the endpoint a line was read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(CompactString);

impl ChannelId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(CompactString::new(id.as_ref()))
    }

    pub fn coordinator() -> Self {
        Self::new(COORDINATOR)
    }

    pub fn end_device() -> Self {
        Self::new(END_DEVICE)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ChannelId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ChannelId {
    fn from(id: String) -> Self {
        Self(CompactString::from(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_ids() {
        assert_eq!(ChannelId::coordinator().as_str(), "coordinator");
        assert_eq!(ChannelId::end_device().to_string(), "enddevice");
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&ChannelId::from("node-3")).unwrap();
        assert_eq!(json, "\"node-3\"");
        let back: ChannelId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ChannelId::new("node-3"));
    }
}
