//! Status documents

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use super::channel::ChannelId;

/// Snapshot of a running relay instance
///
/// Serialized as `{"channelId", "port", "receiving", "consumerCount"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayStatus {
    pub channel_id: ChannelId,
    pub port: u16,
    pub receiving: bool,
    pub consumer_count: usize,
}

/// Registry answer to a status query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelStatus {
    Running(RelayStatus),
    /// No relay registered for the channel
    NotRunning,
}

impl ChannelStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, ChannelStatus::Running(_))
    }

    pub fn as_running(&self) -> Option<&RelayStatus> {
        match self {
            ChannelStatus::Running(status) => Some(status),
            ChannelStatus::NotRunning => None,
        }
    }
}

impl Serialize for ChannelStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ChannelStatus::Running(status) => status.serialize(serializer),
            ChannelStatus::NotRunning => {
                let mut state = serializer.serialize_struct("NotRunning", 1)?;
                state.serialize_field("running", &false)?;
                state.end()
            }
        }
    }
}
