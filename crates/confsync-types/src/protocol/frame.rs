use serde::{Deserialize, Serialize};

use crate::error::{FrameError, Result};
use crate::models::{ActionKind, ConfigItem};

/// Keep-alive text frame sent on every heartbeat tick.
pub const HEARTBEAT_FRAME: &str = "ping";

const NOOP_FRAME: &str = "0";
const VERSION_PREFIX: &str = "V:";

/// A classified inbound push frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushFrame {
    /// Empty frame or the no-op sentinel
    Ignored,
    /// Server's fingerprint of the current configuration set
    VersionNotice(String),
    Delta(DeltaAction),
}

impl PushFrame {
    pub fn parse(text: &str) -> Result<Self> {
        if text.is_empty() || text == NOOP_FRAME {
            return Ok(PushFrame::Ignored);
        }
        if let Some(fingerprint) = text.strip_prefix(VERSION_PREFIX) {
            return Ok(PushFrame::VersionNotice(fingerprint.to_string()));
        }

        let wire: WireAction =
            serde_json::from_str(text).map_err(|e| FrameError::from_json_error(&e))?;
        DeltaAction::from_wire(wire).map(PushFrame::Delta)
    }
}

/// An incremental instruction delivered over the push channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaAction {
    pub action: ActionKind,
    /// New item (Add/Update) or the item to drop (Remove)
    pub item: Option<ConfigItem>,
    /// Item being replaced by an Update
    pub old_item: Option<ConfigItem>,
}

impl DeltaAction {
    pub fn add(item: ConfigItem) -> Self {
        Self { action: ActionKind::Add, item: Some(item), old_item: None }
    }

    pub fn update(old_item: Option<ConfigItem>, item: ConfigItem) -> Self {
        Self { action: ActionKind::Update, item: Some(item), old_item }
    }

    pub fn remove(item: ConfigItem) -> Self {
        Self { action: ActionKind::Remove, item: Some(item), old_item: None }
    }

    pub fn command(action: ActionKind) -> Self {
        Self { action, item: None, old_item: None }
    }

    /// Render the frame text the service would send for this action.
    pub fn encode(&self) -> String {
        let wire = WireAction {
            action: self.action.as_str().to_string(),
            item: self.item.clone(),
            old_item: self.old_item.clone(),
        };
        serde_json::to_string(&wire).unwrap_or_default()
    }

    fn from_wire(wire: WireAction) -> Result<Self> {
        let action: ActionKind = wire.action.parse()?;
        let needs_item = matches!(action, ActionKind::Add | ActionKind::Update | ActionKind::Remove);
        if needs_item && wire.item.is_none() {
            return Err(FrameError::MissingItem { action: wire.action });
        }
        Ok(Self { action, item: wire.item, old_item: wire.old_item })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireAction {
    #[serde(rename = "Action", alias = "action")]
    action: String,
    #[serde(rename = "Item", alias = "item", default)]
    item: Option<ConfigItem>,
    #[serde(rename = "OldItem", alias = "oldItem", alias = "old_item", default)]
    old_item: Option<ConfigItem>,
}
