//! Channels and their last-context cache.

use super::{ChannelId, Context};
use crate::apps::domain::{FDC3_TOPIC_ROOT, InstanceId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

const PRIVATE_CHANNEL_MEMBERS: usize = 2;

/// Kind of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChannelKind {
    /// One of the fixed, configured user channels.
    User,
    /// A named channel created on demand.
    App,
    /// An unlisted channel shared by two instances.
    Private,
}

impl ChannelKind {
    /// Returns the canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::App => "app",
            Self::Private => "private",
        }
    }

    /// Returns the topic segment used for this kind of channel.
    #[must_use]
    pub const fn topic_segment(self) -> &'static str {
        match self {
            Self::User => "userChannels",
            Self::App => "appChannels",
            Self::Private => "privateChannels",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Presentation hints for a user channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayMetadata {
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// CSS colour.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Short glyph shown in channel pickers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glyph: Option<String>,
}

/// Wire description of a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelItem {
    /// Channel identifier.
    pub id: ChannelId,
    /// Channel kind.
    #[serde(rename = "type")]
    pub kind: ChannelKind,
    /// Presentation hints, set for user channels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_metadata: Option<DisplayMetadata>,
}

impl ChannelItem {
    /// Returns the key identifying this channel.
    #[must_use]
    pub fn reference(&self) -> ChannelRef {
        ChannelRef::new(self.id.clone(), self.kind)
    }
}

/// Returns the eight standard FDC3 user channels.
#[must_use]
pub fn default_user_channel_set() -> Vec<ChannelItem> {
    const COLOURS: [(&str, &str); 8] = [
        ("Red", "#FF0000"),
        ("Orange", "#FF8000"),
        ("Yellow", "#FFFF00"),
        ("Green", "#00FF00"),
        ("Cyan", "#00FFFF"),
        ("Blue", "#0000FF"),
        ("Magenta", "#FF00FF"),
        ("Purple", "#8000FF"),
    ];
    COLOURS
        .iter()
        .zip(1_u8..)
        .map(|(&(name, color), ordinal)| ChannelItem {
            id: ChannelId(format!("fdc3.channel.{ordinal}")),
            kind: ChannelKind::User,
            display_metadata: Some(DisplayMetadata {
                name: Some(name.to_owned()),
                color: Some(color.to_owned()),
                glyph: Some(ordinal.to_string()),
            }),
        })
        .collect()
}

/// Identifies a channel by id and kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelRef {
    /// Channel identifier.
    pub id: ChannelId,
    /// Channel kind.
    #[serde(rename = "type")]
    pub kind: ChannelKind,
}

impl ChannelRef {
    /// Creates a channel reference.
    #[must_use]
    pub const fn new(id: ChannelId, kind: ChannelKind) -> Self {
        Self { id, kind }
    }

    /// Returns the router topic broadcasts on this channel are published to.
    #[must_use]
    pub fn broadcast_topic(&self) -> String {
        format!(
            "{FDC3_TOPIC_ROOT}/{}/{}/broadcast",
            self.kind.topic_segment(),
            self.id
        )
    }
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.kind, self.id)
    }
}

/// A channel with its per-type context cache.
#[derive(Debug, Clone)]
pub struct Channel {
    item: ChannelItem,
    last_contexts: HashMap<String, Context>,
    most_recent: Option<Context>,
    members: BTreeSet<InstanceId>,
    stopped: BTreeSet<InstanceId>,
}

impl Channel {
    /// Creates a channel from its description.
    #[must_use]
    pub fn new(item: ChannelItem) -> Self {
        Self {
            item,
            last_contexts: HashMap::new(),
            most_recent: None,
            members: BTreeSet::new(),
            stopped: BTreeSet::new(),
        }
    }

    /// Creates a private channel owned by `creator`.
    #[must_use]
    pub fn private(id: ChannelId, creator: InstanceId) -> Self {
        let mut channel = Self::new(ChannelItem {
            id,
            kind: ChannelKind::Private,
            display_metadata: None,
        });
        channel.members.insert(creator);
        channel
    }

    /// Returns the wire description.
    #[must_use]
    pub const fn item(&self) -> &ChannelItem {
        &self.item
    }

    /// Returns the channel key.
    #[must_use]
    pub fn reference(&self) -> ChannelRef {
        self.item.reference()
    }

    /// Caches `context` as the latest of its type.
    pub fn store(&mut self, context: Context) {
        self.last_contexts
            .insert(context.context_type().to_owned(), context.clone());
        self.most_recent = Some(context);
    }

    /// Returns the latest context of `context_type`, or the latest of any
    /// type when no filter is given.
    #[must_use]
    pub fn current_context(&self, context_type: Option<&str>) -> Option<&Context> {
        match context_type {
            Some(wanted) => self.last_contexts.get(wanted),
            None => self.most_recent.as_ref(),
        }
    }

    /// Returns whether `instance_id` may use this private channel.
    #[must_use]
    pub fn is_member(&self, instance_id: InstanceId) -> bool {
        self.members.contains(&instance_id)
    }

    /// Admits `instance_id` to a private channel.
    ///
    /// Returns `false` once both seats are taken by other instances.
    pub fn admit(&mut self, instance_id: InstanceId) -> bool {
        if self.members.contains(&instance_id) {
            return true;
        }
        if self.members.len() >= PRIVATE_CHANNEL_MEMBERS {
            return false;
        }
        self.members.insert(instance_id);
        true
    }

    /// Records that `instance_id` stopped; its seat stays taken.
    ///
    /// Returns whether the channel has members and all of them stopped.
    pub fn release(&mut self, instance_id: InstanceId) -> bool {
        if self.members.contains(&instance_id) {
            self.stopped.insert(instance_id);
        }
        !self.members.is_empty() && self.members.is_subset(&self.stopped)
    }
}
