//! Node Kinds and Data Fields
//!
//! Fixed lookup table describing how each dump object type is read:
//! which field names its children, which field carries its id, and
//! which list (if any) holds inline children.

use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════════
// NODE KIND
// ═══════════════════════════════════════════════════════════════════════════════

/// Graph node kind, derived from the dump object's type name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// `CAkEvent`: root of every event graph
    Event,
    /// `CAkActionPlay`, `CAkActionSetSwitch`, `CAkActionSetAkProp`
    Action,
    /// `CAkLayerCntr`
    LayerContainer,
    /// `CAkSwitchCntr`
    SwitchContainer,
    /// `CAkRanSeqCntr`
    RandomSequenceContainer,
    /// `CAkActorMixer`
    ActorMixer,
    /// `CAkMusicSwitchCntr`
    MusicSwitchContainer,
    /// `CAkMusicRanSeqCntr`
    MusicRandomSequenceContainer,
    /// `CAkMusicSegment`
    MusicSegment,
    /// `CAkLayer` (inline child of a layer container)
    Layer,
    /// `CAkSwitchPackage` (inline child of a switch container)
    SwitchPackage,
    /// `CAkAuxBus`: routing node, contributes its own id as a bus
    AuxBus,
    /// `CAkFxCustom`, `CAkFxShareSet`
    Effect,
    /// `CAkSound`: terminal
    Sound,
    /// `CAkMusicTrack`: terminal
    MusicTrack,
    /// `MediaHeader`: declares a payload embedded in the bank
    MediaHeader,
    /// Any other `CAk*` object. Id is captured, no children.
    Unknown(String),
}

/// Prefix shared by every runtime object type in the dump
const OBJECT_PREFIX: &str = "CAk";

impl NodeKind {
    /// Map a dump object type name to a node kind.
    ///
    /// Returns `None` for objects that are not graph nodes (nested
    /// parameter blocks and the like); their fields belong to the
    /// enclosing node.
    pub fn from_type_name(name: &str) -> Option<NodeKind> {
        let kind = match name {
            "CAkEvent" => NodeKind::Event,
            "CAkActionPlay" | "CAkActionSetSwitch" | "CAkActionSetAkProp" => NodeKind::Action,
            "CAkLayerCntr" => NodeKind::LayerContainer,
            "CAkSwitchCntr" => NodeKind::SwitchContainer,
            "CAkRanSeqCntr" => NodeKind::RandomSequenceContainer,
            "CAkActorMixer" => NodeKind::ActorMixer,
            "CAkMusicSwitchCntr" => NodeKind::MusicSwitchContainer,
            "CAkMusicRanSeqCntr" => NodeKind::MusicRandomSequenceContainer,
            "CAkMusicSegment" => NodeKind::MusicSegment,
            "CAkLayer" => NodeKind::Layer,
            "CAkSwitchPackage" => NodeKind::SwitchPackage,
            "CAkAuxBus" => NodeKind::AuxBus,
            "CAkFxCustom" | "CAkFxShareSet" => NodeKind::Effect,
            "CAkSound" => NodeKind::Sound,
            "CAkMusicTrack" => NodeKind::MusicTrack,
            "MediaHeader" => NodeKind::MediaHeader,
            other if other.starts_with(OBJECT_PREFIX) => NodeKind::Unknown(other.to_string()),
            _ => return None,
        };
        Some(kind)
    }

    /// Field whose values are this kind's child ids
    pub fn child_field(&self) -> Option<&'static str> {
        match self {
            NodeKind::Event => Some("ulActionID"),
            NodeKind::Action => Some("idExt"),
            NodeKind::LayerContainer
            | NodeKind::SwitchContainer
            | NodeKind::RandomSequenceContainer
            | NodeKind::ActorMixer
            | NodeKind::MusicSwitchContainer
            | NodeKind::MusicRandomSequenceContainer
            | NodeKind::MusicSegment => Some("ulChildID"),
            NodeKind::Layer => Some("ulAssociatedChildID"),
            NodeKind::SwitchPackage => Some("NodeID"),
            NodeKind::AuxBus => Some("fxID"),
            // NOTE: lower-case `Id` is how the dump spells it for effects
            NodeKind::Effect => Some("sourceId"),
            NodeKind::Sound
            | NodeKind::MusicTrack
            | NodeKind::MediaHeader
            | NodeKind::Unknown(_) => None,
        }
    }

    /// Field carrying this kind's id
    pub fn id_field(&self) -> &'static str {
        match self {
            NodeKind::MediaHeader => "id",
            NodeKind::Layer => "ulLayerID",
            NodeKind::SwitchPackage => "ulSwitchID",
            _ => "ulID",
        }
    }

    /// List whose objects are inline children of this kind
    pub fn inline_list(&self) -> Option<&'static str> {
        match self {
            NodeKind::LayerContainer => Some("pLayers"),
            NodeKind::SwitchContainer => Some("SwitchList"),
            _ => None,
        }
    }

    /// Terminal kinds name source hashes instead of children
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeKind::Sound | NodeKind::MusicTrack)
    }

    #[inline]
    pub fn is_music(&self) -> bool {
        matches!(self, NodeKind::MusicTrack)
    }

    /// Routing nodes contribute their own id as a bus reference
    #[inline]
    pub fn is_bus(&self) -> bool {
        matches!(self, NodeKind::AuxBus)
    }

    /// Display name for logs
    pub fn display_name(&self) -> &str {
        match self {
            NodeKind::Event => "Event",
            NodeKind::Action => "Action",
            NodeKind::LayerContainer => "LayerContainer",
            NodeKind::SwitchContainer => "SwitchContainer",
            NodeKind::RandomSequenceContainer => "RandomSequenceContainer",
            NodeKind::ActorMixer => "ActorMixer",
            NodeKind::MusicSwitchContainer => "MusicSwitchContainer",
            NodeKind::MusicRandomSequenceContainer => "MusicRandomSequenceContainer",
            NodeKind::MusicSegment => "MusicSegment",
            NodeKind::Layer => "Layer",
            NodeKind::SwitchPackage => "SwitchPackage",
            NodeKind::AuxBus => "AuxBus",
            NodeKind::Effect => "Effect",
            NodeKind::Sound => "Sound",
            NodeKind::MusicTrack => "MusicTrack",
            NodeKind::MediaHeader => "MediaHeader",
            NodeKind::Unknown(name) => name,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DATA FIELD
// ═══════════════════════════════════════════════════════════════════════════════

/// Allow-listed fields kept in a node's data bag
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DataField {
    #[serde(rename = "uInMemoryMediaSize")]
    InMemoryMediaSize,
    #[serde(rename = "RTPCID")]
    RtpcId,
    #[serde(rename = "ulSwitchID")]
    SwitchId,
    #[serde(rename = "ulSwitchGroupID")]
    SwitchGroupId,
    #[serde(rename = "ulStateID")]
    StateId,
    #[serde(rename = "ulSwitchStateID")]
    SwitchStateId,
    /// Source hash of a terminal sound
    #[serde(rename = "sourceID")]
    SourceId,
    /// Source reference of an effect
    #[serde(rename = "sourceId")]
    EffectSourceId,
    /// Bank a `MediaHeader` was declared in (not a dump field)
    #[serde(rename = "bank")]
    Bank,
}

impl DataField {
    /// Match a dump field name against the allow-list
    pub fn from_field_name(name: &str) -> Option<DataField> {
        match name {
            "uInMemoryMediaSize" => Some(DataField::InMemoryMediaSize),
            "RTPCID" => Some(DataField::RtpcId),
            "ulSwitchID" => Some(DataField::SwitchId),
            "ulSwitchGroupID" => Some(DataField::SwitchGroupId),
            "ulStateID" => Some(DataField::StateId),
            "ulSwitchStateID" => Some(DataField::SwitchStateId),
            "sourceID" => Some(DataField::SourceId),
            "sourceId" => Some(DataField::EffectSourceId),
            _ => None,
        }
    }

    /// Name as spelled in the dump
    pub fn field_name(&self) -> &'static str {
        match self {
            DataField::InMemoryMediaSize => "uInMemoryMediaSize",
            DataField::RtpcId => "RTPCID",
            DataField::SwitchId => "ulSwitchID",
            DataField::SwitchGroupId => "ulSwitchGroupID",
            DataField::StateId => "ulStateID",
            DataField::SwitchStateId => "ulSwitchStateID",
            DataField::SourceId => "sourceID",
            DataField::EffectSourceId => "sourceId",
            DataField::Bank => "bank",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
