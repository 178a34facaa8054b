//! Skeletal data: bodies, joints and the closed joint enumeration.

use serde::{Deserialize, Serialize};

use crate::{Quaternion, Vector3};

/// Joint tracking confidence
///
/// Ordered: `None < Low < Medium < High`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    /// Joint is out of range
    #[default]
    None,
    /// Joint is predicted, not observed
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    /// True for `Medium` and `High`; `None` and `Low` are always rejected
    pub fn is_reliable(self) -> bool {
        matches!(self, Self::Medium | Self::High)
    }

    /// Threshold check against an explicit minimum level
    pub fn meets(self, minimum: ConfidenceLevel) -> bool {
        self != Self::None && self >= minimum
    }
}

macro_rules! joint_ids {
    ($($name:ident => $parent:ident),+ $(,)?) => {
        /// Skeletal joint identifier
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        #[repr(u8)]
        pub enum JointId {
            $($name),+
        }

        impl JointId {
            /// Every joint, in index order
            pub const ALL: [JointId; Self::COUNT] = [$(JointId::$name),+];

            /// Parent joint in the skeleton hierarchy (`Pelvis` is its own root)
            pub fn parent(self) -> JointId {
                match self {
                    $(JointId::$name => JointId::$parent),+
                }
            }
        }
    };
}

joint_ids! {
    Pelvis => Pelvis,
    SpineNavel => Pelvis,
    SpineChest => SpineNavel,
    Neck => SpineChest,
    ClavicleLeft => SpineChest,
    ShoulderLeft => ClavicleLeft,
    ElbowLeft => ShoulderLeft,
    WristLeft => ElbowLeft,
    HandLeft => WristLeft,
    HandTipLeft => HandLeft,
    ThumbLeft => WristLeft,
    ClavicleRight => SpineChest,
    ShoulderRight => ClavicleRight,
    ElbowRight => ShoulderRight,
    WristRight => ElbowRight,
    HandRight => WristRight,
    HandTipRight => HandRight,
    ThumbRight => WristRight,
    HipLeft => Pelvis,
    KneeLeft => HipLeft,
    AnkleLeft => KneeLeft,
    FootLeft => AnkleLeft,
    HipRight => Pelvis,
    KneeRight => HipRight,
    AnkleRight => KneeRight,
    FootRight => AnkleRight,
    Head => Neck,
    Nose => Head,
    EyeLeft => Head,
    EarLeft => Head,
    EyeRight => Head,
    EarRight => Head,
}

impl JointId {
    pub const COUNT: usize = 32;

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<JointId> {
        Self::ALL.get(index).copied()
    }

    /// Skeleton edges as (parent, child) pairs, root excluded
    pub fn bones() -> impl Iterator<Item = (JointId, JointId)> {
        Self::ALL
            .into_iter()
            .filter(|j| *j != JointId::Pelvis)
            .map(|j| (j.parent(), j))
    }
}

/// One skeletal landmark
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    pub id: JointId,
    pub confidence: ConfidenceLevel,
    /// Camera-space position in meters
    pub position: Vector3,
    pub orientation: Quaternion,
}

impl Joint {
    /// Untracked joint placeholder
    pub fn untracked(id: JointId) -> Self {
        Self {
            id,
            confidence: ConfidenceLevel::None,
            position: Vector3::ZERO,
            orientation: Quaternion::IDENTITY,
        }
    }
}

/// One tracked person
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    /// Stable while tracking continues; fresh after reacquisition
    pub id: u32,
    pub joints: [Joint; JointId::COUNT],
}

impl Body {
    /// Body with every joint untracked
    pub fn new(id: u32) -> Self {
        Self {
            id,
            joints: JointId::ALL.map(Joint::untracked),
        }
    }

    pub fn joint(&self, id: JointId) -> &Joint {
        &self.joints[id.index()]
    }

    pub fn joint_mut(&mut self, id: JointId) -> &mut Joint {
        &mut self.joints[id.index()]
    }

    /// Joints whose confidence is medium or better
    pub fn reliable_joints(&self) -> impl Iterator<Item = &Joint> {
        self.joints.iter().filter(|j| j.confidence.is_reliable())
    }
}
