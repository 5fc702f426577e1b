//! Group form: an ordered list of member forms combined with set operators.

use super::FormId;
use crate::error::{MaskError, MaskResult};
use serde::{Deserialize, Serialize};

/// How a member is merged into the result of the members before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CombineOp {
    /// Overwrite inside the member's footprint.
    #[default]
    Copy,
    Union,
    Intersection,
    Difference,
    Exclusion,
}

/// Raw member state bits of the record format.
pub struct MemberState;

impl MemberState {
    pub const USE: i32 = 1;
    pub const SHOW: i32 = 2;
    pub const INVERSE: i32 = 4;
    pub const UNION: i32 = 8;
    pub const INTERSECTION: i32 = 16;
    pub const DIFFERENCE: i32 = 32;
    pub const EXCLUSION: i32 = 64;
}

fn default_true() -> bool {
    true
}

fn default_opacity() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    pub form_id: FormId,
    pub parent_id: FormId,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default)]
    pub combine: CombineOp,
    #[serde(default)]
    pub inverse: bool,
    #[serde(default = "default_true")]
    pub used: bool,
    #[serde(default = "default_true")]
    pub shown: bool,
}

impl GroupMember {
    pub fn new(form_id: FormId, parent_id: FormId, opacity: f64) -> Self {
        Self {
            form_id,
            parent_id,
            opacity,
            combine: CombineOp::Copy,
            inverse: false,
            used: true,
            shown: true,
        }
    }

    pub fn with_combine(mut self, combine: CombineOp) -> Self {
        self.combine = combine;
        self
    }

    pub fn with_inverse(mut self, inverse: bool) -> Self {
        self.inverse = inverse;
        self
    }

    pub fn state_bits(&self) -> i32 {
        let mut bits = 0;
        if self.used {
            bits |= MemberState::USE;
        }
        if self.shown {
            bits |= MemberState::SHOW;
        }
        if self.inverse {
            bits |= MemberState::INVERSE;
        }
        bits |= match self.combine {
            CombineOp::Copy => 0,
            CombineOp::Union => MemberState::UNION,
            CombineOp::Intersection => MemberState::INTERSECTION,
            CombineOp::Difference => MemberState::DIFFERENCE,
            CombineOp::Exclusion => MemberState::EXCLUSION,
        };
        bits
    }

    /// Apply a state bit set. When several operator bits are set the first
    /// of union, intersection, difference, exclusion wins.
    pub fn set_state_bits(&mut self, bits: i32) {
        self.used = bits & MemberState::USE != 0;
        self.shown = bits & MemberState::SHOW != 0;
        self.inverse = bits & MemberState::INVERSE != 0;
        self.combine = if bits & MemberState::UNION != 0 {
            CombineOp::Union
        } else if bits & MemberState::INTERSECTION != 0 {
            CombineOp::Intersection
        } else if bits & MemberState::DIFFERENCE != 0 {
            CombineOp::Difference
        } else if bits & MemberState::EXCLUSION != 0 {
            CombineOp::Exclusion
        } else {
            CombineOp::Copy
        };
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub members: Vec<GroupMember>,
}

impl Group {
    pub fn new(members: Vec<GroupMember>) -> Self {
        Self { members }
    }

    pub fn validate(&self, self_id: FormId) -> MaskResult<()> {
        for m in &self.members {
            if m.form_id == self_id {
                return Err(MaskError::GeometryInvalid("group contains itself".into()));
            }
            if !(m.opacity.is_finite() && (0.0..=1.0).contains(&m.opacity)) {
                return Err(MaskError::GeometryInvalid(format!(
                    "member opacity must lie in [0, 1], got {}",
                    m.opacity
                )));
            }
        }
        Ok(())
    }

    pub fn member(&self, form_id: FormId) -> Option<&GroupMember> {
        self.members.iter().find(|m| m.form_id == form_id)
    }

    pub fn member_mut(&mut self, form_id: FormId) -> Option<&mut GroupMember> {
        self.members.iter_mut().find(|m| m.form_id == form_id)
    }

    pub fn contains(&self, form_id: FormId) -> bool {
        self.member(form_id).is_some()
    }
}
