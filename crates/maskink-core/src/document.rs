//! Mask document: the set of forms of one image and their group memberships.

use crate::context::MaskDefaults;
use crate::forms::{CombineOp, Form, FormId, GroupMember, Shape};
use crate::record::{FormRecord, RecordError};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Smallest opacity reachable through [`MaskDocument::change_opacity`].
pub const MIN_MEMBER_OPACITY: f64 = 0.05;

#[derive(Debug, Error, PartialEq)]
pub enum DocumentError {
    #[error("Form not found: {0}")]
    FormNotFound(FormId),
    #[error("Form {0} is not a group")]
    NotAGroup(FormId),
    #[error("Adding {form} to group {group} would make the group contain itself")]
    CycleDetected { group: FormId, form: FormId },
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for document operations.
pub type DocumentResult<T> = Result<T, DocumentError>;

/// All forms of an image, in creation order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaskDocument {
    /// All forms, keyed by id.
    pub forms: HashMap<FormId, Form>,
    /// Creation order of the forms.
    pub order: Vec<FormId>,
    /// Defaults used for new group members.
    #[serde(skip)]
    pub defaults: MaskDefaults,
}

impl MaskDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(mut self, defaults: MaskDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Add a form to the document, replacing any form with the same id.
    pub fn add_form(&mut self, form: Form) -> FormId {
        let id = form.id();
        if self.forms.insert(id, form).is_none() {
            self.order.push(id);
        }
        id
    }

    /// Remove a form and every group membership that refers to it.
    ///
    /// Groups left without members are removed as well.
    pub fn remove_form(&mut self, id: FormId) -> Option<Form> {
        let form = self.forms.remove(&id)?;
        self.order.retain(|&f| f != id);

        let mut emptied = Vec::new();
        for group_id in &self.order {
            if let Some(Form {
                shape: Shape::Group(group),
                ..
            }) = self.forms.get_mut(group_id)
            {
                let before = group.members.len();
                group.members.retain(|m| m.form_id != id);
                if before != group.members.len() && group.members.is_empty() {
                    emptied.push(*group_id);
                }
            }
        }
        for group_id in emptied {
            log::debug!("removing group {group_id} left without members");
            self.remove_form(group_id);
        }
        Some(form)
    }

    pub fn get_form(&self, id: FormId) -> Option<&Form> {
        self.forms.get(&id)
    }

    pub fn get_form_mut(&mut self, id: FormId) -> Option<&mut Form> {
        self.forms.get_mut(&id)
    }

    /// Forms in creation order.
    pub fn forms_ordered(&self) -> impl Iterator<Item = &Form> {
        self.order.iter().filter_map(|id| self.forms.get(id))
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }

    /// Members of a group, in compositing order.
    pub fn group_members(&self, group_id: FormId) -> DocumentResult<&[GroupMember]> {
        match &self.form(group_id)?.shape {
            Shape::Group(group) => Ok(&group.members),
            _ => Err(DocumentError::NotAGroup(group_id)),
        }
    }

    fn form(&self, id: FormId) -> DocumentResult<&Form> {
        self.forms.get(&id).ok_or(DocumentError::FormNotFound(id))
    }

    fn members_mut(&mut self, group_id: FormId) -> DocumentResult<&mut Vec<GroupMember>> {
        match self.forms.get_mut(&group_id) {
            Some(Form {
                shape: Shape::Group(group),
                ..
            }) => Ok(&mut group.members),
            Some(_) => Err(DocumentError::NotAGroup(group_id)),
            None => Err(DocumentError::FormNotFound(group_id)),
        }
    }

    fn member_mut(&mut self, group_id: FormId, form_id: FormId) -> DocumentResult<&mut GroupMember> {
        self.members_mut(group_id)?
            .iter_mut()
            .find(|m| m.form_id == form_id)
            .ok_or(DocumentError::FormNotFound(form_id))
    }

    /// Whether `target` is `root` or is reachable through its group members.
    fn reaches(&self, root: FormId, target: FormId) -> bool {
        let mut stack = vec![root];
        let mut seen = HashSet::new();
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if !seen.insert(id) {
                continue;
            }
            if let Some(Form {
                shape: Shape::Group(group),
                ..
            }) = self.forms.get(&id)
            {
                stack.extend(group.members.iter().map(|m| m.form_id));
            }
        }
        false
    }

    /// Append a form to a group.
    ///
    /// The member is used and shown, joins with union when the group already
    /// has members, and gets the default member opacity.
    pub fn group_add_form(&mut self, group_id: FormId, form_id: FormId) -> DocumentResult<GroupMember> {
        self.form(form_id)?;
        self.group_members(group_id)?;
        if self.reaches(form_id, group_id) {
            return Err(DocumentError::CycleDetected {
                group: group_id,
                form: form_id,
            });
        }

        let opacity = self.defaults.group_opacity.clamp(0.0, 1.0);
        let members = self.members_mut(group_id)?;
        let combine = if members.is_empty() {
            CombineOp::Copy
        } else {
            CombineOp::Union
        };
        let member = GroupMember::new(form_id, group_id, opacity).with_combine(combine);
        members.push(member);
        Ok(member)
    }

    /// Remove a form from a group. A group left empty is removed.
    pub fn group_remove_form(&mut self, group_id: FormId, form_id: FormId) -> DocumentResult<GroupMember> {
        let members = self.members_mut(group_id)?;
        let pos = members
            .iter()
            .position(|m| m.form_id == form_id)
            .ok_or(DocumentError::FormNotFound(form_id))?;
        let member = members.remove(pos);
        if members.is_empty() {
            self.remove_form(group_id);
        }
        Ok(member)
    }

    /// Move a member one step towards the end (`up`) or the start of its group.
    ///
    /// Returns false when it is already at that end.
    pub fn move_in_group(&mut self, group_id: FormId, form_id: FormId, up: bool) -> DocumentResult<bool> {
        let members = self.members_mut(group_id)?;
        let pos = members
            .iter()
            .position(|m| m.form_id == form_id)
            .ok_or(DocumentError::FormNotFound(form_id))?;
        if up && pos + 1 < members.len() {
            members.swap(pos, pos + 1);
            Ok(true)
        } else if !up && pos > 0 {
            members.swap(pos, pos - 1);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Replace the member `nested_id` of `group_id` by the members of that
    /// nested group, flattened, at the same position.
    ///
    /// Returns the ids of the spliced members.
    pub fn ungroup(&mut self, group_id: FormId, nested_id: FormId) -> DocumentResult<Vec<FormId>> {
        self.group_members(nested_id)?;
        let pos = self
            .group_members(group_id)?
            .iter()
            .position(|m| m.form_id == nested_id)
            .ok_or(DocumentError::FormNotFound(nested_id))?;

        let mut flat = Vec::new();
        self.flatten_members(nested_id, &mut flat, &mut HashSet::new());
        for m in &mut flat {
            m.parent_id = group_id;
        }
        let ids = flat.iter().map(|m| m.form_id).collect();

        let members = self.members_mut(group_id)?;
        members.splice(pos..=pos, flat);
        Ok(ids)
    }

    fn flatten_members(&self, group_id: FormId, out: &mut Vec<GroupMember>, seen: &mut HashSet<FormId>) {
        if !seen.insert(group_id) {
            return;
        }
        let Ok(members) = self.group_members(group_id) else {
            return;
        };
        for m in members {
            match self.forms.get(&m.form_id) {
                Some(f) if f.is_group() => self.flatten_members(m.form_id, out, seen),
                Some(_) => out.push(*m),
                None => {}
            }
        }
    }

    /// Change the opacity of a member by `delta`, clamped to [0.05, 1].
    ///
    /// Returns the new opacity, or `None` when the member is itself a group.
    pub fn change_opacity(&mut self, group_id: FormId, form_id: FormId, delta: f64) -> DocumentResult<Option<f64>> {
        if self.form(form_id)?.is_group() {
            return Ok(None);
        }
        let member = self.member_mut(group_id, form_id)?;
        member.opacity = (member.opacity + delta).clamp(MIN_MEMBER_OPACITY, 1.0);
        Ok(Some(member.opacity))
    }

    pub fn set_combine(&mut self, group_id: FormId, form_id: FormId, combine: CombineOp) -> DocumentResult<()> {
        self.member_mut(group_id, form_id)?.combine = combine;
        Ok(())
    }

    /// Flip the inverse flag of a member, returning the new value.
    pub fn toggle_inverse(&mut self, group_id: FormId, form_id: FormId) -> DocumentResult<bool> {
        let member = self.member_mut(group_id, form_id)?;
        member.inverse = !member.inverse;
        Ok(member.inverse)
    }

    pub fn to_json(&self) -> DocumentResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| DocumentError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> DocumentResult<Self> {
        serde_json::from_str(json).map_err(|e| DocumentError::Serialization(e.to_string()))
    }

    /// Records of every form, in creation order.
    pub fn to_records(&self, image_id: i64) -> Vec<FormRecord> {
        self.forms_ordered()
            .map(|f| FormRecord::encode(f, image_id))
            .collect()
    }

    pub fn from_records(records: &[FormRecord]) -> Result<Self, RecordError> {
        let mut doc = Self::new();
        for record in records {
            doc.add_form(record.decode()?);
        }
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::{Circle, Group};
    use kurbo::Point;

    fn circle(doc: &mut MaskDocument) -> FormId {
        doc.add_form(Form::new("circle", Shape::Circle(Circle::new(Point::new(0.5, 0.5), 0.1, 0.05))))
    }

    fn group(doc: &mut MaskDocument) -> FormId {
        doc.add_form(Form::new("group", Shape::Group(Group::default())))
    }

    #[test]
    fn test_add_and_order() {
        let mut doc = MaskDocument::new();
        let a = circle(&mut doc);
        let b = circle(&mut doc);
        let ids: Vec<_> = doc.forms_ordered().map(|f| f.id()).collect();
        assert_eq!(ids, vec![a, b]);
        assert_eq!(doc.len(), 2);
    }

    #[test]
    fn test_group_add_sets_state() {
        let mut doc = MaskDocument::new();
        let g = group(&mut doc);
        let a = circle(&mut doc);
        let b = circle(&mut doc);

        let first = doc.group_add_form(g, a).unwrap();
        assert_eq!(first.combine, CombineOp::Copy);
        assert!(first.used && first.shown && !first.inverse);
        assert_eq!(first.parent_id, g);
        let second = doc.group_add_form(g, b).unwrap();
        assert_eq!(second.combine, CombineOp::Union);
        assert!((second.opacity - 1.0).abs() < f64::EPSILON);
        assert_eq!(doc.group_members(g).unwrap().len(), 2);
    }

    #[test]
    fn test_group_add_uses_default_opacity() {
        let defaults = MaskDefaults {
            group_opacity: 0.4,
            ..Default::default()
        };
        let mut doc = MaskDocument::new().with_defaults(defaults);
        let g = group(&mut doc);
        let a = circle(&mut doc);
        assert!((doc.group_add_form(g, a).unwrap().opacity - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn test_cycle_rejected() {
        let mut doc = MaskDocument::new();
        let outer = group(&mut doc);
        let inner = group(&mut doc);
        let a = circle(&mut doc);
        doc.group_add_form(inner, a).unwrap();
        doc.group_add_form(outer, inner).unwrap();

        assert!(matches!(
            doc.group_add_form(inner, outer),
            Err(DocumentError::CycleDetected { .. })
        ));
        assert!(matches!(
            doc.group_add_form(outer, outer),
            Err(DocumentError::CycleDetected { .. })
        ));
    }

    #[test]
    fn test_add_to_non_group() {
        let mut doc = MaskDocument::new();
        let a = circle(&mut doc);
        let b = circle(&mut doc);
        assert_eq!(doc.group_add_form(a, b), Err(DocumentError::NotAGroup(a)));
    }

    #[test]
    fn test_remove_cascades_and_drops_empty_group() {
        let mut doc = MaskDocument::new();
        let g1 = group(&mut doc);
        let g2 = group(&mut doc);
        let a = circle(&mut doc);
        let b = circle(&mut doc);
        doc.group_add_form(g1, a).unwrap();
        doc.group_add_form(g2, a).unwrap();
        doc.group_add_form(g2, b).unwrap();

        assert!(doc.remove_form(a).is_some());
        assert!(doc.get_form(g1).is_none());
        let members = doc.group_members(g2).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].form_id, b);
    }

    #[test]
    fn test_group_remove_form() {
        let mut doc = MaskDocument::new();
        let g = group(&mut doc);
        let a = circle(&mut doc);
        let b = circle(&mut doc);
        doc.group_add_form(g, a).unwrap();
        doc.group_add_form(g, b).unwrap();

        doc.group_remove_form(g, a).unwrap();
        assert!(doc.get_form(a).is_some());
        assert_eq!(doc.group_members(g).unwrap().len(), 1);
        doc.group_remove_form(g, b).unwrap();
        assert!(doc.get_form(g).is_none());
    }

    #[test]
    fn test_move_in_group() {
        let mut doc = MaskDocument::new();
        let g = group(&mut doc);
        let a = circle(&mut doc);
        let b = circle(&mut doc);
        doc.group_add_form(g, a).unwrap();
        doc.group_add_form(g, b).unwrap();

        assert!(!doc.move_in_group(g, b, true).unwrap());
        assert!(doc.move_in_group(g, b, false).unwrap());
        assert_eq!(doc.group_members(g).unwrap()[0].form_id, b);
        assert!(!doc.move_in_group(g, b, false).unwrap());
    }

    #[test]
    fn test_ungroup_splices_flattened_members() {
        let mut doc = MaskDocument::new();
        let outer = group(&mut doc);
        let inner = group(&mut doc);
        let deepest = group(&mut doc);
        let a = circle(&mut doc);
        let b = circle(&mut doc);
        let c = circle(&mut doc);
        let d = circle(&mut doc);
        doc.group_add_form(deepest, c).unwrap();
        doc.group_add_form(inner, b).unwrap();
        doc.group_add_form(inner, deepest).unwrap();
        doc.group_add_form(outer, a).unwrap();
        doc.group_add_form(outer, inner).unwrap();
        doc.group_add_form(outer, d).unwrap();

        let spliced = doc.ungroup(outer, inner).unwrap();
        assert_eq!(spliced, vec![b, c]);
        let ids: Vec<_> = doc.group_members(outer).unwrap().iter().map(|m| m.form_id).collect();
        assert_eq!(ids, vec![a, b, c, d]);
        assert!(doc.group_members(outer).unwrap().iter().all(|m| m.parent_id == outer));
    }

    #[test]
    fn test_change_opacity_clamps() {
        let mut doc = MaskDocument::new();
        let g = group(&mut doc);
        let inner = group(&mut doc);
        let a = circle(&mut doc);
        doc.group_add_form(g, a).unwrap();
        doc.group_add_form(inner, a).unwrap();
        doc.group_add_form(g, inner).unwrap();

        assert_eq!(doc.change_opacity(g, a, 0.5).unwrap(), Some(1.0));
        let low = doc.change_opacity(g, a, -2.0).unwrap().unwrap();
        assert!((low - MIN_MEMBER_OPACITY).abs() < f64::EPSILON);
        assert_eq!(doc.change_opacity(g, inner, -0.1).unwrap(), None);
    }

    #[test]
    fn test_combine_and_inverse() {
        let mut doc = MaskDocument::new();
        let g = group(&mut doc);
        let a = circle(&mut doc);
        doc.group_add_form(g, a).unwrap();
        doc.set_combine(g, a, CombineOp::Exclusion).unwrap();
        assert!(doc.toggle_inverse(g, a).unwrap());
        let m = doc.group_members(g).unwrap()[0];
        assert_eq!(m.combine, CombineOp::Exclusion);
        assert!(m.inverse);
        assert!(!doc.toggle_inverse(g, a).unwrap());
    }

    #[test]
    fn test_json_and_records() {
        let mut doc = MaskDocument::new();
        let g = group(&mut doc);
        let a = circle(&mut doc);
        doc.group_add_form(g, a).unwrap();

        let back = MaskDocument::from_json(&doc.to_json().unwrap()).unwrap();
        assert_eq!(back.order, doc.order);
        assert_eq!(back.group_members(g).unwrap()[0].form_id, a);

        let restored = MaskDocument::from_records(&doc.to_records(12)).unwrap();
        assert_eq!(restored.order, doc.order);
        assert!(restored.get_form(a).is_some());
        assert!(MaskDocument::from_json("not json").is_err());
    }
}
