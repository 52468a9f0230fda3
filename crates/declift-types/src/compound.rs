//! Structure types.
//!
//! Field offsets are implicit: each field starts where the previous one
//! ends. Generic compounds grow as members are discovered at new offsets;
//! gaps between discovered members are filled with padding fields.

use log::debug;

use crate::types::{SharedType, Type};

/// Name given to padding fields.
pub const PADDING_NAME: &str = "pad";

/// A named structure field.
#[derive(Debug)]
pub struct Field {
    pub ty: SharedType,
    pub name: String,
}

impl Field {
    pub fn new(ty: SharedType, name: impl Into<String>) -> Self {
        Self {
            ty,
            name: name.into(),
        }
    }

    fn padding(bits: usize) -> Self {
        Self::new(SharedType::size_only(bits), PADDING_NAME)
    }

    /// Whether this field only reserves space.
    pub fn is_padding(&self) -> bool {
        self.name == PADDING_NAME && matches!(&*self.ty.borrow(), Type::Size(_))
    }
}

/// Structure type with ordered fields.
#[derive(Debug, Default)]
pub struct CompoundType {
    fields: Vec<Field>,
    generic: bool,
    next_generic_member: u32,
}

impl CompoundType {
    pub fn new() -> Self {
        Self::default()
    }

    /// A compound whose members are discovered during analysis.
    pub fn generic() -> Self {
        Self {
            generic: true,
            ..Self::default()
        }
    }

    pub fn is_generic(&self) -> bool {
        self.generic
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn add_field(&mut self, ty: SharedType, name: impl Into<String>) {
        self.fields.push(Field::new(ty, name));
    }

    /// Builder form of [`add_field`](Self::add_field).
    pub fn with_field(mut self, ty: SharedType, name: impl Into<String>) -> Self {
        self.add_field(ty, name);
        self
    }

    /// Total size in bits.
    pub fn size(&self) -> usize {
        self.fields.iter().map(|f| f.ty.size()).sum()
    }

    /// Bit offset of field `index`.
    pub fn offset_to(&self, index: usize) -> usize {
        self.fields.iter().take(index).map(|f| f.ty.size()).sum()
    }

    /// Bit offset of the field called `name`.
    pub fn offset_of(&self, name: &str) -> Option<usize> {
        let index = self.fields.iter().position(|f| f.name == name)?;
        Some(self.offset_to(index))
    }

    /// Index of the field covering bit offset `bit`.
    pub fn field_index_at_offset(&self, bit: usize) -> Option<usize> {
        let mut offset = 0;
        for (index, field) in self.fields.iter().enumerate() {
            let size = field.ty.size();
            if offset <= bit && bit < offset + size {
                return Some(index);
            }
            offset += size;
        }
        None
    }

    /// How far `bit` lies past the start of the field that covers it.
    pub fn offset_remainder(&self, bit: usize) -> usize {
        let mut remainder = bit;
        let mut offset = 0;
        for field in &self.fields {
            let size = field.ty.size();
            offset += size;
            if offset > bit {
                break;
            }
            remainder -= size;
        }
        remainder
    }

    pub fn type_at_offset(&self, bit: usize) -> Option<SharedType> {
        self.field_index_at_offset(bit)
            .map(|i| self.fields[i].ty.clone())
    }

    pub fn name_at_offset(&self, bit: usize) -> Option<&str> {
        self.field_index_at_offset(bit)
            .map(|i| self.fields[i].name.as_str())
    }

    pub fn type_by_name(&self, name: &str) -> Option<SharedType> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.ty.clone())
    }

    /// Replace the type of the field covering `bit`. When the new type is
    /// narrower, the remaining bits become a padding field.
    pub fn set_type_at_offset(&mut self, bit: usize, ty: SharedType) {
        let Some(index) = self.field_index_at_offset(bit) else {
            return;
        };
        let old_size = self.fields[index].ty.size();
        let new_size = ty.size();
        self.fields[index].ty = ty;
        if new_size < old_size {
            self.fields
                .insert(index + 1, Field::padding(old_size - new_size));
        }
    }

    pub fn set_name_at_offset(&mut self, bit: usize, name: impl Into<String>) {
        if let Some(index) = self.field_index_at_offset(bit) {
            self.fields[index].name = name.into();
        }
    }

    /// Whether `other`'s fields are a prefix of this compound's fields.
    pub fn is_super_struct_of(&self, other: &CompoundType) -> bool {
        other.fields.len() <= self.fields.len()
            && other
                .fields
                .iter()
                .zip(&self.fields)
                .all(|(a, b)| a.ty == b.ty)
    }

    /// Whether this compound's fields are a prefix of `other`'s.
    pub fn is_sub_struct_of(&self, other: &CompoundType) -> bool {
        other.is_super_struct_of(self)
    }

    /// Record that a member of type `ty` lives at byte offset `offset`.
    ///
    /// An existing member at that offset is met with `ty`. Otherwise a new
    /// member named `memberN` is placed there, carving it out of padding or
    /// appending it (after padding) past the current end. A member that
    /// grows only takes over padding that follows it; when a real member is
    /// in the way the compound is left as it was. Only generic compounds
    /// grow; for others this is a no-op.
    pub fn update_generic_member(&mut self, offset: usize, ty: SharedType, changed: &mut bool) {
        if !self.generic {
            debug!("ignoring member update at offset {} of a non generic struct", offset);
            return;
        }
        let bit = offset * 8;
        match self.field_index_at_offset(bit) {
            Some(index) if !self.fields[index].is_padding() => {
                let existing = self.fields[index].ty.clone();
                let mut met_changed = false;
                let met = existing.meet_with(&ty, &mut met_changed, false);
                if !met_changed {
                    return;
                }
                let start = self.offset_to(index);
                let old_end = start + existing.size();
                let new_end = start + met.size();
                if new_end > old_end {
                    let Some(last) = self.padding_through(index + 1, old_end, new_end) else {
                        debug!("member at offset {} cannot grow over the next member", offset);
                        return;
                    };
                    let covered = start + self.span_size(index, last);
                    let mut replacement = vec![Field::new(met, self.fields[index].name.clone())];
                    if covered > new_end {
                        replacement.push(Field::padding(covered - new_end));
                    }
                    self.fields.splice(index..last, replacement);
                } else {
                    self.set_type_at_offset(start, met);
                }
                *changed = true;
            }
            Some(index) => {
                let start = self.offset_to(index);
                let pad_end = start + self.fields[index].ty.size();
                let member_end = bit + ty.size();
                let Some(last) = self.padding_through(index + 1, pad_end, member_end) else {
                    debug!("member at offset {} would overlap the next member", offset);
                    return;
                };
                let covered = start + self.span_size(index, last);

                let mut replacement = Vec::with_capacity(3);
                if bit > start {
                    replacement.push(Field::padding(bit - start));
                }
                replacement.push(Field::new(ty, self.next_member_name()));
                if covered > member_end {
                    replacement.push(Field::padding(covered - member_end));
                }
                self.fields.splice(index..last, replacement);
                *changed = true;
            }
            None => {
                let end = self.size();
                if bit > end {
                    self.fields.push(Field::padding(bit - end));
                }
                let name = self.next_member_name();
                self.fields.push(Field::new(ty, name));
                *changed = true;
            }
        }
    }

    /// Starting at field `from`, whose start is `covered`, take padding
    /// fields until bit `end` is reached. Returns the index one past the last
    /// field taken, or `None` when a real member lies before `end`. Running
    /// off the end of the compound is allowed: the compound grows.
    fn padding_through(&self, from: usize, mut covered: usize, end: usize) -> Option<usize> {
        let mut next = from;
        while covered < end {
            let Some(field) = self.fields.get(next) else {
                break;
            };
            if !field.is_padding() {
                return None;
            }
            covered += field.ty.size();
            next += 1;
        }
        Some(next)
    }

    /// Total size of fields `from..to`.
    fn span_size(&self, from: usize, to: usize) -> usize {
        self.fields[from..to].iter().map(|f| f.ty.size()).sum()
    }

    fn next_member_name(&mut self) -> String {
        let name = format!("member{}", self.next_generic_member);
        self.next_generic_member += 1;
        name
    }

    pub(crate) fn next_generic_member(&self) -> u32 {
        self.next_generic_member
    }

    pub(crate) fn from_parts(fields: Vec<Field>, generic: bool, next_generic_member: u32) -> Self {
        Self {
            fields,
            generic,
            next_generic_member,
        }
    }

    pub(crate) fn field_type_mut(&mut self, index: usize) -> &mut SharedType {
        &mut self.fields[index].ty
    }

    pub(crate) fn deep_clone(&self) -> CompoundType {
        CompoundType {
            fields: self
                .fields
                .iter()
                .map(|f| Field::new(f.ty.deep_clone(), f.name.clone()))
                .collect(),
            generic: self.generic,
            next_generic_member: self.next_generic_member,
        }
    }
}
