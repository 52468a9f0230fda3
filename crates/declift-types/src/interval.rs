//! Address-ordered storage of typed, named data items.
//!
//! One map exists per address space: the locals of a procedure, or the
//! program's globals. Intervals never overlap. Inserting an item that
//! collides with an existing one is reconciled by meeting types, by typing a
//! component of an enclosing struct or array, or by absorbing the smaller
//! items into a new aggregate.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use log::{debug, warn};
use serde::Serialize;

use crate::error::IntervalError;
use crate::types::{SharedType, Type, NO_BOUND};

/// One data item. `size` is in bytes.
#[derive(Debug, Clone)]
pub struct DataInterval {
    pub size: u64,
    pub name: String,
    pub ty: SharedType,
}

/// One step of the access path from an interval's start to an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentStep {
    Member(String),
    Index(u64),
}

#[derive(Serialize)]
struct IntervalSnapshot<'a> {
    start: u64,
    size: u64,
    name: &'a str,
    ctype: String,
}

#[derive(Debug, Default)]
pub struct DataIntervalMap {
    items: BTreeMap<u64, DataInterval>,
}

fn end_of(start: u64, item: &DataInterval) -> u64 {
    start.saturating_add(item.size)
}

impl DataIntervalMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Items in address order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &DataInterval)> {
        self.items.iter().map(|(&start, item)| (start, item))
    }

    /// The item whose range contains `addr`.
    pub fn find(&self, addr: u64) -> Option<(u64, &DataInterval)> {
        let (&start, item) = self.items.range(..=addr).next_back()?;
        (addr < end_of(start, item)).then_some((start, item))
    }

    /// Whether no item overlaps `[addr, addr + size)`.
    pub fn is_clear(&self, addr: u64, size: u64) -> bool {
        if self.find(addr).is_some() {
            return false;
        }
        let end = addr.saturating_add(size);
        self.items.range(addr..end).next().is_none()
    }

    /// Record an item of type `ty` at `addr`.
    ///
    /// Collisions are reconciled rather than overwritten: an item inside an
    /// existing struct or array types that component, an item matching an
    /// existing range exactly is met with it, and an aggregate covering
    /// smaller items absorbs them. `forced` replaces an exact match and
    /// discards overlapped items instead of meeting them.
    pub fn add_item(
        &mut self,
        addr: u64,
        name: impl Into<String>,
        ty: SharedType,
        forced: bool,
    ) -> Result<(), IntervalError> {
        let name = name.into();
        self.shrink_unbounded_before(addr);

        let Some((start, existing_end)) = self.find(addr).map(|(s, item)| (s, end_of(s, item))) else {
            return self.replace_components(addr, name, ty, forced);
        };
        let end = addr.saturating_add(self.span_for(addr, &ty));

        if start < addr {
            if end > existing_end {
                warn!(
                    "{} at {:#x} ({} bytes) weaves with the item at {:#x}",
                    name,
                    addr,
                    end - addr,
                    start
                );
                return Err(IntervalError::Weave {
                    addr,
                    existing: start,
                    name,
                });
            }
            return self.enter_component(start, addr, ty);
        }

        match existing_end.cmp(&end) {
            std::cmp::Ordering::Less => self.replace_components(addr, name, ty, forced),
            std::cmp::Ordering::Equal => self.check_matching(addr, name, ty, forced),
            std::cmp::Ordering::Greater => self.enter_component(start, addr, ty),
        }
    }

    /// Grow the item starting at `addr` to `size` bytes, provided the extra
    /// space is free.
    pub fn expand_item(&mut self, addr: u64, size: u64) -> Result<(), IntervalError> {
        let current = match self.items.get(&addr) {
            Some(item) => item.size,
            None => return Err(IntervalError::NotFound(addr)),
        };
        if size <= current {
            return Ok(());
        }
        let tail = addr.saturating_add(current);
        if !self.is_clear(tail, size - current) {
            return Err(IntervalError::Overlap {
                addr: tail,
                end: addr.saturating_add(size),
            });
        }
        if let Some(item) = self.items.get_mut(&addr) {
            item.size = size;
        }
        Ok(())
    }

    /// Remove the item starting exactly at `addr`.
    pub fn delete_item(&mut self, addr: u64) -> Option<DataInterval> {
        self.items.remove(&addr)
    }

    /// Access path from the start of the item containing `addr` down to the
    /// innermost member or element at `addr`.
    pub fn components_for_address(&self, addr: u64) -> Option<Vec<ComponentStep>> {
        let (start, item) = self.find(addr)?;
        let mut path = Vec::new();
        let mut ty = item.ty.resolve();
        let mut bit = ((addr - start) * 8) as usize;
        loop {
            let (step, inner, remainder) = match &*ty.borrow() {
                Type::Compound(c) => {
                    let Some(index) = c.field_index_at_offset(bit) else {
                        break;
                    };
                    let field = &c.fields()[index];
                    (
                        ComponentStep::Member(field.name.clone()),
                        field.ty.resolve(),
                        bit - c.offset_to(index),
                    )
                }
                Type::Array(a) => {
                    let elem = a.base.size().max(8);
                    (
                        ComponentStep::Index((bit / elem) as u64),
                        a.base.resolve(),
                        bit % elem,
                    )
                }
                _ => break,
            };
            path.push(step);
            ty = inner;
            bit = remainder;
        }
        Some(path)
    }

    /// One `start-end name ctype` line per item.
    pub fn prints(&self) -> String {
        let mut out = String::new();
        for (start, item) in self.iter() {
            let _ = writeln!(
                out,
                "{:#x}-{:#x} {} {}",
                start,
                end_of(start, item),
                item.name,
                item.ty.ctype(false)
            );
        }
        out
    }

    /// JSON snapshot of the map.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let snapshot: Vec<IntervalSnapshot<'_>> = self
            .iter()
            .map(|(start, item)| IntervalSnapshot {
                start,
                size: item.size,
                name: &item.name,
                ctype: item.ty.ctype(false),
            })
            .collect();
        serde_json::to_string_pretty(&snapshot)
    }

    /// Bytes an item of type `ty` at `addr` occupies. An unbounded array
    /// reaches up to the next item.
    fn span_for(&self, addr: u64, ty: &SharedType) -> u64 {
        if ty.is_unbounded_array() {
            let elem = ty.resolve().borrow().as_array().base.bytes().max(1) as u64;
            return match self.items.range(addr.saturating_add(1)..).next() {
                Some((&next, _)) => next - addr,
                None => elem.saturating_mul(NO_BOUND as u64),
            };
        }
        ty.bytes().max(1) as u64
    }

    /// An unbounded array ends where the next known item begins.
    fn shrink_unbounded_before(&mut self, addr: u64) {
        let Some((&start, item)) = self.items.range_mut(..addr).next_back() else {
            return;
        };
        if end_of(start, item) > addr && item.ty.is_unbounded_array() {
            debug!(
                "shrinking unbounded array {} at {:#x} to {} bytes",
                item.name,
                start,
                addr - start
            );
            item.size = addr - start;
        }
    }

    fn replace_components(
        &mut self,
        addr: u64,
        name: String,
        ty: SharedType,
        forced: bool,
    ) -> Result<(), IntervalError> {
        let size = self.span_for(addr, &ty);
        let end = addr.saturating_add(size);
        let overlapping: Vec<u64> = self.items.range(addr..end).map(|(&s, _)| s).collect();

        let mut ty = ty;
        if !overlapping.is_empty() && !forced {
            let resolved = ty.resolve();
            if !(resolved.resolves_to_compound() || resolved.resolves_to_array()) {
                warn!("{} at {:#x} overlaps existing items", name, addr);
                return Err(IntervalError::Overlap { addr, end });
            }
            let aggregate = resolved.deep_clone();
            for start in &overlapping {
                let item = &self.items[start];
                if end_of(*start, item) > end {
                    warn!("{} at {:#x} weaves with the item at {:#x}", name, addr, start);
                    return Err(IntervalError::Weave {
                        addr,
                        existing: *start,
                        name,
                    });
                }
                let bit = ((start - addr) * 8) as usize;
                if !absorb_component(&aggregate, bit, &item.ty) {
                    warn!(
                        "item {} of type {} at {:#x} does not fit {} at {:#x}",
                        item.name,
                        item.ty.ctype(false),
                        start,
                        ty.ctype(false),
                        addr
                    );
                    return Err(IntervalError::Incompatible {
                        addr: *start,
                        new: ty.ctype(false),
                        existing: item.ty.ctype(false),
                    });
                }
            }
            ty = aggregate;
        }

        for start in overlapping {
            self.items.remove(&start);
        }
        self.items.insert(addr, DataInterval { size, name, ty });
        Ok(())
    }

    fn enter_component(&mut self, start: u64, addr: u64, ty: SharedType) -> Result<(), IntervalError> {
        let container = self.items[&start].ty.resolve();
        let bit = ((addr - start) * 8) as usize;

        let incompatible = |existing: &SharedType| {
            warn!(
                "type {} at {:#x} is not compatible with existing member type {}",
                ty.ctype(false),
                addr,
                existing.ctype(false)
            );
            IntervalError::Incompatible {
                addr,
                new: ty.ctype(false),
                existing: existing.ctype(false),
            }
        };

        if container.resolves_to_compound() {
            if container.compound_ref().is_generic() {
                let mut changed = false;
                container
                    .compound_mut()
                    .update_generic_member(bit / 8, ty.clone(), &mut changed);
                return Ok(());
            }
            let Some(member) = container.compound_ref().type_at_offset(bit) else {
                return Err(incompatible(&SharedType::void()));
            };
            if !member.is_compatible_with(&ty, false) {
                return Err(incompatible(&member));
            }
            let mut changed = false;
            let met = member.meet_with(&ty, &mut changed, false);
            if met.size() > member.size() {
                return Err(incompatible(&member));
            }
            container.compound_mut().set_type_at_offset(bit, met);
            Ok(())
        } else if container.resolves_to_array() {
            let base = container.borrow().as_array().base.clone();
            if !base.is_compatible_with(&ty, false) {
                return Err(incompatible(&base));
            }
            let mut changed = false;
            let met = base.meet_with(&ty, &mut changed, false);
            if met.size() > base.size() {
                return Err(incompatible(&base));
            }
            container.array_mut().set_base(met);
            Ok(())
        } else {
            warn!("existing type at {:#x} is not a struct or array type", start);
            Err(IntervalError::NotAggregate { addr: start })
        }
    }

    fn check_matching(
        &mut self,
        addr: u64,
        name: String,
        ty: SharedType,
        forced: bool,
    ) -> Result<(), IntervalError> {
        let Some(item) = self.items.get_mut(&addr) else {
            return Err(IntervalError::NotFound(addr));
        };
        if forced {
            item.name = name;
            item.ty = ty;
            return Ok(());
        }
        if !item.ty.is_compatible_with(&ty, false) {
            warn!(
                "at {:#x} type {} is not compatible with existing type {}",
                addr,
                ty.ctype(false),
                item.ty.ctype(false)
            );
            return Err(IntervalError::Incompatible {
                addr,
                new: ty.ctype(false),
                existing: item.ty.ctype(false),
            });
        }
        let mut changed = false;
        let met = item.ty.meet_with(&ty, &mut changed, false);
        if !met.is_unbounded_array() && met.bytes() as u64 > item.size {
            warn!(
                "at {:#x} type {} would grow existing type {} past {} bytes",
                addr,
                ty.ctype(false),
                item.ty.ctype(false),
                item.size
            );
            return Err(IntervalError::Incompatible {
                addr,
                new: ty.ctype(false),
                existing: item.ty.ctype(false),
            });
        }
        item.ty = met;
        Ok(())
    }
}

/// Meet `item` into the component of `aggregate` at `bit`. Returns false
/// when the component cannot hold it, including when the met type would be
/// wider than the component.
fn absorb_component(aggregate: &SharedType, bit: usize, item: &SharedType) -> bool {
    if aggregate.resolves_to_compound() {
        let Some(member) = aggregate.compound_ref().type_at_offset(bit) else {
            return false;
        };
        if !member.is_compatible_with(item, false) {
            return false;
        }
        let mut changed = false;
        let met = member.meet_with(item, &mut changed, false);
        if met.size() > member.size() {
            return false;
        }
        aggregate.compound_mut().set_type_at_offset(bit, met);
        true
    } else {
        let base = aggregate.borrow().as_array().base.clone();
        if !base.is_compatible_with(item, false) {
            return false;
        }
        let mut changed = false;
        let met = base.meet_with(item, &mut changed, false);
        if met.size() > base.size() {
            return false;
        }
        aggregate.array_mut().set_base(met);
        true
    }
}
