//! The meet/merge lattice.
//!
//! `meet_with` is the monotone join used by iterative type inference. It
//! never mutates its operands: when nothing new is learned it hands back the
//! receiver itself, otherwise a freshly built type. Callers detect progress
//! through the `changed` flag.

use crate::types::{SharedType, Type, TypeKind, UnionType, STD_SIZE};

/// Aggregates outrank scalars; the higher ranked side of a meet decides.
fn rank(kind: TypeKind) -> u8 {
    match kind {
        TypeKind::Union => 3,
        TypeKind::Compound => 2,
        TypeKind::Array => 1,
        _ => 0,
    }
}

impl SharedType {
    /// Join `other` into this type.
    ///
    /// Sets `changed` when the result carries information this type did not.
    /// With `highest_ptr`, pointer meets keep the more specific pointee
    /// instead of recursing into the pointees.
    pub fn meet_with(&self, other: &SharedType, changed: &mut bool, highest_ptr: bool) -> SharedType {
        let alias_target = match &*self.borrow() {
            Type::Named(n) => Some(n.resolves_to()),
            _ => None,
        };
        if let Some(target) = alias_target {
            return match target {
                Some(target) => {
                    let result = target.meet_with(other, changed, highest_ptr);
                    if result.ptr_eq(&target) {
                        self.clone()
                    } else {
                        result
                    }
                }
                None if other.resolves_to_void() || *self == *other => self.clone(),
                None => self.create_union(other, changed, highest_ptr),
            };
        }

        if self.borrow().is_void() {
            if other.resolves_to_void() {
                return self.clone();
            }
            *changed = true;
            return other.deep_clone();
        }
        let o = other.resolve();
        if o.borrow().is_void() {
            return self.clone();
        }

        if rank(o.kind()) > rank(self.kind()) {
            let mut swapped = false;
            let result = o.meet_with(self, &mut swapped, highest_ptr);
            *changed |= result != *self;
            return result;
        }

        let this = self.borrow();
        let that = o.borrow();
        match (&*this, &*that) {
            (Type::Func(_), _) => {
                if *this == *that {
                    self.clone()
                } else {
                    self.create_union(other, changed, highest_ptr)
                }
            }

            (Type::Boolean, Type::Boolean) => self.clone(),
            (Type::Boolean, Type::Size(s)) if s.size == 1 => self.clone(),

            (Type::Char, Type::Char) => self.clone(),
            (Type::Char, Type::Integer(i)) => {
                *changed = true;
                if i.size == 0 {
                    SharedType::integer(8, i.signedness)
                } else {
                    o.deep_clone()
                }
            }
            (Type::Char, Type::Size(s)) if s.size == 8 => self.clone(),

            (Type::Integer(me), Type::Integer(ot)) => {
                let sign = (me.signedness.signum() + ot.signedness.signum()).clamp(-1, 1);
                let size = me.size.max(ot.size);
                if sign == me.signedness.signum() && size == me.size {
                    self.clone()
                } else {
                    *changed = true;
                    SharedType::integer(size, sign)
                }
            }
            (Type::Integer(me), Type::Char) => {
                if me.size == 0 {
                    *changed = true;
                    SharedType::integer(8, me.signedness)
                } else {
                    self.clone()
                }
            }
            (Type::Integer(me), Type::Size(s)) => {
                if s.size <= me.size {
                    self.clone()
                } else {
                    *changed = true;
                    SharedType::integer(s.size, me.signedness)
                }
            }

            (Type::Float(me), Type::Float(ot)) => grow_float(self, me.size, ot.size, changed),
            (Type::Float(me), Type::Size(ot)) => grow_float(self, me.size, ot.size, changed),

            (Type::Pointer(_), Type::Size(_)) => self.clone(),
            (Type::Pointer(p), Type::Pointer(q)) => {
                let (a, b) = (p.points_to.clone(), q.points_to.clone());
                self.meet_pointers(&o, &a, &b, changed, highest_ptr)
            }

            (Type::Array(me), Type::Array(ot)) => {
                let mut inner = false;
                let base = me.base.meet_with(&ot.base, &mut inner, highest_ptr);
                let length = me.convert_length(&base).min(ot.convert_length(&base));
                if base.ptr_eq(&me.base) && length == me.length {
                    self.clone()
                } else {
                    *changed = true;
                    SharedType::array(base, length)
                }
            }
            (Type::Array(me), _) => {
                if me.base.is_compatible_with(other, false) {
                    self.clone()
                } else {
                    self.create_union(other, changed, highest_ptr)
                }
            }

            (Type::Compound(me), Type::Compound(ot)) => {
                if *this == *that || me.is_super_struct_of(ot) {
                    self.clone()
                } else if ot.is_super_struct_of(me) {
                    *changed = true;
                    o.clone()
                } else {
                    self.create_union(other, changed, highest_ptr)
                }
            }
            (Type::Compound(me), _) => {
                let first = match me.fields().first() {
                    Some(field) if field.ty.is_compatible_with(other, false) => field.ty.clone(),
                    _ => {
                        return self.create_union(other, changed, highest_ptr);
                    }
                };
                let mut inner = false;
                let met = first.meet_with(other, &mut inner, highest_ptr);
                if met.ptr_eq(&first) {
                    return self.clone();
                }
                *changed = true;
                let mut copy = me.deep_clone();
                *copy.field_type_mut(0) = met;
                SharedType::compound(copy)
            }

            (Type::Union(_), Type::Union(ot)) => {
                let members: Vec<SharedType> = ot.members().iter().map(|m| m.ty.clone()).collect();
                let mut result = self.clone();
                for member in &members {
                    result = result.meet_with(member, changed, highest_ptr);
                }
                result
            }
            (Type::Union(me), _) => {
                if me.members().iter().any(|m| m.ty == *other) {
                    return self.clone();
                }
                if let Some(index) = me
                    .members()
                    .iter()
                    .position(|m| m.ty.is_compatible_with(other, false))
                {
                    let member = me.members()[index].ty.clone();
                    let mut inner = false;
                    let met = member.meet_with(other, &mut inner, highest_ptr);
                    if met.ptr_eq(&member) {
                        return self.clone();
                    }
                    *changed = true;
                    let mut copy = me.deep_clone();
                    copy.set_member_type(index, met);
                    return SharedType::union(copy);
                }
                let mut copy = me.deep_clone();
                if copy.add_alternative(other.deep_clone()) {
                    *changed = true;
                    SharedType::union(copy)
                } else {
                    self.clone()
                }
            }

            (Type::Size(me), Type::Size(ot)) => {
                if ot.size > me.size {
                    *changed = true;
                    SharedType::size_only(ot.size)
                } else {
                    self.clone()
                }
            }
            (Type::Size(me), Type::Integer(ot)) => {
                *changed = true;
                SharedType::integer(me.size.max(ot.size), ot.signedness)
            }
            (Type::Size(me), Type::Float(ot)) => {
                *changed = true;
                SharedType::float(me.size.max(ot.size))
            }
            (Type::Size(_), Type::Pointer(_)) => {
                *changed = true;
                o.clone()
            }
            (Type::Size(me), Type::Char) if me.size == 8 => {
                *changed = true;
                o.clone()
            }
            (Type::Size(me), Type::Boolean) if me.size == 1 => {
                *changed = true;
                o.clone()
            }

            (Type::Upper(a), Type::Upper(b)) | (Type::Lower(a), Type::Lower(b)) => {
                let mut inner = false;
                let base = a.meet_with(b, &mut inner, highest_ptr);
                if base.ptr_eq(a) {
                    self.clone()
                } else {
                    *changed = true;
                    match &*this {
                        Type::Upper(_) => SharedType::upper(base),
                        _ => SharedType::lower(base),
                    }
                }
            }

            _ => {
                self.create_union(other, changed, highest_ptr)
            }
        }
    }

    fn meet_pointers(
        &self,
        other: &SharedType,
        a: &SharedType,
        b: &SharedType,
        changed: &mut bool,
        highest_ptr: bool,
    ) -> SharedType {
        let (self_alpha, other_alpha) = (self.points_to_alpha(), other.points_to_alpha());
        if self_alpha && !other_alpha {
            *changed = true;
            return SharedType::pointer(b.clone());
        }
        if other_alpha && !self_alpha {
            return self.clone();
        }

        if *a == *b {
            return self.clone();
        }

        if highest_ptr {
            if a.is_sub_type_or_equal(b) {
                *changed = true;
                return other.clone();
            }
            if b.is_sub_type_or_equal(a) {
                return self.clone();
            }
            *changed = true;
            return SharedType::pointer(SharedType::void());
        }

        let depth = self.pointer_depth();
        if depth > 1 && depth == other.pointer_depth() {
            let (fa, fb) = (self.final_points_to(), other.final_points_to());
            if fa.resolves_to_void() {
                *changed = true;
                return other.clone();
            }
            if fb.resolves_to_void() || fa == fb {
                return self.clone();
            }
        }

        if a.is_compatible_with(b, false) {
            let mut inner = false;
            let met = a.meet_with(b, &mut inner, highest_ptr);
            if met.ptr_eq(a) {
                return self.clone();
            }
            *changed = true;
            return SharedType::pointer(met);
        }
        self.create_union(other, changed, highest_ptr)
    }

    /// Union of this type and `other`.
    ///
    /// An existing union absorbs the other side; an aggregate whose first
    /// element already accounts for the other side is kept as is.
    pub fn create_union(&self, other: &SharedType, changed: &mut bool, highest_ptr: bool) -> SharedType {
        let o = other.resolve();
        if o.resolves_to_union() {
            let mut ignored = false;
            let result = o.meet_with(self, &mut ignored, highest_ptr);
            *changed = true;
            return result;
        }
        let absorbed = match &*o.borrow() {
            Type::Compound(c) => c
                .fields()
                .first()
                .map_or(false, |f| f.ty.is_compatible_with(self, false)),
            Type::Array(a) => a.base.is_compatible_with(self, false),
            _ => false,
        };
        if absorbed {
            *changed = true;
            return other.clone();
        }

        let mut union = UnionType::new();
        union.add_alternative(self.deep_clone());
        union.add_alternative(other.deep_clone());
        *changed = true;
        SharedType::union(union)
    }

    /// Narrow unification of partial knowledge, as used by constraint
    /// solving: `size16` merged with `int` of unknown width gives a 16 bit
    /// int. Returns `None` when the pair cannot be merged.
    ///
    /// # Panics
    ///
    /// Panics for kinds that have no merge at all.
    pub fn merge_with(&self, other: &SharedType) -> Option<SharedType> {
        let this = self.borrow();
        match &*this {
            Type::Integer(me) => {
                let o = other.resolve();
                let that = o.borrow();
                let Type::Integer(ot) = &*that else {
                    return None;
                };
                let size = if me.size == 0 { ot.size } else { me.size };
                let signedness = if me.signedness == 0 { ot.signedness } else { me.signedness };
                if size == me.size && signedness == me.signedness {
                    Some(self.clone())
                } else {
                    Some(SharedType::integer(size, signedness))
                }
            }
            Type::Size(me) => {
                let merged = other.resolve().deep_clone();
                let resizable = match merged.kind() {
                    TypeKind::Integer | TypeKind::Float | TypeKind::Size => true,
                    TypeKind::Pointer => me.size == STD_SIZE,
                    _ => false,
                };
                if !resizable {
                    return None;
                }
                merged.set_size(me.size);
                Some(merged)
            }
            Type::Upper(_) | Type::Lower(_) => Some(self.clone()),
            other_ty => panic!("merge_with is not defined for {} types", other_ty.kind()),
        }
    }

    /// True when this type is at most as general as `other`: void, equal,
    /// or a compound that is a prefix of `other`.
    pub fn is_sub_type_or_equal(&self, other: &SharedType) -> bool {
        if self.resolves_to_void() || *self == *other {
            return true;
        }
        let (a, b) = (self.resolve(), other.resolve());
        if a.resolves_to_compound() && b.resolves_to_compound() {
            return a.compound_ref().is_sub_struct_of(&b.compound_ref());
        }
        false
    }
}

fn grow_float(this: &SharedType, own: usize, other: usize, changed: &mut bool) -> SharedType {
    if other > own {
        *changed = true;
        SharedType::float(other)
    } else {
        this.clone()
    }
}

#[cfg(test)]
mod tests {
    use crate::compound::CompoundType;
    use crate::types::{SharedType, Signature, TypeKind, UnionType};
    use crate::TypeEnv;

    fn meet(a: &SharedType, b: &SharedType) -> (SharedType, bool) {
        let mut changed = false;
        let result = a.meet_with(b, &mut changed, false);
        (result, changed)
    }

    // --- Bottom and Identity Tests ---

    #[test]
    fn test_void_is_bottom() {
        let int = SharedType::integer(32, 1);
        let (r, changed) = meet(&SharedType::void(), &int);
        assert_eq!(r, int);
        assert!(changed);

        let (r, changed) = meet(&int, &SharedType::void());
        assert!(r.ptr_eq(&int));
        assert!(!changed);
    }

    #[test]
    fn test_meet_self_is_unchanged() {
        let samples = [
            SharedType::boolean(),
            SharedType::char(),
            SharedType::integer(16, -1),
            SharedType::float(64),
            SharedType::size_only(32),
            SharedType::pointer(SharedType::char()),
            SharedType::array(SharedType::integer(32, 1), 8),
            SharedType::func(Some(Signature::new("f"))),
            SharedType::upper(SharedType::float(64)),
        ];
        for ty in &samples {
            let (r, changed) = meet(ty, ty);
            assert!(!changed, "{} changed when met with itself", ty);
            assert_eq!(r, *ty);
        }
    }

    // --- Scalar Tests ---

    #[test]
    fn test_size_meets_size() {
        let (r, changed) = meet(&SharedType::size_only(16), &SharedType::size_only(32));
        assert_eq!(r.size(), 32);
        assert!(changed);

        let (r, changed) = meet(&SharedType::size_only(32), &SharedType::size_only(16));
        assert_eq!(r.size(), 32);
        assert!(!changed);
    }

    #[test]
    fn test_integer_signedness_votes() {
        let (r, changed) = meet(&SharedType::integer(32, 0), &SharedType::integer(32, -1));
        assert!(changed);
        assert_eq!(r, SharedType::integer(32, -1));

        let (r, changed) = meet(&SharedType::integer(32, 1), &SharedType::integer(32, -1));
        assert!(changed);
        assert_eq!(r.ctype(false), "/*signed?*/int");

        let (r, changed) = meet(&SharedType::integer(32, 1), &SharedType::integer(32, 1));
        assert!(!changed);
        assert_eq!(r, SharedType::integer(32, 1));
    }

    #[test]
    fn test_integer_width_grows() {
        let (r, changed) = meet(&SharedType::integer(0, 1), &SharedType::integer(16, 1));
        assert!(changed);
        assert_eq!(r.size(), 16);

        let (r, changed) = meet(&SharedType::integer(32, 1), &SharedType::integer(16, 1));
        assert!(!changed);
        assert_eq!(r.size(), 32);
    }

    #[test]
    fn test_size_refined_by_concrete_kind() {
        let (r, changed) = meet(&SharedType::size_only(16), &SharedType::integer(0, -1));
        assert!(changed);
        assert_eq!(r, SharedType::integer(16, -1));
        assert!(r.is_complete());

        let (r, _) = meet(&SharedType::size_only(64), &SharedType::float(32));
        assert_eq!(r.kind(), TypeKind::Float);
        assert_eq!(r.size(), 64);

        let (r, changed) = meet(&SharedType::size_only(8), &SharedType::char());
        assert!(changed);
        assert_eq!(r.kind(), TypeKind::Char);

        let p = SharedType::pointer(SharedType::integer(32, 1));
        let (r, _) = meet(&SharedType::size_only(32), &p);
        assert!(r.ptr_eq(&p));
    }

    #[test]
    fn test_char_and_integer() {
        let (r, changed) = meet(&SharedType::char(), &SharedType::integer(0, -1));
        assert!(changed);
        assert_eq!(r, SharedType::integer(8, -1));

        let (r, changed) = meet(&SharedType::integer(16, 1), &SharedType::char());
        assert!(!changed);
        assert_eq!(r.size(), 16);
    }

    #[test]
    fn test_integer_float_conflict_makes_union() {
        let (r, changed) = meet(&SharedType::integer(32, 1), &SharedType::float(32));
        assert!(changed);
        assert_eq!(r.kind(), TypeKind::Union);
        assert_eq!(r.ctype(false), "union { int x0; float x1; }");

        let (again, changed) = meet(&r, &SharedType::float(32));
        assert!(!changed);
        assert!(again.ptr_eq(&r));
    }

    // --- Pointer Tests ---

    #[test]
    fn test_pointer_to_void_refined() {
        let pv = SharedType::pointer(SharedType::void());
        let pi = SharedType::pointer(SharedType::integer(32, 1));
        let (r, changed) = meet(&pv, &pi);
        assert!(changed);
        assert_eq!(r, pi);

        let (r, changed) = meet(&pi, &pv);
        assert!(!changed);
        assert!(r.ptr_eq(&pi));
    }

    #[test]
    fn test_pointer_pointee_meet() {
        let a = SharedType::pointer(SharedType::integer(32, 0));
        let b = SharedType::pointer(SharedType::integer(32, -1));
        let (r, changed) = meet(&a, &b);
        assert!(changed);
        assert_eq!(r.dereference(), SharedType::integer(32, -1));
    }

    #[test]
    fn test_pointer_highest_ptr() {
        let small = SharedType::compound(CompoundType::new().with_field(SharedType::integer(32, 1), "a"));
        let large = SharedType::compound(
            CompoundType::new()
                .with_field(SharedType::integer(32, 1), "a")
                .with_field(SharedType::char(), "b"),
        );
        let ps = SharedType::pointer(small);
        let pl = SharedType::pointer(large);

        let mut changed = false;
        let r = ps.meet_with(&pl, &mut changed, true);
        assert!(changed);
        assert!(r.ptr_eq(&pl));

        let mut changed = false;
        let r = pl.meet_with(&ps, &mut changed, true);
        assert!(!changed);
        assert!(r.ptr_eq(&pl));

        let mut changed = false;
        let r = SharedType::pointer(SharedType::char())
            .meet_with(&SharedType::pointer(SharedType::float(32)), &mut changed, true);
        assert!(changed);
        assert!(r.dereference().borrow().is_void());
    }

    #[test]
    fn test_pointer_to_alpha_yields() {
        let env = TypeEnv::new();
        let alpha = env.ptr_alpha();
        let concrete = SharedType::pointer(SharedType::float(64));
        let (r, changed) = meet(&alpha, &concrete);
        assert!(changed);
        assert_eq!(r, concrete);

        let (r, changed) = meet(&concrete, &alpha);
        assert!(!changed);
        assert!(r.ptr_eq(&concrete));
    }

    // --- Aggregate Tests ---

    #[test]
    fn test_compound_first_field_meet() {
        let s = SharedType::compound(
            CompoundType::new()
                .with_field(SharedType::size_only(32), "a")
                .with_field(SharedType::char(), "b"),
        );
        let (r, changed) = meet(&s, &SharedType::integer(32, -1));
        assert!(changed);
        assert_eq!(r.compound_ref().fields()[0].ty, SharedType::integer(32, -1));
        // Input untouched
        assert_eq!(s.compound_ref().fields()[0].ty.kind(), TypeKind::Size);

        let (swapped, changed) = meet(&SharedType::integer(32, -1), &s);
        assert!(changed);
        assert_eq!(swapped, r);
    }

    #[test]
    fn test_compound_prefix_wins() {
        let small = SharedType::compound(CompoundType::new().with_field(SharedType::integer(32, 1), "a"));
        let large = SharedType::compound(
            CompoundType::new()
                .with_field(SharedType::integer(32, 1), "a")
                .with_field(SharedType::float(32), "b"),
        );
        let (r, changed) = meet(&small, &large);
        assert!(changed);
        assert!(r.ptr_eq(&large));
        let (r, changed) = meet(&large, &small);
        assert!(!changed);
        assert!(r.ptr_eq(&large));
    }

    #[test]
    fn test_array_meet_keeps_byte_size() {
        let bytes = SharedType::array(SharedType::size_only(8), 8);
        let ints = SharedType::array(SharedType::char(), 4);
        let (r, changed) = meet(&bytes, &ints);
        assert!(changed);
        let arr = r.borrow();
        let arr = arr.as_array();
        assert_eq!(arr.base.kind(), TypeKind::Char);
        assert_eq!(arr.length, 4);
    }

    #[test]
    fn test_array_absorbs_element() {
        let arr = SharedType::array(SharedType::char(), 16);
        let (r, changed) = meet(&arr, &SharedType::char());
        assert!(!changed);
        assert!(r.ptr_eq(&arr));
        let (r, changed) = meet(&SharedType::char(), &arr);
        assert!(changed);
        assert!(r.ptr_eq(&arr));
    }

    #[test]
    fn test_union_refines_compatible_member() {
        let mut u = UnionType::new();
        u.add_alternative(SharedType::integer(32, 0));
        u.add_alternative(SharedType::float(64));
        let u = SharedType::union(u);

        let (r, changed) = meet(&u, &SharedType::integer(32, -1));
        assert!(changed);
        assert_eq!(r.ctype(false), "union { unsigned int x0; double x1; }");

        let (r, changed) = meet(&u, &SharedType::pointer(SharedType::char()));
        assert!(changed);
        assert_eq!(r.borrow().size(), 64);
        if let crate::Type::Union(members) = &*r.borrow() {
            assert_eq!(members.len(), 3);
        } else {
            panic!("expected union");
        };
    }

    #[test]
    fn test_union_meets_union() {
        let mut a = UnionType::new();
        a.add_alternative(SharedType::integer(32, 1));
        a.add_alternative(SharedType::float(32));
        let a = SharedType::union(a);
        let (r, changed) = meet(&a, &a.deep_clone());
        assert!(!changed);
        assert!(r.ptr_eq(&a));
    }

    // --- Named Tests ---

    #[test]
    fn test_named_meets_through_alias() {
        let env = TypeEnv::new();
        env.add_named_type("word", &SharedType::integer(16, 1));
        let word = env.named("word");

        let (r, changed) = meet(&word, &SharedType::integer(16, 1));
        assert!(!changed);
        assert!(r.ptr_eq(&word));

        let (r, changed) = meet(&word, &SharedType::integer(32, 1));
        assert!(changed);
        assert_eq!(r, SharedType::integer(32, 1));
    }

    #[test]
    fn test_unresolved_named() {
        let env = TypeEnv::new();
        let t = env.named("T");
        let (r, changed) = meet(&t, &env.named("T"));
        assert!(!changed);
        assert!(r.ptr_eq(&t));

        let (r, changed) = meet(&t, &SharedType::char());
        assert!(changed);
        assert_eq!(r.kind(), TypeKind::Union);
    }

    // --- Merge Tests ---

    #[test]
    fn test_merge_size_with_integer() {
        let merged = SharedType::size_only(16)
            .merge_with(&SharedType::integer(0, 1))
            .unwrap();
        assert_eq!(merged, SharedType::integer(16, 1));
        assert_eq!(merged.size(), 16);
    }

    #[test]
    fn test_merge_integers_fills_unknowns() {
        let a = SharedType::integer(0, -1);
        let merged = a.merge_with(&SharedType::integer(32, 1)).unwrap();
        assert_eq!(merged.size(), 32);
        assert_eq!(merged, SharedType::integer(32, -1));

        let full = SharedType::integer(32, 1);
        assert!(full.merge_with(&SharedType::integer(16, -1)).unwrap().ptr_eq(&full));
        assert!(full.merge_with(&SharedType::float(32)).is_none());
    }

    #[test]
    #[should_panic(expected = "merge_with is not defined")]
    fn test_merge_undefined_kind_panics() {
        let _ = SharedType::char().merge_with(&SharedType::char());
    }

    // --- Subtype Tests ---

    #[test]
    fn test_is_sub_type_or_equal() {
        let int = SharedType::integer(32, 1);
        assert!(SharedType::void().is_sub_type_or_equal(&int));
        assert!(int.is_sub_type_or_equal(&int.deep_clone()));
        assert!(!int.is_sub_type_or_equal(&SharedType::void()));

        let small = SharedType::compound(CompoundType::new().with_field(int.clone(), "a"));
        let large = SharedType::compound(
            CompoundType::new()
                .with_field(int.clone(), "a")
                .with_field(int.clone(), "b"),
        );
        assert!(small.is_sub_type_or_equal(&large));
        assert!(!large.is_sub_type_or_equal(&small));
    }
}
