//! Liveness helpers for assignment expressions.
//!
//! The dataflow framework owns statements and their use chains; these
//! helpers only need a statement's defined location, its value and how many
//! statements use it, which [`Statement`] exposes.

use super::{Exp, ExpKind, Oper};

/// A statement as seen by the liveness helpers.
pub trait Statement {
    /// The location this statement defines, if any.
    fn left(&self) -> Option<&Exp>;

    /// The value assigned to [`left`](Self::left).
    fn right(&self) -> Option<&Exp> {
        None
    }

    /// Number of statements that use this one's definition.
    fn num_use_by(&self) -> usize;
}

impl<T: Statement + ?Sized> Statement for &T {
    fn left(&self) -> Option<&Exp> {
        (**self).left()
    }

    fn right(&self) -> Option<&Exp> {
        (**self).right()
    }

    fn num_use_by(&self) -> usize {
        (**self).num_use_by()
    }
}

/// Whether a write of `size` bits to `a` may overlap one to `b`.
///
/// Only memory references alias. Two references whose addresses are both
/// constant offsets from `%afp` alias when their byte ranges intersect; any
/// other pair of memory references may alias.
pub fn may_alias(a: &Exp, b: &Exp, size: u32) -> bool {
    if !a.is_mem_of() || !b.is_mem_of() {
        return false;
    }
    let offsets = (a.sub1().and_then(afp_offset), b.sub1().and_then(afp_offset));
    match offsets {
        (Some(x), Some(y)) => {
            let bytes = i64::from(size.max(8) / 8);
            x < y + bytes && y < x + bytes
        }
        _ => true,
    }
}

/// `k` for `%afp`, `%afp + k` or `%afp - k`.
fn afp_offset(e: &Exp) -> Option<i64> {
    match &e.kind {
        ExpKind::Terminal(Oper::AFP) => Some(0),
        ExpKind::Binary { op, sub1, sub2 } if sub1.oper() == Oper::AFP => {
            let k = i64::from(sub2.int_value()?);
            match op {
                Oper::Plus => Some(k),
                Oper::Minus => Some(-k),
                _ => None,
            }
        }
        _ => None,
    }
}

impl Exp {
    /// Left side, right side and width of an assignment.
    fn assign_parts(&self) -> Option<(&Exp, &Exp, u32)> {
        match &self.kind {
            ExpKind::Assign { size, lhs, rhs } => Some((lhs, rhs, *size)),
            _ => None,
        }
    }

    /// Whether this assignment overwrites what `s` defined.
    fn kills<S: Statement>(&self, s: &S) -> bool {
        let (Some((lhs, _, size)), Some(left)) = (self.assign_parts(), s.left()) else {
            return false;
        };
        left == lhs || may_alias(left, lhs, size)
    }

    /// Remove from `live` every statement this assignment overwrites. Does
    /// nothing unless this is an assignment.
    pub fn kill_live<S: Statement>(&self, live: &mut Vec<S>) {
        live.retain(|s| !self.kills(s));
    }

    /// Statements of `live_in` that this assignment overwrites and nobody
    /// uses. Any two memory references are taken to overwrite each other.
    pub fn dead_statements<'a, S: Statement>(&self, live_in: &'a [S]) -> Vec<&'a S> {
        let Some((lhs, _, _)) = self.assign_parts() else {
            return Vec::new();
        };
        live_in
            .iter()
            .filter(|s| {
                s.left()
                    .is_some_and(|left| left == lhs || (left.is_mem_of() && lhs.is_mem_of()))
            })
            .filter(|s| s.num_use_by() == 0)
            .collect()
    }

    /// Whether `e` occurs in the value of this assignment, or in the address
    /// when the left side is a memory reference.
    pub fn uses_exp(&self, e: &Exp) -> bool {
        let Some((lhs, rhs, _)) = self.assign_parts() else {
            return false;
        };
        rhs.search(e).is_some() || (lhs.is_mem_of() && lhs.sub1().is_some_and(|addr| addr.search(e).is_some()))
    }

    /// Substitute the definition made by `def` into this assignment, then
    /// normalize the result.
    ///
    /// Every occurrence of the defined location in the right side, and in the
    /// address of a memory left side, is replaced by the defining value.
    pub fn replace_use<S: Statement>(self, def: &S) -> Exp {
        let (Some(left), Some(right)) = (def.left(), def.right()) else {
            return self;
        };
        match self.kind {
            ExpKind::Assign { size, mut lhs, mut rhs } => {
                rhs.search_replace_all(left, right);
                if lhs.is_mem_of() {
                    if let Some(addr) = lhs.sub1_mut() {
                        addr.search_replace_all(left, right);
                    }
                }
                let rhs = (*rhs).simplify_arith();
                let lhs = (*lhs).simplify_arith();
                Exp::assign(size, lhs, rhs).simplify()
            }
            kind => Exp::new(kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stmt {
        exp: Exp,
        uses: usize,
    }

    impl Stmt {
        fn new(lhs: Exp, rhs: Exp) -> Self {
            Self {
                exp: Exp::assign(32, lhs, rhs),
                uses: 0,
            }
        }

        fn used(mut self, uses: usize) -> Self {
            self.uses = uses;
            self
        }
    }

    impl Statement for Stmt {
        fn left(&self) -> Option<&Exp> {
            self.exp.sub1()
        }

        fn right(&self) -> Option<&Exp> {
            self.exp.sub2()
        }

        fn num_use_by(&self) -> usize {
            self.uses
        }
    }

    fn afp_plus(k: i32) -> Exp {
        Exp::plus(Exp::terminal(Oper::AFP), Exp::int(k))
    }

    fn afp_minus(k: i32) -> Exp {
        Exp::minus(Exp::terminal(Oper::AFP), Exp::int(k))
    }

    // --- Alias Tests ---

    #[test]
    fn test_may_alias_frame_slots() {
        let a = Exp::mem_of(afp_minus(8));
        let b = Exp::mem_of(afp_minus(4));
        let c = Exp::mem_of(afp_minus(6));
        assert!(!may_alias(&a, &b, 32));
        assert!(may_alias(&a, &c, 32));
        assert!(may_alias(&a, &a.clone(), 8));
        assert!(!may_alias(&Exp::mem_of(Exp::terminal(Oper::AFP)), &Exp::mem_of(afp_plus(4)), 32));
        assert!(may_alias(&Exp::mem_of(Exp::terminal(Oper::AFP)), &Exp::mem_of(afp_plus(4)), 64));
    }

    #[test]
    fn test_may_alias_unknown_addresses() {
        let a = Exp::mem_of(Exp::reg_of(8));
        let b = Exp::mem_of(afp_minus(4));
        assert!(may_alias(&a, &b, 32));
        assert!(!may_alias(&Exp::reg_of(8), &Exp::reg_of(8), 32));
        assert!(!may_alias(&a, &Exp::reg_of(8), 32));
    }

    // --- Kill Tests ---

    #[test]
    fn test_kill_live() {
        let def = Exp::assign(32, Exp::mem_of(afp_minus(8)), Exp::int(0));
        let mut live = vec![
            Stmt::new(Exp::reg_of(8), Exp::int(1)),
            Stmt::new(Exp::mem_of(afp_minus(8)), Exp::int(2)),
            Stmt::new(Exp::mem_of(afp_minus(16)), Exp::int(3)),
            Stmt::new(Exp::mem_of(Exp::reg_of(29)), Exp::int(4)),
        ];
        def.kill_live(&mut live);
        let rhs: Vec<i32> = live.iter().filter_map(|s| s.right().and_then(Exp::int_value)).collect();
        assert_eq!(rhs, vec![1, 3]);
    }

    #[test]
    fn test_kill_live_through_references() {
        let a = Stmt::new(Exp::reg_of(8), Exp::int(1));
        let b = Stmt::new(Exp::reg_of(9), Exp::int(2));
        let mut live = vec![&a, &b];
        Exp::assign(32, Exp::reg_of(9), Exp::int(0)).kill_live(&mut live);
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].left(), Some(&Exp::reg_of(8)));
    }

    #[test]
    fn test_kill_live_on_non_assignment() {
        let mut live = vec![Stmt::new(Exp::reg_of(8), Exp::int(1))];
        Exp::reg_of(8).kill_live(&mut live);
        assert_eq!(live.len(), 1);
    }

    #[test]
    fn test_dead_statements() {
        let def = Exp::assign(32, Exp::mem_of(Exp::reg_of(28)), Exp::int(0));
        let live_in = vec![
            Stmt::new(Exp::mem_of(afp_minus(8)), Exp::int(1)),
            Stmt::new(Exp::mem_of(afp_minus(12)), Exp::int(2)).used(1),
            Stmt::new(Exp::reg_of(28), Exp::int(3)),
        ];
        let dead = def.dead_statements(&live_in);
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].right(), Some(&Exp::int(1)));

        let def = Exp::assign(32, Exp::reg_of(28), Exp::int(0));
        let dead = def.dead_statements(&live_in);
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].right(), Some(&Exp::int(3)));
    }

    // --- Use Tests ---

    #[test]
    fn test_uses_exp() {
        let a = Exp::assign(
            32,
            Exp::mem_of(Exp::plus(Exp::reg_of(29), Exp::int(4))),
            Exp::plus(Exp::reg_of(8), Exp::int(1)),
        );
        assert!(a.uses_exp(&Exp::reg_of(8)));
        assert!(a.uses_exp(&Exp::reg_of(29)));
        assert!(!a.uses_exp(&Exp::reg_of(30)));

        let b = Exp::assign(32, Exp::reg_of(29), Exp::int(0));
        assert!(!b.uses_exp(&Exp::reg_of(29)));
        assert!(!Exp::reg_of(29).uses_exp(&Exp::reg_of(29)));
    }

    #[test]
    fn test_replace_use() {
        // r[28] := r[28] - 4 propagated into m[r[28] + 4] := r[28]
        let def = Stmt::new(Exp::reg_of(28), Exp::minus(Exp::reg_of(28), Exp::int(4)));
        let a = Exp::assign(32, Exp::mem_of(Exp::plus(Exp::reg_of(28), Exp::int(4))), Exp::reg_of(28));
        let res = a.replace_use(&def);
        assert_eq!(
            res,
            Exp::assign(32, Exp::mem_of(Exp::reg_of(28)), Exp::plus(Exp::reg_of(28), Exp::int(-4)))
        );
    }

    #[test]
    fn test_replace_use_leaves_register_left_side() {
        let def = Stmt::new(Exp::reg_of(8), Exp::int(5));
        let a = Exp::assign(32, Exp::reg_of(8), Exp::plus(Exp::reg_of(8), Exp::reg_of(8)));
        let res = a.replace_use(&def);
        assert_eq!(res, Exp::assign(32, Exp::reg_of(8), Exp::int(10)));
    }
}
