//! Sum-of-terms normalization and the narrower structural rewrites.
//!
//! [`Exp::simplify_arith`] is not part of the [`simplify`](Exp::simplify)
//! fixed point: it reorders terms, so callers invoke it where a canonical
//! `(positives - negatives) + k` shape is wanted.

use super::{Exp, ExpKind, Oper};

/// The three buckets of a `+`/`-` chain.
#[derive(Debug, Default)]
pub struct Terms<'a> {
    pub positives: Vec<&'a Exp>,
    pub negatives: Vec<&'a Exp>,
    pub integers: Vec<i32>,
}

impl Exp {
    /// Split a `+`/`-` chain into its terms. Integer constants are collected
    /// with their sign applied; everything else lands in `positives` or
    /// `negatives`. Types and assignments are looked through.
    pub fn partition_terms<'a>(&'a self, terms: &mut Terms<'a>, negate: bool) {
        match &self.kind {
            ExpKind::Binary {
                op: Oper::Plus,
                sub1,
                sub2,
            } => {
                sub1.partition_terms(terms, negate);
                sub2.partition_terms(terms, negate);
            }
            ExpKind::Binary {
                op: Oper::Minus,
                sub1,
                sub2,
            } => {
                sub1.partition_terms(terms, negate);
                sub2.partition_terms(terms, !negate);
            }
            ExpKind::Typed { sub1, .. } => sub1.partition_terms(terms, negate),
            ExpKind::Assign { lhs, rhs, .. } => {
                lhs.partition_terms(terms, negate);
                rhs.partition_terms(terms, negate);
            }
            _ => match self.int_value() {
                Some(k) => terms.integers.push(if negate { k.wrapping_neg() } else { k }),
                None => terms.bucket(negate).push(self),
            },
        }
    }

    /// Normalize `+`/`-` chains into `(p1 + p2 ...) - (n1 + n2 ...) + k`.
    ///
    /// Equal positive and negative terms cancel pairwise and the integers are
    /// summed with wraparound. Memory and register addresses, assignment
    /// sides and the operands of other binary operators are normalized in
    /// place; other nodes are returned as they are.
    pub fn simplify_arith(self) -> Exp {
        match self.kind {
            ExpKind::Unary {
                op: op @ (Oper::MemOf | Oper::RegOf),
                sub1,
            } => Exp::unary(op, (*sub1).simplify_arith()),
            ExpKind::Assign { .. } => self.map_children(Exp::simplify_arith),
            ExpKind::Binary {
                op: Oper::Plus | Oper::Minus,
                ..
            } => normalize_sum(&self),
            ExpKind::Binary { .. } | ExpKind::Ternary { .. } => self.map_children(Exp::simplify_arith),
            _ => self,
        }
    }

    /// Collapse `a[m[x]]` to `x`, also when a size annotation sits between
    /// the address-of and the memory reference.
    pub fn simplify_addr(self) -> Exp {
        if self.oper() == Oper::AddrOf {
            let inner = self.become_sub1();
            return match inner.oper() {
                Oper::MemOf => inner.become_sub1().simplify_addr(),
                Oper::Size if inner.sub2().is_some_and(Exp::is_mem_of) => {
                    inner.become_sub2().become_sub1().simplify_addr()
                }
                _ => Exp::addr_of(inner.simplify_addr()),
            };
        }
        self.map_children(Exp::simplify_addr)
    }

    /// Rewrite `succ(r[K])` as `r[K+1]` wherever it occurs.
    pub fn fix_successor(mut self) -> Exp {
        let pattern = Exp::unary(Oper::Successor, Exp::unary(Oper::RegOf, Exp::wild()));
        loop {
            let target = self.search_all(&pattern).into_iter().find_map(|found| {
                let k = found.sub1()?.sub1()?.int_value()?;
                Some((found.clone(), k))
            });
            let Some((found, k)) = target else {
                return self;
            };
            self.search_replace(&found, &Exp::reg_of(k.wrapping_add(1)));
        }
    }

    /// Strip every `zfill` and `sgnex`, keeping the extended operand.
    pub fn kill_fill(self) -> Exp {
        match self.kind {
            ExpKind::Ternary {
                op: Oper::Zfill | Oper::SgnEx,
                sub3,
                ..
            } => (*sub3).kill_fill(),
            _ => self.map_children(Exp::kill_fill),
        }
    }
}

impl<'a> Terms<'a> {
    fn bucket(&mut self, negate: bool) -> &mut Vec<&'a Exp> {
        if negate {
            &mut self.negatives
        } else {
            &mut self.positives
        }
    }

    /// Cancel positive terms against equal negative terms in one forward
    /// pass. The scan over the negatives never restarts: after a match it
    /// resumes past the removed negative, and a positive with no match
    /// exhausts it, so later positives are kept. The result therefore
    /// depends on term order, and `a + b - b - a` keeps `b - b`.
    fn cancel(&mut self) {
        let mut cursor = 0;
        let mut kept = Vec::with_capacity(self.positives.len());
        for p in self.positives.drain(..) {
            let found = self.negatives[cursor..]
                .iter()
                .position(|n| *n == p)
                .map(|i| cursor + i);
            match found {
                Some(i) => {
                    self.negatives.remove(i);
                    cursor = i;
                }
                None => {
                    cursor = self.negatives.len();
                    kept.push(p);
                }
            }
        }
        self.positives = kept;
    }
}

fn normalize_sum(e: &Exp) -> Exp {
    let mut terms = Terms::default();
    e.partition_terms(&mut terms, false);
    terms.cancel();
    let sum = terms.integers.iter().fold(0i32, |acc, k| acc.wrapping_add(*k));

    match (terms.positives.is_empty(), terms.negatives.is_empty()) {
        (true, true) => Exp::int(sum),
        (true, false) => Exp::minus(Exp::int(sum), accumulate(&terms.negatives)),
        (false, true) if sum == 0 => accumulate(&terms.positives),
        (false, true) => Exp::plus(accumulate(&terms.positives), Exp::int(sum)),
        (false, false) => {
            let diff = Exp::minus(accumulate(&terms.positives), accumulate(&terms.negatives));
            if sum == 0 {
                diff
            } else {
                Exp::plus(diff, Exp::int(sum))
            }
        }
    }
}

/// Sum a list of terms as a right-nested chain, `a + (b + c)`. The empty
/// sum is zero.
pub fn accumulate(terms: &[&Exp]) -> Exp {
    match terms {
        [] => Exp::int(0),
        [only] => (*only).clone(),
        [first, rest @ ..] => Exp::plus((*first).clone(), accumulate(rest)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declift_types::SharedType;

    fn sp() -> Exp {
        Exp::reg_of(28)
    }

    fn n() -> Exp {
        Exp::local("n")
    }

    // --- Partition Tests ---

    #[test]
    fn test_partition_terms() {
        // sp + 108 + n - sp - 92
        let e = Exp::minus(
            Exp::minus(Exp::plus(Exp::plus(sp(), Exp::int(108)), n()), sp()),
            Exp::int(92),
        );
        let mut terms = Terms::default();
        e.partition_terms(&mut terms, false);
        assert_eq!(terms.positives, vec![&sp(), &n()]);
        assert_eq!(terms.negatives, vec![&sp()]);
        assert_eq!(terms.integers, vec![108, -92]);
    }

    #[test]
    fn test_partition_double_negation() {
        // a - (b - 4)
        let e = Exp::minus(Exp::reg_of(1), Exp::minus(Exp::reg_of(2), Exp::int(4)));
        let mut terms = Terms::default();
        e.partition_terms(&mut terms, false);
        assert_eq!(terms.positives, vec![&Exp::reg_of(1)]);
        assert_eq!(terms.negatives, vec![&Exp::reg_of(2)]);
        assert_eq!(terms.integers, vec![4]);
    }

    #[test]
    fn test_partition_looks_through_types_and_assignments() {
        let typed = Exp::typed(SharedType::integer(32, 1), Exp::plus(Exp::reg_of(1), Exp::int(3)));
        let a = Exp::assign(32, typed, Exp::int(5));
        let mut terms = Terms::default();
        a.partition_terms(&mut terms, false);
        assert_eq!(terms.positives, vec![&Exp::reg_of(1)]);
        assert_eq!(terms.integers, vec![3, 5]);
    }

    #[test]
    fn test_accumulate() {
        assert_eq!(accumulate(&[]), Exp::int(0));
        assert_eq!(accumulate(&[&n()]), n());
        let a = Exp::reg_of(1);
        let b = Exp::reg_of(2);
        let c = Exp::reg_of(3);
        assert_eq!(
            accumulate(&[&a, &b, &c]),
            Exp::plus(a.clone(), Exp::plus(b.clone(), c.clone()))
        );
    }

    // --- Simplify Arith Tests ---

    #[test]
    fn test_simplify_arith_cancels_and_sums() {
        let e = Exp::minus(
            Exp::minus(Exp::plus(Exp::plus(sp(), Exp::int(108)), n()), sp()),
            Exp::int(92),
        );
        assert_eq!(e.simplify_arith(), Exp::plus(n(), Exp::int(16)));
    }

    #[test]
    fn test_simplify_arith_result_shapes() {
        let a = Exp::reg_of(1);
        let b = Exp::reg_of(2);

        assert_eq!(Exp::minus(Exp::int(7), Exp::int(3)).simplify_arith(), Exp::int(4));
        assert_eq!(Exp::minus(a.clone(), a.clone()).simplify_arith(), Exp::int(0));
        assert_eq!(
            Exp::minus(Exp::int(2), b.clone()).simplify_arith(),
            Exp::minus(Exp::int(2), b.clone())
        );
        assert_eq!(
            Exp::minus(Exp::plus(a.clone(), Exp::int(1)), Exp::int(1)).simplify_arith(),
            a.clone()
        );
        assert_eq!(
            Exp::minus(a.clone(), b.clone()).simplify_arith(),
            Exp::minus(a.clone(), b.clone())
        );
        assert_eq!(
            Exp::plus(Exp::minus(a.clone(), b.clone()), Exp::int(4)).simplify_arith(),
            Exp::plus(Exp::minus(a.clone(), b.clone()), Exp::int(4))
        );
    }

    #[test]
    fn test_simplify_arith_cancellation_is_order_sensitive() {
        let a = Exp::reg_of(1);
        let b = Exp::reg_of(2);

        // a + b - b - a: matching `a` runs the scan past `b`
        let e = Exp::minus(Exp::minus(Exp::plus(a.clone(), b.clone()), b.clone()), a.clone());
        let once = e.simplify_arith();
        assert_eq!(once, Exp::minus(b.clone(), b.clone()));
        assert_eq!(once.simplify_arith(), Exp::int(0));

        // a + b - a - b cancels fully in one pass
        let e = Exp::minus(Exp::minus(Exp::plus(a.clone(), b.clone()), a.clone()), b.clone());
        assert_eq!(e.simplify_arith(), Exp::int(0));
    }

    #[test]
    fn test_simplify_arith_wraps() {
        let e = Exp::plus(Exp::plus(Exp::reg_of(1), Exp::int(i32::MAX)), Exp::int(1));
        assert_eq!(e.simplify_arith(), Exp::plus(Exp::reg_of(1), Exp::int(i32::MIN)));
    }

    #[test]
    fn test_simplify_arith_recurses_into_addresses() {
        let e = Exp::mem_of(Exp::minus(Exp::plus(sp(), Exp::int(8)), Exp::int(8)));
        assert_eq!(e.simplify_arith(), Exp::mem_of(sp()));

        let e = Exp::binary(
            Oper::Mult,
            Exp::plus(Exp::int(1), Exp::int(2)),
            Exp::minus(n(), n()),
        );
        assert_eq!(e.simplify_arith(), Exp::binary(Oper::Mult, Exp::int(3), Exp::int(0)));

        let a = Exp::assign(32, Exp::mem_of(Exp::plus(sp(), Exp::int(0))), Exp::minus(n(), Exp::int(0)));
        assert_eq!(a.simplify_arith(), Exp::assign(32, Exp::mem_of(sp()), n()));
    }

    #[test]
    fn test_simplify_arith_leaves_other_nodes() {
        let e = Exp::unary(Oper::Neg, Exp::plus(Exp::int(1), Exp::int(1)));
        let before = e.clone();
        assert_eq!(e.simplify_arith(), before);
    }

    // --- Address Tests ---

    #[test]
    fn test_simplify_addr() {
        let x = Exp::plus(sp(), Exp::int(4));
        assert_eq!(Exp::addr_of(Exp::mem_of(x.clone())).simplify_addr(), x);

        let sized = Exp::binary(Oper::Size, Exp::int(32), Exp::mem_of(x.clone()));
        assert_eq!(Exp::addr_of(sized).simplify_addr(), x);

        // nested inside other operators
        let e = Exp::plus(Exp::addr_of(Exp::mem_of(n())), Exp::int(1));
        assert_eq!(e.simplify_addr(), Exp::plus(n(), Exp::int(1)));

        // a[m[a[m[n]]]] collapses fully
        let e = Exp::addr_of(Exp::mem_of(Exp::addr_of(Exp::mem_of(n()))));
        assert_eq!(e.simplify_addr(), n());
    }

    #[test]
    fn test_simplify_addr_leaves_plain_address_of() {
        let e = Exp::addr_of(Exp::local("buf"));
        let before = e.clone();
        assert_eq!(e.simplify_addr(), before);
    }

    // --- Successor And Fill Tests ---

    #[test]
    fn test_fix_successor() {
        let e = Exp::plus(Exp::unary(Oper::Successor, Exp::reg_of(8)), Exp::unary(Oper::Successor, Exp::reg_of(10)));
        assert_eq!(e.fix_successor(), Exp::plus(Exp::reg_of(9), Exp::reg_of(11)));

        let e = Exp::unary(Oper::Successor, Exp::unary(Oper::RegOf, Exp::temp("t")));
        let before = e.clone();
        assert_eq!(e.fix_successor(), before);
    }

    #[test]
    fn test_kill_fill() {
        let inner = Exp::ternary(Oper::SgnEx, Exp::int(8), Exp::int(16), Exp::mem_of(sp()));
        let e = Exp::plus(Exp::ternary(Oper::Zfill, Exp::int(16), Exp::int(32), inner), Exp::int(1));
        assert_eq!(e.kill_fill(), Exp::plus(Exp::mem_of(sp()), Exp::int(1)));

        let e = Exp::ternary(Oper::Truncu, Exp::int(32), Exp::int(8), n());
        let before = e.clone();
        assert_eq!(e.kill_fill(), before);
    }
}
