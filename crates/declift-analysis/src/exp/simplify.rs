//! Peephole simplification to a fixed point.
//!
//! One pass of [`Exp::poly_simplify`] simplifies the children of a node and
//! then tries the rules for the node itself. [`Exp::simplify`] repeats passes
//! until one makes no change. Every rewrite, including the canonicalizing
//! ones (constants to the right, `a - b` to `a + -b`), reports a change, so
//! the result of `simplify` is itself a fixed point.

use log::{log_enabled, trace, Level};

use super::{Exp, ExpKind, Oper};

/// Tunables for [`Exp::simplify_with`].
#[derive(Debug, Clone, Default)]
pub struct SimplifyConfig {
    /// Panic if no fixed point is reached within this many passes. `None`
    /// runs until a fixed point, however long that takes.
    pub max_passes: Option<usize>,
}

impl SimplifyConfig {
    /// A capped configuration, for catching rule pairs that oscillate.
    pub fn capped(max_passes: usize) -> Self {
        Self {
            max_passes: Some(max_passes),
        }
    }
}

impl Exp {
    /// Constant fold and apply algebraic identities until nothing changes.
    ///
    /// Address simplification and `+`/`-` normalization are separate; see
    /// [`simplify_addr`](Self::simplify_addr) and
    /// [`simplify_arith`](Self::simplify_arith).
    pub fn simplify(self) -> Exp {
        self.simplify_with(&SimplifyConfig::default())
    }

    /// [`simplify`](Self::simplify) under `config`.
    ///
    /// # Panics
    ///
    /// Panics if `config.max_passes` is set and exceeded.
    pub fn simplify_with(self, config: &SimplifyConfig) -> Exp {
        let before = log_enabled!(Level::Trace).then(|| self.clone());
        let mut res = self;
        let mut passes = 0usize;
        loop {
            let mut changed = false;
            res = res.poly_simplify(&mut changed);
            if !changed {
                break;
            }
            passes += 1;
            if let Some(max) = config.max_passes {
                if passes >= max {
                    panic!("simplify reached no fixed point after {} passes: {}", max, res);
                }
            }
        }
        if let Some(before) = before {
            if before.cmp_order(&res).is_ne() {
                trace!("simplified {} to {}", before, res);
            }
        }
        res
    }

    /// One bottom-up simplification pass. Sets `changed` if any rule fired.
    pub fn poly_simplify(self, changed: &mut bool) -> Exp {
        match self.kind {
            ExpKind::Unary { op, sub1 } => {
                let sub1 = (*sub1).poly_simplify(changed);
                simplify_unary(op, sub1, changed)
            }
            ExpKind::Binary { op, sub1, sub2 } => {
                let sub1 = (*sub1).poly_simplify(changed);
                let sub2 = (*sub2).poly_simplify(changed);
                simplify_binary(op, sub1, sub2, changed)
            }
            ExpKind::Ternary { op, sub1, sub2, sub3 } => {
                let sub1 = (*sub1).poly_simplify(changed);
                let sub2 = (*sub2).poly_simplify(changed);
                let sub3 = (*sub3).poly_simplify(changed);
                if op == Oper::Tern && sub2.int_value() == Some(1) && sub3.int_value() == Some(0) {
                    *changed = true;
                    return sub1;
                }
                Exp::ternary(op, sub1, sub2, sub3)
            }
            kind => Exp::new(kind).map_children(|e| e.poly_simplify(changed)),
        }
    }
}

fn simplify_unary(op: Oper, sub1: Exp, changed: &mut bool) -> Exp {
    match op {
        Oper::Neg | Oper::Not | Oper::LNot => {
            if let Some(k) = sub1.int_value() {
                *changed = true;
                return Exp::int(match op {
                    Oper::Neg => k.wrapping_neg(),
                    Oper::Not => !k,
                    _ => i32::from(k == 0),
                });
            }
            // !(a == b) is a != b, and the reverse
            if op == Oper::LNot && matches!(sub1.oper(), Oper::Equals | Oper::NotEqual) {
                let mut inner = sub1;
                let flipped = if inner.oper() == Oper::Equals {
                    Oper::NotEqual
                } else {
                    Oper::Equals
                };
                inner.set_oper(flipped);
                *changed = true;
                return inner;
            }
            // --x, ~~x, !!x
            if sub1.oper() == op {
                *changed = true;
                return sub1.become_sub1();
            }
        }
        Oper::AddrOf if sub1.is_mem_of() => {
            *changed = true;
            return sub1.become_sub1();
        }
        Oper::MemOf | Oper::RegOf if sub1.arity() > 0 => {
            let normal = sub1.clone().simplify_arith();
            if normal.cmp_order(&sub1).is_ne() {
                *changed = true;
                return Exp::unary(op, normal);
            }
        }
        _ => {}
    }
    Exp::unary(op, sub1)
}

fn is_commutative(op: Oper) -> bool {
    matches!(
        op,
        Oper::Plus
            | Oper::Mult
            | Oper::Mults
            | Oper::BitAnd
            | Oper::BitOr
            | Oper::BitXor
            | Oper::And
            | Oper::Or
            | Oper::Equals
            | Oper::NotEqual
    )
}

fn simplify_binary(mut op: Oper, mut a: Exp, mut b: Exp, changed: &mut bool) -> Exp {
    if let (Some(k1), Some(k2)) = (a.int_value(), b.int_value()) {
        if let Some(k) = fold_constants(op, k1, k2) {
            *changed = true;
            return Exp::int(k);
        }
    }

    // x ^ x, x - x
    if matches!(op, Oper::BitXor | Oper::Minus) && a == b {
        *changed = true;
        return Exp::int(0);
    }

    if op == Oper::Minus {
        op = Oper::Plus;
        b = Exp::unary(Oper::Neg, b);
        *changed = true;
    }

    // Integer constants go on the right
    if is_commutative(op) && a.is_int_const() && !b.is_int_const() {
        std::mem::swap(&mut a, &mut b);
        *changed = true;
    }

    match (op, b.int_value()) {
        (Oper::Plus | Oper::BitOr | Oper::Or, Some(0)) => {
            *changed = true;
            return a;
        }
        (Oper::Mult | Oper::Mults | Oper::BitAnd | Oper::And, Some(0)) => {
            *changed = true;
            return Exp::int(0);
        }
        (Oper::Mult | Oper::Mults, Some(1)) | (Oper::BitAnd, Some(-1)) | (Oper::And, Some(_)) => {
            *changed = true;
            return a;
        }
        (Oper::ShiftL, Some(k)) if (0..32).contains(&k) => {
            *changed = true;
            return Exp::binary(Oper::Mult, a, Exp::int(1i32 << k));
        }
        _ => {}
    }

    if op.is_comparison() {
        // -x < y becomes x < -y
        if a.oper() == Oper::Neg {
            a = a.become_sub1();
            b = Exp::unary(Oper::Neg, b);
            *changed = true;
        }
        // (x + y) < 0 becomes x < -y
        if b.int_value() == Some(0) && a.oper() == Oper::Plus {
            let (x, y) = a.into_pair();
            *changed = true;
            return Exp::binary(op, x, Exp::unary(Oper::Neg, y));
        }
    }

    match (op, b.int_value(), a.oper()) {
        // (x == y) == 1, (x == y) != 0
        (Oper::Equals, Some(1), Oper::Equals) | (Oper::NotEqual, Some(0), Oper::Equals) => {
            *changed = true;
            return a;
        }
        // (x == y) == 0, (x == y) != 1
        (Oper::Equals, Some(0), Oper::Equals) | (Oper::NotEqual, Some(1), Oper::Equals) => {
            a.set_oper(Oper::NotEqual);
            *changed = true;
            return a;
        }
        (Oper::Equals, Some(0), Oper::Gtr) => {
            a.set_oper(Oper::LessEq);
            *changed = true;
            return a;
        }
        (Oper::Equals, Some(0), Oper::GtrUns) => {
            a.set_oper(Oper::LessEqUns);
            *changed = true;
            return a;
        }
        _ => {}
    }

    // (x <= y) or (x == y) becomes x <= y
    if op == Oper::Or
        && b.oper() == Oper::Equals
        && matches!(a.oper(), Oper::GtrEq | Oper::LessEq | Oper::GtrEqUns | Oper::LessEqUns)
    {
        if let (Some(a1), Some(a2), Some(b1), Some(b2)) = (a.sub1(), a.sub2(), b.sub1(), b.sub2()) {
            if (a1 == b1 && a2 == b2) || (a1 == b2 && a2 == b1) {
                *changed = true;
                return a;
            }
        }
    }

    // x & x
    if op == Oper::BitAnd && a == b {
        *changed = true;
        return a;
    }

    // a + a*n becomes a*(n+1)
    if op == Oper::Plus
        && b.oper() == Oper::Mult
        && b.sub1() == Some(&a)
        && b.sub2().is_some_and(Exp::is_int_const)
    {
        let mut product = b;
        if let Some(n) = product.sub2_mut() {
            if let Some(k) = n.int_value() {
                n.set_int(k.wrapping_add(1));
            }
        }
        *changed = true;
        return product;
    }

    // a*n*m becomes a*(n*m)
    if op == Oper::Mult && a.oper() == Oper::Mult && a.sub2().is_some_and(Exp::is_int_const) {
        if let Some(m) = b.int_value() {
            if let Some(n) = a.sub2_mut() {
                if let Some(k) = n.int_value() {
                    n.set_int(k.wrapping_mul(m));
                }
            }
            *changed = true;
            return a;
        }
    }

    Exp::binary(op, a, b)
}

/// Fold `k1 op k2` on 32-bit integers. `Div` and `Mod` are unsigned, `Divs`
/// and `Mods` signed. Division by zero and out of range shifts don't fold.
pub(crate) fn fold_constants(op: Oper, k1: i32, k2: i32) -> Option<i32> {
    let (u1, u2) = (k1 as u32, k2 as u32);
    let shift = u32::try_from(k2).ok().filter(|&s| s < 32);
    let k = match op {
        Oper::Plus => k1.wrapping_add(k2),
        Oper::Minus => k1.wrapping_sub(k2),
        Oper::Mult => u1.wrapping_mul(u2) as i32,
        Oper::Mults => k1.wrapping_mul(k2),
        Oper::Div => u1.checked_div(u2)? as i32,
        Oper::Divs => k1.checked_div(k2)?,
        Oper::Mod => u1.checked_rem(u2)? as i32,
        Oper::Mods => k1.checked_rem(k2)?,
        Oper::ShiftL => k1 << shift?,
        Oper::ShiftR => (u1 >> shift?) as i32,
        Oper::ShiftRA => k1 >> shift?,
        Oper::BitOr => k1 | k2,
        Oper::BitAnd => k1 & k2,
        Oper::BitXor => k1 ^ k2,
        Oper::And => i32::from(k1 != 0 && k2 != 0),
        Oper::Or => i32::from(k1 != 0 || k2 != 0),
        Oper::Equals => i32::from(k1 == k2),
        Oper::NotEqual => i32::from(k1 != k2),
        Oper::Less => i32::from(k1 < k2),
        Oper::Gtr => i32::from(k1 > k2),
        Oper::LessEq => i32::from(k1 <= k2),
        Oper::GtrEq => i32::from(k1 >= k2),
        Oper::LessUns => i32::from(u1 < u2),
        Oper::GtrUns => i32::from(u1 > u2),
        Oper::LessEqUns => i32::from(u1 <= u2),
        Oper::GtrEqUns => i32::from(u1 >= u2),
        _ => return None,
    };
    Some(k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use declift_types::SharedType;

    fn x() -> Exp {
        Exp::reg_of(24)
    }

    fn y() -> Exp {
        Exp::mem_of(Exp::reg_of(30))
    }

    /// Route trace output through the test harness when `RUST_LOG` asks for it.
    fn init_logger() {
        let _ = env_logger::Builder::from_default_env().is_test(true).try_init();
    }

    fn bin(op: Oper, a: Exp, b: Exp) -> Exp {
        Exp::binary(op, a, b)
    }

    // --- Constant Folding Tests ---

    #[test]
    fn test_fold_arithmetic() {
        assert_eq!(Exp::plus(Exp::int(3), Exp::int(4)).simplify(), Exp::int(7));
        assert_eq!(Exp::minus(Exp::int(3), Exp::int(4)).simplify(), Exp::int(-1));
        assert_eq!(bin(Oper::Mults, Exp::int(-3), Exp::int(4)).simplify(), Exp::int(-12));
        assert_eq!(bin(Oper::Plus, Exp::int(i32::MAX), Exp::int(1)).simplify(), Exp::int(i32::MIN));
    }

    #[test]
    fn test_fold_division_signedness() {
        assert_eq!(fold_constants(Oper::Divs, -8, 2), Some(-4));
        assert_eq!(fold_constants(Oper::Div, -8, 2), Some(0x7fff_fffc));
        assert_eq!(fold_constants(Oper::Mods, -7, 2), Some(-1));
        assert_eq!(fold_constants(Oper::Mod, -7, 2), Some(1));
        assert_eq!(fold_constants(Oper::Div, 1, 0), None);
        assert_eq!(fold_constants(Oper::Mods, 1, 0), None);
    }

    #[test]
    fn test_fold_shifts() {
        assert_eq!(fold_constants(Oper::ShiftL, 1, 4), Some(16));
        assert_eq!(fold_constants(Oper::ShiftR, -16, 2), Some(0x3fff_fffc));
        assert_eq!(fold_constants(Oper::ShiftRA, -16, 2), Some(-4));
        assert_eq!(fold_constants(Oper::ShiftRA, 16, 2), Some(4));
        assert_eq!(fold_constants(Oper::ShiftL, 1, 32), None);
        assert_eq!(fold_constants(Oper::ShiftR, 1, -1), None);
    }

    #[test]
    fn test_fold_comparisons_and_logic() {
        assert_eq!(fold_constants(Oper::Less, -1, 1), Some(1));
        assert_eq!(fold_constants(Oper::LessUns, -1, 1), Some(0));
        assert_eq!(fold_constants(Oper::GtrEqUns, -1, 1), Some(1));
        assert_eq!(fold_constants(Oper::And, 2, 0), Some(0));
        assert_eq!(fold_constants(Oper::Or, 2, 0), Some(1));
        assert_eq!(fold_constants(Oper::FPlus, 2, 0), None);
    }

    #[test]
    fn test_fold_unary() {
        assert_eq!(Exp::unary(Oper::Neg, Exp::int(5)).simplify(), Exp::int(-5));
        assert_eq!(Exp::unary(Oper::Not, Exp::int(0)).simplify(), Exp::int(-1));
        assert_eq!(Exp::unary(Oper::LNot, Exp::int(7)).simplify(), Exp::int(0));
        assert_eq!(Exp::unary(Oper::LNot, Exp::int(0)).simplify(), Exp::int(1));
    }

    // --- Identity Tests ---

    #[test]
    fn test_identities() {
        assert_eq!(Exp::plus(x(), Exp::int(0)).simplify(), x());
        assert_eq!(Exp::plus(Exp::int(0), x()).simplify(), x());
        assert_eq!(Exp::minus(x(), Exp::int(0)).simplify(), x());
        assert_eq!(bin(Oper::BitOr, x(), Exp::int(0)).simplify(), x());
        assert_eq!(bin(Oper::Mult, x(), Exp::int(1)).simplify(), x());
        assert_eq!(bin(Oper::Mults, Exp::int(1), x()).simplify(), x());
        assert_eq!(bin(Oper::BitAnd, x(), Exp::int(-1)).simplify(), x());
        assert_eq!(bin(Oper::BitAnd, Exp::int(-1), x()).simplify(), x());
        assert_eq!(bin(Oper::And, x(), Exp::int(3)).simplify(), x());
    }

    #[test]
    fn test_annihilators() {
        assert_eq!(bin(Oper::Mult, x(), Exp::int(0)).simplify(), Exp::int(0));
        assert_eq!(bin(Oper::BitAnd, Exp::int(0), y()).simplify(), Exp::int(0));
        assert_eq!(bin(Oper::And, x(), Exp::int(0)).simplify(), Exp::int(0));
    }

    #[test]
    fn test_self_cancelling() {
        assert_eq!(Exp::minus(x(), x()).simplify(), Exp::int(0));
        assert_eq!(bin(Oper::BitXor, y(), y()).simplify(), Exp::int(0));
        assert_eq!(bin(Oper::BitAnd, y(), y()).simplify(), y());
    }

    // --- Canonical Form Tests ---

    #[test]
    fn test_subtraction_becomes_negative_addition() {
        assert_eq!(Exp::minus(x(), Exp::int(4)).simplify(), Exp::plus(x(), Exp::int(-4)));
        assert_eq!(Exp::minus(x(), Exp::int(-5)).simplify(), Exp::plus(x(), Exp::int(5)));
        assert_eq!(
            Exp::minus(x(), y()).simplify(),
            Exp::plus(x(), Exp::unary(Oper::Neg, y()))
        );
    }

    #[test]
    fn test_constant_moves_right() {
        assert_eq!(Exp::plus(Exp::int(4), x()).simplify(), Exp::plus(x(), Exp::int(4)));
        assert_eq!(bin(Oper::Mult, Exp::int(4), x()).simplify(), bin(Oper::Mult, x(), Exp::int(4)));
    }

    #[test]
    fn test_shift_left_becomes_multiply() {
        assert_eq!(bin(Oper::ShiftL, x(), Exp::int(3)).simplify(), bin(Oper::Mult, x(), Exp::int(8)));
        assert_eq!(bin(Oper::ShiftL, x(), Exp::int(0)).simplify(), x());
        let wide = bin(Oper::ShiftL, x(), Exp::int(40));
        assert_eq!(wide.clone().simplify(), wide);
    }

    #[test]
    fn test_double_negation() {
        let e = Exp::unary(Oper::Neg, Exp::unary(Oper::Neg, x()));
        assert_eq!(e.simplify(), x());
        let e = Exp::unary(Oper::Not, Exp::unary(Oper::Not, y()));
        assert_eq!(e.simplify(), y());
    }

    // --- Comparison Tests ---

    #[test]
    fn test_logical_not_of_equality() {
        let e = Exp::unary(Oper::LNot, bin(Oper::Equals, x(), y()));
        assert_eq!(e.simplify(), bin(Oper::NotEqual, x(), y()));
        let e = Exp::unary(Oper::LNot, bin(Oper::NotEqual, x(), y()));
        assert_eq!(e.simplify(), bin(Oper::Equals, x(), y()));
    }

    #[test]
    fn test_comparison_against_boolean() {
        let eq = || bin(Oper::Equals, x(), y());
        assert_eq!(bin(Oper::Equals, eq(), Exp::int(1)).simplify(), eq());
        assert_eq!(bin(Oper::NotEqual, eq(), Exp::int(0)).simplify(), eq());
        assert_eq!(bin(Oper::Equals, eq(), Exp::int(0)).simplify(), bin(Oper::NotEqual, x(), y()));
        assert_eq!(bin(Oper::NotEqual, eq(), Exp::int(1)).simplify(), bin(Oper::NotEqual, x(), y()));
        assert_eq!(
            bin(Oper::Equals, bin(Oper::Gtr, x(), y()), Exp::int(0)).simplify(),
            bin(Oper::LessEq, x(), y())
        );
        assert_eq!(
            bin(Oper::Equals, bin(Oper::GtrUns, x(), y()), Exp::int(0)).simplify(),
            bin(Oper::LessEqUns, x(), y())
        );
    }

    #[test]
    fn test_comparison_moves_terms() {
        // x - 4 == 0 becomes x == 4
        let e = bin(Oper::Equals, Exp::minus(x(), Exp::int(4)), Exp::int(0));
        assert_eq!(e.simplify(), bin(Oper::Equals, x(), Exp::int(4)));

        // -x < y becomes x < -y
        let e = bin(Oper::Less, Exp::unary(Oper::Neg, x()), y());
        assert_eq!(e.simplify(), bin(Oper::Less, x(), Exp::unary(Oper::Neg, y())));

        // x - y < 0 becomes x < y
        let e = bin(Oper::Less, Exp::minus(x(), y()), Exp::int(0));
        assert_eq!(e.simplify(), bin(Oper::Less, x(), y()));
    }

    #[test]
    fn test_or_of_inclusive_comparison_and_equality() {
        let e = bin(Oper::Or, bin(Oper::LessEq, x(), y()), bin(Oper::Equals, y(), x()));
        assert_eq!(e.simplify(), bin(Oper::LessEq, x(), y()));
        let e = bin(Oper::Or, bin(Oper::Less, x(), y()), bin(Oper::Equals, x(), y()));
        let before = e.clone();
        assert_eq!(e.simplify(), before);
    }

    // --- Product Tests ---

    #[test]
    fn test_products() {
        let e = Exp::plus(x(), bin(Oper::Mult, x(), Exp::int(3)));
        assert_eq!(e.simplify(), bin(Oper::Mult, x(), Exp::int(4)));

        let e = bin(Oper::Mult, bin(Oper::Mult, x(), Exp::int(3)), Exp::int(5));
        assert_eq!(e.simplify(), bin(Oper::Mult, x(), Exp::int(15)));

        // x << 2 << 1 becomes x * 8
        let e = bin(Oper::ShiftL, bin(Oper::ShiftL, x(), Exp::int(2)), Exp::int(1));
        assert_eq!(e.simplify(), bin(Oper::Mult, x(), Exp::int(8)));
    }

    // --- Structural Tests ---

    #[test]
    fn test_address_of_memory() {
        let e = Exp::addr_of(Exp::mem_of(Exp::plus(x(), Exp::int(0))));
        assert_eq!(e.simplify(), x());
    }

    #[test]
    fn test_memory_address_is_normalized() {
        // m[(r[24] + 8) + -8] becomes m[r[24]]
        let e = Exp::mem_of(Exp::plus(Exp::plus(x(), Exp::int(8)), Exp::int(-8)));
        assert_eq!(e.simplify(), Exp::mem_of(x()));
    }

    #[test]
    fn test_ternary_boolean_select() {
        let cond = bin(Oper::Less, x(), y());
        let e = Exp::ternary(Oper::Tern, cond.clone(), Exp::int(1), Exp::int(0));
        assert_eq!(e.simplify(), cond);
        let e = Exp::ternary(Oper::Zfill, x(), Exp::int(1), Exp::int(0));
        let before = e.clone();
        assert_eq!(e.simplify(), before);
    }

    #[test]
    fn test_typed_and_assign_recurse() {
        let ty = SharedType::integer(32, 1);
        let e = Exp::typed(ty.clone(), Exp::plus(Exp::int(1), Exp::int(2)));
        assert_eq!(e.simplify(), Exp::typed(ty, Exp::int(3)));

        let a = Exp::assign(32, Exp::mem_of(Exp::plus(x(), Exp::int(0))), bin(Oper::Mult, y(), Exp::int(1)));
        assert_eq!(a.simplify(), Exp::assign(32, Exp::mem_of(x()), y()));
    }

    #[test]
    fn test_simplify_is_idempotent_on_examples() {
        init_logger();
        let samples = vec![
            Exp::minus(Exp::plus(x(), Exp::int(4)), y()),
            bin(Oper::Less, Exp::minus(Exp::int(3), x()), Exp::int(0)),
            Exp::mem_of(Exp::minus(Exp::plus(Exp::int(8), x()), Exp::int(3))),
            Exp::unary(Oper::LNot, bin(Oper::Equals, Exp::int(0), x())),
        ];
        for e in samples {
            let once = e.simplify();
            let twice = once.clone().simplify();
            assert_eq!(once, twice, "{}", once);
        }
    }

    // --- Config Tests ---

    #[test]
    fn test_capped_config_allows_fixed_point() {
        let e = Exp::plus(Exp::plus(Exp::int(1), Exp::int(2)), x());
        let res = e.simplify_with(&SimplifyConfig::capped(16));
        assert_eq!(res, Exp::plus(x(), Exp::int(3)));
    }

    #[test]
    #[should_panic(expected = "no fixed point")]
    fn test_capped_config_panics_when_exceeded() {
        let e = Exp::minus(x(), Exp::int(4));
        e.simplify_with(&SimplifyConfig::capped(1));
    }
}
