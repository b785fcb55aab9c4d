use super::constant::*;
use super::expr::*;
use super::interface::*;
use super::kind::*;
use super::module::*;
use super::signal::*;

use std::ops::Range;
use std::ptr;

/// A match arm pattern; see [`Block::match_`].
///
/// [`Block::match_`]: ./struct.Block.html#method.match_
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Pattern {
    /// Matches the enum variant with the given name.
    Variant(String),
    /// Matches a plain bit vector holding exactly this value.
    Value(u128),
    /// Matches anything.
    Wildcard,
}

pub(crate) enum Stmt<'a> {
    Assign {
        target: &'a Signal<'a>,
        expr: &'a Expr<'a>,
    },
    If {
        arms: Vec<(&'a Expr<'a>, Vec<Stmt<'a>>)>,
        otherwise: Option<Vec<Stmt<'a>>>,
    },
    Match {
        scrutinee: &'a Expr<'a>,
        arms: Vec<(Pattern, Vec<Stmt<'a>>)>,
    },
    For {
        var: usize,
        range: Range<u32>,
        body: Vec<Stmt<'a>>,
    },
    Scope {
        body: Vec<Stmt<'a>>,
    },
    Join {
        a: &'a Interface<'a>,
        b: &'a Interface<'a>,
    },
}

/// A sequence of statements in an update routine, built by [`Module::update`] and the nesting methods of `Block` itself.
///
/// Statements run in program order within one invocation of the routine. An assignment sets the next value of its target; when several assignments to the same target execute, the last one wins.
///
/// # Examples
///
/// ```
/// use kumo::*;
///
/// let c = Context::new();
///
/// let m = c.module("Priority");
/// let a = m.input("a", 1);
/// let b_in = m.input("b", 1);
/// let o = m.output("o", 2);
/// m.update(|b| {
///     b.assign(o, m.lit(0u32, 2));
///     b.if_(a.current(), |b| {
///         b.assign(o, m.lit(1u32, 2));
///     })
///     .else_if(b_in.current(), |b| {
///         b.assign(o, m.lit(2u32, 2));
///     });
/// });
/// ```
///
/// [`Module::update`]: ./struct.Module.html#method.update
pub struct Block<'a> {
    module: &'a Module<'a>,
    pub(crate) stmts: Vec<Stmt<'a>>,
}

impl<'a> Block<'a> {
    pub(super) fn new(module: &'a Module<'a>) -> Block<'a> {
        Block {
            module,
            stmts: Vec::new(),
        }
    }

    fn nested(&self, f: impl FnOnce(&mut Block<'a>)) -> Vec<Stmt<'a>> {
        let mut block = Block::new(self.module);
        f(&mut block);
        block.stmts
    }

    fn check_module(&self, expr: &Expr<'a>) {
        if !ptr::eq(self.module, expr.module) {
            panic!("Attempted to use a signal from a different module in the update routine of module \"{}\".", self.module.name);
        }
    }

    fn check_condition(&self, cond: &Expr<'a>) {
        self.check_module(cond);
        if cond.bit_width() != 1 {
            panic!(
                "Conditions can only be 1 bit wide, but a condition with {} bits was given.",
                cond.bit_width()
            );
        }
    }

    /// Assigns `expr` to the next value of `target`.
    ///
    /// # Panics
    ///
    /// Panics if `target` or `expr` belongs to a different [`Module`], or if their bit widths or [`Kind`]s differ.
    ///
    /// [`Kind`]: ./enum.Kind.html
    /// [`Module`]: ./struct.Module.html
    pub fn assign(&mut self, target: &'a Signal<'a>, expr: &'a Expr<'a>) {
        if !ptr::eq(self.module, target.module) {
            panic!("Attempted to assign signal \"{}\", which belongs to a different module than the update routine of module \"{}\".", target.name(), self.module.name);
        }
        self.check_module(expr);
        if target.bit_width() != expr.bit_width() {
            panic!(
                "Attempted to assign a value with {} bit(s) to \"{}\", which has {} bit(s).",
                expr.bit_width(),
                target.name(),
                target.bit_width()
            );
        }
        if target.kind() != expr.kind() {
            panic!(
                "Attempted to assign a value with {} to \"{}\", which has {}.",
                expr.kind(),
                target.name(),
                target.kind()
            );
        }
        self.stmts.push(Stmt::Assign { target, expr });
    }

    /// Runs `f` when `cond` is high. Further arms can be chained on the returned [`IfChain`]; the first arm whose condition holds is taken.
    ///
    /// # Panics
    ///
    /// Panics if `cond` belongs to a different [`Module`] or isn't 1 bit wide.
    ///
    /// [`IfChain`]: ./struct.IfChain.html
    /// [`Module`]: ./struct.Module.html
    pub fn if_(&mut self, cond: &'a Expr<'a>, f: impl FnOnce(&mut Block<'a>)) -> IfChain<'_, 'a> {
        self.check_condition(cond);
        let body = self.nested(f);
        self.stmts.push(Stmt::If {
            arms: vec![(cond, body)],
            otherwise: None,
        });
        IfChain { block: self }
    }

    /// Branches on the value of `scrutinee`. Arms are declared by `f` and tested in order; the first matching arm is taken.
    ///
    /// A match on an enum must cover every variant, and a match on a plain bit vector must cover every value, unless it has a [`Pattern::Wildcard`] arm.
    ///
    /// # Examples
    ///
    /// ```
    /// use kumo::*;
    ///
    /// let state = EnumBuilder::new("State")
    ///     .variant("Idle")
    ///     .variant("Busy")
    ///     .build();
    ///
    /// let c = Context::new();
    ///
    /// let m = c.module("Fsm");
    /// let go = m.input("go", 1);
    /// let s = m.reg("s", &state);
    /// m.update(|b| {
    ///     b.match_(s.current(), |arms| {
    ///         arms.variant("Idle", |b| {
    ///             b.if_(go.current(), |b| {
    ///                 b.assign(s, m.variant(&state, "Busy", &[]));
    ///             });
    ///         })
    ///         .variant("Busy", |b| {
    ///             b.assign(s, m.variant(&state, "Idle", &[]));
    ///         });
    ///     });
    /// });
    /// ```
    ///
    /// [`Pattern::Wildcard`]: ./enum.Pattern.html#variant.Wildcard
    pub fn match_(&mut self, scrutinee: &'a Expr<'a>, f: impl FnOnce(&mut MatchArms<'a>)) {
        self.check_module(scrutinee);
        let mut arms = MatchArms {
            module: self.module,
            kind: scrutinee.kind().clone(),
            arms: Vec::new(),
        };
        f(&mut arms);
        if arms.arms.is_empty() {
            panic!("A match must have at least one arm.");
        }
        self.stmts.push(Stmt::Match {
            scrutinee,
            arms: arms.arms,
        });
    }

    /// Repeats `f` for every value in `range`. The loop is unrolled when the routine is translated; `f` receives the loop index as an [`Expr`] just wide enough to hold the range's largest value.
    ///
    /// # Examples
    ///
    /// ```
    /// use kumo::*;
    ///
    /// let c = Context::new();
    ///
    /// let m = c.module("Scan");
    /// let i = m.input("i", 4);
    /// let o = m.output("o", 4);
    /// m.update(|b| {
    ///     b.assign(o, m.lit(0u32, 4));
    ///     b.for_range(0..4, |b, index| {
    ///         let bit = m.lit(1u32, 4).shl(index);
    ///         b.if_((i.current() & bit).ne(m.lit(0u32, 4)), |b| {
    ///             b.assign(o, m.lit(8u32, 4).shr(index));
    ///         });
    ///     });
    /// });
    /// ```
    ///
    /// [`Expr`]: ./struct.Expr.html
    pub fn for_range(&mut self, range: Range<u32>, f: impl FnOnce(&mut Block<'a>, &'a Expr<'a>)) {
        let var = self.module.alloc_loop_var();
        let bit_width = bits_for(range.end.saturating_sub(1) as u128);
        let index = self
            .module
            .expr(ExprData::LoopIndex { var, bit_width }, Kind::Bits(bit_width));
        let mut block = Block::new(self.module);
        f(&mut block, index);
        self.stmts.push(Stmt::For {
            var,
            range,
            body: block.stmts,
        });
    }

    /// Groups the statements created by `f` into a nested scope.
    pub fn scope(&mut self, f: impl FnOnce(&mut Block<'a>)) {
        let body = self.nested(f);
        self.stmts.push(Stmt::Scope { body });
    }

    /// Joins two interfaces: for every member, the output side permanently drives the input side.
    ///
    /// The join is structural. It's extracted while the routine is translated and becomes a fixed wiring edge; it isn't re-evaluated per step, even when declared inside a branch. `join(a, b)` and `join(b, a)` produce identical wiring.
    ///
    /// # Examples
    ///
    /// ```
    /// use kumo::*;
    ///
    /// let c = Context::new();
    ///
    /// let producer = c.module("Producer");
    /// let out = producer.interface("out", |i| {
    ///     i.output("data", 8);
    /// });
    /// producer.update(|b| b.assign(out.signal("data"), producer.lit(42u32, 8)));
    ///
    /// let consumer = c.module("Consumer");
    /// let input = consumer.interface("in", |i| {
    ///     i.input("data", 8);
    /// });
    /// let seen = consumer.output("seen", 8);
    /// consumer.update(|b| b.assign(seen, input.signal("data").current()));
    ///
    /// let top = c.module("Top");
    /// let p = top.instance("p", "Producer");
    /// let q = top.instance("q", "Consumer");
    /// top.update(|b| b.join(p.interface("out"), q.interface("in")));
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if either interface belongs to a different [`Module`].
    ///
    /// [`Module`]: ./struct.Module.html
    pub fn join(&mut self, a: &'a Interface<'a>, b: &'a Interface<'a>) {
        if !ptr::eq(self.module, a.module) || !ptr::eq(self.module, b.module) {
            panic!("Attempted to join an interface from a different module in the update routine of module \"{}\".", self.module.name);
        }
        self.stmts.push(Stmt::Join { a, b });
    }
}

/// Continues an `if` statement created by [`Block::if_`].
///
/// [`Block::if_`]: ./struct.Block.html#method.if_
pub struct IfChain<'b, 'a> {
    block: &'b mut Block<'a>,
}

impl<'b, 'a> IfChain<'b, 'a> {
    fn arms(&mut self) -> (&mut Vec<(&'a Expr<'a>, Vec<Stmt<'a>>)>, &mut Option<Vec<Stmt<'a>>>) {
        match self.block.stmts.last_mut() {
            Some(Stmt::If { arms, otherwise }) => (arms, otherwise),
            _ => unreachable!(),
        }
    }

    /// Adds an arm that runs `f` when no previous arm was taken and `cond` is high.
    pub fn else_if(mut self, cond: &'a Expr<'a>, f: impl FnOnce(&mut Block<'a>)) -> IfChain<'b, 'a> {
        self.block.check_condition(cond);
        let body = self.block.nested(f);
        self.arms().0.push((cond, body));
        self
    }

    /// Adds a final arm that runs `f` when no previous arm was taken.
    pub fn else_(mut self, f: impl FnOnce(&mut Block<'a>)) {
        let body = self.block.nested(f);
        *self.arms().1 = Some(body);
    }
}

/// Declares the arms of a match statement created by [`Block::match_`].
///
/// [`Block::match_`]: ./struct.Block.html#method.match_
pub struct MatchArms<'a> {
    module: &'a Module<'a>,
    kind: Kind,
    arms: Vec<(Pattern, Vec<Stmt<'a>>)>,
}

impl<'a> MatchArms<'a> {
    /// Adds an arm for `pattern`.
    ///
    /// # Panics
    ///
    /// Panics if `pattern` can't match the scrutinee: a variant pattern on anything but an enum, an unknown variant, or a value pattern that doesn't fit the scrutinee's bit width or is used on an enum, struct or array.
    pub fn arm(&mut self, pattern: Pattern, f: impl FnOnce(&mut Block<'a>)) -> &mut MatchArms<'a> {
        match (&pattern, &self.kind) {
            (Pattern::Variant(name), Kind::Enum(layout)) => {
                let _ = layout.expect_variant(name);
            }
            (Pattern::Variant(name), _) => panic!(
                "Cannot match variant \"{}\" against a value with {}, which is not an enum.",
                name, self.kind
            ),
            (Pattern::Value(value), Kind::Bits(bit_width) | Kind::Signed(bit_width)) => {
                let _ = Constant::from(*value).fit(*bit_width, "a match pattern");
            }
            (Pattern::Value(_), Kind::Enum(layout)) => panic!(
                "Cannot match a plain value against enum \"{}\"; match its variants instead.",
                layout.name
            ),
            (Pattern::Value(_), _) => panic!(
                "Cannot match a plain value against a value with {}; match its members instead.",
                self.kind
            ),
            (Pattern::Wildcard, _) => (),
        }
        let mut block = Block::new(self.module);
        f(&mut block);
        self.arms.push((pattern, block.stmts));
        self
    }

    pub fn variant(&mut self, name: &str, f: impl FnOnce(&mut Block<'a>)) -> &mut MatchArms<'a> {
        self.arm(Pattern::Variant(name.to_string()), f)
    }

    pub fn value(&mut self, value: impl Into<Constant>, f: impl FnOnce(&mut Block<'a>)) -> &mut MatchArms<'a> {
        self.arm(Pattern::Value(value.into().numeric_value()), f)
    }

    /// Adds a catch-all arm.
    pub fn otherwise(&mut self, f: impl FnOnce(&mut Block<'a>)) -> &mut MatchArms<'a> {
        self.arm(Pattern::Wildcard, f)
    }
}

#[cfg(test)]
mod tests {
    use super::super::context::*;
    use super::*;

    #[test]
    fn if_chain_collects_arms() {
        let c = Context::new();

        let m = c.module("A");
        let a = m.input("a", 1);
        let o = m.output("o", 1);
        m.update(|b| {
            b.if_(a.current(), |b| b.assign(o, m.high()))
                .else_if(!a.current(), |b| b.assign(o, m.low()))
                .else_(|b| b.assign(o, m.low()));
        });

        let update = m.update.borrow();
        let stmts = update.as_ref().unwrap();
        assert_eq!(stmts.len(), 1);
        match &stmts[0] {
            Stmt::If { arms, otherwise } => {
                assert_eq!(arms.len(), 2);
                assert_eq!(otherwise.as_ref().unwrap().len(), 1);
            }
            _ => panic!("Expected an if statement"),
        }
    }

    #[test]
    fn for_range_index_width() {
        let c = Context::new();

        let m = c.module("A");
        let o = m.output("o", 3);
        m.update(|b| {
            b.for_range(0..5, |b, index| {
                assert_eq!(index.bit_width(), 3);
                b.assign(o, index);
            });
        });

        match &m.update.borrow().as_ref().unwrap()[0] {
            Stmt::For { range, body, .. } => {
                assert_eq!(*range, 0..5);
                assert_eq!(body.len(), 1);
            }
            _ => panic!("Expected a for statement"),
        };
    }

    #[test]
    #[should_panic(expected = "Attempted to assign a value with 4 bit(s) to \"o\", which has 3 bit(s).")]
    fn assign_bit_width_error() {
        let c = Context::new();

        let m = c.module("A");
        let o = m.output("o", 3);

        // Panic
        m.update(|b| b.assign(o, m.lit(0u32, 4)));
    }

    #[test]
    #[should_panic(
        expected = "Attempted to assign a value with 2 bit(s) to \"state\", which has enum State (2 bit(s))."
    )]
    fn assign_bits_to_enum_error() {
        let state = crate::graph::EnumBuilder::new("State")
            .variant("A")
            .variant("B")
            .variant("C")
            .build();

        let c = Context::new();

        let m = c.module("A");
        let s = m.reg("state", &state);

        // Panic
        m.update(|b| b.assign(s, m.lit(3u32, 2)));
    }

    #[test]
    #[should_panic(
        expected = "Attempted to assign a value with 8 bit(s) to \"o\", which has signed 8 bit(s)."
    )]
    fn assign_unsigned_to_signed_error() {
        let c = Context::new();

        let m = c.module("A");
        let i = m.input("i", 8);
        let o = m.signal("o", crate::graph::Direction::Output, Kind::Signed(8));

        // Panic
        m.update(|b| b.assign(o, i.current()));
    }

    #[test]
    #[should_panic(
        expected = "Cannot match a plain value against a value with struct Pair (3 bit(s)); match its members instead."
    )]
    fn value_pattern_on_struct_error() {
        let pair = crate::graph::StructBuilder::new("Pair").member("a", 1).member("b", 2).build();

        let c = Context::new();

        let m = c.module("A");
        let i = m.signal("i", crate::graph::Direction::Input, &pair);

        // Panic
        m.update(|b| {
            b.match_(i.current(), |arms| {
                arms.value(0u32, |_| {});
            });
        });
    }

    #[test]
    #[should_panic(
        expected = "Attempted to assign signal \"o\", which belongs to a different module than the update routine of module \"B\"."
    )]
    fn assign_foreign_signal_error() {
        let c = Context::new();

        let a = c.module("A");
        let o = a.output("o", 1);
        let b = c.module("B");

        // Panic
        b.update(|blk| blk.assign(o, b.high()));
    }

    #[test]
    #[should_panic(
        expected = "Conditions can only be 1 bit wide, but a condition with 2 bits was given."
    )]
    fn wide_condition_error() {
        let c = Context::new();

        let m = c.module("A");

        // Panic
        m.update(|b| {
            b.if_(m.lit(0u32, 2), |_| {});
        });
    }

    #[test]
    #[should_panic(
        expected = "Cannot match variant \"Idle\" against a value with 2 bit(s), which is not an enum."
    )]
    fn variant_pattern_on_bits_error() {
        let c = Context::new();

        let m = c.module("A");
        let i = m.input("i", 2);

        // Panic
        m.update(|b| {
            b.match_(i.current(), |arms| {
                arms.variant("Idle", |_| {});
            });
        });
    }

    #[test]
    #[should_panic(
        expected = "Cannot fit the specified value '4' into the specified bit width '2' of a match pattern. The value '4' requires a bit width of at least 3 bit(s)."
    )]
    fn value_pattern_too_wide_error() {
        let c = Context::new();

        let m = c.module("A");
        let i = m.input("i", 2);

        // Panic
        m.update(|b| {
            b.match_(i.current(), |arms| {
                arms.value(4u32, |_| {});
            });
        });
    }
}
