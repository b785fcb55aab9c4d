use crate::elaborate::{Design, InstanceNode};
use crate::graph::mask;
use crate::ir::*;

/// Evaluates expressions of one instance against the values of a pass.
pub(super) struct Evaluator<'e> {
    pub design: &'e Design,
    pub node: &'e InstanceNode,
    pub current: &'e [u128],
    /// Arm taken by each of the instance's branch points so far this pass, if any.
    pub taken: &'e [Option<usize>],
    /// Value of each local version already computed this pass.
    pub versions: &'e mut [Option<u128>],
}

impl<'e> Evaluator<'e> {
    pub fn guard_holds(&self, guard: &Guard) -> bool {
        guard
            .0
            .iter()
            .all(|condition| self.taken[condition.branch.0] == Some(condition.arm))
    }

    /// Returns the arm `branch` takes, or `None` if its guard doesn't hold or no arm matches.
    pub fn take(&mut self, branch: &BranchPoint) -> Option<usize> {
        if !self.guard_holds(&branch.guard) {
            return None;
        }
        let scrutinee = branch.scrutinee.as_ref().map(|s| self.eval(s));
        for (index, arm) in branch.arms.iter().enumerate() {
            let matches = match &arm.test {
                ArmTest::When(cond) => self.eval(cond) != 0,
                ArmTest::Equals { value, mask } => {
                    scrutinee.map_or(false, |s| s & mask == *value)
                }
                ArmTest::Otherwise => true,
            };
            if matches {
                return Some(index);
            }
        }
        None
    }

    // Last holding assignment among the ones folded into the version
    fn version(&mut self, version: VersionId) -> u128 {
        if let Some(value) = self.versions[version.0] {
            return value;
        }
        let design = self.design;
        let assignment = design
            .module_of(self.node)
            .version_assignments(version)
            .iter()
            .rev()
            .find(|assignment| self.guard_holds(&assignment.guard));
        let value = match assignment {
            Some(assignment) => self.eval(&assignment.expr),
            None => 0,
        };
        self.versions[version.0] = Some(value);
        value
    }

    pub fn eval(&mut self, expr: &Expr) -> u128 {
        match expr {
            Expr::Const { value, .. } => *value,
            Expr::Signal { signal, .. } => self.current[self.design.resolve(self.node, *signal)],
            Expr::Not { source, bit_width } => !self.eval(source) & mask(*bit_width),
            Expr::Binary {
                op,
                lhs,
                rhs,
                bit_width,
            } => {
                let operand_bit_width = lhs.bit_width();
                let lhs = self.eval(lhs);
                let rhs = self.eval(rhs);
                binary(*op, lhs, rhs, operand_bit_width, *bit_width)
            }
            Expr::Slice {
                source,
                range_high,
                range_low,
            } => (self.eval(source) >> range_low) & mask(range_high - range_low + 1),
            Expr::Concat { lhs, rhs, .. } => {
                let rhs_bit_width = rhs.bit_width();
                (self.eval(lhs) << rhs_bit_width) | self.eval(rhs)
            }
            Expr::Resize {
                source,
                bit_width,
                signed,
            } => {
                let source_bit_width = source.bit_width();
                let value = self.eval(source);
                resize(value, source_bit_width, *bit_width, *signed)
            }
            Expr::Mux {
                cond,
                when_true,
                when_false,
            } => {
                if self.eval(cond) != 0 {
                    self.eval(when_true)
                } else {
                    self.eval(when_false)
                }
            }
            Expr::Local { version, .. } => self.version(*version),
            Expr::Undefined { .. } => 0,
        }
    }
}

fn to_signed(value: u128, bit_width: u32) -> i128 {
    if bit_width == 0 {
        0
    } else if bit_width >= 128 {
        value as i128
    } else {
        let shift = 128 - bit_width;
        ((value << shift) as i128) >> shift
    }
}

fn resize(value: u128, source_bit_width: u32, bit_width: u32, signed: bool) -> u128 {
    if signed && bit_width > source_bit_width {
        (to_signed(value, source_bit_width) as u128) & mask(bit_width)
    } else {
        value & mask(bit_width)
    }
}

fn binary(op: BinOp, lhs: u128, rhs: u128, operand_bit_width: u32, bit_width: u32) -> u128 {
    let bool_value = |b: bool| b as u128;
    let signed = |value: u128| to_signed(value, operand_bit_width);
    match op {
        BinOp::Add => lhs.wrapping_add(rhs) & mask(bit_width),
        BinOp::Sub => lhs.wrapping_sub(rhs) & mask(bit_width),
        BinOp::BitAnd => lhs & rhs,
        BinOp::BitOr => lhs | rhs,
        BinOp::BitXor => lhs ^ rhs,
        BinOp::Shl => {
            if rhs >= bit_width as u128 {
                0
            } else {
                (lhs << rhs) & mask(bit_width)
            }
        }
        BinOp::Shr => {
            if rhs >= bit_width as u128 {
                0
            } else {
                lhs >> rhs
            }
        }
        BinOp::Sar => {
            let shift = rhs.min(127) as u32;
            ((to_signed(lhs, bit_width) >> shift) as u128) & mask(bit_width)
        }
        BinOp::Equal => bool_value(lhs == rhs),
        BinOp::NotEqual => bool_value(lhs != rhs),
        BinOp::LessThan => bool_value(lhs < rhs),
        BinOp::LessThanEqual => bool_value(lhs <= rhs),
        BinOp::GreaterThan => bool_value(lhs > rhs),
        BinOp::GreaterThanEqual => bool_value(lhs >= rhs),
        BinOp::SignedLessThan => bool_value(signed(lhs) < signed(rhs)),
        BinOp::SignedLessThanEqual => bool_value(signed(lhs) <= signed(rhs)),
        BinOp::SignedGreaterThan => bool_value(signed(lhs) > signed(rhs)),
        BinOp::SignedGreaterThanEqual => bool_value(signed(lhs) >= signed(rhs)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_wraps() {
        assert_eq!(binary(BinOp::Add, 3, 1, 2, 2), 0);
        assert_eq!(binary(BinOp::Sub, 0, 1, 4, 4), 0xf);
        assert_eq!(binary(BinOp::Add, u128::MAX, 1, 128, 128), 0);
    }

    #[test]
    fn shifts_past_width() {
        assert_eq!(binary(BinOp::Shl, 0b1011, 1, 4, 4), 0b0110);
        assert_eq!(binary(BinOp::Shl, 0b1011, 4, 4, 4), 0);
        assert_eq!(binary(BinOp::Shr, 0b1011, 2, 4, 4), 0b10);
        assert_eq!(binary(BinOp::Shr, 0b1011, 200, 4, 4), 0);
    }

    #[test]
    fn arithmetic_shift_copies_sign_bit() {
        assert_eq!(binary(BinOp::Sar, 0b1010, 1, 4, 4), 0b1101);
        assert_eq!(binary(BinOp::Sar, 0b0110, 2, 4, 4), 0b0001);
        assert_eq!(binary(BinOp::Sar, 0b1000, 200, 4, 4), 0b1111);
        assert_eq!(binary(BinOp::Sar, 0b0111, 200, 4, 4), 0);
    }

    #[test]
    fn comparisons() {
        assert_eq!(binary(BinOp::LessThan, 2, 3, 2, 1), 1);
        assert_eq!(binary(BinOp::GreaterThanEqual, 2, 3, 2, 1), 0);
        assert_eq!(binary(BinOp::NotEqual, 2, 3, 2, 1), 1);
    }

    #[test]
    fn signed_comparisons() {
        // 0xff is -1 and 0x01 is 1 as 8-bit two's complement
        assert_eq!(binary(BinOp::LessThan, 0xff, 0x01, 8, 1), 0);
        assert_eq!(binary(BinOp::SignedLessThan, 0xff, 0x01, 8, 1), 1);
        assert_eq!(binary(BinOp::SignedGreaterThanEqual, 0x80, 0x7f, 8, 1), 0);
        assert_eq!(binary(BinOp::SignedLessThanEqual, 0x80, 0x80, 8, 1), 1);
        assert_eq!(binary(BinOp::SignedGreaterThan, 0x00, 0xf0, 8, 1), 1);
    }

    #[test]
    fn sign_extension() {
        assert_eq!(resize(0b1010, 4, 8, true), 0b1111_1010);
        assert_eq!(resize(0b0110, 4, 8, true), 0b0000_0110);
        assert_eq!(resize(0b1010, 4, 8, false), 0b0000_1010);
        assert_eq!(resize(0b1111_1010, 8, 4, true), 0b1010);
        assert_eq!(resize(1, 1, 128, true), u128::MAX);
    }

    #[test]
    fn narrow_values_reinterpret_as_signed() {
        assert_eq!(to_signed(0b100, 3), -4);
        assert_eq!(to_signed(0b011, 3), 3);
        assert_eq!(to_signed(u128::MAX, 128), -1);
    }
}
