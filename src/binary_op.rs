//! The operator table. Every binary node shares the same traversal code in
//! [`crate::graph`]; only the two functions in this module differ per kind.

use std::fmt::Display;

use crate::error::{GraphError, Result};

/// Kind of a two-operand node. Children are ordered `(lhs, rhs)` and the
/// partials returned by [`BinaryOp::partials`] follow the same order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    pub const ALL: [BinaryOp; 5] = [Self::Add, Self::Sub, Self::Mul, Self::Div, Self::Pow];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Add => "Add",
            Self::Sub => "Subtract",
            Self::Mul => "Multiply",
            Self::Div => "Divide",
            Self::Pow => "Power",
        }
    }

    /// Infix symbol used in expression labels.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Pow => "^",
        }
    }

    pub fn eval(&self, lhs: f64, rhs: f64) -> Result<f64> {
        use BinaryOp::*;
        Ok(match self {
            Add => lhs + rhs,
            Sub => lhs - rhs,
            Mul => lhs * rhs,
            Div => {
                if rhs == 0. {
                    return Err(self.domain(lhs, rhs, "division by zero"));
                }
                lhs / rhs
            }
            Pow => {
                if lhs < 0. && rhs.fract() != 0. {
                    return Err(self.domain(
                        lhs,
                        rhs,
                        "negative base with a non-integer exponent",
                    ));
                }
                if lhs == 0. && rhs < 0. {
                    return Err(self.domain(lhs, rhs, "zero base with a negative exponent"));
                }
                lhs.powf(rhs)
            }
        })
    }

    /// Local derivatives `(d/d lhs, d/d rhs)` at the given operands.
    ///
    /// `rhs_required` tells whether the gradient of the right operand is
    /// needed at all. It only matters for [`BinaryOp::Pow`], whose exponent
    /// partial takes the logarithm of the base: when the base is not
    /// positive and the exponent is a constant expression, the partial is
    /// `None` and the edge carries no gradient.
    pub fn partials(&self, lhs: f64, rhs: f64, rhs_required: bool) -> Result<(f64, Option<f64>)> {
        use BinaryOp::*;
        Ok(match self {
            Add => (1., Some(1.)),
            Sub => (1., Some(-1.)),
            Mul => (rhs, Some(lhs)),
            Div => {
                if rhs == 0. {
                    return Err(self.domain(lhs, rhs, "division by zero"));
                }
                (1. / rhs, Some(-lhs / (rhs * rhs)))
            }
            Pow => {
                // x^0 is constant in x, including at x = 0.
                let dlhs = if rhs == 0. {
                    0.
                } else {
                    rhs * lhs.powf(rhs - 1.)
                };
                if !dlhs.is_finite() {
                    return Err(self.domain(lhs, rhs, "derivative with respect to the base diverges"));
                }
                let drhs = if 0. < lhs {
                    Some(lhs.powf(rhs) * lhs.ln())
                } else if rhs_required {
                    return Err(self.domain(lhs, rhs, "logarithm of a non-positive base"));
                } else {
                    None
                };
                (dlhs, drhs)
            }
        })
    }

    fn domain(&self, lhs: f64, rhs: f64, reason: &'static str) -> GraphError {
        GraphError::Domain {
            op: *self,
            lhs,
            rhs,
            reason,
        }
    }
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(BinaryOp::Add, 3., 4., 7., 1., 1.)]
    #[case(BinaryOp::Sub, 3., 4., -1., 1., -1.)]
    #[case(BinaryOp::Mul, 3., 4., 12., 4., 3.)]
    #[case(BinaryOp::Div, 3., 4., 0.75, 0.25, -3. / 16.)]
    #[case(BinaryOp::Pow, 3., 2., 9., 6., 9. * 3f64.ln())]
    #[case(BinaryOp::Pow, 2., 0.5, 2f64.sqrt(), 0.5 / 2f64.sqrt(), 2f64.sqrt() * 2f64.ln())]
    fn test_table(
        #[case] op: BinaryOp,
        #[case] lhs: f64,
        #[case] rhs: f64,
        #[case] value: f64,
        #[case] dlhs: f64,
        #[case] drhs: f64,
    ) {
        assert!((op.eval(lhs, rhs).unwrap() - value).abs() < 1e-12);
        let (l, r) = op.partials(lhs, rhs, true).unwrap();
        assert!((l - dlhs).abs() < 1e-12, "{op}: {l} != {dlhs}");
        assert!((r.unwrap() - drhs).abs() < 1e-12, "{op}: {r:?} != {drhs}");
    }

    #[rstest]
    #[case(BinaryOp::Div, 1., 0.)]
    #[case(BinaryOp::Pow, -2., 0.5)]
    #[case(BinaryOp::Pow, 0., -1.)]
    fn test_eval_domain(#[case] op: BinaryOp, #[case] lhs: f64, #[case] rhs: f64) {
        assert!(matches!(
            op.eval(lhs, rhs),
            Err(GraphError::Domain { op: o, .. }) if o == op
        ));
    }

    #[test]
    fn test_pow_negative_base() {
        let op = BinaryOp::Pow;
        assert_eq!(op.eval(-2., 3.).unwrap(), -8.);
        assert_eq!(op.partials(-2., 3., false).unwrap(), (12., None));
        assert!(matches!(
            op.partials(-2., 3., true),
            Err(GraphError::Domain { .. })
        ));
    }

    #[test]
    fn test_all_kinds_covered() {
        let names: Vec<_> = BinaryOp::ALL.iter().map(|op| op.name()).collect();
        assert_eq!(names, ["Add", "Subtract", "Multiply", "Divide", "Power"]);
        for op in BinaryOp::ALL {
            assert!(op.eval(2., 3.).unwrap().is_finite(), "{op}");
            let (dlhs, drhs) = op.partials(2., 3., true).unwrap();
            assert!(dlhs.is_finite() && drhs.unwrap().is_finite(), "{op}");
        }
    }

    #[test]
    fn test_pow_zero_exponent() {
        let op = BinaryOp::Pow;
        assert_eq!(op.eval(0., 0.).unwrap(), 1.);
        assert_eq!(op.partials(0., 0., false).unwrap(), (0., None));
        assert_eq!(op.partials(5., 0., true).unwrap(), (0., Some(5f64.ln())));
    }

    #[test]
    fn test_pow_zero_base() {
        let op = BinaryOp::Pow;
        assert_eq!(op.eval(0., 2.).unwrap(), 0.);
        assert_eq!(op.partials(0., 2., false).unwrap(), (0., None));
        assert!(op.partials(0., 0.5, false).is_err());
    }
}
