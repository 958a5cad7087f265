use crate::{BinaryOp, Equation, EquationForm, Expression, Function, Node, Variable};

use std::f64::consts::{E, PI};

/// Values for the single-letter variables `a..=z`, scoped to one evaluation.
///
/// Letters that were never bound read as `0.0`, as do characters outside
/// `a..=z`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bindings {
    values: [f64; 26],
}

impl Default for Bindings {
    fn default() -> Self {
        Self { values: [0.0; 26] }
    }
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(name: char) -> Option<usize> {
        name.is_ascii_lowercase().then(|| (name as u8 - b'a') as usize)
    }

    pub fn get(&self, name: char) -> f64 {
        Self::slot(name).map_or(0.0, |i| self.values[i])
    }

    /// Binds `name`. Characters outside `a..=z` are ignored.
    pub fn set(&mut self, name: char, value: f64) {
        if let Some(i) = Self::slot(name) {
            self.values[i] = value;
        }
    }

    /// Returns a copy of these bindings with `name` bound to `value`.
    pub fn with(mut self, name: char, value: f64) -> Self {
        self.set(name, value);
        self
    }
}

impl FromIterator<(char, f64)> for Bindings {
    fn from_iter<I: IntoIterator<Item = (char, f64)>>(iter: I) -> Self {
        let mut bindings = Self::default();
        for (name, value) in iter {
            bindings.set(name, value);
        }
        bindings
    }
}

impl Expression {
    pub fn evaluate_without_vars(&self) -> f64 {
        self.evaluate(&Bindings::default())
    }

    /// Calculates the value of the expression.
    ///
    /// Never fails: domain errors surface as `NaN` and overflow as an
    /// infinity.
    pub fn evaluate(&self, bindings: &Bindings) -> f64 {
        self.root.evaluate_recursive(bindings, self.angle_mode.factor())
    }
}

impl Equation {
    /// Value of the implicit function `f(x, y)` whose zero set is the curve
    /// described by this equation.
    ///
    /// Explicit equations `y = g(x)` are turned into `y - g(x)`.
    pub fn implicit_value(&self, x: f64, y: f64, bindings: &Bindings) -> f64 {
        let bindings = bindings.with('x', x).with('y', y);
        let value = self.expression.evaluate(&bindings);
        match self.form {
            EquationForm::Implicit => value,
            EquationForm::Explicit => y - value,
        }
    }
}

impl Node {
    fn evaluate_recursive(&self, bindings: &Bindings, angle_factor: f64) -> f64 {
        match self {
            Self::Constant(value) => *value,
            Self::Variable(Variable::Pi) => PI,
            Self::Variable(Variable::E) => E,
            Self::Variable(Variable::Letter(name)) => bindings.get(*name),
            Self::Binary(op, lhs, rhs) => evaluate_binary_op(
                *op,
                lhs.evaluate_recursive(bindings, angle_factor),
                rhs.evaluate_recursive(bindings, angle_factor),
            ),
            Self::Function(function, only) => evaluate_function(
                function,
                only.evaluate_recursive(bindings, angle_factor),
                angle_factor,
            ),
        }
    }
}

fn evaluate_binary_op(op: BinaryOp, lhs: f64, rhs: f64) -> f64 {
    match op {
        BinaryOp::Add => lhs + rhs,
        BinaryOp::Sub => lhs - rhs,
        BinaryOp::Mul => lhs * rhs,
        BinaryOp::Div => lhs / rhs,
        // Squaring is by far the most common power in plotted equations.
        BinaryOp::Pow if rhs == 2.0 => lhs * lhs,
        BinaryOp::Pow => lhs.powf(rhs),
    }
}

fn evaluate_function(function: &Function, only: f64, angle_factor: f64) -> f64 {
    match function {
        Function::Sin => (only / angle_factor).sin(),
        Function::Cos => (only / angle_factor).cos(),
        Function::Tan => (only / angle_factor).tan(),
        Function::Asin => only.asin() * angle_factor,
        Function::Acos => only.acos() * angle_factor,
        Function::Atan => only.atan() * angle_factor,
        Function::Sinh => only.sinh(),
        Function::Cosh => only.cosh(),
        Function::Tanh => only.tanh(),
        Function::Exp => only.exp(),
        Function::Log => only.log10(),
        Function::Ln => only.ln(),
        Function::Abs => only.abs(),
        Function::Deg => only * 180.0 / PI,
        Function::Rad => only * PI / 180.0,
        Function::Sign => sign(only),
        Function::Sqrt => only.sqrt(),
        Function::Round => only.round_ties_even(),
        Function::Int | Function::Floor => only.floor(),
        Function::Ceil => only.ceil(),
        Function::Fact => factorial(only),
        Function::Unknown(_) => f64::NAN,
    }
}

fn sign(value: f64) -> f64 {
    if value.is_nan() {
        value
    } else if value < 0.0 {
        -1.0
    } else {
        1.0
    }
}

/// Factorial of `value` truncated toward zero.
fn factorial(value: f64) -> f64 {
    if value.is_nan() {
        return f64::NAN;
    }
    let n = value.trunc();
    if n < 0.0 {
        return f64::NAN;
    }
    if n < 2.0 {
        return 1.0;
    }
    let mut product = n;
    let mut i = n - 1.0;
    while i >= 2.0 {
        product *= i;
        if product.is_infinite() {
            break;
        }
        i -= 1.0;
    }
    product
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AngleMode;

    fn letter(c: char) -> Node {
        Node::Variable(Variable::Letter(c))
    }

    #[test]
    fn unbound_variables_read_zero() {
        let expr = Expression::new(
            Node::binary(BinaryOp::Add, letter('q'), Node::Constant(1.5)),
            AngleMode::Radians,
        );
        assert_eq!(expr.evaluate_without_vars(), 1.5);
        assert_eq!(expr.evaluate(&Bindings::new().with('q', 2.0)), 3.5);
    }

    #[test]
    fn bindings_ignore_non_letters() {
        let mut bindings = Bindings::new();
        bindings.set('A', 3.0);
        bindings.set('7', 3.0);
        assert_eq!(bindings, Bindings::new());
        let bindings: Bindings = [('x', 1.0), ('z', 2.0)].into_iter().collect();
        assert_eq!(bindings.get('x'), 1.0);
        assert_eq!(bindings.get('z'), 2.0);
        assert_eq!(bindings.get('y'), 0.0);
    }

    #[test]
    fn square_matches_general_power() {
        for base in [-3.5, -1.0, 0.0, 0.1, 5.0, 1e10] {
            assert_eq!(evaluate_binary_op(BinaryOp::Pow, base, 2.0), base.powf(2.0));
        }
        assert_eq!(evaluate_binary_op(BinaryOp::Pow, 2.0, 10.0), 1024.0);
    }

    #[test]
    fn degrees_apply_to_trig_only() {
        let factor = AngleMode::Degrees.factor();
        assert!((evaluate_function(&Function::Sin, 90.0, factor) - 1.0).abs() < 1e-12);
        assert!((evaluate_function(&Function::Atan, 1.0, factor) - 45.0).abs() < 1e-12);
        assert_eq!(evaluate_function(&Function::Sqrt, 16.0, factor), 4.0);
        assert!((evaluate_function(&Function::Deg, PI, 1.0) - 180.0).abs() < 1e-12);
    }

    #[test]
    fn factorial_edge_cases() {
        assert!(factorial(-1.0).is_nan());
        assert_eq!(factorial(0.0), 1.0);
        assert_eq!(factorial(1.9), 1.0);
        assert_eq!(factorial(5.7), 120.0);
        assert_eq!(factorial(10.0), 3_628_800.0);
        assert!(factorial(1e9).is_infinite());
    }

    #[test]
    fn misc_functions() {
        assert_eq!(evaluate_function(&Function::Sign, -0.5, 1.0), -1.0);
        assert_eq!(evaluate_function(&Function::Sign, 0.0, 1.0), 1.0);
        assert_eq!(evaluate_function(&Function::Round, 2.5, 1.0), 2.0);
        assert_eq!(evaluate_function(&Function::Round, 3.5, 1.0), 4.0);
        assert_eq!(evaluate_function(&Function::Int, -1.5, 1.0), -2.0);
        assert_eq!(evaluate_function(&Function::Log, 1000.0, 1.0), 3.0);
        assert!(evaluate_function(&Function::Unknown("foo".into()), 1.0, 1.0).is_nan());
    }

    #[test]
    fn explicit_equation_subtracts_from_y() {
        let equation = Equation {
            expression: Expression::new(
                Node::binary(BinaryOp::Mul, Node::Constant(2.0), letter('x')),
                AngleMode::Radians,
            ),
            form: EquationForm::Explicit,
        };
        assert_eq!(equation.implicit_value(3.0, 6.0, &Bindings::new()), 0.0);
        assert_eq!(equation.implicit_value(3.0, 7.0, &Bindings::new()), 1.0);
    }
}
