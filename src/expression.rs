use std::collections::BTreeSet;
use std::fmt;

/// Whether trigonometric functions take (and inverse trigonometric functions
/// return) radians or degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AngleMode {
    #[default]
    Radians,
    Degrees,
}

impl AngleMode {
    /// Number of "angle units" per radian.
    pub(crate) fn factor(self) -> f64 {
        match self {
            Self::Radians => 1.0,
            Self::Degrees => 180.0 / std::f64::consts::PI,
        }
    }
}

/// A parsed formula, ready for evaluation.
#[derive(Clone, Debug, PartialEq)]
pub struct Expression {
    pub(crate) root: Node,
    pub(crate) angle_mode: AngleMode,
}

/// One node of an [`Expression`] tree. Children are owned exclusively.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    // Constant.
    Constant(f64),

    // Input variable, resolved at evaluation time.
    Variable(Variable),

    // Binary real ops.
    Binary(BinaryOp, Box<Node>, Box<Node>),

    // Unary real ops.
    Function(Function, Box<Node>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Variable {
    /// A single lowercase letter `a..=z` other than `e`.
    Letter(char),
    Pi,
    E,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Function {
    // Trigonometric, affected by the angle mode.
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,

    Sinh,
    Cosh,
    Tanh,
    Exp,
    /// Base 10.
    Log,
    Ln,
    Abs,
    Deg,
    Rad,
    Sign,
    Sqrt,
    Round,
    Int,
    Floor,
    Ceil,
    Fact,

    /// A name that is not a known function. Always evaluates to NaN.
    Unknown(String),
}

/// Whether an [`Equation`] came from `lhs = rhs` or from a bare `lhs`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EquationForm {
    /// `y = expression`.
    Explicit,
    /// `expression = 0`, where the expression is `(lhs) - (rhs)`.
    Implicit,
}

/// Top-level result of parsing an equation string.
#[derive(Clone, Debug, PartialEq)]
pub struct Equation {
    pub expression: Expression,
    pub form: EquationForm,
}

impl Expression {
    pub fn new(root: Node, angle_mode: AngleMode) -> Self {
        Self { root, angle_mode }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn angle_mode(&self) -> AngleMode {
        self.angle_mode
    }

    /// Height of the tree. A single leaf has depth 1.
    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    /// The single-letter variables referenced by this expression. `pi` and
    /// `e` are constants and are not reported.
    pub fn variables(&self) -> BTreeSet<char> {
        let mut vars = BTreeSet::new();
        self.root.collect_variables(&mut vars);
        vars
    }
}

impl Node {
    pub fn binary(op: BinaryOp, lhs: Node, rhs: Node) -> Self {
        Self::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn function(function: Function, only: Node) -> Self {
        Self::Function(function, Box::new(only))
    }

    fn depth(&self) -> usize {
        match self {
            Self::Constant(_) | Self::Variable(_) => 1,
            Self::Binary(_, lhs, rhs) => 1 + lhs.depth().max(rhs.depth()),
            Self::Function(_, only) => 1 + only.depth(),
        }
    }

    fn collect_variables(&self, vars: &mut BTreeSet<char>) {
        match self {
            Self::Variable(Variable::Letter(c)) => {
                vars.insert(*c);
            }
            Self::Constant(_) | Self::Variable(_) => {}
            Self::Binary(_, lhs, rhs) => {
                lhs.collect_variables(vars);
                rhs.collect_variables(vars);
            }
            Self::Function(_, only) => only.collect_variables(vars),
        }
    }
}

impl Function {
    /// Looks up a function by its lowercase name.
    pub fn from_name(name: &str) -> Self {
        match name {
            "sin" => Self::Sin,
            "cos" => Self::Cos,
            "tan" => Self::Tan,
            "asin" => Self::Asin,
            "acos" => Self::Acos,
            "atan" => Self::Atan,
            "sinh" => Self::Sinh,
            "cosh" => Self::Cosh,
            "tanh" => Self::Tanh,
            "exp" => Self::Exp,
            "log" => Self::Log,
            "ln" => Self::Ln,
            "abs" => Self::Abs,
            "deg" => Self::Deg,
            "rad" => Self::Rad,
            "sign" => Self::Sign,
            "sqrt" => Self::Sqrt,
            "round" => Self::Round,
            "int" => Self::Int,
            "floor" => Self::Floor,
            "ceil" => Self::Ceil,
            "fact" => Self::Fact,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Tan => "tan",
            Self::Asin => "asin",
            Self::Acos => "acos",
            Self::Atan => "atan",
            Self::Sinh => "sinh",
            Self::Cosh => "cosh",
            Self::Tanh => "tanh",
            Self::Exp => "exp",
            Self::Log => "log",
            Self::Ln => "ln",
            Self::Abs => "abs",
            Self::Deg => "deg",
            Self::Rad => "rad",
            Self::Sign => "sign",
            Self::Sqrt => "sqrt",
            Self::Round => "round",
            Self::Int => "int",
            Self::Floor => "floor",
            Self::Ceil => "ceil",
            Self::Fact => "fact",
            Self::Unknown(name) => name,
        }
    }
}

impl BinaryOp {
    fn symbol(self) -> char {
        match self {
            Self::Add => '+',
            Self::Sub => '-',
            Self::Mul => '*',
            Self::Div => '/',
            Self::Pow => '^',
        }
    }
}

/// Fully parenthesized rendering, mainly useful in logs and test failures.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(value) => write!(f, "{value}"),
            Self::Variable(Variable::Letter(c)) => write!(f, "{c}"),
            Self::Variable(Variable::Pi) => f.write_str("pi"),
            Self::Variable(Variable::E) => f.write_str("e"),
            Self::Binary(op, lhs, rhs) => write!(f, "({lhs}{}{rhs})", op.symbol()),
            Self::Function(function, only) => write!(f, "{}({only})", function.name()),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.root.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_and_variables() {
        let root = Node::binary(
            BinaryOp::Add,
            Node::function(Function::Sin, Node::Variable(Variable::Letter('x'))),
            Node::binary(
                BinaryOp::Mul,
                Node::Variable(Variable::Letter('a')),
                Node::Variable(Variable::Pi),
            ),
        );
        let expr = Expression::new(root, AngleMode::Radians);
        assert_eq!(expr.depth(), 3);
        assert_eq!(expr.variables().into_iter().collect::<Vec<_>>(), vec!['a', 'x']);
        assert_eq!(expr.to_string(), "(sin(x)+(a*pi))");
    }

    #[test]
    fn function_names_round_trip() {
        for name in ["sin", "atan", "ln", "fact", "ceil"] {
            assert_eq!(Function::from_name(name).name(), name);
        }
        assert_eq!(
            Function::from_name("foo"),
            Function::Unknown("foo".to_string())
        );
    }
}
