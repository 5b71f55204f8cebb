//! Expression tree consumed by the serializer.
//!
//! Trees are produced upstream by the typed DSL layer; the helpers on [`Expr`]
//! exist so callers and tests can assemble them without a parser.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::query::Value;

/// Typed entity reference participating in a query.
///
/// The first source registered on a query is the candidate class; every
/// further source is declared as an auxiliary variable.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Source {
    /// Entity type name as known to the executor.
    pub type_name: String,
    /// Identifier used to reference the source in expressions.
    pub var: String,
}

impl Source {
    /// Creates a source for `type_name` referenced as `var`.
    pub fn new(type_name: impl Into<String>, var: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            var: var.into(),
        }
    }

    /// Path rooted at this source.
    pub fn path(&self) -> Path {
        Path::new(self.var.clone())
    }

    /// Expression referencing the source itself.
    pub fn expr(&self) -> Expr {
        Expr::Path(self.path())
    }

    /// Expression referencing a property of this source.
    pub fn prop(&self, name: impl Into<String>) -> Expr {
        Expr::Path(self.path().get(name))
    }
}

/// Navigation from a root variable through property segments.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Path {
    /// Root variable identifier.
    pub root: String,
    /// Property names navigated from the root, outermost first.
    pub segments: Vec<String>,
}

impl Path {
    /// Creates a path naming a bare variable.
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            segments: Vec::new(),
        }
    }

    /// Returns a child path navigating into `segment`.
    pub fn get(&self, segment: impl Into<String>) -> Path {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Path {
            root: self.root.clone(),
            segments,
        }
    }

    /// True when the path names the variable itself rather than a property.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.root)?;
        for segment in &self.segments {
            write!(f, ".{segment}")?;
        }
        Ok(())
    }
}

/// Operators the target grammar can express.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// Logical conjunction.
    And,
    /// Logical disjunction.
    Or,
    /// Logical negation.
    Not,
    /// Equality.
    Eq,
    /// Inequality.
    Ne,
    /// Strictly less than.
    Lt,
    /// Less than or equal.
    Le,
    /// Strictly greater than.
    Gt,
    /// Greater than or equal.
    Ge,
    /// Inclusive range test.
    Between,
    /// Null test.
    IsNull,
    /// Non-null test.
    IsNotNull,
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Division.
    Div,
    /// Remainder.
    Rem,
    /// Arithmetic negation.
    Neg,
    /// String prefix test.
    StartsWith,
    /// String suffix test.
    EndsWith,
    /// Regular expression match.
    Matches,
    /// Substring containment.
    StringContains,
    /// Position of a substring.
    IndexOf,
    /// Lower-case conversion.
    Lower,
    /// Upper-case conversion.
    Upper,
    /// String length.
    Length,
    /// Substring extraction.
    Substring,
    /// Character at position.
    CharAt,
    /// Collection membership.
    Contains,
    /// Empty collection test.
    IsEmpty,
    /// Non-empty collection test.
    IsNotEmpty,
    /// Collection size.
    Size,
    /// Map key membership.
    ContainsKey,
    /// Map value membership.
    ContainsValue,
    /// Map lookup.
    Get,
    /// Absolute value.
    Abs,
    /// Square root.
    Sqrt,
    /// Row count aggregate.
    Count,
    /// Distinct count aggregate.
    CountDistinct,
    /// Sum aggregate.
    Sum,
    /// Average aggregate.
    Avg,
    /// Minimum aggregate.
    Min,
    /// Maximum aggregate.
    Max,
    /// Runtime type test.
    InstanceOf,
}

impl Operator {
    /// Every operator, in declaration order.
    pub const ALL: [Operator; 44] = {
        use Operator::*;
        [
            And, Or, Not, Eq, Ne, Lt, Le, Gt, Ge, Between, IsNull, IsNotNull, Add, Sub, Mul, Div,
            Rem, Neg, StartsWith, EndsWith, Matches, StringContains, IndexOf, Lower, Upper,
            Length, Substring, CharAt, Contains, IsEmpty, IsNotEmpty, Size, ContainsKey,
            ContainsValue, Get, Abs, Sqrt, Count, CountDistinct, Sum, Avg, Min, Max, InstanceOf,
        ]
    };

    /// Looks up an operator by its configuration name.
    pub fn from_name(name: &str) -> Option<Operator> {
        Operator::ALL.into_iter().find(|op| op.name() == name)
    }

    /// Number of arguments the operator takes.
    pub fn arity(self) -> usize {
        use Operator::*;
        match self {
            Not | Neg | IsNull | IsNotNull | Lower | Upper | Length | IsEmpty | IsNotEmpty
            | Size | Abs | Sqrt | Count | CountDistinct | Sum | Avg | Min | Max => 1,
            Between | Substring => 3,
            _ => 2,
        }
    }

    /// Snake-case name used in configuration files.
    pub fn name(self) -> &'static str {
        use Operator::*;
        match self {
            And => "and",
            Or => "or",
            Not => "not",
            Eq => "eq",
            Ne => "ne",
            Lt => "lt",
            Le => "le",
            Gt => "gt",
            Ge => "ge",
            Between => "between",
            IsNull => "is_null",
            IsNotNull => "is_not_null",
            Add => "add",
            Sub => "sub",
            Mul => "mul",
            Div => "div",
            Rem => "rem",
            Neg => "neg",
            StartsWith => "starts_with",
            EndsWith => "ends_with",
            Matches => "matches",
            StringContains => "string_contains",
            IndexOf => "index_of",
            Lower => "lower",
            Upper => "upper",
            Length => "length",
            Substring => "substring",
            CharAt => "char_at",
            Contains => "contains",
            IsEmpty => "is_empty",
            IsNotEmpty => "is_not_empty",
            Size => "size",
            ContainsKey => "contains_key",
            ContainsValue => "contains_value",
            Get => "get",
            Abs => "abs",
            Sqrt => "sqrt",
            Count => "count",
            CountDistinct => "count_distinct",
            Sum => "sum",
            Avg => "avg",
            Min => "min",
            Max => "max",
            InstanceOf => "instance_of",
        }
    }
}

/// Node of an expression tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Literal value; always hoisted into a bound parameter.
    Constant(Value),
    /// Variable or property reference.
    Path(Path),
    /// Type name rendered verbatim, e.g. the right side of `instanceof`.
    TypeRef(String),
    /// Operator application.
    Operation {
        /// Applied operator.
        op: Operator,
        /// Operands, left to right.
        args: Vec<Expr>,
    },
    /// Constructor call; only meaningful in a projection, where it is
    /// flattened into its arguments.
    Constructor {
        /// Type being constructed.
        type_name: String,
        /// Constructor arguments, each a projection column.
        args: Vec<Expr>,
    },
}

#[allow(clippy::should_implement_trait)]
impl Expr {
    /// Literal constant node.
    pub fn constant(value: impl Into<Value>) -> Expr {
        Expr::Constant(value.into())
    }

    /// Operator application node.
    pub fn op(op: Operator, args: Vec<Expr>) -> Expr {
        Expr::Operation { op, args }
    }

    /// Constructor call node.
    pub fn constructor(type_name: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::Constructor {
            type_name: type_name.into(),
            args,
        }
    }

    fn binary(self, op: Operator, rhs: impl Into<Expr>) -> Expr {
        Expr::op(op, vec![self, rhs.into()])
    }

    fn unary(self, op: Operator) -> Expr {
        Expr::op(op, vec![self])
    }

    /// `self == rhs`
    pub fn eq(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(Operator::Eq, rhs)
    }

    /// `self != rhs`
    pub fn ne(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(Operator::Ne, rhs)
    }

    /// `self < rhs`
    pub fn lt(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(Operator::Lt, rhs)
    }

    /// `self <= rhs`
    pub fn le(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(Operator::Le, rhs)
    }

    /// `self > rhs`
    pub fn gt(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(Operator::Gt, rhs)
    }

    /// `self >= rhs`
    pub fn ge(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(Operator::Ge, rhs)
    }

    /// Inclusive range test.
    pub fn between(self, low: impl Into<Expr>, high: impl Into<Expr>) -> Expr {
        Expr::op(Operator::Between, vec![self, low.into(), high.into()])
    }

    /// Logical conjunction.
    pub fn and(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(Operator::And, rhs)
    }

    /// Logical disjunction.
    pub fn or(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(Operator::Or, rhs)
    }

    /// Logical negation.
    pub fn not(self) -> Expr {
        self.unary(Operator::Not)
    }

    /// Null test.
    pub fn is_null(self) -> Expr {
        self.unary(Operator::IsNull)
    }

    /// Non-null test.
    pub fn is_not_null(self) -> Expr {
        self.unary(Operator::IsNotNull)
    }

    /// Arithmetic addition.
    pub fn add(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(Operator::Add, rhs)
    }

    /// Arithmetic subtraction.
    pub fn sub(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(Operator::Sub, rhs)
    }

    /// Arithmetic multiplication.
    pub fn mul(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(Operator::Mul, rhs)
    }

    /// String prefix test.
    pub fn starts_with(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(Operator::StartsWith, rhs)
    }

    /// String suffix test.
    pub fn ends_with(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(Operator::EndsWith, rhs)
    }

    /// Collection membership test.
    pub fn contains(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(Operator::Contains, rhs)
    }

    /// Lower-case conversion.
    pub fn lower(self) -> Expr {
        self.unary(Operator::Lower)
    }

    /// Collection size.
    pub fn size(self) -> Expr {
        self.unary(Operator::Size)
    }

    /// Row count aggregate.
    pub fn count(self) -> Expr {
        self.unary(Operator::Count)
    }

    /// Sum aggregate.
    pub fn sum(self) -> Expr {
        self.unary(Operator::Sum)
    }

    /// Maximum aggregate.
    pub fn max(self) -> Expr {
        self.unary(Operator::Max)
    }

    /// Ascending order specifier.
    pub fn asc(self) -> OrderSpecifier {
        OrderSpecifier::new(self, Order::Asc)
    }

    /// Descending order specifier.
    pub fn desc(self) -> OrderSpecifier {
        OrderSpecifier::new(self, Order::Desc)
    }

    /// True when the node is a bare reference to `source`.
    pub fn is_source(&self, source: &Source) -> bool {
        matches!(self, Expr::Path(path) if path.is_root() && path.root == source.var)
    }
}

impl From<Path> for Expr {
    fn from(path: Path) -> Self {
        Expr::Path(path)
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Constant(value)
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Expr::Constant(value.into())
    }
}

impl From<String> for Expr {
    fn from(value: String) -> Self {
        Expr::Constant(value.into())
    }
}

impl From<bool> for Expr {
    fn from(value: bool) -> Self {
        Expr::Constant(value.into())
    }
}

impl From<i32> for Expr {
    fn from(value: i32) -> Self {
        Expr::Constant(value.into())
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Expr::Constant(value.into())
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::Constant(value.into())
    }
}

/// Sort direction.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Order {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

impl Order {
    /// Keyword the grammar uses for the direction.
    pub fn keyword(self) -> &'static str {
        match self {
            Order::Asc => "ascending",
            Order::Desc => "descending",
        }
    }
}

/// Expression paired with a sort direction.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderSpecifier {
    /// Expression to sort on.
    pub target: Expr,
    /// Sort direction.
    pub order: Order,
}

impl OrderSpecifier {
    /// Creates an order specifier.
    pub fn new(target: Expr, order: Order) -> Self {
        Self { target, order }
    }
}
