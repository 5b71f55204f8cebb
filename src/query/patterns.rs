//! Operator templates and precedences of the target query grammar.

use std::collections::HashMap;

use crate::query::ast::Operator;

/// Piece of a parsed template.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Segment {
    /// Literal grammar text.
    Text(String),
    /// Placeholder for the operand at this index.
    Arg(usize),
}

/// Parsed operator template such as `{0}.startsWith({1})`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parses `{n}` placeholders out of `source`.
    pub fn parse(source: &str) -> Result<Self, String> {
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut chars = source.chars().peekable();
        while let Some(ch) = chars.next() {
            if ch != '{' {
                text.push(ch);
                continue;
            }
            let mut digits = String::new();
            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(d) if d.is_ascii_digit() => digits.push(d),
                    Some(other) => {
                        return Err(format!("unexpected '{other}' inside placeholder"));
                    }
                    None => return Err("unterminated placeholder".to_owned()),
                }
            }
            let index = digits
                .parse::<usize>()
                .map_err(|_| "empty placeholder".to_owned())?;
            if !text.is_empty() {
                segments.push(Segment::Text(std::mem::take(&mut text)));
            }
            segments.push(Segment::Arg(index));
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }
        Ok(Self { segments })
    }

    /// Segments in render order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Highest placeholder index referenced, if any.
    pub fn max_arg(&self) -> Option<usize> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Arg(index) => Some(*index),
                Segment::Text(_) => None,
            })
            .max()
    }

    /// True when the placeholder at `position` sits inside call parentheses
    /// or an argument list, where operands never need wrapping.
    pub fn is_enclosed(&self, position: usize) -> bool {
        let before = position
            .checked_sub(1)
            .and_then(|idx| self.segments.get(idx));
        let after = self.segments.get(position + 1);
        let opens = matches!(before, Some(Segment::Text(t)) if t.ends_with('(') || t.ends_with(','));
        let closes =
            matches!(after, Some(Segment::Text(t)) if t.starts_with(')') || t.starts_with(','));
        opens && closes
    }
}

/// Rendering rule for one operator.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Pattern {
    /// Text template.
    pub template: Template,
    /// Binding strength of the rendered expression; higher binds tighter.
    pub precedence: u8,
    /// Binding strength operands are compared against when deciding whether
    /// to parenthesise them.
    pub operand_precedence: u8,
}

impl Pattern {
    fn new(template: &str, precedence: u8) -> Self {
        Self {
            template: Template { segments: parse_static(template) },
            precedence,
            operand_precedence: precedence,
        }
    }

    fn operands_at(mut self, precedence: u8) -> Self {
        self.operand_precedence = precedence;
        self
    }
}

fn parse_static(template: &str) -> Vec<Segment> {
    match Template::parse(template) {
        Ok(parsed) => parsed.segments,
        Err(_) => vec![Segment::Text(template.to_owned())],
    }
}

const OR: u8 = 1;
const AND: u8 = 2;
const EQUALITY: u8 = 4;
const RELATIONAL: u8 = 5;
const ADDITIVE: u8 = 6;
const MULTIPLICATIVE: u8 = 7;
const UNARY: u8 = 8;
const POSTFIX: u8 = 10;

fn default_pattern(op: Operator) -> Pattern {
    use Operator::*;
    match op {
        And => Pattern::new("{0} && {1}", AND),
        Or => Pattern::new("{0} || {1}", OR),
        Not => Pattern::new("!{0}", UNARY),
        Eq => Pattern::new("{0} == {1}", EQUALITY),
        Ne => Pattern::new("{0} != {1}", EQUALITY),
        Lt => Pattern::new("{0} < {1}", RELATIONAL),
        Le => Pattern::new("{0} <= {1}", RELATIONAL),
        Gt => Pattern::new("{0} > {1}", RELATIONAL),
        Ge => Pattern::new("{0} >= {1}", RELATIONAL),
        Between => Pattern::new("{0} >= {1} && {0} <= {2}", AND).operands_at(RELATIONAL),
        IsNull => Pattern::new("{0} == null", EQUALITY),
        IsNotNull => Pattern::new("{0} != null", EQUALITY),
        Add => Pattern::new("{0} + {1}", ADDITIVE),
        Sub => Pattern::new("{0} - {1}", ADDITIVE),
        Mul => Pattern::new("{0} * {1}", MULTIPLICATIVE),
        Div => Pattern::new("{0} / {1}", MULTIPLICATIVE),
        Rem => Pattern::new("{0} % {1}", MULTIPLICATIVE),
        Neg => Pattern::new("-{0}", UNARY),
        StartsWith => Pattern::new("{0}.startsWith({1})", POSTFIX),
        EndsWith => Pattern::new("{0}.endsWith({1})", POSTFIX),
        Matches => Pattern::new("{0}.matches({1})", POSTFIX),
        StringContains => Pattern::new("{0}.indexOf({1}) > -1", RELATIONAL).operands_at(POSTFIX),
        IndexOf => Pattern::new("{0}.indexOf({1})", POSTFIX),
        Lower => Pattern::new("{0}.toLowerCase()", POSTFIX),
        Upper => Pattern::new("{0}.toUpperCase()", POSTFIX),
        Length => Pattern::new("{0}.length()", POSTFIX),
        Substring => Pattern::new("{0}.substring({1},{2})", POSTFIX),
        CharAt => Pattern::new("{0}.charAt({1})", POSTFIX),
        Contains => Pattern::new("{0}.contains({1})", POSTFIX),
        IsEmpty => Pattern::new("{0}.isEmpty()", POSTFIX),
        IsNotEmpty => Pattern::new("!{0}.isEmpty()", UNARY).operands_at(POSTFIX),
        Size => Pattern::new("{0}.size()", POSTFIX),
        ContainsKey => Pattern::new("{0}.containsKey({1})", POSTFIX),
        ContainsValue => Pattern::new("{0}.containsValue({1})", POSTFIX),
        Get => Pattern::new("{0}.get({1})", POSTFIX),
        Abs => Pattern::new("Math.abs({0})", POSTFIX),
        Sqrt => Pattern::new("Math.sqrt({0})", POSTFIX),
        Count => Pattern::new("count({0})", POSTFIX),
        CountDistinct => Pattern::new("count(distinct {0})", POSTFIX),
        Sum => Pattern::new("sum({0})", POSTFIX),
        Avg => Pattern::new("avg({0})", POSTFIX),
        Min => Pattern::new("min({0})", POSTFIX),
        Max => Pattern::new("max({0})", POSTFIX),
        InstanceOf => Pattern::new("{0} instanceof {1}", RELATIONAL),
    }
}

/// Operator table used by the serializer.
#[derive(Clone, Debug)]
pub struct Patterns {
    table: HashMap<Operator, Pattern>,
}

impl Default for Patterns {
    fn default() -> Self {
        let table = Operator::ALL
            .into_iter()
            .map(|op| (op, default_pattern(op)))
            .collect();
        Self { table }
    }
}

impl Patterns {
    /// Pattern for `op`.
    pub fn get(&self, op: Operator) -> &Pattern {
        // The table is seeded with every operator and overrides only replace.
        &self.table[&op]
    }

    /// Replaces the template of `op`, keeping its precedence.
    ///
    /// Fails when the template does not parse or references an operand the
    /// operator does not have.
    pub fn set_template(&mut self, op: Operator, source: &str) -> Result<(), String> {
        let template = Template::parse(source)?;
        if let Some(max) = template.max_arg() {
            if max >= op.arity() {
                return Err(format!(
                    "template for '{}' references {{{max}}} but the operator takes {} operand(s)",
                    op.name(),
                    op.arity()
                ));
            }
        }
        let current = default_pattern(op);
        self.table.insert(
            op,
            Pattern {
                template,
                ..current
            },
        );
        Ok(())
    }

    /// True for operators whose operands can be regrouped freely.
    pub fn is_associative(op: Operator) -> bool {
        matches!(
            op,
            Operator::And | Operator::Or | Operator::Add | Operator::Mul
        )
    }
}
