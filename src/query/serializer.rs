//! Renders expression trees into query grammar text.
//!
//! Every literal is replaced by a generated label and recorded in the pass's
//! [`ConstantMap`]; the literal itself never reaches the text. Paths rooted at
//! the candidate source render relative to `this`.

use crate::query::ast::{Expr, Operator, OrderSpecifier, Path, Source};
use crate::query::constants::{ConstantMap, LabelScheme};
use crate::query::patterns::{Pattern, Patterns, Segment};
use crate::query::Value;
use crate::types::{QueryError, Result};

/// Output of one serializer pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Rendered {
    /// Rendered grammar text.
    pub text: String,
    /// Constants hoisted while rendering, in first-seen order.
    pub constants: ConstantMap,
}

/// Single-use serializer for one clause.
pub struct Serializer<'a> {
    patterns: &'a Patterns,
    candidate: &'a Source,
    labels: Option<LabelScheme>,
    reserved: Vec<String>,
    out: String,
    constants: ConstantMap,
}

impl<'a> Serializer<'a> {
    /// Creates a serializer hoisting constants under `labels`.
    pub fn new(patterns: &'a Patterns, candidate: &'a Source, labels: LabelScheme) -> Self {
        Self {
            patterns,
            candidate,
            labels: Some(labels),
            reserved: Vec::new(),
            out: String::new(),
            constants: ConstantMap::new(),
        }
    }

    /// Creates a serializer that refuses non-null constants.
    ///
    /// Used for ordering, whose constants are never declared as parameters.
    pub fn without_constants(patterns: &'a Patterns, candidate: &'a Source) -> Self {
        Self {
            patterns,
            candidate,
            labels: None,
            reserved: Vec::new(),
            out: String::new(),
            constants: ConstantMap::new(),
        }
    }

    /// Keeps hoisted labels clear of `names`, typically the identifiers of
    /// every registered source.
    pub fn reserving(mut self, names: &[String]) -> Self {
        self.reserved = names.to_vec();
        self
    }

    /// Appends raw grammar text.
    pub fn append(&mut self, text: &str) -> &mut Self {
        self.out.push_str(text);
        self
    }

    /// Renders one expression.
    pub fn handle(&mut self, expr: &Expr) -> Result<&mut Self> {
        self.visit(expr)?;
        Ok(self)
    }

    /// Renders `exprs` separated by `sep`.
    pub fn handle_list(&mut self, sep: &str, exprs: &[Expr]) -> Result<&mut Self> {
        for (idx, expr) in exprs.iter().enumerate() {
            if idx > 0 {
                self.out.push_str(sep);
            }
            self.visit(expr)?;
        }
        Ok(self)
    }

    /// Renders `<expr> ascending|descending`, comma separated.
    pub fn handle_order(&mut self, specs: &[OrderSpecifier]) -> Result<&mut Self> {
        for (idx, spec) in specs.iter().enumerate() {
            if idx > 0 {
                self.out.push_str(", ");
            }
            self.visit(&spec.target)?;
            self.out.push(' ');
            self.out.push_str(spec.order.keyword());
        }
        Ok(self)
    }

    /// Consumes the serializer, yielding text and hoisted constants.
    pub fn finish(self) -> Rendered {
        Rendered {
            text: self.out,
            constants: self.constants,
        }
    }

    fn visit(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Constant(value) => self.visit_constant(value),
            Expr::Path(path) => {
                self.visit_path(path);
                Ok(())
            }
            Expr::TypeRef(name) => {
                self.out.push_str(name);
                Ok(())
            }
            Expr::Operation { op, args } => self.visit_operation(*op, args),
            Expr::Constructor { .. } => Err(QueryError::Unsupported(
                "constructor calls are only valid as projection columns",
            )),
        }
    }

    fn visit_constant(&mut self, value: &Value) -> Result<()> {
        if value.is_null() {
            self.out.push_str("null");
            return Ok(());
        }
        let Some(labels) = self.labels.as_ref() else {
            return Err(QueryError::Unsupported(
                "constants in order-by expressions are not bound as parameters",
            ));
        };
        let label = self.constants.label_excluding(value, labels, &self.reserved);
        self.out.push_str(label);
        Ok(())
    }

    fn visit_path(&mut self, path: &Path) {
        if path.root != self.candidate.var {
            self.out.push_str(&path.to_string());
        } else if path.is_root() {
            self.out.push_str("this");
        } else {
            self.out.push_str(&path.segments.join("."));
        }
    }

    fn visit_operation(&mut self, op: Operator, args: &[Expr]) -> Result<()> {
        if args.len() != op.arity() {
            return Err(QueryError::Serialization(format!(
                "'{}' expects {} operand(s), got {}",
                op.name(),
                op.arity(),
                args.len()
            )));
        }
        if op == Operator::InstanceOf && !matches!(args[1], Expr::TypeRef(_)) {
            return Err(QueryError::Unsupported(
                "instanceof requires a type name as its right operand",
            ));
        }
        let patterns = self.patterns;
        let pattern = patterns.get(op);
        for (pos, segment) in pattern.template.segments().iter().enumerate() {
            match segment {
                Segment::Text(text) => self.out.push_str(text),
                Segment::Arg(idx) => {
                    let arg = &args[*idx];
                    let wrap = !pattern.template.is_enclosed(pos)
                        && needs_parens(patterns, op, pattern, arg, *idx);
                    if wrap {
                        self.out.push('(');
                    }
                    self.visit(arg)?;
                    if wrap {
                        self.out.push(')');
                    }
                }
            }
        }
        Ok(())
    }
}

fn needs_parens(
    patterns: &Patterns,
    parent: Operator,
    pattern: &Pattern,
    arg: &Expr,
    idx: usize,
) -> bool {
    let Expr::Operation { op: child, .. } = arg else {
        return false;
    };
    let child_precedence = patterns.get(*child).precedence;
    if child_precedence != pattern.operand_precedence {
        return child_precedence < pattern.operand_precedence;
    }
    idx > 0 && !(*child == parent && Patterns::is_associative(parent))
}

/// Renders `nodes` joined by `join`, hoisting constants under `labels`.
pub fn serialize(
    patterns: &Patterns,
    candidate: &Source,
    nodes: &[Expr],
    join: &str,
    labels: LabelScheme,
) -> Result<Rendered> {
    let mut serializer = Serializer::new(patterns, candidate, labels);
    serializer.handle_list(join, nodes)?;
    Ok(serializer.finish())
}
