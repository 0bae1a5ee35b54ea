//! SQL rendering
//!
//! `Display` for every AST node. Output uses upper-case keywords, keeps
//! identifier quoting, and inserts parentheses wherever operator binding
//! would otherwise change on reparse.

use super::ast::*;
use std::fmt::{self, Display, Formatter, Write};

/// Precedence used when deciding whether a child needs parentheses
fn expr_precedence(expr: &Expr) -> u8 {
    match &expr.kind {
        ExprKind::Binary { op, .. } => op.precedence(),
        ExprKind::Unary { op: UnaryOp::Not, .. } => 3,
        ExprKind::IsNull { .. }
        | ExprKind::Between { .. }
        | ExprKind::InList { .. }
        | ExprKind::InSubquery { .. }
        | ExprKind::Like { .. } => 4,
        ExprKind::Unary { .. } => 7,
        _ => 8,
    }
}

struct Paren<'a> {
    expr: &'a Expr,
    wrap: bool,
}

impl Display for Paren<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.wrap {
            write!(f, "({})", self.expr)
        } else {
            write!(f, "{}", self.expr)
        }
    }
}

/// Wrap `expr` when it binds looser than `min`
fn operand(expr: &Expr, min: u8) -> Paren<'_> {
    Paren {
        expr,
        wrap: expr_precedence(expr) < min,
    }
}

fn write_list<T: Display>(f: &mut Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

fn not(negated: bool) -> &'static str {
    if negated { "NOT " } else { "" }
}

impl Display for Ident {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.quote {
            None => f.write_str(&self.value),
            Some('[') => write!(f, "[{}]", self.value),
            Some(q) => {
                f.write_char(q)?;
                for ch in self.value.chars() {
                    if ch == q {
                        f.write_char(q)?;
                    }
                    f.write_char(ch)?;
                }
                f.write_char(q)
            }
        }
    }
}

impl Display for ObjectName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                f.write_char('.')?;
            }
            write!(f, "{}", part)?;
        }
        Ok(())
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(n) => f.write_str(n),
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Literal::Boolean(true) => f.write_str("TRUE"),
            Literal::Boolean(false) => f.write_str("FALSE"),
            Literal::Null => f.write_str("NULL"),
        }
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Column { qualifier, name } => match qualifier {
                Some(qualifier) => write!(f, "{}.{}", qualifier, name),
                None => write!(f, "{}", name),
            },
            ExprKind::Literal(literal) => write!(f, "{}", literal),
            ExprKind::Placeholder(p) => f.write_str(p),
            ExprKind::TypedString { data_type, value } => {
                write!(f, "{} '{}'", data_type, value.replace('\'', "''"))
            }
            ExprKind::Unary { op, expr } => match op {
                UnaryOp::Not => write!(f, "NOT {}", operand(expr, 3)),
                UnaryOp::Minus => write!(f, "-{}", operand(expr, 8)),
                UnaryOp::Plus => write!(f, "+{}", operand(expr, 8)),
            },
            ExprKind::Binary { left, op, right } => {
                let prec = op.precedence();
                // Comparisons do not chain, so an equal-precedence left side needs parens too
                let left_min = if op.is_comparison() { prec + 1 } else { prec };
                write!(
                    f,
                    "{} {} {}",
                    operand(left, left_min),
                    op.as_str(),
                    operand(right, prec + 1)
                )
            }
            ExprKind::Function {
                name,
                args,
                distinct,
            } => {
                write!(f, "{}(", name)?;
                match args {
                    FunctionArgs::Star => f.write_char('*')?,
                    FunctionArgs::List(list) => {
                        if *distinct {
                            f.write_str("DISTINCT ")?;
                        }
                        write_list(f, list)?;
                    }
                }
                f.write_char(')')
            }
            ExprKind::IsNull { expr, negated } => {
                write!(f, "{} IS {}NULL", operand(expr, 5), not(*negated))
            }
            ExprKind::Between {
                expr,
                low,
                high,
                negated,
            } => write!(
                f,
                "{} {}BETWEEN {} AND {}",
                operand(expr, 5),
                not(*negated),
                operand(low, 5),
                operand(high, 5)
            ),
            ExprKind::InList {
                expr,
                list,
                negated,
            } => {
                write!(f, "{} {}IN (", operand(expr, 5), not(*negated))?;
                write_list(f, list)?;
                f.write_char(')')
            }
            ExprKind::InSubquery {
                expr,
                subquery,
                negated,
            } => write!(
                f,
                "{} {}IN ({})",
                operand(expr, 5),
                not(*negated),
                subquery
            ),
            ExprKind::Exists { subquery, negated } => {
                write!(f, "{}EXISTS ({})", not(*negated), subquery)
            }
            ExprKind::Subquery(subquery) => write!(f, "({})", subquery),
            ExprKind::Like {
                expr,
                pattern,
                negated,
                case_insensitive,
                escape,
            } => {
                let keyword = if *case_insensitive { "ILIKE" } else { "LIKE" };
                write!(
                    f,
                    "{} {}{} {}",
                    operand(expr, 5),
                    not(*negated),
                    keyword,
                    operand(pattern, 5)
                )?;
                if let Some(escape) = escape {
                    write!(f, " ESCAPE {}", operand(escape, 8))?;
                }
                Ok(())
            }
            ExprKind::Case {
                operand: case_operand,
                branches,
                else_result,
            } => {
                f.write_str("CASE")?;
                if let Some(case_operand) = case_operand {
                    write!(f, " {}", case_operand)?;
                }
                for (when, then) in branches {
                    write!(f, " WHEN {} THEN {}", when, then)?;
                }
                if let Some(else_result) = else_result {
                    write!(f, " ELSE {}", else_result)?;
                }
                f.write_str(" END")
            }
            ExprKind::Cast {
                expr,
                data_type,
                shorthand,
            } => {
                if *shorthand {
                    write!(f, "{}::{}", operand(expr, 8), data_type)
                } else {
                    write!(f, "CAST({} AS {})", expr, data_type)
                }
            }
            ExprKind::Nested(inner) => write!(f, "({})", inner),
        }
    }
}

impl Display for SelectItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SelectItem::Wildcard { .. } => f.write_char('*'),
            SelectItem::QualifiedWildcard { qualifier, .. } => write!(f, "{}.*", qualifier),
            SelectItem::Expr { expr, alias } => {
                write!(f, "{}", expr)?;
                if let Some(alias) = alias {
                    write!(f, " AS {}", alias)?;
                }
                Ok(())
            }
        }
    }
}

impl Display for TableFactor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let alias = match self {
            TableFactor::Table { name, alias, .. } => {
                write!(f, "{}", name)?;
                alias
            }
            TableFactor::Derived {
                subquery, alias, ..
            } => {
                write!(f, "({})", subquery)?;
                alias
            }
        };
        if let Some(alias) = alias {
            write!(f, " AS {}", alias)?;
        }
        Ok(())
    }
}

impl Display for Join {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.as_str(), self.relation)?;
        match &self.constraint {
            JoinConstraint::On(expr) => write!(f, " ON {}", expr),
            JoinConstraint::Using(columns) => {
                f.write_str(" USING (")?;
                write_list(f, columns)?;
                f.write_char(')')
            }
            JoinConstraint::None => Ok(()),
        }
    }
}

impl Display for TableWithJoins {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.relation)?;
        for join in &self.joins {
            write!(f, " {}", join)?;
        }
        Ok(())
    }
}

impl Display for Select {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT ")?;
        if self.distinct {
            f.write_str("DISTINCT ")?;
        }
        write_list(f, &self.projection)?;
        if !self.from.is_empty() {
            f.write_str(" FROM ")?;
            write_list(f, &self.from)?;
        }
        if let Some(selection) = &self.selection {
            write!(f, " WHERE {}", selection)?;
        }
        if !self.group_by.is_empty() {
            f.write_str(" GROUP BY ")?;
            write_list(f, &self.group_by)?;
        }
        if let Some(having) = &self.having {
            write!(f, " HAVING {}", having)?;
        }
        Ok(())
    }
}

fn set_precedence(expr: &SetExpr) -> u8 {
    match expr {
        SetExpr::SetOperation {
            op: SetOperator::Intersect,
            ..
        } => 2,
        SetExpr::SetOperation { .. } => 1,
        _ => 3,
    }
}

impl Display for SetExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SetExpr::Select(select) => write!(f, "{}", select),
            SetExpr::Nested { inner, .. } => write!(f, "({})", inner),
            SetExpr::SetOperation {
                op,
                all,
                left,
                right,
                ..
            } => {
                let prec = set_precedence(self);
                if set_precedence(left) < prec {
                    write!(f, "({})", left)?;
                } else {
                    write!(f, "{}", left)?;
                }
                write!(f, " {}{} ", op.as_str(), if *all { " ALL" } else { "" })?;
                if set_precedence(right) <= prec {
                    write!(f, "({})", right)
                } else {
                    write!(f, "{}", right)
                }
            }
        }
    }
}

impl Display for OrderByItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)?;
        match self.asc {
            Some(true) => f.write_str(" ASC"),
            Some(false) => f.write_str(" DESC"),
            None => Ok(()),
        }
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.body)?;
        if !self.order_by.is_empty() {
            f.write_str(" ORDER BY ")?;
            write_list(f, &self.order_by)?;
        }
        if let Some(limit) = &self.limit {
            write!(f, " LIMIT {}", limit)?;
        }
        if let Some(offset) = &self.offset {
            write!(f, " OFFSET {}", offset)?;
        }
        Ok(())
    }
}

/// Render a statement back to SQL text
pub fn render(statement: &Statement) -> String {
    statement.to_string()
}
