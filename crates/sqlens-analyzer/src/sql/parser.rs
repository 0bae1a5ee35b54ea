//! SELECT-family parsing on top of `sqlparser`
//!
//! `sqlparser` does the parsing. Its tree is then lowered into [`Statement`]:
//! constructs outside the supported subset are rejected with
//! [`ParseError::Unsupported`], SELECT blocks are numbered as scopes in
//! pre-order, and every node gets a byte span into the source text.

use sqlparser::ast as sp;
use sqlparser::dialect::GenericDialect;
use sqlparser::keywords::Keyword;
use sqlparser::parser::{Parser, ParserError};
use sqlparser::tokenizer::Token;

use super::ast::*;
use super::error::{ParseError, split_location};
use super::tokens::{LineIndex, TokenCursor};

/// Deepest expression or subquery nesting accepted before giving up
const RECURSION_LIMIT: usize = 64;

/// Parse one SQL statement
///
/// # Examples
///
/// ```
/// use sqlens_analyzer::sql::{parse, StatementKind};
///
/// let statement = parse("SELECT a FROM t1 UNION SELECT a FROM t2").unwrap();
/// assert_eq!(statement.kind(), StatementKind::Union);
/// ```
pub fn parse(sql: &str) -> Result<Statement, ParseError> {
    let dialect = GenericDialect {};
    let statements = Parser::new(&dialect)
        .with_recursion_limit(RECURSION_LIMIT)
        .try_with_sql(sql)
        .and_then(|mut parser| parser.parse_statements())
        .map_err(|error| parser_error(sql, error))?;
    let cursor = TokenCursor::new(&dialect, sql)
        .map_err(|error| parser_error(sql, ParserError::TokenizerError(error.to_string())))?;

    let mut lowering = Lowering::new(cursor);
    match statements.as_slice() {
        [] => {
            let end = sql.trim_end().len();
            let (line, column) = LineIndex::new(sql).line_column(sql, end);
            Err(ParseError::Syntax {
                position: end,
                line,
                column,
                message: "Expected: SELECT, found: EOF".to_string(),
            })
        }
        [statement] => lowering.top_level(statement),
        _ => {
            lowering
                .cursor
                .seek(|token| matches!(token, Token::SemiColon));
            Err(lowering.unsupported("multiple statements"))
        }
    }
}

fn parser_error(sql: &str, error: ParserError) -> ParseError {
    let message = match error {
        ParserError::TokenizerError(message) | ParserError::ParserError(message) => message,
        ParserError::RecursionLimitExceeded => {
            return ParseError::Unsupported {
                construct: format!("nesting deeper than {RECURSION_LIMIT} levels"),
                span: Span::default(),
                line: 1,
                column: 1,
            };
        }
    };

    let index = LineIndex::new(sql);
    let (message, location) = split_location(&message);
    // Errors at the end of input carry no location
    let position = match location {
        Some((line, column)) => index.offset(sql, line, column),
        None => sql.trim_end().len(),
    };
    let (line, column) = index.line_column(sql, position);
    ParseError::Syntax {
        position,
        line,
        column,
        message: message.to_string(),
    }
}

fn is_token(expected: Token) -> impl Fn(&Token) -> bool {
    move |token| *token == expected
}

struct Lowering<'a> {
    cursor: TokenCursor<'a>,
    next_scope: usize,
    scope_stack: Vec<ScopeId>,
}

impl<'a> Lowering<'a> {
    fn new(cursor: TokenCursor<'a>) -> Self {
        Self {
            cursor,
            next_scope: 0,
            scope_stack: Vec::new(),
        }
    }

    /// Rejects a construct, pointing at the next unclaimed token
    fn unsupported(&self, construct: impl Into<String>) -> ParseError {
        let span = self.cursor.next_span();
        let (line, column) = self.cursor.line_column(span.start);
        ParseError::Unsupported {
            construct: construct.into(),
            span,
            line,
            column,
        }
    }

    fn top_level(&mut self, statement: &sp::Statement) -> Result<Statement, ParseError> {
        match statement {
            sp::Statement::Query(query) => self.statement(query),
            _ => {
                let keyword = match self.cursor.peek() {
                    Some(Token::Word(word)) => word.value.to_ascii_uppercase(),
                    _ => "non-query".to_string(),
                };
                Err(self.unsupported(format!("{keyword} statement")))
            }
        }
    }

    // ---------------------------------------------------------------------
    // queries
    // ---------------------------------------------------------------------

    fn statement(&mut self, query: &sp::Query) -> Result<Statement, ParseError> {
        if query.with.is_some() {
            return Err(self.unsupported("common table expression (WITH)"));
        }
        let start = self.cursor.position();
        let body = self.set_expr(&query.body)?;

        // Subqueries inside statement-level ORDER BY belong to the single SELECT block
        let primary = match body.unnested() {
            SetExpr::Select(select) => Some(select.scope),
            _ => None,
        };
        if let Some(scope) = primary {
            self.scope_stack.push(scope);
        }
        let order_by = self.order_by(query.order_by.as_ref());
        if primary.is_some() {
            self.scope_stack.pop();
        }
        let order_by = order_by?;

        let offset_first = matches!(
            self.cursor.peek(),
            Some(Token::Word(word)) if word.keyword == Keyword::OFFSET
        );
        let (limit, offset) = if offset_first {
            let offset = self.offset(query.offset.as_ref())?;
            (self.optional_expr(query.limit.as_ref())?, offset)
        } else {
            let limit = self.optional_expr(query.limit.as_ref())?;
            (limit, self.offset(query.offset.as_ref())?)
        };

        if query.fetch.is_some() {
            return Err(self.unsupported("FETCH clause"));
        }
        if !query.locks.is_empty() || query.for_clause.is_some() {
            return Err(self.unsupported("locking clause"));
        }
        if !query.limit_by.is_empty() {
            return Err(self.unsupported("LIMIT BY"));
        }

        Ok(Statement {
            body,
            order_by,
            limit,
            offset,
            span: self.cursor.span_from(start),
        })
    }

    fn offset(&mut self, offset: Option<&sp::Offset>) -> Result<Option<Expr>, ParseError> {
        self.optional_expr(offset.map(|offset| &offset.value))
    }

    fn order_by(&mut self, order_by: Option<&sp::OrderBy>) -> Result<Vec<OrderByItem>, ParseError> {
        let Some(order_by) = order_by else {
            return Ok(Vec::new());
        };
        if order_by.interpolate.is_some() {
            return Err(self.unsupported("INTERPOLATE"));
        }
        order_by
            .exprs
            .iter()
            .map(|item| {
                let expr = self.expr(&item.expr)?;
                if item.nulls_first.is_some() {
                    return Err(self.unsupported("NULLS FIRST/LAST"));
                }
                match item.asc {
                    Some(true) => {
                        self.cursor.claim_keyword(Keyword::ASC);
                    }
                    Some(false) => {
                        self.cursor.claim_keyword(Keyword::DESC);
                    }
                    None => {}
                }
                Ok(OrderByItem {
                    span: self.cursor.span_from(expr.span.start),
                    expr,
                    asc: item.asc,
                })
            })
            .collect()
    }

    fn set_expr(&mut self, set_expr: &sp::SetExpr) -> Result<SetExpr, ParseError> {
        match set_expr {
            sp::SetExpr::Select(select) => Ok(SetExpr::Select(Box::new(self.select(select)?))),
            sp::SetExpr::Query(query) => {
                let start = self.cursor.claim(is_token(Token::LParen)).start;
                if query.with.is_some() {
                    return Err(self.unsupported("common table expression (WITH)"));
                }
                let inner = self.set_expr(&query.body)?;
                if query.order_by.is_some() || query.limit.is_some() || query.offset.is_some() {
                    return Err(self.unsupported("ORDER BY or LIMIT inside a set operand"));
                }
                self.cursor.claim(is_token(Token::RParen));
                Ok(SetExpr::Nested {
                    inner: Box::new(inner),
                    span: self.cursor.span_from(start),
                })
            }
            sp::SetExpr::SetOperation {
                op,
                set_quantifier,
                left,
                right,
                ..
            } => {
                let op = match op {
                    sp::SetOperator::Union => SetOperator::Union,
                    sp::SetOperator::Intersect => SetOperator::Intersect,
                    sp::SetOperator::Except => SetOperator::Except,
                    #[allow(unreachable_patterns)]
                    other => return Err(self.unsupported(format!("{other} set operation"))),
                };
                let all = match set_quantifier {
                    sp::SetQuantifier::All => true,
                    sp::SetQuantifier::Distinct | sp::SetQuantifier::None => false,
                    other => return Err(self.unsupported(format!("{other} set quantifier"))),
                };
                let left = self.set_expr(left)?;
                let right = self.set_expr(right)?;
                let span = left.span().merge(right.span());
                Ok(SetExpr::SetOperation {
                    op,
                    all,
                    left: Box::new(left),
                    right: Box::new(right),
                    span,
                })
            }
            sp::SetExpr::Values(_) => Err(self.unsupported("VALUES list")),
            _ => Err(self.unsupported("query body other than SELECT")),
        }
    }

    fn select(&mut self, select: &sp::Select) -> Result<Select, ParseError> {
        let start = self.cursor.claim_keyword(Keyword::SELECT).start;

        let scope = ScopeId(self.next_scope);
        self.next_scope += 1;
        let parent = self.scope_stack.last().copied();
        self.scope_stack.push(scope);
        let result = self.select_body(select, scope, parent, start);
        self.scope_stack.pop();
        result
    }

    fn select_body(
        &mut self,
        select: &sp::Select,
        scope: ScopeId,
        parent: Option<ScopeId>,
        start: usize,
    ) -> Result<Select, ParseError> {
        let distinct = match &select.distinct {
            None => false,
            Some(sp::Distinct::Distinct) => true,
            Some(sp::Distinct::On(_)) => return Err(self.unsupported("DISTINCT ON")),
        };
        if select.top.is_some() {
            return Err(self.unsupported("TOP clause"));
        }

        let projection = select
            .projection
            .iter()
            .map(|item| self.select_item(item))
            .collect::<Result<Vec<_>, _>>()?;
        if select.into.is_some() {
            return Err(self.unsupported("SELECT INTO"));
        }

        let from = select
            .from
            .iter()
            .map(|table| self.table_with_joins(table))
            .collect::<Result<Vec<_>, _>>()?;
        if !select.lateral_views.is_empty() {
            return Err(self.unsupported("LATERAL VIEW"));
        }

        let selection = self.optional_expr(select.selection.as_ref())?;
        let group_by = match &select.group_by {
            sp::GroupByExpr::Expressions(exprs, modifiers) => {
                if !modifiers.is_empty() {
                    return Err(self.unsupported("GROUP BY modifier"));
                }
                exprs
                    .iter()
                    .map(|expr| self.expr(expr))
                    .collect::<Result<Vec<_>, _>>()?
            }
            sp::GroupByExpr::All(_) => return Err(self.unsupported("GROUP BY ALL")),
        };
        let having = self.optional_expr(select.having.as_ref())?;

        if !select.named_window.is_empty() {
            return Err(self.unsupported("WINDOW clause"));
        }
        if select.qualify.is_some() {
            return Err(self.unsupported("QUALIFY"));
        }

        Ok(Select {
            scope,
            parent,
            distinct,
            projection,
            from,
            selection,
            group_by,
            having,
            span: self.cursor.span_from(start),
        })
    }

    fn select_item(&mut self, item: &sp::SelectItem) -> Result<SelectItem, ParseError> {
        match item {
            sp::SelectItem::UnnamedExpr(expr) => Ok(SelectItem::Expr {
                expr: self.expr(expr)?,
                alias: None,
            }),
            sp::SelectItem::ExprWithAlias { expr, alias } => {
                let expr = self.expr(expr)?;
                Ok(SelectItem::Expr {
                    expr,
                    alias: Some(self.ident(alias)),
                })
            }
            sp::SelectItem::Wildcard(_) => Ok(SelectItem::Wildcard {
                span: self.cursor.claim(is_token(Token::Mul)),
            }),
            sp::SelectItem::QualifiedWildcard(name, _) => {
                let start = self.cursor.position();
                let qualifier = self.object_name(name);
                self.cursor.claim(is_token(Token::Mul));
                Ok(SelectItem::QualifiedWildcard {
                    qualifier,
                    span: self.cursor.span_from(start),
                })
            }
        }
    }

    // ---------------------------------------------------------------------
    // FROM
    // ---------------------------------------------------------------------

    fn table_with_joins(&mut self, table: &sp::TableWithJoins) -> Result<TableWithJoins, ParseError> {
        let relation = self.table_factor(&table.relation)?;
        let joins = table
            .joins
            .iter()
            .map(|join| self.join(join))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TableWithJoins { relation, joins })
    }

    fn join(&mut self, join: &sp::Join) -> Result<Join, ParseError> {
        let start = self.cursor.position();
        let (kind, constraint) = match &join.join_operator {
            sp::JoinOperator::Inner(constraint) => (JoinKind::Inner, Some(constraint)),
            sp::JoinOperator::LeftOuter(constraint) => (JoinKind::Left, Some(constraint)),
            sp::JoinOperator::RightOuter(constraint) => (JoinKind::Right, Some(constraint)),
            sp::JoinOperator::FullOuter(constraint) => (JoinKind::Full, Some(constraint)),
            sp::JoinOperator::CrossJoin => (JoinKind::Cross, None),
            sp::JoinOperator::CrossApply => return Err(self.unsupported("CROSS APPLY")),
            sp::JoinOperator::OuterApply => return Err(self.unsupported("OUTER APPLY")),
            _ => return Err(self.unsupported("semi, anti or ASOF join")),
        };
        if let Some(sp::JoinConstraint::Natural) = constraint {
            return Err(self.unsupported("NATURAL JOIN"));
        }

        let relation = self.table_factor(&join.relation)?;
        let constraint = match constraint {
            Some(sp::JoinConstraint::On(expr)) => JoinConstraint::On(self.expr(expr)?),
            Some(sp::JoinConstraint::Using(columns)) => {
                let columns = columns.iter().map(|column| self.ident(column)).collect();
                self.cursor.claim(is_token(Token::RParen));
                JoinConstraint::Using(columns)
            }
            _ => JoinConstraint::None,
        };

        Ok(Join {
            kind,
            relation,
            constraint,
            span: self.cursor.span_from(start),
        })
    }

    fn table_factor(&mut self, factor: &sp::TableFactor) -> Result<TableFactor, ParseError> {
        match factor {
            sp::TableFactor::Table {
                name,
                alias,
                args,
                with_hints,
                ..
            } => {
                if name.0.len() > 3 {
                    return Err(self.unsupported("table name with more than three parts"));
                }
                if args.is_some() {
                    return Err(self.unsupported("table-valued function"));
                }
                if !with_hints.is_empty() {
                    return Err(self.unsupported("table hint"));
                }
                let start = self.cursor.position();
                let name = self.object_name(name);
                let alias = self.table_alias(alias.as_ref())?;
                Ok(TableFactor::Table {
                    name,
                    alias,
                    span: self.cursor.span_from(start),
                })
            }
            sp::TableFactor::Derived {
                lateral,
                subquery,
                alias,
                ..
            } => {
                if *lateral {
                    return Err(self.unsupported("LATERAL"));
                }
                let start = self.cursor.claim(is_token(Token::LParen)).start;
                let subquery = self.statement(subquery)?;
                self.cursor.claim(is_token(Token::RParen));
                let alias = self.table_alias(alias.as_ref())?;
                Ok(TableFactor::Derived {
                    subquery: Box::new(subquery),
                    alias,
                    span: self.cursor.span_from(start),
                })
            }
            sp::TableFactor::NestedJoin { .. } => Err(self.unsupported("parenthesised join")),
            other => Err(self.unsupported(format!("table source `{other}`"))),
        }
    }

    fn table_alias(&mut self, alias: Option<&sp::TableAlias>) -> Result<Option<Ident>, ParseError> {
        let Some(alias) = alias else {
            return Ok(None);
        };
        if !alias.columns.is_empty() {
            return Err(self.unsupported("column alias list"));
        }
        Ok(Some(self.ident(&alias.name)))
    }

    fn object_name(&mut self, name: &sp::ObjectName) -> ObjectName {
        ObjectName {
            parts: name.0.iter().map(|part| self.ident(part)).collect(),
        }
    }

    fn ident(&mut self, ident: &sp::Ident) -> Ident {
        let span = self.cursor.claim(|token| {
            matches!(
                token,
                Token::Word(word) if word.value == ident.value && word.quote_style == ident.quote_style
            )
        });
        Ident {
            value: ident.value.clone(),
            quote: ident.quote_style,
            span,
        }
    }

    // ---------------------------------------------------------------------
    // expressions
    // ---------------------------------------------------------------------

    fn optional_expr(&mut self, expr: Option<&sp::Expr>) -> Result<Option<Expr>, ParseError> {
        expr.map(|expr| self.expr(expr)).transpose()
    }

    fn boxed(&mut self, expr: &sp::Expr) -> Result<Box<Expr>, ParseError> {
        self.expr(expr).map(Box::new)
    }

    fn expr(&mut self, expr: &sp::Expr) -> Result<Expr, ParseError> {
        match expr {
            sp::Expr::Identifier(ident) => {
                let name = self.ident(ident);
                let span = name.span;
                Ok(Expr::new(
                    ExprKind::Column {
                        qualifier: None,
                        name,
                    },
                    span,
                ))
            }
            sp::Expr::CompoundIdentifier(parts) => match parts.as_slice() {
                [qualifier, name] => {
                    let qualifier = self.ident(qualifier);
                    let name = self.ident(name);
                    let span = qualifier.span.merge(name.span);
                    Ok(Expr::new(
                        ExprKind::Column {
                            qualifier: Some(qualifier),
                            name,
                        },
                        span,
                    ))
                }
                [name] => self.expr(&sp::Expr::Identifier(name.clone())),
                _ => Err(self.unsupported("schema-qualified column reference")),
            },
            sp::Expr::Value(value) => self.value(value),
            sp::Expr::TypedString { data_type, value } => {
                let start = self.cursor.position();
                self.cursor
                    .claim(|token| matches!(token, Token::SingleQuotedString(text) if text == value));
                Ok(Expr::new(
                    ExprKind::TypedString {
                        data_type: data_type.to_string().to_ascii_uppercase(),
                        value: value.clone(),
                    },
                    self.cursor.span_from(start),
                ))
            }
            sp::Expr::UnaryOp { op, expr } => {
                let (op, start) = match op {
                    sp::UnaryOperator::Not => (UnaryOp::Not, self.cursor.claim_keyword(Keyword::NOT)),
                    sp::UnaryOperator::Minus => {
                        (UnaryOp::Minus, self.cursor.claim(is_token(Token::Minus)))
                    }
                    sp::UnaryOperator::Plus => (UnaryOp::Plus, self.cursor.claim(is_token(Token::Plus))),
                    other => return Err(self.unsupported(format!("operator {other}"))),
                };
                let expr = self.boxed(expr)?;
                let span = start.merge(expr.span);
                Ok(Expr::new(ExprKind::Unary { op, expr }, span))
            }
            sp::Expr::BinaryOp { left, op, right } => {
                let op = match op {
                    sp::BinaryOperator::Or => BinaryOp::Or,
                    sp::BinaryOperator::And => BinaryOp::And,
                    sp::BinaryOperator::Eq => BinaryOp::Eq,
                    sp::BinaryOperator::NotEq => BinaryOp::NotEq,
                    sp::BinaryOperator::Lt => BinaryOp::Lt,
                    sp::BinaryOperator::LtEq => BinaryOp::LtEq,
                    sp::BinaryOperator::Gt => BinaryOp::Gt,
                    sp::BinaryOperator::GtEq => BinaryOp::GtEq,
                    sp::BinaryOperator::Plus => BinaryOp::Plus,
                    sp::BinaryOperator::Minus => BinaryOp::Minus,
                    sp::BinaryOperator::Multiply => BinaryOp::Multiply,
                    sp::BinaryOperator::Divide => BinaryOp::Divide,
                    sp::BinaryOperator::Modulo => BinaryOp::Modulo,
                    sp::BinaryOperator::StringConcat => BinaryOp::Concat,
                    other => return Err(self.unsupported(format!("operator {other}"))),
                };
                let left = self.boxed(left)?;
                let right = self.boxed(right)?;
                let span = left.span.merge(right.span);
                Ok(Expr::new(ExprKind::Binary { left, op, right }, span))
            }
            sp::Expr::Nested(inner) => {
                let start = self.cursor.claim(is_token(Token::LParen)).start;
                let inner = self.boxed(inner)?;
                self.cursor.claim(is_token(Token::RParen));
                Ok(Expr::new(ExprKind::Nested(inner), self.cursor.span_from(start)))
            }
            sp::Expr::Function(function) => self.function(function),
            sp::Expr::IsNull(inner) | sp::Expr::IsNotNull(inner) => {
                let negated = matches!(expr, sp::Expr::IsNotNull(_));
                let inner = self.boxed(inner)?;
                self.cursor.claim_keyword(Keyword::NULL);
                let span = self.cursor.span_from(inner.span.start);
                Ok(Expr::new(
                    ExprKind::IsNull {
                        expr: inner,
                        negated,
                    },
                    span,
                ))
            }
            sp::Expr::Between {
                expr,
                negated,
                low,
                high,
            } => {
                let expr = self.boxed(expr)?;
                let low = self.boxed(low)?;
                let high = self.boxed(high)?;
                let span = expr.span.merge(high.span);
                Ok(Expr::new(
                    ExprKind::Between {
                        expr,
                        low,
                        high,
                        negated: *negated,
                    },
                    span,
                ))
            }
            sp::Expr::InList {
                expr,
                list,
                negated,
            } => {
                let expr = self.boxed(expr)?;
                let list = list
                    .iter()
                    .map(|item| self.expr(item))
                    .collect::<Result<Vec<_>, _>>()?;
                self.cursor.claim(is_token(Token::RParen));
                let span = self.cursor.span_from(expr.span.start);
                Ok(Expr::new(
                    ExprKind::InList {
                        expr,
                        list,
                        negated: *negated,
                    },
                    span,
                ))
            }
            sp::Expr::InSubquery {
                expr,
                subquery,
                negated,
            } => {
                let expr = self.boxed(expr)?;
                let subquery = self.parenthesised_query(subquery)?;
                let span = self.cursor.span_from(expr.span.start);
                Ok(Expr::new(
                    ExprKind::InSubquery {
                        expr,
                        subquery,
                        negated: *negated,
                    },
                    span,
                ))
            }
            sp::Expr::Exists { subquery, negated } => {
                let start = if *negated {
                    self.cursor.claim_keyword(Keyword::NOT).start
                } else {
                    self.cursor.position()
                };
                self.cursor.claim_keyword(Keyword::EXISTS);
                let subquery = self.parenthesised_query(subquery)?;
                Ok(Expr::new(
                    ExprKind::Exists {
                        subquery,
                        negated: *negated,
                    },
                    self.cursor.span_from(start),
                ))
            }
            sp::Expr::Subquery(subquery) => {
                let start = self.cursor.position();
                let subquery = self.parenthesised_query(subquery)?;
                Ok(Expr::new(
                    ExprKind::Subquery(subquery),
                    self.cursor.span_from(start),
                ))
            }
            sp::Expr::Like {
                negated,
                expr,
                pattern,
                escape_char,
                ..
            } => {
                let escape = escape_char.as_ref().map(|escape| escape.to_string());
                self.like(expr, pattern, escape, *negated, false)
            }
            sp::Expr::ILike {
                negated,
                expr,
                pattern,
                escape_char,
                ..
            } => {
                let escape = escape_char.as_ref().map(|escape| escape.to_string());
                self.like(expr, pattern, escape, *negated, true)
            }
            sp::Expr::Case {
                operand,
                conditions,
                results,
                else_result,
            } => {
                let start = self.cursor.claim_keyword(Keyword::CASE).start;
                let operand = operand
                    .as_deref()
                    .map(|operand| self.boxed(operand))
                    .transpose()?;
                let branches = conditions
                    .iter()
                    .zip(results)
                    .map(|(when, then)| Ok((self.expr(when)?, self.expr(then)?)))
                    .collect::<Result<Vec<_>, ParseError>>()?;
                let else_result = else_result
                    .as_deref()
                    .map(|result| self.boxed(result))
                    .transpose()?;
                self.cursor.claim_keyword(Keyword::END);
                Ok(Expr::new(
                    ExprKind::Case {
                        operand,
                        branches,
                        else_result,
                    },
                    self.cursor.span_from(start),
                ))
            }
            sp::Expr::Cast {
                kind,
                expr,
                data_type,
                format,
                ..
            } => {
                if format.is_some() {
                    return Err(self.unsupported("CAST ... FORMAT"));
                }
                let rendered = data_type.to_string().to_ascii_uppercase();
                match kind {
                    sp::CastKind::Cast => {
                        let start = self.cursor.claim_keyword(Keyword::CAST).start;
                        self.cursor.claim(is_token(Token::LParen));
                        let expr = self.boxed(expr)?;
                        self.cursor.claim_keyword(Keyword::AS);
                        self.cursor.claim_type_name(&rendered);
                        self.cursor.claim(is_token(Token::RParen));
                        Ok(Expr::new(
                            ExprKind::Cast {
                                expr,
                                data_type: rendered,
                                shorthand: false,
                            },
                            self.cursor.span_from(start),
                        ))
                    }
                    sp::CastKind::DoubleColon => {
                        let expr = self.boxed(expr)?;
                        self.cursor.claim(is_token(Token::DoubleColon));
                        self.cursor.claim_type_name(&rendered);
                        let span = self.cursor.span_from(expr.span.start);
                        Ok(Expr::new(
                            ExprKind::Cast {
                                expr,
                                data_type: rendered,
                                shorthand: true,
                            },
                            span,
                        ))
                    }
                    _ => Err(self.unsupported("TRY_CAST or SAFE_CAST")),
                }
            }
            other => Err(self.unsupported(describe(other))),
        }
    }

    fn value(&mut self, value: &sp::Value) -> Result<Expr, ParseError> {
        let (kind, span) = match value {
            sp::Value::Number(number, _) => (
                ExprKind::Literal(Literal::Number(number.clone())),
                self.cursor
                    .claim(|token| matches!(token, Token::Number(text, _) if text == number)),
            ),
            sp::Value::SingleQuotedString(text) => (
                ExprKind::Literal(Literal::String(text.clone())),
                self.cursor
                    .claim(|token| matches!(token, Token::SingleQuotedString(s) if s == text)),
            ),
            sp::Value::Boolean(flag) => (
                ExprKind::Literal(Literal::Boolean(*flag)),
                self.cursor.claim_keyword(if *flag {
                    Keyword::TRUE
                } else {
                    Keyword::FALSE
                }),
            ),
            sp::Value::Null => (
                ExprKind::Literal(Literal::Null),
                self.cursor.claim_keyword(Keyword::NULL),
            ),
            sp::Value::Placeholder(placeholder) => {
                let span = match self
                    .cursor
                    .seek(|token| matches!(token, Token::Placeholder(text) if text == placeholder))
                {
                    Some(span) => span,
                    // `:name` and `@name` arrive as a sigil token followed by a word
                    None => {
                        let start = self.cursor.position();
                        let name = placeholder.get(1..).unwrap_or_default();
                        self.cursor
                            .claim(|token| matches!(token, Token::Word(word) if word.value == name));
                        self.cursor.span_from(start)
                    }
                };
                (ExprKind::Placeholder(placeholder.clone()), span)
            }
            other => return Err(self.unsupported(format!("literal {other}"))),
        };
        Ok(Expr::new(kind, span))
    }

    fn function(&mut self, function: &sp::Function) -> Result<Expr, ParseError> {
        if function.over.is_some() {
            return Err(self.unsupported("window function (OVER)"));
        }
        if function.filter.is_some() {
            return Err(self.unsupported("aggregate FILTER"));
        }
        if !function.within_group.is_empty() {
            return Err(self.unsupported("WITHIN GROUP"));
        }
        if function.null_treatment.is_some() {
            return Err(self.unsupported("IGNORE/RESPECT NULLS"));
        }
        let [name] = function.name.0.as_slice() else {
            return Err(self.unsupported("qualified function name"));
        };
        let name = self.ident(name);
        let start = name.span.start;

        let list = match &function.args {
            // CURRENT_DATE and friends take no parentheses and read like columns
            sp::FunctionArguments::None => {
                let span = name.span;
                return Ok(Expr::new(
                    ExprKind::Column {
                        qualifier: None,
                        name,
                    },
                    span,
                ));
            }
            sp::FunctionArguments::Subquery(_) => {
                return Err(self.unsupported("subquery as function argument"));
            }
            sp::FunctionArguments::List(list) => list,
        };
        if !list.clauses.is_empty() {
            return Err(self.unsupported("ordered aggregate"));
        }
        let distinct = matches!(
            list.duplicate_treatment,
            Some(sp::DuplicateTreatment::Distinct)
        );

        self.cursor.claim(is_token(Token::LParen));
        let args = match list.args.as_slice() {
            [sp::FunctionArg::Unnamed(sp::FunctionArgExpr::Wildcard)] => FunctionArgs::Star,
            args => FunctionArgs::List(
                args.iter()
                    .map(|arg| match arg {
                        sp::FunctionArg::Unnamed(sp::FunctionArgExpr::Expr(expr)) => self.expr(expr),
                        _ => Err(self.unsupported("named or wildcard function argument")),
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            ),
        };
        self.cursor.claim(is_token(Token::RParen));

        Ok(Expr::new(
            ExprKind::Function {
                name,
                args,
                distinct,
            },
            self.cursor.span_from(start),
        ))
    }

    fn like(
        &mut self,
        expr: &sp::Expr,
        pattern: &sp::Expr,
        escape: Option<String>,
        negated: bool,
        case_insensitive: bool,
    ) -> Result<Expr, ParseError> {
        let expr = self.boxed(expr)?;
        let pattern = self.boxed(pattern)?;
        let escape = escape.map(|escape| {
            let span = self
                .cursor
                .claim(|token| matches!(token, Token::SingleQuotedString(s) if *s == escape));
            Box::new(Expr::new(ExprKind::Literal(Literal::String(escape)), span))
        });
        let span = self.cursor.span_from(expr.span.start);
        Ok(Expr::new(
            ExprKind::Like {
                expr,
                pattern,
                negated,
                case_insensitive,
                escape,
            },
            span,
        ))
    }

    /// `( query )` as it appears in IN, EXISTS and scalar subqueries
    fn parenthesised_query(&mut self, query: &sp::Query) -> Result<Box<Statement>, ParseError> {
        self.cursor.claim(is_token(Token::LParen));
        let statement = self.statement(query)?;
        self.cursor.claim(is_token(Token::RParen));
        Ok(Box::new(statement))
    }
}

/// Name of an expression form outside the supported subset
fn describe(expr: &sp::Expr) -> String {
    match expr {
        sp::Expr::Tuple { .. } => "row value constructor".to_string(),
        sp::Expr::Collate { .. } => "COLLATE".to_string(),
        sp::Expr::Interval { .. } => "INTERVAL".to_string(),
        sp::Expr::AnyOp { .. } | sp::Expr::AllOp { .. } => {
            "quantified comparison (ANY/ALL)".to_string()
        }
        sp::Expr::IsDistinctFrom { .. } | sp::Expr::IsNotDistinctFrom { .. } => {
            "IS DISTINCT FROM".to_string()
        }
        sp::Expr::SimilarTo { .. } | sp::Expr::RLike { .. } => "pattern operator".to_string(),
        other => format!("expression `{other}`"),
    }
}

#[cfg(test)]
mod tests;
