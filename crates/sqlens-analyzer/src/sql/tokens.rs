//! Byte positions for lowered nodes
//!
//! sqlparser's tree carries no positions. Lowering walks that tree in source
//! order and claims the tokens each node was built from, in order, from a
//! [`TokenCursor`] over the same text. A claimed token maps to a byte range,
//! so every lowered node ends up with a span into the original SQL.

use super::ast::Span;
use sqlparser::dialect::Dialect;
use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::{Token, Tokenizer, TokenizerError};

/// Start offsets of every line, for converting between line/column and bytes
#[derive(Debug, Clone)]
pub(crate) struct LineIndex {
    line_starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            source
                .char_indices()
                .filter(|(_, ch)| *ch == '\n')
                .map(|(idx, _)| idx + 1),
        );
        Self {
            line_starts,
            len: source.len(),
        }
    }

    /// Byte offset of a 1-based line and character column
    pub fn offset(&self, source: &str, line: usize, column: usize) -> usize {
        let Some(&line_start) = self.line_starts.get(line.saturating_sub(1)) else {
            return self.len;
        };
        source
            .get(line_start..)
            .and_then(|rest| rest.char_indices().nth(column.saturating_sub(1)))
            .map_or(self.len, |(idx, _)| line_start + idx)
    }

    /// 1-based line and character column of a byte offset
    pub fn line_column(&self, source: &str, offset: usize) -> (usize, usize) {
        let line = self
            .line_starts
            .partition_point(|start| *start <= offset)
            .max(1);
        let line_start = self.line_starts[line - 1];
        let column = source
            .get(line_start..offset.min(self.len))
            .map_or(0, |text| text.chars().count());
        (line, column + 1)
    }
}

#[derive(Debug, Clone)]
struct SourceToken {
    token: Token,
    span: Span,
}

/// Significant tokens of one SQL text, claimed front to back
pub(crate) struct TokenCursor<'a> {
    source: &'a str,
    index: LineIndex,
    tokens: Vec<SourceToken>,
    next: usize,
    last_end: usize,
}

impl<'a> TokenCursor<'a> {
    pub fn new(dialect: &dyn Dialect, source: &'a str) -> Result<Self, TokenizerError> {
        let index = LineIndex::new(source);
        let located = Tokenizer::new(dialect, source).tokenize_with_location()?;

        // Whitespace and comments are tokens too, so a token ends where the next begins
        let starts: Vec<usize> = located
            .iter()
            .map(|token| {
                index.offset(
                    source,
                    token.location.line as usize,
                    token.location.column as usize,
                )
            })
            .collect();
        let ends = starts
            .iter()
            .skip(1)
            .copied()
            .chain(std::iter::once(source.len()));

        let tokens = located
            .into_iter()
            .zip(starts.iter().copied().zip(ends))
            .filter(|(located, _)| !matches!(located.token, Token::Whitespace(_) | Token::EOF))
            .map(|(located, (start, end))| SourceToken {
                token: located.token,
                span: Span::new(start, end),
            })
            .collect();

        Ok(Self {
            source,
            index,
            tokens,
            next: 0,
            last_end: 0,
        })
    }

    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.next).map(|token| &token.token)
    }

    /// Where the next unclaimed token starts
    pub fn position(&self) -> usize {
        self.tokens
            .get(self.next)
            .map_or(self.source.len(), |token| token.span.start)
    }

    /// Span of the next unclaimed token, empty at the end of input
    pub fn next_span(&self) -> Span {
        self.tokens.get(self.next).map_or(
            Span::new(self.source.len(), self.source.len()),
            |token| token.span,
        )
    }

    /// Span from `start` to the end of the last claimed token
    pub fn span_from(&self, start: usize) -> Span {
        Span::new(start, self.last_end.max(start))
    }

    /// Claims the first upcoming token matching `pred`, passing over the ones before it
    pub fn seek(&mut self, pred: impl Fn(&Token) -> bool) -> Option<Span> {
        let offset = self
            .tokens
            .get(self.next..)?
            .iter()
            .position(|token| pred(&token.token))?;
        let span = self.tokens[self.next + offset].span;
        self.next += offset + 1;
        self.last_end = span.end;
        Some(span)
    }

    /// Like [`seek`](Self::seek); an empty span at the current position when nothing matches
    pub fn claim(&mut self, pred: impl Fn(&Token) -> bool) -> Span {
        self.seek(pred).unwrap_or_else(|| {
            let position = self.position();
            Span::new(position, position)
        })
    }

    pub fn claim_keyword(&mut self, keyword: Keyword) -> Span {
        self.claim(|token| matches!(token, Token::Word(word) if word.keyword == keyword))
    }

    /// Claims the tokens of a data type name whose rendering is `rendered`
    pub fn claim_type_name(&mut self, rendered: &str) {
        let words: Vec<String> = rendered
            .split(|ch: char| !ch.is_ascii_alphanumeric() && ch != '_')
            .filter(|word| !word.is_empty())
            .map(str::to_ascii_uppercase)
            .collect();
        let parenthesised = rendered.contains('(');
        let mut depth = 0usize;

        while let Some(token) = self.tokens.get(self.next) {
            let belongs = match &token.token {
                Token::Word(word) => words.contains(&word.value.to_ascii_uppercase()),
                Token::Number(number, _) => words.contains(number),
                Token::LParen if parenthesised => {
                    depth += 1;
                    true
                }
                Token::RParen if depth > 0 => {
                    depth -= 1;
                    true
                }
                Token::Comma => depth > 0,
                _ => false,
            };
            if !belongs {
                break;
            }
            self.last_end = token.span.end;
            self.next += 1;
        }
    }

    pub fn line_column(&self, offset: usize) -> (usize, usize) {
        self.index.line_column(self.source, offset)
    }
}

#[cfg(test)]
mod tests;
