use super::*;
use sqlparser::dialect::GenericDialect;

mod line_index_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_offset_and_line_column_agree() {
        let source = "SELECT a\nFROM t\nWHERE b = 'ü' AND c = 1";
        let index = LineIndex::new(source);
        for (offset, _) in source.char_indices() {
            let (line, column) = index.line_column(source, offset);
            assert_eq!(index.offset(source, line, column), offset, "offset {offset}");
        }
        assert_eq!(index.line_column(source, 9), (2, 1));
        assert_eq!(index.line_column(source, source.len()), (3, 24));
    }

    #[test]
    fn test_positions_past_the_end_clamp() {
        let source = "SELECT 1";
        let index = LineIndex::new(source);
        assert_eq!(index.offset(source, 9, 1), source.len());
        assert_eq!(index.offset(source, 1, 40), source.len());
    }
}

mod cursor_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cursor(source: &str) -> TokenCursor<'_> {
        TokenCursor::new(&GenericDialect {}, source).unwrap()
    }

    #[test]
    fn test_tokens_map_to_their_text() {
        let source = "SELECT  name -- trailing\nFROM t";
        let mut cursor = cursor(source);
        let select = cursor.claim_keyword(Keyword::SELECT);
        assert_eq!(select.slice(source), Some("SELECT"));
        let name = cursor.claim(|token| matches!(token, Token::Word(word) if word.value == "name"));
        assert_eq!(name.slice(source), Some("name"));
        assert_eq!(cursor.peek(), Some(&Token::make_keyword("FROM")));
    }

    #[test]
    fn test_seek_passes_over_unclaimed_tokens() {
        let source = "a + b";
        let mut cursor = cursor(source);
        let b = cursor.seek(|token| matches!(token, Token::Word(word) if word.value == "b"));
        assert_eq!(b, Some(Span::new(4, 5)));
        assert_eq!(cursor.peek(), None);
        assert_eq!(cursor.span_from(0), Span::new(0, 5));
    }

    #[test]
    fn test_missing_token_claims_an_empty_span_in_place() {
        let source = "a b";
        let mut cursor = cursor(source);
        let missing = cursor.claim(|token| *token == Token::RParen);
        assert_eq!(missing, Span::new(0, 0));
        assert_eq!(cursor.position(), 0);
    }
}
