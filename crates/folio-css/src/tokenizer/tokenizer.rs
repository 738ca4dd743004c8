use super::token::CSSToken;

/// [§ 4.3 Tokenizer Algorithms](https://www.w3.org/TR/css-syntax-3/#tokenizer-algorithms)
///
/// Converts stylesheet text to tokens. Every token is paired with the line it
/// started on so parse issues can point back into the source.
pub struct CSSTokenizer {
    input: Vec<char>,
    position: usize,
    line: u32,
    tokens: Vec<CSSToken>,
    lines: Vec<u32>,
}

impl CSSTokenizer {
    /// Create a tokenizer over `input`.
    pub fn new(input: impl Into<String>) -> Self {
        // [§ 3.3 Preprocessing the input stream](https://www.w3.org/TR/css-syntax-3/#input-preprocessing)
        // "Replace any U+000D CARRIAGE RETURN (CR) code points, U+000C FORM FEED (FF)
        // code points, or pairs of U+000D CR followed by U+000A LINE FEED (LF)..."
        let text = input.into().replace("\r\n", "\n").replace(['\r', '\u{c}'], "\n");
        Self {
            input: text
                .chars()
                .map(|c| if c == '\0' { '\u{fffd}' } else { c })
                .collect(),
            position: 0,
            line: 1,
            tokens: Vec::new(),
            lines: Vec::new(),
        }
    }

    /// Tokenize the whole input. The final token is always `EOF`.
    pub fn run(&mut self) {
        loop {
            self.consume_comments();
            let line = self.line;
            let token = self.consume_token();
            let done = token.is_eof();
            self.tokens.push(token);
            self.lines.push(line);
            if done {
                break;
            }
        }
    }

    /// The collected tokens.
    pub fn tokens(&self) -> &[CSSToken] {
        &self.tokens
    }

    /// Consume the tokenizer, returning tokens and their line numbers.
    pub fn into_parts(self) -> (Vec<CSSToken>, Vec<u32>) {
        (self.tokens, self.lines)
    }

    /// Consume the tokenizer, returning only the tokens.
    pub fn into_tokens(self) -> Vec<CSSToken> {
        self.tokens
    }

    /// [§ 4.3.1 Consume a token](https://www.w3.org/TR/css-syntax-3/#consume-token)
    fn consume_token(&mut self) -> CSSToken {
        let Some(c) = self.consume() else {
            return CSSToken::EOF;
        };
        match c {
            c if is_whitespace(c) => {
                while self.peek().is_some_and(is_whitespace) {
                    let _ = self.consume();
                }
                CSSToken::Whitespace
            }
            '"' | '\'' => self.consume_string(c),
            '#' => {
                if self.peek().is_some_and(is_ident_code_point) || self.starts_escape(1) {
                    let is_id = self.would_start_ident(1);
                    CSSToken::Hash {
                        value: self.consume_ident_sequence(),
                        is_id,
                    }
                } else {
                    CSSToken::Delim('#')
                }
            }
            '(' => CSSToken::LeftParen,
            ')' => CSSToken::RightParen,
            '[' => CSSToken::LeftBracket,
            ']' => CSSToken::RightBracket,
            '{' => CSSToken::LeftBrace,
            '}' => CSSToken::RightBrace,
            ',' => CSSToken::Comma,
            ':' => CSSToken::Colon,
            ';' => CSSToken::Semicolon,
            '+' | '.' => {
                if self.would_start_number(0) {
                    self.reconsume();
                    self.consume_numeric()
                } else {
                    CSSToken::Delim(c)
                }
            }
            '-' => {
                if self.would_start_number(0) {
                    self.reconsume();
                    self.consume_numeric()
                } else if self.peek() == Some('-') && self.peek_at(1) == Some('>') {
                    self.position += 2;
                    CSSToken::CDC
                } else if self.would_start_ident(0) {
                    self.reconsume();
                    self.consume_ident_like()
                } else {
                    CSSToken::Delim('-')
                }
            }
            '<' => {
                if self.peek() == Some('!')
                    && self.peek_at(1) == Some('-')
                    && self.peek_at(2) == Some('-')
                {
                    self.position += 3;
                    CSSToken::CDO
                } else {
                    CSSToken::Delim('<')
                }
            }
            '@' => {
                if self.would_start_ident(1) {
                    CSSToken::AtKeyword(self.consume_ident_sequence())
                } else {
                    CSSToken::Delim('@')
                }
            }
            '\\' => {
                // "If the input stream starts with a valid escape, reconsume the
                // current input code point, consume an ident-like token, and return it."
                if self.starts_escape(0) {
                    self.reconsume();
                    self.consume_ident_like()
                } else {
                    CSSToken::Delim('\\')
                }
            }
            c if c.is_ascii_digit() => {
                self.reconsume();
                self.consume_numeric()
            }
            c if is_ident_start(c) => {
                self.reconsume();
                self.consume_ident_like()
            }
            c => CSSToken::Delim(c),
        }
    }

    /// [§ 4.3.2 Consume comments](https://www.w3.org/TR/css-syntax-3/#consume-comment)
    fn consume_comments(&mut self) {
        while self.peek() == Some('/') && self.peek_at(1) == Some('*') {
            self.position += 2;
            loop {
                match self.consume() {
                    None => return,
                    Some('*') if self.peek() == Some('/') => {
                        self.position += 1;
                        break;
                    }
                    Some(_) => {}
                }
            }
        }
    }

    /// [§ 4.3.5 Consume a string token](https://www.w3.org/TR/css-syntax-3/#consume-string-token)
    fn consume_string(&mut self, ending: char) -> CSSToken {
        let mut value = String::new();
        loop {
            match self.consume() {
                None => return CSSToken::String(value),
                Some(c) if c == ending => return CSSToken::String(value),
                // "newline: This is a parse error. Reconsume the current input code
                // point, create a <bad-string-token>, and return it."
                Some('\n') => {
                    self.reconsume();
                    return CSSToken::BadString;
                }
                Some('\\') => match self.peek() {
                    None => {}
                    Some('\n') => {
                        let _ = self.consume();
                    }
                    Some(_) => value.push(self.consume_escape()),
                },
                Some(c) => value.push(c),
            }
        }
    }

    /// [§ 4.3.3 Consume a numeric token](https://www.w3.org/TR/css-syntax-3/#consume-numeric-token)
    fn consume_numeric(&mut self) -> CSSToken {
        let (value, integer) = self.consume_number();
        if self.would_start_ident(1) {
            CSSToken::Dimension {
                value,
                integer,
                unit: self.consume_ident_sequence(),
            }
        } else if self.peek() == Some('%') {
            let _ = self.consume();
            CSSToken::Percentage(value)
        } else {
            CSSToken::Number { value, integer }
        }
    }

    /// [§ 4.3.12 Consume a number](https://www.w3.org/TR/css-syntax-3/#consume-number)
    fn consume_number(&mut self) -> (f64, bool) {
        let mut repr = String::new();
        let mut integer = true;
        if let Some(sign @ ('+' | '-')) = self.peek() {
            repr.push(sign);
            let _ = self.consume();
        }
        self.consume_digits(&mut repr);
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            repr.push('.');
            let _ = self.consume();
            self.consume_digits(&mut repr);
            integer = false;
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let digit_at = if matches!(self.peek_at(1), Some('+' | '-')) { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                for _ in 0..digit_at {
                    if let Some(c) = self.consume() {
                        repr.push(c);
                    }
                }
                self.consume_digits(&mut repr);
                integer = false;
            }
        }
        (repr.parse().unwrap_or(0.0), integer)
    }

    fn consume_digits(&mut self, repr: &mut String) {
        while let Some(c) = self.peek().filter(char::is_ascii_digit) {
            repr.push(c);
            let _ = self.consume();
        }
    }

    /// [§ 4.3.4 Consume an ident-like token](https://www.w3.org/TR/css-syntax-3/#consume-ident-like-token)
    fn consume_ident_like(&mut self) -> CSSToken {
        let name = self.consume_ident_sequence();
        if self.peek() != Some('(') {
            return CSSToken::Ident(name);
        }
        let _ = self.consume();
        if !name.eq_ignore_ascii_case("url") {
            return CSSToken::Function(name);
        }
        // "While the next two input code points are whitespace, consume the next
        // input code point."
        while self.peek().is_some_and(is_whitespace)
            && self.peek_at(1).is_some_and(is_whitespace)
        {
            let _ = self.consume();
        }
        let quoted = |c: Option<char>| matches!(c, Some('"' | '\''));
        if quoted(self.peek())
            || (self.peek().is_some_and(is_whitespace) && quoted(self.peek_at(1)))
        {
            CSSToken::Function(name)
        } else {
            self.consume_url()
        }
    }

    /// [§ 4.3.6 Consume a url token](https://www.w3.org/TR/css-syntax-3/#consume-url-token)
    fn consume_url(&mut self) -> CSSToken {
        let mut value = String::new();
        while self.peek().is_some_and(is_whitespace) {
            let _ = self.consume();
        }
        loop {
            match self.consume() {
                None | Some(')') => return CSSToken::Url(value),
                Some(c) if is_whitespace(c) => {
                    while self.peek().is_some_and(is_whitespace) {
                        let _ = self.consume();
                    }
                    if matches!(self.peek(), None | Some(')')) {
                        let _ = self.consume();
                        return CSSToken::Url(value);
                    }
                    self.consume_bad_url_remnants();
                    return CSSToken::BadUrl;
                }
                Some('"' | '\'' | '(') => {
                    self.consume_bad_url_remnants();
                    return CSSToken::BadUrl;
                }
                Some('\\') => {
                    if self.starts_escape(0) {
                        value.push(self.consume_escape());
                    } else {
                        self.consume_bad_url_remnants();
                        return CSSToken::BadUrl;
                    }
                }
                Some(c) => value.push(c),
            }
        }
    }

    /// [§ 4.3.14 Consume the remnants of a bad url](https://www.w3.org/TR/css-syntax-3/#consume-remnants-of-bad-url)
    fn consume_bad_url_remnants(&mut self) {
        loop {
            match self.consume() {
                None | Some(')') => return,
                Some('\\') if self.starts_escape(0) => {
                    let _ = self.consume_escape();
                }
                Some(_) => {}
            }
        }
    }

    /// [§ 4.3.11 Consume an ident sequence](https://www.w3.org/TR/css-syntax-3/#consume-name)
    fn consume_ident_sequence(&mut self) -> String {
        let mut result = String::new();
        loop {
            match self.peek() {
                Some(c) if is_ident_code_point(c) => {
                    result.push(c);
                    let _ = self.consume();
                }
                Some('\\') if self.starts_escape(1) => {
                    let _ = self.consume();
                    result.push(self.consume_escape());
                }
                _ => return result,
            }
        }
    }

    /// [§ 4.3.7 Consume an escaped code point](https://www.w3.org/TR/css-syntax-3/#consume-escaped-code-point)
    ///
    /// Assumes the backslash was already consumed.
    fn consume_escape(&mut self) -> char {
        let Some(c) = self.consume() else {
            return '\u{fffd}';
        };
        if !c.is_ascii_hexdigit() {
            return c;
        }
        let mut hex = String::from(c);
        while hex.len() < 6 && self.peek().is_some_and(|h| h.is_ascii_hexdigit()) {
            if let Some(h) = self.consume() {
                hex.push(h);
            }
        }
        if self.peek().is_some_and(is_whitespace) {
            let _ = self.consume();
        }
        u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .filter(|&ch| ch != '\0')
            .unwrap_or('\u{fffd}')
    }

    /// [§ 4.3.8 Check if two code points are a valid escape](https://www.w3.org/TR/css-syntax-3/#starts-with-a-valid-escape)
    ///
    /// `at` is relative to the current input code point: 0 checks the code point
    /// just consumed, 1 the next one.
    fn starts_escape(&self, at: usize) -> bool {
        let first = self.char_rel(at);
        let second = self.char_rel(at + 1);
        first == Some('\\') && second.is_some_and(|c| c != '\n')
    }

    /// [§ 4.3.9 Check if three code points would start an ident sequence](https://www.w3.org/TR/css-syntax-3/#would-start-an-identifier)
    fn would_start_ident(&self, at: usize) -> bool {
        match self.char_rel(at) {
            Some('-') => {
                self.char_rel(at + 1)
                    .is_some_and(|c| is_ident_start(c) || c == '-')
                    || self.starts_escape(at + 1)
            }
            Some('\\') => self.starts_escape(at),
            Some(c) => is_ident_start(c),
            None => false,
        }
    }

    /// [§ 4.3.10 Check if three code points would start a number](https://www.w3.org/TR/css-syntax-3/#starts-with-a-number)
    fn would_start_number(&self, at: usize) -> bool {
        let digit = |c: Option<char>| c.is_some_and(|c| c.is_ascii_digit());
        match self.char_rel(at) {
            Some('+' | '-') => {
                digit(self.char_rel(at + 1))
                    || (self.char_rel(at + 1) == Some('.') && digit(self.char_rel(at + 2)))
            }
            Some('.') => digit(self.char_rel(at + 1)),
            c => digit(c),
        }
    }

    /// Code point relative to the current input code point (the last consumed).
    fn char_rel(&self, at: usize) -> Option<char> {
        (self.position + at)
            .checked_sub(1)
            .and_then(|i| self.input.get(i).copied())
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn consume(&mut self) -> Option<char> {
        let c = self.input.get(self.position).copied()?;
        self.position += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn reconsume(&mut self) {
        self.position = self.position.saturating_sub(1);
        if self.input.get(self.position) == Some(&'\n') {
            self.line = self.line.saturating_sub(1);
        }
    }
}

fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n')
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || !c.is_ascii()
}

fn is_ident_code_point(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit() || c == '-'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(input: &str) -> Vec<CSSToken> {
        let mut tokenizer = CSSTokenizer::new(input);
        tokenizer.run();
        tokenizer.into_tokens()
    }

    #[test]
    fn test_dimension_and_percentage() {
        let tokens = tokenize("12px 50% 1.5em");
        assert_eq!(
            tokens[0],
            CSSToken::Dimension {
                value: 12.0,
                integer: true,
                unit: "px".into()
            }
        );
        assert_eq!(tokens[2], CSSToken::Percentage(50.0));
        assert!(matches!(
            &tokens[4],
            CSSToken::Dimension { integer: false, unit, .. } if unit == "em"
        ));
    }

    #[test]
    fn test_negative_ident_and_number() {
        let tokens = tokenize("-epubx-expr(1)");
        assert_eq!(tokens[0], CSSToken::Function("-epubx-expr".into()));
        let tokens = tokenize("-epubx-flow-into -3");
        assert_eq!(tokens[0], CSSToken::Ident("-epubx-flow-into".into()));
        assert_eq!(tokens[2], CSSToken::integer(-3));
    }

    #[test]
    fn test_comments_are_skipped() {
        let tokens = tokenize("a/* x */b");
        assert_eq!(tokens[0], CSSToken::Ident("a".into()));
        assert_eq!(tokens[1], CSSToken::Ident("b".into()));
    }

    #[test]
    fn test_url_and_string() {
        let tokens = tokenize("url(a.png) 'it\\'s'");
        assert_eq!(tokens[0], CSSToken::Url("a.png".into()));
        assert_eq!(tokens[2], CSSToken::String("it's".into()));
    }

    #[test]
    fn test_escaped_hex_in_ident() {
        let tokens = tokenize("\\31 23");
        assert_eq!(tokens[0], CSSToken::Ident("123".into()));
    }

    #[test]
    fn test_lines_are_tracked() {
        let mut tokenizer = CSSTokenizer::new("a\n\nb");
        tokenizer.run();
        let (tokens, lines) = tokenizer.into_parts();
        assert_eq!(tokens[2], CSSToken::Ident("b".into()));
        assert_eq!(lines[2], 3);
    }

    #[test]
    fn test_hash_id_flag() {
        let tokens = tokenize("#main #123");
        assert!(matches!(&tokens[0], CSSToken::Hash { is_id: true, .. }));
        assert!(matches!(&tokens[2], CSSToken::Hash { is_id: false, .. }));
    }
}
