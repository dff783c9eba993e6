//! Character-level tokenizer for drum assembly.
//!
//! The lexer is a state machine: every [`State`] consumes some input, may emit
//! a token and names the state that runs next. Scanning stops at [`State::Done`].
//! An unrecognised construct emits a single [`TokenKind::Error`] token and
//! stops the machine, so the output either holds no error token or ends with
//! exactly one.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TokenKind {
    Label,
    Instruction,
    ArgumentNumber,
    ArgumentString,
    ArgumentLabel,
    ArgumentRegister,
    Error,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Label => "label",
            Self::Instruction => "instruction",
            Self::ArgumentNumber => "number argument",
            Self::ArgumentString => "string argument",
            Self::ArgumentLabel => "label argument",
            Self::ArgumentRegister => "register argument",
            Self::Error => "error",
        })
    }
}

/// A lexed token. `value` holds the token text without its syntax markers
/// (no `:` on labels, no `%` on registers, no quotes around strings).
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Token {
    pub value: String,
    pub kind: TokenKind,
    pub position: usize,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} '{}' (position {})", self.kind, self.value, self.position)
    }
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[error("{0}")]
pub struct LexError(pub String);

#[derive(Debug, Clone, Eq, PartialEq)]
enum State {
    Top,
    Comment,
    Label,
    Instruction,
    Argument,
    ArgumentNumber,
    ArgumentLabel,
    ArgumentRegister,
    ArgumentString,
    ArgumentSeparator,
    Error(&'static str),
    Done,
}

const fn is_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

const fn is_symbol(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

const fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r')
}

const fn is_space(c: char) -> bool {
    is_blank(c) || c == '\n'
}

struct Lexer {
    text: Vec<char>,
    position: usize,
    token_start: usize,
    buffer: String,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(text: &str) -> Self {
        Self {
            text: text.chars().collect(),
            position: 0,
            token_start: 0,
            buffer: String::new(),
            tokens: vec![],
        }
    }

    fn run(mut self) -> Vec<Token> {
        let mut state = State::Top;
        while state != State::Done {
            state = self.step(state);
        }
        self.tokens
    }

    fn step(&mut self, state: State) -> State {
        match state {
            State::Top => self.lex_top(),
            State::Comment => self.lex_comment(),
            State::Label => self.lex_label(),
            State::Instruction => self.lex_instruction(),
            State::Argument => self.lex_argument(),
            State::ArgumentNumber => self.lex_argument_number(),
            State::ArgumentLabel => self.lex_argument_label(),
            State::ArgumentRegister => self.lex_argument_register(),
            State::ArgumentString => self.lex_argument_string(),
            State::ArgumentSeparator => self.lex_argument_separator(),
            State::Error(message) => self.lex_error(message),
            State::Done => State::Done,
        }
    }

    fn peek(&self) -> Option<char> {
        self.text.get(self.position).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.position = self.position.saturating_add(1);
        Some(c)
    }

    fn accept(&mut self, pred: impl Fn(char) -> bool) -> Option<char> {
        match self.peek() {
            Some(c) if pred(c) => {
                self.bump();
                self.buffer.push(c);
                Some(c)
            }
            _ => None,
        }
    }

    fn accept_while(&mut self, pred: impl Fn(char) -> bool) {
        while self.accept(&pred).is_some() {}
    }

    fn skip_while(&mut self, pred: impl Fn(char) -> bool) {
        while self.peek().is_some_and(&pred) {
            self.bump();
        }
        self.omit();
    }

    /// Drops any pending token text and starts the next token here.
    fn omit(&mut self) {
        self.buffer.clear();
        self.token_start = self.position;
    }

    fn save_token(&mut self, kind: TokenKind) {
        self.tokens.push(Token {
            value: std::mem::take(&mut self.buffer),
            kind,
            position: self.token_start,
        });
        self.token_start = self.position;
    }

    fn looking_at_label(&self) -> bool {
        let mut rest = self.text[self.position..].iter().copied();
        if !rest.next().is_some_and(is_start) {
            return false;
        }
        rest.find(|c| !is_symbol(*c)) == Some(':')
    }

    fn lex_error(&mut self, message: &str) -> State {
        let symbol = self
            .peek()
            .map_or_else(|| "EOF".to_string(), |c| format!("{c:?}"));
        self.tokens.push(Token {
            value: format!("{message}: {symbol} (position {})", self.position),
            kind: TokenKind::Error,
            position: self.position,
        });
        State::Done
    }

    fn lex_top(&mut self) -> State {
        self.skip_while(is_space);
        match self.peek() {
            None => State::Done,
            Some(';') => State::Comment,
            Some(c) if is_start(c) => {
                if self.looking_at_label() {
                    State::Label
                } else {
                    State::Instruction
                }
            }
            Some(_) => State::Error("unexpected symbol while lexing top-level"),
        }
    }

    fn lex_comment(&mut self) -> State {
        if self.peek() != Some(';') {
            return State::Error("invalid start of comment (; expected)");
        }
        self.skip_while(|c| c != '\n');
        State::Top
    }

    fn lex_label(&mut self) -> State {
        self.accept_while(is_symbol);
        if self.peek() != Some(':') {
            return State::Error("invalid end of label (: expected)");
        }
        self.save_token(TokenKind::Label);
        self.bump();
        self.omit();
        State::Top
    }

    fn lex_instruction(&mut self) -> State {
        self.accept_while(is_symbol);
        self.save_token(TokenKind::Instruction);
        self.skip_while(is_blank);
        match self.peek() {
            None => State::Done,
            Some('\n') => State::Top,
            Some(_) => State::Argument,
        }
    }

    fn lex_argument(&mut self) -> State {
        match self.peek() {
            Some(c) if c.is_ascii_digit() || c == '+' || c == '-' => State::ArgumentNumber,
            Some(c) if is_start(c) => State::ArgumentLabel,
            Some('%') => State::ArgumentRegister,
            Some('"') => State::ArgumentString,
            _ => {
                self.skip_while(is_space);
                State::Top
            }
        }
    }

    fn lex_argument_number(&mut self) -> State {
        self.accept(|c| c == '+' || c == '-');
        if self.accept(|c| c.is_ascii_digit()).is_none() {
            return State::Error("invalid number");
        }
        self.accept_while(|c| c.is_ascii_digit());
        self.save_token(TokenKind::ArgumentNumber);
        State::ArgumentSeparator
    }

    fn lex_argument_label(&mut self) -> State {
        self.accept_while(is_symbol);
        self.save_token(TokenKind::ArgumentLabel);
        State::ArgumentSeparator
    }

    fn lex_argument_register(&mut self) -> State {
        if self.bump() != Some('%') {
            return State::Error("invalid register prefix (% expected)");
        }
        if self.accept(is_start).is_none() {
            return State::Error("invalid symbol while lexing register");
        }
        self.accept_while(is_symbol);
        self.save_token(TokenKind::ArgumentRegister);
        State::ArgumentSeparator
    }

    fn lex_argument_string(&mut self) -> State {
        if self.bump() != Some('"') {
            return State::Error("invalid start of string (\" expected)");
        }
        loop {
            match self.peek() {
                None => return State::Error("unterminated string"),
                Some('"') => {
                    self.save_token(TokenKind::ArgumentString);
                    self.bump();
                    self.omit();
                    return State::ArgumentSeparator;
                }
                Some('\\') => {
                    self.bump();
                    let escaped = match self.peek() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('0') => '\0',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        _ => return State::Error("invalid escape sequence"),
                    };
                    self.bump();
                    self.buffer.push(escaped);
                }
                Some(c) => {
                    self.bump();
                    self.buffer.push(c);
                }
            }
        }
    }

    fn lex_argument_separator(&mut self) -> State {
        self.skip_while(is_blank);
        if self.peek() == Some(',') {
            self.bump();
        }
        self.skip_while(is_blank);
        State::Argument
    }
}

/// Splits `text` into tokens. On malformed input the returned sequence ends
/// with exactly one [`TokenKind::Error`] token.
#[must_use]
pub fn tokenize(text: &str) -> Vec<Token> {
    Lexer::new(text).run()
}

/// # Errors
///
/// Will return `Err` carrying the error token's message if `text` is malformed
pub fn lex(text: &str) -> Result<Vec<Token>, LexError> {
    let mut tokens = tokenize(text);
    match tokens.last() {
        Some(token) if token.kind == TokenKind::Error => {
            Err(LexError(tokens.pop().map(|t| t.value).unwrap_or_default()))
        }
        _ => Ok(tokens),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TokenKind::*;

    fn kinds(text: &str) -> Vec<(TokenKind, String)> {
        tokenize(text)
            .into_iter()
            .map(|t| (t.kind, t.value))
            .collect()
    }

    fn t(kind: TokenKind, value: &str) -> (TokenKind, String) {
        (kind, value.to_string())
    }

    #[test]
    fn lexes_simple_program() {
        assert_eq!(
            kinds("_start: LDI %R0, 5\nOUT %R0\nHLT"),
            vec![
                t(Label, "_start"),
                t(Instruction, "LDI"),
                t(ArgumentRegister, "R0"),
                t(ArgumentNumber, "5"),
                t(Instruction, "OUT"),
                t(ArgumentRegister, "R0"),
                t(Instruction, "HLT"),
            ]
        );
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        assert_eq!(
            kinds("; header\n\n  loop: ; trailing\n\tBEQ %r1,%r2 , loop ; jump\n"),
            vec![
                t(Label, "loop"),
                t(Instruction, "BEQ"),
                t(ArgumentRegister, "r1"),
                t(ArgumentRegister, "r2"),
                t(ArgumentLabel, "loop"),
            ]
        );
    }

    #[test]
    fn lexes_signed_numbers_and_strings() {
        assert_eq!(
            kinds("ADDI %R0, %R0, -12\nWORD \"hi\\n\"\nWORD +3"),
            vec![
                t(Instruction, "ADDI"),
                t(ArgumentRegister, "R0"),
                t(ArgumentRegister, "R0"),
                t(ArgumentNumber, "-12"),
                t(Instruction, "WORD"),
                t(ArgumentString, "hi\n"),
                t(Instruction, "WORD"),
                t(ArgumentNumber, "+3"),
            ]
        );
    }

    #[test]
    fn single_letter_label_is_a_label() {
        assert_eq!(kinds("a:"), vec![t(Label, "a")]);
        assert_eq!(kinds("a"), vec![t(Instruction, "a")]);
    }

    #[test]
    fn records_token_positions() {
        let tokens = tokenize("HLT\n  foo:");
        assert_eq!(tokens[0].position, 0);
        assert_eq!(tokens[1].position, 6);
    }

    #[test]
    fn unexpected_top_level_symbol_is_error() {
        let tokens = tokenize("HLT\n@oops\nNOP");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1].kind, Error);
        assert_eq!(
            tokens[1].value,
            "unexpected symbol while lexing top-level: '@' (position 4)"
        );
    }

    #[test]
    fn unterminated_string_is_error() {
        let err = lex("WORD \"abc").unwrap_err();
        assert_eq!(err.0, "unterminated string: EOF (position 9)");
    }

    #[test]
    fn bad_register_is_error() {
        let tokens = tokenize("OUT %1");
        assert_eq!(tokens.last().map(|t| t.kind), Some(Error));
        assert!(tokens[1].value.starts_with("invalid symbol while lexing register"));
    }

    #[test]
    fn lone_sign_is_error() {
        let err = lex("ADDI %R0, %R0, -").unwrap_err();
        assert!(err.0.starts_with("invalid number"));
    }

    #[test]
    fn error_token_is_last() {
        for src in ["@", "OUT %", "WORD \"x", "WORD \"\\q\"", "LDI %R0, - 1"] {
            let tokens = tokenize(src);
            let errors = tokens.iter().filter(|t| t.kind == Error).count();
            assert_eq!(errors, 1, "{src}");
            assert_eq!(tokens.last().map(|t| t.kind), Some(Error), "{src}");
        }
    }
}
