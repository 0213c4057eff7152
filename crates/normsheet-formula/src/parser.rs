//! Formula parser
//!
//! A recursive descent parser for cell formulas with proper operator precedence.
//!
//! References may be local (`A1`, `$C$21`), sheet-qualified (`Hoja2!A1`,
//! `'Hoja 2'!A1`) or instance-qualified (`cost:Hoja1!B5`). Function arguments
//! are separated by `,` or `;`; an empty slot parses as [`FormulaExpr::Missing`].

use crate::ast::{
    BinaryOperator, CellReference, FormulaExpr, RangeReference, SheetQualifier, UnaryOperator,
};
use crate::error::{FormulaError, FormulaResult};
use normsheet_core::{CellRange, CellRef};

/// Parse a formula string into an AST
///
/// # Example
/// ```rust
/// use normsheet_formula::parse_formula;
///
/// let ast = parse_formula("=1+2").unwrap();
/// let ast = parse_formula("=SUM(A1:A10)").unwrap();
/// let ast = parse_formula("=COINCIDIR($C$21;{1;2;4;9};0)").unwrap();
/// ```
pub fn parse_formula(formula: &str) -> FormulaResult<FormulaExpr> {
    let formula = formula.trim();

    // Formula must start with '='
    let formula = formula
        .strip_prefix('=')
        .ok_or_else(|| FormulaError::Parse("Formula must start with '='".into()))?;

    let mut parser = FormulaParser::new(formula);
    let expr = parser.parse_expression()?;

    // Make sure we consumed all input
    if !matches!(parser.current_token(), Token::Eof) {
        return Err(FormulaError::Parse(format!(
            "Unexpected {:?} after expression",
            parser.current_token()
        )));
    }

    Ok(expr)
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
enum Token {
    // Literals
    Number(f64),
    String(String),
    Boolean(bool),

    // Identifiers and references
    Identifier(String),       // Function name
    CellRef(String),          // Cell reference like A1, $A$1
    SheetRef(SheetQualifier), // Sheet prefix like Hoja1! or cost:Hoja1!

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Colon,
    Comma,
    Semicolon,

    // Delimiters
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,

    /// Character that cannot start any token
    Unknown(char),

    // End of input
    Eof,
}

/// Address of a reference token. A column or row too large for [`CellRef`]
/// saturates, which puts the address outside every grid.
fn reference_address(text: &str) -> FormulaResult<CellRef> {
    let invalid = match CellRef::parse(text) {
        Ok(address) => return Ok(address),
        Err(e) => FormulaError::Parse(format!("Invalid cell reference '{}': {}", text, e)),
    };

    let plain = text.replace('$', "");
    let split = plain
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(plain.len());
    let (letters, digits) = plain.split_at(split);
    let well_formed = !letters.is_empty()
        && !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit());
    if !well_formed {
        return Err(invalid);
    }

    let col = CellRef::letters_to_column(letters).unwrap_or(u16::MAX);
    let row = match digits.parse::<u32>() {
        Ok(0) => return Err(invalid),
        Ok(row) => row - 1,
        Err(_) => u32::MAX,
    };
    Ok(CellRef::new(row, col))
}

fn binary_operator(token: &Token) -> Option<(BinaryOperator, u8)> {
    Some(match token {
        Token::Plus => (BinaryOperator::Add, 1),
        Token::Minus => (BinaryOperator::Subtract, 1),
        Token::Star => (BinaryOperator::Multiply, 2),
        Token::Slash => (BinaryOperator::Divide, 2),
        Token::Caret => (BinaryOperator::Power, 3),
        _ => return None,
    })
}

/// Formula parser
struct FormulaParser<'a> {
    input: &'a str,
    pos: usize,
    current_token: Option<Token>,
}

impl<'a> FormulaParser<'a> {
    fn new(input: &'a str) -> Self {
        let mut parser = Self {
            input,
            pos: 0,
            current_token: None,
        };
        parser.advance_token();
        parser
    }

    // === Token scanning ===

    fn advance_token(&mut self) {
        self.skip_whitespace();
        self.current_token = Some(self.scan_token());
    }

    fn scan_token(&mut self) -> Token {
        self.skip_whitespace();

        let Some(c) = self.peek_char() else {
            return Token::Eof;
        };

        // Single-character tokens
        let single = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '^' => Some(Token::Caret),
            ':' => Some(Token::Colon),
            ',' => Some(Token::Comma),
            ';' => Some(Token::Semicolon),
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            '{' => Some(Token::LeftBrace),
            '}' => Some(Token::RightBrace),
            _ => None,
        };
        if let Some(token) = single {
            self.advance();
            return token;
        }

        // String literal
        if c == '"' {
            return self.scan_string();
        }

        // Quoted sheet name: 'Hoja 2'!A1
        if c == '\'' {
            return self.scan_quoted_sheet();
        }

        // Number
        if c.is_ascii_digit() || (c == '.' && self.peek_char_at(1).is_some_and(|c| c.is_ascii_digit()))
        {
            return self.scan_number();
        }

        // Identifier, cell reference, sheet prefix or boolean
        if c.is_alphabetic() || c == '_' || c == '$' {
            return self.scan_identifier_or_ref();
        }

        self.advance();
        Token::Unknown(c)
    }

    /// `"text"` with `""` as an escaped quote; an unterminated string runs to the end
    fn scan_string(&mut self) -> Token {
        self.advance();

        let mut text = String::new();
        while let Some(c) = self.peek_char() {
            self.advance();
            if c != '"' {
                text.push(c);
                continue;
            }
            if self.peek_char() != Some('"') {
                break;
            }
            text.push('"');
            self.advance();
        }

        Token::String(text)
    }

    /// Scan `'name'` (with `''` as an escaped quote). Returns `None` if unterminated.
    fn scan_quoted_name(&mut self) -> Option<String> {
        self.advance(); // Skip opening quote

        let mut name = String::new();
        while let Some(c) = self.peek_char() {
            self.advance();
            if c == '\'' {
                if self.peek_char() == Some('\'') {
                    name.push('\'');
                    self.advance();
                } else {
                    return Some(name);
                }
            } else {
                name.push(c);
            }
        }
        None
    }

    fn scan_quoted_sheet(&mut self) -> Token {
        match self.scan_quoted_name() {
            Some(sheet) if self.peek_char() == Some('!') => {
                self.advance();
                Token::SheetRef(SheetQualifier {
                    instance: None,
                    sheet,
                })
            }
            _ => Token::Unknown('\''),
        }
    }

    fn scan_number(&mut self) -> Token {
        let rest = &self.input[self.pos..];
        let len = lazy_regex::regex_find!(r"^(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?", rest)
            .map_or(1, str::len);
        self.pos += len;
        Token::Number(rest[..len].parse().unwrap_or(0.0))
    }

    fn scan_word(&mut self) -> &'a str {
        let input = self.input;
        let start = self.pos;
        while self
            .peek_char()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$' || c == '.')
        {
            self.advance();
        }
        &input[start..self.pos]
    }

    fn scan_identifier_or_ref(&mut self) -> Token {
        let text = self.scan_word();

        // Sheet prefix (ends with !)
        if self.peek_char() == Some('!') {
            self.advance();
            return Token::SheetRef(SheetQualifier {
                instance: None,
                sheet: text.to_string(),
            });
        }

        // Instance prefix: instance:sheet! (a plain range like A1:B2 falls through)
        if self.peek_char() == Some(':') {
            if let Some(qualifier) = self.try_instance_prefix(text) {
                return Token::SheetRef(qualifier);
            }
        }

        // Booleans, unless followed by '(' - then it's a function call
        let upper = text.to_uppercase();
        if upper == "TRUE" && self.peek_char() != Some('(') {
            return Token::Boolean(true);
        }
        if upper == "FALSE" && self.peek_char() != Some('(') {
            return Token::Boolean(false);
        }

        // Letter(s) followed by number(s), unless it is a call like LOG10(100)
        if Self::is_cell_reference(text) && self.peek_char() != Some('(') {
            return Token::CellRef(text.to_string());
        }

        Token::Identifier(text.to_string())
    }

    /// Look past `:` for `sheet!`; rewinds and returns `None` if it isn't there
    fn try_instance_prefix(&mut self, instance: &str) -> Option<SheetQualifier> {
        let saved = self.pos;
        self.advance(); // Skip ':'

        let sheet = if self.peek_char() == Some('\'') {
            self.scan_quoted_name()
        } else {
            let word = self.scan_word();
            (!word.is_empty()).then(|| word.to_string())
        };

        match sheet {
            Some(sheet) if self.peek_char() == Some('!') => {
                self.advance();
                Some(SheetQualifier {
                    instance: Some(instance.to_string()),
                    sheet,
                })
            }
            _ => {
                self.pos = saved;
                None
            }
        }
    }

    fn is_cell_reference(text: &str) -> bool {
        lazy_regex::regex_is_match!(r"^\$?[A-Za-z]+\$?[0-9]+$", text)
    }

    // === Helper methods ===

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().is_some_and(|c| c.is_whitespace()) {
            self.advance();
        }
    }

    fn current_token(&self) -> &Token {
        self.current_token.as_ref().unwrap_or(&Token::Eof)
    }

    fn consume(&mut self) -> Token {
        let token = self.current_token.take().unwrap_or(Token::Eof);
        self.advance_token();
        token
    }

    fn expect(&mut self, expected: &Token) -> FormulaResult<()> {
        if self.current_token() == expected {
            self.consume();
            Ok(())
        } else {
            Err(FormulaError::Parse(format!(
                "Expected {:?}, got {:?}",
                expected,
                self.current_token()
            )))
        }
    }

    // === Expressions ===
    //
    // Binary operators by binding power: `+ -` (1), `* /` (2), `^` (3), all left
    // associative, so `2^3^2` is `(2^3)^2`. Prefix signs bind tighter than any
    // binary operator and `:` tighter still, so `-2^2` is `(-2)^2`.

    fn parse_expression(&mut self) -> FormulaResult<FormulaExpr> {
        self.parse_binary(1)
    }

    fn parse_binary(&mut self, min_power: u8) -> FormulaResult<FormulaExpr> {
        let mut lhs = self.parse_unary()?;

        while let Some((op, power)) = binary_operator(self.current_token()) {
            if power < min_power {
                break;
            }
            self.consume();
            let rhs = self.parse_binary(power + 1)?;
            lhs = FormulaExpr::BinaryOp {
                op,
                left: Box::new(lhs),
                right: Box::new(rhs),
            };
        }

        Ok(lhs)
    }

    fn parse_unary(&mut self) -> FormulaResult<FormulaExpr> {
        match self.current_token() {
            Token::Minus => {
                self.consume();
                let operand = self.parse_unary()?;
                Ok(FormulaExpr::UnaryOp {
                    op: UnaryOperator::Negate,
                    operand: Box::new(operand),
                })
            }
            Token::Plus => {
                self.consume();
                self.parse_unary()
            }
            _ => self.parse_range(),
        }
    }

    fn parse_range(&mut self) -> FormulaResult<FormulaExpr> {
        let left = self.parse_primary()?;

        if !matches!(self.current_token(), Token::Colon) {
            return Ok(left);
        }
        self.consume();
        let right = self.parse_primary()?;

        match (left, right) {
            (FormulaExpr::CellRef(start_ref), FormulaExpr::CellRef(end_ref)) => {
                // Hoja1!A1:B2 qualifies both ends; a repeated prefix must agree
                if end_ref.sheet.is_some() && end_ref.sheet != start_ref.sheet {
                    return Err(FormulaError::Parse(
                        "Range references must be on the same sheet".into(),
                    ));
                }
                Ok(FormulaExpr::RangeRef(RangeReference {
                    sheet: start_ref.sheet,
                    range: CellRange::new(start_ref.address, end_ref.address),
                }))
            }
            _ => Err(FormulaError::Parse(
                "Range operator requires cell references".into(),
            )),
        }
    }

    fn parse_primary(&mut self) -> FormulaResult<FormulaExpr> {
        match self.current_token().clone() {
            Token::Number(n) => {
                self.consume();
                Ok(FormulaExpr::Number(n))
            }

            Token::String(s) => {
                self.consume();
                Ok(FormulaExpr::String(s))
            }

            Token::Boolean(b) => {
                self.consume();
                Ok(FormulaExpr::Boolean(b))
            }

            Token::LeftParen => {
                self.consume();
                let expr = self.parse_expression()?;
                self.expect(&Token::RightParen)?;
                Ok(expr)
            }

            Token::LeftBrace => self.parse_array(),

            Token::SheetRef(sheet) => {
                self.consume();
                self.parse_sheet_reference(sheet)
            }

            Token::CellRef(ref_str) => {
                self.consume();
                self.parse_cell_reference(None, &ref_str)
            }

            Token::Identifier(name) => {
                self.consume();
                if matches!(self.current_token(), Token::LeftParen) {
                    self.parse_function_call(name)
                } else {
                    Err(FormulaError::Parse(format!("Unknown name '{}'", name)))
                }
            }

            token => Err(FormulaError::Parse(format!("Unexpected token: {:?}", token))),
        }
    }

    fn parse_array(&mut self) -> FormulaResult<FormulaExpr> {
        self.expect(&Token::LeftBrace)?;

        let mut rows = Vec::new();
        let mut current_row = Vec::new();

        if !matches!(self.current_token(), Token::RightBrace) {
            current_row.push(self.parse_expression()?);

            loop {
                match self.current_token() {
                    Token::Comma => {
                        self.consume();
                        current_row.push(self.parse_expression()?);
                    }
                    Token::Semicolon => {
                        self.consume();
                        rows.push(std::mem::take(&mut current_row));
                        current_row.push(self.parse_expression()?);
                    }
                    Token::RightBrace => break,
                    _ => {
                        return Err(FormulaError::Parse(
                            "Expected ',' ';' or '}' in array".into(),
                        ))
                    }
                }
            }
        }

        if !current_row.is_empty() {
            rows.push(current_row);
        }

        self.expect(&Token::RightBrace)?;
        Ok(FormulaExpr::Array(rows))
    }

    fn parse_function_call(&mut self, name: String) -> FormulaResult<FormulaExpr> {
        self.expect(&Token::LeftParen)?;

        let mut args = Vec::new();

        if matches!(self.current_token(), Token::RightParen) {
            self.consume();
            return Ok(FormulaExpr::Function { name, args });
        }

        loop {
            if matches!(
                self.current_token(),
                Token::Comma | Token::Semicolon | Token::RightParen
            ) {
                args.push(FormulaExpr::Missing);
            } else {
                args.push(self.parse_expression()?);
            }

            match self.current_token() {
                Token::Comma | Token::Semicolon => {
                    self.consume();
                }
                _ => break,
            }
        }

        self.expect(&Token::RightParen)?;

        Ok(FormulaExpr::Function { name, args })
    }

    fn parse_sheet_reference(&mut self, sheet: SheetQualifier) -> FormulaResult<FormulaExpr> {
        // After Hoja1!, we expect a cell reference
        match self.current_token().clone() {
            Token::CellRef(ref_str) => {
                self.consume();
                self.parse_cell_reference(Some(sheet), &ref_str)
            }
            _ => Err(FormulaError::Parse(
                "Expected cell reference after sheet name".into(),
            )),
        }
    }

    fn parse_cell_reference(
        &mut self,
        sheet: Option<SheetQualifier>,
        ref_str: &str,
    ) -> FormulaResult<FormulaExpr> {
        let address = reference_address(ref_str)?;
        Ok(FormulaExpr::CellRef(CellReference { sheet, address }))
    }
}
