//! Index-notation parser
//!
//! Parses assignments written the way the benchmark kernels are declared:
//!
//! ```text
//! D(i) = A(i,j) * B(i,j) * C(j)
//! S()  = A(i) * B(i)
//! ```
//!
//! Tensor and variable names start with a letter or `_` and continue with
//! letters, digits or `_`. Whitespace is ignored.

use crate::error::{PlanError, PlanResult};
use crate::index::{Access, Assignment, IndexVar};

impl Assignment {
    /// Parse an assignment from index notation
    ///
    /// # Examples
    ///
    /// ```
    /// use tenbench_planner::Assignment;
    ///
    /// let stmt = Assignment::parse("E(i) = C(j) * A(i,j) * B(i,j)").unwrap();
    /// assert_eq!(stmt.output(), "E");
    /// assert_eq!(stmt.rhs().len(), 3);
    /// ```
    pub fn parse(text: &str) -> PlanResult<Self> {
        let mut parser = Parser::new(text);
        let lhs = parser.access()?;
        parser.expect('=')?;

        let mut rhs = vec![parser.access()?];
        while parser.eat('*') {
            rhs.push(parser.access()?);
        }

        parser.skip_ws();
        if let Some(c) = parser.peek() {
            return Err(PlanError::parse(
                parser.pos,
                format!("unexpected '{}' after expression", c),
            ));
        }

        Assignment::new(lhs, rhs)
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> PlanResult<()> {
        if self.eat(expected) {
            return Ok(());
        }
        let found = match self.peek() {
            Some(c) => format!("'{}'", c),
            None => "end of input".to_string(),
        };
        Err(PlanError::parse(
            self.pos,
            format!("expected '{}', found {}", expected, found),
        ))
    }

    fn ident(&mut self) -> PlanResult<String> {
        self.skip_ws();
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_alphabetic() || c == '_' => {
                self.bump();
            }
            _ => return Err(PlanError::parse(start, "expected a name")),
        }
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.bump();
        }
        Ok(self.src[start..self.pos].to_string())
    }

    fn access(&mut self) -> PlanResult<Access> {
        let tensor = self.ident()?;
        self.expect('(')?;

        let mut indices = Vec::new();
        if !self.eat(')') {
            loop {
                indices.push(IndexVar::new(self.ident()?));
                if self.eat(')') {
                    break;
                }
                self.expect(',')?;
            }
        }

        Ok(Access::new(tensor, indices))
    }
}
