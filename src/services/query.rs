use crate::domain::model::{EntityId, EntityKind, Model, PlaceRef};

#[derive(thiserror::Error, Debug)]
#[error("{0}")]
pub struct ExprError(String);

impl ExprError {
    fn new(message: impl Into<String>) -> Self {
        ExprError(message.into())
    }
}

/// A compiled selection test. All names are resolved against the model
/// at compile time, so evaluation is pure index arithmetic and the
/// same predicate can be applied to any number of entities.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Bare token: case-insensitive substring of name or alias.
    NameMatches(String),
    KeyedWith(usize),
    InPlace(PlaceRef),
    WorksAt(EntityId),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn selects(&self, model: &Model, id: EntityId) -> bool {
        let entity = &model.entities[id];
        match self {
            Predicate::NameMatches(needle) => entity.name_contains(needle),
            Predicate::KeyedWith(k) => entity.keywords.contains(k),
            Predicate::InPlace(place) => entity
                .place
                .map(|p| model.place_contains(*place, p))
                .unwrap_or(false),
            Predicate::WorksAt(org) => entity.jobs.iter().any(|j| j.org == *org),
            Predicate::And(a, b) => a.selects(model, id) && b.selects(model, id),
            Predicate::Or(a, b) => a.selects(model, id) || b.selects(model, id),
            Predicate::Not(p) => !p.selects(model, id),
        }
    }
}

/// Parse the query tokens into a predicate. Precedence, low to high:
/// `-or`, `-and` (plain juxtaposition is also AND), `-not`,
/// parenthesised groups, terms.
pub fn compile(model: &Model, tokens: &[String]) -> Result<Predicate, ExprError> {
    let mut parser = Parser {
        model,
        tokens,
        pos: 0,
    };
    let pred = parser.or()?;
    match parser.peek() {
        None => Ok(pred),
        Some(tok) => Err(ExprError::new(format!("spurious token \"{tok}\""))),
    }
}

const OP_AND: &str = "-and";
const OP_OR: &str = "-or";
const OP_NOT: &str = "-not";
const PAREN_OPEN: &str = "(";
const PAREN_CLOSE: &str = ")";

fn is_operator(token: &str) -> bool {
    matches!(token, OP_AND | OP_OR | OP_NOT | PAREN_OPEN | PAREN_CLOSE)
}

struct Parser<'a> {
    model: &'a Model,
    tokens: &'a [String],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    fn advance(&mut self) -> Option<&'a str> {
        let tok = self.peek();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn or(&mut self) -> Result<Predicate, ExprError> {
        let mut pred = self.and()?;
        while self.peek() == Some(OP_OR) {
            self.advance();
            let rhs = self.and()?;
            pred = Predicate::Or(Box::new(pred), Box::new(rhs));
        }
        Ok(pred)
    }

    fn and(&mut self) -> Result<Predicate, ExprError> {
        let mut pred = self.unary()?;
        loop {
            match self.peek() {
                Some(OP_AND) => {
                    self.advance();
                    let rhs = self.unary()?;
                    pred = Predicate::And(Box::new(pred), Box::new(rhs));
                }
                // Juxtaposed terms conjoin without an explicit -and.
                Some(tok) if !is_operator(tok) || tok == PAREN_OPEN => {
                    let rhs = self.unary()?;
                    pred = Predicate::And(Box::new(pred), Box::new(rhs));
                }
                _ => break,
            }
        }
        Ok(pred)
    }

    fn unary(&mut self) -> Result<Predicate, ExprError> {
        match self.peek() {
            Some(OP_NOT) => {
                self.advance();
                let pred = self.unary()?;
                Ok(Predicate::Not(Box::new(pred)))
            }
            Some(PAREN_OPEN) => {
                self.advance();
                let pred = self.or()?;
                if self.advance() != Some(PAREN_CLOSE) {
                    return Err(ExprError::new(format!("missing \"{PAREN_CLOSE}\"")));
                }
                Ok(pred)
            }
            Some(tok) if !is_operator(tok) => {
                self.advance();
                self.term(tok)
            }
            Some(tok) => Err(ExprError::new(format!("unexpected token \"{tok}\""))),
            None => Err(ExprError::new("missing expression")),
        }
    }

    fn term(&mut self, token: &str) -> Result<Predicate, ExprError> {
        if let Some(word) = token.strip_prefix('=') {
            let k = self
                .model
                .keyword(word)
                .ok_or_else(|| ExprError::new(format!("no such keyword \"{word}\"")))?;
            return Ok(Predicate::KeyedWith(k));
        }
        if let Some(name) = token.strip_prefix("in:") {
            let place = self
                .model
                .lookup_place(name)
                .map_err(|e| ExprError::new(e.to_string()))?;
            return Ok(Predicate::InPlace(place));
        }
        if let Some(name) = token.strip_prefix("work:") {
            let org = self
                .model
                .find(EntityKind::Organisation, name)
                .map_err(|e| ExprError::new(e.to_string()))?;
            return Ok(Predicate::WorksAt(org));
        }
        Ok(Predicate::NameMatches(token.to_lowercase()))
    }
}
