//! Evaluation of `condition` attributes on format 3 dependency tags.
//!
//! Supported grammar: `$VAR` and literal operands, `==` / `!=` comparisons,
//! `and` / `or` combinators (`and` binds tighter) and parentheses. Variables
//! that are not set in the context expand to the empty string.

use crate::manifest::ManifestError;
use std::collections::BTreeMap;

/// Variables the manifest conditions are evaluated against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionContext {
    vars: BTreeMap<String, String>,
}

const ROS_ENV_VARS: &[&str] = &["ROS_VERSION", "ROS_DISTRO", "ROS_PYTHON_VERSION"];

impl ConditionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context populated from the `ROS_*` variables of the current process.
    pub fn from_env() -> Self {
        let mut ctx = Self::new();
        for key in ROS_ENV_VARS {
            if let Ok(value) = std::env::var(key) {
                ctx.set(*key, value);
            }
        }
        ctx
    }

    #[must_use]
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Evaluate a condition expression. An empty expression is true.
    pub fn evaluate(&self, condition: &str) -> Result<bool, ManifestError> {
        let tokens = tokenize(condition).map_err(|reason| invalid(condition, reason))?;
        if tokens.is_empty() {
            return Ok(true);
        }
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            ctx: self,
        };
        let value = parser
            .or_expr()
            .map_err(|reason| invalid(condition, reason))?;
        if parser.pos != tokens.len() {
            return Err(invalid(condition, "trailing tokens".to_owned()));
        }
        Ok(value)
    }
}

fn invalid(condition: &str, reason: String) -> ManifestError {
    ManifestError::InvalidCondition {
        condition: condition.to_owned(),
        reason,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    Eq,
    Ne,
    And,
    Or,
    Word(String),
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '=' | '!' => {
                chars.next();
                if chars.next_if_eq(&'=').is_none() {
                    return Err(format!("expected '=' after '{c}'"));
                }
                tokens.push(if c == '=' { Token::Eq } else { Token::Ne });
            }
            '"' | '\'' => {
                chars.next();
                let mut word = String::new();
                loop {
                    match chars.next() {
                        Some(q) if q == c => break,
                        Some(other) => word.push(other),
                        None => return Err("unterminated quoted literal".to_owned()),
                    }
                }
                tokens.push(Token::Word(word));
            }
            _ => {
                let mut word = String::new();
                while let Some(&w) = chars.peek() {
                    if w.is_whitespace() || matches!(w, '(' | ')' | '=' | '!') {
                        break;
                    }
                    word.push(w);
                    chars.next();
                }
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    _ => Token::Word(word),
                });
            }
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    ctx: &'a ConditionContext,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn or_expr(&mut self) -> Result<bool, String> {
        let mut value = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let rhs = self.and_expr()?;
            value = value || rhs;
        }
        Ok(value)
    }

    fn and_expr(&mut self) -> Result<bool, String> {
        let mut value = self.primary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let rhs = self.primary()?;
            value = value && rhs;
        }
        Ok(value)
    }

    fn primary(&mut self) -> Result<bool, String> {
        if self.peek() == Some(&Token::Open) {
            self.pos += 1;
            let value = self.or_expr()?;
            return match self.next() {
                Some(Token::Close) => Ok(value),
                _ => Err("missing ')'".to_owned()),
            };
        }
        let lhs = self.operand()?;
        let equal = match self.next() {
            Some(Token::Eq) => true,
            Some(Token::Ne) => false,
            other => return Err(format!("expected '==' or '!=', found {other:?}")),
        };
        let rhs = self.operand()?;
        Ok((lhs == rhs) == equal)
    }

    fn operand(&mut self) -> Result<String, String> {
        let ctx = self.ctx;
        match self.next() {
            Some(Token::Word(word)) => Ok(match word.strip_prefix('$') {
                Some(var) => ctx.get(var).unwrap_or_default().to_owned(),
                None => word.clone(),
            }),
            other => Err(format!("expected operand, found {other:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ros1() -> ConditionContext {
        ConditionContext::new()
            .with_var("ROS_VERSION", "1")
            .with_var("ROS_PYTHON_VERSION", "3")
    }

    #[test]
    fn empty_condition_is_true() {
        assert!(ros1().evaluate("").unwrap());
        assert!(ros1().evaluate("   ").unwrap());
    }

    #[test]
    fn simple_comparisons() {
        let ctx = ros1();
        assert!(ctx.evaluate("$ROS_VERSION == 1").unwrap());
        assert!(!ctx.evaluate("$ROS_VERSION == 2").unwrap());
        assert!(ctx.evaluate("$ROS_VERSION != 2").unwrap());
        assert!(ctx.evaluate("$ROS_VERSION==1").unwrap());
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let ctx = ros1();
        // false and false or true
        assert!(ctx
            .evaluate("$ROS_VERSION == 2 and $ROS_PYTHON_VERSION == 2 or $ROS_VERSION == 1")
            .unwrap());
        assert!(!ctx
            .evaluate("$ROS_VERSION == 1 and ($ROS_PYTHON_VERSION == 2 or $ROS_VERSION == 2)")
            .unwrap());
    }

    #[test]
    fn unknown_variable_is_empty() {
        let ctx = ConditionContext::new();
        assert!(ctx.evaluate("$ROS_DISTRO == ''").unwrap());
        assert!(!ctx.evaluate("$ROS_DISTRO == noetic").unwrap());
    }

    #[test]
    fn quoted_literals() {
        let ctx = ConditionContext::new().with_var("ROS_DISTRO", "noetic");
        assert!(ctx.evaluate("$ROS_DISTRO == \"noetic\"").unwrap());
    }

    #[test]
    fn malformed_conditions_are_rejected() {
        let ctx = ros1();
        assert!(ctx.evaluate("$ROS_VERSION = 1").is_err());
        assert!(ctx.evaluate("$ROS_VERSION == 1 and").is_err());
        assert!(ctx.evaluate("($ROS_VERSION == 1").is_err());
        assert!(ctx.evaluate("$ROS_VERSION == 1 1").is_err());
        assert!(ctx.evaluate("'unterminated == 1").is_err());
    }
}
