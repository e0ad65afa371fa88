//! Launch-argument handling for the editor process.
//!
//! Arguments may be given as a single shell-style line or as an explicit
//! list; a missing specification falls back to the parser's default.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArgumentsError {
    #[error("unterminated quoting in argument line: {0:?}")]
    Unterminated(String),
}

/// An argument specification: either a line to be tokenized or a
/// ready-made list passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgSpec {
    Line(String),
    List(Vec<String>),
}

impl From<&str> for ArgSpec {
    fn from(line: &str) -> Self {
        Self::Line(line.to_string())
    }
}

impl From<Vec<String>> for ArgSpec {
    fn from(list: Vec<String>) -> Self {
        Self::List(list)
    }
}

/// Tokenizer for launch arguments.
pub struct Parser {
    default_args: ArgSpec,
}

impl Parser {
    pub fn new(default_args: ArgSpec) -> Self {
        Self { default_args }
    }

    /// Tokenize `args`, falling back to the default specification when
    /// none is given. Lists pass through; lines are shell-tokenized.
    pub fn parse(&self, args: Option<&ArgSpec>) -> Result<Vec<String>, ArgumentsError> {
        let spec = args.unwrap_or(&self.default_args);
        match spec {
            ArgSpec::List(list) => Ok(list.clone()),
            ArgSpec::Line(line) => {
                shlex::split(line).ok_or_else(|| ArgumentsError::Unterminated(line.clone()))
            }
        }
    }

    pub fn default_args(&self) -> &ArgSpec {
        &self.default_args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> Parser {
        Parser::new(ArgSpec::from("-N -i NONE -n -u NONE"))
    }

    #[test]
    fn test_parse_default() {
        let args = parser().parse(None).unwrap();
        assert_eq!(args, vec!["-N", "-i", "NONE", "-n", "-u", "NONE"]);
    }

    #[test]
    fn test_parse_line() {
        let spec = ArgSpec::from("-u 'my vimrc' --clean");
        let args = parser().parse(Some(&spec)).unwrap();
        assert_eq!(args, vec!["-u", "my vimrc", "--clean"]);
    }

    #[test]
    fn test_parse_list_passthrough() {
        let list = vec!["-u".to_string(), "a b.vim".to_string()];
        let spec = ArgSpec::from(list.clone());
        let args = parser().parse(Some(&spec)).unwrap();
        assert_eq!(args, list);
    }

    #[test]
    fn test_parse_unterminated() {
        let spec = ArgSpec::from("-u 'oops");
        assert!(parser().parse(Some(&spec)).is_err());
    }
}
