//! Action directives — structured instructions embedded in model responses.
//!
//! The model requests side effects through a tiny fixed micro-syntax inside
//! its `<action>` tag: `READ_FILE <filename>` or `SQL <query text>`. The
//! prefixes are matched case-sensitively, including the single trailing
//! space; anything else is not a directive.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const READ_FILE_PREFIX: &str = "READ_FILE ";
const SQL_PREFIX: &str = "SQL ";

/// A single side effect requested by the model.
///
/// Exactly one directive (or none) is acted upon per model response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionDirective {
    /// Read a file from the files directory.
    ReadFile(String),
    /// Run a query against the relational store.
    Sql(String),
}

impl ActionDirective {
    /// Parse the body of an `<action>` tag.
    ///
    /// Returns `None` for anything that does not start with one of the two
    /// literal prefixes. The remainder is taken verbatim: no trimming, an
    /// empty remainder is still a directive (and will fail downstream with
    /// a descriptive result string).
    pub fn parse(raw: &str) -> Option<Self> {
        if let Some(filename) = raw.strip_prefix(READ_FILE_PREFIX) {
            return Some(Self::ReadFile(filename.to_string()));
        }
        if let Some(query) = raw.strip_prefix(SQL_PREFIX) {
            return Some(Self::Sql(query.to_string()));
        }
        None
    }
}

impl std::fmt::Display for ActionDirective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadFile(filename) => write!(f, "READ_FILE {filename}"),
            Self::Sql(query) => write!(f, "SQL {query}"),
        }
    }
}

/// Executes action directives against local resources.
///
/// Runners are infallible by contract: failures come back as descriptive
/// result strings, which are fed to the model like any other result. The
/// model is expected to recover (retry a query, pick another file), so an
/// error must never abort the analysis loop.
#[async_trait]
pub trait ActionRunner: Send + Sync {
    async fn run(&self, directive: &ActionDirective) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_read_file() {
        assert_eq!(
            ActionDirective::parse("READ_FILE notes.txt"),
            Some(ActionDirective::ReadFile("notes.txt".into()))
        );
    }

    #[test]
    fn parses_sql() {
        assert_eq!(
            ActionDirective::parse("SQL SELECT COUNT(*) FROM cases"),
            Some(ActionDirective::Sql("SELECT COUNT(*) FROM cases".into()))
        );
    }

    #[test]
    fn prefixes_are_case_sensitive() {
        assert_eq!(ActionDirective::parse("sql SELECT 1"), None);
        assert_eq!(ActionDirective::parse("read_file notes.txt"), None);
        assert_eq!(ActionDirective::parse("Sql SELECT 1"), None);
    }

    #[test]
    fn prefix_requires_the_separating_space() {
        assert_eq!(ActionDirective::parse("SQLSELECT 1"), None);
        assert_eq!(ActionDirective::parse("READ_FILE"), None);
        assert_eq!(ActionDirective::parse("SQL"), None);
    }

    #[test]
    fn leading_whitespace_is_not_a_directive() {
        assert_eq!(ActionDirective::parse(" SQL SELECT 1"), None);
        assert_eq!(ActionDirective::parse("\nREAD_FILE notes.txt"), None);
    }

    #[test]
    fn empty_remainder_is_still_a_directive() {
        assert_eq!(
            ActionDirective::parse("SQL "),
            Some(ActionDirective::Sql(String::new()))
        );
        assert_eq!(
            ActionDirective::parse("READ_FILE "),
            Some(ActionDirective::ReadFile(String::new()))
        );
    }

    #[test]
    fn remainder_is_taken_verbatim() {
        assert_eq!(
            ActionDirective::parse("SQL  SELECT 1"),
            Some(ActionDirective::Sql(" SELECT 1".into()))
        );
    }
}
