//! Query locators: how to resolve element handles against a surface.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How the identifier of a locator is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Id,
    ClassName,
    CssSelector,
    XPath,
}

/// When a wait on a locator counts as satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum MatchCondition {
    /// At least one element matches; the first is returned.
    Present,
    /// At least one element matches; all matches are returned.
    AllPresent,
    /// The first matching element that can receive a click.
    Clickable,
    /// The first matching element whose rendered text equals the given text.
    TextEquals(String),
}

/// An immutable description of an element query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryLocator {
    pub strategy: Strategy,
    pub identifier: String,
    pub condition: MatchCondition,
}

impl QueryLocator {
    pub fn new(strategy: Strategy, identifier: impl Into<String>) -> Self {
        Self {
            strategy,
            identifier: identifier.into(),
            condition: MatchCondition::Present,
        }
    }

    pub fn id(identifier: impl Into<String>) -> Self {
        Self::new(Strategy::Id, identifier)
    }

    pub fn class(identifier: impl Into<String>) -> Self {
        Self::new(Strategy::ClassName, identifier)
    }

    pub fn css(identifier: impl Into<String>) -> Self {
        Self::new(Strategy::CssSelector, identifier)
    }

    pub fn xpath(identifier: impl Into<String>) -> Self {
        Self::new(Strategy::XPath, identifier)
    }

    /// Same query, different condition.
    pub fn when(&self, condition: MatchCondition) -> Self {
        Self {
            strategy: self.strategy,
            identifier: self.identifier.clone(),
            condition,
        }
    }

    /// The CSS selector equivalent, if the strategy has one.
    ///
    /// Class names containing whitespace are compound class lists and map to
    /// a chained selector (`a b` becomes `.a.b`).
    pub fn to_css(&self) -> Option<String> {
        match self.strategy {
            Strategy::Id => Some(format!("#{}", self.identifier)),
            Strategy::ClassName => Some(
                self.identifier
                    .split_whitespace()
                    .map(|c| format!(".{c}"))
                    .collect(),
            ),
            Strategy::CssSelector => Some(self.identifier.clone()),
            Strategy::XPath => None,
        }
    }
}

impl fmt::Display for QueryLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let strategy = match self.strategy {
            Strategy::Id => "id",
            Strategy::ClassName => "class",
            Strategy::CssSelector => "css",
            Strategy::XPath => "xpath",
        };
        write!(f, "{strategy} `{}`", self.identifier)?;
        match &self.condition {
            MatchCondition::Present => write!(f, " (present)"),
            MatchCondition::AllPresent => write!(f, " (all present)"),
            MatchCondition::Clickable => write!(f, " (clickable)"),
            MatchCondition::TextEquals(text) => write!(f, " (text = {text:?})"),
        }
    }
}
