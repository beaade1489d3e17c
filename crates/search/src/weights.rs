//! Query-adaptive method weights
//!
//! Caller-pinned weights are validated and used as-is. Otherwise an ordered
//! rule table is walked and the first rule whose predicate matches the
//! query's features supplies the weights; `balanced` is the fallback.

use crate::retrieval::Method;
use rankforge_common::errors::{AppError, Result};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Tolerance on the unit-sum constraint
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.001;

/// Weights at or below this value disable their method
pub const DISABLED_WEIGHT: f64 = 0.001;

/// Fallback rule name
pub const BALANCED_RULE: &str = "balanced";

/// Rule name reported for caller-supplied weights
pub const CALLER_RULE: &str = "caller";

/// Rule name reported for single-method requests
pub const METHOD_ONLY_RULE: &str = "method_only";

const EXACTNESS_WORDS: [&str; 7] = [
    "exact",
    "exactly",
    "specific",
    "specifically",
    "verbatim",
    "precise",
    "literal",
];

const SEMANTIC_WORDS: [&str; 4] = ["similar", "like", "related", "about"];

/// Per-method fusion weights
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightSet {
    pub dense: f64,
    pub sparse: f64,
    pub pattern: f64,
    pub fuzzy: f64,
}

impl WeightSet {
    pub const EXACT_MATCH: WeightSet = WeightSet::preset(0.20, 0.20, 0.40, 0.20);
    pub const SHORT_QUERY: WeightSet = WeightSet::preset(0.30, 0.20, 0.20, 0.30);
    pub const SEMANTIC_INTENT: WeightSet = WeightSet::preset(0.60, 0.20, 0.10, 0.10);
    pub const LONG_QUERY: WeightSet = WeightSet::preset(0.30, 0.40, 0.15, 0.15);
    pub const CONTAINS_YEAR: WeightSet = WeightSet::preset(0.25, 0.25, 0.35, 0.15);
    pub const BALANCED: WeightSet = WeightSet::preset(0.40, 0.30, 0.15, 0.15);

    const fn preset(dense: f64, sparse: f64, pattern: f64, fuzzy: f64) -> Self {
        Self {
            dense,
            sparse,
            pattern,
            fuzzy,
        }
    }

    /// Build a validated weight set
    pub fn new(dense: f64, sparse: f64, pattern: f64, fuzzy: f64) -> Result<Self> {
        let weights = Self::preset(dense, sparse, pattern, fuzzy);
        weights.validate()?;
        Ok(weights)
    }

    /// All weight on one method
    pub fn only(method: Method) -> Self {
        let mut weights = Self::preset(0.0, 0.0, 0.0, 0.0);
        *weights.slot(method) = 1.0;
        weights
    }

    /// Non-negative, sums to 1 within tolerance, at least one method enabled
    pub fn validate(&self) -> Result<()> {
        for method in Method::ALL {
            let w = self.get(method);
            if !w.is_finite() || w < 0.0 {
                return Err(AppError::InvalidWeights {
                    message: format!("{} weight must be a non-negative number, got {}", method, w),
                });
            }
        }

        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(AppError::InvalidWeights {
                message: format!("weights must sum to 1.0 (got {:.4})", sum),
            });
        }

        if self.enabled().next().is_none() {
            return Err(AppError::InvalidWeights {
                message: format!("at least one weight must exceed {}", DISABLED_WEIGHT),
            });
        }

        Ok(())
    }

    pub fn get(&self, method: Method) -> f64 {
        match method {
            Method::Dense => self.dense,
            Method::Sparse => self.sparse,
            Method::Pattern => self.pattern,
            Method::Fuzzy => self.fuzzy,
        }
    }

    fn slot(&mut self, method: Method) -> &mut f64 {
        match method {
            Method::Dense => &mut self.dense,
            Method::Sparse => &mut self.sparse,
            Method::Pattern => &mut self.pattern,
            Method::Fuzzy => &mut self.fuzzy,
        }
    }

    pub fn is_enabled(&self, method: Method) -> bool {
        self.get(method) > DISABLED_WEIGHT
    }

    /// Methods that take part in fusion
    pub fn enabled(&self) -> impl Iterator<Item = Method> + '_ {
        Method::ALL.into_iter().filter(|m| self.is_enabled(*m))
    }

    pub fn sum(&self) -> f64 {
        self.dense + self.sparse + self.pattern + self.fuzzy
    }
}

impl Default for WeightSet {
    fn default() -> Self {
        Self::BALANCED
    }
}

/// Query characteristics the rule table inspects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryFeatures {
    pub word_count: usize,
    pub has_quoted_phrase: bool,
    pub has_exactness_word: bool,
    pub has_semantic_word: bool,
    pub has_year: bool,
}

impl QueryFeatures {
    pub fn extract(query: &str) -> Self {
        let words: Vec<String> = query
            .split_whitespace()
            .map(|w| {
                w.trim_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase()
            })
            .filter(|w| !w.is_empty())
            .collect();
        let has_word = |set: &[&str]| words.iter().any(|w| set.contains(&w.as_str()));

        Self {
            word_count: words.len(),
            has_quoted_phrase: quoted_phrase_pattern().is_some_and(|re| re.is_match(query)),
            has_exactness_word: has_word(&EXACTNESS_WORDS),
            has_semantic_word: has_word(&SEMANTIC_WORDS),
            has_year: year_pattern().is_some_and(|re| re.is_match(query)),
        }
    }
}

/// Phrases enclosed in straight or curly double quotes, quotes stripped
pub fn quoted_phrases(query: &str) -> Vec<&str> {
    quoted_phrase_pattern()
        .map(|re| {
            re.find_iter(query)
                .map(|m| m.as_str().trim_matches(|c| matches!(c, '"' | '“' | '”')).trim())
                .filter(|phrase| !phrase.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn quoted_phrase_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r#""[^"]+"|“[^”]+”"#).ok())
        .as_ref()
}

fn year_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b[0-9]{4}\b").ok()).as_ref()
}

/// One entry of the rule table
#[derive(Debug, Clone, Copy)]
pub struct WeightRule {
    pub name: &'static str,
    pub weights: WeightSet,
    pub fuzzy_threshold: Option<f64>,
    predicate: fn(&QueryFeatures) -> bool,
}

impl WeightRule {
    pub fn matches(&self, features: &QueryFeatures) -> bool {
        (self.predicate)(features)
    }
}

/// Built-in rules in default priority order
pub fn builtin_rules() -> [WeightRule; 5] {
    [
        WeightRule {
            name: "exact_match",
            weights: WeightSet::EXACT_MATCH,
            fuzzy_threshold: None,
            predicate: |f| f.has_quoted_phrase || f.has_exactness_word,
        },
        WeightRule {
            name: "short_query",
            weights: WeightSet::SHORT_QUERY,
            fuzzy_threshold: Some(0.2),
            predicate: |f| f.word_count < 3,
        },
        WeightRule {
            name: "semantic_intent",
            weights: WeightSet::SEMANTIC_INTENT,
            fuzzy_threshold: None,
            predicate: |f| f.has_semantic_word,
        },
        WeightRule {
            name: "long_query",
            weights: WeightSet::LONG_QUERY,
            fuzzy_threshold: None,
            predicate: |f| f.word_count > 8,
        },
        WeightRule {
            name: "contains_year",
            weights: WeightSet::CONTAINS_YEAR,
            fuzzy_threshold: None,
            predicate: |f| f.has_year,
        },
    ]
}

/// Outcome of weight selection
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeightSelection {
    pub weights: WeightSet,
    /// Threshold override from the matched rule, if any
    pub fuzzy_threshold: Option<f64>,
    pub rule: &'static str,
}

/// Ordered rule table
#[derive(Debug, Clone)]
pub struct WeightSelector {
    rules: Vec<WeightRule>,
}

impl Default for WeightSelector {
    fn default() -> Self {
        Self {
            rules: builtin_rules().to_vec(),
        }
    }
}

impl WeightSelector {
    /// Reorder the table. Named rules come first in the given order; rules
    /// left unnamed keep their default relative order after them.
    /// `balanced` may be listed but is always the fallback.
    pub fn with_order(names: &[String]) -> Result<Self> {
        let mut remaining = builtin_rules().to_vec();
        let mut rules = Vec::with_capacity(remaining.len());

        for name in names {
            let name = name.trim();
            if name == BALANCED_RULE {
                continue;
            }
            match remaining.iter().position(|r| r.name == name) {
                Some(i) => rules.push(remaining.remove(i)),
                None if rules.iter().any(|r| r.name == name) => {
                    return Err(AppError::Configuration {
                        message: format!("weight rule '{}' listed more than once", name),
                    })
                }
                None => {
                    return Err(AppError::Configuration {
                        message: format!("unknown weight rule '{}'", name),
                    })
                }
            }
        }

        rules.extend(remaining);
        Ok(Self { rules })
    }

    /// Rule names in evaluation order, ending with the fallback
    pub fn order(&self) -> Vec<&'static str> {
        self.rules
            .iter()
            .map(|r| r.name)
            .chain(std::iter::once(BALANCED_RULE))
            .collect()
    }

    pub fn rules(&self) -> &[WeightRule] {
        &self.rules
    }

    /// Pick weights for a query.
    ///
    /// `pinned` and `method` are mutually exclusive.
    pub fn select(&self, query: &str, pinned: Option<WeightSet>, method: Option<Method>) -> Result<WeightSelection> {
        match (pinned, method) {
            (Some(_), Some(_)) => Err(AppError::Validation {
                message: "weights and method are mutually exclusive".to_string(),
                field: Some("method".to_string()),
            }),
            (Some(weights), None) => {
                weights.validate()?;
                Ok(WeightSelection {
                    weights,
                    fuzzy_threshold: None,
                    rule: CALLER_RULE,
                })
            }
            (None, Some(method)) => Ok(WeightSelection {
                weights: WeightSet::only(method),
                fuzzy_threshold: None,
                rule: METHOD_ONLY_RULE,
            }),
            (None, None) => Ok(self.select_for(&QueryFeatures::extract(query))),
        }
    }

    fn select_for(&self, features: &QueryFeatures) -> WeightSelection {
        self.rules
            .iter()
            .find(|rule| rule.matches(features))
            .map(|rule| WeightSelection {
                weights: rule.weights,
                fuzzy_threshold: rule.fuzzy_threshold,
                rule: rule.name,
            })
            .unwrap_or(WeightSelection {
                weights: WeightSet::BALANCED,
                fuzzy_threshold: None,
                rule: BALANCED_RULE,
            })
    }
}
