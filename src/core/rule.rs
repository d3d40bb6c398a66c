//! Rule matching: which steps apply to a resource

use crate::core::config::RuleConfig;
use crate::core::error::{BuildError, BuildResult};
use crate::core::registry::StepRegistry;
use regex::Regex;

/// Pattern a rule tests resource paths with (not serializable due to Regex)
#[derive(Debug, Clone)]
pub enum RulePattern {
    /// Glob; patterns without a `/` match the file name at any depth
    Glob(String),
    /// Regular expression searched anywhere in the path
    Regex(Regex),
}

impl RulePattern {
    /// Check if a resource path matches this pattern
    pub fn matches(&self, path: &str) -> bool {
        match self {
            RulePattern::Glob(glob) => glob_matches(glob, path),
            RulePattern::Regex(re) => re.is_match(path),
        }
    }
}

impl std::fmt::Display for RulePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RulePattern::Glob(glob) => write!(f, "{}", glob),
            RulePattern::Regex(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

fn glob_matches(glob: &str, path: &str) -> bool {
    if !glob.contains('/') {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        return fast_glob::glob_match(glob, file_name);
    }
    if fast_glob::glob_match(glob, path) {
        return true;
    }
    // `**/x` also matches `x` at the root
    glob.strip_prefix("**/")
        .is_some_and(|rest| fast_glob::glob_match(rest, path))
}

/// A pattern bound to an ordered list of step names
#[derive(Debug, Clone)]
pub struct Rule {
    pub pattern: RulePattern,

    /// Glob of paths the rule never applies to
    pub exclude: Option<String>,

    pub steps: Vec<String>,

    /// Stop evaluating later rules for a resource this rule matched
    pub once: bool,
}

impl Rule {
    /// A glob rule
    pub fn glob(pattern: impl Into<String>, steps: Vec<String>) -> Self {
        Self {
            pattern: RulePattern::Glob(pattern.into()),
            exclude: None,
            steps,
            once: false,
        }
    }

    /// A regex rule
    pub fn regex(pattern: &str, steps: Vec<String>) -> BuildResult<Self> {
        let re = Regex::new(pattern).map_err(|e| {
            BuildError::Configuration(format!("Invalid rule regex '{}': {}", pattern, e))
        })?;
        Ok(Self {
            pattern: RulePattern::Regex(re),
            exclude: None,
            steps,
            once: false,
        })
    }

    pub fn with_exclude(mut self, exclude: impl Into<String>) -> Self {
        self.exclude = Some(exclude.into());
        self
    }

    pub fn with_once(mut self, once: bool) -> Self {
        self.once = once;
        self
    }

    pub fn from_config(config: &RuleConfig) -> BuildResult<Self> {
        let rule = match (&config.include, &config.test) {
            (Some(glob), None) => Rule::glob(glob.clone(), config.steps.clone()),
            (None, Some(re)) => Rule::regex(re, config.steps.clone())?,
            _ => {
                return Err(BuildError::Configuration(
                    "A rule needs exactly one of 'include' or 'test'".to_string(),
                ))
            }
        };

        let rule = rule.with_once(config.once);
        Ok(match &config.exclude {
            Some(exclude) => rule.with_exclude(exclude.clone()),
            None => rule,
        })
    }

    /// Check if the rule applies to a resource path
    pub fn matches(&self, path: &str) -> bool {
        if let Some(exclude) = &self.exclude {
            if glob_matches(exclude, path) {
                return false;
            }
        }
        self.pattern.matches(path)
    }
}

/// Ordered rule set; evaluation is pure and repeatable
#[derive(Debug, Clone, Default)]
pub struct RuleMatcher {
    rules: Vec<Rule>,
}

impl RuleMatcher {
    /// Build a matcher, rejecting rules that reference unregistered steps
    pub fn new(rules: Vec<Rule>, registry: &StepRegistry) -> BuildResult<Self> {
        for rule in &rules {
            for step in &rule.steps {
                if !registry.contains(step) {
                    return Err(BuildError::Configuration(format!(
                        "Rule '{}' references unknown step '{}'",
                        rule.pattern, step
                    )));
                }
            }
        }
        Ok(Self { rules })
    }

    pub fn from_config(configs: &[RuleConfig], registry: &StepRegistry) -> BuildResult<Self> {
        let rules = configs
            .iter()
            .map(Rule::from_config)
            .collect::<BuildResult<Vec<_>>>()?;
        Self::new(rules, registry)
    }

    /// Rules applying to `path`, in declaration order
    pub fn matching(&self, path: &str) -> Vec<&Rule> {
        let mut matched = Vec::new();
        for rule in &self.rules {
            if rule.matches(path) {
                matched.push(rule);
                if rule.once {
                    break;
                }
            }
        }
        matched
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}
