use crate::config::{validate_category_name, RuleConfig};
use crate::error::ConfigError;
use crate::scanner::FileRecord;
use glob::Pattern;

/// Category for files no rule matches.
pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone)]
pub enum RulePredicate {
    /// Lowercase extensions without the leading dot.
    Extensions(Vec<String>),
    NamePattern(Pattern),
    MinSize(u64),
    MaxSize(u64),
    Years(Vec<i32>),
}

impl RulePredicate {
    pub fn matches(&self, record: &FileRecord) -> bool {
        match self {
            RulePredicate::Extensions(extensions) => extensions
                .iter()
                .any(|ext| ext.eq_ignore_ascii_case(&record.extension)),
            RulePredicate::NamePattern(pattern) => pattern.matches(&record.name),
            RulePredicate::MinSize(min) => record.size_bytes >= *min,
            RulePredicate::MaxSize(max) => record.size_bytes <= *max,
            RulePredicate::Years(years) => years.contains(&record.inferred_year),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CategoryRule {
    pub predicates: Vec<RulePredicate>,
    pub target_category: String,
}

impl CategoryRule {
    /// A rule without predicates matches every file.
    pub fn matches(&self, record: &FileRecord) -> bool {
        self.predicates.iter().all(|p| p.matches(record))
    }

    pub fn from_config(rule: &RuleConfig) -> Result<Self, ConfigError> {
        validate_category_name(&rule.category)?;

        let mut predicates = Vec::new();
        if let Some(extensions) = &rule.extensions {
            predicates.push(RulePredicate::Extensions(
                extensions
                    .iter()
                    .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
                    .collect(),
            ));
        }
        if let Some(pattern) = &rule.name_pattern {
            let compiled = Pattern::new(pattern).map_err(|e| ConfigError::InvalidRule {
                category: rule.category.clone(),
                reason: format!("bad name_pattern '{}': {}", pattern, e),
            })?;
            predicates.push(RulePredicate::NamePattern(compiled));
        }
        if let Some(min) = rule.min_size_bytes {
            predicates.push(RulePredicate::MinSize(min));
        }
        if let Some(max) = rule.max_size_bytes {
            predicates.push(RulePredicate::MaxSize(max));
        }
        if let Some(years) = &rule.years {
            predicates.push(RulePredicate::Years(years.clone()));
        }

        Ok(Self {
            predicates,
            target_category: rule.category.clone(),
        })
    }
}

/// Compile configured rules, preserving their order.
pub fn compile_rules(rules: &[RuleConfig]) -> Result<Vec<CategoryRule>, ConfigError> {
    rules.iter().map(CategoryRule::from_config).collect()
}

/// Target category of the first rule matching `record`, or [`UNCATEGORIZED`].
pub fn categorize<'a>(record: &FileRecord, rules: &'a [CategoryRule]) -> &'a str {
    rules
        .iter()
        .find(|rule| rule.matches(record))
        .map(|rule| rule.target_category.as_str())
        .unwrap_or(UNCATEGORIZED)
}
