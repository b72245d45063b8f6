pub mod categorize;
pub mod similarity;
pub mod versioning;

pub use categorize::{categorize, compile_rules, CategoryRule, RulePredicate, UNCATEGORIZED};
pub use similarity::{pairwise_similarity, SimilarPair, SimilarityEngine, SimilarityResult, TextDocument};
pub use versioning::{generate_version_name, version_groups, VersionGroup, VersionedFile};
