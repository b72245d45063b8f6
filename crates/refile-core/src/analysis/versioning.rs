use super::similarity::{SimilarPair, SimilarityResult};
use crate::classify::lexical::tokenize;
use crate::fingerprint::hash_parts;
use crate::scanner::FileRecord;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Below this overall similarity a file counts as its own, unique version.
pub const VERSION_SIMILARITY_FLOOR: f64 = 0.5;

const FALLBACK_VERSION_TYPE: &str = "version";
const NEAR_DUPLICATE_VERSION_TYPE: &str = "revised";

/// Pick the version tag for `record`.
///
/// A vocabulary word in the file stem wins (the latest such word in
/// vocabulary order). Otherwise the first vocabulary entry below the
/// similarity floor, and "revised" (or the last entry) above it.
pub fn version_type<'a>(
    record: &FileRecord,
    result: &SimilarityResult,
    version_types: &'a [String],
) -> &'a str {
    let stem_words = tokenize(record.stem());
    if let Some(hint) = version_types
        .iter()
        .rev()
        .find(|t| stem_words.iter().any(|w| w.eq_ignore_ascii_case(t)))
    {
        return hint;
    }

    if result.overall_similarity < VERSION_SIMILARITY_FLOOR {
        return version_types
            .first()
            .map(String::as_str)
            .unwrap_or(FALLBACK_VERSION_TYPE);
    }

    version_types
        .iter()
        .find(|t| t.as_str() == NEAR_DUPLICATE_VERSION_TYPE)
        .or_else(|| version_types.last())
        .map(String::as_str)
        .unwrap_or(FALLBACK_VERSION_TYPE)
}

/// `{stem}_{type}_v{seq}-{token}{.ext}`.
///
/// `seq` is 1 for the left file of the pair, 2 for the right one and 0 for a
/// file outside it, so both sides of one result always get distinct names.
/// `token` fingerprints the file path together with the score. No clock or
/// randomness is involved.
pub fn generate_version_name(
    record: &FileRecord,
    result: &SimilarityResult,
    version_types: &[String],
) -> String {
    let seq = if record.path == result.left {
        1
    } else if record.path == result.right {
        2
    } else {
        0
    };

    let path = record.path.to_string_lossy();
    let token = hash_parts(&[
        path.as_bytes(),
        &result.overall_similarity.to_bits().to_le_bytes(),
    ]) as u32;

    let extension = if record.extension.is_empty() {
        String::new()
    } else {
        format!(".{}", record.extension)
    };

    format!(
        "{}_{}_v{}-{:08x}{}",
        record.stem(),
        version_type(record, result, version_types),
        seq,
        token,
        extension
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct VersionedFile {
    pub record: FileRecord,
    pub version_name: String,
    /// Score of the strongest pair this file belongs to.
    pub similarity: f64,
}

/// Files connected through near-duplicate pairs.
#[derive(Debug, Clone, Serialize)]
pub struct VersionGroup {
    pub members: Vec<VersionedFile>,
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

/// Group near-duplicate pairs into connected components and name every member
/// after its strongest pair. Groups and members are ordered by path.
pub fn version_groups(pairs: &[SimilarPair], version_types: &[String]) -> Vec<VersionGroup> {
    let mut records: BTreeMap<PathBuf, &FileRecord> = BTreeMap::new();
    for pair in pairs {
        records.entry(pair.a.path.clone()).or_insert(&pair.a);
        records.entry(pair.b.path.clone()).or_insert(&pair.b);
    }
    let index: BTreeMap<&PathBuf, usize> = records
        .keys()
        .enumerate()
        .map(|(i, path)| (path, i))
        .collect();

    let mut parent: Vec<usize> = (0..records.len()).collect();
    let mut strongest: Vec<Option<&SimilarityResult>> = vec![None; records.len()];

    for pair in pairs {
        let a = index[&pair.a.path];
        let b = index[&pair.b.path];
        let (root_a, root_b) = (find(&mut parent, a), find(&mut parent, b));
        if root_a != root_b {
            parent[root_a.max(root_b)] = root_a.min(root_b);
        }
        for i in [a, b] {
            let stronger = strongest[i]
                .map_or(true, |r| pair.result.overall_similarity > r.overall_similarity);
            if stronger {
                strongest[i] = Some(&pair.result);
            }
        }
    }

    let mut groups: BTreeMap<usize, Vec<VersionedFile>> = BTreeMap::new();
    for (i, record) in records.values().enumerate() {
        let Some(result) = strongest[i] else {
            continue;
        };
        let root = find(&mut parent, i);
        groups.entry(root).or_default().push(VersionedFile {
            record: (*record).clone(),
            version_name: generate_version_name(record, result, version_types),
            similarity: result.overall_similarity,
        });
    }

    groups
        .into_values()
        .map(|members| VersionGroup { members })
        .collect()
}
