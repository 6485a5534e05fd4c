//! The data a fix-generation collaborator hands to this crate: a candidate
//! patch set plus whatever tests should accompany it.
//!
//! Restored from the upstream domain this workspace was distilled from —
//! the distillation dropped these types, but the rollout pipeline has
//! nothing to evaluate or deploy without them.

use std::path::PathBuf;

/// One source-file edit: replace the first occurrence of `original_code`
/// with `new_code`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Patch {
    /// File the patch applies to, relative to the deploy root.
    pub file: PathBuf,
    /// The substring to locate and replace.
    pub original_code: String,
    /// The replacement text.
    pub new_code: String,
}

/// A test file to write out alongside a patch set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestFile {
    /// Where to write the file, relative to the deploy root.
    pub path: PathBuf,
    /// Its full contents.
    pub content: String,
}

/// A candidate fix: a confidence score, a patch set, and any tests that
/// should accompany it.
#[derive(Clone, Debug, PartialEq)]
pub struct FixCandidate {
    /// The fix generator's self-reported confidence, in `[0, 1]`.
    pub confidence: f64,
    /// The source edits this fix comprises.
    pub patches: Vec<Patch>,
    /// Test files to write alongside the patches.
    pub tests: Vec<TestFile>,
    /// Whether `tests` is non-empty; carried explicitly because a fix with
    /// an empty `tests` vec is a meaningfully different signal than one
    /// whose generator never considered tests at all.
    pub has_tests: bool,
}

impl FixCandidate {
    /// Construct a candidate; `has_tests` is derived from whether `tests`
    /// is non-empty.
    #[must_use]
    pub fn new(confidence: f64, patches: Vec<Patch>, tests: Vec<TestFile>) -> Self {
        let has_tests = !tests.is_empty();
        Self { confidence, patches, tests, has_tests }
    }
}
