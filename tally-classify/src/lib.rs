//! tally-classify: merchant rules, the classification prompt, reply validation
//! and the sequential classification pass.

pub mod category_rules;
pub mod classifier;
pub mod prompt;
pub mod validate;

pub use category_rules::{classify_offline, looks_like_person_name, match_merchant_rules};
pub use classifier::{
    classify_table, CategoryClassifier, ClassificationOutcome, ClassifyError, ClassifyMode,
    Progress, TextGenerator,
};
pub use prompt::render_prompt;
pub use validate::{parse_label, validate_response};
