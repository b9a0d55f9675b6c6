//! Transaction and chunk label handling.
//!
//! The store accepts labels made of ASCII letters, digits, `_` and `-`, at
//! most [`MAX_LABEL_LEN`] characters long.

use crate::error::LabelError;
use model::core::identifiers::{JobId, Label, TaskId};
use uuid::Uuid;

pub const MAX_LABEL_LEN: usize = 128;

/// Longest label a caller may supply. The remainder is kept free for the
/// per-chunk suffix added in auto-commit mode.
pub const MAX_USER_LABEL_LEN: usize = 96;

/// Builds `<prefix><job id>-<uuid>`; characters the store would reject are
/// replaced by `_`.
pub fn generate(prefix: Option<&str>, job_id: &JobId) -> Label {
    let raw = format!(
        "{}{}-{}",
        prefix.unwrap_or_default(),
        job_id.as_str(),
        Uuid::new_v4().simple()
    );
    let mut sanitized: String = raw
        .chars()
        .map(|c| if is_label_char(c) { c } else { '_' })
        .collect();
    sanitized.truncate(MAX_USER_LABEL_LEN);
    Label::new(sanitized)
}

/// Checks a caller-supplied label.
pub fn validate(label: &str) -> Result<Label, LabelError> {
    let invalid = |reason| LabelError::Invalid {
        label: label.to_string(),
        reason,
    };

    if label.is_empty() {
        return Err(invalid("label is empty"));
    }
    if label.len() > MAX_USER_LABEL_LEN {
        return Err(invalid("label is longer than 96 characters"));
    }
    if !label.chars().all(is_label_char) {
        return Err(invalid("only ASCII letters, digits, '_' and '-' are allowed"));
    }
    Ok(Label::new(label))
}

/// Label of one auto-commit chunk: `<base>-t<task>-c<seq>`.
pub fn chunk_label(base: &Label, task_id: TaskId, sequence: u64) -> Label {
    Label::new(format!("{}-t{}-c{}", base.as_str(), task_id, sequence))
}

/// Label of one streaming epoch: `<base>-epoch<N>`.
pub fn epoch_label(base: &Label, epoch: u64) -> Label {
    Label::new(format!("{}-epoch{}", base.as_str(), epoch))
}

fn is_label_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}
