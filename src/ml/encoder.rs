use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Maps categorical strings to dense integer codes. Classes are sorted
/// lexicographically, so the code of a value is its rank among all values
/// seen at fit time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let classes: BTreeSet<&str> = values.into_iter().collect();
        Self {
            classes: classes.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Code for `value`, or `None` if it was not seen at fit time.
    pub fn transform(&self, value: &str) -> Option<usize> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(value))
            .ok()
    }

    /// Code for `value`, falling back to 0 for unseen values.
    pub fn transform_or_default(&self, value: &str) -> usize {
        match self.transform(value) {
            Some(code) => code,
            None => {
                tracing::debug!(value, "Unseen category encoded as 0");
                0
            }
        }
    }
}
