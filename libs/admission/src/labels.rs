use std::fmt::{self, Write};

use serde::{Deserialize, Serialize};

pub const METRIC_NAME_LABEL: &str = "__name__";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub value: String,
}

impl Label {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Identity of a series: labels kept sorted by name, then value.
///
/// Duplicate names are preserved so ingestion can reject them; they end up
/// adjacent after sorting.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<Label>", into = "Vec<Label>")]
pub struct LabelSet {
    labels: Vec<Label>,
}

impl LabelSet {
    pub fn new(mut labels: Vec<Label>) -> Self {
        labels.sort();
        Self { labels }
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        pairs.into_iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.labels.iter()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|label| label.name == name)
            .map(|label| label.value.as_str())
    }

    pub fn metric_name(&self) -> Option<&str> {
        self.get(METRIC_NAME_LABEL)
    }

    /// First label name that appears more than once.
    pub fn duplicate_name(&self) -> Option<&str> {
        self.labels
            .windows(2)
            .find(|pair| pair[0].name == pair[1].name)
            .map(|pair| pair[0].name.as_str())
    }
}

impl<K, V> FromIterator<(K, V)> for LabelSet
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(name, value)| Label::new(name, value))
                .collect(),
        )
    }
}

impl From<Vec<Label>> for LabelSet {
    fn from(labels: Vec<Label>) -> Self {
        Self::new(labels)
    }
}

impl From<LabelSet> for Vec<Label> {
    fn from(set: LabelSet) -> Self {
        set.labels
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char('{')?;
        for (idx, label) in self.labels.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            f.write_str(&label.name)?;
            f.write_char('=')?;
            write_quoted(f, &label.value)?;
        }
        f.write_char('}')
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    f.write_char('"')?;
    for ch in value.chars() {
        match ch {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if c.is_control() && (c as u32) < 0x80 => write!(f, "\\x{:02x}", c as u32)?,
            c if c.is_control() => write!(f, "\\u{:04x}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    f.write_char('"')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_canonical_form_sorted_by_name() {
        let labels = LabelSet::from_pairs([("job", "node"), ("__name__", "up")]);
        assert_eq!(labels.to_string(), r#"{__name__="up", job="node"}"#);
    }

    #[test]
    fn empty_set_renders_braces() {
        assert_eq!(LabelSet::default().to_string(), "{}");
        assert!(LabelSet::default().is_empty());
    }

    #[test]
    fn escapes_quotes_and_control_characters() {
        let labels = LabelSet::from_pairs([("path", "a\"b\\c\nd")]);
        assert_eq!(labels.to_string(), r#"{path="a\"b\\c\nd"}"#);
    }

    #[test]
    fn detects_duplicate_names() {
        let labels = LabelSet::from_pairs([("job", "a"), ("instance", "x"), ("job", "b")]);
        assert_eq!(labels.duplicate_name(), Some("job"));
        assert_eq!(labels.len(), 3);

        let unique = LabelSet::from_pairs([("job", "a"), ("instance", "x")]);
        assert_eq!(unique.duplicate_name(), None);
    }

    #[test]
    fn deserializes_from_label_list() {
        let labels: LabelSet = serde_json::from_str(
            r#"[{"name":"job","value":"node"},{"name":"__name__","value":"up"}]"#,
        )
        .expect("labels should parse");
        assert_eq!(labels.metric_name(), Some("up"));
        assert_eq!(labels.get("job"), Some("node"));
        assert_eq!(labels.get("missing"), None);
    }
}
