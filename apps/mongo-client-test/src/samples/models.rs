use mongodb::bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

/// A placeholder record, `{ name: "Sample-<i>", createdAt: <date> }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime,
}

impl Sample {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            created_at: DateTime::now(),
        }
    }

    /// `count` samples named `Sample-0` .. `Sample-<count - 1>`
    pub fn placeholders(count: usize) -> Vec<Self> {
        (0..count).map(|i| Self::new(format!("Sample-{i}"))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{Bson, to_document};

    #[test]
    fn test_placeholders_are_numbered_from_zero() {
        let names: Vec<_> = Sample::placeholders(3).into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["Sample-0", "Sample-1", "Sample-2"]);
    }

    #[test]
    fn test_serializes_created_at_as_bson_date() {
        let doc = to_document(&Sample::new("Sample-0")).unwrap();
        assert!(!doc.contains_key("_id"));
        assert_eq!(doc.get_str("name").unwrap(), "Sample-0");
        assert!(matches!(doc.get("createdAt"), Some(Bson::DateTime(_))));
    }
}
