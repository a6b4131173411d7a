use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    pub id: Option<i64>,
    /// Source label shown in notifications
    pub name: String,
    pub url: String,
    pub created_at: Option<String>,
}

impl Feed {
    pub fn new(name: String, url: String) -> Self {
        Self {
            id: None,
            name,
            url,
            created_at: None,
        }
    }
}

/// A destination the dispatcher sends to: a chat id or an `@channel` username.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliveryTarget(String);

impl DeliveryTarget {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse a comma-separated target list, ignoring blanks and repeats
    pub fn parse_list(value: &str) -> Vec<DeliveryTarget> {
        let mut targets: Vec<DeliveryTarget> = Vec::new();
        for id in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let target = DeliveryTarget::new(id);
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
        targets
    }
}

impl std::fmt::Display for DeliveryTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target_list() {
        let targets = DeliveryTarget::parse_list(" @eobr_news, -1001234 ,,@eobr_news");
        assert_eq!(
            targets,
            vec![
                DeliveryTarget::new("@eobr_news"),
                DeliveryTarget::new("-1001234")
            ]
        );
    }

    #[test]
    fn test_parse_empty_target_list() {
        assert!(DeliveryTarget::parse_list("  ").is_empty());
    }
}
