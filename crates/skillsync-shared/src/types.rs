use serde::{Deserialize, Serialize};

/// The verified identity of the caller for the duration of one request.
///
/// Built from a session token's claims and passed explicitly into every
/// directory and message-log operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: String,
    pub email: String,
    pub display_name: String,
}

impl Principal {
    pub fn new(
        id: impl Into<String>,
        email: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            display_name: display_name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    /// Exactly two participants, deduplicated on creation.
    Individual,
    /// One or more participants, never deduplicated.
    Group,
}

impl ConversationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Individual => "individual",
            Self::Group => "group",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "individual" => Some(Self::Individual),
            "group" => Some(Self::Group),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConversationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_its_own_string_form() {
        for kind in [ConversationKind::Individual, ConversationKind::Group] {
            assert_eq!(ConversationKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ConversationKind::parse("channel"), None);
    }

    #[test]
    fn kind_serializes_lowercase() {
        let json = serde_json::to_string(&ConversationKind::Individual).unwrap();
        assert_eq!(json, "\"individual\"");
    }

    #[test]
    fn principal_uses_camel_case() {
        let p = Principal::new("u1", "a@x.com", "Alice");
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["displayName"], "Alice");
    }
}
