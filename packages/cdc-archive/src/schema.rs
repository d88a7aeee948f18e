use serde::Serialize;

/// Logical record type attached to every archived object and used as a partition segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Schema {
    User,
    Post,
    Comment,
    Unknown,
}

impl Schema {
    pub fn as_str(&self) -> &'static str {
        match self {
            Schema::User => "user",
            Schema::Post => "post",
            Schema::Comment => "comment",
            Schema::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Match a record to its schema. First matching rule wins; never fails.
///
/// `sk` does not take part in any rule yet.
pub fn classify(source: &str, pk: &str, _sk: &str) -> Schema {
    if source == "users" {
        return Schema::User;
    }

    if source == "blog" {
        let pk = pk.to_lowercase();
        if pk.starts_with("post") {
            return Schema::Post;
        }
        if pk.starts_with("comment") {
            return Schema::Comment;
        }
    }

    Schema::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_rules() {
        assert_eq!(classify("users", "USER#123", "-"), Schema::User);
        assert_eq!(classify("blog", "POST#1", "-"), Schema::Post);
        assert_eq!(classify("blog", "Comment#9", "-"), Schema::Comment);
        assert_eq!(classify("blog", "Thing#1", "-"), Schema::Unknown);
    }

    #[test]
    fn test_users_source_ignores_pk() {
        assert_eq!(classify("users", "POST#1", "META"), Schema::User);
        assert_eq!(classify("users", "", ""), Schema::User);
    }

    #[test]
    fn test_prefix_rules_only_apply_to_blog() {
        assert_eq!(classify("news", "POST#1", "META"), Schema::Unknown);
        assert_eq!(classify("Blog", "POST#1", "META"), Schema::Unknown);
        assert_eq!(classify("", "", ""), Schema::Unknown);
    }

    #[test]
    fn test_labels() {
        assert_eq!(Schema::Comment.to_string(), "comment");
        assert_eq!(serde_json::to_value(Schema::Unknown).unwrap(), "unknown");
    }
}
