use crate::error::ModelError;

/// Opaque, server-assigned identifiers.
///
/// The backend owns identifier allocation for both posts and stored images;
/// the client only carries them around. Construction rejects empty strings so
/// an id in hand always names something on the server.
macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
        pub struct $name(String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Result<Self, ModelError> {
                let raw = raw.into();
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return Err(ModelError::EmptyIdentifier($kind));
                }
                if trimmed.len() == raw.len() {
                    Ok(Self(raw))
                } else {
                    Ok(Self(trimmed.to_string()))
                }
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ModelError;

            fn try_from(raw: String) -> Result<Self, Self::Error> {
                Self::new(raw)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = ModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }
    };
}

opaque_id!(
    /// Identifier of a blog post.
    PostId,
    "post"
);

opaque_id!(
    /// Identifier of an image held by the backend's image store.
    ImageId,
    "image"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_blank_ids_are_rejected() {
        assert_eq!(
            PostId::new(""),
            Err(ModelError::EmptyIdentifier("post"))
        );
        assert_eq!(
            ImageId::new("   "),
            Err(ModelError::EmptyIdentifier("image"))
        );
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        let id: ImageId = " 65f1c0ffee ".parse().unwrap();
        assert_eq!(id.as_str(), "65f1c0ffee");
        assert_eq!(id.to_string(), "65f1c0ffee");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = PostId::new("abc123").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc123\"");
        let back: PostId = serde_json::from_str("\"abc123\"").unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<PostId>("\"\"").is_err());
    }
}
