use chrono::{DateTime, Utc};

use crate::ids::{ImageId, PostId};

/// A blog post as returned by the backend.
///
/// The backend owns posts; the client only holds short-lived copies of them,
/// either fresh from a response or from the session's post list cache.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(rename_all = "camelCase", try_from = "wire::PostDocument")
)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    /// Rich markup produced by the editor. Opaque to the pipeline.
    pub content: String,
    pub banner_image_id: Option<ImageId>,
    pub author: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(feature = "serde")]
mod wire {
    use chrono::{DateTime, Utc};

    use super::Post;
    use crate::error::ModelError;
    use crate::ids::{ImageId, PostId};

    /// A post as the backend sends it. Document stores emit `_id`, sometimes
    /// next to a virtual `id`; either one is enough and both may be present.
    /// The banner likewise arrives as `bannerImageId`, `bannerId` or both.
    #[derive(serde::Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct PostDocument {
        #[serde(default)]
        id: Option<PostId>,
        #[serde(default, rename = "_id")]
        document_id: Option<PostId>,
        title: String,
        content: String,
        #[serde(default)]
        banner_image_id: Option<ImageId>,
        #[serde(default)]
        banner_id: Option<ImageId>,
        #[serde(default)]
        author: String,
        created_at: DateTime<Utc>,
    }

    impl TryFrom<PostDocument> for Post {
        type Error = ModelError;

        fn try_from(doc: PostDocument) -> Result<Self, Self::Error> {
            let id = doc
                .document_id
                .or(doc.id)
                .ok_or(ModelError::EmptyIdentifier("post"))?;
            Ok(Post {
                id,
                title: doc.title,
                content: doc.content,
                banner_image_id: doc.banner_image_id.or(doc.banner_id),
                author: doc.author,
                created_at: doc.created_at,
            })
        }
    }
}

/// Body of `POST /blogs` and `PUT /blogs/:id`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct PostPayload {
    pub title: String,
    pub content: String,
    pub author: String,
    pub banner_id: Option<ImageId>,
}

impl PostPayload {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            author: author.into(),
            banner_id: None,
        }
    }

    pub fn with_banner(mut self, banner_id: Option<ImageId>) -> Self {
        self.banner_id = banner_id;
        self
    }
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;

    #[test]
    fn post_accepts_backend_document_shape() {
        let raw = r#"{
            "_id": "65f1aa",
            "title": "Hello",
            "content": "<p>hi</p>",
            "bannerImageId": "img-1",
            "author": "Team",
            "createdAt": "2024-03-01T10:00:00Z"
        }"#;
        let post: Post = serde_json::from_str(raw).unwrap();
        assert_eq!(post.id.as_str(), "65f1aa");
        assert_eq!(
            post.banner_image_id.as_ref().map(ImageId::as_str),
            Some("img-1")
        );
    }

    #[test]
    fn document_id_and_virtual_id_together_decode() {
        let raw = r#"{
            "_id": "65f1aa",
            "id": "65f1aa",
            "title": "Hello",
            "content": "<p>hi</p>",
            "createdAt": "2024-03-01T10:00:00Z"
        }"#;
        let post: Post = serde_json::from_str(raw).unwrap();
        assert_eq!(post.id.as_str(), "65f1aa");

        let list = format!("[{raw}, {raw}]");
        assert_eq!(serde_json::from_str::<Vec<Post>>(&list).unwrap().len(), 2);
    }

    #[test]
    fn both_banner_spellings_together_decode() {
        let raw = r#"{
            "_id": "p1",
            "title": "t",
            "content": "c",
            "bannerImageId": "img-1",
            "bannerId": "img-1",
            "createdAt": "2024-03-01T10:00:00Z"
        }"#;
        let post: Post = serde_json::from_str(raw).unwrap();
        assert_eq!(post.banner_image_id.unwrap().as_str(), "img-1");

        let legacy = raw.replace(r#""bannerImageId": "img-1","#, "");
        let post: Post = serde_json::from_str(&legacy).unwrap();
        assert_eq!(post.banner_image_id.unwrap().as_str(), "img-1");
    }

    #[test]
    fn post_without_any_id_is_rejected() {
        let raw = r#"{
            "title": "t",
            "content": "c",
            "createdAt": "2024-03-01T10:00:00Z"
        }"#;
        assert!(serde_json::from_str::<Post>(raw).is_err());
    }

    #[test]
    fn serialized_posts_decode_again() {
        let raw = r#"{
            "_id": "p9",
            "title": "t",
            "content": "c",
            "bannerImageId": "img-2",
            "createdAt": "2024-03-01T10:00:00Z"
        }"#;
        let post: Post = serde_json::from_str(raw).unwrap();
        let stored = serde_json::to_string(&post).unwrap();
        assert!(stored.contains(r#""id":"p9""#));
        assert_eq!(serde_json::from_str::<Post>(&stored).unwrap(), post);
    }

    #[test]
    fn missing_banner_and_author_default() {
        let raw = r#"{
            "id": "p1",
            "title": "t",
            "content": "c",
            "createdAt": "2024-03-01T10:00:00Z"
        }"#;
        let post: Post = serde_json::from_str(raw).unwrap();
        assert!(post.banner_image_id.is_none());
        assert!(post.author.is_empty());
    }

    #[test]
    fn payload_sends_banner_id_even_when_empty() {
        let payload = PostPayload::new("t", "c", "a");
        let value = serde_json::to_value(&payload).unwrap();
        assert!(value.get("bannerId").is_some_and(|v| v.is_null()));

        let with = payload.with_banner(Some(ImageId::new("f1").unwrap()));
        let value = serde_json::to_value(&with).unwrap();
        assert_eq!(value["bannerId"], "f1");
    }
}
