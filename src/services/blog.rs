//! Blog service
//!
//! Typed wrappers over the blog endpoints plus banner lookups through the
//! banner cache.

use serde::Serialize;
use std::sync::Arc;

use super::upload::{ImageUpload, IMAGE_FIELD};
use crate::api::{path_segment, ApiError, ApiRequest, Transport};
use crate::cache::{ObjectUrl, ResourceCache};
use crate::config::UploadConfig;
use crate::models::{Author, Blog, BlogWithContent, CreateBlogInput, UpdateBlogInput};

/// Error types for blog operations
#[derive(Debug, thiserror::Error)]
pub enum BlogServiceError {
    /// Invalid input, rejected before any network call
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SetAuthorsRequest<'a> {
    author_ids: &'a [String],
}

/// Blog service
pub struct BlogService {
    transport: Arc<Transport>,
    banners: Arc<ResourceCache>,
    upload: UploadConfig,
}

impl BlogService {
    pub fn new(transport: Arc<Transport>, banners: Arc<ResourceCache>, upload: UploadConfig) -> Self {
        Self {
            transport,
            banners,
            upload,
        }
    }

    /// All published blogs
    pub async fn list(&self) -> Result<Vec<Blog>, BlogServiceError> {
        Ok(self.transport.get_json("/blogs").await?)
    }

    /// One blog with its content
    pub async fn get(&self, id: &str) -> Result<BlogWithContent, BlogServiceError> {
        Ok(self.transport.get_json(&blog_path(id)).await?)
    }

    /// Blogs the logged-in user is an author of
    pub async fn my_blogs(&self) -> Result<Vec<Blog>, BlogServiceError> {
        Ok(self.transport.get_json("/me/blogs").await?)
    }

    pub async fn create(&self, input: CreateBlogInput) -> Result<Blog, BlogServiceError> {
        if input.title.trim().is_empty() {
            return Err(BlogServiceError::ValidationError(
                "Title cannot be empty".to_string(),
            ));
        }
        let blog: Blog = self.transport.post_json("/blogs", &input).await?;
        tracing::info!("Created blog {}", blog.id);
        Ok(blog)
    }

    pub async fn update(
        &self,
        id: &str,
        input: UpdateBlogInput,
    ) -> Result<BlogWithContent, BlogServiceError> {
        if matches!(input.title.as_deref(), Some(title) if title.trim().is_empty()) {
            return Err(BlogServiceError::ValidationError(
                "Title cannot be empty".to_string(),
            ));
        }
        Ok(self.transport.put_json(&blog_path(id), &input).await?)
    }

    pub async fn delete(&self, id: &str) -> Result<(), BlogServiceError> {
        self.transport.delete(&blog_path(id)).await?;
        self.banners.invalidate(id).await;
        tracing::info!("Deleted blog {}", id);
        Ok(())
    }

    /// Authors of a blog
    pub async fn authors(&self, id: &str) -> Result<Vec<Author>, BlogServiceError> {
        Ok(self
            .transport
            .get_json(&format!("{}/authors", blog_path(id)))
            .await?)
    }

    /// Replace the author list of a blog
    ///
    /// An empty list is rejected before any network call.
    pub async fn set_authors(&self, id: &str, author_ids: &[String]) -> Result<(), BlogServiceError> {
        if author_ids.is_empty() {
            return Err(BlogServiceError::ValidationError(
                "A blog needs at least one author".to_string(),
            ));
        }
        if author_ids.iter().any(|a| a.trim().is_empty()) {
            return Err(BlogServiceError::ValidationError(
                "Author ids cannot be empty".to_string(),
            ));
        }
        self.transport
            .put(
                &format!("{}/authors", blog_path(id)),
                &SetAuthorsRequest { author_ids },
            )
            .await?;
        Ok(())
    }

    /// Banner image of a blog, through the banner cache
    pub async fn banner(&self, id: &str) -> Option<ObjectUrl> {
        self.banners.get_resource(id).await
    }

    /// Replace the banner image of a blog
    pub async fn upload_banner(&self, id: &str, image: ImageUpload) -> Result<(), BlogServiceError> {
        image
            .validate(&self.upload)
            .map_err(BlogServiceError::ValidationError)?;

        let request =
            ApiRequest::put(format!("{}/banner", blog_path(id))).file(image.into_part(IMAGE_FIELD));
        self.transport.send(request).await?;

        self.banners.invalidate(id).await;
        Ok(())
    }
}

fn blog_path(id: &str) -> String {
    format!("/blogs/{}", path_segment(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::ScriptedBackend;
    use crate::api::{ApiResponse, RequestBody};
    use crate::cache::{BlobRegistry, ResourceKind};
    use reqwest::StatusCode;
    use serde_json::json;

    fn service(backend: Arc<ScriptedBackend>) -> BlogService {
        let transport = Arc::new(Transport::new(backend));
        let banners = Arc::new(ResourceCache::new(
            ResourceKind::BlogBanner,
            transport.clone(),
            Arc::new(BlobRegistry::new()),
            100,
        ));
        BlogService::new(transport, banners, UploadConfig::default())
    }

    fn blog_json(id: u64) -> serde_json::Value {
        json!({
            "id": id,
            "title": "Hello",
            "author": "a",
            "description": "first",
            "createdAt": "2024-01-01T00:00:00Z"
        })
    }

    #[tokio::test]
    async fn test_list_and_get() {
        let backend = ScriptedBackend::new();
        backend.respond_json("GET", "/blogs", StatusCode::OK, json!([blog_json(1), blog_json(2)]));
        let mut detail = blog_json(1);
        detail["blogContent"] = json!("# Hello");
        backend.respond_json("GET", "/blogs/1", StatusCode::OK, detail);
        let blogs = service(backend);

        let all = blogs.list().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].id, "2");

        let one = blogs.get("1").await.unwrap();
        assert_eq!(one.blog_content, "# Hello");
    }

    #[tokio::test]
    async fn test_list_rejects_unexpected_shape() {
        let backend = ScriptedBackend::new();
        backend.respond_json("GET", "/blogs", StatusCode::OK, json!({"items": []}));

        let err = service(backend).list().await.unwrap_err();

        assert!(matches!(err, BlogServiceError::Api(ApiError::Decode(_))));
    }

    #[tokio::test]
    async fn test_empty_author_list_never_reaches_backend() {
        let backend = ScriptedBackend::new();
        let blogs = service(backend.clone());

        let err = blogs.set_authors("1", &[]).await.unwrap_err();

        assert!(matches!(err, BlogServiceError::ValidationError(_)));
        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_set_authors_body() {
        let backend = ScriptedBackend::new();
        backend.respond(
            "PUT",
            "/blogs/1/authors",
            ApiResponse::new(StatusCode::NO_CONTENT, Vec::new()),
        );
        let blogs = service(backend.clone());

        blogs
            .set_authors("1", &["a".to_string(), "b".to_string()])
            .await
            .unwrap();

        let request = backend.requests().pop().unwrap();
        assert_eq!(request.body, RequestBody::Json(json!({"authorIds": ["a", "b"]})));
    }

    #[tokio::test]
    async fn test_create_validates_title() {
        let backend = ScriptedBackend::new();
        let blogs = service(backend.clone());

        let input = CreateBlogInput {
            title: " ".to_string(),
            description: String::new(),
            blog_content: String::new(),
        };
        assert!(matches!(
            blogs.create(input).await,
            Err(BlogServiceError::ValidationError(_))
        ));
        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_upload_banner_invalidates_entry() {
        let backend = ScriptedBackend::new();
        backend.respond(
            "GET",
            "/blogs/3/banner",
            ApiResponse::new(StatusCode::OK, vec![1]).with_content_type("image/webp"),
        );
        backend.respond(
            "PUT",
            "/blogs/3/banner",
            ApiResponse::new(StatusCode::NO_CONTENT, Vec::new()),
        );
        let blogs = service(backend.clone());

        assert!(blogs.banner("3").await.is_some());
        assert!(blogs.banner("3").await.is_some());
        blogs
            .upload_banner("3", ImageUpload::new("b.webp", "image/webp", vec![2]))
            .await
            .unwrap();
        assert!(blogs.banner("3").await.is_some());

        assert_eq!(backend.calls("GET", "/blogs/3/banner"), 2);
    }

    #[tokio::test]
    async fn test_upload_banner_rejects_type() {
        let backend = ScriptedBackend::new();
        let blogs = service(backend.clone());

        let err = blogs
            .upload_banner("3", ImageUpload::new("b.txt", "text/plain", vec![2]))
            .await
            .unwrap_err();

        assert!(matches!(err, BlogServiceError::ValidationError(_)));
        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_banner_is_none() {
        let backend = ScriptedBackend::new();
        let blogs = service(backend.clone());

        assert_eq!(blogs.banner("4").await, None);
        assert_eq!(blogs.banner("4").await, None);
        assert_eq!(backend.calls("GET", "/blogs/4/banner"), 1);
    }
}
