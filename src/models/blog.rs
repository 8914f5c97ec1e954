//! Blog model
//!
//! This module provides:
//! - `Blog` summary as listed by the API
//! - `BlogWithContent` for the detail view
//! - `Author` as attached to a blog
//! - Input types for creating and updating blogs

use serde::{Deserialize, Serialize};

use super::deserialize_id;

/// Blog summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blog {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub title: String,
    pub author: String,
    pub description: String,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Blog with its markdown body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogWithContent {
    #[serde(flatten)]
    pub blog: Blog,
    pub blog_content: String,
}

/// Author attached to a blog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Input for creating a blog
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBlogInput {
    pub title: String,
    pub description: String,
    pub blog_content: String,
}

/// Input for updating a blog; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBlogInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blog_content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blog_with_content_flattens_summary() {
        let blog: BlogWithContent = serde_json::from_str(
            r##"{
                "id": 7,
                "title": "Hello",
                "author": "a",
                "description": "first post",
                "createdAt": "2024-01-01T00:00:00Z",
                "blogContent": "# Hello"
            }"##,
        )
        .unwrap();

        assert_eq!(blog.blog.id, "7");
        assert_eq!(blog.blog.updated_at, None);
        assert_eq!(blog.blog_content, "# Hello");
    }

    #[test]
    fn test_update_input_skips_unset_fields() {
        let input = UpdateBlogInput {
            title: Some("New".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json, serde_json::json!({"title": "New"}));
    }
}
