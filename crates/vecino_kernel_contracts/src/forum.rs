#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use crate::common::{validate_http_url, validate_id, validate_text};
use crate::{ContractViolation, Validate};

pub const POST_TITLE_MAX_CHARS: usize = 200;
pub const POST_CONTENT_MAX_CHARS: usize = 10_000;
pub const COMMENT_MAX_CHARS: usize = 1_000;
pub const TAGS_MAX_CHARS: usize = 255;
pub const ALL_CATEGORIES_TOKEN: &str = "TODAS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PostId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommentId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PostCategory {
    Question,
    Opinion,
    Recommendation,
    News,
    General,
}

impl PostCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Question => "DUDA",
            Self::Opinion => "OPINION",
            Self::Recommendation => "RECOMENDACION",
            Self::News => "NOTICIA",
            Self::General => "GENERAL",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Question => "Duda / Pregunta",
            Self::Opinion => "Opinión / Debate",
            Self::Recommendation => "Recomendación",
            Self::News => "Noticia del Sector",
            Self::General => "General",
        }
    }

    pub const fn all() -> &'static [Self] {
        &[
            Self::Question,
            Self::Opinion,
            Self::Recommendation,
            Self::News,
            Self::General,
        ]
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_uppercase();
        Self::all()
            .iter()
            .copied()
            .find(|c| c.as_str() == normalized)
    }
}

impl Default for PostCategory {
    fn default() -> Self {
        Self::General
    }
}

/// Feed filter. An empty selection or the `TODAS` token selects every category.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CategoryFilter {
    selected: BTreeSet<PostCategory>,
}

impl CategoryFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn parse<'a>(raw: impl IntoIterator<Item = &'a str>) -> Result<Self, ContractViolation> {
        let mut selected = BTreeSet::new();
        for token in raw {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            if token.eq_ignore_ascii_case(ALL_CATEGORIES_TOKEN) {
                return Ok(Self::all());
            }
            let category = PostCategory::parse(token).ok_or(ContractViolation::InvalidValue {
                field: "category_filter",
                reason: "unknown post category",
            })?;
            selected.insert(category);
        }
        Ok(Self { selected })
    }

    pub fn is_all(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn matches(&self, category: PostCategory) -> bool {
        self.is_all() || self.selected.contains(&category)
    }

    /// Echo of the active selection for rendering; `["TODAS"]` when unfiltered.
    pub fn selected_codes(&self) -> Vec<&'static str> {
        if self.is_all() {
            return vec![ALL_CATEGORIES_TOKEN];
        }
        self.selected.iter().map(|c| c.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PostTags {
    pub mentions: BTreeSet<String>,
    pub hashtags: BTreeSet<String>,
    pub raw: String,
}

impl PostTags {
    /// Comma separated `@usuario` mentions and `#hashtag` topics. Bare words are hashtags.
    pub fn parse(raw: &str) -> Result<Self, ContractViolation> {
        if raw.chars().count() > TAGS_MAX_CHARS {
            return Err(ContractViolation::InvalidValue {
                field: "post_draft.tags",
                reason: "must be <= 255 chars",
            });
        }
        let mut tags = Self {
            raw: raw.trim().to_string(),
            ..Self::default()
        };
        for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            if let Some(name) = token.strip_prefix('@') {
                if !name.is_empty() {
                    tags.mentions.insert(name.to_string());
                }
            } else {
                let topic = token.trim_start_matches('#');
                if !topic.is_empty() {
                    tags.hashtags.insert(topic.to_lowercase());
                }
            }
        }
        Ok(tags)
    }
}

/// Where a post's image comes from. A post has at most one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostAttachment {
    ExternalLink(String),
    Uploaded { file_name: String },
}

impl PostAttachment {
    pub fn from_form(
        url_link: Option<String>,
        uploaded_file_name: Option<String>,
    ) -> Result<Option<Self>, ContractViolation> {
        match (url_link, uploaded_file_name) {
            (Some(_), Some(_)) => Err(ContractViolation::InvalidValue {
                field: "post_draft.attachment",
                reason: "provide either an uploaded file or a link, not both",
            }),
            (Some(url), None) => Ok(Some(Self::ExternalLink(url))),
            (None, Some(file_name)) => Ok(Some(Self::Uploaded { file_name })),
            (None, None) => Ok(None),
        }
    }

    /// Public URL stored on the post.
    pub fn public_url(&self) -> String {
        match self {
            Self::ExternalLink(url) => url.clone(),
            Self::Uploaded { file_name } => format!("/media/posts/{file_name}"),
        }
    }
}

impl Validate for PostAttachment {
    fn validate(&self) -> Result<(), ContractViolation> {
        match self {
            Self::ExternalLink(url) => validate_http_url("post_draft.url_link", url),
            Self::Uploaded { file_name } => {
                validate_id("post_draft.uploaded_file_name", file_name, 120)?;
                if file_name.contains('/') || file_name.contains('\\') || file_name.starts_with('.')
                {
                    return Err(ContractViolation::InvalidValue {
                        field: "post_draft.uploaded_file_name",
                        reason: "must be a bare file name",
                    });
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
    pub category: PostCategory,
    pub attachment: Option<PostAttachment>,
    pub tags: PostTags,
}

impl Validate for PostDraft {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_text("post_draft.title", &self.title, POST_TITLE_MAX_CHARS)?;
        validate_text("post_draft.content", &self.content, POST_CONTENT_MAX_CHARS)?;
        if let Some(a) = &self.attachment {
            a.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentDraft {
    pub content: String,
}

impl Validate for CommentDraft {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_text("comment_draft.content", &self.content, COMMENT_MAX_CHARS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_forum_contract_01_filter_all_token_wins() {
        let f = CategoryFilter::parse(["DUDA", "TODAS"]).unwrap();
        assert!(f.is_all());
        assert_eq!(f.selected_codes(), vec!["TODAS"]);

        let f = CategoryFilter::parse(["duda", "noticia"]).unwrap();
        assert!(f.matches(PostCategory::Question));
        assert!(!f.matches(PostCategory::General));
        assert_eq!(f.selected_codes(), vec!["DUDA", "NOTICIA"]);

        assert!(CategoryFilter::parse(["CHISMES"]).is_err());
    }

    #[test]
    fn at_forum_contract_02_attachment_is_exclusive() {
        let both = PostAttachment::from_form(
            Some("https://example.cl/a.png".to_string()),
            Some("a.png".to_string()),
        );
        assert!(both.is_err());
        let uploaded = PostAttachment::from_form(None, Some("flyer.png".to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(uploaded.public_url(), "/media/posts/flyer.png");
        assert!(PostAttachment::Uploaded {
            file_name: "../etc/passwd".to_string()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn at_forum_contract_03_tags_split_mentions_and_hashtags() {
        let tags = PostTags::parse("@JuanPerez, #Marketing, ventas, @").unwrap();
        assert!(tags.mentions.contains("JuanPerez"));
        assert!(tags.hashtags.contains("marketing"));
        assert!(tags.hashtags.contains("ventas"));
        assert_eq!(tags.mentions.len(), 1);
    }

    #[test]
    fn at_forum_contract_04_draft_title_limit() {
        let draft = PostDraft {
            title: "t".repeat(201),
            content: "contenido".to_string(),
            category: PostCategory::default(),
            attachment: None,
            tags: PostTags::default(),
        };
        assert!(draft.validate().is_err());
    }
}
