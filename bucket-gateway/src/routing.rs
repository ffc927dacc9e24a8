//! Request routing decisions: which category an upload belongs to, which read operation a
//! GET maps to, and the object keys built from them.
//!
//! Every upload lands under `{code}/{category}/{object_name}`. The category is chosen by
//! header presence, consulted in the fixed order of [`Category::PRIORITY`]; the first
//! truthy header wins, so a request carrying both `logo` and `pdf` is a logo upload.

use std::{borrow::Cow, fmt};

use axum::http::HeaderMap;

/// Logical sub-folder of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Gallery,
    Logo,
    Users,
    Materials,
    Workers,
    Standards,
    BadStandards,
    Pdf,
    ProjectImages,
    BeforeWorks,
}

impl Category {
    /// Categories in the order their headers are consulted.
    pub const PRIORITY: [Category; 10] = [
        Category::Gallery,
        Category::Logo,
        Category::Users,
        Category::Materials,
        Category::Workers,
        Category::Standards,
        Category::BadStandards,
        Category::Pdf,
        Category::ProjectImages,
        Category::BeforeWorks,
    ];

    /// Path segment used in object keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Gallery => "gallery",
            Category::Logo => "logo",
            Category::Users => "users",
            Category::Materials => "materials",
            Category::Workers => "workers",
            Category::Standards => "standards",
            Category::BadStandards => "badStandards",
            Category::Pdf => "pdf",
            Category::ProjectImages => "projectImages",
            Category::BeforeWorks => "beforeWorks",
        }
    }

    /// Request header that selects this category.
    ///
    /// Header names are case-insensitive on the wire and stored lowercased by `http`.
    pub fn header_name(&self) -> &'static str {
        match self {
            Category::BadStandards => "badstandards",
            Category::ProjectImages => "projectimages",
            Category::BeforeWorks => "beforeworks",
            other => other.as_str(),
        }
    }

    /// First category, in priority order, whose header is truthy.
    pub fn from_headers(headers: &HeaderMap) -> Option<Category> {
        Self::PRIORITY
            .into_iter()
            .find(|category| is_truthy(headers, category.header_name()))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation a GET request maps to, decided by the object name's prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadTarget {
    /// Presign the object name itself. The caller's `code` plays no part in the key.
    Standards,
    /// List the caller's gallery.
    Gallery,
}

impl ReadTarget {
    pub fn for_object(object_name: &str) -> Option<ReadTarget> {
        if object_name.starts_with("standards") {
            Some(ReadTarget::Standards)
        } else if object_name.starts_with("gallery") {
            Some(ReadTarget::Gallery)
        } else {
            None
        }
    }
}

/// A header is truthy when present with a non-empty value.
pub fn is_truthy(headers: &HeaderMap, name: &str) -> bool {
    headers.get(name).is_some_and(|value| !value.is_empty())
}

/// Value of a truthy header as text. Bytes that are not UTF-8 become U+FFFD.
pub fn header_text<'a>(headers: &'a HeaderMap, name: &str) -> Option<Cow<'a, str>> {
    headers
        .get(name)
        .filter(|value| !value.is_empty())
        .map(|value| String::from_utf8_lossy(value.as_bytes()))
}

/// Key an upload is written to. `code` and `object_name` are used verbatim.
pub fn upload_key(code: &str, category: Category, object_name: &str) -> String {
    format!("{code}/{category}/{object_name}")
}

/// Listing prefix of a caller's gallery.
pub fn gallery_prefix(code: &str) -> String {
    format!("{code}/gallery/")
}
