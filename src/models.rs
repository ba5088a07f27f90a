//! Data model for one search result.
//!
//! A [`NewsRecord`] is filled in by the extractor from a result card and is
//! read-only afterwards. It keeps no reference to the page it came from.

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::utils::{contains_money_value, count_occurrences};

pub const TITLE_NOT_FOUND: &str = "Post without Title";
pub const DESCRIPTION_NOT_FOUND: &str = "Post without description";
pub const IMAGE_NOT_FOUND: &str = "Image Not Found";
pub const IMAGE_EXTENSION: &str = "webp";

/// Column order of the tabular dump.
pub const COLUMNS: [&str; 8] = [
    "id",
    "title",
    "description",
    "post_datetime",
    "image_filename",
    "image_url",
    "contains_money_value",
    "search_phrase_occurrences",
];

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One article pulled from the search results.
#[derive(Debug, Clone, PartialEq)]
pub struct NewsRecord {
    /// Assigned once at construction.
    pub id: Uuid,
    pub title: String,
    pub description: String,
    /// Local publication time; `None` when the card carries no timestamp.
    pub post_datetime: Option<NaiveDateTime>,
    pub image_url: Option<String>,
    pub image_filename: String,
    pub contains_money_value: bool,
    pub search_phrase_occurrences: usize,
}

impl NewsRecord {
    /// Build a record from its resolved fields and derive the rest.
    ///
    /// The image filename, money flag and phrase count are computed here,
    /// after the id exists and the text fields are final.
    pub fn new(
        title: String,
        description: String,
        post_datetime: Option<NaiveDateTime>,
        image_url: Option<String>,
        search_phrase: &str,
    ) -> Self {
        let id = Uuid::new_v4();
        let image_filename = match image_url {
            Some(_) => format!("{id}.{IMAGE_EXTENSION}"),
            None => IMAGE_NOT_FOUND.to_string(),
        };
        let text = format!("{title} {description}");

        Self {
            id,
            contains_money_value: contains_money_value(&text),
            search_phrase_occurrences: count_occurrences(search_phrase, &text),
            title,
            description,
            post_datetime,
            image_url,
            image_filename,
        }
    }

    pub fn has_image(&self) -> bool {
        self.image_url.is_some()
    }

    /// Flatten into `(column, value)` pairs in [`COLUMNS`] order.
    pub fn to_row(&self) -> Vec<(String, String)> {
        let values = [
            self.id.to_string(),
            self.title.clone(),
            self.description.clone(),
            self.post_datetime
                .map(|dt| dt.format(DATETIME_FORMAT).to_string())
                .unwrap_or_default(),
            self.image_filename.clone(),
            self.image_url.clone().unwrap_or_default(),
            self.contains_money_value.to_string(),
            self.search_phrase_occurrences.to_string(),
        ];
        COLUMNS
            .iter()
            .map(|c| c.to_string())
            .zip(values)
            .collect()
    }
}
