// src/models/question.rs

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use url::Url;
use validator::Validate;

use crate::config::{MAX_OPTIONS, MIN_OPTIONS};

static CATEGORY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}\p{N}][\p{L}\p{N} _.\-]{0,59}$").unwrap());

/// One selectable option of a question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionOption {
    pub text: String,
    pub image_url: Option<String>,
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    /// Exam category the question belongs to (e.g., "Math").
    pub category: String,

    /// Section heading inside the exam. Questions are presented grouped by it.
    pub sub_category: String,

    /// The text content of the question.
    pub content: String,

    pub image_url: Option<String>,

    /// Ordered list of 2-5 options, stored as a JSON array in the database.
    pub options: Json<Vec<QuestionOption>>,

    /// The correct option text. Compared verbatim when scoring.
    pub answer: String,
}

/// DTO for sending question to a student (excludes answer).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub sub_category: String,
    pub content: String,
    pub image_url: Option<String>,
    pub options: Vec<QuestionOption>,
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        Self {
            id: q.id,
            sub_category: q.sub_category,
            content: q.content,
            image_url: q.image_url,
            options: q.options.0,
        }
    }
}

/// DTO for creating a new question.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(custom(function = validate_category))]
    pub category: String,
    #[validate(length(min = 1, max = 60))]
    pub sub_category: Option<String>,
    #[validate(length(min = 1, max = 5000))]
    pub content: String,
    #[validate(length(max = 500), custom(function = validate_url_string))]
    pub image_url: Option<String>,
    #[validate(custom(function = validate_options))]
    pub options: Vec<QuestionOption>,
    #[validate(length(min = 1, max = 500))]
    pub answer: String,
}

impl CreateQuestionRequest {
    /// The answer key must be the text of one of the options,
    /// otherwise no student could ever score on the question.
    pub fn answer_matches_option(&self) -> bool {
        self.options.iter().any(|o| o.text == self.answer)
    }
}

/// Validates a category name used as a key across questions, schedules and results.
pub fn validate_category(category: &str) -> Result<(), validator::ValidationError> {
    if !CATEGORY_PATTERN.is_match(category) {
        return Err(validator::ValidationError::new("invalid_category"));
    }
    Ok(())
}

fn validate_url_string(url: &str) -> Result<(), validator::ValidationError> {
    if Url::parse(url).is_err() {
        return Err(validator::ValidationError::new("invalid_url"));
    }
    Ok(())
}

fn validate_options(options: &[QuestionOption]) -> Result<(), validator::ValidationError> {
    if options.len() < MIN_OPTIONS || options.len() > MAX_OPTIONS {
        return Err(validator::ValidationError::new("options_count_out_of_range"));
    }
    for opt in options {
        if opt.text.trim().is_empty() {
            return Err(validator::ValidationError::new("option_cannot_be_empty"));
        }
        if opt.text.len() > 500 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
        if let Some(url) = &opt.image_url {
            if Url::parse(url).is_err() {
                return Err(validator::ValidationError::new("invalid_url"));
            }
        }
    }
    for (i, opt) in options.iter().enumerate() {
        if options[..i].iter().any(|o| o.text == opt.text) {
            return Err(validator::ValidationError::new("duplicate_option"));
        }
    }
    Ok(())
}
