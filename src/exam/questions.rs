// src/exam/questions.rs

use sqlx::SqliteExecutor;

use crate::models::question::Question;

/// Category name with the number of questions authored for it.
#[derive(Debug, sqlx::FromRow)]
pub struct CategoryCount {
    pub category: String,
    pub question_count: i64,
}

/// Questions of a category in presentation order: grouped by sub-category,
/// then in authoring order.
pub async fn fetch_questions<'e>(
    executor: impl SqliteExecutor<'e>,
    category: &str,
) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(
        r#"
        SELECT id, category, sub_category, content, image_url, options, answer
        FROM questions
        WHERE category = ?
        ORDER BY sub_category, id
        "#,
    )
    .bind(category)
    .fetch_all(executor)
    .await
}

pub async fn fetch_categories<'e>(
    executor: impl SqliteExecutor<'e>,
) -> Result<Vec<CategoryCount>, sqlx::Error> {
    sqlx::query_as::<_, CategoryCount>(
        r#"
        SELECT category, COUNT(*) AS question_count
        FROM questions
        GROUP BY category
        ORDER BY category
        "#,
    )
    .fetch_all(executor)
    .await
}
