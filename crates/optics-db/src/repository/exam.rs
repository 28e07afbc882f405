//! # Eye Exam Repository
//!
//! Refraction history per customer, newest exam first.

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;

use optics_core::customer::EyeExam;
use optics_core::validation::{optional_text, validate_axis};

use super::new_id;
use crate::error::{not_found, DbResult};

const EXAM_COLUMNS: &str = r#"
    id, customer_id, exam_date,
    right_sphere, right_cylinder, right_axis, right_add, right_pd,
    left_sphere, left_cylinder, left_axis, left_add, left_pd,
    notes, created_at
"#;

/// Exam form. The single `pd` is written to both eyes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EyeExamInput {
    #[serde(default)]
    pub exam_date: Option<NaiveDate>,
    #[serde(default)]
    pub right_sphere: Option<f64>,
    #[serde(default)]
    pub right_cylinder: Option<f64>,
    #[serde(default)]
    pub right_axis: Option<i64>,
    #[serde(default)]
    pub right_add: Option<f64>,
    #[serde(default)]
    pub left_sphere: Option<f64>,
    #[serde(default)]
    pub left_cylinder: Option<f64>,
    #[serde(default)]
    pub left_axis: Option<i64>,
    #[serde(default)]
    pub left_add: Option<f64>,
    #[serde(default)]
    pub pd: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl EyeExamInput {
    fn validate(&self) -> DbResult<Option<String>> {
        validate_axis("right_axis", self.right_axis)?;
        validate_axis("left_axis", self.left_axis)?;
        Ok(optional_text("notes", self.notes.as_deref(), 2000)?)
    }
}

/// Repository for eye exam database operations.
#[derive(Debug, Clone)]
pub struct EyeExamRepository {
    pool: SqlitePool,
}

impl EyeExamRepository {
    /// Creates a new EyeExamRepository.
    pub fn new(pool: SqlitePool) -> Self {
        EyeExamRepository { pool }
    }

    pub async fn get(&self, id: &str) -> DbResult<EyeExam> {
        let sql = format!("SELECT {EXAM_COLUMNS} FROM eye_exams WHERE id = ?1");
        let exam = sqlx::query_as::<_, EyeExam>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found("Eye exam", id))?;
        Ok(exam)
    }

    /// All exams of a customer, newest `exam_date` first.
    pub async fn list_for_customer(&self, customer_id: &str) -> DbResult<Vec<EyeExam>> {
        let sql = format!(
            "SELECT {EXAM_COLUMNS} FROM eye_exams WHERE customer_id = ?1 ORDER BY exam_date DESC, created_at DESC"
        );
        let exams = sqlx::query_as::<_, EyeExam>(&sql)
            .bind(customer_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(exams)
    }

    /// The most recent exam, if any.
    pub async fn latest(&self, customer_id: &str) -> DbResult<Option<EyeExam>> {
        let sql = format!(
            "SELECT {EXAM_COLUMNS} FROM eye_exams WHERE customer_id = ?1 ORDER BY exam_date DESC, created_at DESC LIMIT 1"
        );
        let exam = sqlx::query_as::<_, EyeExam>(&sql)
            .bind(customer_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(exam)
    }

    /// Records an exam for an existing customer.
    pub async fn create(&self, customer_id: &str, input: &EyeExamInput) -> DbResult<EyeExam> {
        let notes = input.validate()?;

        // Surface a NotFound instead of a foreign key failure
        super::customer::CustomerRepository::new(self.pool.clone())
            .get(customer_id)
            .await?;

        let now = Utc::now();
        let exam = EyeExam {
            id: new_id(),
            customer_id: customer_id.to_string(),
            exam_date: input.exam_date.unwrap_or_else(|| now.date_naive()),
            right_sphere: input.right_sphere,
            right_cylinder: input.right_cylinder,
            right_axis: input.right_axis,
            right_add: input.right_add,
            right_pd: input.pd,
            left_sphere: input.left_sphere,
            left_cylinder: input.left_cylinder,
            left_axis: input.left_axis,
            left_add: input.left_add,
            left_pd: input.pd,
            notes,
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO eye_exams (
                id, customer_id, exam_date,
                right_sphere, right_cylinder, right_axis, right_add, right_pd,
                left_sphere, left_cylinder, left_axis, left_add, left_pd,
                notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )
        .bind(&exam.id)
        .bind(&exam.customer_id)
        .bind(exam.exam_date)
        .bind(exam.right_sphere)
        .bind(exam.right_cylinder)
        .bind(exam.right_axis)
        .bind(exam.right_add)
        .bind(exam.right_pd)
        .bind(exam.left_sphere)
        .bind(exam.left_cylinder)
        .bind(exam.left_axis)
        .bind(exam.left_add)
        .bind(exam.left_pd)
        .bind(&exam.notes)
        .bind(exam.created_at)
        .execute(&self.pool)
        .await?;

        info!(exam_id = %exam.id, customer_id = %customer_id, "Eye exam recorded");
        Ok(exam)
    }

    /// Replaces every measurement of an exam.
    pub async fn update(&self, id: &str, input: &EyeExamInput) -> DbResult<EyeExam> {
        let notes = input.validate()?;
        let existing = self.get(id).await?;

        sqlx::query(
            r#"
            UPDATE eye_exams SET
                exam_date = ?2,
                right_sphere = ?3, right_cylinder = ?4, right_axis = ?5, right_add = ?6, right_pd = ?7,
                left_sphere = ?8, left_cylinder = ?9, left_axis = ?10, left_add = ?11, left_pd = ?12,
                notes = ?13
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(input.exam_date.unwrap_or(existing.exam_date))
        .bind(input.right_sphere)
        .bind(input.right_cylinder)
        .bind(input.right_axis)
        .bind(input.right_add)
        .bind(input.pd)
        .bind(input.left_sphere)
        .bind(input.left_cylinder)
        .bind(input.left_axis)
        .bind(input.left_add)
        .bind(input.pd)
        .bind(&notes)
        .execute(&self.pool)
        .await?;

        info!(exam_id = %id, "Eye exam updated");
        self.get(id).await
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM eye_exams WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(crate::DbError::not_found("Eye exam", id));
        }
        Ok(())
    }
}
