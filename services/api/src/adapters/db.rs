//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DocumentStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use course_sync_core::domain::{AssetDescriptor, Course, CourseStatus, Quiz, Topic};
use course_sync_core::ports::{CourseWrite, DocumentStore, PortError, PortResult, WriteMode};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DocumentStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const COURSE_COLUMNS: &str = "id, title, description, price, instructor_id, instructor_name, \
     image, topic_ids, final_quiz, status, created_at, updated_at";

const TOPIC_COLUMNS: &str =
    "id, course_id, title, description, files, video, quiz, created_at, updated_at";

#[derive(FromRow)]
struct CourseRecord {
    id: Uuid,
    title: String,
    description: String,
    price: f64,
    instructor_id: String,
    instructor_name: String,
    image: Option<String>,
    topic_ids: Vec<Uuid>,
    final_quiz: Option<Json<Quiz>>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl CourseRecord {
    fn to_domain(self) -> PortResult<Course> {
        let status = CourseStatus::parse(&self.status).ok_or_else(|| {
            PortError::Unexpected(format!("Course {} has unknown status '{}'", self.id, self.status))
        })?;
        Ok(Course {
            id: self.id,
            title: self.title,
            description: self.description,
            price: self.price,
            instructor_id: self.instructor_id,
            instructor_name: self.instructor_name,
            image: self.image,
            topics: self.topic_ids,
            final_quiz: self.final_quiz.map(|q| q.0),
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct TopicRecord {
    id: Uuid,
    course_id: Uuid,
    title: String,
    description: String,
    files: Json<Vec<AssetDescriptor>>,
    video: String,
    quiz: Json<Quiz>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl TopicRecord {
    fn to_domain(self) -> Topic {
        Topic {
            id: self.id,
            course_id: self.course_id,
            title: self.title,
            description: self.description,
            files: self.files.0,
            video: self.video,
            quiz: self.quiz.0,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// Write Helpers (run inside a transaction)
//=========================================================================================

async fn write_topic(
    tx: &mut Transaction<'_, Postgres>,
    topic: &Topic,
    mode: WriteMode,
) -> Result<(), sqlx::Error> {
    let sql = match mode {
        WriteMode::Insert => {
            "INSERT INTO topics (id, course_id, title, description, files, video, quiz, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        }
        WriteMode::Upsert => {
            "INSERT INTO topics (id, course_id, title, description, files, video, quiz, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (id) DO UPDATE SET
                course_id = EXCLUDED.course_id,
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                files = EXCLUDED.files,
                video = EXCLUDED.video,
                quiz = EXCLUDED.quiz,
                updated_at = EXCLUDED.updated_at"
        }
    };
    sqlx::query(sql)
        .bind(topic.id)
        .bind(topic.course_id)
        .bind(&topic.title)
        .bind(&topic.description)
        .bind(Json(&topic.files))
        .bind(&topic.video)
        .bind(Json(&topic.quiz))
        .bind(topic.created_at)
        .bind(topic.updated_at)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn write_course(
    tx: &mut Transaction<'_, Postgres>,
    course: &Course,
    mode: WriteMode,
) -> Result<(), sqlx::Error> {
    let sql = match mode {
        WriteMode::Insert => {
            "INSERT INTO courses (id, title, description, price, instructor_id, instructor_name,
                                  image, topic_ids, final_quiz, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
        }
        WriteMode::Upsert => {
            "INSERT INTO courses (id, title, description, price, instructor_id, instructor_name,
                                  image, topic_ids, final_quiz, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                price = EXCLUDED.price,
                instructor_id = EXCLUDED.instructor_id,
                instructor_name = EXCLUDED.instructor_name,
                image = EXCLUDED.image,
                topic_ids = EXCLUDED.topic_ids,
                final_quiz = EXCLUDED.final_quiz,
                status = EXCLUDED.status,
                updated_at = EXCLUDED.updated_at"
        }
    };
    sqlx::query(sql)
        .bind(course.id)
        .bind(&course.title)
        .bind(&course.description)
        .bind(course.price)
        .bind(&course.instructor_id)
        .bind(&course.instructor_name)
        .bind(&course.image)
        .bind(&course.topics)
        .bind(course.final_quiz.as_ref().map(Json))
        .bind(course.status.as_str())
        .bind(course.created_at)
        .bind(course.updated_at)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

//=========================================================================================
// `DocumentStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl DocumentStore for DbAdapter {
    async fn find_course(&self, course_id: Uuid) -> PortResult<Option<Course>> {
        let record = sqlx::query_as::<_, CourseRecord>(&format!(
            "SELECT {} FROM courses WHERE id = $1",
            COURSE_COLUMNS
        ))
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record.map(CourseRecord::to_domain).transpose()
    }

    async fn find_topics_by_course(&self, course_id: Uuid) -> PortResult<Vec<Topic>> {
        let records = sqlx::query_as::<_, TopicRecord>(&format!(
            "SELECT {} FROM topics WHERE course_id = $1 ORDER BY created_at ASC",
            TOPIC_COLUMNS
        ))
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(TopicRecord::to_domain).collect())
    }

    async fn find_courses_by_instructor(&self, instructor_id: &str) -> PortResult<Vec<Course>> {
        let records = sqlx::query_as::<_, CourseRecord>(&format!(
            "SELECT {} FROM courses WHERE instructor_id = $1 ORDER BY created_at ASC",
            COURSE_COLUMNS
        ))
        .bind(instructor_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(CourseRecord::to_domain).collect()
    }

    async fn commit(&self, write: CourseWrite) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        if !write.remove_topic_ids.is_empty() {
            sqlx::query("DELETE FROM topics WHERE course_id = $1 AND id = ANY($2)")
                .bind(write.course.id)
                .bind(&write.remove_topic_ids)
                .execute(&mut *tx)
                .await
                .map_err(unexpected)?;
        }
        for topic in &write.topics {
            write_topic(&mut tx, topic, write.mode).await.map_err(unexpected)?;
        }
        write_course(&mut tx, &write.course, write.mode)
            .await
            .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)
    }

    async fn delete_course(&self, course_id: Uuid) -> PortResult<Vec<Topic>> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let topics = sqlx::query_as::<_, TopicRecord>(&format!(
            "DELETE FROM topics WHERE course_id = $1 RETURNING {}",
            TOPIC_COLUMNS
        ))
        .bind(course_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(unexpected)?;

        let deleted = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(course_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        if deleted.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Course {} not found", course_id)));
        }

        tx.commit().await.map_err(unexpected)?;
        Ok(topics.into_iter().map(TopicRecord::to_domain).collect())
    }
}
