use std::{collections::HashSet, path::Path};

use coursehub_db::models::{Batch, Course};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid catalog JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Duplicate course id: {0}")]
    DuplicateCourse(String),
    #[error("Course {course_id} lists batch {batch_number} more than once")]
    DuplicateBatch { course_id: String, batch_number: u32 },
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    courses: Vec<Course>,
}

/// Read-only course and batch reference data, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    courses: Vec<Course>,
}

impl Catalog {
    pub fn new(courses: Vec<Course>) -> Result<Self, CatalogError> {
        let mut course_ids = HashSet::new();
        for course in &courses {
            if !course_ids.insert(course.id.as_str()) {
                return Err(CatalogError::DuplicateCourse(course.id.clone()));
            }
            let mut numbers = HashSet::new();
            for batch in &course.batches {
                if !numbers.insert(batch.batch_number) {
                    return Err(CatalogError::DuplicateBatch {
                        course_id: course.id.clone(),
                        batch_number: batch.batch_number,
                    });
                }
            }
        }
        Ok(Self { courses })
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Self::new(file.courses)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let catalog = Self::from_json(&json)?;
        info!(path = %path.display(), courses = catalog.courses.len(), "Course catalog loaded");
        Ok(catalog)
    }

    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    pub fn course(&self, course_id: &str) -> Option<&Course> {
        self.courses.iter().find(|c| c.id == course_id)
    }

    pub fn batch(&self, course_id: &str, batch_number: u32) -> Option<&Batch> {
        self.course(course_id).and_then(|c| c.batch(batch_number))
    }
}
