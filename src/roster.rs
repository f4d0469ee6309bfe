use include_dir::{include_dir, Dir};
use serde::Deserialize;
use serde_json::from_str;
use std::error::Error;
use std::fs;
use std::path::Path;
use tracing::warn;

static ASSET_DIR: Dir = include_dir!("assets");

/// One enrolled person. The branch travels with the enrollment so the
/// attendance sheet never has to guess it from the name.
#[derive(Deserialize, Clone, Debug)]
pub struct Enrollment {
    pub name: String,
    pub branch: String,
    pub embedding: Vec<f32>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct Roster {
    pub people: Vec<Enrollment>,
}

impl Roster {
    /// The sample roster compiled into the binary. Lets the tool run before
    /// anyone has enrolled real embeddings.
    pub fn bundled() -> Self {
        let file = ASSET_DIR
            .get_file("roster.json")
            .expect("Roster file not found");
        let file_as_str = file
            .contents_utf8()
            .expect("Unable to interpret file as a string");
        from_str(file_as_str).expect("Unable to deserialize roster json")
    }

    pub fn from_file(path: &Path) -> Result<Self, Box<dyn Error>> {
        let contents = fs::read_to_string(path)?;
        let roster = from_str(&contents)?;
        Ok(roster)
    }

    pub fn branch_of(&self, name: &str) -> Option<&str> {
        self.people
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.branch.as_str())
    }

    /// `(name, embedding)` pairs for the matcher. Enrollments without an
    /// embedding cannot be recognized and are dropped for the whole run.
    pub fn matcher_entries(&self) -> Vec<(String, Vec<f32>)> {
        self.people
            .iter()
            .filter(|p| {
                if p.embedding.is_empty() {
                    warn!(name = %p.name, "enrollment has no embedding, skipping");
                    return false;
                }
                true
            })
            .map(|p| (p.name.clone(), p.embedding.clone()))
            .collect()
    }
}
