// Batch manifest: the JSON file a run is built from

use anyhow::{Context, Result};
use bulkgen_core::domain::{GroupMeta, JobDescriptor, JobPayload, OrderKey};
use bulkgen_core::port::IdProvider;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestJob {
    /// Assigned by the id provider when omitted
    #[serde(default)]
    pub id: Option<String>,
    pub group_key: String,
    pub order_key: OrderKey,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub groups: Vec<GroupMeta>,
    pub jobs: Vec<ManifestJob>,
}

/// Per-group job count for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupCount {
    pub key: String,
    pub title: String,
    pub jobs: usize,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid manifest {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Manifest is not valid JSON")
    }

    /// Problems that would make `initialize` reject the batch
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let mut seen = HashSet::new();
        for job in &self.jobs {
            if let Some(id) = &job.id {
                if id.is_empty() {
                    problems.push("job id must not be empty".to_string());
                } else if !seen.insert(id.as_str()) {
                    problems.push(format!("duplicate job id: {}", id));
                }
            }
        }
        problems
    }

    /// Group keys used by jobs that have no group metadata
    pub fn untracked_groups(&self) -> Vec<String> {
        let known: HashSet<&str> = self.groups.iter().map(|g| g.key.as_str()).collect();
        let mut untracked: Vec<String> = self
            .jobs
            .iter()
            .map(|j| j.group_key.as_str())
            .filter(|key| !known.contains(key))
            .collect::<HashSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();
        untracked.sort();
        untracked
    }

    /// Job counts per declared group, in declaration order
    pub fn group_counts(&self) -> Vec<GroupCount> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for job in &self.jobs {
            *counts.entry(job.group_key.as_str()).or_default() += 1;
        }
        self.groups
            .iter()
            .map(|g| GroupCount {
                key: g.key.clone(),
                title: g.title.clone(),
                jobs: counts.get(g.key.as_str()).copied().unwrap_or(0),
            })
            .collect()
    }

    /// Descriptors and group metadata ready for `Orchestrator::initialize`
    pub fn into_run(self, ids: &dyn IdProvider) -> (Vec<JobDescriptor>, Vec<GroupMeta>) {
        let descriptors = self
            .jobs
            .into_iter()
            .map(|job| {
                let id = job.id.unwrap_or_else(|| ids.generate_id());
                JobDescriptor::new(id, job.group_key, job.order_key, JobPayload::new(job.payload))
            })
            .collect();
        (descriptors, self.groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulkgen_core::port::id_provider::mocks::SequentialIdProvider;

    const MANIFEST: &str = r#"{
        "groups": [
            {"key": "unit-1", "title": "Unit 1: Greetings"},
            {"key": "unit-2", "title": "Unit 2: Numbers"}
        ],
        "jobs": [
            {"id": "lesson-1", "group_key": "unit-1", "order_key": 1, "payload": {"topic": "hello"}},
            {"group_key": "unit-1", "order_key": 2, "payload": {"topic": "goodbye"}},
            {"group_key": "extras", "order_key": 3, "payload": {"topic": "bonus"}}
        ]
    }"#;

    #[test]
    fn test_parse_and_count_groups() {
        let manifest = Manifest::parse(MANIFEST).unwrap();
        assert!(manifest.problems().is_empty());
        assert_eq!(
            manifest.group_counts(),
            vec![
                GroupCount {
                    key: "unit-1".to_string(),
                    title: "Unit 1: Greetings".to_string(),
                    jobs: 2,
                },
                GroupCount {
                    key: "unit-2".to_string(),
                    title: "Unit 2: Numbers".to_string(),
                    jobs: 0,
                },
            ]
        );
        assert_eq!(manifest.untracked_groups(), vec!["extras"]);
    }

    #[test]
    fn test_missing_ids_come_from_provider() {
        let manifest = Manifest::parse(MANIFEST).unwrap();
        let (descriptors, groups) = manifest.into_run(&SequentialIdProvider::default());

        let ids: Vec<&str> = descriptors.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["lesson-1", "job-1", "job-2"]);
        assert_eq!(descriptors[1].payload.as_value()["topic"], "goodbye");
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_duplicate_ids_are_reported() {
        let manifest = Manifest::parse(
            r#"{"jobs": [
                {"id": "a", "group_key": "g", "order_key": 1, "payload": {}},
                {"id": "a", "group_key": "g", "order_key": 2, "payload": {}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(manifest.problems(), vec!["duplicate job id: a"]);
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        assert!(Manifest::parse(r#"{"jobs": [{"group_key": "g"}]}"#).is_err());
    }
}
