//! Artifact and file registries
//!
//! Both registries deduplicate on a deterministic key and keep first-seen
//! order. A failed mutating tool call retracts the file updates it produced;
//! artifacts derived from the same call stay registered.

use super::extract::{is_file_like, is_manifest};
use super::rules::classify_file;
use super::types::{Artifact, ArtifactKind, FileAction, FileUpdate};
use crate::parser::common::basename;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

/// Descriptions that carry no information beyond the artifact kind
const PLACEHOLDER_DESCRIPTIONS: &[&str] = &[
    "skill invocation",
    "subagent task",
    "slash command",
    "git commit",
    "manifest file",
    "task",
];

fn is_placeholder_description(description: &str, title: &str) -> bool {
    let d = description.trim();
    d.is_empty()
        || d.eq_ignore_ascii_case(title.trim())
        || PLACEHOLDER_DESCRIPTIONS
            .iter()
            .any(|p| d.eq_ignore_ascii_case(p))
}

/// Deterministic artifact id from its identity tuple.
pub fn artifact_id(session_id: &str, kind: ArtifactKind, title: &str, source_log_id: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(session_id.as_bytes());
    hasher.update(b"|");
    hasher.update(kind.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(title.as_bytes());
    hasher.update(b"|");
    hasher.update(source_log_id.to_string().as_bytes());
    let hash = hasher.finalize();
    format!("art-{}", &format!("{:x}", hash)[..16])
}

/// Fields of a newly observed artifact
#[derive(Debug, Clone)]
pub struct NewArtifact<'a> {
    pub kind: ArtifactKind,
    pub title: &'a str,
    pub description: &'a str,
    pub source: &'a str,
    pub source_log_id: usize,
    pub source_tool_name: Option<&'a str>,
    pub url: Option<&'a str>,
}

/// Fields of a newly observed file touch
#[derive(Debug, Clone)]
pub struct FileTouch<'a> {
    pub path: &'a str,
    pub action: FileAction,
    pub timestamp: &'a str,
    pub agent_name: Option<&'a str>,
    pub source_log_id: usize,
    pub source_tool_name: &'a str,
}

#[derive(Debug)]
pub struct Tracker {
    session_id: String,
    root_session_id: String,
    artifacts: Vec<Artifact>,
    artifact_index: HashMap<String, usize>,
    files: Vec<FileUpdate>,
    file_keys: HashSet<(String, FileAction, usize)>,
}

impl Tracker {
    pub fn new(session_id: &str, root_session_id: &str) -> Self {
        Tracker {
            session_id: session_id.to_string(),
            root_session_id: root_session_id.to_string(),
            artifacts: Vec::new(),
            artifact_index: HashMap::new(),
            files: Vec::new(),
            file_keys: HashSet::new(),
        }
    }

    /// Register an artifact, merging into an existing one with the same identity.
    /// Returns the artifact id.
    pub fn add_artifact(&mut self, new: NewArtifact<'_>) -> String {
        let title = new.title.trim();
        let id = artifact_id(&self.session_id, new.kind, title, new.source_log_id);

        if let Some(&idx) = self.artifact_index.get(&id) {
            let existing = &mut self.artifacts[idx];
            if existing.url.is_none() {
                existing.url = new.url.map(str::to_string);
            }
            if is_placeholder_description(&existing.description, &existing.title)
                && !is_placeholder_description(new.description, title)
            {
                existing.description = new.description.trim().to_string();
            }
            if existing.source_tool_name.is_none() {
                existing.source_tool_name = new.source_tool_name.map(str::to_string);
            }
            return id;
        }

        self.artifact_index.insert(id.clone(), self.artifacts.len());
        self.artifacts.push(Artifact {
            id: id.clone(),
            kind: new.kind,
            title: title.to_string(),
            description: new.description.trim().to_string(),
            source: new.source.to_string(),
            url: new.url.map(str::to_string),
            source_log_id: new.source_log_id,
            source_tool_name: new.source_tool_name.map(str::to_string),
        });
        id
    }

    /// Record a file touch. Returns false when the path is rejected or the
    /// same (path, action, log id) was already recorded.
    pub fn track_file(&mut self, touch: FileTouch<'_>) -> bool {
        let path = touch.path.trim().to_string();
        if !is_file_like(&path) {
            return false;
        }
        let key = (path.clone(), touch.action, touch.source_log_id);
        if !self.file_keys.insert(key) {
            return false;
        }

        if is_manifest(&path) {
            let title = basename(&path).to_string();
            let verb = match touch.action {
                FileAction::Read => "read",
                FileAction::Update => "updated",
                FileAction::Create => "created",
                FileAction::Delete => "deleted",
            };
            let description = format!("{} {}", path, verb);
            self.add_artifact(NewArtifact {
                kind: ArtifactKind::Manifest,
                title: &title,
                description: &description,
                source: "file",
                source_log_id: touch.source_log_id,
                source_tool_name: Some(touch.source_tool_name),
                url: None,
            });
        }

        self.files.push(FileUpdate {
            file_type: classify_file(&path),
            path,
            action: touch.action,
            timestamp: touch.timestamp.to_string(),
            agent_name: touch.agent_name.map(str::to_string),
            source_log_id: touch.source_log_id,
            source_tool_name: touch.source_tool_name.to_string(),
            thread_session_id: self.session_id.clone(),
            root_session_id: self.root_session_id.clone(),
        });
        true
    }

    /// Drop every file update produced by the given log entry.
    /// Returns the number removed.
    pub fn retract_files_for_log(&mut self, source_log_id: usize) -> usize {
        let before = self.files.len();
        self.files.retain(|f| f.source_log_id != source_log_id);
        self.file_keys.retain(|(_, _, log_id)| *log_id != source_log_id);
        before - self.files.len()
    }

    pub fn into_parts(self) -> (Vec<Artifact>, Vec<FileUpdate>) {
        (self.artifacts, self.files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::types::FileType;

    fn touch(path: &str, action: FileAction, log_id: usize) -> FileTouch<'_> {
        FileTouch {
            path,
            action,
            timestamp: "2026-01-01T00:00:00Z",
            agent_name: None,
            source_log_id: log_id,
            source_tool_name: "Write",
        }
    }

    fn skill<'a>(description: &'a str, url: Option<&'a str>) -> NewArtifact<'a> {
        NewArtifact {
            kind: ArtifactKind::Skill,
            title: "frontend-design",
            description,
            source: "tool_use",
            source_log_id: 4,
            source_tool_name: Some("Skill"),
            url,
        }
    }

    #[test]
    fn test_artifact_id_is_deterministic() {
        let a = artifact_id("S-1", ArtifactKind::Commit, "abc1234", 2);
        assert_eq!(a, artifact_id("S-1", ArtifactKind::Commit, "abc1234", 2));
        assert!(a.starts_with("art-"));
        assert_eq!(a.len(), 20);
        assert_ne!(a, artifact_id("S-1", ArtifactKind::Commit, "abc1234", 3));
        assert_ne!(a, artifact_id("S-2", ArtifactKind::Commit, "abc1234", 2));
    }

    #[test]
    fn test_artifact_merge() {
        let mut tracker = Tracker::new("S-1", "S-1");
        let first = tracker.add_artifact(skill("Skill invocation", None));
        let second = tracker.add_artifact(skill(
            "Create distinctive frontend interfaces",
            Some("https://example.com/skill"),
        ));
        assert_eq!(first, second);
        assert_eq!(tracker.artifacts.len(), 1);

        let merged = &tracker.artifacts[0];
        assert_eq!(merged.description, "Create distinctive frontend interfaces");
        assert_eq!(merged.url.as_deref(), Some("https://example.com/skill"));

        // A later placeholder never overwrites a real description
        tracker.add_artifact(skill("", None));
        assert_eq!(
            tracker.artifacts[0].description,
            "Create distinctive frontend interfaces"
        );
    }

    #[test]
    fn test_track_file_dedup_and_manifest() {
        let mut tracker = Tracker::new("S-agent-a1", "S-root");
        assert!(tracker.track_file(touch("/repo/package.json", FileAction::Update, 1)));
        assert!(!tracker.track_file(touch("/repo/package.json", FileAction::Update, 1)));
        assert!(tracker.track_file(touch("/repo/src/app.ts", FileAction::Create, 1)));
        assert!(!tracker.track_file(touch("/repo/src/*.ts", FileAction::Read, 2)));

        let files = &tracker.files;
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].file_type, FileType::Manifest);
        assert_eq!(files[0].thread_session_id, "S-agent-a1");
        assert_eq!(files[0].root_session_id, "S-root");
        assert_eq!(files[1].file_type, FileType::Source);

        assert_eq!(tracker.artifacts.len(), 1);
        assert_eq!(tracker.artifacts[0].kind, ArtifactKind::Manifest);
        assert_eq!(tracker.artifacts[0].title, "package.json");
    }

    #[test]
    fn test_retract_keeps_artifacts() {
        let mut tracker = Tracker::new("S-1", "S-1");
        tracker.track_file(touch("/repo/Cargo.toml", FileAction::Update, 5));
        tracker.track_file(touch("/repo/src/lib.rs", FileAction::Read, 6));

        assert_eq!(tracker.retract_files_for_log(5), 1);
        assert_eq!(tracker.files.len(), 1);
        assert_eq!(tracker.files[0].path, "/repo/src/lib.rs");
        assert_eq!(tracker.artifacts.len(), 1);

        // The key is released, so a retry of the same write is recorded again
        assert!(tracker.track_file(touch("/repo/Cargo.toml", FileAction::Update, 5)));
    }

    #[test]
    fn test_tool_paths_kept_verbatim() {
        let mut tracker = Tracker::new("S-1", "S-1");
        assert!(tracker.track_file(touch("/repo/data/year=2024/load.py", FileAction::Update, 1)));
        assert!(tracker.track_file(touch(" /repo/@types/index.d.ts ", FileAction::Read, 2)));
        let paths: Vec<_> = tracker.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["/repo/data/year=2024/load.py", "/repo/@types/index.d.ts"]);
    }
}
