//! Wire types for the git object-store HTTP API

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::RepoError;

/// Tree entry mode for a submodule gitlink
pub const MODE_GITLINK: &str = "160000";
/// Tree entry mode for a regular file
pub const MODE_FILE: &str = "100644";
/// Tree entry type for a gitlink (a commit in another repository)
pub const TYPE_COMMIT: &str = "commit";
/// Tree entry type for a blob
pub const TYPE_BLOB: &str = "blob";

/// A sha reference to another object, as nested in API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectRef {
    pub sha: String,
}

/// Author or committer identity on a commit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitActor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

/// A raw git commit object
#[derive(Debug, Clone, Deserialize)]
pub struct GitCommit {
    pub sha: String,
    pub message: String,
    pub tree: ObjectRef,
    #[serde(default)]
    pub parents: Vec<ObjectRef>,
    #[serde(default)]
    pub author: Option<GitActor>,
}

/// A git tree object: the entries of one directory
#[derive(Debug, Clone, Deserialize)]
pub struct GitTree {
    pub sha: String,
    #[serde(rename = "tree")]
    pub entries: Vec<TreeEntry>,
}

/// One entry of a git tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    pub mode: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub sha: String,
}

impl TreeEntry {
    /// Entry pinning a submodule to a commit in its own repository
    pub fn gitlink(path: &str, sha: &str) -> Self {
        Self {
            path: path.to_string(),
            mode: MODE_GITLINK.to_string(),
            kind: TYPE_COMMIT.to_string(),
            sha: sha.to_string(),
        }
    }

    /// Entry for a regular file blob
    pub fn blob(path: &str, sha: &str) -> Self {
        Self {
            path: path.to_string(),
            mode: MODE_FILE.to_string(),
            kind: TYPE_BLOB.to_string(),
            sha: sha.to_string(),
        }
    }

    pub fn is_gitlink(&self) -> bool {
        self.kind == TYPE_COMMIT
    }
}

/// A git blob object with its transfer encoding
#[derive(Debug, Clone, Deserialize)]
pub struct GitBlob {
    pub sha: String,
    pub content: String,
    pub encoding: String,
}

impl GitBlob {
    /// Decode the blob content to text. The API delivers blobs either as
    /// plain utf-8 or as base64 with embedded line breaks.
    pub fn decode(&self) -> Result<String, RepoError> {
        match self.encoding.as_str() {
            "utf-8" => Ok(self.content.clone()),
            "base64" => {
                let compact: String = self.content.chars().filter(|c| !c.is_whitespace()).collect();
                let bytes = STANDARD
                    .decode(compact.as_bytes())
                    .map_err(|e| RepoError::Encoding(format!("invalid base64: {e}")))?;
                String::from_utf8(bytes)
                    .map_err(|e| RepoError::Encoding(format!("blob is not utf-8: {e}")))
            }
            other => Err(RepoError::Encoding(format!("unsupported encoding {other:?}"))),
        }
    }
}

/// Request body for creating a blob
#[derive(Debug, Clone, Serialize)]
pub struct NewBlob {
    pub content: String,
    pub encoding: String,
}

impl NewBlob {
    /// Encode text content as base64 for transfer
    pub fn from_text(content: &str) -> Self {
        Self {
            content: STANDARD.encode(content.as_bytes()),
            encoding: "base64".to_string(),
        }
    }
}

/// Request body for creating a tree
#[derive(Debug, Clone, Serialize)]
pub struct NewTree {
    /// Tree to overlay the entries onto; `None` builds the tree from
    /// the entries alone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_tree: Option<String>,
    #[serde(rename = "tree")]
    pub entries: Vec<TreeEntry>,
}

/// Request body for creating a commit
#[derive(Debug, Clone, Serialize)]
pub struct NewCommit {
    pub message: String,
    pub tree: String,
    pub parents: Vec<String>,
}

/// A branch ref as returned by ref creation and update
#[derive(Debug, Clone, Deserialize)]
pub struct GitRef {
    #[serde(rename = "ref")]
    pub name: String,
    pub object: ObjectRef,
}

/// Two-commit comparison: the commits reachable from head but not base,
/// oldest first
#[derive(Debug, Clone, Deserialize)]
pub struct CommitComparison {
    #[serde(default)]
    pub total_commits: usize,
    #[serde(default)]
    pub commits: Vec<ComparisonCommit>,
}

/// One commit of a comparison listing
#[derive(Debug, Clone, Deserialize)]
pub struct ComparisonCommit {
    pub sha: String,
    pub commit: CommitDetail,
}

/// Nested commit metadata on listing endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct CommitDetail {
    pub message: String,
    #[serde(default)]
    pub author: Option<GitActor>,
}

/// A commit with the files it touched, from the repository commit endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct FullCommit {
    pub sha: String,
    pub commit: CommitDetail,
    #[serde(default)]
    pub files: Vec<ChangedFile>,
}

/// One file changed by a commit
#[derive(Debug, Clone, Deserialize)]
pub struct ChangedFile {
    pub filename: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_utf8_blob() {
        let blob = GitBlob {
            sha: "abc".to_string(),
            content: "hello\n".to_string(),
            encoding: "utf-8".to_string(),
        };
        assert_eq!(blob.decode().unwrap(), "hello\n");
    }

    #[test]
    fn test_decode_base64_blob_with_line_breaks() {
        // "[submodule \"lib\"]\n" split across lines the way the API wraps it
        let blob = GitBlob {
            sha: "abc".to_string(),
            content: "W3N1Ym1vZHVs\nZSAibGliIl0K\n".to_string(),
            encoding: "base64".to_string(),
        };
        assert_eq!(blob.decode().unwrap(), "[submodule \"lib\"]\n");
    }

    #[test]
    fn test_decode_rejects_unknown_encoding() {
        let blob = GitBlob {
            sha: "abc".to_string(),
            content: "data".to_string(),
            encoding: "hex".to_string(),
        };
        assert!(matches!(blob.decode(), Err(RepoError::Encoding(_))));
    }

    #[test]
    fn test_new_blob_round_trip() {
        let new_blob = NewBlob::from_text("42\n");
        assert_eq!(new_blob.encoding, "base64");
        let back = GitBlob {
            sha: "x".to_string(),
            content: new_blob.content,
            encoding: new_blob.encoding,
        };
        assert_eq!(back.decode().unwrap(), "42\n");
    }

    #[test]
    fn test_tree_entry_constructors() {
        let gitlink = TreeEntry::gitlink("libfoo", "a1b2c3");
        assert_eq!(gitlink.mode, MODE_GITLINK);
        assert_eq!(gitlink.kind, TYPE_COMMIT);
        assert!(gitlink.is_gitlink());

        let blob = TreeEntry::blob(".gitmodules", "d4e5f6");
        assert_eq!(blob.mode, MODE_FILE);
        assert_eq!(blob.kind, TYPE_BLOB);
        assert!(!blob.is_gitlink());
    }

    #[test]
    fn test_deserialize_comparison() {
        let json = r#"{
            "total_commits": 2,
            "commits": [
                {"sha": "aaa", "commit": {"message": "First", "author": {"name": "alice", "date": "2014-03-01T09:00:00Z"}}},
                {"sha": "bbb", "commit": {"message": "Second\n\nBody here", "author": {"name": "bob"}}}
            ]
        }"#;
        let comparison: CommitComparison = serde_json::from_str(json).unwrap();
        assert_eq!(comparison.total_commits, 2);
        assert_eq!(comparison.commits.len(), 2);
        assert_eq!(comparison.commits[0].sha, "aaa");
        let author = comparison.commits[0].commit.author.as_ref().unwrap();
        assert_eq!(author.name, "alice");
        assert!(author.date.is_some());
        assert!(comparison.commits[1].commit.author.as_ref().unwrap().date.is_none());
    }

    #[test]
    fn test_serialize_new_tree_omits_missing_base() {
        let tree = NewTree {
            base_tree: None,
            entries: vec![TreeEntry::gitlink("lib", "abc")],
        };
        let json = serde_json::to_value(&tree).unwrap();
        assert!(json.get("base_tree").is_none());
        assert_eq!(json["tree"][0]["type"], "commit");
        assert_eq!(json["tree"][0]["mode"], "160000");
    }
}
