//! Pinning commit message formatting
//!
//! The message is the audit trail for a build: which submodules moved,
//! which upstream commits that pulled in, and which files those touched.

/// How many upstream commits are described per submodule
pub const MAX_COMMITS_PER_SUBMODULE: usize = 5;

/// One submodule update to describe
#[derive(Debug, Clone)]
pub struct SubmoduleUpdate {
    pub path: String,
    pub old_sha: String,
    pub new_sha: String,
    /// `None` when the server could not produce a comparison
    pub comparison: Option<ComparisonSummary>,
}

/// Shaped comparison data, ready for rendering
#[derive(Debug, Clone)]
pub struct ComparisonSummary {
    /// Total commits between the old and new pin
    pub total: usize,
    /// The most recent commits, oldest of the window first
    pub commits: Vec<CommitSummary>,
}

/// One upstream commit in the rendered window
#[derive(Debug, Clone)]
pub struct CommitSummary {
    pub sha: String,
    pub author: String,
    pub message: String,
    /// Files the commit touched; empty when the lookup was unavailable
    pub files: Vec<String>,
}

/// The most recent [`MAX_COMMITS_PER_SUBMODULE`] commits of a comparison
/// listing. Comparisons arrive oldest first, so the window is the tail,
/// kept in order.
pub fn recent_window<T>(commits: &[T]) -> &[T] {
    &commits[commits.len().saturating_sub(MAX_COMMITS_PER_SUBMODULE)..]
}

/// Build the full commit message: header line, then one block per
/// submodule update.
pub fn build(header: &str, updates: &[SubmoduleUpdate]) -> String {
    let mut message = String::from(header);
    message.push('\n');

    for update in updates {
        match &update.comparison {
            Some(summary) if !summary.commits.is_empty() => {
                for commit in &summary.commits {
                    message.push('\n');
                    message.push_str(&format!("{}: {}\n", commit.author, first_line(&commit.message)));
                    message.push_str(&format!("  {}/{}\n", update.path, commit.sha));
                    for file in &commit.files {
                        message.push_str(&format!("  {file}\n"));
                    }
                }
                if summary.total > summary.commits.len() {
                    message.push_str(&format!(
                        "\n... and {} more commits to {}.\n",
                        summary.total - summary.commits.len(),
                        update.path
                    ));
                }
            }
            _ => {
                message.push_str(&format!(
                    "\nUpdated {} from {} to {} (no details available).\n",
                    update.path,
                    short_sha(&update.old_sha),
                    short_sha(&update.new_sha)
                ));
            }
        }
    }
    message
}

fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or("")
}

fn short_sha(sha: &str) -> &str {
    &sha[..sha.len().min(8)]
}
