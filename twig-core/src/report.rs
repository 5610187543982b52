//! Text rendering for `log` and `status`

use crate::object::Commit;
use crate::reconcile::Change;
use std::collections::BTreeMap;
use std::fmt;

/// One commit block as printed by `log`, `global-log` and friends
pub struct LogEntry<'a>(pub &'a Commit);

impl fmt::Display for LogEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let commit = self.0;
        writeln!(f, "===")?;
        writeln!(f, "commit {}", commit.id())?;
        if let (Some(p1), Some(p2)) = (commit.parent1(), commit.parent2()) {
            writeln!(f, "Merge: {} {}", p1.short(), p2.short())?;
        }
        writeln!(f, "Date: {}", commit.timestamp())?;
        writeln!(f, "{}", commit.message())?;
        writeln!(f)
    }
}

/// Snapshot of repository state as shown by `status`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub branches: Vec<String>,
    pub current_branch: String,
    pub staged: Vec<String>,
    pub removed: Vec<String>,
    pub unstaged: BTreeMap<String, Change>,
    pub untracked: Vec<String>,
}

impl StatusReport {
    /// Nothing staged, nothing changed, nothing untracked
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty()
            && self.removed.is_empty()
            && self.unstaged.is_empty()
            && self.untracked.is_empty()
    }
}

fn section<I, T>(f: &mut fmt::Formatter<'_>, title: &str, lines: I) -> fmt::Result
where
    I: IntoIterator<Item = T>,
    T: fmt::Display,
{
    writeln!(f, "=== {} ===", title)?;
    for line in lines {
        writeln!(f, "{}", line)?;
    }
    writeln!(f)
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        section(
            f,
            "Branches",
            self.branches.iter().map(|name| {
                if *name == self.current_branch {
                    format!("*{}", name)
                } else {
                    name.clone()
                }
            }),
        )?;
        section(f, "Staged Files", &self.staged)?;
        section(f, "Removed Files", &self.removed)?;
        section(
            f,
            "Modifications Not Staged For Commit",
            self.unstaged
                .iter()
                .map(|(path, change)| format!("{} ({})", path, change)),
        )?;
        section(f, "Untracked Files", &self.untracked)
    }
}
