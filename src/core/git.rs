use git2::Repository;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::process::Command;
use tracing::debug;

use crate::core::{ReviewError, RevisionRange};

/// Change kinds reported by `git diff --name-status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChangeKind {
    Added,
    Copied,
    Deleted,
    Modified,
    Renamed,
    TypeChanged,
    Unmerged,
    Unknown,
}

impl ChangeKind {
    pub fn from_code(code: char) -> Self {
        match code {
            'A' => ChangeKind::Added,
            'C' => ChangeKind::Copied,
            'D' => ChangeKind::Deleted,
            'M' => ChangeKind::Modified,
            'R' => ChangeKind::Renamed,
            'T' => ChangeKind::TypeChanged,
            'U' => ChangeKind::Unmerged,
            _ => ChangeKind::Unknown,
        }
    }

    pub fn code(self) -> char {
        match self {
            ChangeKind::Added => 'A',
            ChangeKind::Copied => 'C',
            ChangeKind::Deleted => 'D',
            ChangeKind::Modified => 'M',
            ChangeKind::Renamed => 'R',
            ChangeKind::TypeChanged => 'T',
            ChangeKind::Unmerged => 'U',
            ChangeKind::Unknown => 'X',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameStatusEntry {
    pub kind: ChangeKind,
    /// Similarity score for renames and copies (`R100`, `C75`).
    pub score: Option<u8>,
    pub path: String,
    pub original_path: Option<String>,
}

impl fmt::Display for NameStatusEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.code())?;
        if let Some(score) = self.score {
            write!(f, "{score:03}")?;
        }
        if let Some(original) = &self.original_path {
            write!(f, "\t{original}")?;
        }
        write!(f, "\t{}", self.path)
    }
}

/// Name-status listing plus unified diff body for one review.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffBundle {
    pub name_status: Vec<NameStatusEntry>,
    pub body: String,
}

impl DiffBundle {
    pub fn render_name_status(&self) -> String {
        self.name_status
            .iter()
            .map(|entry| entry.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Listing and diff body separated by one blank line.
    pub fn render(&self) -> String {
        format!("{}\n\n{}", self.render_name_status(), self.body)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffOptions {
    pub context_lines: u32,
    /// Change kinds kept in the unified diff. Empty means no filter.
    pub filter: BTreeSet<ChangeKind>,
    /// File types or globs excluded from both listings.
    pub exclude: Vec<String>,
}

impl DiffOptions {
    /// Modified files only, plus added files in exhaustive mode.
    pub fn new(context_lines: u32, exhaustive: bool, exclude: Vec<String>) -> Self {
        let mut filter = BTreeSet::from([ChangeKind::Modified]);
        if exhaustive {
            filter.insert(ChangeKind::Added);
        }
        Self {
            context_lines,
            filter,
            exclude,
        }
    }
}

/// Local diff source backed by the `git` binary.
pub struct GitIntegration {
    repo: Repository,
}

impl GitIntegration {
    pub fn new(repo_path: impl AsRef<Path>) -> Result<Self, ReviewError> {
        let repo = Repository::discover(repo_path).map_err(|e| {
            ReviewError::Configuration(format!("failed to find git repository: {}", e.message()))
        })?;
        Ok(Self { repo })
    }

    pub fn get_current_branch(&self) -> Result<String, ReviewError> {
        let head = self
            .repo
            .head()
            .map_err(|e| ReviewError::DiffTool(e.message().to_string()))?;
        Ok(head.shorthand().unwrap_or("HEAD").to_string())
    }

    pub fn get_remote_url(&self) -> Result<Option<String>, ReviewError> {
        let remote = self
            .repo
            .find_remote("origin")
            .map_err(|e| ReviewError::DiffTool(e.message().to_string()))?;
        Ok(remote.url().map(|s| s.to_string()))
    }

    /// Both ends of the range must be present locally before git can diff them.
    pub fn verify_range(&self, range: &RevisionRange) -> Result<(), ReviewError> {
        for rev in [&range.from, &range.to] {
            self.repo.revparse_single(rev).map_err(|_| {
                ReviewError::DiffTool(format!(
                    "revision {rev} not found in the local repository; run `git fetch` first"
                ))
            })?;
        }
        Ok(())
    }

    /// Every changed path between the two revisions, whatever its change kind.
    pub fn name_status(
        &self,
        range: &RevisionRange,
        exclude: &[String],
    ) -> Result<Vec<NameStatusEntry>, ReviewError> {
        let output = self.run_git(&name_status_args(range, exclude))?;
        parse_name_status(&output)
    }

    pub fn unified_diff(
        &self,
        range: &RevisionRange,
        options: &DiffOptions,
    ) -> Result<String, ReviewError> {
        self.run_git(&unified_diff_args(range, options))
    }

    pub fn collect(
        &self,
        range: &RevisionRange,
        options: &DiffOptions,
    ) -> Result<DiffBundle, ReviewError> {
        self.verify_range(range)?;
        let name_status = self.name_status(range, &options.exclude)?;
        let body = self.unified_diff(range, options)?;
        Ok(DiffBundle { name_status, body })
    }

    fn run_git(&self, args: &[String]) -> Result<String, ReviewError> {
        debug!("Running: git {}", shell_words::join(args));

        let mut command = Command::new("git");
        if let Some(workdir) = self.repo.workdir() {
            command.current_dir(workdir);
        }
        // keep non-ASCII paths readable in diff headers
        let output = command
            .args(["-c", "core.quotePath=false"])
            .args(args)
            .output()
            .map_err(|e| ReviewError::DiffTool(format!("failed to run git: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ReviewError::DiffTool(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Turn an excluded file type or glob into a git exclude pathspec.
///
/// `md` and `.md` both become `:(exclude)*.md`; anything that already looks
/// like a glob or a path is passed through.
pub fn exclude_pathspec(entry: &str) -> String {
    let entry = entry.trim();
    if entry.contains(['*', '?', '[', '/']) {
        format!(":(exclude){entry}")
    } else {
        format!(":(exclude)*.{}", entry.trim_start_matches('.'))
    }
}

fn pathspec_args(exclude: &[String]) -> Vec<String> {
    if exclude.is_empty() {
        return Vec::new();
    }
    let mut args = vec!["--".to_string(), ".".to_string()];
    args.extend(exclude.iter().map(|e| exclude_pathspec(e)));
    args
}

pub fn name_status_args(range: &RevisionRange, exclude: &[String]) -> Vec<String> {
    let mut args = vec![
        "diff".to_string(),
        "--no-color".to_string(),
        "--name-status".to_string(),
        "-z".to_string(),
        range.from.clone(),
        range.to.clone(),
    ];
    args.extend(pathspec_args(exclude));
    args
}

pub fn unified_diff_args(range: &RevisionRange, options: &DiffOptions) -> Vec<String> {
    let mut args = vec!["diff".to_string(), "--no-color".to_string()];
    if !options.filter.is_empty() {
        let codes: String = options.filter.iter().map(|kind| kind.code()).collect();
        args.push(format!("--diff-filter={codes}"));
    }
    args.push(format!("-U{}", options.context_lines));
    args.push(range.from.clone());
    args.push(range.to.clone());
    args.extend(pathspec_args(&options.exclude));
    args
}

/// Parse `git diff --name-status -z` output.
///
/// Fields are NUL-terminated and paths are never quoted. Renames and copies
/// carry two paths, the original first.
pub fn parse_name_status(output: &str) -> Result<Vec<NameStatusEntry>, ReviewError> {
    let mut entries = Vec::new();
    let mut fields = output.split('\0').filter(|f| !f.is_empty());

    while let Some(status) = fields.next() {
        let kind = ChangeKind::from_code(status.chars().next().unwrap_or('X'));
        let score = status.get(1..).and_then(|s| s.parse::<u8>().ok());

        let mut next_path = || {
            fields.next().map(str::to_string).ok_or_else(|| {
                ReviewError::DiffTool(format!("name-status entry {status:?} has no path"))
            })
        };

        let entry = match kind {
            ChangeKind::Renamed | ChangeKind::Copied => {
                let original = next_path()?;
                NameStatusEntry {
                    kind,
                    score,
                    path: next_path()?,
                    original_path: Some(original),
                }
            }
            _ => NameStatusEntry {
                kind,
                score,
                path: next_path()?,
                original_path: None,
            },
        };
        entries.push(entry);
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn range(from: &str, to: &str) -> RevisionRange {
        RevisionRange {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    #[test]
    fn md_exclusion_becomes_glob_pathspec() {
        assert_eq!(exclude_pathspec("md"), ":(exclude)*.md");
        assert_eq!(exclude_pathspec(".md"), ":(exclude)*.md");
        assert_eq!(exclude_pathspec("docs/*"), ":(exclude)docs/*");

        let args = name_status_args(&range("a1", "b2"), &["md".to_string()]);
        assert_eq!(
            args,
            vec![
                "diff",
                "--no-color",
                "--name-status",
                "-z",
                "a1",
                "b2",
                "--",
                ".",
                ":(exclude)*.md"
            ]
        );
    }

    #[test]
    fn unified_args_carry_filter_and_context() {
        let options = DiffOptions::new(10, false, Vec::new());
        let args = unified_diff_args(&range("a1", "b2"), &options);
        assert_eq!(args, vec!["diff", "--no-color", "--diff-filter=M", "-U10", "a1", "b2"]);

        let options = DiffOptions::new(3, true, vec!["lock".to_string()]);
        let args = unified_diff_args(&range("a1", "b2"), &options);
        assert_eq!(
            args,
            vec![
                "diff",
                "--no-color",
                "--diff-filter=AM",
                "-U3",
                "a1",
                "b2",
                "--",
                ".",
                ":(exclude)*.lock"
            ]
        );
    }

    #[test]
    fn parses_name_status_with_renames() {
        let output = "M\0file.py\0A\0new.rs\0R096\0old.rs\0moved.rs\0D\0gone.txt\0";
        let entries = parse_name_status(output).unwrap();

        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].kind, ChangeKind::Modified);
        assert_eq!(entries[0].path, "file.py");
        assert_eq!(entries[2].kind, ChangeKind::Renamed);
        assert_eq!(entries[2].score, Some(96));
        assert_eq!(entries[2].original_path.as_deref(), Some("old.rs"));
        assert_eq!(entries[2].to_string(), "R096\told.rs\tmoved.rs");
        assert_eq!(entries[3].kind, ChangeKind::Deleted);
    }

    #[test]
    fn rejects_truncated_name_status_line() {
        assert!(parse_name_status("M\0").is_err());
        assert!(parse_name_status("R100\0old.rs\0").is_err());
    }

    #[test]
    fn bundle_render_separates_listing_and_body() {
        let bundle = DiffBundle {
            name_status: parse_name_status("M\0file.py\0").unwrap(),
            body: "@@ -1,2 +1,3 @@\n".to_string(),
        };
        assert_eq!(bundle.render(), "M\tfile.py\n\n@@ -1,2 +1,3 @@\n");
    }

    fn commit_all(repo: &Repository, message: &str) -> String {
        let mut index = repo.index().unwrap();
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .unwrap();
        index.update_all(["*"].iter(), None).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = git2::Signature::now("prometh", "prometh@example.com").unwrap();
        let parents = match repo.head() {
            Ok(head) => vec![head.peel_to_commit().unwrap()],
            Err(_) => Vec::new(),
        };
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .unwrap()
            .to_string()
    }

    fn fixture() -> (TempDir, RevisionRange) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        fs::write(dir.path().join("app.py"), "a = 1\nb = 2\n").unwrap();
        fs::write(dir.path().join("old.py"), "gone = True\n").unwrap();
        fs::write(dir.path().join("README.md"), "# app\n").unwrap();
        let from = commit_all(&repo, "base");

        fs::write(dir.path().join("app.py"), "a = 1\nb = 3\nc = 4\n").unwrap();
        fs::remove_file(dir.path().join("old.py")).unwrap();
        fs::write(dir.path().join("fresh.py"), "fresh = True\n").unwrap();
        fs::write(dir.path().join("README.md"), "# app\n\nmore docs\n").unwrap();
        let to = commit_all(&repo, "change");

        (dir, RevisionRange { from, to })
    }

    fn file_sections(body: &str) -> Vec<String> {
        body.split("diff --git")
            .filter(|s| !s.trim().is_empty())
            .map(|s| format!("diff --git{s}"))
            .collect()
    }

    #[test]
    fn modified_filter_skips_added_and_deleted_files() {
        let (dir, range) = fixture();
        let git = GitIntegration::new(dir.path()).unwrap();

        let bundle = git.collect(&range, &DiffOptions::new(3, false, Vec::new())).unwrap();
        assert!(bundle.body.contains("app.py"));
        assert!(bundle.body.contains("README.md"));
        assert!(!bundle.body.contains("fresh.py"));
        assert!(!bundle.body.contains("old.py"));

        let kinds: Vec<(ChangeKind, &str)> = bundle
            .name_status
            .iter()
            .map(|e| (e.kind, e.path.as_str()))
            .collect();
        assert!(kinds.contains(&(ChangeKind::Added, "fresh.py")));
        assert!(kinds.contains(&(ChangeKind::Deleted, "old.py")));
    }

    #[test]
    fn exhaustive_filter_is_a_superset() {
        let (dir, range) = fixture();
        let git = GitIntegration::new(dir.path()).unwrap();

        let modified = git
            .unified_diff(&range, &DiffOptions::new(3, false, Vec::new()))
            .unwrap();
        let exhaustive = git
            .unified_diff(&range, &DiffOptions::new(3, true, Vec::new()))
            .unwrap();

        assert!(exhaustive.contains("fresh.py"));
        for section in file_sections(&modified) {
            assert!(exhaustive.contains(&section));
        }
    }

    #[test]
    fn excluded_file_types_never_reach_the_bundle() {
        let (dir, range) = fixture();
        let git = GitIntegration::new(dir.path()).unwrap();

        let bundle = git
            .collect(&range, &DiffOptions::new(3, true, vec!["md".to_string()]))
            .unwrap();
        assert!(bundle.name_status.iter().all(|e| !e.path.ends_with(".md")));
        assert!(!bundle.body.contains("README.md"));
        assert!(bundle.body.contains("app.py"));
    }

    #[test]
    fn excluding_everything_yields_empty_body() {
        let (dir, range) = fixture();
        let git = GitIntegration::new(dir.path()).unwrap();

        let options = DiffOptions::new(3, false, vec!["py".to_string(), "md".to_string()]);
        let bundle = git.collect(&range, &options).unwrap();
        assert!(bundle.body.is_empty());
        assert!(bundle.name_status.is_empty());
    }

    #[test]
    fn unknown_revision_is_reported() {
        let (dir, range) = fixture();
        let git = GitIntegration::new(dir.path()).unwrap();

        let missing = RevisionRange {
            from: range.from,
            to: "0123456789abcdef0123456789abcdef01234567".to_string(),
        };
        let err = git.verify_range(&missing).unwrap_err();
        assert!(matches!(err, ReviewError::DiffTool(_)));
        assert!(err.to_string().contains("git fetch"));
    }

    #[test]
    fn paths_with_tabs_and_non_ascii_are_taken_verbatim() {
        let entries = parse_name_status("M\0caf\u{e9}.md\0A\0a\tb.txt\0").unwrap();
        assert_eq!(entries[0].path, "caf\u{e9}.md");
        assert_eq!(entries[1].path, "a\tb.txt");
    }

    #[test]
    fn non_ascii_file_names_are_not_quoted() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        fs::write(dir.path().join("caf\u{e9}.py"), "x = 1\n").unwrap();
        let from = commit_all(&repo, "base");
        fs::write(dir.path().join("caf\u{e9}.py"), "x = 2\n").unwrap();
        fs::write(dir.path().join("na\u{ef}ve.py"), "y = 1\n").unwrap();
        let to = commit_all(&repo, "change");

        let git = GitIntegration::new(dir.path()).unwrap();
        let range = RevisionRange { from, to };
        let entries = git.name_status(&range, &[]).unwrap();
        let pairs: Vec<(ChangeKind, &str)> =
            entries.iter().map(|e| (e.kind, e.path.as_str())).collect();
        assert!(pairs.contains(&(ChangeKind::Modified, "caf\u{e9}.py")));
        assert!(pairs.contains(&(ChangeKind::Added, "na\u{ef}ve.py")));

        let body = git
            .unified_diff(&range, &DiffOptions::new(3, false, Vec::new()))
            .unwrap();
        assert!(body.contains("diff --git a/caf\u{e9}.py b/caf\u{e9}.py"));
    }
}
