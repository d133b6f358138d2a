use std::{
    collections::HashSet,
    env, fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{anyhow, Context};
use clap::{ArgAction, Parser};
use console::style;
use globset::GlobSet;
use ortho_core::{
    mapper, Category, CheckCycle, Checker, CycleSignal, HttpChecker, LineBuffer, OriginalWord,
    Pending, ReplaceOutcome, Settings, TextBuffer, DEFAULT_CONFIG_FILE,
};
use serde::Serialize;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Orthography CLI entry point.
#[derive(Debug, Parser)]
#[command(name = "ortho", about = "Check spelling and grammar through a remote checker.")]
struct Args {
    /// Path to config file (YAML). Defaults to orthography.yml if present.
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Override the checker endpoint.
    #[arg(long, value_name = "URL")]
    endpoint: Option<String>,

    /// Emit JSON output for automation.
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Apply the first suggestion of every issue and write the file back.
    #[arg(long, action = ArgAction::SetTrue)]
    fix: bool,

    /// Only print the summary.
    #[arg(long, action = ArgAction::SetTrue)]
    quiet: bool,

    /// Report only these categories (comma-separated).
    #[arg(long, value_delimiter = ',', value_name = "CAT[,CAT]")]
    only: Vec<String>,

    /// Disable categories (comma-separated).
    #[arg(long, value_delimiter = ',', value_name = "CAT[,CAT]")]
    disable: Vec<String>,

    /// Files or directories to check.
    #[arg(value_name = "PATH", default_value = ".", num_args = 0..)]
    paths: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
struct IssueReport {
    line: Option<usize>,
    column: Option<usize>,
    begin: i64,
    category: Category,
    highlight_text: String,
    replacements: Vec<String>,
    explanation: String,
}

#[derive(Debug, Serialize)]
struct FileResult {
    path: String,
    issues: Vec<IssueReport>,
    fixed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct OutputReport {
    files: Vec<FileResult>,
    total_issues: usize,
    total_fixed: usize,
    failed: usize,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_env("ORTHO_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    run(args).await
}

async fn run(args: Args) -> anyhow::Result<()> {
    let (mut settings, config_root) = load_settings(&args.config)?;
    if let Some(endpoint) = &args.endpoint {
        settings.endpoint = endpoint.clone();
    }
    for name in &args.disable {
        let category = parse_category(name)?;
        settings.categories.disable.push(category);
    }
    let only = args
        .only
        .iter()
        .map(|name| parse_category(name))
        .collect::<anyhow::Result<HashSet<_>>>()?;

    let exclude = settings
        .exclude_set()
        .context("Invalid exclude patterns")?;
    let mut files = collect_files(&args.paths, exclude.as_ref())?;
    files.sort();

    let checker = Arc::new(HttpChecker::new(settings.endpoint.clone()));
    let mut cycle = CheckCycle::new(checker, &settings);

    let mut results = Vec::new();
    let mut total_issues = 0usize;
    let mut total_fixed = 0usize;
    let mut failed = 0usize;

    for path in files {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let rel_path = pathdiff::diff_paths(&path, &config_root).unwrap_or_else(|| path.clone());
        let display = rel_path.to_string_lossy().replace('\\', "/");

        let mut buffer = LineBuffer::new(&content);
        let checked = check_document(&mut cycle, &mut buffer, &only, args.fix).await;
        let result = match checked {
            Ok(checked) => {
                if checked.fixed > 0 {
                    fs::write(&path, buffer.text())
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                }
                total_issues += checked.issues.len();
                total_fixed += checked.fixed;
                FileResult {
                    path: display,
                    issues: checked.issues,
                    fixed: checked.fixed,
                    error: None,
                }
            }
            Err(err) => {
                warn!(path = %path.display(), "{err:#}");
                failed += 1;
                FileResult {
                    path: display,
                    issues: Vec::new(),
                    fixed: 0,
                    error: Some(format!("{err:#}")),
                }
            }
        };

        if !args.quiet && !args.json {
            print_human_report(&result);
        }
        results.push(result);
    }

    let output = OutputReport {
        files: results,
        total_issues,
        total_fixed,
        failed,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        let mut summary = format!(
            "\n{} files, {} issues",
            output.files.len(),
            output.total_issues
        );
        if args.fix {
            summary.push_str(&format!(", {} fixed", output.total_fixed));
        }
        if output.failed > 0 {
            summary.push_str(&format!(", {} failed", output.failed));
        }
        println!("{summary}");
    }

    if output.failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

#[derive(Debug)]
struct CheckedDocument {
    issues: Vec<IssueReport>,
    fixed: usize,
}

/// Check one document and optionally apply fixes in place.
async fn check_document<C: Checker>(
    cycle: &mut CheckCycle<C>,
    buffer: &mut LineBuffer,
    only: &HashSet<Category>,
    fix: bool,
) -> anyhow::Result<CheckedDocument> {
    let presented = match cycle.check_now(buffer).await {
        CycleSignal::Presented(issues) => issues,
        CycleSignal::NoIssues => Vec::new(),
        signal @ (CycleSignal::ServiceUnreachable | CycleSignal::Superseded) => {
            return Err(anyhow!(signal
                .notice()
                .unwrap_or("The check did not complete.")));
        }
    };
    let selected: Vec<Pending> = presented
        .into_iter()
        .filter(|pending| only.is_empty() || only.contains(&pending.issue.category))
        .collect();

    let issues = selected
        .iter()
        .map(|pending| report_for(buffer, pending))
        .collect();

    let mut fixed = 0;
    if fix {
        // Last to first, so the flat offsets of earlier issues still hold.
        let mut order: Vec<&Pending> = selected.iter().collect();
        order.sort_by_key(|pending| std::cmp::Reverse(pending.issue.begin));
        let mut written: Vec<OriginalWord> = Vec::new();
        for pending in order {
            let Some(suggestion) = pending.issue.suggestions().into_iter().next() else {
                continue;
            };
            let word = OriginalWord::anchor(&pending.issue);
            if written.iter().any(|done| overlaps(done, &word)) {
                debug!(slot = pending.slot, "fix overlaps an applied one; skipped");
                continue;
            }
            match cycle.replace(pending.slot, &suggestion.replacement, buffer) {
                ReplaceOutcome::Applied { .. } | ReplaceOutcome::Exhausted => {
                    fixed += 1;
                    written.push(word);
                }
                outcome => debug!(slot = pending.slot, ?outcome, "fix skipped"),
            }
        }
    }
    cycle.close(buffer);

    Ok(CheckedDocument { issues, fixed })
}

/// Two anchors touch the same text. Anchors starting at the same offset
/// always collide, even when one of them is empty.
fn overlaps(a: &OriginalWord, b: &OriginalWord) -> bool {
    a.begin == b.begin || (a.begin < b.end && b.begin < a.end)
}

fn report_for(buffer: &LineBuffer, pending: &Pending) -> IssueReport {
    let issue = &pending.issue;
    let position = mapper::resolve(buffer, issue.begin);
    IssueReport {
        line: position.map(|p| p.line + 1),
        column: position.map(|p| p.column + 1),
        begin: issue.begin,
        category: issue.category,
        highlight_text: if issue.highlight_text.is_empty() {
            issue.text.clone()
        } else {
            issue.highlight_text.clone()
        },
        replacements: issue.replacements.clone(),
        explanation: issue.explanation.clone(),
    }
}

fn print_human_report(result: &FileResult) {
    if let Some(error) = &result.error {
        println!("{} {}", style(&result.path).bold(), style(error).red());
        return;
    }
    if result.issues.is_empty() {
        println!("{} {}", style(&result.path).bold(), style("clean").green());
        return;
    }
    for issue in &result.issues {
        let location = match (issue.line, issue.column) {
            (Some(line), Some(column)) => format!("{line}:{column}"),
            _ => "?:?".to_string(),
        };
        let mut line = format!(
            "{}:{} [{}] {}",
            style(&result.path).bold(),
            location,
            style(issue.category).yellow(),
            style(&issue.highlight_text).cyan()
        );
        if !issue.replacements.is_empty() {
            line.push_str(&format!(" → {}", issue.replacements.join(" / ")));
        }
        if !issue.explanation.is_empty() {
            line.push_str(&format!(" ({})", issue.explanation));
        }
        println!("{line}");
    }
    if result.fixed > 0 {
        println!("  fixed {} in {}", result.fixed, result.path);
    }
}

fn collect_files(paths: &[PathBuf], ignore: Option<&GlobSet>) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut walker = WalkDir::new(path).into_iter();
            while let Some(entry_res) = walker.next() {
                let entry = entry_res?;
                let entry_path = entry.path();
                if let Some(set) = ignore {
                    if set.is_match(entry_path) {
                        if entry.file_type().is_dir() {
                            walker.skip_current_dir();
                        }
                        continue;
                    }
                }
                if entry.file_type().is_file() && is_supported(entry_path) {
                    files.push(entry_path.to_path_buf());
                }
            }
        } else if path.is_file() {
            if let Some(set) = ignore {
                if set.is_match(path) {
                    continue;
                }
            }
            files.push(path.clone());
        }
    }
    Ok(files)
}

fn is_supported(path: &Path) -> bool {
    match path.extension().and_then(|s| s.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "md" | "markdown" | "txt"
        ),
        None => false,
    }
}

fn load_settings(path: &Path) -> anyhow::Result<(Settings, PathBuf)> {
    let settings = Settings::load(path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    let root = match path.parent().filter(|p| path.exists() && !p.as_os_str().is_empty()) {
        Some(parent) => parent.to_path_buf(),
        None => env::current_dir()?,
    };
    Ok((settings, root))
}

fn parse_category(name: &str) -> anyhow::Result<Category> {
    Category::parse(name.trim()).ok_or_else(|| anyhow!("Unknown category `{}`", name.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ortho_core::{CheckError, Issue};
    use std::sync::Mutex;

    struct FixedChecker {
        issues: Mutex<Option<Result<Vec<Issue>, CheckError>>>,
    }

    impl FixedChecker {
        fn new(result: Result<Vec<Issue>, CheckError>) -> Arc<Self> {
            Arc::new(Self {
                issues: Mutex::new(Some(result)),
            })
        }
    }

    impl Checker for FixedChecker {
        async fn check(&self, _text: String) -> Result<Vec<Issue>, CheckError> {
            self.issues.lock().unwrap().take().unwrap_or(Ok(Vec::new()))
        }
    }

    fn issue(begin: i64, text: &str, replacement: &str, explanation: &str) -> Issue {
        Issue {
            begin,
            text: text.into(),
            highlight_text: text.into(),
            replacements: vec![replacement.into()],
            explanation: explanation.into(),
            ..Issue::default()
        }
    }

    #[tokio::test]
    async fn fix_applies_every_first_suggestion() {
        let checker = FixedChecker::new(Ok(vec![
            issue(0, "Teh", "The", "spelling"),
            issue(8, "iz", "is", "verb"),
            issue(12, "realy", "really", "spelling 2"),
        ]));
        let mut cycle = CheckCycle::new(checker, &Settings::default());
        let mut buffer = LineBuffer::new("Teh cat\niz  realy fat");

        let checked = check_document(&mut cycle, &mut buffer, &HashSet::new(), true)
            .await
            .unwrap();

        assert_eq!(checked.fixed, 3);
        assert_eq!(buffer.text(), "The cat\nis  really fat");
        assert_eq!(checked.issues[1].line, Some(2));
        assert_eq!(checked.issues[1].column, Some(1));
    }

    #[tokio::test]
    async fn only_filter_limits_report_and_fixes() {
        let mut wordy = issue(4, "very", "", "wordy");
        wordy.category = Category::Wordiness;
        let checker = FixedChecker::new(Ok(vec![issue(0, "Teh", "The", "spelling"), wordy]));
        let mut cycle = CheckCycle::new(checker, &Settings::default());
        let mut buffer = LineBuffer::new("Teh very cat");
        let only = HashSet::from([Category::Wordiness]);

        let checked = check_document(&mut cycle, &mut buffer, &only, true)
            .await
            .unwrap();

        assert_eq!(checked.issues.len(), 1);
        assert_eq!(buffer.text(), "Teh  cat");
    }

    #[tokio::test]
    async fn overlapping_fixes_apply_only_once() {
        let checker = FixedChecker::new(Ok(vec![
            issue(0, "Teh", "The", "spelling"),
            issue(0, "Teh", "Tea", "style"),
            issue(4, "cta", "cat", "spelling 2"),
        ]));
        let mut cycle = CheckCycle::new(checker, &Settings::default());
        let mut buffer = LineBuffer::new("Teh cta");

        let checked = check_document(&mut cycle, &mut buffer, &HashSet::new(), true)
            .await
            .unwrap();

        assert_eq!(checked.issues.len(), 3);
        assert_eq!(checked.fixed, 2);
        assert_eq!(buffer.text(), "The cat");
    }

    #[tokio::test]
    async fn service_failure_is_an_error() {
        let checker = FixedChecker::new(Err(CheckError::Status(500)));
        let mut cycle = CheckCycle::new(checker, &Settings::default());
        let mut buffer = LineBuffer::new("text");

        let err = check_document(&mut cycle, &mut buffer, &HashSet::new(), false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not responding"));
    }

    #[test]
    fn unknown_category_names_are_rejected() {
        assert_eq!(parse_category(" wordiness ").unwrap(), Category::Wordiness);
        assert!(parse_category("nonsense").is_err());
    }
}
