//! Command-line arguments and their mapping onto merge options.

use anyhow::Context;
use clap::Parser;
use mailmerge_core::Opts;
use std::path::{Path, PathBuf};

/// Send personalized email to every row of a Google Sheets recipient list.
///
/// The sheet needs `TO`, `CC` and/or `BCC` columns; every column is available
/// to the templates as `{{COLUMN}}`.
#[derive(Debug, Parser)]
#[command(name = "mailmerge", version)]
pub struct Args {
    /// JSON file with merge options; flags override its values.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Spreadsheet id or URL.
    #[arg(long)]
    pub sheet_id: Option<String>,

    /// 0-based sheet (tab) index.
    #[arg(long)]
    pub sheet_index: Option<usize>,

    /// Leading rows excluded from data; the first holds column names.
    #[arg(long = "sheet-header-rows")]
    pub header_row_count: Option<u32>,

    /// Subject template file.
    #[arg(long, value_name = "FILE")]
    pub subject_template: Option<PathBuf>,

    /// HTML body template file.
    #[arg(long, value_name = "FILE")]
    pub html_template: Option<PathBuf>,

    /// Plain-text body template file.
    #[arg(long, value_name = "FILE")]
    pub text_template: Option<PathBuf>,

    /// Inline file, referenced from HTML as `cid:<file name>` (repeatable).
    #[arg(long = "inline", value_name = "FILE")]
    pub inline_files: Vec<PathBuf>,

    /// Attachment file (repeatable).
    #[arg(long = "attachment", value_name = "FILE")]
    pub attachment_files: Vec<PathBuf>,

    /// Gmail user id to send as; defaults to the authenticated account.
    #[arg(long, default_value = "")]
    pub user_id: String,

    /// `OAuth2` access token with Sheets read and Gmail send scopes.
    #[arg(long, env = "GOOGLE_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: String,

    /// Build every message and print a summary without sending.
    #[arg(long)]
    pub dry_run: bool,
}

impl Args {
    /// Builds merge options from the config file (if any) and the flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed.
    pub fn opts<T>(&self, transport: T) -> anyhow::Result<Opts<T>> {
        let base = match &self.config {
            Some(path) => read_config(path)?,
            None => Opts::default(),
        };
        Ok(self.apply(Opts {
            transport: Some(transport),
            ..base
        }))
    }

    /// Overrides option values with the flags that were given.
    fn apply<T>(&self, mut opts: Opts<T>) -> Opts<T> {
        if let Some(sheet_id) = &self.sheet_id {
            opts.sheet_id.clone_from(sheet_id);
        }
        if let Some(index) = self.sheet_index {
            opts.sheet_index = index;
        }
        if let Some(count) = self.header_row_count {
            opts.header_row_count = count;
        }
        if let Some(path) = &self.subject_template {
            opts.subject_template.clone_from(path);
        }
        if self.html_template.is_some() {
            opts.html_template.clone_from(&self.html_template);
        }
        if self.text_template.is_some() {
            opts.text_template.clone_from(&self.text_template);
        }
        if !self.inline_files.is_empty() {
            opts.inline_files.clone_from(&self.inline_files);
        }
        if !self.attachment_files.is_empty() {
            opts.attachment_files.clone_from(&self.attachment_files);
        }
        opts
    }
}

fn read_config<T>(path: &Path) -> anyhow::Result<Opts<T>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use mailmerge_core::DEFAULT_HEADER_ROW_COUNT;

    fn parse(args: &[&str]) -> Args {
        let mut argv = vec!["mailmerge", "--access-token", "t"];
        argv.extend_from_slice(args);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_flags_only() {
        let args = parse(&[
            "--sheet-id",
            "1AbC",
            "--subject-template",
            "subject.txt",
            "--html-template",
            "body.html",
            "--inline",
            "a.png",
            "--inline",
            "b.png",
            "--attachment",
            "report.pdf",
        ]);
        let opts = args.opts(()).unwrap();

        assert!(opts.validate().is_ok());
        assert_eq!(opts.sheet_id, "1AbC");
        assert_eq!(opts.header_row_count, DEFAULT_HEADER_ROW_COUNT);
        assert_eq!(opts.inline_files, vec![PathBuf::from("a.png"), PathBuf::from("b.png")]);
        assert_eq!(opts.attachment_files, vec![PathBuf::from("report.pdf")]);
        assert!(opts.text_template.is_none());
        assert!(!args.dry_run);
        assert_eq!(args.user_id, "");
    }

    #[test]
    fn test_flags_override_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("merge.json");
        std::fs::write(
            &config,
            r#"{
                "sheet_id": "from-file",
                "sheet_index": 2,
                "header_row_count": 3,
                "subject_template": "file-subject.txt",
                "text_template": "file-body.txt",
                "attachment_files": ["file.pdf"]
            }"#,
        )
        .unwrap();

        let args = parse(&[
            "--config",
            config.to_str().unwrap(),
            "--sheet-header-rows",
            "1",
            "--attachment",
            "flag.pdf",
            "--dry-run",
        ]);
        let opts = args.opts(()).unwrap();

        assert_eq!(opts.sheet_id, "from-file");
        assert_eq!(opts.sheet_index, 2);
        assert_eq!(opts.header_row_count, 1);
        assert_eq!(opts.subject_template, PathBuf::from("file-subject.txt"));
        assert_eq!(opts.text_template, Some(PathBuf::from("file-body.txt")));
        assert_eq!(opts.attachment_files, vec![PathBuf::from("flag.pdf")]);
        assert!(opts.transport.is_some());
        assert!(args.dry_run);
    }

    #[test]
    fn test_bad_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("merge.json");
        std::fs::write(&config, "{ not json").unwrap();

        let args = parse(&["--config", config.to_str().unwrap()]);
        let err = args.opts(()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));

        let args = parse(&["--config", dir.path().join("missing.json").to_str().unwrap()]);
        assert!(args.opts(()).is_err());
    }

    #[test]
    fn test_missing_options_fail_validation() {
        let opts = parse(&[]).opts(()).unwrap();
        let err = opts.validate().unwrap_err();
        assert_eq!(
            err.fields(),
            vec!["sheet_id", "subject_template", "html_template/text_template"]
        );
    }

    #[test]
    fn test_access_token_is_required() {
        // Only meaningful when the variable is not set in the test environment.
        if std::env::var_os("GOOGLE_ACCESS_TOKEN").is_none() {
            assert!(Args::try_parse_from(["mailmerge", "--sheet-id", "x"]).is_err());
        }
    }
}
