use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::parse::{parse_date_prefix, parse_fields, role_from_stem};
use super::{MemoError, MemoStatus, StatusRecord};

/// Scans one agent-sync directory.
#[derive(Debug, Clone)]
pub struct MemoScanner {
    dir: PathBuf,
    known_roles: Vec<String>,
}

impl MemoScanner {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            known_roles: Vec::new(),
        }
    }

    /// Role ids used to split `<date>_<role>_<topic>` when roles contain `_`.
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Every record in the directory, sorted by file name.
    ///
    /// A missing directory scans as empty. Files that cannot be read still
    /// yield a record, with no fields and status `draft`.
    pub fn scan(&self) -> Result<Vec<StatusRecord>, MemoError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.dir).map_err(|e| MemoError::Io {
            path: self.dir.clone(),
            message: format!("failed to read dir: {}", e),
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| MemoError::Io {
                path: self.dir.clone(),
                message: format!("failed to read entry: {}", e),
            })?;
            let path = entry.path();
            if path.is_file() && is_record_file(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        Ok(paths.iter().map(|p| self.read_record(p)).collect())
    }

    /// Records with `status`, ordered by date (undated first) then file name.
    pub fn scan_by_status(&self, status: MemoStatus) -> Result<Vec<StatusRecord>, MemoError> {
        let mut records: Vec<StatusRecord> = self
            .scan()?
            .into_iter()
            .filter(|r| r.status == status)
            .collect();
        records.sort_by(|a, b| (a.date, &a.filename).cmp(&(b.date, &b.filename)));
        Ok(records)
    }

    /// Parse one file. Never fails; problems degrade to an empty record.
    pub fn read_record(&self, path: &Path) -> StatusRecord {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let stem = path
            .file_stem()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let fields = match fs::read_to_string(path) {
            Ok(content) => parse_fields(&content),
            Err(e) => {
                warn!(path = %path.display(), "unreadable status record: {}", e);
                Default::default()
            }
        };
        debug!(file = %filename, status = ?fields.status, "parsed status record");

        StatusRecord {
            path: path.to_path_buf(),
            date: fields.date.or_else(|| parse_date_prefix(&stem)),
            role: role_from_stem(&stem, &self.known_roles),
            audience: fields.audience,
            status: fields.status.unwrap_or(MemoStatus::Draft),
            status_text: fields.status_text,
            branch: fields.branch,
            sha: fields.sha,
            work_item: fields.work_item,
            deliverables: fields.deliverables,
            token_usage: fields.token_usage,
            filename,
        }
    }
}

/// `*.md` files, skipping upper-case convention docs such as README.md.
fn is_record_file(path: &Path) -> bool {
    let is_markdown = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("md"))
        .unwrap_or(false);
    if !is_markdown {
        return false;
    }
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|stem| stem.chars().any(|c| c.is_ascii_lowercase()))
        .unwrap_or(false)
}

/// Scan `dir` with no role hints.
pub fn scan(dir: &Path) -> Result<Vec<StatusRecord>, MemoError> {
    MemoScanner::new(dir).scan()
}

/// Records in `dir` with `status`, oldest first.
pub fn scan_by_status(dir: &Path, status: MemoStatus) -> Result<Vec<StatusRecord>, MemoError> {
    MemoScanner::new(dir).scan_by_status(status)
}
