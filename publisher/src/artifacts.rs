//! Discovery of rendered files in the output directories.
//!
//! Artifact names embed the epoch-millisecond time they were rendered at, so ordering by name
//! is ordering by age. Names are compared in natural order: digit runs compare as numbers, so
//! `a-200.mp4` sorts after `a-50.mp4`. Nothing here looks at modification times to pick the
//! latest file.

use eyre::Context;
use jiff::Timestamp;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// A rendered file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Creation time as reported by the filesystem, or modification time where creation time
    /// is not tracked.
    pub created_at: Timestamp,
}

impl Artifact {
    /// Reads the metadata of the file at `path`.
    pub async fn from_path(path: impl Into<PathBuf>) -> eyre::Result<Self> {
        let path = path.into();
        let metadata = tokio::fs::metadata(&path)
            .await
            .with_context(|| format!("stat {}", path.display()))?;
        let created = metadata
            .created()
            .or_else(|_| metadata.modified())
            .with_context(|| format!("read timestamps of {}", path.display()))?;
        let created_at = Timestamp::try_from(created)
            .with_context(|| format!("timestamp of {} is out of range", path.display()))?;
        Ok(Self {
            size_bytes: metadata.len(),
            created_at,
            path,
        })
    }

    /// The file name, lossily converted to UTF-8.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Size in megabytes, for operator-facing output.
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }

    /// MIME type implied by the file extension.
    pub fn content_type(&self) -> &'static str {
        let extension = self
            .path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase());
        match extension.as_deref() {
            Some("mp4") => "video/mp4",
            Some("jpg" | "jpeg") => "image/jpeg",
            Some("png") => "image/png",
            Some("mp3") => "audio/mpeg",
            Some("wav") => "audio/wav",
            _ => "application/octet-stream",
        }
    }
}

/// Finds artifacts in a directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactLocator;

impl ArtifactLocator {
    /// The artifact in `dir` with the greatest file name (in natural order) among those with
    /// extension `extension`.
    ///
    /// A missing directory, or one with no matching entries, is `Ok(None)`: there is simply
    /// nothing to pick.
    pub async fn latest(dir: &Path, extension: &str) -> eyre::Result<Option<Artifact>> {
        let names = matching_names(dir, &[extension]).await?;
        match names.into_iter().max_by(|a, b| natural_cmp(a, b)) {
            Some(name) => Artifact::from_path(dir.join(name)).await.map(Some),
            None => Ok(None),
        }
    }

    /// Every artifact in `dir` whose extension is one of `extensions`, by file name descending
    /// in natural order.
    pub async fn list(dir: &Path, extensions: &[&str]) -> eyre::Result<Vec<Artifact>> {
        let mut names = matching_names(dir, extensions).await?;
        names.sort_unstable_by(|a, b| natural_cmp(b, a));
        let mut artifacts = Vec::with_capacity(names.len());
        for name in names {
            artifacts.push(Artifact::from_path(dir.join(name)).await?);
        }
        Ok(artifacts)
    }
}

/// Compares `a` and `b` with digit runs read as numbers.
///
/// Leading zeros do not change a number's value. Names that compare equal that way fall back to
/// byte order, so the result is a total order.
fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (mut x, mut y) = (a.as_bytes(), b.as_bytes());
    loop {
        match (x.first(), y.first()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(cx), Some(cy)) if cx.is_ascii_digit() && cy.is_ascii_digit() => {
                let (nx, rest_x) = x.split_at(digit_run(x));
                let (ny, rest_y) = y.split_at(digit_run(y));
                let (nx, ny) = (trim_zeros(nx), trim_zeros(ny));
                let ord = nx.len().cmp(&ny.len()).then_with(|| nx.cmp(ny));
                if ord != Ordering::Equal {
                    return ord;
                }
                (x, y) = (rest_x, rest_y);
            }
            (Some(cx), Some(cy)) => {
                if cx != cy {
                    return cx.cmp(cy);
                }
                (x, y) = (&x[1..], &y[1..]);
            }
        }
    }
}

fn digit_run(s: &[u8]) -> usize {
    s.iter().take_while(|c| c.is_ascii_digit()).count()
}

fn trim_zeros(digits: &[u8]) -> &[u8] {
    let zeros = digits.iter().take_while(|&&c| c == b'0').count();
    &digits[zeros..]
}

/// Names of the regular files directly in `dir` with one of `extensions` (case-insensitive,
/// leading dot optional).
async fn matching_names(dir: &Path, extensions: &[&str]) -> eyre::Result<Vec<String>> {
    let extensions: Vec<String> = extensions
        .iter()
        .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
        .collect();

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(dir = %dir.display(), "artifact directory does not exist");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e).with_context(|| format!("list {}", dir.display())),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("list {}", dir.display()))?
    {
        let file_type = entry
            .file_type()
            .await
            .with_context(|| format!("inspect {}", entry.path().display()))?;
        if !file_type.is_file() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            tracing::debug!(path = %entry.path().display(), "skipping non-UTF-8 file name");
            continue;
        };
        let matches = Path::new(&name)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| extensions.iter().any(|want| e.eq_ignore_ascii_case(want)));
        if matches {
            names.push(name);
        }
    }
    Ok(names)
}
