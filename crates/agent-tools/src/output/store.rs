//! Session-scoped storage for large tool outputs.
//!
//! Layout: `<output_root>/<session_id>/tool_<YYYYMMDD>_<HHMMSS>_<tool>.<json|txt>`.
//! The file name doubles as the capability the model presents later, so
//! [`OutputReference::parse`] is the only way back from a name to a path.

use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use parking_lot::RwLock;
use regex::Regex;
use serde::Serialize;

use super::classifier::DEFAULT_LARGE_OUTPUT_THRESHOLD;
use super::config::ToolOutputConfig;
use super::error::{OutputError, Result};
use super::extract::extract_actual_content;

const FILENAME_PREFIX: &str = "tool_";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const MAX_TOOL_NAME_LEN: usize = 64;
const MAX_REFERENCE_LEN: usize = 255;
/// Disambiguating suffixes tried before a write gives up.
const MAX_NAME_ATTEMPTS: usize = 1000;

fn reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^tool_[0-9]{8}_[0-9]{6}_[A-Za-z0-9_-]+\.(json|txt)$")
            .expect("reference pattern is a valid regex")
    })
}

/// A validated output file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct OutputReference(String);

impl OutputReference {
    /// Validate a file name presented by the model.
    ///
    /// Checks are purely structural and run before any filesystem access,
    /// so every rejection looks the same whether or not the file exists.
    pub fn parse(filename: &str) -> Result<Self> {
        if let Some(reason) = rejection_reason(filename) {
            log::debug!("Rejected output reference {:?}: {}", filename, reason);
            return Err(OutputError::InvalidReference(filename.to_string()));
        }
        Ok(Self(filename.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_json(&self) -> bool {
        self.0.ends_with(".json")
    }
}

impl fmt::Display for OutputReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for OutputReference {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn rejection_reason(filename: &str) -> Option<&'static str> {
    if filename.is_empty() {
        return Some("empty");
    }
    if filename.len() > MAX_REFERENCE_LEN {
        return Some("too long");
    }
    if filename.contains('\0') {
        return Some("contains NUL");
    }
    if filename.contains('/') || filename.contains('\\') {
        return Some("contains a path separator");
    }
    if filename.contains("..") {
        return Some("contains a traversal segment");
    }
    if !reference_pattern().is_match(filename) {
        return Some("does not match the output naming pattern");
    }
    None
}

fn session_rejection_reason(session_id: &str) -> Option<&'static str> {
    if session_id.len() > MAX_REFERENCE_LEN {
        return Some("too long");
    }
    if session_id.contains('\0') {
        return Some("contains NUL");
    }
    if session_id.contains('/') || session_id.contains('\\') {
        return Some("contains a path separator");
    }
    if session_id == "." || session_id.contains("..") {
        return Some("contains a traversal segment");
    }
    None
}

/// Check that `session_id` names one directory directly under the output
/// root. The empty id (store in the root itself) is accepted.
pub fn validate_session_id(session_id: &str) -> Result<()> {
    match session_rejection_reason(session_id) {
        Some(reason) => {
            log::debug!("Rejected session id {:?}: {}", session_id, reason);
            Err(OutputError::InvalidSession(session_id.to_string()))
        }
        None => Ok(()),
    }
}

/// A file written by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredOutput {
    pub reference: OutputReference,
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Clone)]
struct StoreState {
    output_root: PathBuf,
    session_id: String,
    threshold: u32,
    enabled: bool,
    virtual_tools_enabled: bool,
}

/// Writes large outputs for one session and resolves references to them.
///
/// All configuration is mutable through `&self` so a shared store can be
/// rotated to a new session without being rebuilt.
#[derive(Debug)]
pub struct SessionOutputStore {
    state: RwLock<StoreState>,
}

impl SessionOutputStore {
    pub fn new(output_root: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            state: RwLock::new(StoreState {
                output_root: output_root.into(),
                session_id: session_id.into(),
                threshold: DEFAULT_LARGE_OUTPUT_THRESHOLD,
                enabled: true,
                virtual_tools_enabled: true,
            }),
        }
    }

    pub fn from_config(config: &ToolOutputConfig) -> Self {
        let store = Self::new(config.output_folder.clone(), config.resolved_session_id());
        store.set_threshold(config.threshold);
        store.set_enabled(config.enabled);
        store.set_virtual_tools_enabled(config.virtual_tools_enabled);
        store
    }

    pub fn output_root(&self) -> PathBuf {
        self.state.read().output_root.clone()
    }

    pub fn set_output_root(&self, output_root: impl Into<PathBuf>) {
        self.state.write().output_root = output_root.into();
    }

    pub fn session_id(&self) -> String {
        self.state.read().session_id.clone()
    }

    /// Rotate to another session; ids that would leave the output root are rejected.
    pub fn set_session_id(&self, session_id: impl Into<String>) -> Result<()> {
        let session_id = session_id.into();
        validate_session_id(&session_id)?;
        self.state.write().session_id = session_id;
        Ok(())
    }

    pub fn threshold(&self) -> u32 {
        self.state.read().threshold
    }

    pub fn set_threshold(&self, threshold: u32) {
        self.state.write().threshold = threshold;
    }

    /// Whether large outputs are detected and offloaded at all.
    pub fn enabled(&self) -> bool {
        self.state.read().enabled
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.state.write().enabled = enabled;
    }

    pub fn virtual_tools_enabled(&self) -> bool {
        self.state.read().virtual_tools_enabled
    }

    pub fn set_virtual_tools_enabled(&self, enabled: bool) {
        self.state.write().virtual_tools_enabled = enabled;
    }

    /// Directory holding this session's outputs.
    ///
    /// An empty session id stores directly under the output root.
    pub fn session_dir(&self) -> PathBuf {
        let state = self.state.read();
        if state.session_id.is_empty() {
            state.output_root.clone()
        } else {
            state.output_root.join(&state.session_id)
        }
    }

    /// [`session_dir`](Self::session_dir), after checking the session id.
    ///
    /// The id may come from a config file or the environment, so it is
    /// re-checked on every filesystem operation.
    fn checked_session_dir(&self) -> Result<PathBuf> {
        validate_session_id(&self.session_id())?;
        Ok(self.session_dir())
    }

    /// Persist `payload` (after envelope extraction) as a new file.
    ///
    /// Never overwrites: a taken name is retried with a numeric suffix.
    pub async fn write(&self, payload: &str, tool_name: &str) -> Result<StoredOutput> {
        let content = extract_actual_content(payload);
        let dir = self.checked_session_dir()?;

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| OutputError::write_failed(&dir, e))?;
        let dir = tokio::fs::canonicalize(&dir)
            .await
            .map_err(|e| OutputError::write_failed(&dir, e))?;

        let stem = format!(
            "{}{}_{}",
            FILENAME_PREFIX,
            chrono::Local::now().format(TIMESTAMP_FORMAT),
            sanitize_tool_name(tool_name)
        );
        let extension = infer_extension(&content);
        let size = content.len() as u64;

        let path = tokio::task::spawn_blocking(move || {
            persist_new_file(&dir, &stem, extension, content.as_bytes())
        })
        .await
        .map_err(|e| OutputError::write_failed(self.session_dir(), e))??;

        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        log::info!(
            "Stored large output of '{}' ({} bytes) at {}",
            tool_name,
            size,
            path.display()
        );

        Ok(StoredOutput {
            reference: OutputReference(filename),
            path,
            size,
        })
    }

    /// Map a reference to its path inside the session directory.
    ///
    /// Does not touch the filesystem.
    pub fn resolve(&self, filename: &str) -> Result<PathBuf> {
        let reference = OutputReference::parse(filename)?;
        Ok(self.checked_session_dir()?.join(reference.as_str()))
    }

    /// Read a stored output in full.
    pub async fn read(&self, filename: &str) -> Result<String> {
        let path = self.resolve(filename)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(OutputError::NotFound(filename.to_string()))
            }
            Err(e) => Err(OutputError::read_failed(&path, e)),
        }
    }

    /// List the session's stored outputs, sorted by name.
    pub async fn list(&self) -> Result<Vec<StoredOutput>> {
        let dir = self.checked_session_dir()?;
        let mut outputs = Vec::new();

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(outputs),
            Err(e) => return Err(OutputError::read_failed(&dir, e)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| OutputError::read_failed(&dir, e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            let Ok(reference) = OutputReference::parse(&name) else {
                continue;
            };
            let metadata = entry
                .metadata()
                .await
                .map_err(|e| OutputError::read_failed(entry.path(), e))?;
            if !metadata.is_file() {
                continue;
            }

            outputs.push(StoredOutput {
                reference,
                path: entry.path(),
                size: metadata.len(),
            });
        }

        outputs.sort_by(|left, right| left.reference.as_str().cmp(right.reference.as_str()));
        Ok(outputs)
    }
}

/// Write `content` to a temp file, then link it under the first free name.
fn persist_new_file(dir: &Path, stem: &str, extension: &str, content: &[u8]) -> Result<PathBuf> {
    let mut temp = tempfile::Builder::new()
        .prefix(".tool_")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| OutputError::write_failed(dir, e))?;
    temp.write_all(content)
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| OutputError::write_failed(temp.path(), e))?;

    for attempt in 1..=MAX_NAME_ATTEMPTS {
        let filename = if attempt == 1 {
            format!("{stem}.{extension}")
        } else {
            format!("{stem}_{attempt}.{extension}")
        };
        let path = dir.join(&filename);

        match temp.persist_noclobber(&path) {
            Ok(_) => return Ok(path),
            Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => {
                log::debug!("Output name {} taken, retrying with a suffix", filename);
                temp = err.file;
            }
            Err(err) => return Err(OutputError::write_failed(&path, err.error)),
        }
    }

    Err(OutputError::write_failed(
        dir.join(format!("{stem}.{extension}")),
        format!("no free file name after {MAX_NAME_ATTEMPTS} attempts"),
    ))
}

/// Reduce a tool name to `[A-Za-z0-9_-]`, never empty.
pub fn sanitize_tool_name(tool_name: &str) -> String {
    let sanitized: String = tool_name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_TOOL_NAME_LEN)
        .collect();

    if sanitized.is_empty() {
        "output".to_string()
    } else {
        sanitized
    }
}

/// `json` when the payload parses as JSON, `txt` otherwise.
pub fn infer_extension(content: &str) -> &'static str {
    if serde_json::from_str::<serde_json::Value>(content).is_ok() {
        "json"
    } else {
        "txt"
    }
}

/// First `max_chars` characters of `content`.
pub fn preview(content: &str, max_chars: usize) -> &str {
    match content.char_indices().nth(max_chars) {
        Some((index, _)) => &content[..index],
        None => content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;
    use std::sync::Arc;

    use tempfile::tempdir;

    #[test]
    fn reference_accepts_store_names() {
        for name in [
            "tool_20250721_091511_tavily-search.json",
            "tool_20250731_143800_test_tool.json",
            "tool_20250731_143800_test_tool_2.txt",
        ] {
            assert!(OutputReference::parse(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn reference_rejects_traversal_and_separators() {
        for name in [
            "../tool_20250721_091511_x.json",
            "tool_20250721_091511_x..json",
            "sub/tool_20250721_091511_x.json",
            "sub\\tool_20250721_091511_x.json",
            "/etc/passwd",
            "..",
        ] {
            assert_eq!(
                OutputReference::parse(name),
                Err(OutputError::InvalidReference(name.to_string())),
                "{name}"
            );
        }
    }

    #[test]
    fn reference_rejects_foreign_names() {
        for name in [
            "",
            "invalid_filename.txt",
            "tool_.json",
            "tool_2025_091511_x.json",
            "tool_20250721_091511_x.exe",
            "tool_20250721_091511_x.json\0",
        ] {
            assert!(OutputReference::parse(name).is_err(), "{name:?}");
        }
    }

    #[test]
    fn resolve_joins_session_dir() {
        let store = SessionOutputStore::new("/outputs", "session-1");
        let path = store.resolve("tool_20250721_091511_search.json").unwrap();
        assert_eq!(path, PathBuf::from("/outputs/session-1/tool_20250721_091511_search.json"));
    }

    #[test]
    fn resolve_rejects_existing_file_outside_pattern() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("secret.txt"), "nope").unwrap();

        let store = SessionOutputStore::new(dir.path(), "");
        assert!(matches!(
            store.resolve("secret.txt"),
            Err(OutputError::InvalidReference(_))
        ));
    }

    #[test]
    fn session_rotation_changes_directory() {
        let store = SessionOutputStore::new("/outputs", "a");
        store.set_session_id("b").unwrap();
        store.set_threshold(42);

        assert_eq!(store.session_dir(), PathBuf::from("/outputs/b"));
        assert_eq!(store.threshold(), 42);
    }

    #[test]
    fn set_session_id_rejects_escaping_ids() {
        let store = SessionOutputStore::new("/outputs", "a");

        for session in ["../escape", "..", ".", "a/b", "a\\b", "/abs", "x\0y"] {
            assert_eq!(
                store.set_session_id(session),
                Err(OutputError::InvalidSession(session.to_string())),
                "{session:?}"
            );
        }
        assert_eq!(store.session_id(), "a");
        assert!(store.set_session_id("run-2025.07.21_1").is_ok());
    }

    #[tokio::test]
    async fn unchecked_session_id_is_rejected_on_use() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("root");
        let store = SessionOutputStore::new(&root, "../outside");

        assert!(matches!(
            store.write("payload", "tool").await,
            Err(OutputError::InvalidSession(_))
        ));
        assert!(matches!(
            store.resolve("tool_20250721_091511_x.json"),
            Err(OutputError::InvalidSession(_))
        ));
        assert!(matches!(store.list().await, Err(OutputError::InvalidSession(_))));
        assert!(!dir.path().join("outside").exists());
    }

    #[test]
    fn sanitizes_tool_names() {
        assert_eq!(sanitize_tool_name("aws::s3 list/objects"), "aws__s3_list_objects");
        assert_eq!(sanitize_tool_name("../../"), "______");
        assert_eq!(sanitize_tool_name("   "), "output");
        assert_eq!(sanitize_tool_name(&"x".repeat(200)).len(), MAX_TOOL_NAME_LEN);
    }

    #[test]
    fn infers_extension_from_content() {
        assert_eq!(infer_extension(r#"{"a":1}"#), "json");
        assert_eq!(infer_extension("[1, 2]"), "json");
        assert_eq!(infer_extension("plain text"), "txt");
        assert_eq!(infer_extension("{broken"), "txt");
    }

    #[test]
    fn preview_respects_char_boundaries() {
        assert_eq!(preview("héllo world", 2), "hé");
        assert_eq!(preview("short", 100), "short");
    }

    #[tokio::test]
    async fn write_extracts_and_names_file() {
        let dir = tempdir().unwrap();
        let store = SessionOutputStore::new(dir.path(), "test-session-123");

        let mcp_content = r#"{"type":"text","text":"{\"name\":\"test\",\"value\":123,\"items\":[\"a\",\"b\",\"c\"]}"}"#;
        let stored = store.write(mcp_content, "test_tool").await.unwrap();

        let name = stored.reference.as_str();
        assert!(name.starts_with("tool_"));
        assert!(name.ends_with("_test_tool.json"), "{name}");
        assert!(stored.path.is_absolute());
        assert!(stored.path.starts_with(dir.path().canonicalize().unwrap().join("test-session-123")));

        let written = std::fs::read_to_string(&stored.path).unwrap();
        assert_eq!(written, r#"{"name":"test","value":123,"items":["a","b","c"]}"#);
        assert!(!written.contains(r#""type":"text""#));
        assert_eq!(stored.size, written.len() as u64);
    }

    #[tokio::test]
    async fn write_plain_text_uses_txt() {
        let dir = tempdir().unwrap();
        let store = SessionOutputStore::new(dir.path(), "s");

        let stored = store.write("line one\nline two", "grep").await.unwrap();
        assert!(stored.reference.as_str().ends_with("_grep.txt"));
        assert_eq!(store.read(stored.reference.as_str()).await.unwrap(), "line one\nline two");
    }

    #[tokio::test]
    async fn write_never_overwrites_same_second() {
        let dir = tempdir().unwrap();
        let store = SessionOutputStore::new(dir.path(), "s");

        let first = store.write("first", "same").await.unwrap();
        let second = store.write("second", "same").await.unwrap();

        assert_ne!(first.path, second.path);
        assert_eq!(std::fs::read_to_string(&first.path).unwrap(), "first");
        assert_eq!(std::fs::read_to_string(&second.path).unwrap(), "second");
    }

    #[tokio::test]
    async fn concurrent_writes_get_distinct_files() {
        let dir = tempdir().unwrap();
        let store = Arc::new(SessionOutputStore::new(dir.path(), "concurrent"));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.write(&format!("payload {i}"), "parallel").await })
            })
            .collect();

        let mut paths = HashSet::new();
        for handle in handles {
            let stored = handle.await.unwrap().unwrap();
            paths.insert(stored.path);
        }

        assert_eq!(paths.len(), 16);
        assert_eq!(store.list().await.unwrap().len(), 16);
    }

    #[tokio::test]
    async fn read_reports_missing_file_as_not_found() {
        let dir = tempdir().unwrap();
        let store = SessionOutputStore::new(dir.path(), "s");

        let result = store.read("tool_20250101_000000_missing.json").await;
        assert_eq!(
            result,
            Err(OutputError::NotFound("tool_20250101_000000_missing.json".to_string()))
        );
    }

    #[tokio::test]
    async fn list_skips_foreign_files() {
        let dir = tempdir().unwrap();
        let store = SessionOutputStore::new(dir.path(), "s");
        assert!(store.list().await.unwrap().is_empty());

        store.write("{}", "b_tool").await.unwrap();
        std::fs::write(store.session_dir().join("notes.md"), "ignored").unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].reference.as_str().ends_with("_b_tool.json"));
    }

    #[tokio::test]
    async fn write_failure_is_reported() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let store = SessionOutputStore::new(&blocker, "s");
        let result = store.write("payload", "tool").await;
        assert!(matches!(result, Err(OutputError::WriteFailed { .. })));
    }
}
