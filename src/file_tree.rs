//! Reads the directory written by `qlik app unbuild` back into memory.
//!
//! Files are classified by role from their name and location, then read as
//! text (UTF-8, then windows-1252, then latin-1) or, failing that, as tagged
//! base64. Oversized files are replaced by a placeholder.

use std::path::{Path, PathBuf};

use base64::Engine;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::QlikError;

/// Files above this many bytes are not read.
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Prefix of content that could not be decoded as text.
pub const BASE64_TAG: &str = "base64:";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub filename: String,
    /// Path relative to the unbuild directory, `/`-separated.
    pub relative_path: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnbuildFileTree {
    pub script: Option<FileRecord>,
    pub app_properties: Option<FileRecord>,
    pub connections: Option<FileRecord>,
    pub dimensions: Vec<FileRecord>,
    pub measures: Vec<FileRecord>,
    pub objects: Vec<FileRecord>,
    pub variables: Vec<FileRecord>,
    pub bookmarks: Vec<FileRecord>,
    pub other_files: Vec<FileRecord>,
}

impl UnbuildFileTree {
    pub fn file_count(&self) -> usize {
        [&self.script, &self.app_properties, &self.connections]
            .iter()
            .filter(|slot| slot.is_some())
            .count()
            + self.dimensions.len()
            + self.measures.len()
            + self.objects.len()
            + self.variables.len()
            + self.bookmarks.len()
            + self.other_files.len()
    }

    fn place(&mut self, role: FileRole, record: FileRecord) {
        let slot = match role {
            FileRole::Script => &mut self.script,
            FileRole::AppProperties => &mut self.app_properties,
            FileRole::Connections => &mut self.connections,
            FileRole::Dimensions => return self.dimensions.push(record),
            FileRole::Measures => return self.measures.push(record),
            FileRole::Objects => return self.objects.push(record),
            FileRole::Variables => return self.variables.push(record),
            FileRole::Bookmarks => return self.bookmarks.push(record),
            FileRole::Other => return self.other_files.push(record),
        };
        // Single-file roles keep the first match in walk order
        if slot.is_none() {
            *slot = Some(record);
        } else {
            self.other_files.push(record);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRole {
    Script,
    AppProperties,
    Connections,
    Dimensions,
    Measures,
    Objects,
    Variables,
    Bookmarks,
    Other,
}

/// Listed roles with the singular stem matched against names.
const LISTED_ROLES: [(FileRole, &str); 5] = [
    (FileRole::Dimensions, "dimension"),
    (FileRole::Measures, "measure"),
    (FileRole::Objects, "object"),
    (FileRole::Variables, "variable"),
    (FileRole::Bookmarks, "bookmark"),
];

/// Classify a path relative to the unbuild directory.
pub fn classify(relative: &Path) -> FileRole {
    let filename = relative
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    let extension = relative
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    if extension == "qvs" {
        return FileRole::Script;
    }
    match filename.as_str() {
        "app-properties.json" | "app_properties.json" => return FileRole::AppProperties,
        "connections.yml" | "connections.yaml" | "connections.json" => {
            return FileRole::Connections;
        }
        _ => {}
    }

    let parents: Vec<String> = relative
        .parent()
        .map(|p| {
            p.components()
                .map(|c| c.as_os_str().to_string_lossy().to_ascii_lowercase())
                .collect()
        })
        .unwrap_or_default();

    for (role, stem) in LISTED_ROLES {
        if parents.iter().any(|dir| dir.starts_with(stem)) {
            return role;
        }
        if extension == "json" && filename.starts_with(stem) {
            return role;
        }
    }
    FileRole::Other
}

/// Whether decoded text still looks binary: C0 controls other than common
/// whitespace.
fn has_binary_controls(text: &str) -> bool {
    text.chars()
        .any(|c| (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r' | '\x0C'))
}

/// windows-1252 code points for 0x80..=0x9F; `None` marks undefined bytes.
const CP1252_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'),
    None,
    Some('\u{201A}'),
    Some('\u{0192}'),
    Some('\u{201E}'),
    Some('\u{2026}'),
    Some('\u{2020}'),
    Some('\u{2021}'),
    Some('\u{02C6}'),
    Some('\u{2030}'),
    Some('\u{0160}'),
    Some('\u{2039}'),
    Some('\u{0152}'),
    None,
    Some('\u{017D}'),
    None,
    None,
    Some('\u{2018}'),
    Some('\u{2019}'),
    Some('\u{201C}'),
    Some('\u{201D}'),
    Some('\u{2022}'),
    Some('\u{2013}'),
    Some('\u{2014}'),
    Some('\u{02DC}'),
    Some('\u{2122}'),
    Some('\u{0161}'),
    Some('\u{203A}'),
    Some('\u{0153}'),
    None,
    Some('\u{017E}'),
    Some('\u{0178}'),
];

fn decode_windows_1252(bytes: &[u8]) -> Option<String> {
    bytes
        .iter()
        .map(|&b| match b {
            0x80..=0x9F => CP1252_HIGH[(b - 0x80) as usize],
            _ => Some(b as char),
        })
        .collect()
}

fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Decode file bytes, falling back to tagged base64 for binary content.
pub fn decode_content(bytes: &[u8]) -> String {
    let attempts = [
        std::str::from_utf8(bytes).ok().map(str::to_string),
        decode_windows_1252(bytes),
        Some(decode_latin1(bytes)),
    ];
    for text in attempts.into_iter().flatten() {
        if !has_binary_controls(&text) {
            return text;
        }
    }
    format!(
        "{}{}",
        BASE64_TAG,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Placeholder used in place of an oversized file's content.
pub fn oversized_placeholder(size: u64) -> String {
    format!(
        "[file too large: {} bytes exceeds the {} byte limit]",
        size, MAX_FILE_SIZE
    )
}

fn read_record(path: &Path, relative: &Path) -> FileRecord {
    let mut record = FileRecord {
        filename: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        relative_path: relative.to_string_lossy().replace('\\', "/"),
        ..FileRecord::default()
    };

    let size = match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) => {
            record.error = Some(format!("failed to stat {}: {}", path.display(), e));
            return record;
        }
    };
    record.size = size;

    if size > MAX_FILE_SIZE {
        record.content = Some(oversized_placeholder(size));
        return record;
    }

    match std::fs::read(path) {
        Ok(bytes) => record.content = Some(decode_content(&bytes)),
        Err(e) => record.error = Some(format!("failed to read {}: {}", path.display(), e)),
    }
    record
}

/// Walk `dir` and materialize every regular file, sorted by path.
///
/// Fails only when `dir` itself is unusable; per-file problems land in the
/// record's `error` field.
pub fn read_file_tree(dir: &Path) -> crate::Result<UnbuildFileTree> {
    if !dir.is_dir() {
        return Err(QlikError::NotFound(format!(
            "unbuild directory not found: {}",
            dir.display()
        )));
    }

    let mut tree = UnbuildFileTree::default();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry in unbuild directory");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path: PathBuf = entry.path().to_path_buf();
        let relative = path.strip_prefix(dir).unwrap_or(&path).to_path_buf();
        let role = classify(&relative);
        tree.place(role, read_record(&path, &relative));
    }

    tracing::debug!(
        dir = %dir.display(),
        files = tree.file_count(),
        "read unbuild file tree"
    );
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_classify_roles() {
        assert_eq!(classify(Path::new("script.qvs")), FileRole::Script);
        assert_eq!(classify(Path::new("app-properties.json")), FileRole::AppProperties);
        assert_eq!(classify(Path::new("connections.yml")), FileRole::Connections);
        assert_eq!(classify(Path::new("dimensions.json")), FileRole::Dimensions);
        assert_eq!(classify(Path::new("objects/sheet-1.json")), FileRole::Objects);
        assert_eq!(classify(Path::new("bookmarks/bm.json")), FileRole::Bookmarks);
        assert_eq!(classify(Path::new("measures.json")), FileRole::Measures);
        assert_eq!(classify(Path::new("variables.json")), FileRole::Variables);
        assert_eq!(classify(Path::new("README.md")), FileRole::Other);
        assert_eq!(classify(Path::new("dimensions.txt")), FileRole::Other);
    }

    #[test]
    fn test_decode_utf8() {
        assert_eq!(decode_content("Année;€".as_bytes()), "Année;€");
    }

    #[test]
    fn test_decode_windows_1252_fallback() {
        // 0x80 is the euro sign in windows-1252 and invalid as UTF-8
        assert_eq!(decode_content(&[b'c', b'o', b's', b't', b' ', 0x80]), "cost \u{20AC}");
    }

    #[test]
    fn test_decode_latin1_fallback() {
        // 0x81 is undefined in windows-1252
        assert_eq!(decode_content(&[b'a', 0x81, 0xE9]), "a\u{0081}\u{00E9}");
    }

    #[test]
    fn test_decode_binary_is_tagged_base64() {
        let content = decode_content(&[0x00, 0x01, 0xFF, 0xFE]);
        assert_eq!(content, "base64:AAH//g==");
    }

    #[test]
    fn test_oversized_file_gets_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let big = dir.path().join("big.qvs");
        let file = fs::File::create(&big).unwrap();
        file.set_len(MAX_FILE_SIZE + 1).unwrap();

        let tree = read_file_tree(dir.path()).unwrap();
        let script = tree.script.unwrap();
        assert_eq!(script.size, MAX_FILE_SIZE + 1);
        let content = script.content.unwrap();
        assert!(content.contains(&(MAX_FILE_SIZE + 1).to_string()), "{content}");
        assert!(content.contains(&MAX_FILE_SIZE.to_string()), "{content}");
        assert!(content.len() < 200);
    }

    #[test]
    fn test_read_tree_classifies_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("script.qvs"), "LOAD * INLINE [a\n1];").unwrap();
        fs::write(root.join("app-properties.json"), "{\"qTitle\":\"Sales\"}").unwrap();
        fs::write(root.join("connections.yml"), "connections: {}").unwrap();
        fs::write(root.join("dimensions.json"), "[]").unwrap();
        fs::create_dir(root.join("objects")).unwrap();
        fs::write(root.join("objects").join("b.json"), "{}").unwrap();
        fs::write(root.join("objects").join("a.json"), "{}").unwrap();
        fs::write(root.join("notes.txt"), "hello").unwrap();

        let tree = read_file_tree(root).unwrap();
        assert_eq!(
            tree.script.as_ref().unwrap().content.as_deref(),
            Some("LOAD * INLINE [a\n1];")
        );
        assert_eq!(tree.app_properties.as_ref().unwrap().filename, "app-properties.json");
        assert!(tree.connections.is_some());
        assert_eq!(tree.dimensions.len(), 1);
        let objects: Vec<&str> = tree.objects.iter().map(|r| r.relative_path.as_str()).collect();
        assert_eq!(objects, vec!["objects/a.json", "objects/b.json"]);
        assert_eq!(tree.other_files.len(), 1);
        assert_eq!(tree.other_files[0].size, 5);
        assert_eq!(tree.file_count(), 7);
    }

    #[test]
    fn test_second_script_goes_to_other() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.qvs"), "A").unwrap();
        fs::write(dir.path().join("b.qvs"), "B").unwrap();
        let tree = read_file_tree(dir.path()).unwrap();
        assert_eq!(tree.script.unwrap().filename, "a.qvs");
        assert_eq!(tree.other_files[0].filename, "b.qvs");
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_file_records_error_and_walk_continues() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join("a-locked.json");
        fs::write(&locked, "{}").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        fs::write(dir.path().join("b.txt"), "ok").unwrap();

        // Root ignores file modes
        if fs::read(&locked).is_ok() {
            return;
        }

        let tree = read_file_tree(dir.path()).unwrap();
        assert_eq!(tree.other_files.len(), 2);
        assert!(tree.other_files[0].error.is_some());
        assert!(tree.other_files[0].content.is_none());
        assert_eq!(tree.other_files[1].content.as_deref(), Some("ok"));
    }

    #[test]
    fn test_missing_directory_is_not_found() {
        let err = read_file_tree(Path::new("/nonexistent/unbuild/dir")).unwrap_err();
        assert!(matches!(err, QlikError::NotFound(_)));
    }
}
