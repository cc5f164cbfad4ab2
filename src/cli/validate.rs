//! Input validators for qlik-cli invocations.
//!
//! Pure predicates, except for the filesystem checks which only inspect
//! metadata and never write. Operations run these before building an
//! argument vector so invalid input never reaches a subprocess.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::QlikError;

/// Host suffixes accepted for Qlik Cloud tenants.
static TENANT_HOST_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^[A-Za-z0-9.-]+\.qlikcloud\.com$",
        r"^[A-Za-z0-9.-]+\.us\.qlikcloud\.com$",
        r"^[A-Za-z0-9.-]+\.eu\.qlikcloud\.com$",
        r"^[A-Za-z0-9.-]+\.ap\.qlikcloud\.com$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// Returns true when `path` is an existing regular file that can be opened.
pub fn is_readable_file(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    path.is_file() && std::fs::File::open(path).is_ok()
}

/// Returns true when `path` is a writable directory, or does not exist yet
/// but its parent is a writable directory.
pub fn is_writable_directory_or_creatable(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    if path.exists() {
        return path.is_dir() && is_writable(path);
    }
    match path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => is_writable(Path::new(".")),
        Some(parent) => parent.is_dir() && is_writable(parent),
        None => false,
    }
}

#[cfg(unix)]
pub(crate) fn is_writable(path: &Path) -> bool {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: c_path is a valid NUL-terminated string that outlives the call.
    unsafe { libc::access(c_path.as_ptr(), libc::W_OK) == 0 }
}

#[cfg(not(unix))]
pub(crate) fn is_writable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| !m.permissions().readonly())
        .unwrap_or(false)
}

/// Available bytes on the filesystem holding `path`, or `None` when the
/// platform cannot report it.
#[cfg(unix)]
pub fn available_disk_space(path: &Path) -> Option<u64> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).ok()?;
    // SAFETY: statvfs is plain old data; all-zero is a valid bit pattern.
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    // SAFETY: c_path is NUL-terminated and stat is a properly sized out-param.
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if rc != 0 {
        return None;
    }
    let free = (stat.f_frsize as u64).saturating_mul(stat.f_bavail as u64);
    Some(free)
}

#[cfg(not(unix))]
pub fn available_disk_space(_path: &Path) -> Option<u64> {
    None
}

/// Check a tenant URL: `https` scheme and a Qlik Cloud host.
///
/// Raises `QlikError::Validation` naming the problem. Use
/// [`is_valid_tenant_url`] where a boolean answer is wanted.
pub fn validate_tenant_url(url: &str) -> crate::Result<()> {
    let trimmed = url.trim();
    let (scheme, rest) = trimmed.split_once("://").ok_or_else(|| {
        QlikError::Validation(format!("invalid tenant URL format: '{}'", url))
    })?;

    if !scheme.eq_ignore_ascii_case("https") {
        return Err(QlikError::Validation(format!(
            "tenant URL must use https, got '{}': {}",
            scheme, url
        )));
    }

    let authority = rest
        .split(|c: char| c == '/' || c == '?' || c == '#')
        .next()
        .unwrap_or_default();
    let host_port = authority.rsplit('@').next().unwrap_or_default();
    let host = match host_port.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => host_port,
    };

    if host.is_empty() {
        return Err(QlikError::Validation(format!(
            "tenant URL has no host: {}",
            url
        )));
    }

    let host = host.to_ascii_lowercase();
    if !TENANT_HOST_PATTERNS.iter().any(|re| re.is_match(&host)) {
        return Err(QlikError::Validation(format!(
            "tenant URL host '{}' is not a Qlik Cloud domain",
            host
        )));
    }

    Ok(())
}

/// Boolean form of [`validate_tenant_url`].
pub fn is_valid_tenant_url(url: &str) -> bool {
    validate_tenant_url(url).is_ok()
}

/// Export formats understood by `qlik app export`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Qvf,
    Json,
    Xlsx,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Qvf => "qvf",
            ExportFormat::Json => "json",
            ExportFormat::Xlsx => "xlsx",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = QlikError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "qvf" => Ok(ExportFormat::Qvf),
            "json" => Ok(ExportFormat::Json),
            "xlsx" => Ok(ExportFormat::Xlsx),
            _ => Err(QlikError::Validation(format!(
                "invalid export format: {}. Valid formats: qvf, json, xlsx",
                s
            ))),
        }
    }
}

/// Case-insensitive membership in {qvf, json, xlsx}.
pub fn is_valid_export_format(format: &str) -> bool {
    format.parse::<ExportFormat>().is_ok()
}

pub fn is_non_negative_int(n: i64) -> bool {
    n >= 0
}

/// Require a non-negative integer, naming the field on failure.
pub fn require_non_negative(field: &str, n: i64) -> crate::Result<u64> {
    if !is_non_negative_int(n) {
        return Err(QlikError::Validation(format!(
            "{} must be a non-negative integer: {}",
            field, n
        )));
    }
    Ok(n as u64)
}

/// Require a non-blank string, returning it trimmed.
pub fn require_non_empty<'a>(field: &str, value: &'a str) -> crate::Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(QlikError::Validation(format!("{} cannot be empty", field)));
    }
    Ok(trimmed)
}
