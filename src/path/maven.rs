//! Classification of maven repository paths.
//!
//! Only what the expiry rules need: snapshot flavours, metadata and
//! checksum files, and the `.index` folder.

pub const SNAPSHOT: &str = "SNAPSHOT";
pub const SNAPSHOT_VERSION_SUFFIX: &str = "-SNAPSHOT";
pub const METADATA_FILE: &str = "maven-metadata.xml";
pub const INDEX_FOLDER: &str = ".index";

const CHECKSUM_EXTENSIONS: [&str; 4] = [".sha1", ".md5", ".sha256", ".sha512"];

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

pub fn is_snapshot_version(version: &str) -> bool {
    version.ends_with(SNAPSHOT_VERSION_SUFFIX)
}

pub fn is_checksum(path: &str) -> bool {
    let name = file_name(path);
    CHECKSUM_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

/// `maven-metadata.xml` or one of its checksums.
pub fn is_metadata(path: &str) -> bool {
    let name = file_name(path);
    name == METADATA_FILE
        || CHECKSUM_EXTENSIONS
            .iter()
            .any(|ext| name.strip_suffix(ext) == Some(METADATA_FILE))
}

/// Anything inside the top-level `.index` folder.
pub fn is_index(path: &str) -> bool {
    path.trim_start_matches('/')
        .split('/')
        .next()
        .is_some_and(|first| first == INDEX_FOLDER)
}

/// A file whose name carries a deployment timestamp instead of `SNAPSHOT`,
/// e.g. `a1-1.0-20240101.120000-3.jar`. Such files never change once
/// deployed.
pub fn is_unique_snapshot(path: &str) -> bool {
    let name = file_name(path).as_bytes();
    // yyyyMMdd.HHmmss-N
    (0..name.len()).any(|start| timestamp_at(&name[start..]))
}

fn timestamp_at(s: &[u8]) -> bool {
    fn digits(s: &[u8], n: usize) -> bool {
        s.len() >= n && s[..n].iter().all(u8::is_ascii_digit)
    }
    if !(digits(s, 8) && s.get(8) == Some(&b'.') && digits(&s[9..], 6)) {
        return false;
    }
    let rest = &s[15..];
    rest.first() == Some(&b'-') && digits(&rest[1..], 1)
}

/// A file named with the literal `SNAPSHOT` marker, whose content changes
/// with every deployment.
pub fn is_non_unique_snapshot(path: &str) -> bool {
    file_name(path).contains(SNAPSHOT_VERSION_SUFFIX)
}
