use std::path::{Path, PathBuf};

/// Directory containing `path`, with a bare file name resolving to the current directory
///
/// ## Example
///
/// ```rust
/// use std::path::Path;
/// use tailtrack::path_utils::parent_dir;
/// assert_eq!(parent_dir(Path::new("/var/log/mail.log")), Path::new("/var/log"));
/// assert_eq!(parent_dir(Path::new("mail.log")), Path::new("."));
/// ```
pub fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Add extension to existing PathBuf, eg. `mail.log` into `mail.log.bak`
///
/// ```rust
/// use std::path::PathBuf;
/// let rotated = tailtrack::path_utils::append_extension("/var/log/mail.log".into(), "bak");
/// assert_eq!(rotated, PathBuf::from("/var/log/mail.log.bak"));
/// ```
pub fn append_extension(path: PathBuf, ext: impl AsRef<std::ffi::OsStr>) -> PathBuf {
    let mut os_string: std::ffi::OsString = path.into();
    os_string.push(".");
    os_string.push(ext.as_ref());
    os_string.into()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("log.log", ".")]
    #[case("dir/log.log", "dir")]
    #[case("/log.log", "/")]
    fn parent_dir_of_path(#[case] path: &'static str, #[case] expected: &'static str) {
        assert_eq!(parent_dir(Path::new(path)), Path::new(expected));
    }
}
