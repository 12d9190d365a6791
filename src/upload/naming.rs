//! File-name helpers for duplicate resolution.

/// Suffix inserted by the "keep both" choice.
pub const COPY_SUFFIX: &str = "_copy";

/// Name used when the user keeps both files: `_copy` goes before the last
/// extension, or at the end when there is none.
///
/// ```
/// use documind::upload::keep_both_name;
///
/// assert_eq!(keep_both_name("report.pdf"), "report_copy.pdf");
/// assert_eq!(keep_both_name("archive.tar.gz"), "archive.tar_copy.gz");
/// assert_eq!(keep_both_name("README"), "README_copy");
/// ```
pub fn keep_both_name(name: &str) -> String {
    match name.rfind('.') {
        // A leading dot marks a hidden file, not an extension.
        Some(dot) if dot > 0 => format!("{}{COPY_SUFFIX}{}", &name[..dot], &name[dot..]),
        _ => format!("{name}{COPY_SUFFIX}"),
    }
}
