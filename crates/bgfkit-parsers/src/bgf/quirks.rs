// bgfkit-parsers/src/bgf/quirks.rs
//! File-name keyed format quirks
//!
//! A handful of shipped models were written by an older exporter that emits
//! the reduced footer. Nothing inside those files tells them apart, so the
//! footer shape is chosen by file name.

use std::collections::HashSet;
use std::path::Path;

use once_cell::sync::Lazy;

use super::footer::FooterShape;

/// Lower-case file names known to carry the reduced footer
static REDUCED_FOOTER_FILES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "ob_dummy.bgf",
        "ob_kerze.bgf",
        "ob_fackel.bgf",
        "ob_laterne.bgf",
        "ob_marker.bgf",
    ]
    .into_iter()
    .collect()
});

/// Footer shape for the file at `path`
///
/// The file name is matched case-insensitively against the built-in table and
/// against `extra`, which comes from `ParseOptions::extra_reduced_footer_files`.
pub fn footer_shape_for(path: &Path, extra: &[String]) -> FooterShape {
    let Some(file_name) = path.file_name() else {
        return FooterShape::Standard;
    };
    let file_name = file_name.to_string_lossy().to_lowercase();

    if REDUCED_FOOTER_FILES.contains(file_name.as_str())
        || extra.iter().any(|name| name.to_lowercase() == file_name)
    {
        FooterShape::Reduced
    } else {
        FooterShape::Standard
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names_case_insensitive() {
        assert_eq!(
            footer_shape_for(Path::new("models/OB_Dummy.BGF"), &[]),
            FooterShape::Reduced
        );
        assert_eq!(
            footer_shape_for(Path::new("house.bgf"), &[]),
            FooterShape::Standard
        );
    }

    #[test]
    fn test_extra_names() {
        let extra = vec!["Special.bgf".to_string()];
        assert_eq!(
            footer_shape_for(Path::new("/x/special.bgf"), &extra),
            FooterShape::Reduced
        );
        // Only the file name counts, not the directory
        assert_eq!(
            footer_shape_for(Path::new("/ob_dummy.bgf/house.bgf"), &extra),
            FooterShape::Standard
        );
    }

    #[test]
    fn test_builtin_table_is_lower_case() {
        for name in REDUCED_FOOTER_FILES.iter() {
            assert_eq!(*name, name.to_lowercase());
        }
    }
}
