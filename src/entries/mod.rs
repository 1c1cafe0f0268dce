//! Bundle entry discovery
//!
//! Maps bundle names to entry files: the fixed `main` entry plus one
//! `pages/<name>` entry for every file inside a `pages` directory of the
//! script source tree.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::utils::{parent_is, FileLister};

/// Bundle name of the fixed main entry
pub const MAIN_ENTRY: &str = "main";

/// Bundle name -> entry file
pub type EntryMap = BTreeMap<String, PathBuf>;

/// Discover the bundle entries below `js_root`
///
/// Page files sharing a stem in different directories collapse onto one
/// key; the last one in listing order wins.
pub fn discover_entries(
    js_root: &Path,
    main_file: &str,
    lister: &dyn FileLister,
) -> io::Result<EntryMap> {
    let mut entries = EntryMap::new();
    entries.insert(MAIN_ENTRY.to_string(), js_root.join(main_file));

    for file in lister.list(js_root)? {
        if !parent_is(&file, "pages") {
            continue;
        }

        let Some(stem) = file.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        let name = format!("pages/{}", stem);
        if let Some(previous) = entries.insert(name.clone(), file.clone()) {
            debug!(
                "Entry '{}' now points to {} (was {})",
                name,
                file.display(),
                previous.display()
            );
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct StaticLister(Vec<&'static str>);

    impl FileLister for StaticLister {
        fn list(&self, _root: &Path) -> io::Result<Vec<PathBuf>> {
            Ok(self.0.iter().map(PathBuf::from).collect())
        }
    }

    struct MissingLister;

    impl FileLister for MissingLister {
        fn list(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
            Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not found", root.display()),
            ))
        }
    }

    #[test]
    fn test_main_plus_one_entry_per_page() {
        let lister = StaticLister(vec![
            "src/js/main.js",
            "src/js/lib/util.js",
            "src/js/pages/about.js",
            "src/js/pages/contact.js",
            "src/js/shop/pages/cart.js",
        ]);

        let entries = discover_entries(Path::new("src/js"), "main.js", &lister).unwrap();

        assert_eq!(entries.len(), 4);
        assert_eq!(entries["main"], PathBuf::from("src/js/main.js"));
        assert_eq!(entries["pages/about"], PathBuf::from("src/js/pages/about.js"));
        assert_eq!(entries["pages/contact"], PathBuf::from("src/js/pages/contact.js"));
        assert_eq!(entries["pages/cart"], PathBuf::from("src/js/shop/pages/cart.js"));
    }

    #[test]
    fn test_main_only_without_pages() {
        let lister = StaticLister(vec!["src/js/main.js", "src/js/external/jquery.js"]);

        let entries = discover_entries(Path::new("src/js"), "main.js", &lister).unwrap();

        assert_eq!(entries.keys().collect::<Vec<_>>(), vec!["main"]);
    }

    #[test]
    fn test_main_seeded_even_if_missing() {
        let lister = StaticLister(vec![]);

        let entries = discover_entries(Path::new("src/js"), "app.js", &lister).unwrap();

        assert_eq!(entries["main"], PathBuf::from("src/js/app.js"));
    }

    #[test]
    fn test_duplicate_stem_last_wins() {
        let lister = StaticLister(vec![
            "src/js/a/pages/home.js",
            "src/js/b/pages/home.js",
        ]);

        let entries = discover_entries(Path::new("src/js"), "main.js", &lister).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries["pages/home"], PathBuf::from("src/js/b/pages/home.js"));
    }

    #[test]
    fn test_nested_below_pages_ignored() {
        let lister = StaticLister(vec!["src/js/pages/partials/header.js"]);

        let entries = discover_entries(Path::new("src/js"), "main.js", &lister).unwrap();

        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_lister_error_propagates() {
        let err = discover_entries(Path::new("src/js"), "main.js", &MissingLister).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
