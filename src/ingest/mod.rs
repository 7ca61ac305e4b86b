//! Archive ingestion pipeline.
//!
//! An import takes a ZIP archive of paired artifacts, validates its shape,
//! and persists one record group per base identifier (an entry's file name
//! without its directory and without its matched extension). The pipeline
//! is linear and stops at the first failure; the only tolerated partial
//! progress is skipping a base whose entries cannot be read back out of an
//! otherwise valid archive.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Seek};

use zip::ZipArchive;

use crate::config::ImportConfig;
use crate::store::{CodeRecord, ComparisonStatus, RenderRecord, StateRecord, Store, StoreError};

/// Required extension of the uploaded archive itself.
const ARCHIVE_EXTENSION: &str = ".zip";

/// Errors that can abort an import.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// The upload is not named like a ZIP archive.
    #[error("Not a .zip archive: {0}")]
    InvalidFormat(String),

    /// The upload exceeds the configured size ceiling.
    #[error("Archive is {size} bytes; the limit is {limit_mb} MB")]
    TooLarge { size: u64, limit_mb: u64 },

    /// The archive bytes could not be parsed as a ZIP file.
    #[error("Failed to read archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// At least one entry carries an extension outside the configured set.
    #[error("Entries with disallowed extensions: {}. Allowed: {}", .files.join(", "), dotted(.allowed))]
    Extension {
        files: Vec<String>,
        allowed: Vec<String>,
    },

    /// At least one base lacks a render file or lacks every code file.
    #[error("Incomplete artifact sets (each base needs one render file and at least one code file): {}", .bases.join(", "))]
    IncompleteSet { bases: Vec<String> },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a completed import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    /// Bases persisted, in lexicographic order.
    pub imported: Vec<String>,
    /// Bases skipped because an entry could not be read back as text.
    pub skipped: Vec<String>,
}

/// Run the full import pipeline against `store`.
///
/// `status` receives one human-readable line per pipeline stage. The store
/// is wiped before the archive is opened, so a corrupt or structurally
/// invalid archive leaves the store empty rather than keeping the previous
/// import; only the name and size checks run ahead of the wipe.
///
/// # Errors
///
/// Returns the first [`ImportError`] the pipeline hits; see the variant
/// docs. A store failure while persisting aborts the remaining bases.
pub fn import_archive(
    store: &Store,
    rules: &ImportConfig,
    file_name: &str,
    bytes: &[u8],
    mut status: impl FnMut(&str),
) -> Result<ImportOutcome, ImportError> {
    status("validating archive");
    validate_upload(file_name, bytes.len() as u64, rules)?;

    status("clearing previous data");
    store.reset()?;

    status("reading archive");
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let entries: Vec<String> = archive
        .file_names()
        .filter(|name| !name.ends_with('/'))
        .map(String::from)
        .collect();

    status("checking archive layout");
    let allowed = allowed_longest_first(rules);
    let offenders = disallowed_entries(&entries, &allowed);
    if !offenders.is_empty() {
        return Err(ImportError::Extension {
            files: offenders,
            allowed: rules.allowed_extensions(),
        });
    }

    let groups = group_by_base(&entries, &allowed);
    let missing = incomplete_bases(&groups, rules);
    if !missing.is_empty() {
        return Err(ImportError::IncompleteSet { bases: missing });
    }

    status("storing artifact sets");
    persist_groups(store, &mut archive, &groups, rules)
}

/// Extension tags observed for one base, each mapped to the full entry
/// name that carried it.
#[derive(Debug, Default)]
struct BaseGroup {
    entries: BTreeMap<String, String>,
}

impl BaseGroup {
    fn record(&mut self, extension: &str, entry: &str) {
        self.entries
            .insert(extension.to_string(), entry.to_string());
    }

    fn has(&self, extension: &str) -> bool {
        self.entries.contains_key(extension)
    }

    fn entry_for(&self, extension: &str) -> Option<&str> {
        self.entries.get(extension).map(String::as_str)
    }

    fn is_complete(&self, rules: &ImportConfig) -> bool {
        self.has(&rules.render_extension) && rules.code_extensions.iter().any(|ext| self.has(ext))
    }
}

fn validate_upload(name: &str, size: u64, rules: &ImportConfig) -> Result<(), ImportError> {
    if !name.ends_with(ARCHIVE_EXTENSION) {
        return Err(ImportError::InvalidFormat(name.to_string()));
    }
    if size > rules.max_archive_bytes() {
        return Err(ImportError::TooLarge {
            size,
            limit_mb: rules.max_archive_mb,
        });
    }
    Ok(())
}

/// All allowed extensions, longest suffix first, so overlapping suffixes
/// classify an entry by the longest match.
fn allowed_longest_first(rules: &ImportConfig) -> Vec<&str> {
    let mut extensions: Vec<&str> = rules.code_extensions.iter().map(String::as_str).collect();
    extensions.push(rules.render_extension.as_str());
    extensions.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    extensions
}

/// Last path segment of a ZIP entry name.
fn entry_file_name(entry: &str) -> &str {
    entry.rsplit('/').next().unwrap_or(entry)
}

/// Split `file_name` into (base, matched extension), case-sensitively.
fn match_extension<'f, 'e>(file_name: &'f str, extensions: &[&'e str]) -> Option<(&'f str, &'e str)> {
    extensions.iter().find_map(|ext| {
        let suffix = format!(".{ext}");
        file_name
            .strip_suffix(suffix.as_str())
            .map(|base| (base, *ext))
    })
}

/// Full entry names whose file name carries no allowed extension, sorted.
fn disallowed_entries(entries: &[String], allowed: &[&str]) -> Vec<String> {
    let mut offenders: Vec<String> = entries
        .iter()
        .filter(|entry| match_extension(entry_file_name(entry), allowed).is_none())
        .cloned()
        .collect();
    offenders.sort();
    offenders
}

/// Group entries by base identifier, remembering which extension tag was
/// seen under which entry name.
fn group_by_base(entries: &[String], allowed: &[&str]) -> BTreeMap<String, BaseGroup> {
    let mut groups: BTreeMap<String, BaseGroup> = BTreeMap::new();
    for entry in entries {
        let Some((base, extension)) = match_extension(entry_file_name(entry), allowed) else {
            continue;
        };
        groups
            .entry(base.to_string())
            .or_default()
            .record(extension, entry);
    }
    groups
}

/// Bases lacking the render extension or lacking every code extension,
/// in lexicographic order.
fn incomplete_bases(groups: &BTreeMap<String, BaseGroup>, rules: &ImportConfig) -> Vec<String> {
    groups
        .iter()
        .filter(|(_, group)| !group.is_complete(rules))
        .map(|(base, _)| base.clone())
        .collect()
}

/// First declared code extension present in the group.
fn choose_code_extension<'r>(group: &BaseGroup, rules: &'r ImportConfig) -> Option<&'r str> {
    rules
        .code_extensions
        .iter()
        .map(String::as_str)
        .find(|ext| group.has(ext))
}

/// Drop the wrapping first and last lines of render content.
///
/// Content of one or two lines is stored verbatim; anything longer loses
/// exactly its first and last `\n`-separated line. A trailing newline
/// counts as an empty final line.
fn fence_trim(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    if lines.len() > 2 {
        lines[1..lines.len() - 1].join("\n")
    } else {
        text.to_string()
    }
}

fn persist_groups<R: Read + Seek>(
    store: &Store,
    archive: &mut ZipArchive<R>,
    groups: &BTreeMap<String, BaseGroup>,
    rules: &ImportConfig,
) -> Result<ImportOutcome, ImportError> {
    let mut imported = Vec::new();
    let mut skipped = Vec::new();

    for (base, group) in groups {
        // Both entries exist after the completeness check; a lookup miss is
        // treated like an unreadable entry and skips the base.
        let Some(language) = choose_code_extension(group, rules) else {
            skipped.push(base.clone());
            continue;
        };
        let (Some(code_entry), Some(render_entry)) = (
            group.entry_for(language),
            group.entry_for(&rules.render_extension),
        ) else {
            skipped.push(base.clone());
            continue;
        };

        let texts = (
            read_entry(archive, code_entry),
            read_entry(archive, render_entry),
        );
        let (Ok(code), Ok(render)) = texts else {
            skipped.push(base.clone());
            continue;
        };

        store.put_artifact_set(
            &CodeRecord {
                base: base.clone(),
                code,
                language: language.to_string(),
            },
            &RenderRecord {
                base: base.clone(),
                content: fence_trim(&render),
            },
            &StateRecord {
                base: base.clone(),
                state: ComparisonStatus::NotCompared,
            },
        )?;
        imported.push(base.clone());
    }

    Ok(ImportOutcome { imported, skipped })
}

/// Read one entry out of the archive as UTF-8 text.
fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, entry: &str) -> std::io::Result<String> {
    let mut file = archive.by_name(entry).map_err(std::io::Error::other)?;
    let mut text = String::new();
    file.read_to_string(&mut text)?;
    Ok(text)
}

/// Render `["py", "c"]` as ".py, .c" for error messages.
fn dotted(extensions: &[String]) -> String {
    let dotted: Vec<String> = extensions.iter().map(|ext| format!(".{ext}")).collect();
    dotted.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> ImportConfig {
        ImportConfig {
            max_archive_mb: 1,
            code_extensions: vec!["py".to_string(), "c".to_string()],
            render_extension: "svg".to_string(),
        }
    }

    fn entries(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| (*n).to_string()).collect()
    }

    mod validation_tests {
        use super::*;

        #[test]
        fn rejects_non_zip_name() {
            let err = validate_upload("upload.tar.gz", 10, &rules());
            assert!(matches!(err, Err(ImportError::InvalidFormat(name)) if name == "upload.tar.gz"));
        }

        #[test]
        fn checks_name_before_size() {
            let err = validate_upload("huge.tar", 50 * 1024 * 1024, &rules());
            assert!(matches!(err, Err(ImportError::InvalidFormat(_))));
        }

        #[test]
        fn rejects_oversized_archives() {
            let err = validate_upload("upload.zip", 1024 * 1024 + 1, &rules());
            assert!(matches!(
                err,
                Err(ImportError::TooLarge {
                    size,
                    limit_mb: 1
                }) if size == 1024 * 1024 + 1
            ));
        }

        #[test]
        fn accepts_archive_at_the_exact_limit() {
            assert!(validate_upload("upload.zip", 1024 * 1024, &rules()).is_ok());
        }
    }

    mod extension_tests {
        use super::*;

        #[test]
        fn longest_suffix_wins() {
            assert_eq!(
                match_extension("foo.py.py", &["py.py", "py", "svg"]),
                Some(("foo", "py.py"))
            );
        }

        #[test]
        fn ordering_is_longest_first_then_lexicographic() {
            let config = ImportConfig {
                max_archive_mb: 1,
                code_extensions: vec!["py".to_string(), "py.py".to_string()],
                render_extension: "md".to_string(),
            };
            assert_eq!(allowed_longest_first(&config), vec!["py.py", "md", "py"]);
        }

        #[test]
        fn matching_is_case_sensitive() {
            assert_eq!(match_extension("FOO.PY", &["py"]), None);
        }

        #[test]
        fn extension_requires_a_dot() {
            assert_eq!(match_extension("foopy", &["py"]), None);
        }

        #[test]
        fn bare_dot_extension_yields_empty_base() {
            assert_eq!(match_extension(".py", &["py"]), Some(("", "py")));
        }

        #[test]
        fn entry_file_name_strips_directories() {
            assert_eq!(entry_file_name("nested/dir/foo.py"), "foo.py");
            assert_eq!(entry_file_name("foo.py"), "foo.py");
        }
    }

    mod grouping_tests {
        use super::*;

        #[test]
        fn groups_by_file_name_across_directories() {
            let entries = entries(&["a/foo.py", "foo.svg", "bar.c", "bar.svg"]);
            let groups = group_by_base(&entries, &["py", "c", "svg"]);

            let bases: Vec<&String> = groups.keys().collect();
            assert_eq!(bases, vec!["bar", "foo"]);
            assert_eq!(groups["foo"].entry_for("py"), Some("a/foo.py"));
            assert_eq!(groups["foo"].entry_for("svg"), Some("foo.svg"));
            assert_eq!(groups["bar"].entry_for("c"), Some("bar.c"));
        }

        #[test]
        fn reports_disallowed_entries_sorted() {
            let entries = entries(&["x/evil.bin", "foo.py", "notes.txt", "foo.svg"]);
            assert_eq!(
                disallowed_entries(&entries, &["py", "c", "svg"]),
                vec!["notes.txt", "x/evil.bin"]
            );
        }

        #[test]
        fn flags_bases_missing_render_or_code() {
            let entries = entries(&["foo.py", "foo.svg", "bar.c", "lone.svg"]);
            let groups = group_by_base(&entries, &["py", "c", "svg"]);
            assert_eq!(incomplete_bases(&groups, &rules()), vec!["bar", "lone"]);
        }

        #[test]
        fn complete_groups_raise_no_flags() {
            let entries = entries(&["foo.py", "foo.svg", "bar.c", "bar.svg"]);
            let groups = group_by_base(&entries, &["py", "c", "svg"]);
            assert!(incomplete_bases(&groups, &rules()).is_empty());
        }

        #[test]
        fn code_tie_break_follows_declared_order() {
            let entries = entries(&["foo.py", "foo.c", "foo.svg"]);
            let groups = group_by_base(&entries, &["py", "c", "svg"]);
            assert_eq!(choose_code_extension(&groups["foo"], &rules()), Some("py"));

            let c_first = ImportConfig {
                code_extensions: vec!["c".to_string(), "py".to_string()],
                ..rules()
            };
            assert_eq!(choose_code_extension(&groups["foo"], &c_first), Some("c"));
        }
    }

    mod fence_trim_tests {
        use super::*;

        #[test]
        fn single_line_is_verbatim() {
            assert_eq!(fence_trim("just one line"), "just one line");
        }

        #[test]
        fn two_lines_are_verbatim() {
            assert_eq!(fence_trim("a\nb"), "a\nb");
        }

        #[test]
        fn three_lines_lose_first_and_last() {
            assert_eq!(fence_trim("```\nbody\n```"), "body");
        }

        #[test]
        fn trailing_newline_counts_as_a_line() {
            assert_eq!(fence_trim("<svg>\n<g/>\n</svg>\n"), "<g/>\n</svg>");
        }

        #[test]
        fn empty_text_is_verbatim() {
            assert_eq!(fence_trim(""), "");
        }
    }
}
