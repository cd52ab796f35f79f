//! Splicing fitted coefficients into the firmware's `calibrateVIN` function.
//!
//! The definition is located by its signature and then bounded by a brace
//! scan that skips comments, string and character literals. Prototypes
//! (`float calibrateVIN(float vin);`) are not definitions and are left alone.
//! When no definition exists the rendered function is appended to the file.

use crate::error::{Error, Result};
use crate::fit::Fit;
use log::{debug, info, warn};
use regex::Regex;
use std::fs;
use std::io::ErrorKind;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Name of the firmware correction function.
pub const FUNCTION_NAME: &str = "calibrateVIN";

#[allow(clippy::unwrap_used)] // Static pattern
static SIGNATURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"float\s+calibrateVIN\s*\(").unwrap());

/// What [`patch_source`] did to the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    /// An existing definition was replaced.
    Replaced,
    /// No definition was found; the function was appended.
    Appended,
}

/// Render the correction function for a fit, coefficients as 6-decimal literals.
pub fn render_function(fit: &Fit) -> String {
    format!(
        "float {FUNCTION_NAME}(float vin) {{\n    return ({:.6} * vin * vin * vin) + ({:.6} * vin * vin) + ({:.6} * vin) + {:.6};\n}}",
        fit.a, fit.b, fit.c, fit.d
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lexical {
    Code,
    LineComment,
    BlockComment,
    Str,
    Char,
}

/// Lexical state of every byte of `source`.
///
/// Comment delimiters and quotes belong to the comment or literal they open
/// or close, so only bytes classified as [`Lexical::Code`] are program text.
fn classify(source: &str) -> Vec<Lexical> {
    let bytes = source.as_bytes();
    let mut states = Vec::with_capacity(bytes.len());
    let mut state = Lexical::Code;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes
            .get(i + 1)
            .copied();
        // Bytes consumed by this step, all tagged with `tag`.
        let (tag, width) = match state {
            Lexical::Code => match b {
                b'/' if next == Some(b'/') => {
                    state = Lexical::LineComment;
                    (state, 2)
                },
                b'/' if next == Some(b'*') => {
                    state = Lexical::BlockComment;
                    (state, 2)
                },
                b'"' => {
                    state = Lexical::Str;
                    (state, 1)
                },
                b'\'' => {
                    state = Lexical::Char;
                    (state, 1)
                },
                _ => (Lexical::Code, 1),
            },
            Lexical::LineComment => {
                if b == b'\n' {
                    state = Lexical::Code;
                }
                (Lexical::LineComment, 1)
            },
            Lexical::BlockComment => {
                if b == b'*' && next == Some(b'/') {
                    state = Lexical::Code;
                    (Lexical::BlockComment, 2)
                } else {
                    (Lexical::BlockComment, 1)
                }
            },
            Lexical::Str | Lexical::Char => {
                let tag = state;
                let quote = if state == Lexical::Str { b'"' } else { b'\'' };
                if b == b'\\' {
                    (tag, 2)
                } else {
                    if b == quote {
                        state = Lexical::Code;
                    }
                    (tag, 1)
                }
            },
        };

        let width = width.min(bytes.len() - i);
        states.extend(std::iter::repeat_n(tag, width));
        i += width;
    }

    states
}

/// Index one past the `}` that closes the `{` at `open`.
fn matching_brace(source: &str, states: &[Lexical], open: usize) -> Option<usize> {
    let mut depth = 0usize;

    for (i, &b) in source
        .as_bytes()
        .iter()
        .enumerate()
        .skip(open)
    {
        if states[i] != Lexical::Code {
            continue;
        }
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            },
            _ => {},
        }
    }

    None
}

/// Byte ranges of every `calibrateVIN` definition in `source`.
///
/// Signatures inside comments or literals are ignored.
pub fn find_definitions(source: &str) -> Result<Vec<Range<usize>>> {
    let states = classify(source);
    let mut found = Vec::new();

    for m in SIGNATURE.find_iter(source) {
        if states[m.start()] != Lexical::Code {
            debug!(
                "Skipping {FUNCTION_NAME} signature in {:?} at byte {}",
                states[m.start()],
                m.start()
            );
            continue;
        }

        let Some(close_paren) = source[m.end()..]
            .find(')')
            .map(|p| m.end() + p)
        else {
            continue;
        };

        let after = &source[close_paren + 1..];
        let body_offset = after.len()
            - after
                .trim_start()
                .len();
        let open = close_paren + 1 + body_offset;

        if source.as_bytes().get(open) != Some(&b'{') || states[open] != Lexical::Code {
            debug!("Skipping {FUNCTION_NAME} declaration at byte {}", m.start());
            continue;
        }

        let end = matching_brace(source, &states, open).ok_or_else(|| {
            Error::Patch(format!(
                "unterminated body of {FUNCTION_NAME} starting at byte {}",
                m.start()
            ))
        })?;
        found.push(m.start()..end);
    }

    Ok(found)
}

/// Replace the first `calibrateVIN` definition with `rendered`, or append it.
///
/// Applying the same rendering twice yields identical text.
pub fn patch_source(source: &str, rendered: &str) -> Result<(String, PatchOutcome)> {
    let rendered = rendered.trim();
    let definitions = find_definitions(source)?;

    if definitions.len() > 1 {
        warn!(
            "Found {} definitions of {FUNCTION_NAME}, replacing only the first",
            definitions.len()
        );
    }

    match definitions.into_iter().next() {
        Some(range) => {
            let mut patched = String::with_capacity(source.len() + rendered.len());
            patched.push_str(&source[..range.start]);
            patched.push_str(rendered);
            patched.push_str(&source[range.end..]);
            Ok((patched, PatchOutcome::Replaced))
        },
        None => {
            warn!("No {FUNCTION_NAME} definition found, appending one");
            let mut patched = source.to_string();
            if !patched.is_empty() {
                if !patched.ends_with('\n') {
                    patched.push('\n');
                }
                patched.push('\n');
            }
            patched.push_str(rendered);
            patched.push('\n');
            Ok((patched, PatchOutcome::Appended))
        },
    }
}

/// Patch a firmware source file in place.
pub fn patch_file(path: impl AsRef<Path>, rendered: &str) -> Result<PatchOutcome> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => Error::FirmwareNotFound(path.to_path_buf()),
        _ => Error::Io(e),
    })?;

    let (patched, outcome) = patch_source(&source, rendered)?;
    if patched == source {
        debug!("{} already up to date", path.display());
    } else {
        fs::write(path, patched)?;
    }

    info!("Updated {} ({outcome:?})", path.display());
    Ok(outcome)
}

/// Files in `dir` with the given extension, sorted by name.
pub fn list_sources(dir: impl AsRef<Path>, extension: &str) -> Result<Vec<PathBuf>> {
    let mut sources: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
        })
        .collect();
    sources.sort();
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SKETCH: &str = r#"#include <Arduino.h>

float calibrateVIN(float vin);

void setup() {
  Serial.begin(115200);
}

float calibrateVIN(float vin) {
  if (vin < 0.1) { return 0; }
  return (0.000100 * vin * vin * vin) + (0.002000 * vin * vin) + (1.000000 * vin) + 0.000000;
}

void loop() {
  if (Serial.read() == 'a') {
    Serial.printf("Calibrated VIN: %.4f\n", calibrateVIN(1.0));
  }
}
"#;

    fn fit() -> Fit {
        Fit::from_coefficients([0.001234, -0.0256, 1.0825, 0.1375])
    }

    #[test]
    fn test_render_function() {
        let rendered = render_function(&fit());
        assert_eq!(
            rendered,
            "float calibrateVIN(float vin) {\n    return (0.001234 * vin * vin * vin) + (-0.025600 * vin * vin) + (1.082500 * vin) + 0.137500;\n}"
        );
    }

    #[test]
    fn test_find_definitions_skips_prototype() {
        let defs = find_definitions(SKETCH).unwrap();
        assert_eq!(defs.len(), 1);
        let text = &SKETCH[defs[0].clone()];
        assert!(text.starts_with("float calibrateVIN(float vin) {"));
        assert!(text.ends_with('}'));
        assert!(text.contains("if (vin < 0.1) { return 0; }"));
    }

    #[test]
    fn test_patch_replaces_whole_body() {
        let rendered = render_function(&fit());
        let (patched, outcome) = patch_source(SKETCH, &rendered).unwrap();

        assert_eq!(outcome, PatchOutcome::Replaced);
        assert_eq!(patched.matches(&rendered).count(), 1);
        assert_eq!(find_definitions(&patched).unwrap().len(), 1);
        assert!(!patched.contains("0.000100"));
        assert!(patched.contains("float calibrateVIN(float vin);"));
        assert!(patched.contains("void loop() {"));
        assert!(patched.ends_with("}\n"));
    }

    #[test]
    fn test_patch_is_idempotent() {
        let rendered = render_function(&fit());
        let (once, _) = patch_source(SKETCH, &rendered).unwrap();
        let (twice, outcome) = patch_source(&once, &rendered).unwrap();
        assert_eq!(outcome, PatchOutcome::Replaced);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_patch_ignores_braces_in_comments_and_strings() {
        let source = "float calibrateVIN(float vin) {\n  // }\n  /* } */\n  const char* s = \"}\";\n  char c = '}';\n  return vin;\n}\nint after = 1;\n";
        let rendered = render_function(&fit());
        let (patched, _) = patch_source(source, &rendered).unwrap();
        assert_eq!(patched, format!("{rendered}\nint after = 1;\n"));
    }

    #[test]
    fn test_patch_appends_when_missing() {
        let source = "void setup() {}\nvoid loop() {}";
        let rendered = render_function(&fit());
        let (patched, outcome) = patch_source(source, &rendered).unwrap();

        assert_eq!(outcome, PatchOutcome::Appended);
        assert_eq!(patched, format!("void setup() {{}}\nvoid loop() {{}}\n\n{rendered}\n"));

        let (again, outcome) = patch_source(&patched, &rendered).unwrap();
        assert_eq!(outcome, PatchOutcome::Replaced);
        assert_eq!(again, patched);
    }

    #[test]
    fn test_patch_replaces_only_first_of_duplicates() {
        let source = "float calibrateVIN(float vin) { return 1; }\nfloat calibrateVIN(float vin) { return 2; }\n";
        let (patched, _) = patch_source(source, "float calibrateVIN(float vin) { return 3; }").unwrap();
        assert_eq!(
            patched,
            "float calibrateVIN(float vin) { return 3; }\nfloat calibrateVIN(float vin) { return 2; }\n"
        );
    }

    #[test]
    fn test_patch_skips_signature_in_line_comment() {
        let source = "// previous: float calibrateVIN(float vin) { return vin; }\nfloat calibrateVIN(float vin) {\n  return 2.0 * vin;\n}\n";
        let rendered = "float calibrateVIN(float vin) {\n    return 3.0;\n}";
        let (patched, outcome) = patch_source(source, rendered).unwrap();

        assert_eq!(outcome, PatchOutcome::Replaced);
        assert_eq!(
            patched,
            format!("// previous: float calibrateVIN(float vin) {{ return vin; }}\n{rendered}\n")
        );
    }

    #[test]
    fn test_patch_skips_signature_in_block_comment() {
        let source = "/* old fit\nfloat calibrateVIN(float vin) {\n  return vin;\n}\n*/\nfloat calibrateVIN(float vin) {\n  return 2.0 * vin;\n}\n";
        let rendered = "float calibrateVIN(float vin) {\n    return 3.0;\n}";
        let (patched, outcome) = patch_source(source, rendered).unwrap();

        assert_eq!(outcome, PatchOutcome::Replaced);
        assert!(patched.starts_with("/* old fit\nfloat calibrateVIN(float vin) {\n  return vin;\n}\n*/\n"));
        assert!(patched.ends_with(&format!("*/\n{rendered}\n")));
        assert!(!patched.contains("2.0 * vin"));
    }

    #[test]
    fn test_commented_out_only_definition_is_appended() {
        let source = "// float calibrateVIN(float vin) { return vin; }\nvoid loop() {}\n";
        let rendered = "float calibrateVIN(float vin) {\n    return 3.0;\n}";
        let (patched, outcome) = patch_source(source, rendered).unwrap();

        assert_eq!(outcome, PatchOutcome::Appended);
        assert!(patched.starts_with(source));
    }

    #[test]
    fn test_signature_in_string_literal_is_ignored() {
        let source = "const char* doc = \"float calibrateVIN(float vin) {\";\nfloat calibrateVIN(float vin) { return vin; }\n";
        let defs = find_definitions(source).unwrap();
        assert_eq!(defs.len(), 1);
        assert_eq!(&source[defs[0].clone()], "float calibrateVIN(float vin) { return vin; }");
    }

    #[test]
    fn test_unterminated_body_is_an_error() {
        let source = "float calibrateVIN(float vin) {\n  return vin;\n";
        assert!(matches!(
            patch_source(source, "x"),
            Err(Error::Patch(_))
        ));
    }

    #[test]
    fn test_patch_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("adc_for_calib.ino");
        fs::write(&path, SKETCH).unwrap();

        let rendered = render_function(&fit());
        assert_eq!(patch_file(&path, &rendered).unwrap(), PatchOutcome::Replaced);
        let first = fs::read_to_string(&path).unwrap();
        assert!(first.contains(&rendered));

        patch_file(&path, &rendered).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), first);
    }

    #[test]
    fn test_patch_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.ino");
        assert!(matches!(
            patch_file(&path, "x"),
            Err(Error::FirmwareNotFound(p)) if p == path
        ));
    }

    #[test]
    fn test_list_sources_filters_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.ino"), "").unwrap();
        fs::write(dir.path().join("a.ino"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let names: Vec<String> = list_sources(dir.path(), "ino")
            .unwrap()
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.ino", "b.ino"]);
    }
}
