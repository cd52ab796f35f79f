//! Firmware patching with a recovery prompt for a missing sketch.

use {
    anyhow::{Context, Result},
    console::style,
    std::path::{Path, PathBuf},
    vincal::{Error, PatchOutcome, Prompter, firmware, patch_file},
};

/// Directory a firmware path lives in (`.` for bare file names).
fn firmware_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Resolve an operator-entered name against the sketch directory.
pub fn resolve_candidate(dir: &Path, input: &str) -> PathBuf {
    let entered = Path::new(input.trim());
    if entered.is_absolute() {
        entered.to_path_buf()
    } else {
        dir.join(entered)
    }
}

/// Ask for an existing sketch, listing the candidates next to `missing`.
fn ask_for_existing_firmware<Q: Prompter>(
    prompter: &mut Q,
    missing: &Path,
    extension: &str,
) -> Result<PathBuf> {
    let dir = firmware_dir(missing);
    eprintln!(
        "{} Firmware file {} not found",
        style("✗").red(),
        missing.display()
    );

    match firmware::list_sources(dir, extension) {
        Ok(sources) if !sources.is_empty() => {
            eprintln!("Available .{extension} files in {}:", dir.display());
            for source in &sources {
                if let Some(name) = source.file_name() {
                    eprintln!("  {} {}", style("•").green(), name.to_string_lossy());
                }
            }
        },
        Ok(_) => eprintln!("No .{extension} files in {}", dir.display()),
        Err(e) => log::warn!("Cannot list {}: {e}", dir.display()),
    }

    loop {
        let Some(input) = prompter.prompt("Enter the firmware file name")? else {
            return Err(Error::Interrupted.into());
        };
        if input
            .trim()
            .is_empty()
        {
            continue;
        }

        let candidate = resolve_candidate(dir, &input);
        if candidate.is_file() {
            return Ok(candidate);
        }
        eprintln!(
            "{} {} does not exist",
            style("✗").red(),
            candidate.display()
        );
    }
}

/// Patch `path`; on a missing file ask for another one and retry once.
///
/// Returns the path that was patched.
pub fn patch_with_recovery<Q: Prompter>(
    prompter: &mut Q,
    path: &Path,
    extension: &str,
    rendered: &str,
) -> Result<PathBuf> {
    let (patched, outcome) = match patch_file(path, rendered) {
        Ok(outcome) => (path.to_path_buf(), outcome),
        Err(Error::FirmwareNotFound(missing)) => {
            let replacement = ask_for_existing_firmware(prompter, &missing, extension)?;
            let outcome = patch_file(&replacement, rendered)
                .with_context(|| format!("Failed to patch {}", replacement.display()))?;
            (replacement, outcome)
        },
        Err(e) => {
            return Err(anyhow::Error::new(e).context(format!("Failed to patch {}", path.display())));
        },
    };

    let action = match outcome {
        PatchOutcome::Replaced => "Updated calibrateVIN in",
        PatchOutcome::Appended => "Appended calibrateVIN to",
    };
    eprintln!("{} {action} {}", style("✓").green(), patched.display());
    Ok(patched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::bench;
    use std::fs;

    const RENDERED: &str = "float calibrateVIN(float vin) {\n    return 1.0;\n}";

    #[test]
    fn test_firmware_dir_of_bare_name_is_cwd() {
        assert_eq!(firmware_dir(Path::new("adc_for_calib.ino")), Path::new("."));
        assert_eq!(
            firmware_dir(Path::new("sketches/adc_for_calib.ino")),
            Path::new("sketches")
        );
    }

    #[test]
    fn test_resolve_candidate() {
        let dir = Path::new("sketches");
        assert_eq!(
            resolve_candidate(dir, " board.ino \n"),
            Path::new("sketches").join("board.ino")
        );
        let absolute = std::env::temp_dir().join("board.ino");
        assert_eq!(
            resolve_candidate(dir, &absolute.to_string_lossy()),
            absolute
        );
    }

    #[test]
    fn test_patch_existing_file_needs_no_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("adc_for_calib.ino");
        fs::write(&path, "float calibrateVIN(float vin) {\n  return vin;\n}\n").unwrap();

        let (mut bench, journal) = bench(&[], &[]);
        let patched = patch_with_recovery(&mut bench.prompter, &path, "ino", RENDERED).unwrap();
        assert_eq!(patched, path);
        assert_eq!(fs::read_to_string(&path).unwrap(), format!("{RENDERED}\n"));
        assert!(journal.entries().is_empty());
    }

    #[test]
    fn test_missing_firmware_asks_until_an_existing_file_is_named() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("board_v2.ino");
        fs::write(&real, "void setup() {}\nfloat calibrateVIN(float vin) {\n  return vin;\n}\n").unwrap();

        let (mut bench, journal) = bench(&[], &["", "board_v1.ino", "board_v2.ino"]);
        let patched = patch_with_recovery(
            &mut bench.prompter,
            &dir.path().join("adc_for_calib.ino"),
            "ino",
            RENDERED,
        )
        .unwrap();

        assert_eq!(patched, real);
        assert_eq!(
            fs::read_to_string(&real).unwrap(),
            format!("void setup() {{}}\n{RENDERED}\n")
        );
        assert_eq!(journal.count("prompt Enter the firmware file name"), 3);
    }

    #[test]
    fn test_recovered_file_is_patched_only_once() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("broken.ino");
        fs::write(&broken, "float calibrateVIN(float vin) {\n  return vin;\n").unwrap();

        let (mut bench, journal) = bench(&[], &["broken.ino", "broken.ino"]);
        let err = patch_with_recovery(
            &mut bench.prompter,
            &dir.path().join("adc_for_calib.ino"),
            "ino",
            RENDERED,
        )
        .unwrap_err();

        assert!(format!("{err:#}").contains("unterminated"));
        assert_eq!(journal.count("prompt"), 1);
        assert_eq!(
            fs::read_to_string(&broken).unwrap(),
            "float calibrateVIN(float vin) {\n  return vin;\n"
        );
    }

    #[test]
    fn test_closed_input_during_recovery_is_an_interrupt() {
        let dir = tempfile::tempdir().unwrap();
        let (mut bench, _) = bench(&[], &[]);
        let err = patch_with_recovery(
            &mut bench.prompter,
            &dir.path().join("adc_for_calib.ino"),
            "ino",
            RENDERED,
        )
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::Interrupted)
        ));
    }
}
