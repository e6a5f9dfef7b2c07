use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const STATS_FILE: &str = "stats.svg";
pub const LANGUAGES_FILE: &str = "top-langs.svg";

#[derive(Debug)]
pub struct CardPaths {
    pub stats: PathBuf,
    pub languages: PathBuf,
}

/// Writes both cards into `dir`, creating it if needed and replacing old files.
pub fn write_cards(dir: &Path, stats_svg: &str, languages_svg: &str) -> Result<CardPaths> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let paths = CardPaths {
        stats: dir.join(STATS_FILE),
        languages: dir.join(LANGUAGES_FILE),
    };

    fs::write(&paths.stats, stats_svg)
        .with_context(|| format!("Failed to write {}", paths.stats.display()))?;
    fs::write(&paths.languages, languages_svg)
        .with_context(|| format!("Failed to write {}", paths.languages.display()))?;

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_directory_and_overwrites() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path().join("profile");

        write_cards(&dir, "<svg>old</svg>", "<svg>old langs</svg>").unwrap();
        let paths = write_cards(&dir, "<svg>new</svg>", "<svg>new langs</svg>").unwrap();

        assert_eq!(paths.stats, dir.join("stats.svg"));
        assert_eq!(fs::read_to_string(&paths.stats).unwrap(), "<svg>new</svg>");
        assert_eq!(
            fs::read_to_string(&paths.languages).unwrap(),
            "<svg>new langs</svg>"
        );
    }

    #[test]
    fn unwritable_target_is_an_error() {
        let tmp = tempdir().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        fs::write(&blocker, "file").unwrap();

        assert!(write_cards(&blocker, "a", "b").is_err());
    }
}
