//! Symbol list files: one ticker per line.
//!
//! Surrounding whitespace is trimmed, blank lines and `#` comments are
//! skipped, repeats keep their first position.

use std::{
    fs,
    path::{Path, PathBuf},
};

use indexmap::IndexSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SymbolsError {
    #[error("failed to read symbol file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no symbols to backfill in {0}")]
    Empty(String),
}

pub fn parse_symbols(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}

pub fn read_symbols(path: &Path) -> Result<Vec<String>, SymbolsError> {
    let content = fs::read_to_string(path).map_err(|source| SymbolsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let symbols = parse_symbols(&content);
    if symbols.is_empty() {
        return Err(SymbolsError::Empty(path.display().to_string()));
    }
    Ok(symbols)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn one_symbol_per_line() {
        let content = "ETHBTC\n  LTCBTC \n\n# delisted\n#BCCBTC\nBNBBTC\nETHBTC\n\n";
        assert_eq!(parse_symbols(content), ["ETHBTC", "LTCBTC", "BNBBTC"]);
    }

    #[test]
    fn reads_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ETHBTC\r\nLTCBTC").unwrap();
        assert_eq!(read_symbols(file.path()).unwrap(), ["ETHBTC", "LTCBTC"]);
    }

    #[test]
    fn empty_and_missing_files_fail() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# nothing yet\n\n").unwrap();
        assert!(matches!(read_symbols(file.path()), Err(SymbolsError::Empty(_))));
        assert!(matches!(
            read_symbols(Path::new("/no/such/symbols.txt")),
            Err(SymbolsError::Io { .. })
        ));
    }
}
