//! Output filename derivation.
//!
//! Every product builds its COG name the same way: split the source file
//! name into tokens, drop the extension token, move or insert the variable
//! name and a date token, then join with `_` and append `.tif`.
//!
//! Indexing from the end follows the usual convention: `-1` is the last
//! token.

use crate::error::{Result, TransformError};

/// Default separators: underscore, space and dot.
pub const DEFAULT_SEPARATORS: &[char] = &['_', ' ', '.'];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameTokens {
    source: String,
    tokens: Vec<String>,
}

impl FilenameTokens {
    /// Tokenize the final path segment of `name` on `[_ .]`.
    pub fn parse(name: &str) -> Self {
        Self::parse_with(name, DEFAULT_SEPARATORS)
    }

    pub fn parse_with(name: &str, separators: &[char]) -> Self {
        let file = name.rsplit('/').next().unwrap_or(name);
        Self {
            source: file.to_string(),
            tokens: file.split(separators).map(str::to_string).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    fn from_end(&self, n: usize) -> Result<usize> {
        if n == 0 || n > self.tokens.len() {
            return Err(TransformError::filename(
                &self.source,
                format!("no token at position -{} of {}", n, self.tokens.len()),
            ));
        }
        Ok(self.tokens.len() - n)
    }

    /// Token `n` places from the end (`1` is the last).
    pub fn get_from_end(&self, n: usize) -> Result<&str> {
        let i = self.from_end(n)?;
        Ok(&self.tokens[i])
    }

    /// Remove and return the last token.
    pub fn pop(&mut self) -> Result<String> {
        self.tokens
            .pop()
            .ok_or_else(|| TransformError::filename(&self.source, "no tokens left to drop"))
    }

    /// Remove the token `n` places from the end.
    pub fn remove_from_end(&mut self, n: usize) -> Result<String> {
        let i = self.from_end(n)?;
        Ok(self.tokens.remove(i))
    }

    /// Insert at `index` from the start, clamped to the end.
    pub fn insert(&mut self, index: usize, token: impl Into<String>) {
        let index = index.min(self.tokens.len());
        self.tokens.insert(index, token.into());
    }

    pub fn push(&mut self, token: impl Into<String>) {
        self.tokens.push(token.into());
    }

    pub fn set_from_end(&mut self, n: usize, token: impl Into<String>) -> Result<()> {
        let i = self.from_end(n)?;
        self.tokens[i] = token.into();
        Ok(())
    }

    pub fn set_last(&mut self, token: impl Into<String>) -> Result<()> {
        self.set_from_end(1, token)
    }

    /// `tokens.join("_")` without an extension.
    pub fn join(&self) -> String {
        self.tokens.join("_")
    }

    /// Joined name with the `.tif` extension.
    pub fn cog_name(&self) -> String {
        format!("{}.tif", self.join())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uses_basename() {
        let t = FilenameTokens::parse("geos-oco2/oco2_GEOS_L3CO2_day_20150101_B10206Ar.nc4");
        assert_eq!(
            t.tokens(),
            ["oco2", "GEOS", "L3CO2", "day", "20150101", "B10206Ar", "nc4"]
        );
    }

    #[test]
    fn test_custom_separators_keep_dots() {
        let t = FilenameTokens::parse_with("tx_ACCESS-CM2_ssp245_2015.nc", &['_']);
        assert_eq!(t.get_from_end(1).unwrap(), "2015.nc");
    }

    #[test]
    fn test_edit_sequence() {
        let mut t = FilenameTokens::parse("CO2_flux_2020_01.nc");
        t.pop().unwrap();
        let merged = format!("{}{}", t.get_from_end(2).unwrap(), t.get_from_end(1).unwrap());
        t.set_last(merged).unwrap();
        t.remove_from_end(2).unwrap();
        assert_eq!(t.cog_name(), "CO2_flux_202001.tif");
    }

    #[test]
    fn test_insert_clamps_and_errors_on_underflow() {
        let mut t = FilenameTokens::parse("a.nc");
        t.insert(5, "var");
        assert_eq!(t.join(), "a_nc_var");

        assert!(t.get_from_end(4).is_err());
        assert!(matches!(
            t.set_from_end(0, "x"),
            Err(TransformError::Filename { .. })
        ));
    }
}
