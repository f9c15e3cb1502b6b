//! Name validation for new and renamed entries

use thiserror::Error;

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilenameValidationError {
	#[error("Filename cannot be empty")]
	Empty,

	#[error("Filename cannot contain a path separator")]
	ContainsPathSeparator,

	#[error("Filename cannot be '.' or '..'")]
	InvalidDotName,

	#[error("Filename contains invalid character: {0:?}")]
	InvalidCharacter(char),

	#[error("Filename exceeds maximum length of {0} bytes")]
	TooLong(usize),
}

/// Characters the NameNode refuses in a path component
const INVALID_CHARS: &[char] = &[':', '\0'];

/// HDFS `dfs.namenode.fs-limits.max-component-length` default
const MAX_FILENAME_LENGTH: usize = 255;

pub fn validate_filename(name: &str) -> Result<(), FilenameValidationError> {
	if name.is_empty() {
		return Err(FilenameValidationError::Empty);
	}

	if name.contains('/') {
		return Err(FilenameValidationError::ContainsPathSeparator);
	}

	if name == "." || name == ".." {
		return Err(FilenameValidationError::InvalidDotName);
	}

	if let Some(c) = name.chars().find(|c| INVALID_CHARS.contains(c)) {
		return Err(FilenameValidationError::InvalidCharacter(c));
	}

	if name.len() > MAX_FILENAME_LENGTH {
		return Err(FilenameValidationError::TooLong(MAX_FILENAME_LENGTH));
	}

	Ok(())
}

impl From<FilenameValidationError> for Error {
	fn from(e: FilenameValidationError) -> Self {
		Error::InvalidArgument(e.to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_valid_filenames() {
		assert!(validate_filename("part-00000.parquet").is_ok());
		assert!(validate_filename("my report.csv").is_ok());
		assert!(validate_filename(".hidden").is_ok());
		assert!(validate_filename("日本語ファイル.txt").is_ok());
	}

	#[test]
	fn test_invalid_filenames() {
		assert_eq!(validate_filename(""), Err(FilenameValidationError::Empty));
		assert_eq!(
			validate_filename("a/b"),
			Err(FilenameValidationError::ContainsPathSeparator)
		);
		assert_eq!(validate_filename(".."), Err(FilenameValidationError::InvalidDotName));
		assert_eq!(
			validate_filename("a:b"),
			Err(FilenameValidationError::InvalidCharacter(':'))
		);
		assert_eq!(
			validate_filename(&"a".repeat(256)),
			Err(FilenameValidationError::TooLong(255))
		);
	}
}
