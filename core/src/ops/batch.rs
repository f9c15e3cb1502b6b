use serde::Serialize;
use tracing::error;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathFailure {
	pub path: String,
	pub code: String,
	pub message: String,
}

/// Outcome of an operation applied to many paths independently.
///
/// The remote offers no transactions, so nothing is rolled back: whatever
/// succeeded stays done and every failure is listed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
	pub success: bool,
	pub failures: Vec<PathFailure>,
}

impl BatchReport {
	pub fn from_outcomes(operation: &str, outcomes: impl IntoIterator<Item = (String, Result<()>)>) -> Self {
		let failures = outcomes
			.into_iter()
			.filter_map(|(path, outcome)| outcome.err().map(|e| (path, e)))
			.map(|(path, e): (String, Error)| {
				error!(operation, %path, code = e.code(), "{e}");
				PathFailure {
					path,
					code: e.code().to_string(),
					message: e.to_string(),
				}
			})
			.collect::<Vec<_>>();

		Self {
			success: failures.is_empty(),
			failures,
		}
	}

	pub fn failed_paths(&self) -> Vec<&str> {
		self.failures.iter().map(|f| f.path.as_str()).collect()
	}

	pub fn failure(&self, path: &str) -> Option<&PathFailure> {
		self.failures.iter().find(|f| f.path == path)
	}
}
