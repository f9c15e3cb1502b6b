//! Maps 1-based logical pages onto row groups (Parquet) or stripes (ORC).

use std::ops::Range;

use serde::Serialize;

/// Rows covered by one row group or stripe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowGroupSpan {
	pub index: usize,
	pub first_row: u64,
	pub row_count: u64,
}

impl RowGroupSpan {
	pub fn rows(&self) -> Range<u64> {
		self.first_row..self.first_row + self.row_count
	}
}

/// Builds contiguous spans from per-group row counts.
pub fn spans_from_counts(counts: impl IntoIterator<Item = u64>) -> Vec<RowGroupSpan> {
	let mut first_row = 0;
	counts
		.into_iter()
		.enumerate()
		.map(|(index, row_count)| {
			let span = RowGroupSpan {
				index,
				first_row,
				row_count,
			};
			first_row += row_count;
			span
		})
		.collect()
}

/// What a decoder has to do to produce one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageWindow {
	/// Row groups to decode, in order.
	pub groups: Range<usize>,
	/// Rows to drop from the start of the first group.
	pub skip: u64,
	/// Rows to keep after skipping.
	pub take: u64,
}

/// Global row range of `page`, clamped to `total_rows`.
///
/// Returns `None` for page 0, a zero page size or a page past the end.
pub fn page_rows(page: u64, page_size: u64, total_rows: u64) -> Option<Range<u64>> {
	if page == 0 || page_size == 0 {
		return None;
	}

	let start = (page - 1).checked_mul(page_size)?;
	if start >= total_rows {
		return None;
	}

	Some(start..start.saturating_add(page_size).min(total_rows))
}

/// Picks the row groups that overlap `page` and how much of them to keep.
pub fn plan_page(groups: &[RowGroupSpan], page: u64, page_size: u64) -> Option<PageWindow> {
	let total = groups.last().map_or(0, |g| g.first_row + g.row_count);
	let rows = page_rows(page, page_size, total)?;

	let overlapping = |g: &&RowGroupSpan| {
		g.row_count > 0 && g.first_row < rows.end && rows.start < g.rows().end
	};

	let first = groups.iter().find(overlapping)?;
	let last = groups.iter().rev().find(overlapping)?;

	Some(PageWindow {
		groups: first.index..last.index + 1,
		skip: rows.start - first.first_row,
		take: rows.end - rows.start,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	#[test]
	fn out_of_range_pages_are_empty() {
		assert_eq!(page_rows(0, 100, 250), None);
		assert_eq!(page_rows(1, 0, 250), None);
		assert_eq!(page_rows(4, 100, 250), None);
		assert_eq!(page_rows(u64::MAX, u64::MAX, 250), None);
		assert_eq!(page_rows(3, 100, 250), Some(200..250));
	}

	#[test]
	fn windows_cover_only_overlapping_groups() {
		// 250 rows split 60/60/60/70
		let groups = spans_from_counts([60, 60, 60, 70]);

		assert_eq!(
			plan_page(&groups, 1, 100),
			Some(PageWindow {
				groups: 0..2,
				skip: 0,
				take: 100
			})
		);
		assert_eq!(
			plan_page(&groups, 2, 100),
			Some(PageWindow {
				groups: 1..4,
				skip: 40,
				take: 100
			})
		);
		assert_eq!(
			plan_page(&groups, 3, 100),
			Some(PageWindow {
				groups: 3..4,
				skip: 20,
				take: 50
			})
		);
		assert_eq!(plan_page(&groups, 4, 100), None);
	}

	#[test]
	fn empty_groups_do_not_anchor_windows() {
		let groups = spans_from_counts([0, 10, 0, 10]);

		assert_eq!(
			plan_page(&groups, 1, 20),
			Some(PageWindow {
				groups: 1..4,
				skip: 0,
				take: 20
			})
		);
		assert_eq!(
			plan_page(&groups, 2, 10),
			Some(PageWindow {
				groups: 3..4,
				skip: 0,
				take: 10
			})
		);
		assert_eq!(plan_page(&[], 1, 10), None);
	}

	#[test]
	fn pages_tile_the_file_without_gaps() {
		let groups = spans_from_counts([7, 13, 1, 29]);
		let mut covered = 0;
		let mut page = 1;

		while let Some(rows) = page_rows(page, 9, 50) {
			assert_eq!(rows.start, covered);
			covered = rows.end;
			page += 1;
			assert!(plan_page(&groups, page - 1, 9).is_some());
		}

		assert_eq!(covered, 50);
	}
}
