//! Magic byte pattern matching

/// Bytes expected at a fixed offset from the start of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MagicBytePattern {
	pub bytes: &'static [u8],
	pub offset: usize,
}

impl MagicBytePattern {
	/// Pattern matching `literal` exactly at `offset`.
	pub const fn literal(literal: &'static [u8], offset: usize) -> Self {
		Self {
			bytes: literal,
			offset,
		}
	}

	/// Check if this pattern matches the given buffer
	pub fn matches(&self, buf: &[u8]) -> bool {
		buf.get(self.offset..self.required_size())
			.is_some_and(|slice| slice == self.bytes)
	}

	/// Get the minimum buffer size needed to check this pattern
	pub fn required_size(&self) -> usize {
		self.offset + self.bytes.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_pattern_matching() {
		let pattern = MagicBytePattern::literal(b"PAR1", 0);
		assert!(pattern.matches(b"PAR1\x15\x04"));
		assert!(!pattern.matches(b"PAR"));
		assert!(!pattern.matches(b"ORC\x00"));
		assert_eq!(pattern.required_size(), 4);

		let pattern = MagicBytePattern::literal(b"\x4B", 2);
		assert!(pattern.matches(&[0x00, 0x00, 0x4B]));
		assert!(!pattern.matches(&[0x4B, 0x00, 0x00]));
		assert!(!pattern.matches(&[0x00, 0x4B]));
	}
}
