//! Recognises binary columnar containers from their leading bytes, so the
//! content preview can flag them instead of rendering garbage.

use hx_columnar::ColumnarFormat;

mod magic;

use magic::MagicBytePattern;

const SIGNATURES: [(ColumnarFormat, MagicBytePattern); 3] = [
	(ColumnarFormat::Orc, MagicBytePattern::literal(b"ORC", 0)),
	(ColumnarFormat::Parquet, MagicBytePattern::literal(b"PAR1", 0)),
	(
		ColumnarFormat::Avro,
		MagicBytePattern::literal(hx_columnar::avro::MAGIC, 0),
	),
];

/// Format whose signature starts `head`, if any.
pub fn sniff(head: &[u8]) -> Option<ColumnarFormat> {
	SIGNATURES
		.iter()
		.find(|(_, pattern)| pattern.matches(head))
		.map(|(format, _)| *format)
}

/// Bytes needed to tell every known format apart.
pub fn signature_len() -> usize {
	SIGNATURES
		.iter()
		.map(|(_, p)| p.required_size())
		.max()
		.unwrap_or_default()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn known_signatures() {
		assert_eq!(sniff(b"ORC\x0a\x03"), Some(ColumnarFormat::Orc));
		assert_eq!(sniff(b"PAR1\x15"), Some(ColumnarFormat::Parquet));
		assert_eq!(sniff(b"Obj\x01\x04"), Some(ColumnarFormat::Avro));
		assert_eq!(sniff(b"Obj\x02"), None);
		assert_eq!(sniff(b"id,name\n1,a"), None);
		assert_eq!(sniff(b""), None);
		assert_eq!(signature_len(), 4);
	}
}
