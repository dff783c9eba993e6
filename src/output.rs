use clap::ValueEnum;
use std::fmt::Display;

/// How the bytes a program wrote are presented to the user.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Bytes as characters
    #[default]
    Str,
    /// Little-endian 4-byte integers
    Ints,
    /// Little-endian 4-byte integers in hex
    HexInts,
    /// Bytes as decimal numbers
    Bytes,
    /// Bytes as hex numbers
    HexBytes,
}

impl OutputFormat {
    #[must_use]
    pub fn format(self, data: &[u8]) -> String {
        match self {
            Self::Str => data.iter().copied().map(char::from).collect(),
            Self::Ints => join(le_ints(data)),
            Self::HexInts => join(le_ints(data).map(|n| format!("{n:#x}"))),
            Self::Bytes => join(data.iter()),
            Self::HexBytes => join(data.iter().map(|b| format!("{b:#x}"))),
        }
    }
}

/// Groups bytes into little-endian `u32`s, zero-padding the last group.
fn le_ints(data: &[u8]) -> impl Iterator<Item = u32> + '_ {
    data.chunks(4).map(|chunk| {
        let mut bytes = [0u8; 4];
        bytes[..chunk.len()].copy_from_slice(chunk);
        u32::from_le_bytes(bytes)
    })
}

fn join(items: impl Iterator<Item = impl Display>) -> String {
    items
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_as_text() {
        assert_eq!(OutputFormat::Str.format(b"hi\n"), "hi\n");
    }

    #[test]
    fn formats_as_ints() {
        let data = [1, 0, 0, 0, 0, 1];
        assert_eq!(OutputFormat::Ints.format(&data), "1, 256");
        assert_eq!(OutputFormat::HexInts.format(&data), "0x1, 0x100");
        assert_eq!(OutputFormat::Ints.format(&[0xff, 0xff, 0xff, 0xff]), "4294967295");
    }

    #[test]
    fn formats_as_bytes() {
        assert_eq!(OutputFormat::Bytes.format(&[5, 255]), "5, 255");
        assert_eq!(OutputFormat::HexBytes.format(&[5, 255]), "0x5, 0xff");
    }

    #[test]
    fn empty_output_is_empty() {
        for fmt in OutputFormat::value_variants() {
            assert_eq!(fmt.format(&[]), "");
        }
    }

    #[test]
    fn parses_cli_names() {
        assert_eq!(OutputFormat::from_str("hex-ints", false), Ok(OutputFormat::HexInts));
        assert_eq!(OutputFormat::from_str("bytes", false), Ok(OutputFormat::Bytes));
    }
}
