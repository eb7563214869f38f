//! Composite identifier codec
//!
//! Attachment-style resources have no identity of their own, so their ID is
//! built from the names of the resources they join, e.g. `disk-1,web-1`.
//!
//! Parts are joined with [`ID_SEPARATOR`]. A backslash escapes the separator
//! and itself, which keeps every part reversible. Identifiers written before
//! escaping existed decode unchanged as long as their parts contain no
//! backslash; a backslash followed by any other character is kept literally.

use crate::error::{CloudError, Result};

pub const ID_SEPARATOR: char = ',';
const ESCAPE: char = '\\';

/// Shape of one resource type's composite identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentifierFormat {
    /// Resource type name used in error messages
    pub name: &'static str,

    /// Ordered part names; the length is the fixed part count
    pub parts: &'static [&'static str],

    /// Whether a part may be the empty string
    pub allow_empty: bool,
}

impl IdentifierFormat {
    pub const fn new(name: &'static str, parts: &'static [&'static str]) -> Self {
        Self {
            name,
            parts,
            allow_empty: false,
        }
    }

    pub const fn allowing_empty(mut self) -> Self {
        self.allow_empty = true;
        self
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    pub fn encode<S: AsRef<str>>(&self, parts: &[S]) -> Result<String> {
        if parts.len() != self.part_count() {
            return Err(CloudError::PartCountMismatch {
                kind: self.name,
                expected: self.part_count(),
                actual: parts.len(),
            });
        }

        if !self.allow_empty {
            if let Some(index) = parts.iter().position(|p| p.as_ref().is_empty()) {
                return Err(CloudError::InvalidInput(format!(
                    "{} identifier part `{}` must not be empty",
                    self.name, self.parts[index]
                )));
            }
        }

        Ok(join_escaped(parts))
    }

    pub fn decode(&self, id: &str) -> Result<Vec<String>> {
        let parts = split_escaped(id);

        if parts.len() != self.part_count() {
            return Err(CloudError::MalformedIdentifier {
                kind: self.name,
                id: id.to_string(),
                reason: format!(
                    "expected {} parts ({}), got {}",
                    self.part_count(),
                    self.parts.join(","),
                    parts.len()
                ),
            });
        }

        if !self.allow_empty {
            if let Some(index) = parts.iter().position(|p| p.is_empty()) {
                return Err(CloudError::MalformedIdentifier {
                    kind: self.name,
                    id: id.to_string(),
                    reason: format!("part `{}` is empty", self.parts[index]),
                });
            }
        }

        Ok(parts)
    }

    /// Decode into a fixed-size array, for destructuring at the call site
    pub fn decode_array<const N: usize>(&self, id: &str) -> Result<[String; N]> {
        if N != self.part_count() {
            return Err(CloudError::PartCountMismatch {
                kind: self.name,
                expected: self.part_count(),
                actual: N,
            });
        }

        let parts = self.decode(id)?;
        parts
            .try_into()
            .map_err(|parts: Vec<String>| CloudError::PartCountMismatch {
                kind: self.name,
                expected: N,
                actual: parts.len(),
            })
    }
}

/// Encode `parts`, requiring exactly `expected_count` of them
pub fn encode<S: AsRef<str>>(parts: &[S], expected_count: usize) -> Result<String> {
    if parts.len() != expected_count {
        return Err(CloudError::PartCountMismatch {
            kind: "composite",
            expected: expected_count,
            actual: parts.len(),
        });
    }
    Ok(join_escaped(parts))
}

/// Decode `id`, requiring exactly `expected_count` parts
pub fn decode(id: &str, expected_count: usize) -> Result<Vec<String>> {
    let parts = split_escaped(id);
    if parts.len() != expected_count {
        return Err(CloudError::MalformedIdentifier {
            kind: "composite",
            id: id.to_string(),
            reason: format!("expected {} parts, got {}", expected_count, parts.len()),
        });
    }
    Ok(parts)
}

fn join_escaped<S: AsRef<str>>(parts: &[S]) -> String {
    let mut id = String::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            id.push(ID_SEPARATOR);
        }
        for c in part.as_ref().chars() {
            if c == ESCAPE || c == ID_SEPARATOR {
                id.push(ESCAPE);
            }
            id.push(c);
        }
    }
    id
}

fn split_escaped(id: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = id.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            ESCAPE => match chars.peek() {
                Some(&next) if next == ESCAPE || next == ID_SEPARATOR => {
                    current.push(next);
                    chars.next();
                }
                _ => current.push(ESCAPE),
            },
            ID_SEPARATOR => parts.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    parts.push(current);

    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ATTACHMENT: IdentifierFormat =
        IdentifierFormat::new("disk attachment", &["disk_name", "instance_name"]);

    #[test]
    fn test_plain_parts_match_legacy_format() {
        let id = ATTACHMENT.encode(&["d1", "i1"]).unwrap();
        assert_eq!(id, "d1,i1");
        assert_eq!(ATTACHMENT.decode("d1,i1").unwrap(), vec!["d1", "i1"]);
    }

    #[test]
    fn test_delimiter_inside_part_round_trips() {
        let id = ATTACHMENT.encode(&["data,disk", r"web\1"]).unwrap();
        assert_eq!(id, r"data\,disk,web\\1");
        assert_eq!(ATTACHMENT.decode(&id).unwrap(), vec!["data,disk", r"web\1"]);
    }

    #[test]
    fn test_lone_backslash_decodes_literally() {
        assert_eq!(
            ATTACHMENT.decode(r"C:\disk,i1").unwrap(),
            vec![r"C:\disk", "i1"]
        );
        assert_eq!(ATTACHMENT.decode(r"d1,i1\").unwrap(), vec!["d1", r"i1\"]);
    }

    #[test]
    fn test_encode_part_count_mismatch() {
        let err = ATTACHMENT.encode(&["d1"]).unwrap_err();
        assert!(matches!(
            err,
            CloudError::PartCountMismatch {
                expected: 2,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_decode_wrong_count_never_truncates_or_pads() {
        for id in ["d1", "d1,i1,extra", ""] {
            let err = ATTACHMENT.decode(id).unwrap_err();
            assert!(
                matches!(err, CloudError::MalformedIdentifier { .. }),
                "{:?} decoded",
                id
            );
        }
    }

    #[test]
    fn test_empty_parts_rejected_unless_allowed() {
        assert!(ATTACHMENT.encode(&["", "i1"]).is_err());
        assert!(matches!(
            ATTACHMENT.decode(",i1"),
            Err(CloudError::MalformedIdentifier { .. })
        ));

        let lenient = ATTACHMENT.allowing_empty();
        assert_eq!(lenient.decode(",i1").unwrap(), vec!["", "i1"]);
    }

    #[test]
    fn test_decode_array() {
        let [disk, instance] = ATTACHMENT.decode_array::<2>("d1,i1").unwrap();
        assert_eq!(disk, "d1");
        assert_eq!(instance, "i1");

        assert!(ATTACHMENT.decode_array::<3>("d1,i1").is_err());
    }

    #[test]
    fn test_free_functions() {
        assert_eq!(encode(&["a", "b", "c"], 3).unwrap(), "a,b,c");
        assert!(encode(&["a", "b"], 3).is_err());
        assert_eq!(decode("a,,c", 3).unwrap(), vec!["a", "", "c"]);
        assert!(matches!(
            decode("a,b", 3),
            Err(CloudError::MalformedIdentifier { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_round_trip(parts in prop::collection::vec(".*", 1..6)) {
            let id = encode(&parts, parts.len()).unwrap();
            prop_assert_eq!(decode(&id, parts.len()).unwrap(), parts);
        }

        #[test]
        fn prop_legacy_ids_decode_unchanged(
            parts in prop::collection::vec("[a-zA-Z0-9._-]{1,12}", 2..=2)
        ) {
            let legacy = parts.join(",");
            prop_assert_eq!(ATTACHMENT.decode(&legacy).unwrap(), parts);
        }

        #[test]
        fn prop_wrong_count_is_malformed(
            parts in prop::collection::vec(".*", 1..6),
            extra in 1usize..3,
        ) {
            let id = encode(&parts, parts.len()).unwrap();
            let is_malformed = matches!(
                decode(&id, parts.len() + extra),
                Err(CloudError::MalformedIdentifier { .. })
            );
            prop_assert!(is_malformed);
        }
    }
}
