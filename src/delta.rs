//! Line-based deltas between two versions of a file.
//!
//! A delta is a self-contained text payload that reproduces a new version of a file from an old
//! one.  It is computed with a Myers diff over lines (line terminators included, so arbitrary
//! bytes survive intact) and serialized as:
//!
//! ```text
//! delta 1
//! = <n>      copy the next n lines of the base
//! - <n>      skip the next n lines of the base
//! + <len>    insert the <len> raw bytes that follow, then a newline
//! ```
//!
//! Base lines left over after the last operation are copied unchanged, so the delta between two
//! identical files is the header alone.

use crate::error::{Error, Result};
use similar::{capture_diff_slices, Algorithm, DiffTag};

const HEADER: &[u8] = b"delta 1\n";

/// An operation in a delta, in base order.
#[derive(Debug, PartialEq)]
enum Op<'a> {
    Copy(usize),
    Skip(usize),
    Insert(&'a [u8]),
}

/// Split content into lines, keeping each line's terminating `\n`.
fn lines(content: &[u8]) -> Vec<&[u8]> {
    let mut lines = vec![];
    let mut start = 0;
    for (i, b) in content.iter().enumerate() {
        if *b == b'\n' {
            lines.push(&content[start..=i]);
            start = i + 1;
        }
    }
    if start < content.len() {
        lines.push(&content[start..]);
    }
    lines
}

/// Compute a delta that transforms `old` into `new`.
pub fn diff(old: &[u8], new: &[u8]) -> Vec<u8> {
    let old_lines = lines(old);
    let new_lines = lines(new);
    let ops = capture_diff_slices(Algorithm::Myers, &old_lines, &new_lines);

    // line offsets into `new`, so inserted runs can be emitted as one contiguous slice
    let mut offsets = Vec::with_capacity(new_lines.len() + 1);
    let mut pos = 0;
    offsets.push(pos);
    for line in &new_lines {
        pos += line.len();
        offsets.push(pos);
    }

    let mut delta = HEADER.to_vec();
    let mut pending_copy = 0;
    for op in ops {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        if tag == DiffTag::Equal {
            pending_copy += old_range.len();
            continue;
        }
        if pending_copy > 0 {
            delta.extend_from_slice(format!("= {}\n", pending_copy).as_bytes());
            pending_copy = 0;
        }
        if !old_range.is_empty() {
            delta.extend_from_slice(format!("- {}\n", old_range.len()).as_bytes());
        }
        if !new_range.is_empty() {
            let inserted = &new[offsets[new_range.start]..offsets[new_range.end]];
            delta.extend_from_slice(format!("+ {}\n", inserted.len()).as_bytes());
            delta.extend_from_slice(inserted);
            delta.push(b'\n');
        }
    }
    // a trailing copy is implicit

    delta
}

/// Apply a delta produced by `diff` to `base`, reproducing the new version.
pub fn apply(delta: &[u8], base: &[u8]) -> Result<Vec<u8>> {
    let ops = parse(delta)?;
    let base_lines = lines(base);
    let mut result = Vec::with_capacity(base.len());
    let mut cursor: usize = 0;

    for op in ops {
        match op {
            Op::Copy(n) | Op::Skip(n) => {
                let end = match cursor.checked_add(n) {
                    Some(end) if end <= base_lines.len() => end,
                    _ => {
                        return Err(Error::malformed(
                            "delta",
                            format!(
                                "needs {} base lines from line {}, but the base has {}",
                                n,
                                cursor,
                                base_lines.len()
                            ),
                        ))
                    }
                };
                if let Op::Copy(_) = op {
                    for line in &base_lines[cursor..end] {
                        result.extend_from_slice(line);
                    }
                }
                cursor = end;
            }
            Op::Insert(bytes) => result.extend_from_slice(bytes),
        }
    }
    for line in &base_lines[cursor..] {
        result.extend_from_slice(line);
    }

    Ok(result)
}

fn parse(delta: &[u8]) -> Result<Vec<Op>> {
    if !delta.starts_with(HEADER) {
        return Err(Error::malformed("delta", "missing header"));
    }

    let mut ops = vec![];
    let mut rest = &delta[HEADER.len()..];
    while !rest.is_empty() {
        let eol = rest
            .iter()
            .position(|b| *b == b'\n')
            .ok_or_else(|| Error::malformed("delta", "unterminated operation"))?;
        let line = std::str::from_utf8(&rest[..eol])
            .map_err(|_| Error::malformed("delta", "operation is not text"))?;
        rest = &rest[eol + 1..];

        let bytes = line.as_bytes();
        if bytes.len() < 3 || bytes[1] != b' ' {
            return Err(Error::malformed("delta", format!("bad operation {:?}", line)));
        }
        let count: usize = line[2..]
            .parse()
            .map_err(|_| Error::malformed("delta", format!("bad count in {:?}", line)))?;

        match bytes[0] {
            b'=' => ops.push(Op::Copy(count)),
            b'-' => ops.push(Op::Skip(count)),
            b'+' => {
                if count >= rest.len() || rest[count] != b'\n' {
                    return Err(Error::malformed("delta", "truncated insertion"));
                }
                ops.push(Op::Insert(&rest[..count]));
                rest = &rest[count + 1..];
            }
            _ => return Err(Error::malformed("delta", format!("bad operation {:?}", line))),
        }
    }

    Ok(ops)
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    fn round_trip(a: &[u8], b: &[u8]) {
        let delta = diff(a, b);
        assert_eq!(apply(&delta, a).unwrap(), b.to_vec());
    }

    #[test]
    fn lines_keep_terminators() {
        assert_eq!(lines(b"a\nb\nc"), vec![&b"a\n"[..], &b"b\n"[..], &b"c"[..]]);
        assert_eq!(lines(b"a\n"), vec![&b"a\n"[..]]);
        assert!(lines(b"").is_empty());
    }

    #[test]
    fn identical_is_header_only() {
        assert_eq!(diff(b"same\ncontent\n", b"same\ncontent\n"), HEADER.to_vec());
        assert_eq!(diff(b"", b""), HEADER.to_vec());
    }

    #[test]
    fn identity_applies_to_anything() {
        let identity = diff(b"", b"");
        assert_eq!(apply(&identity, b"any\nbase").unwrap(), b"any\nbase".to_vec());
    }

    #[test]
    fn single_line_change() {
        let delta = diff(b"hello", b"hello world");
        assert_eq!(delta, b"delta 1\n- 1\n+ 11\nhello world\n".to_vec());
        round_trip(b"hello", b"hello world");
    }

    #[test]
    fn middle_edit_copies_context() {
        let old = b"one\ntwo\nthree\nfour\n";
        let new = b"one\n2\nthree\nfour\n";
        let delta = diff(old, new);
        assert_eq!(delta, b"delta 1\n= 1\n- 1\n+ 2\n2\n\n".to_vec());
        round_trip(old, new);
    }

    #[test]
    fn round_trips() {
        round_trip(b"", b"something\n");
        round_trip(b"something\n", b"");
        round_trip(b"a\nb\nc\n", b"c\nb\na\n");
        round_trip(b"no newline", b"no newline\n");
        round_trip(b"x\n\n\ny", b"\n\nx\ny\n\n");
        round_trip(&[0u8, 159, 146, 150, b'\n', 255], &[255u8, b'\n', 0, 0]);
    }

    #[test]
    fn apply_past_end_of_base_fails() {
        let delta = diff(b"a\nb\nc\n", b"a\nb\nX\n");
        assert!(apply(&delta, b"a\n").is_err());
    }

    #[test]
    fn apply_garbage_fails() {
        assert!(apply(b"not a delta", b"").is_err());
        assert!(apply(b"delta 1\n? 3\n", b"").is_err());
        assert!(apply(b"delta 1\n+ 10\nshort\n", b"").is_err());
    }

    #[test]
    fn huge_insert_length_is_malformed() {
        let delta = format!("delta 1\n+ {}\n", usize::MAX);
        match apply(delta.as_bytes(), b"") {
            Err(Error::MalformedObject { .. }) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn huge_copy_count_is_malformed() {
        let delta = format!("delta 1\n= 1\n= {}\n", usize::MAX);
        match apply(delta.as_bytes(), b"a\n") {
            Err(Error::MalformedObject { .. }) => {}
            other => panic!("unexpected {:?}", other),
        }
        let delta = format!("delta 1\n- 1\n- {}\n", usize::MAX);
        assert!(apply(delta.as_bytes(), b"a\n").is_err());
    }

    prop_compose! {
        // mostly a few letters and newlines, so that inputs share lines
        fn arb_content()(
            bytes in proptest::collection::vec(
                prop_oneof![
                    3 => Just(b'\n'),
                    4 => proptest::sample::select(vec![b'a', b'b', b'c']),
                    1 => any::<u8>(),
                ],
                0..200,
            ),
        ) -> Vec<u8> {
            bytes
        }
    }

    proptest! {
        #[test]
        fn apply_inverts_diff(old in arb_content(), new in arb_content()) {
            let delta = diff(&old, &new);
            prop_assert_eq!(apply(&delta, &old).unwrap(), new);
        }

        #[test]
        fn apply_inverts_diff_on_edits(
            base in arb_content(),
            edit in arb_content(),
            at in any::<usize>(),
        ) {
            let at = if base.is_empty() { 0 } else { at % base.len() };
            let mut new = base[..at].to_vec();
            new.extend_from_slice(&edit);
            new.extend_from_slice(&base[at..]);
            prop_assert_eq!(apply(&diff(&base, &new), &base).unwrap(), new.clone());
            prop_assert_eq!(apply(&diff(&new, &base), &new).unwrap(), base);
        }

        #[test]
        fn apply_never_panics(
            delta in proptest::collection::vec(any::<u8>(), 0..64),
            base in arb_content(),
        ) {
            let mut input = HEADER.to_vec();
            input.extend_from_slice(&delta);
            let _ = apply(&input, &base);
        }
    }
}
