//! Line diff for canonical JSON.

use std::fmt::Write as _;

/// How [`render_diff`] labels and separates its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffOptions {
    /// Name printed for the left side (`---`).
    pub left_label: String,
    /// Name printed for the right side (`+++`).
    pub right_label: String,
    /// Line printed between change blocks.
    pub divider: String,
    /// Unchanged lines shown around each change.
    pub context: usize,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            left_label: "expected".to_string(),
            right_label: "actual".to_string(),
            divider: "-".repeat(40),
            context: 3,
        }
    }
}

/// Largest LCS table (in cells) built for the changed middle of two texts.
/// Past this the middle is shown as one block replaced by another.
const MAX_LCS_CELLS: usize = 4 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Equal(usize, usize),
    Delete(usize),
    Insert(usize),
}

/// Longest-common-subsequence edit script between two line slices.
///
/// Common leading and trailing lines are matched directly. If the table for
/// what remains would exceed `max_cells`, the remainder is deleted and
/// inserted as a whole.
fn edit_script(left: &[&str], right: &[&str], max_cells: usize) -> Vec<Op> {
    let prefix = left
        .iter()
        .zip(right)
        .take_while(|(l, r)| l == r)
        .count();
    let suffix = left[prefix..]
        .iter()
        .rev()
        .zip(right[prefix..].iter().rev())
        .take_while(|(l, r)| l == r)
        .count();
    let l = &left[prefix..left.len() - suffix];
    let r = &right[prefix..right.len() - suffix];

    let mut ops: Vec<Op> = (0..prefix).map(|i| Op::Equal(i, i)).collect();
    let width = r.len() + 1;
    let cells = (l.len() + 1).saturating_mul(width);
    if cells > max_cells {
        log::debug!("diff middle of {cells} cells exceeds {max_cells}, replacing as a block");
        ops.extend((0..l.len()).map(|i| Op::Delete(prefix + i)));
        ops.extend((0..r.len()).map(|j| Op::Insert(prefix + j)));
        push_suffix(&mut ops, left.len(), right.len(), suffix);
        return ops;
    }

    // lcs[i][j] = LCS length of l[i..] and r[j..]
    let mut lcs = vec![0u32; cells];
    for i in (0..l.len()).rev() {
        for j in (0..r.len()).rev() {
            lcs[i * width + j] = if l[i] == r[j] {
                lcs[(i + 1) * width + j + 1] + 1
            } else {
                lcs[(i + 1) * width + j].max(lcs[i * width + j + 1])
            };
        }
    }

    let (mut i, mut j) = (0, 0);
    while i < l.len() && j < r.len() {
        if l[i] == r[j] {
            ops.push(Op::Equal(prefix + i, prefix + j));
            i += 1;
            j += 1;
        } else if lcs[(i + 1) * width + j] >= lcs[i * width + j + 1] {
            ops.push(Op::Delete(prefix + i));
            i += 1;
        } else {
            ops.push(Op::Insert(prefix + j));
            j += 1;
        }
    }
    ops.extend((i..l.len()).map(|i| Op::Delete(prefix + i)));
    ops.extend((j..r.len()).map(|j| Op::Insert(prefix + j)));
    push_suffix(&mut ops, left.len(), right.len(), suffix);
    ops
}

fn push_suffix(ops: &mut Vec<Op>, left_len: usize, right_len: usize, suffix: usize) {
    let left_tail = left_len - suffix;
    let right_tail = right_len - suffix;
    ops.extend((0..suffix).map(|k| Op::Equal(left_tail + k, right_tail + k)));
}

/// Renders a labelled line diff, or `None` if the texts are identical.
///
/// Change blocks are printed with `context` unchanged lines around them and
/// separated by `divider`.
#[must_use]
pub fn render_diff(left: &str, right: &str, options: &DiffOptions) -> Option<String> {
    if left == right {
        return None;
    }
    let left_lines: Vec<&str> = left.lines().collect();
    let right_lines: Vec<&str> = right.lines().collect();
    let ops = edit_script(&left_lines, &right_lines, MAX_LCS_CELLS);

    // Group changed ops (with context) into hunks of op indices.
    let changed: Vec<usize> = ops
        .iter()
        .enumerate()
        .filter(|(_, op)| !matches!(op, Op::Equal(..)))
        .map(|(index, _)| index)
        .collect();
    let mut hunks: Vec<(usize, usize)> = Vec::new();
    for index in changed {
        let start = index.saturating_sub(options.context);
        let end = (index + options.context + 1).min(ops.len());
        match hunks.last_mut() {
            Some((_, last_end)) if start <= *last_end => *last_end = end,
            _ => hunks.push((start, end)),
        }
    }
    if hunks.is_empty() {
        // Only line endings differ.
        hunks.push((0, ops.len()));
    }

    let mut out = String::new();
    let _ = writeln!(out, "--- {}", options.left_label);
    let _ = writeln!(out, "+++ {}", options.right_label);
    for (n, (start, end)) in hunks.iter().enumerate() {
        if n > 0 {
            let _ = writeln!(out, "{}", options.divider);
        }
        let slice = &ops[*start..*end];
        let left_start = slice.iter().find_map(|op| match op {
            Op::Equal(i, _) | Op::Delete(i) => Some(*i),
            Op::Insert(_) => None,
        });
        let right_start = slice.iter().find_map(|op| match op {
            Op::Equal(_, j) | Op::Insert(j) => Some(*j),
            Op::Delete(_) => None,
        });
        let left_count = slice.iter().filter(|op| !matches!(op, Op::Insert(_))).count();
        let right_count = slice.iter().filter(|op| !matches!(op, Op::Delete(_))).count();
        let _ = writeln!(
            out,
            "@@ -{},{left_count} +{},{right_count} @@",
            left_start.map_or(0, |i| i + 1),
            right_start.map_or(0, |j| j + 1),
        );
        for op in slice {
            let _ = match op {
                Op::Equal(i, _) => writeln!(out, " {}", left_lines[*i]),
                Op::Delete(i) => writeln!(out, "-{}", left_lines[*i]),
                Op::Insert(j) => writeln!(out, "+{}", right_lines[*j]),
            };
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_is_none() {
        assert_eq!(render_diff("a\nb\n", "a\nb\n", &DiffOptions::default()), None);
    }

    #[test]
    fn test_single_change_with_labels() {
        let options = DiffOptions {
            left_label: "original".to_string(),
            right_label: "roundtrip".to_string(),
            context: 1,
            ..DiffOptions::default()
        };
        let diff = render_diff("a\nb\nc\nd\n", "a\nB\nc\nd\n", &options).expect("differs");
        assert_eq!(
            diff,
            "--- original\n+++ roundtrip\n@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n"
        );
    }

    #[test]
    fn test_distant_changes_are_divided() {
        let left: String = (0..20).map(|i| format!("line {i}\n")).collect();
        let right = left.replace("line 2\n", "line two\n").replace("line 17\n", "line seventeen\n");
        let options = DiffOptions {
            divider: "=====".to_string(),
            context: 2,
            ..DiffOptions::default()
        };
        let diff = render_diff(&left, &right, &options).expect("differs");
        assert_eq!(diff.matches("=====").count(), 1);
        assert!(diff.contains("-line 2\n+line two\n"));
        assert!(diff.contains("-line 17\n+line seventeen\n"));
    }

    #[test]
    fn test_insertions_and_deletions() {
        let diff = render_diff("a\nb\n", "a\nb\nc\n", &DiffOptions::default()).expect("differs");
        assert!(diff.ends_with("+c\n"));
        let diff = render_diff("x\na\n", "a\n", &DiffOptions::default()).expect("differs");
        assert!(diff.contains("-x\n"));
    }

    #[test]
    fn test_oversized_middle_is_replaced_as_block() {
        let left = ["a", "x", "b", "y", "z"];
        let right = ["a", "b", "q", "z"];
        let ops = edit_script(&left, &right, 4);
        assert_eq!(
            ops,
            vec![
                Op::Equal(0, 0),
                Op::Delete(1),
                Op::Delete(2),
                Op::Delete(3),
                Op::Insert(1),
                Op::Insert(2),
                Op::Equal(4, 3),
            ]
        );

        // Within the limit the shared "b" is kept.
        let ops = edit_script(&left, &right, MAX_LCS_CELLS);
        assert!(ops.contains(&Op::Equal(2, 1)));
    }

    #[test]
    fn test_large_inputs_with_changes_at_both_ends() {
        let left: String = (0..5_000).map(|i| format!("line {i}\n")).collect();
        let right = format!("first\n{left}last\n");
        let diff = render_diff(&left, &right, &DiffOptions::default()).expect("differs");
        assert!(diff.contains("+first\n"));
        assert!(diff.contains("+last\n"));
    }
}
