//! Minimal unified-diff generation for the best-patch artifact.
//!
//! Line-based LCS with 3 lines of context, formatted the way
//! `difflib.unified_diff` formats hunks.

const CONTEXT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Equal,
    Delete,
    Insert,
}

/// Produce a unified diff between two texts; empty string when they match.
pub fn unified_diff(a: &str, b: &str, from_label: &str, to_label: &str) -> String {
    let a_lines: Vec<&str> = a.lines().collect();
    let b_lines: Vec<&str> = b.lines().collect();

    let ops = diff_ops(&a_lines, &b_lines);
    if !ops.iter().any(|(tag, _, _)| *tag != Tag::Equal) {
        return String::new();
    }

    let mut out = String::new();
    out.push_str(&format!("--- {from_label}\n+++ {to_label}\n"));

    let mut i = 0usize;
    while i < ops.len() {
        if ops[i].0 == Tag::Equal {
            i += 1;
            continue;
        }

        // Extend the hunk over nearby changes separated by short equal runs.
        let hunk_start = leading_context_start(&ops, i);
        let mut last_change = i;
        let mut j = i + 1;
        while j < ops.len() {
            if ops[j].0 != Tag::Equal {
                last_change = j;
                j += 1;
                continue;
            }
            let run_start = j;
            while j < ops.len() && ops[j].0 == Tag::Equal {
                j += 1;
            }
            let run_len = j - run_start;
            if j >= ops.len() || run_len > 2 * CONTEXT {
                break;
            }
        }
        let hunk_end = (last_change + 1 + CONTEXT).min(ops.len());

        emit_hunk(&mut out, &ops[hunk_start..hunk_end], &a_lines, &b_lines);
        i = hunk_end;
    }

    out
}

fn leading_context_start(ops: &[(Tag, usize, usize)], change_idx: usize) -> usize {
    let mut start = change_idx;
    let mut taken = 0;
    while start > 0 && taken < CONTEXT && ops[start - 1].0 == Tag::Equal {
        start -= 1;
        taken += 1;
    }
    start
}

fn emit_hunk(out: &mut String, hunk: &[(Tag, usize, usize)], a: &[&str], b: &[&str]) {
    let old_count = hunk.iter().filter(|(t, _, _)| *t != Tag::Insert).count();
    let new_count = hunk.iter().filter(|(t, _, _)| *t != Tag::Delete).count();

    // First source positions touched by the hunk (0-based).
    let old_start = hunk
        .iter()
        .find(|(t, _, _)| *t != Tag::Insert)
        .map_or(0, |(_, ai, _)| *ai);
    let new_start = hunk
        .iter()
        .find(|(t, _, _)| *t != Tag::Delete)
        .map_or(0, |(_, _, bi)| *bi);

    out.push_str(&format!(
        "@@ -{} +{} @@\n",
        format_range(old_start, old_count),
        format_range(new_start, new_count)
    ));

    for (tag, ai, bi) in hunk {
        match tag {
            Tag::Equal => {
                out.push(' ');
                out.push_str(a[*ai]);
            }
            Tag::Delete => {
                out.push('-');
                out.push_str(a[*ai]);
            }
            Tag::Insert => {
                out.push('+');
                out.push_str(b[*bi]);
            }
        }
        out.push('\n');
    }
}

/// difflib-style range: 1-based start, `,len` omitted when len == 1.
fn format_range(start: usize, len: usize) -> String {
    let beginning = if len == 0 { start } else { start + 1 };
    if len == 1 {
        beginning.to_string()
    } else {
        format!("{beginning},{len}")
    }
}

/// Edit script as `(tag, a_index, b_index)` triples in order.
fn diff_ops(a: &[&str], b: &[&str]) -> Vec<(Tag, usize, usize)> {
    let n = a.len();
    let m = b.len();

    // dp[i][j] = LCS length of a[i..] and b[j..].
    let mut dp = vec![vec![0u32; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            dp[i][j] = if a[i] == b[j] {
                dp[i + 1][j + 1] + 1
            } else {
                dp[i + 1][j].max(dp[i][j + 1])
            };
        }
    }

    let mut ops = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0usize, 0usize);
    while i < n && j < m {
        if a[i] == b[j] {
            ops.push((Tag::Equal, i, j));
            i += 1;
            j += 1;
        } else if dp[i + 1][j] >= dp[i][j + 1] {
            ops.push((Tag::Delete, i, j));
            i += 1;
        } else {
            ops.push((Tag::Insert, i, j));
            j += 1;
        }
    }
    while i < n {
        ops.push((Tag::Delete, i, j));
        i += 1;
    }
    while j < m {
        ops.push((Tag::Insert, i, j));
        j += 1;
    }

    ops
}
