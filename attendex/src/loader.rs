//! Bulk loading
//!
//! Builds a tree from lines of `<attendance> <student_id>`. Range checking happens here rather
//! than in the tree: a line with attendance outside `0..=100` is skipped with a warning, as is a
//! line that doesn't parse or isn't valid UTF-8. None of these abort the load.
//!
//! Only the first two words of a line are read. Anything after the student id is ignored.

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::is_valid_attendance;
use crate::tree::AttendanceTree;
use crate::Attendance;
use crate::StudentId;

/// Outcome of a bulk load.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Pairs handed to the tree
    pub accepted: usize,
    /// Lines skipped as invalid or out of range
    pub skipped: usize,
}

/// Parse one `<attendance> <student_id>` line. Trailing words are ignored.
pub fn parse_line(line: &str) -> Option<(Attendance, StudentId)> {
    let mut words = line.split_whitespace();
    let attendance = words.next()?.parse().ok()?;
    let id = words.next()?.parse().ok()?;
    Some((attendance, id))
}

/// Insert every valid pair read from `reader` into `tree`. Blank lines are ignored.
pub async fn load<R>(tree: &mut AttendanceTree, mut reader: R) -> Result<LoadReport>
where
    R: AsyncBufRead + Unpin,
{
    let mut report = LoadReport::default();
    let mut buf = vec![];
    let mut line_no = 0;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        line_no += 1;
        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(line = line_no, "line is not valid UTF-8, skipping: {e}");
                report.skipped += 1;
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(line) {
            Some((attendance, id)) if is_valid_attendance(attendance) => {
                tree.insert(attendance, id);
                report.accepted += 1;
            }
            Some((attendance, id)) => {
                tracing::warn!(line = line_no, attendance, id, "attendance out of range, skipping");
                report.skipped += 1;
            }
            None => {
                tracing::warn!(line = line_no, "invalid input line, skipping: {}", line.trim_end());
                report.skipped += 1;
            }
        }
    }
    tracing::info!(
        accepted = report.accepted,
        skipped = report.skipped,
        "bulk load finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::tree::Direction;

    #[test]
    fn it_parses_pairs() {
        assert_eq!(parse_line("75 101"), Some((75, 101)));
        assert_eq!(parse_line("  80\t102 "), Some((80, 102)));
        assert_eq!(parse_line("75"), None);
        assert_eq!(parse_line("75 abc"), None);
        assert_eq!(parse_line("75.0 101"), None);
        assert_eq!(parse_line("75 101 extra"), Some((75, 101)));
        assert_eq!(parse_line("75 101 9"), Some((75, 101)));
    }

    #[test_log::test(tokio::test)]
    async fn it_loads_pairs() {
        let input = b"75 101\n80 102\n\n75 103\n";
        let mut tree = AttendanceTree::new();
        let report = load(&mut tree, &input[..]).await.expect("loads");
        assert_eq!(
            report,
            LoadReport {
                accepted: 3,
                skipped: 0
            }
        );
        assert_eq!(tree.collect(70, Direction::Above), vec![102, 101, 103]);
    }

    #[test_log::test(tokio::test)]
    async fn it_skips_bad_lines() {
        let input = b"101 1\n-1 2\nnonsense\n100 3\n0 4\n";
        let mut tree = AttendanceTree::new();
        let report = load(&mut tree, &input[..]).await.expect("loads");
        assert_eq!(
            report,
            LoadReport {
                accepted: 2,
                skipped: 3
            }
        );
        assert_eq!(tree.keys(), vec![0, 100]);
    }

    #[test_log::test(tokio::test)]
    async fn it_skips_lines_with_invalid_utf8() {
        let input = b"75 101\n\xff\xfe 9\n80 102\n";
        let mut tree = AttendanceTree::new();
        let report = load(&mut tree, &input[..]).await.expect("loads");
        assert_eq!(
            report,
            LoadReport {
                accepted: 2,
                skipped: 1
            }
        );
        assert_eq!(tree.keys(), vec![75, 80]);
    }

    #[test_log::test(tokio::test)]
    async fn it_loads_last_line_without_newline() {
        let input = b"75 101\r\n80 102";
        let mut tree = AttendanceTree::new();
        let report = load(&mut tree, &input[..]).await.expect("loads");
        assert_eq!(report.accepted, 2);
        assert_eq!(tree.collect(0, Direction::Above), vec![102, 101]);
    }
}
