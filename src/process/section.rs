use tracing::trace;

use crate::error::SectionError;

/// Line span of one contract section: `start` is the heading line, `end` the
/// terminator line. Both are zero-based indexes into the report's lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section {
    pub start: usize,
    pub end: usize,
}

impl Section {
    /// Non-blank lines strictly between the heading and the terminator, with
    /// their line index.
    pub fn rows<'a, S: AsRef<str>>(
        &self,
        lines: &'a [S],
    ) -> impl Iterator<Item = (usize, &'a str)> + 'a {
        let (start, end) = (self.start, self.end);
        lines[start + 1..end]
            .iter()
            .enumerate()
            .map(move |(i, l)| (start + 1 + i, l.as_ref()))
            .filter(|(_, l)| !l.trim().is_empty())
    }
}

/// Find the first line containing `start_marker`, then the first line after
/// it containing `end_marker`.
pub fn locate<S: AsRef<str>>(
    lines: &[S],
    start_marker: &str,
    end_marker: &str,
) -> Result<Section, SectionError> {
    let start = lines
        .iter()
        .position(|l| l.as_ref().contains(start_marker))
        .ok_or_else(|| SectionError::StartNotFound {
            marker: start_marker.to_string(),
        })?;

    let end = lines[start + 1..]
        .iter()
        .position(|l| l.as_ref().contains(end_marker))
        .map(|offset| start + 1 + offset)
        .ok_or_else(|| SectionError::EndNotFound {
            marker: end_marker.to_string(),
            start,
        })?;

    trace!(start, end, start_marker, "located section");
    Ok(Section { start, end })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::SECTION_END;

    const HEADING: &str = "NG Henry Hub Natural Gas Futures";

    fn report() -> Vec<&'static str> {
        vec![
            "CME GROUP SETTLEMENT REPORT",
            "BUSINESS DATE 11/20/2024",
            "",
            "MTH/  ---DAILY---  SETT  PT  EST  PRIOR DAY",
            "STRIKE OPEN HIGH LOW LAST  CHGE  VOL SETT VOL INT",
            HEADING,
            "JAN25 3.350 3.400 3.300 3.368 3.363 +.050 120500 3.313 118000 310000",
            "",
            "FEB25 3.200 3.250 3.150 3.210 3.205 +.040 60000 3.165 59000",
            "TOTAL 180500 177000 310000",
            "EC Euro/U.S. Dollar (EUR/USD) Futures",
            "DEC24 1.0580 1.0590 1.0560 1.05835 1.05735 -.0010 90000 1.05835 88000 500000",
            "TOTAL 90000 88000 500000",
        ]
    }

    #[test]
    fn locates_heading_and_total() {
        let lines = report();
        let section = locate(&lines, HEADING, SECTION_END).unwrap();
        assert_eq!(section, Section { start: 5, end: 9 });
    }

    #[test]
    fn rows_skip_heading_and_blank_lines() {
        let lines = report();
        let section = locate(&lines, HEADING, SECTION_END).unwrap();
        let rows: Vec<_> = section.rows(&lines).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, 6);
        assert!(rows[0].1.starts_with("JAN25"));
        assert_eq!(rows[1].0, 8);
        assert!(rows[1].1.starts_with("FEB25"));
    }

    #[test]
    fn end_marker_is_searched_after_start() {
        let lines = report();
        let section = locate(&lines, "EC Euro", SECTION_END).unwrap();
        assert_eq!(section, Section { start: 10, end: 12 });
    }

    #[test]
    fn missing_end_marker_is_not_found() {
        let mut lines = report();
        lines.truncate(9);
        assert_eq!(
            locate(&lines, HEADING, SECTION_END),
            Err(SectionError::EndNotFound {
                marker: SECTION_END.to_string(),
                start: 5
            })
        );
    }

    #[test]
    fn missing_heading_is_not_found() {
        let lines = report();
        assert!(matches!(
            locate(&lines, "BZ Brent Crude Oil", SECTION_END),
            Err(SectionError::StartNotFound { .. })
        ));
    }

    #[test]
    fn heading_on_last_line_has_no_end() {
        let lines = vec!["header", HEADING];
        assert!(matches!(
            locate(&lines, HEADING, SECTION_END),
            Err(SectionError::EndNotFound { start: 1, .. })
        ));
    }
}
