//! Parsing of `mntr` and `wchs` replies into key/value lines.
//!
//! `mntr` answers with one `key<TAB>value` pair per line. `wchs` answers with
//! a short human-readable summary:
//!
//! ```text
//! 3 connections watching 4 paths
//! Total watches:5
//! ```
//!
//! The summary is flattened into three synthetic `mntr`-style lines so both
//! replies go through the same catalog lookup downstream.

use tracing::warn;

use crate::error::ResponseError;

/// Key synthesized from the `wchs` connection count.
pub const WCHS_WATCH_CONNECTIONS: &str = "zk_wchs_watch_connections";
/// Key synthesized from the `wchs` total watch count.
pub const WCHS_TOTAL_WATCH: &str = "zk_wchs_total_watch";
/// Key synthesized from the `wchs` watched path count.
pub const WCHS_WATCH_PATHS: &str = "zk_wchs_watch_paths";

/// Number of fields in a flattened `wchs` reply.
const WCHS_FIELD_COUNT: usize = 7;
const WCHS_CONNECTIONS_FIELD: usize = 0;
const WCHS_PATHS_FIELD: usize = 3;
const WCHS_TOTAL_FIELD: usize = 6;

/// One `key<TAB>value` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub key: String,
    pub value: String,
}

impl ParsedLine {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// The merged result of parsing one scrape's replies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedResponse {
    /// Well-formed lines in reply order, synthesized `wchs` lines last.
    pub lines: Vec<ParsedLine>,
    /// Number of `mntr` lines that were not `key<TAB>value`.
    pub malformed: usize,
    /// Set when any line was malformed or the `wchs` reply was unusable.
    pub degraded: bool,
}

impl ParsedResponse {
    /// Fold a `wchs` reply into this response.
    ///
    /// `None` means the `wchs` fetch itself failed: nothing is synthesized and
    /// the response is marked degraded.
    pub fn merge_wchs(&mut self, wchs: Option<&str>) {
        let Some(text) = wchs else {
            self.degraded = true;
            return;
        };

        match parse_wchs(text) {
            Ok(lines) => self.lines.extend(lines),
            Err(e) => {
                warn!(data = %text, error = %e, "Unexpected format of wchs reply");
                self.degraded = true;
            }
        }
    }

    /// Value of the first line with `key`, if any.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines
            .iter()
            .find(|line| line.key == key)
            .map(|line| line.value.as_str())
    }
}

/// Parse both replies of a scrape.
///
/// `wchs` is `None` when that fetch failed.
pub fn parse(mntr: &str, wchs: Option<&str>) -> ParsedResponse {
    let mut response = parse_mntr(mntr);
    response.merge_wchs(wchs);
    response
}

/// Parse an `mntr` reply.
///
/// Empty lines are ignored. A line that does not split into exactly two
/// fields on `\t` is logged, counted and skipped. A reply with no lines at
/// all is degraded.
pub fn parse_mntr(text: &str) -> ParsedResponse {
    let mut response = ParsedResponse::default();

    if text.trim().is_empty() {
        warn!("Empty mntr reply");
        response.degraded = true;
        return response;
    }

    for line in text.split('\n') {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        let mut parts = line.split('\t');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(key), Some(value), None) => response.lines.push(ParsedLine::new(key, value)),
            _ => {
                warn!(
                    data = %line,
                    "Unexpected format of returned data, expected tab-separated key/value"
                );
                response.malformed += 1;
                response.degraded = true;
            }
        }
    }

    response
}

/// Turn a `wchs` reply into the three synthetic watch lines.
///
/// Newlines are removed, `:` becomes a space, and the text is split on single
/// spaces. The field count is checked before any positional access.
pub fn parse_wchs(text: &str) -> Result<[ParsedLine; 3], ResponseError> {
    let flattened = text.replace(['\r', '\n'], "").replace(':', " ");
    let fields: Vec<&str> = flattened.split(' ').collect();

    if fields.len() != WCHS_FIELD_COUNT {
        return Err(ResponseError::UnexpectedWchsLayout {
            expected: WCHS_FIELD_COUNT,
            actual: fields.len(),
        });
    }

    Ok([
        ParsedLine::new(WCHS_WATCH_CONNECTIONS, fields[WCHS_CONNECTIONS_FIELD]),
        ParsedLine::new(WCHS_TOTAL_WATCH, fields[WCHS_TOTAL_FIELD]),
        ParsedLine::new(WCHS_WATCH_PATHS, fields[WCHS_PATHS_FIELD]),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    const WCHS: &str = "3 connections watching 4 paths\nTotal watches:5\n";

    #[test]
    fn test_parse_mntr_well_formed() {
        let response = parse_mntr("zk_avg_latency\t1.2\nzk_max_latency\t5\n");

        assert_eq!(
            response.lines,
            vec![
                ParsedLine::new("zk_avg_latency", "1.2"),
                ParsedLine::new("zk_max_latency", "5"),
            ]
        );
        assert!(!response.degraded);
        assert_eq!(response.malformed, 0);
    }

    #[test]
    fn test_parse_mntr_skips_line_without_tab() {
        let response = parse_mntr("garbage_no_tab\nzk_znode_count\t4\n");

        assert_eq!(response.lines, vec![ParsedLine::new("zk_znode_count", "4")]);
        assert!(response.degraded);
        assert_eq!(response.malformed, 1);
    }

    #[test]
    fn test_parse_mntr_skips_line_with_two_tabs() {
        let response = parse_mntr("a\tb\tc\n");

        assert!(response.lines.is_empty());
        assert!(response.degraded);
    }

    #[test]
    fn test_parse_mntr_keeps_spaces_in_value() {
        let response =
            parse_mntr("zk_version\t3.4.6-1569965, built on 02/20/2014 09:09 GMT\n");

        assert_eq!(
            response.get("zk_version"),
            Some("3.4.6-1569965, built on 02/20/2014 09:09 GMT")
        );
        assert!(!response.degraded);
    }

    #[test]
    fn test_parse_mntr_ignores_blank_lines_and_crlf() {
        let response = parse_mntr("\nzk_followers\t2\r\n\n");

        assert_eq!(response.get("zk_followers"), Some("2"));
        assert!(!response.degraded);
    }

    #[test]
    fn test_parse_mntr_empty_reply_is_degraded() {
        for reply in ["", "\n", "  \r\n\n"] {
            let response = parse_mntr(reply);

            assert!(response.lines.is_empty());
            assert_eq!(response.malformed, 0);
            assert!(response.degraded, "{:?} should be degraded", reply);
        }
    }

    #[test]
    fn test_parse_mntr_not_serving() {
        let response = parse_mntr("This ZooKeeper instance is not currently serving requests\n");

        assert!(response.lines.is_empty());
        assert!(response.degraded);
    }

    #[test]
    fn test_parse_wchs() {
        let lines = parse_wchs(WCHS).unwrap();

        assert_eq!(lines[0], ParsedLine::new(WCHS_WATCH_CONNECTIONS, "3"));
        assert_eq!(lines[1], ParsedLine::new(WCHS_TOTAL_WATCH, "5"));
        assert_eq!(lines[2], ParsedLine::new(WCHS_WATCH_PATHS, "4"));
    }

    #[test]
    fn test_parse_wchs_short_reply_is_a_format_fault() {
        let err = parse_wchs("3 connections\n").unwrap_err();

        assert_eq!(
            err,
            ResponseError::UnexpectedWchsLayout {
                expected: 7,
                actual: 2
            }
        );
    }

    #[test]
    fn test_parse_wchs_empty_reply() {
        assert!(parse_wchs("").is_err());
    }

    #[test]
    fn test_parse_merges_wchs_lines_last() {
        let response = parse("zk_watch_count\t5\n", Some(WCHS));

        let keys: Vec<&str> = response.lines.iter().map(|l| l.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "zk_watch_count",
                WCHS_WATCH_CONNECTIONS,
                WCHS_TOTAL_WATCH,
                WCHS_WATCH_PATHS
            ]
        );
        assert!(!response.degraded);
    }

    #[test]
    fn test_parse_failed_wchs_fetch_skips_synthesis() {
        let response = parse("zk_watch_count\t5\n", None);

        assert_eq!(response.lines.len(), 1);
        assert!(response.degraded);
        assert_eq!(response.malformed, 0);
    }

    #[test]
    fn test_parse_unusable_wchs_degrades_but_keeps_mntr_lines() {
        let response = parse("zk_watch_count\t5\n", Some("nonsense"));

        assert_eq!(response.get("zk_watch_count"), Some("5"));
        assert_eq!(response.get(WCHS_TOTAL_WATCH), None);
        assert!(response.degraded);
    }
}
