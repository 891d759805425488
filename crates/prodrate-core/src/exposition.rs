//! Prometheus text exposition parser.
//!
//! Groups sample lines into metric families and extracts the value of one
//! named family. Only the subset of the format needed to read counters and
//! gauges is interpreted: `# HELP` and `# TYPE` directives, sample lines
//! with optional label sets and timestamps. Every other `#` line (including
//! the OpenMetrics `# EOF` marker) is treated as a comment.
//!
//! ```text
//! # HELP experiment_producer_event_count Count of events produced.
//! # TYPE experiment_producer_event_count counter
//! experiment_producer_event_count_total{key="a",topic="t"} 42
//! ```

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{ParseError, ParseResult};

/// How to reduce a family with several label sets to one value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMode {
    /// Take the first sample in exposition order; other label sets are ignored.
    #[default]
    First,
    /// Add up every sample in the family.
    Sum,
}

impl std::str::FromStr for AggregationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(Self::First),
            "sum" => Ok(Self::Sum),
            other => Err(format!("unknown aggregation mode '{other}' (expected first or sum)")),
        }
    }
}

/// Declared type of a metric family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
    Summary,
    #[default]
    Untyped,
}

impl MetricKind {
    fn from_type(s: &str) -> Self {
        match s {
            "counter" => Self::Counter,
            "gauge" => Self::Gauge,
            "histogram" => Self::Histogram,
            "summary" => Self::Summary,
            _ => Self::Untyped,
        }
    }

    /// Sample-name suffixes a family of this kind may carry besides its bare name.
    fn sample_suffixes(self) -> &'static [&'static str] {
        match self {
            Self::Counter => &["_total", "_created"],
            Self::Summary => &["_count", "_sum", "_created"],
            Self::Histogram => &["_bucket", "_count", "_sum", "_created"],
            Self::Gauge | Self::Untyped => &[],
        }
    }
}

/// One `name{labels} value [timestamp]` line.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub name: String,
    pub labels: Vec<(String, String)>,
    pub value: f64,
    /// Milliseconds since the Unix epoch, when the exporter supplied one.
    pub timestamp_ms: Option<i64>,
}

impl MetricSample {
    /// Look up a label value by name.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A named group of samples, in exposition order.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricFamily {
    pub name: String,
    pub kind: MetricKind,
    pub help: Option<String>,
    pub samples: Vec<MetricSample>,
}

impl MetricFamily {
    fn new(name: String) -> Self {
        Self {
            name,
            kind: MetricKind::Untyped,
            help: None,
            samples: Vec::new(),
        }
    }

    /// Whether a sample with this name is part of the family.
    fn owns(&self, sample_name: &str) -> bool {
        sample_name == self.name
            || sample_name
                .strip_prefix(self.name.as_str())
                .is_some_and(|suffix| self.kind.sample_suffixes().contains(&suffix))
    }

    /// Whether `metric_name` refers to this family.
    ///
    /// Counters answer to both their family name and the `_total` sample
    /// name, since exporters register one and expose the other.
    pub fn matches(&self, metric_name: &str) -> bool {
        self.name == metric_name
            || (self.kind == MetricKind::Counter
                && metric_name.strip_suffix("_total") == Some(self.name.as_str()))
    }

    /// Samples carrying the family's value, skipping `_created` timestamps.
    pub fn value_samples(&self) -> impl Iterator<Item = &MetricSample> {
        self.samples
            .iter()
            .filter(|s| s.name.strip_prefix(self.name.as_str()) != Some("_created"))
    }
}

/// Parse a full payload into metric families.
pub fn parse(payload: &str) -> ParseResult<Vec<MetricFamily>> {
    let mut families: Vec<MetricFamily> = Vec::new();

    for (idx, raw) in payload.lines().enumerate() {
        let line = idx + 1;
        let text = raw.trim();
        if text.is_empty() {
            continue;
        }

        if let Some(comment) = text.strip_prefix('#') {
            match parse_directive(comment, line)? {
                Some(Directive::Help { name, text }) => {
                    let family = open_family(&mut families, name, |f| f.help.is_none());
                    family.help = Some(unescape_help(text));
                }
                Some(Directive::Type { name, kind }) => {
                    let family = open_family(&mut families, name, |f| {
                        f.samples.is_empty() && f.kind == MetricKind::Untyped
                    });
                    family.kind = kind;
                }
                None => {}
            }
            continue;
        }

        let sample = parse_sample(text, line)?;
        match families.last_mut() {
            Some(family) if family.owns(&sample.name) => family.samples.push(sample),
            _ => {
                let mut family = MetricFamily::new(sample.name.clone());
                family.samples.push(sample);
                families.push(family);
            }
        }
    }

    Ok(families)
}

/// Extract the value of `metric_name` from a payload.
///
/// Returns `Ok(None)` when no family matches, or the matching family has
/// no samples yet. Only the first matching family is consulted.
pub fn extract(
    payload: &str,
    metric_name: &str,
    mode: AggregationMode,
) -> ParseResult<Option<f64>> {
    let families = parse(payload)?;

    let Some(family) = families.iter().find(|f| f.matches(metric_name)) else {
        trace!(%metric_name, families = families.len(), "metric not in payload");
        return Ok(None);
    };

    let mut values = family.value_samples().map(|s| s.value);
    let value = match mode {
        AggregationMode::First => values.next(),
        AggregationMode::Sum => values.next().map(|first| first + values.sum::<f64>()),
    };
    Ok(value)
}

enum Directive<'a> {
    Help { name: &'a str, text: &'a str },
    Type { name: &'a str, kind: MetricKind },
}

/// Reuse the trailing family when it has the same name and `reusable`
/// allows it, otherwise open a new one.
fn open_family<'a>(
    families: &'a mut Vec<MetricFamily>,
    name: &str,
    reusable: impl Fn(&MetricFamily) -> bool,
) -> &'a mut MetricFamily {
    let reuse = families
        .last()
        .is_some_and(|f| f.name == name && reusable(f));
    if !reuse {
        families.push(MetricFamily::new(name.to_string()));
    }
    let last = families.len() - 1;
    &mut families[last]
}

fn parse_directive(comment: &str, line: usize) -> ParseResult<Option<Directive<'_>>> {
    let (keyword, rest) = split_word(comment);
    match keyword {
        "HELP" => {
            let (name, text) = split_word(rest);
            check_directive_name(name, line, "HELP")?;
            Ok(Some(Directive::Help { name, text }))
        }
        "TYPE" => {
            let (name, kind) = split_word(rest);
            check_directive_name(name, line, "TYPE")?;
            let kind = kind.trim();
            if kind.is_empty() {
                return Err(ParseError::Directive {
                    line,
                    directive: "TYPE",
                });
            }
            Ok(Some(Directive::Type {
                name,
                kind: MetricKind::from_type(kind),
            }))
        }
        _ => Ok(None),
    }
}

fn check_directive_name(name: &str, line: usize, directive: &'static str) -> ParseResult<()> {
    if name.is_empty() {
        return Err(ParseError::Directive { line, directive });
    }
    if name_len(name, true) != name.len() {
        return Err(ParseError::InvalidName {
            line,
            name: name.to_string(),
        });
    }
    Ok(())
}

fn parse_sample(text: &str, line: usize) -> ParseResult<MetricSample> {
    let (name, rest) = text.split_at(name_len(text, true));
    let delimited = rest.is_empty() || rest.starts_with('{') || rest.starts_with(char::is_whitespace);
    if name.is_empty() || !delimited {
        let token = text
            .split(|c: char| c == '{' || c.is_whitespace())
            .next()
            .unwrap_or(text);
        return Err(ParseError::InvalidName {
            line,
            name: token.to_string(),
        });
    }

    let (labels, rest) = match rest.trim_start().strip_prefix('{') {
        Some(inner) => parse_labels(inner, line)?,
        None => (Vec::new(), rest),
    };

    let mut fields = rest.split_whitespace();
    let raw_value = fields.next().ok_or(ParseError::MissingValue { line })?;
    let value = parse_value(raw_value).ok_or_else(|| ParseError::InvalidValue {
        line,
        value: raw_value.to_string(),
    })?;

    let timestamp_ms = fields
        .next()
        .map(|raw| {
            raw.parse::<i64>().map_err(|_| ParseError::InvalidTimestamp {
                line,
                value: raw.to_string(),
            })
        })
        .transpose()?;

    if let Some(extra) = fields.next() {
        return Err(ParseError::Trailing {
            line,
            text: extra.to_string(),
        });
    }

    Ok(MetricSample {
        name: name.to_string(),
        labels,
        value,
        timestamp_ms,
    })
}

/// Parse the inside of a `{...}` block. `input` starts just past the `{`;
/// the returned remainder starts just past the closing `}`.
fn parse_labels(input: &str, line: usize) -> ParseResult<(Vec<(String, String)>, &str)> {
    let labels_err = |reason: String| ParseError::Labels { line, reason };
    let mut labels = Vec::new();
    let mut rest = input;

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return Err(labels_err("unterminated label set".to_string()));
        }
        if let Some(after) = rest.strip_prefix('}') {
            return Ok((labels, after));
        }

        let len = name_len(rest, false);
        if len == 0 {
            return Err(labels_err(format!("expected label name near '{}'", preview(rest))));
        }
        let (name, after_name) = rest.split_at(len);

        let after_eq = after_name
            .trim_start()
            .strip_prefix('=')
            .ok_or_else(|| labels_err(format!("expected '=' after label '{name}'")))?;
        let quoted = after_eq
            .trim_start()
            .strip_prefix('"')
            .ok_or_else(|| labels_err(format!("value of label '{name}' is not quoted")))?;
        let (value, after_value) = parse_quoted(quoted)
            .ok_or_else(|| labels_err(format!("unterminated value for label '{name}'")))?;
        labels.push((name.to_string(), value));

        rest = after_value.trim_start();
        if let Some(after_comma) = rest.strip_prefix(',') {
            rest = after_comma;
        } else if !rest.starts_with('}') {
            return Err(labels_err(format!("expected ',' or '}}' after label '{name}'")));
        }
    }
}

/// Read a label value up to its closing quote, resolving escapes.
fn parse_quoted(s: &str) -> Option<(String, &str)> {
    let mut out = String::new();
    let mut chars = s.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Some((out, &s[i + 1..])),
            '\\' => match chars.next()? {
                (_, 'n') => out.push('\n'),
                (_, escaped) => out.push(escaped),
            },
            c => out.push(c),
        }
    }
    None
}

fn parse_value(raw: &str) -> Option<f64> {
    match raw {
        "+Inf" | "Inf" => Some(f64::INFINITY),
        "-Inf" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        _ => raw.parse().ok(),
    }
}

fn unescape_help(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Byte length of the metric (or label) name at the start of `s`.
fn name_len(s: &str, allow_colon: bool) -> usize {
    let mut len = 0;
    for (i, c) in s.char_indices() {
        let ok = c.is_ascii_alphabetic()
            || c == '_'
            || (allow_colon && c == ':')
            || (i > 0 && c.is_ascii_digit());
        if !ok {
            break;
        }
        len = i + c.len_utf8();
    }
    len
}

fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim_start()),
        None => (s, ""),
    }
}

fn preview(s: &str) -> &str {
    match s.char_indices().nth(12) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRODUCER_PAYLOAD: &str = "\
# HELP experiment_producer_event_count Count of events produced.
# TYPE experiment_producer_event_count counter
experiment_producer_event_count_total{key=\"a\",topic=\"experiment\"} 40
experiment_producer_event_count_total{topic=\"experiment\"} 2
# HELP experiment_producer_num_experiments Number of experiments running.
# TYPE experiment_producer_num_experiments gauge
experiment_producer_num_experiments 3
# EOF
";

    const TWO_SAMPLE_FOO: &str = "\
# TYPE foo gauge
foo{shard=\"a\"} 1.0
foo{shard=\"b\"} 2.0
";

    #[test]
    fn first_mode_takes_first_sample() {
        assert_eq!(extract(TWO_SAMPLE_FOO, "foo", AggregationMode::First), Ok(Some(1.0)));
    }

    #[test]
    fn sum_mode_adds_all_samples() {
        assert_eq!(extract(TWO_SAMPLE_FOO, "foo", AggregationMode::Sum), Ok(Some(3.0)));
    }

    #[test]
    fn absent_metric_is_not_found() {
        assert_eq!(extract(TWO_SAMPLE_FOO, "bar", AggregationMode::First), Ok(None));
        assert_eq!(extract("", "foo", AggregationMode::Sum), Ok(None));
    }

    #[test]
    fn bare_sample_line() {
        let payload = "experiment_producer_event_count_total 10\n";
        let value = extract(payload, "experiment_producer_event_count_total", AggregationMode::First);
        assert_eq!(value, Ok(Some(10.0)));
    }

    #[test]
    fn counter_matches_total_and_family_name() {
        let by_sample = extract(
            PRODUCER_PAYLOAD,
            "experiment_producer_event_count_total",
            AggregationMode::First,
        );
        let by_family = extract(
            PRODUCER_PAYLOAD,
            "experiment_producer_event_count",
            AggregationMode::Sum,
        );
        assert_eq!(by_sample, Ok(Some(40.0)));
        assert_eq!(by_family, Ok(Some(42.0)));
    }

    #[test]
    fn total_suffix_only_resolves_for_counters() {
        let payload = "# TYPE jobs gauge\njobs 5\n";
        assert_eq!(extract(payload, "jobs_total", AggregationMode::First), Ok(None));
    }

    #[test]
    fn families_are_grouped_with_metadata() {
        let families = parse(PRODUCER_PAYLOAD).unwrap();
        assert_eq!(families.len(), 2);

        let events = &families[0];
        assert_eq!(events.name, "experiment_producer_event_count");
        assert_eq!(events.kind, MetricKind::Counter);
        assert_eq!(events.help.as_deref(), Some("Count of events produced."));
        assert_eq!(events.samples.len(), 2);
        assert_eq!(events.samples[0].label("key"), Some("a"));
        assert_eq!(events.samples[1].label("key"), None);

        assert_eq!(families[1].kind, MetricKind::Gauge);
        assert_eq!(families[1].samples[0].value, 3.0);
    }

    #[test]
    fn sum_only_covers_first_matching_family() {
        let payload = "foo 1\nbar 10\nfoo 100\n";
        // `foo` appears twice as separate implicit families.
        assert_eq!(extract(payload, "foo", AggregationMode::Sum), Ok(Some(1.0)));
    }

    #[test]
    fn created_samples_are_not_values() {
        let payload = "\
# TYPE requests counter
requests_total 7
requests_created 1700000000
";
        assert_eq!(extract(payload, "requests", AggregationMode::Sum), Ok(Some(7.0)));
    }

    #[test]
    fn histogram_suffixes_stay_in_family() {
        let payload = "\
# TYPE latency histogram
latency_bucket{le=\"0.1\"} 2
latency_bucket{le=\"+Inf\"} 5
latency_sum 0.4
latency_count 5
";
        let families = parse(payload).unwrap();
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].samples.len(), 4);
    }

    #[test]
    fn untyped_family_keeps_only_its_bare_name() {
        let payload = "requests 5\nrequests_count 3\n";
        let families = parse(payload).unwrap();
        assert_eq!(families.len(), 2);
        assert_eq!(
            extract(payload, "requests_count", AggregationMode::First),
            Ok(Some(3.0))
        );
        assert_eq!(extract(payload, "requests", AggregationMode::Sum), Ok(Some(5.0)));
    }

    #[test]
    fn gauge_does_not_absorb_total_suffix() {
        let payload = "# TYPE jobs gauge\njobs 1\njobs_total 4\n";
        assert_eq!(extract(payload, "jobs_total", AggregationMode::First), Ok(Some(4.0)));
        assert_eq!(extract(payload, "jobs", AggregationMode::Sum), Ok(Some(1.0)));
    }

    #[test]
    fn counter_does_not_absorb_histogram_suffixes() {
        let payload = "# TYPE hits counter\nhits_total 2\nhits_bucket 9\n";
        let families = parse(payload).unwrap();
        assert_eq!(families.len(), 2);
        assert_eq!(extract(payload, "hits", AggregationMode::Sum), Ok(Some(2.0)));
    }

    #[test]
    fn summary_suffixes_stay_in_family() {
        let payload = "\
# TYPE rpc summary
rpc{quantile=\"0.5\"} 0.2
rpc_sum 1.5
rpc_count 7
rpc_created 1700000000
rpc_bucket 1
";
        let families = parse(payload).unwrap();
        assert_eq!(families.len(), 2);
        assert_eq!(families[0].samples.len(), 4);
        assert_eq!(families[1].name, "rpc_bucket");
    }

    #[test]
    fn declared_family_without_samples_is_not_found() {
        let payload = "# HELP foo Nothing yet.\n# TYPE foo counter\n";
        assert_eq!(extract(payload, "foo_total", AggregationMode::First), Ok(None));
    }

    #[test]
    fn label_values_may_contain_delimiters() {
        let payload = r#"foo{path="/a b}",msg="say \"hi\"\n",} 4 1712345678000"#;
        let families = parse(payload).unwrap();
        let sample = &families[0].samples[0];

        assert_eq!(sample.label("path"), Some("/a b}"));
        assert_eq!(sample.label("msg"), Some("say \"hi\"\n"));
        assert_eq!(sample.value, 4.0);
        assert_eq!(sample.timestamp_ms, Some(1_712_345_678_000));
    }

    #[test]
    fn special_float_values() {
        let payload = "a +Inf\nb -Inf\nc NaN\nd 1.5e3\n";
        let families = parse(payload).unwrap();
        assert_eq!(families[0].samples[0].value, f64::INFINITY);
        assert_eq!(families[1].samples[0].value, f64::NEG_INFINITY);
        assert!(families[2].samples[0].value.is_nan());
        assert_eq!(families[3].samples[0].value, 1500.0);
    }

    #[test]
    fn empty_label_set_and_crlf_lines() {
        let payload = "foo{} 1\r\nfoo{} 2\r\n";
        assert_eq!(extract(payload, "foo", AggregationMode::Sum), Ok(Some(3.0)));
    }

    #[test]
    fn missing_value_is_parse_error() {
        let err = parse("# TYPE foo counter\nfoo\n").unwrap_err();
        assert_eq!(err, ParseError::MissingValue { line: 2 });
    }

    #[test]
    fn non_numeric_value_is_parse_error() {
        let err = parse("foo abc").unwrap_err();
        assert!(matches!(err, ParseError::InvalidValue { line: 1, .. }), "{err}");
    }

    #[test]
    fn unterminated_labels_are_parse_error() {
        let err = extract("foo{a=\"x\" 1", "foo", AggregationMode::First).unwrap_err();
        assert!(matches!(err, ParseError::Labels { .. }), "{err}");

        let err = parse("foo{a=\"x 1").unwrap_err();
        assert!(matches!(err, ParseError::Labels { .. }), "{err}");
    }

    #[test]
    fn unquoted_label_value_is_parse_error() {
        let err = parse("foo{a=x} 1").unwrap_err();
        assert!(err.to_string().contains("not quoted"), "{err}");
    }

    #[test]
    fn invalid_name_is_parse_error() {
        let err = parse("ok 1\nfoo-bar 1\n").unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidName {
                line: 2,
                name: "foo-bar".to_string()
            }
        );
        assert_eq!(err.line(), 2);
    }

    #[test]
    fn trailing_text_is_parse_error() {
        let err = parse("foo 1 1000 extra").unwrap_err();
        assert!(matches!(err, ParseError::Trailing { .. }), "{err}");
    }

    #[test]
    fn bad_timestamp_is_parse_error() {
        let err = parse("foo 1 soon").unwrap_err();
        assert!(matches!(err, ParseError::InvalidTimestamp { .. }), "{err}");
    }

    #[test]
    fn type_without_kind_is_parse_error() {
        let err = parse("# TYPE foo\nfoo 1\n").unwrap_err();
        assert_eq!(
            err,
            ParseError::Directive {
                line: 1,
                directive: "TYPE"
            }
        );
    }

    #[test]
    fn malformed_payload_fails_even_when_metric_is_earlier() {
        let payload = "target 1\ngarbage{\n";
        assert!(extract(payload, "target", AggregationMode::First).is_err());
    }

    #[test]
    fn plain_comments_are_ignored() {
        let payload = "# scraped by test\n#\nfoo 9\n# EOF\n";
        assert_eq!(extract(payload, "foo", AggregationMode::First), Ok(Some(9.0)));
    }

    #[test]
    fn help_text_is_unescaped() {
        let families = parse("# HELP foo line one\\nline two \\\\ done\nfoo 1\n").unwrap();
        assert_eq!(families[0].help.as_deref(), Some("line one\nline two \\ done"));
    }

    #[test]
    fn mode_from_str() {
        assert_eq!("first".parse::<AggregationMode>(), Ok(AggregationMode::First));
        assert_eq!("SUM".parse::<AggregationMode>(), Ok(AggregationMode::Sum));
        assert!("avg".parse::<AggregationMode>().is_err());
    }
}
