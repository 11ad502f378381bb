//! Tabular parser: raw delimited text to rows of fields.
//!
//! Single pass, one `in_quotes` flag. Tolerant of sloppy exports:
//!   - `""` inside a quoted field is a literal quote
//!   - a quote inside a non-empty unquoted field is kept as-is
//!   - rows may have differing field counts
//!
//! No type coercion happens here.

/// Candidate delimiters, in tie-break order (comma wins ties).
pub const CANDIDATE_DELIMITERS: [u8; 3] = [b',', b';', b'\t'];

const BOM: char = '\u{feff}';

/// One parsed row together with the source line it started on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRow {
    /// 1-based physical line in the normalized input.
    pub line: usize,
    pub fields: Vec<String>,
}

impl SourceRow {
    pub fn is_blank(&self) -> bool {
        self.fields.iter().all(|f| f.trim().is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct ParsedTable {
    pub delimiter: u8,
    /// Header first, then data rows, in source order.
    pub rows: Vec<SourceRow>,
}

impl ParsedTable {
    pub fn header(&self) -> Option<&SourceRow> {
        self.rows.first()
    }

    pub fn data_rows(&self) -> &[SourceRow] {
        self.rows.get(1..).unwrap_or(&[])
    }
}

/// Collapse `\r\n` and bare `\r` into `\n`.
pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Count un-quoted comma, semicolon and tab occurrences on `first_line`
/// and return the most frequent. Ties and all-zero default to comma.
pub fn detect_delimiter(first_line: &str) -> u8 {
    let mut counts = [0usize; CANDIDATE_DELIMITERS.len()];
    let mut in_quotes = false;
    let mut chars = first_line.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '"' {
            if in_quotes && chars.peek() == Some(&'"') {
                chars.next();
            } else {
                in_quotes = !in_quotes;
            }
            continue;
        }
        if in_quotes {
            continue;
        }
        if let Some(idx) = CANDIDATE_DELIMITERS.iter().position(|&d| char::from(d) == c) {
            counts[idx] += 1;
        }
    }

    let best = counts.iter().copied().max().unwrap_or(0);
    let winners = counts.iter().filter(|&&c| c == best).count();
    if best == 0 || winners > 1 {
        return b',';
    }
    counts
        .iter()
        .position(|&c| c == best)
        .map_or(b',', |idx| CANDIDATE_DELIMITERS[idx])
}

/// Parse raw text into rows of string fields.
pub fn parse_table(text: &str) -> ParsedTable {
    let normalized = normalize_line_endings(text);
    let body = normalized.strip_prefix(BOM).unwrap_or(&normalized);
    let delimiter = detect_delimiter(body.split('\n').next().unwrap_or(""));
    let delim = char::from(delimiter);

    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1usize;
    let mut row_line = 1usize;
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                '\n' => {
                    field.push(c);
                    line += 1;
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => in_quotes = true,
            '\n' => {
                row.push(std::mem::take(&mut field));
                rows.push(SourceRow {
                    line: row_line,
                    fields: std::mem::take(&mut row),
                });
                line += 1;
                row_line = line;
            }
            _ if c == delim => row.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }

    row.push(field);
    rows.push(SourceRow {
        line: row_line,
        fields: row,
    });

    // A trailing all-empty single-field row is the final newline, not data.
    if rows
        .last()
        .is_some_and(|r| r.fields.len() == 1 && r.fields[0].is_empty())
    {
        rows.pop();
    }

    log::debug!(
        "tabular: {} rows, delimiter {:?}",
        rows.len(),
        delim
    );

    ParsedTable { delimiter, rows }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(table: &ParsedTable, row: usize) -> Vec<&str> {
        table.rows[row].fields.iter().map(String::as_str).collect()
    }

    #[test]
    fn detects_most_frequent_delimiter() {
        assert_eq!(detect_delimiter("a;b;c"), b';');
        assert_eq!(detect_delimiter("a\tb\tc,d"), b'\t');
        assert_eq!(detect_delimiter("a,b,c"), b',');
    }

    #[test]
    fn ties_and_empty_lines_default_to_comma() {
        assert_eq!(detect_delimiter("a;b\tc"), b',');
        assert_eq!(detect_delimiter("single"), b',');
        assert_eq!(detect_delimiter(""), b',');
    }

    #[test]
    fn quoted_delimiters_are_not_counted() {
        assert_eq!(detect_delimiter("\"x;y;z\",w"), b',');
        assert_eq!(detect_delimiter("\"a\"\"b,c\";d"), b';');
    }

    #[test]
    fn parses_quoted_fields_and_escaped_quotes() {
        let table = parse_table("a;b;c\n1;\"x;y\";\"he said \"\"hi\"\"\"\n");
        assert_eq!(table.delimiter, b';');
        assert_eq!(table.rows.len(), 2);
        assert_eq!(fields(&table, 1), vec!["1", "x;y", "he said \"hi\""]);
    }

    #[test]
    fn unquoted_quote_is_kept_literally() {
        let table = parse_table("a,b\n12\" tall,x\n");
        assert_eq!(fields(&table, 1), vec!["12\" tall", "x"]);
    }

    #[test]
    fn strips_leading_bom() {
        let table = parse_table("\u{feff}Concurso;Data\n1;02/01/2024");
        assert_eq!(fields(&table, 0), vec!["Concurso", "Data"]);
    }

    #[test]
    fn flushes_last_row_without_newline_and_drops_phantom_row() {
        let table = parse_table("a,b\r\n1,2\r\n3,4");
        assert_eq!(table.rows.len(), 3);
        assert_eq!(fields(&table, 2), vec!["3", "4"]);

        let table = parse_table("a,b\r\n1,2\r\n");
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn bare_carriage_returns_are_line_breaks() {
        let table = parse_table("a,b\r1,2\r3,4\r");
        assert_eq!(table.rows.len(), 3);
    }

    #[test]
    fn rows_keep_their_source_line() {
        let table = parse_table("h1,h2\n1,2\n\n3,4\n");
        let lines: Vec<usize> = table.rows.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![1, 2, 3, 4]);
        assert_eq!(table.data_rows().len(), 3);
        assert!(table.rows[2].is_blank());
    }

    #[test]
    fn quoted_newlines_stay_in_the_field() {
        let table = parse_table("a,b\n\"x\ny\",2\n3,4");
        assert_eq!(fields(&table, 1), vec!["x\ny", "2"]);
        let lines: Vec<usize> = table.rows.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![1, 2, 4]);
    }

    #[test]
    fn blank_row_detection_ignores_whitespace() {
        let row = SourceRow {
            line: 3,
            fields: vec!["".into(), "  ".into(), "".into()],
        };
        assert!(row.is_blank());
    }
}
