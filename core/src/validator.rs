//! Row normalizer/validator: parsed grid to typed `DrawRecord`s.
//!
//! RULES:
//!   - Required columns are checked once, before any row. Missing ones fail
//!     the whole batch with the list of missing names.
//!   - Every other failure is per row: tagged with its source line, the row
//!     is dropped, the batch continues.
//!   - Blank rows are skipped silently.

use crate::{
    config::{GameConfig, OptionalField},
    error::{IngestError, IngestResult, RowError},
    store::DrawRecord,
    tabular::{ParsedTable, SourceRow},
    types::{ContestNo, Number},
};
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

const CONTEST_SYNONYMS: [&str; 4] = ["concurso", "numero do concurso", "contest", "contest no"];
const DATE_SYNONYMS: [&str; 4] = ["data sorteio", "data do sorteio", "data", "draw date"];
const CURRENCY_PREFIX: &str = "r$";

// ── Header handling ────────────────────────────────────────────────

/// Lowercase, strip Portuguese diacritics (precomposed or combining),
/// treat `_` as a space, collapse whitespace runs and trim.
pub fn normalize_header(raw: &str) -> String {
    let folded: String = raw
        .trim_start_matches('\u{feff}')
        .to_lowercase()
        .chars()
        .filter(|c| !('\u{300}'..='\u{36f}').contains(c))
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            'ñ' => 'n',
            '_' => ' ',
            other => other,
        })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Synonyms accepted for position `i` (1-based).
fn position_synonyms(i: usize) -> [String; 6] {
    [
        format!("bola {i}"),
        format!("bola{i}"),
        format!("dezena {i}"),
        format!("dezena{i}"),
        format!("d{i}"),
        format!("n{i}"),
    ]
}

/// Normalized header name → column index. On duplicate names the
/// leftmost column wins.
#[derive(Debug, Clone)]
pub struct HeaderIndex {
    pub received: Vec<String>,
    pub normalized: Vec<String>,
    columns: HashMap<String, usize>,
}

impl HeaderIndex {
    pub fn new(header: &SourceRow) -> Self {
        let received = header.fields.clone();
        let normalized: Vec<String> = received.iter().map(|h| normalize_header(h)).collect();
        let mut columns = HashMap::new();
        for (idx, name) in normalized.iter().enumerate() {
            columns.entry(name.clone()).or_insert(idx);
        }
        Self {
            received,
            normalized,
            columns,
        }
    }

    /// Column of the first synonym present, in synonym order.
    pub fn find<S: AsRef<str>>(&self, synonyms: &[S]) -> Option<usize> {
        synonyms
            .iter()
            .find_map(|s| self.columns.get(s.as_ref()).copied())
    }
}

/// Resolved column positions for one game.
#[derive(Debug, Clone)]
pub struct ColumnMap {
    pub contest: usize,
    pub date: usize,
    /// One column per draw position, in position order.
    pub positions: Vec<usize>,
    pub optional: Vec<(OptionalField, usize)>,
}

impl ColumnMap {
    /// Fail-fast required-column check.
    pub fn resolve(index: &HeaderIndex, game: &GameConfig) -> IngestResult<Self> {
        let mut missing = Vec::new();

        let contest = index.find(&CONTEST_SYNONYMS);
        if contest.is_none() {
            missing.push(CONTEST_SYNONYMS[0].to_string());
        }
        let date = index.find(&DATE_SYNONYMS);
        if date.is_none() {
            missing.push(DATE_SYNONYMS[0].to_string());
        }

        let mut positions = Vec::with_capacity(game.draw_size);
        for i in 1..=game.draw_size {
            let synonyms = position_synonyms(i);
            match index.find(&synonyms) {
                Some(col) => positions.push(col),
                None => missing.push(synonyms[0].clone()),
            }
        }

        let (Some(contest), Some(date), true) = (contest, date, missing.is_empty()) else {
            return Err(IngestError::MissingColumns {
                missing,
                header_received: index.received.clone(),
                header_normalized: index.normalized.clone(),
            });
        };

        let optional = game
            .optional_fields
            .iter()
            .filter_map(|&field| {
                index
                    .find(&field.synonyms(game.top_tier_hits))
                    .map(|col| (field, col))
            })
            .collect();

        Ok(Self {
            contest,
            date,
            positions,
            optional,
        })
    }
}

// ── Localized field parsers ────────────────────────────────────────

/// Integer with `.` thousands separators, e.g. `"1.234"`.
pub fn parse_int(raw: &str) -> Result<i64, String> {
    let cleaned: String = raw.trim().chars().filter(|&c| c != '.').collect();
    if cleaned.is_empty() {
        return Err("empty value".into());
    }
    cleaned
        .parse::<i64>()
        .map_err(|_| format!("'{}' is not an integer", raw.trim()))
}

/// Strict `DD/MM/YYYY`.
pub fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    let s = raw.trim();
    let bytes = s.as_bytes();
    let shape_ok = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, &b)| match i {
            2 | 5 => b == b'/',
            _ => b.is_ascii_digit(),
        });
    if !shape_ok {
        return Err(format!("date '{s}' is not DD/MM/YYYY"));
    }
    NaiveDate::parse_from_str(s, "%d/%m/%Y").map_err(|_| format!("date '{s}' does not exist"))
}

/// `R$ 1.234,56` → `1234.56`. The currency prefix is optional.
pub fn parse_currency(raw: &str) -> Result<f64, String> {
    let trimmed = raw.trim();
    let body = match trimmed.get(..CURRENCY_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(CURRENCY_PREFIX) => {
            &trimmed[CURRENCY_PREFIX.len()..]
        }
        _ => trimmed,
    };
    let cleaned: String = body
        .trim()
        .chars()
        .filter(|&c| c != '.')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if cleaned.is_empty() {
        return Err("empty value".into());
    }
    let value: f64 = cleaned
        .parse()
        .map_err(|_| format!("'{trimmed}' is not a currency amount"))?;
    if !value.is_finite() {
        return Err(format!("'{trimmed}' is not finite"));
    }
    Ok(value)
}

// ── Row mapping ────────────────────────────────────────────────────

/// Output of one validation pass.
#[derive(Debug, Clone, Default)]
pub struct ValidatedBatch {
    pub records: Vec<DrawRecord>,
    pub errors: Vec<RowError>,
    pub blank_rows: usize,
    /// Data rows seen, blank ones included.
    pub input_rows: usize,
}

fn cell(row: &SourceRow, col: usize) -> &str {
    row.fields.get(col).map(String::as_str).unwrap_or("")
}

fn map_row(row: &SourceRow, cols: &ColumnMap, game: &GameConfig) -> Result<DrawRecord, String> {
    let contest_no: ContestNo =
        parse_int(cell(row, cols.contest)).map_err(|e| format!("concurso: {e}"))?;
    if contest_no <= 0 {
        return Err(format!("concurso: {contest_no} is not positive"));
    }
    let draw_date = parse_date(cell(row, cols.date)).map_err(|e| format!("data sorteio: {e}"))?;

    let mut numbers: Vec<Number> = Vec::with_capacity(game.draw_size);
    let mut seen = HashSet::with_capacity(game.draw_size);
    for (pos, &col) in cols.positions.iter().enumerate() {
        let raw = parse_int(cell(row, col)).map_err(|e| format!("bola {}: {e}", pos + 1))?;
        let value = game.remap.apply(raw, game.domain_max);
        if value < 1 || value > i64::from(game.domain_max) {
            return Err(format!(
                "bola {}: {value} outside [1, {}]",
                pos + 1,
                game.domain_max
            ));
        }
        let n = value as Number;
        if !seen.insert(n) {
            return Err(format!("bola {}: {n} repeated", pos + 1));
        }
        numbers.push(n);
    }
    numbers.sort_unstable();

    let mut draw = DrawRecord::new(contest_no, draw_date, numbers);
    for &(field, col) in &cols.optional {
        let raw = cell(row, col);
        if raw.trim().is_empty() {
            continue;
        }
        match field {
            OptionalField::TopTierWinners => draw.top_tier_winners = parse_int(raw).ok(),
            OptionalField::TopTierPrize => draw.top_tier_prize = parse_currency(raw).ok(),
            OptionalField::AccumulatedAmount => draw.accumulated_amount = parse_currency(raw).ok(),
            OptionalField::TotalCollected => draw.total_collected = parse_currency(raw).ok(),
            OptionalField::NextPrizeEstimate => draw.next_prize_estimate = parse_currency(raw).ok(),
            OptionalField::Note => draw.note = Some(raw.trim().to_string()),
        }
    }
    Ok(draw)
}

/// Validate every data row of `table` for `game`.
///
/// Structural problems (empty input, header only, missing required
/// columns, zero valid rows) are `Err`. Row problems land in
/// `ValidatedBatch::errors`.
pub fn validate(table: &ParsedTable, game: &GameConfig) -> IngestResult<ValidatedBatch> {
    let header = match table.header() {
        Some(h) if !h.is_blank() => h,
        _ => return Err(IngestError::EmptyInput),
    };
    let data = table.data_rows();
    if data.is_empty() {
        return Err(IngestError::NoDataRows);
    }

    let index = HeaderIndex::new(header);
    let cols = ColumnMap::resolve(&index, game)?;

    let mut batch = ValidatedBatch {
        input_rows: data.len(),
        ..ValidatedBatch::default()
    };
    for row in data {
        if row.is_blank() {
            batch.blank_rows += 1;
            continue;
        }
        match map_row(row, &cols, game) {
            Ok(draw) => batch.records.push(draw),
            Err(reason) => batch.errors.push(RowError::new(row.line, reason)),
        }
    }

    if !batch.errors.is_empty() {
        log::warn!(
            "game={} validate: {} rows rejected (first at line {})",
            game.game_id,
            batch.errors.len(),
            batch.errors[0].line
        );
    }
    if batch.records.is_empty() {
        return Err(IngestError::NoValidRows {
            errors: batch.errors,
        });
    }

    log::info!(
        "game={} validate: {} valid, {} rejected, {} blank",
        game.game_id,
        batch.records.len(),
        batch.errors.len(),
        batch.blank_rows
    );
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tabular::parse_table;

    const HEADER: &str = "Concurso;Data Sorteio;Bola1;Bola2;Bola3;Bola4;Bola5;Bola6;Ganhadores 6 acertos;Acumulado 6 acertos";

    fn csv(rows: &[&str]) -> String {
        let mut text = String::from(HEADER);
        for row in rows {
            text.push('\n');
            text.push_str(row);
        }
        text
    }

    #[test]
    fn normalizes_header_names() {
        assert_eq!(normalize_header("  Data   do Sorteio "), "data do sorteio");
        assert_eq!(normalize_header("ARRECADAÇÃO_TOTAL"), "arrecadacao total");
        assert_eq!(normalize_header("Observação"), "observacao");
        assert_eq!(normalize_header("Observac\u{327}a\u{303}o"), "observacao");
        assert_eq!(normalize_header("DATA DO SORTEIO\u{301}"), "data do sorteio");
    }

    #[test]
    fn parses_localized_values() {
        assert_eq!(parse_int("1.234"), Ok(1234));
        assert!(parse_int("12,5").is_err());
        assert!(parse_int("").is_err());
        assert_eq!(
            parse_date("05/01/2024"),
            Ok(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap())
        );
        assert!(parse_date("2024-01-05").is_err());
        assert!(parse_date("5/1/2024").is_err());
        assert!(parse_date("31/02/2024").is_err());
        assert_eq!(parse_currency("R$ 1.234.567,89"), Ok(1_234_567.89));
        assert_eq!(parse_currency("0,00"), Ok(0.0));
        assert!(parse_currency("abc").is_err());
        assert!(parse_currency("inf").is_err());
    }

    #[test]
    fn maps_valid_rows_and_sorts_numbers() {
        let text = csv(&["2700;05/01/2024;41;5;30;12;24;19;0;R$ 10.000,00"]);
        let batch = validate(&parse_table(&text), &GameConfig::mega_sena()).unwrap();
        assert_eq!(batch.records.len(), 1);
        let draw = &batch.records[0];
        assert_eq!(draw.contest_no, 2700);
        assert_eq!(draw.numbers, vec![5, 12, 19, 24, 30, 41]);
        assert_eq!(draw.top_tier_winners, Some(0));
        assert_eq!(draw.accumulated_amount, Some(10_000.0));
        assert!(draw.is_rollover());
    }

    #[test]
    fn bad_rows_are_isolated_with_line_numbers() {
        let text = csv(&[
            "1;05/01/2024;1;2;3;4;5;6;;",
            "2;2024-01-05;1;2;3;4;5;6;;",
            ";;;;;;;;;",
            "3;06/01/2024;1;2;3;4;5;61;;",
            "4;07/01/2024;1;2;3;4;5;5;;",
            "5;08/01/2024;1;2;3;4;5;6;x;",
        ]);
        let batch = validate(&parse_table(&text), &GameConfig::mega_sena()).unwrap();
        let contests: Vec<i64> = batch.records.iter().map(|d| d.contest_no).collect();
        assert_eq!(contests, vec![1, 5]);
        assert_eq!(batch.blank_rows, 1);
        let lines: Vec<usize> = batch.errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 5, 6]);
        // Unparseable optional field is dropped, not fatal.
        assert_eq!(batch.records[1].top_tier_winners, None);
    }

    #[test]
    fn missing_columns_fail_fast() {
        let table = parse_table("concurso,bola 1,bola 2\n1,2,3\n");
        match validate(&table, &GameConfig::quina()) {
            Err(IngestError::MissingColumns {
                missing,
                header_received,
                ..
            }) => {
                assert_eq!(
                    missing,
                    vec!["data sorteio", "bola 3", "bola 4", "bola 5"]
                );
                assert_eq!(header_received, vec!["concurso", "bola 1", "bola 2"]);
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn structural_failures() {
        let game = GameConfig::quina();
        assert!(matches!(validate(&parse_table(""), &game), Err(IngestError::EmptyInput)));
        assert!(matches!(
            validate(&parse_table("concurso;data\n"), &game),
            Err(IngestError::NoDataRows)
        ));
        let text = "concurso;data;d1;d2;d3;d4;d5\n1;bad;1;2;3;4;5\n";
        match validate(&parse_table(text), &game) {
            Err(IngestError::NoValidRows { errors }) => assert_eq!(errors.len(), 1),
            other => panic!("expected NoValidRows, got {other:?}"),
        }
    }

    #[test]
    fn lotomania_zero_is_one_hundred() {
        let mut header = vec!["concurso".to_string(), "data".to_string()];
        header.extend((1..=20).map(|i| format!("bola{i}")));
        let mut row = vec!["10".to_string(), "01/02/2020".to_string(), "00".to_string()];
        row.extend((1..=19).map(|n| n.to_string()));
        let text = format!("{}\n{}\n", header.join(","), row.join(","));

        let batch = validate(&parse_table(&text), &GameConfig::lotomania()).unwrap();
        assert_eq!(batch.records[0].numbers.last(), Some(&100));
        assert_eq!(batch.records[0].numbers.first(), Some(&1));
    }
}
