//! Minimal XLSX reader: first worksheet → header + string rows.
//!
//! Reads the workbook as a ZIP archive and walks the sheet XML with
//! `quick-xml`. Shared strings, inline strings, formula strings, booleans
//! and plain numeric values are supported; styles and number formats are
//! ignored, so dates stored as serial numbers come through as numbers.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::TabularError;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;
/// Maximum cells read from the sheet.
const MAX_CELLS: usize = 2_000_000;
/// Column count of a spreadsheet grid (`A` through `XFD`).
const MAX_COLUMNS: usize = 16_384;

type Archive<'a> = zip::ZipArchive<Cursor<&'a [u8]>>;

fn load_err(e: impl std::fmt::Display) -> TabularError {
    TabularError::Load(e.to_string())
}

/// Parses the first worksheet. The first non-empty row is the header.
pub fn read_first_sheet(bytes: &[u8]) -> Result<(Vec<String>, Vec<Vec<String>>), TabularError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(load_err)?;
    let shared = read_shared_strings(&mut archive)?;
    let sheet = first_worksheet_name(&archive)
        .ok_or_else(|| TabularError::Load("workbook has no worksheets".to_string()))?;
    let xml = read_entry_bounded(&mut archive, &sheet)?;
    let grid = read_sheet_cells(&xml, &shared)?;

    let width = grid
        .values()
        .flat_map(|cells| cells.keys().next_back())
        .max()
        .map(|c| c + 1)
        .unwrap_or(0);

    let mut rows = grid.into_values().map(|cells| {
        let mut row = vec![String::new(); width];
        for (col, value) in cells {
            row[col] = value;
        }
        row
    });
    let header = rows
        .next()
        .ok_or_else(|| TabularError::Load("No columns to parse from file".to_string()))?;
    Ok((header, rows.collect()))
}

fn read_entry_bounded(archive: &mut Archive<'_>, name: &str) -> Result<Vec<u8>, TabularError> {
    let entry = archive.by_name(name).map_err(load_err)?;
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(load_err)?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(TabularError::Load(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, MAX_XML_ENTRY_BYTES
        )));
    }
    Ok(out)
}

/// Lowest-numbered `xl/worksheets/sheetN.xml`.
fn first_worksheet_name(archive: &Archive<'_>) -> Option<String> {
    archive
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/sheet") && n.ends_with(".xml"))
        .min_by_key(|name| {
            name.trim_start_matches("xl/worksheets/sheet")
                .trim_end_matches(".xml")
                .parse::<u32>()
                .unwrap_or(u32::MAX)
        })
        .map(str::to_string)
}

/// Shared string table; rich-text runs inside one `<si>` are concatenated.
/// A workbook without the table simply has no shared strings.
fn read_shared_strings(archive: &mut Archive<'_>) -> Result<Vec<String>, TabularError> {
    if archive.index_for_name("xl/sharedStrings.xml").is_none() {
        return Ok(Vec::new());
    }
    let xml = read_entry_bounded(archive, "xl/sharedStrings.xml")?;
    let mut reader = Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_t = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_t = true,
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Ok(Event::Text(te)) if in_t => {
                if let Some(s) = current.as_mut() {
                    s.push_str(&te.unescape().unwrap_or_default());
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"si" => strings.extend(current.take()),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(load_err(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

#[derive(Default)]
struct PendingCell {
    row: usize,
    col: usize,
    kind: Option<Vec<u8>>,
    value: String,
}

/// Sheet cells as `row → (col → text)`, both zero-based.
fn read_sheet_cells(
    xml: &[u8],
    shared: &[String],
) -> Result<BTreeMap<usize, BTreeMap<usize, String>>, TabularError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut grid: BTreeMap<usize, BTreeMap<usize, String>> = BTreeMap::new();

    let mut row_idx = 0usize;
    let mut next_col = 0usize;
    let mut cell: Option<PendingCell> = None;
    let mut in_value = false;
    let mut count = 0usize;

    loop {
        if count >= MAX_CELLS {
            tracing::warn!(max = MAX_CELLS, "xlsx sheet truncated");
            break;
        }
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => {
                    row_idx = attr(&e, b"r")
                        .and_then(|r| r.parse::<usize>().ok())
                        .map(|r| r.saturating_sub(1))
                        .unwrap_or(row_idx);
                    next_col = 0;
                }
                b"c" => cell = Some(start_cell(&e, row_idx, next_col)?),
                b"v" | b"t" => in_value = cell.is_some(),
                _ => {}
            },
            Ok(Event::Text(te)) if in_value => {
                if let Some(c) = cell.as_mut() {
                    c.value.push_str(&te.unescape().unwrap_or_default());
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    if let Some(c) = cell.take() {
                        next_col = c.col + 1;
                        if let Some(text) = resolve_cell(&c, shared) {
                            grid.entry(c.row).or_default().insert(c.col, text);
                            count += 1;
                        }
                    }
                }
                b"row" => row_idx += 1,
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"c" => {
                next_col = start_cell(&e, row_idx, next_col)?.col + 1;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(load_err(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(grid)
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

fn start_cell(e: &BytesStart<'_>, row: usize, next_col: usize) -> Result<PendingCell, TabularError> {
    let (row, col) = match attr(e, b"r") {
        Some(r) => parse_cell_ref(&r)
            .ok_or_else(|| TabularError::Load(format!("Invalid cell reference: {}", r)))?,
        None => (row, next_col),
    };
    if col >= MAX_COLUMNS {
        return Err(TabularError::Load(format!(
            "Cell in column {} is beyond the last spreadsheet column (XFD)",
            col + 1
        )));
    }
    Ok(PendingCell {
        row,
        col,
        kind: attr(e, b"t").map(String::into_bytes),
        value: String::new(),
    })
}

fn resolve_cell(cell: &PendingCell, shared: &[String]) -> Option<String> {
    match cell.kind.as_deref() {
        Some(b"s") => cell
            .value
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|i| shared.get(i).cloned()),
        Some(b"b") => Some(if cell.value.trim() == "1" { "True" } else { "False" }.to_string()),
        Some(b"e") => None,
        _ => Some(cell.value.clone()),
    }
}

/// `"B3"` → `(2, 1)` (zero-based row, column).
fn parse_cell_ref(r: &str) -> Option<(usize, usize)> {
    let split = r.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = r.split_at(split);
    if letters.is_empty() {
        return None;
    }
    let mut col = 0usize;
    for b in letters.bytes() {
        if !b.is_ascii_alphabetic() {
            return None;
        }
        col = col
            .checked_mul(26)?
            .checked_add((b.to_ascii_uppercase() - b'A' + 1) as usize)?;
    }
    let row = digits.parse::<usize>().ok()?;
    Some((row.checked_sub(1)?, col - 1))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    pub(crate) fn build_xlsx(shared: &[&str], sheet_rows: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            let opts = zip::write::SimpleFileOptions::default();
            let sst: String = shared
                .iter()
                .map(|s| format!("<si><t>{}</t></si>", s))
                .collect();
            zip.start_file("xl/sharedStrings.xml", opts).unwrap();
            zip.write_all(format!("<sst>{}</sst>", sst).as_bytes()).unwrap();
            zip.start_file("xl/worksheets/sheet1.xml", opts).unwrap();
            zip.write_all(
                format!("<worksheet><sheetData>{}</sheetData></worksheet>", sheet_rows).as_bytes(),
            )
            .unwrap();
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn reads_header_and_typed_cells() {
        let bytes = build_xlsx(
            &["Region", "Revenue", "North"],
            r#"<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row>
               <row r="2"><c r="A2" t="s"><v>2</v></c><c r="B2"><v>1200</v></c></row>
               <row r="3"><c r="A3" t="inlineStr"><is><t>South</t></is></c><c r="B3"><v>75.5</v></c></row>"#,
        );
        let (header, rows) = read_first_sheet(&bytes).unwrap();
        assert_eq!(header, vec!["Region", "Revenue"]);
        assert_eq!(rows, vec![vec!["North", "1200"], vec!["South", "75.5"]]);
    }

    #[test]
    fn gaps_become_empty_cells() {
        let bytes = build_xlsx(
            &["a", "c"],
            r#"<row r="1"><c r="A1" t="s"><v>0</v></c><c r="C1" t="s"><v>1</v></c></row>
               <row r="2"><c r="C2"><v>3</v></c></row>"#,
        );
        let (header, rows) = read_first_sheet(&bytes).unwrap();
        assert_eq!(header, vec!["a", "", "c"]);
        assert_eq!(rows, vec![vec!["", "", "3"]]);
    }

    #[test]
    fn cell_refs_parse() {
        assert_eq!(parse_cell_ref("A1"), Some((0, 0)));
        assert_eq!(parse_cell_ref("AB12"), Some((11, 27)));
        assert_eq!(parse_cell_ref("12"), None);
        assert_eq!(parse_cell_ref("XFD1"), Some((0, 16_383)));
        assert_eq!(parse_cell_ref("ZZZZZZZZZZZZZZZ1"), None);
    }

    #[test]
    fn oversized_cell_refs_are_load_errors() {
        for r in ["ZZZZZZZZZZZZZZZ1", "ZZZZZZ1", "XFE1"] {
            let bytes = build_xlsx(
                &["a"],
                &format!(r#"<row r="1"><c r="A1" t="s"><v>0</v></c><c r="{}"><v>1</v></c></row>"#, r),
            );
            let err = read_first_sheet(&bytes).unwrap_err();
            assert_eq!(err.code(), "load_error", "{}", r);
        }
    }

    #[test]
    fn self_closing_cell_past_last_column_is_rejected() {
        let bytes = build_xlsx(&["a"], r#"<row r="1"><c r="A1" t="s"><v>0</v></c><c r="ZZZZZZ1"/></row>"#);
        assert_eq!(read_first_sheet(&bytes).unwrap_err().code(), "load_error");
    }

    #[test]
    fn not_a_zip_is_a_load_error() {
        let err = read_first_sheet(b"plain text").unwrap_err();
        assert_eq!(err.code(), "load_error");
    }
}
