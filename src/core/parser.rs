//! Wireshark CSV export parser
//!
//! Parses a packet-list CSV export into normalized [`PacketRecord`]s.
//! Rows that fail required-field parsing are skipped, not fatal; an empty
//! result is valid output and the caller decides whether that is an error.
//! No ordering is imposed on the output.
//!
//! Encoding handling is a heuristic, not a charset detector: a UTF-8 BOM
//! selects UTF-8, anything else is decoded as Windows-1251 (captures from
//! Russian-locale Windows hosts). Valid BOM-less UTF-8 with non-ASCII text
//! will be mangled; known limitation.

use regex::Regex;
use tracing::{debug, warn};

use super::packet::PacketRecord;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Expected column names in a Wireshark packet-list export
const COL_NO: &str = "No.";
const COL_TIME: &str = "Time";
const COL_SOURCE: &str = "Source";
const COL_DEST: &str = "Destination";
const COL_PROTOCOL: &str = "Protocol";
const COL_LENGTH: &str = "Length";
const COL_INFO: &str = "Info";

/// Column indices resolved from the header row
#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    no: Option<usize>,
    time: usize,
    source: usize,
    dest: Option<usize>,
    protocol: Option<usize>,
    length: usize,
    info: Option<usize>,
}

/// Parser for Wireshark packet-list CSV exports
pub struct CsvParser {
    /// "60662 > 443 [ACK]" style info lines; the destination port is group 2
    port_pair_re: Regex,
    /// ":443" style fallback
    port_suffix_re: Regex,
}

impl Default for CsvParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvParser {
    pub fn new() -> Self {
        Self {
            port_pair_re: Regex::new(r"(\d+)\s*(?:>|\u{2192})\s*(\d+)").unwrap(),
            port_suffix_re: Regex::new(r":(\d+)").unwrap(),
        }
    }

    /// Parse raw export bytes into packet records.
    ///
    /// Returns whatever valid rows could be extracted; unparseable rows are
    /// skipped with a debug log.
    pub fn parse(&self, raw: &[u8]) -> Vec<PacketRecord> {
        let text = decode_export(raw);
        self.parse_str(&text)
    }

    /// Parse already-decoded CSV text
    pub fn parse_str(&self, text: &str) -> Vec<PacketRecord> {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());

        let header = match lines.next() {
            Some(h) => h,
            None => return Vec::new(),
        };

        let columns = match resolve_columns(header) {
            Some(c) => c,
            None => {
                warn!("CSV header missing required columns (Time, Source, Length)");
                return Vec::new();
            }
        };

        let mut packets = Vec::new();
        let mut skipped = 0usize;

        for (line_num, line) in lines.enumerate() {
            match self.parse_row(line, &columns) {
                Some(packet) => packets.push(packet),
                None => {
                    debug!(line = line_num + 2, "skipping unparseable CSV row");
                    skipped += 1;
                }
            }
        }

        if skipped > 0 {
            warn!(parsed = packets.len(), skipped, "CSV import skipped rows");
        }

        packets
    }

    fn parse_row(&self, line: &str, columns: &ColumnMap) -> Option<PacketRecord> {
        let fields = split_csv_line(line);

        let time: f64 = fields.get(columns.time)?.trim().parse().ok()?;
        let source_ip = fields.get(columns.source)?.trim().to_string();
        if source_ip.is_empty() {
            return None;
        }
        let length: i64 = fields.get(columns.length)?.trim().parse().ok()?;

        let no = columns
            .no
            .and_then(|i| fields.get(i))
            .and_then(|f| f.trim().parse().ok())
            .unwrap_or(0);
        let dest_ip = columns
            .dest
            .and_then(|i| fields.get(i))
            .map(|f| f.trim().to_string())
            .unwrap_or_default();
        let protocol = columns
            .protocol
            .and_then(|i| fields.get(i))
            .map(|f| f.trim().to_string())
            .unwrap_or_default();
        let info = columns
            .info
            .and_then(|i| fields.get(i))
            .map(|f| f.trim().to_string())
            .unwrap_or_default();

        let port = self.extract_port(&info);

        Some(PacketRecord {
            no,
            time,
            source_ip,
            dest_ip,
            protocol,
            length,
            port,
            info,
        })
    }

    /// Extract the destination port from an info column.
    ///
    /// "60662 > 443 [ACK]" -> 443, "Client Hello :443" -> 443, otherwise 0.
    pub fn extract_port(&self, info: &str) -> u16 {
        if let Some(caps) = self.port_pair_re.captures(info) {
            if let Ok(port) = caps[2].parse::<u32>() {
                if port <= u16::MAX as u32 {
                    return port as u16;
                }
            }
        }

        if let Some(caps) = self.port_suffix_re.captures(info) {
            if let Ok(port) = caps[1].parse::<u32>() {
                if port <= u16::MAX as u32 {
                    return port as u16;
                }
            }
        }

        0
    }
}

/// Decode export bytes: UTF-8 when a BOM is present, Windows-1251 otherwise.
pub fn decode_export(raw: &[u8]) -> String {
    if raw.starts_with(UTF8_BOM) {
        let (text, _, _) = encoding_rs::UTF_8.decode(raw);
        text.into_owned()
    } else {
        let (text, _, _) = encoding_rs::WINDOWS_1251.decode(raw);
        text.into_owned()
    }
}

fn resolve_columns(header: &str) -> Option<ColumnMap> {
    let names = split_csv_line(header);
    let find = |name: &str| names.iter().position(|n| n.trim() == name);

    Some(ColumnMap {
        no: find(COL_NO),
        time: find(COL_TIME)?,
        source: find(COL_SOURCE)?,
        dest: find(COL_DEST),
        protocol: find(COL_PROTOCOL),
        length: find(COL_LENGTH)?,
        info: find(COL_INFO),
    })
}

/// Split one CSV line, honoring double-quoted fields with `""` escapes.
/// The Info column routinely contains commas.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    fields.push(current);

    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = r#""No.","Time","Source","Destination","Protocol","Length","Info""#;

    fn parser() -> CsvParser {
        CsvParser::new()
    }

    #[test]
    fn test_parse_basic_rows() {
        let csv = format!(
            "{HEADER}\n\
             \"1\",\"0.000000\",\"192.168.1.5\",\"10.0.0.1\",\"TCP\",\"66\",\"60662 > 443 [SYN] Seq=0\"\n\
             \"2\",\"0.015000\",\"10.0.0.1\",\"192.168.1.5\",\"TLSv1.2\",\"1514\",\"Application Data\"\n"
        );

        let packets = parser().parse_str(&csv);
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].source_ip, "192.168.1.5");
        assert_eq!(packets[0].port, 443);
        assert_eq!(packets[0].length, 66);
        assert_eq!(packets[1].protocol, "TLSv1.2");
        assert_eq!(packets[1].port, 0);
    }

    #[test]
    fn test_quoted_info_with_commas() {
        let csv = format!(
            "{HEADER}\n\
             \"1\",\"0.1\",\"192.168.1.5\",\"10.0.0.1\",\"DNS\",\"89\",\"Standard query 0x1a2b A example.com, OPT\"\n"
        );

        let packets = parser().parse_str(&csv);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].info, "Standard query 0x1a2b A example.com, OPT");
    }

    #[test]
    fn test_bad_rows_skipped_not_fatal() {
        let csv = format!(
            "{HEADER}\n\
             \"1\",\"not-a-time\",\"192.168.1.5\",\"10.0.0.1\",\"TCP\",\"66\",\"\"\n\
             \"2\",\"0.5\",\"\",\"10.0.0.1\",\"TCP\",\"66\",\"\"\n\
             \"3\",\"0.6\",\"192.168.1.5\",\"10.0.0.1\",\"TCP\",\"abc\",\"\"\n\
             \"4\",\"0.7\",\"192.168.1.5\",\"10.0.0.1\",\"TCP\",\"64\",\"\"\n"
        );

        let packets = parser().parse_str(&csv);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].no, 4);
    }

    #[test]
    fn test_empty_input_is_valid_degenerate_output() {
        assert!(parser().parse(b"").is_empty());
        assert!(parser().parse_str(HEADER).is_empty());
    }

    #[test]
    fn test_missing_required_columns() {
        let csv = "\"A\",\"B\"\n\"1\",\"2\"\n";
        assert!(parser().parse_str(csv).is_empty());
    }

    #[test]
    fn test_utf8_bom_decoding() {
        let mut raw = vec![0xEF, 0xBB, 0xBF];
        raw.extend_from_slice(HEADER.as_bytes());
        raw.extend_from_slice(
            "\n\"1\",\"0.1\",\"192.168.1.5\",\"10.0.0.1\",\"TCP\",\"66\",\"\"\n".as_bytes(),
        );

        let packets = parser().parse(&raw);
        assert_eq!(packets.len(), 1);
        // BOM must not leak into the first header cell
        assert_eq!(packets[0].source_ip, "192.168.1.5");
    }

    #[test]
    fn test_windows_1251_fallback() {
        // 0xCF 0xF0 0xE8 0xE2 0xE5 0xF2 is "Привет" in Windows-1251
        let mut raw = Vec::new();
        raw.extend_from_slice(HEADER.as_bytes());
        raw.extend_from_slice(b"\n\"1\",\"0.1\",\"192.168.1.5\",\"10.0.0.1\",\"TCP\",\"66\",\"");
        raw.extend_from_slice(&[0xCF, 0xF0, 0xE8, 0xE2, 0xE5, 0xF2]);
        raw.extend_from_slice(b"\"\n");

        let packets = parser().parse(&raw);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].info, "Привет");
    }

    #[test]
    fn test_port_extraction_patterns() {
        let p = parser();
        assert_eq!(p.extract_port("60662 > 443 [ACK] Seq=1"), 443);
        assert_eq!(p.extract_port("443 > 60662 [ACK]"), 60662);
        assert_eq!(p.extract_port("60662 \u{2192} 443 [SYN]"), 443);
        assert_eq!(p.extract_port("Client Hello :8443"), 8443);
        assert_eq!(p.extract_port("Echo (ping) request"), 0);
        // out of range falls back to 0
        assert_eq!(p.extract_port("1 > 99999 [ACK]"), 0);
    }
}
