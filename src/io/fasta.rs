use anyhow::Result;
use std::io::BufRead;

/// 参考序列的一个 contig
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaRecord {
    pub id: String,
    pub desc: Option<String>,
    pub seq: Vec<u8>,
}

/// 多行 FASTA 读取器；序列行内的空白被剔除，碱基统一为大写
pub struct FastaReader<R: BufRead> {
    reader: R,
    line: String,
    pending_header: Option<String>,
    done: bool,
}

impl<R: BufRead> FastaReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            pending_header: None,
            done: false,
        }
    }

    fn next_line(&mut self) -> Result<Option<&str>> {
        self.line.clear();
        let n = self.reader.read_line(&mut self.line)?;
        if n == 0 {
            Ok(None)
        } else {
            Ok(Some(self.line.trim_end()))
        }
    }

    fn read_record(&mut self) -> Result<Option<FastaRecord>> {
        let header = loop {
            if let Some(h) = self.pending_header.take() {
                break h;
            }
            match self.next_line()? {
                None => {
                    self.done = true;
                    return Ok(None);
                }
                Some(line) => {
                    if let Some(h) = line.strip_prefix('>') {
                        break h.trim().to_string();
                    }
                    // 头部之前的杂散行直接忽略
                }
            }
        };

        let mut parts = header.splitn(2, char::is_whitespace);
        let id = parts.next().unwrap_or_default().to_string();
        let desc = parts
            .next()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let mut seq = Vec::new();
        loop {
            match self.next_line()? {
                None => {
                    self.done = true;
                    break;
                }
                Some(line) => {
                    if let Some(h) = line.strip_prefix('>') {
                        self.pending_header = Some(h.trim().to_string());
                        break;
                    }
                    seq.extend(
                        line.bytes()
                            .filter(|b| !b.is_ascii_whitespace())
                            .map(|b| b.to_ascii_uppercase()),
                    );
                }
            }
        }

        Ok(Some(FastaRecord { id, desc, seq }))
    }
}

impl<R: BufRead> Iterator for FastaReader<R> {
    type Item = Result<FastaRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done && self.pending_header.is_none() {
            return None;
        }
        self.read_record().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parse_two_contigs() {
        let data = b">chr1 first\nACgTNN\n>chr2\nAAA\n";
        let mut reader = FastaReader::new(Cursor::new(&data[..]));

        let r1 = reader.next().unwrap().unwrap();
        assert_eq!(r1.id, "chr1");
        assert_eq!(r1.desc.as_deref(), Some("first"));
        assert_eq!(r1.seq, b"ACGTNN");

        let r2 = reader.next().unwrap().unwrap();
        assert_eq!(r2.id, "chr2");
        assert_eq!(r2.desc, None);
        assert_eq!(r2.seq, b"AAA");

        assert!(reader.next().is_none());
    }

    #[test]
    fn wrapped_lines_and_crlf() {
        let data = b">c1 desc\r\nAC g t\r\nacgt\r\n>c2\r\n NNN \r\n";
        let mut reader = FastaReader::new(Cursor::new(&data[..]));

        let r1 = reader.next().unwrap().unwrap();
        assert_eq!(r1.seq, b"ACGTACGT");
        let r2 = reader.next().unwrap().unwrap();
        assert_eq!(r2.id, "c2");
        assert_eq!(r2.seq, b"NNN");
        assert!(reader.next().is_none());
    }

    #[test]
    fn leading_junk_is_skipped() {
        let data = b"\n\n>chr1\nACGT\n";
        let mut reader = FastaReader::new(Cursor::new(&data[..]));
        let r1 = reader.next().unwrap().unwrap();
        assert_eq!(r1.id, "chr1");
        assert_eq!(r1.seq, b"ACGT");
        assert!(reader.next().is_none());
    }
}
