use anyhow::{anyhow, Result};
use std::io::BufRead;

/// 一条测序 read：id 与可选描述、碱基序列、等长质量串
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastqRecord {
    pub id: String,
    pub desc: Option<String>,
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
}

impl FastqRecord {
    pub fn new(id: &str, seq: &[u8], qual: &[u8]) -> Self {
        Self {
            id: id.to_string(),
            desc: None,
            seq: seq.to_vec(),
            qual: qual.to_vec(),
        }
    }
}

/// 四行一组的 FASTQ 读取器。
///
/// 序列与质量长度不符只报废当前记录（完整四行已消费，
/// 流位置不受影响），调用方可跳过该条继续迭代。
pub struct FastqReader<R: BufRead> {
    reader: R,
    line: String,
    done: bool,
}

impl<R: BufRead> FastqReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            done: false,
        }
    }

    /// 读一行并去掉行尾；EOF 返回 None
    fn next_line(&mut self) -> Result<Option<&str>> {
        self.line.clear();
        let n = self.reader.read_line(&mut self.line)?;
        if n == 0 {
            Ok(None)
        } else {
            Ok(Some(self.line.trim_end()))
        }
    }

    fn read_record(&mut self) -> Result<Option<FastqRecord>> {
        let Some(header) = self.next_line()? else {
            self.done = true;
            return Ok(None);
        };
        let Some(header) = header.strip_prefix('@') else {
            self.done = true;
            return Err(anyhow!("FASTQ header must start with '@'"));
        };
        let mut parts = header.splitn(2, char::is_whitespace);
        let id = parts.next().unwrap_or_default().to_string();
        let desc = parts
            .next()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let seq = match self.next_line()? {
            Some(line) => line.as_bytes().to_vec(),
            None => return Err(anyhow!("unexpected EOF after header of '{}'", id)),
        };
        match self.next_line()? {
            Some(line) if line.starts_with('+') => {}
            _ => return Err(anyhow!("missing '+' separator in record '{}'", id)),
        }
        let qual = match self.next_line()? {
            Some(line) => line.as_bytes().to_vec(),
            None => return Err(anyhow!("missing quality line in record '{}'", id)),
        };

        if seq.len() != qual.len() {
            return Err(anyhow!(
                "record '{}': sequence length {} != quality length {}",
                id,
                seq.len(),
                qual.len()
            ));
        }

        Ok(Some(FastqRecord { id, desc, seq, qual }))
    }
}

impl<R: BufRead> Iterator for FastqReader<R> {
    type Item = Result<FastqRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
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
    fn parse_two_records() {
        let data = b"@r1 sample\nACGT\n+\nIIII\n@r2\nGGTT\n+r2\nJJJJ\n";
        let mut reader = FastqReader::new(Cursor::new(&data[..]));

        let r1 = reader.next().unwrap().unwrap();
        assert_eq!(r1.id, "r1");
        assert_eq!(r1.desc.as_deref(), Some("sample"));
        assert_eq!(r1.seq, b"ACGT");
        assert_eq!(r1.qual, b"IIII");

        let r2 = reader.next().unwrap().unwrap();
        assert_eq!(r2.id, "r2");
        assert_eq!(r2.desc, None);
        assert!(reader.next().is_none());
    }

    #[test]
    fn length_mismatch_fails_only_that_record() {
        let data = b"@bad\nACGT\n+\nII\n@good\nACGT\n+\nIIII\n";
        let mut reader = FastqReader::new(Cursor::new(&data[..]));

        assert!(reader.next().unwrap().is_err());
        let good = reader.next().unwrap().unwrap();
        assert_eq!(good.id, "good");
        assert!(reader.next().is_none());
    }

    #[test]
    fn missing_header_marker_stops_iteration() {
        let data = b"ACGT\n+\nIIII\n";
        let mut reader = FastqReader::new(Cursor::new(&data[..]));
        assert!(reader.next().unwrap().is_err());
        assert!(reader.next().is_none());
    }
}
