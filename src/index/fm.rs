use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::index::pack::PackedSeq;
use crate::index::{bwt, sa};
use crate::util::dna;

/// 落盘格式版本号，加载时强校验
pub const FORMAT_VERSION: u32 = 2;
/// 索引目录内的数据文件名
pub const INDEX_FILE_NAME: &str = "index.fm";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Contig {
    pub name: String,
    /// contig 长度（不含分隔符）
    pub len: u32,
    /// 在含分隔符文本中的起始偏移
    pub offset: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct IndexMeta {
    pub reference_file: Option<String>,
    pub build_args: Option<String>,
    pub build_timestamp: Option<String>,
}

/// FM 索引。构建完成后只读，可在任意多线程间无锁共享。
///
/// - BWT 与参考文本都以 4 bit/符号 紧凑存储；
/// - Occ 检查点每 `stride` 个 BWT 位置记一行（行内顺扫补偿，O(stride) rank）；
/// - SA 采样取行号为 `stride` 倍数的行，另记 `primary`
///   （后缀起点为文本位置 0 的行号），LF 回溯到采样行或 primary 即停；
/// - 分隔符策略：每个 contig 之后各有一个 $（编码 0），
///   BWT 长度 = 编码长度 + contig 数。
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FMIndex {
    version: u32,
    sigma: u8,
    stride: u32,
    /// BWT/文本长度（含分隔符）
    len: u32,
    /// c[i] = 文本中编码 < i 的符号总数
    c: Vec<u32>,
    bwt: PackedSeq,
    /// 含分隔符的参考文本，用于提取局部比对窗口
    text: PackedSeq,
    /// 按块展平：occ_samples[block * sigma + code] = 块起点前的累计出现次数
    occ_samples: Vec<u32>,
    /// sa_samples[i] = SA[i * stride]
    sa_samples: Vec<u32>,
    /// SA 值为 0 的行号
    primary: u32,
    pub contigs: Vec<Contig>,
    pub meta: IndexMeta,
}

impl FMIndex {
    /// 从编码文本、BWT、后缀数组装配索引。
    /// 三者长度必须一致；完整 SA 仅在构建期存在，装配后只保留采样。
    pub fn build(text: Vec<u8>, bwt: Vec<u8>, sa: Vec<u32>, contigs: Vec<Contig>, stride: u32) -> Self {
        debug_assert_eq!(text.len(), bwt.len());
        debug_assert_eq!(text.len(), sa.len());
        debug_assert!(stride > 0);

        let n = bwt.len();
        let sigma = dna::SIGMA;

        let mut freq = vec![0u32; sigma];
        for &code in &bwt {
            freq[code as usize] += 1;
        }
        let mut c = vec![0u32; sigma];
        for i in 1..sigma {
            c[i] = c[i - 1] + freq[i - 1];
        }

        let stride_us = stride as usize;
        let num_blocks = n.div_ceil(stride_us);
        let mut occ_samples = vec![0u32; num_blocks * sigma];
        let mut running = vec![0u32; sigma];
        for block in 0..num_blocks {
            occ_samples[block * sigma..(block + 1) * sigma].copy_from_slice(&running);
            let from = block * stride_us;
            let to = ((block + 1) * stride_us).min(n);
            for &code in &bwt[from..to] {
                running[code as usize] += 1;
            }
        }

        let sa_samples: Vec<u32> = sa.iter().step_by(stride_us).copied().collect();
        let primary = sa.iter().position(|&v| v == 0).unwrap_or(0) as u32;

        Self {
            version: FORMAT_VERSION,
            sigma: sigma as u8,
            stride,
            len: n as u32,
            c,
            bwt: PackedSeq::from_codes(&bwt),
            text: PackedSeq::from_codes(&text),
            occ_samples,
            sa_samples,
            primary,
            contigs,
            meta: IndexMeta::default(),
        }
    }

    /// 从编码文本直接构建（SA -> BWT -> 装配）
    pub fn from_text(text: Vec<u8>, contigs: Vec<Contig>, stride: u32) -> Self {
        let sa_arr = sa::build_sa(&text);
        let bwt_arr = bwt::build_bwt(&text, &sa_arr);
        Self::build(text, bwt_arr, sa_arr, contigs, stride)
    }

    pub fn set_meta(&mut self, meta: IndexMeta) {
        self.meta = meta;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// BWT[0..pos) 中编码 code 的出现次数：最近检查点 + 块内顺扫
    pub fn occ(&self, code: u8, pos: usize) -> u32 {
        if pos == 0 {
            return 0;
        }
        let sigma = self.sigma as usize;
        let stride = self.stride as usize;
        let block = (pos - 1) / stride;
        let mut count = self.occ_samples[block * sigma + code as usize];
        for i in block * stride..pos {
            if self.bwt.get(i) == code {
                count += 1;
            }
        }
        count
    }

    /// 在区间 [lo, hi) 前端扩展一个符号后的新区间
    #[inline]
    fn extend(&self, code: u8, lo: usize, hi: usize) -> (usize, usize) {
        let base = self.c[code as usize] as usize;
        (base + self.occ(code, lo) as usize, base + self.occ(code, hi) as usize)
    }

    /// 反向搜索：自右向左逐符号收窄 SA 区间。
    /// 区间一旦为空立即返回 None；非空结果精确枚举 pattern 的全部出现位置。
    pub fn backward_search(&self, pattern: &[u8]) -> Option<(usize, usize)> {
        if self.is_empty() || pattern.is_empty() {
            return None;
        }
        let mut lo = 0usize;
        let mut hi = self.len();
        for &code in pattern.iter().rev() {
            let (nlo, nhi) = self.extend(code, lo, hi);
            if nlo >= nhi {
                return None;
            }
            lo = nlo;
            hi = nhi;
        }
        Some((lo, hi))
    }

    /// LF 映射：BWT 第 i 行的前驱后缀所在行
    #[inline]
    pub fn lf(&self, i: usize) -> usize {
        let code = self.bwt.get(i);
        self.c[code as usize] as usize + self.occ(code, i) as usize
    }

    /// 恢复 SA 第 row 行对应的文本位置：
    /// 沿 LF 回溯至采样行（或 primary），期望 O(stride) 步。
    pub fn suffix_position(&self, mut row: usize) -> u32 {
        let stride = self.stride as usize;
        let mut steps = 0u32;
        while row % stride != 0 && row as u32 != self.primary {
            row = self.lf(row);
            steps += 1;
        }
        let base = if row as u32 == self.primary {
            0
        } else {
            self.sa_samples[row / stride]
        };
        base + steps
    }

    /// 枚举区间内全部文本位置
    pub fn interval_positions(&self, lo: usize, hi: usize) -> Vec<u32> {
        (lo..hi).map(|row| self.suffix_position(row)).collect()
    }

    /// 文本位置 -> (contig 序号, contig 内偏移)；落在分隔符上返回 None
    pub fn map_text_pos(&self, pos: u32) -> Option<(usize, u32)> {
        let mut lo = 0usize;
        let mut hi = self.contigs.len();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let contig = &self.contigs[mid];
            if pos < contig.offset {
                hi = mid;
            } else if pos >= contig.offset + contig.len {
                lo = mid + 1;
            } else {
                return Some((mid, pos - contig.offset));
            }
        }
        None
    }

    /// 取 contig 内 [start, end) 的编码窗口，越界处夹取。
    /// 返回（夹取后的起点, 符号序列）。
    pub fn contig_window(&self, ci: usize, start: i64, end: i64) -> (u32, Vec<u8>) {
        let contig = &self.contigs[ci];
        let lo = start.clamp(0, i64::from(contig.len)) as u32;
        let hi = end.clamp(i64::from(lo), i64::from(contig.len)) as u32;
        let from = (contig.offset + lo) as usize;
        let to = (contig.offset + hi) as usize;
        (lo, self.text.slice(from, to))
    }

    /// 结构自洽性校验：版本号、各表尺寸与声明的 BWT 长度逐项核对
    pub fn validate(&self) -> Result<()> {
        if self.version != FORMAT_VERSION {
            bail!(
                "index format version mismatch: found {}, expected {}",
                self.version,
                FORMAT_VERSION
            );
        }
        if self.sigma as usize != dna::SIGMA {
            bail!("alphabet size mismatch: found {}, expected {}", self.sigma, dna::SIGMA);
        }
        if self.stride == 0 {
            bail!("checkpoint stride must be positive");
        }
        let n = self.len as usize;
        if self.bwt.len() != n || !self.bwt.is_consistent() {
            bail!("BWT stream length disagrees with declared length {}", n);
        }
        if self.text.len() != n || !self.text.is_consistent() {
            bail!("text stream length disagrees with declared length {}", n);
        }
        if self.c.len() != self.sigma as usize {
            bail!("cumulative count table has {} entries, expected {}", self.c.len(), self.sigma);
        }
        let num_blocks = n.div_ceil(self.stride as usize);
        if self.occ_samples.len() != num_blocks * self.sigma as usize {
            bail!(
                "occurrence checkpoint table has {} entries, expected {}",
                self.occ_samples.len(),
                num_blocks * self.sigma as usize
            );
        }
        if self.sa_samples.len() != num_blocks {
            bail!(
                "suffix array sample table has {} entries, expected {}",
                self.sa_samples.len(),
                num_blocks
            );
        }
        if n > 0 && self.primary as usize >= n {
            bail!("primary row {} out of range for length {}", self.primary, n);
        }
        let total: u32 = self.contigs.iter().map(|c| c.len).sum();
        if total as usize + self.contigs.len() != n {
            bail!(
                "contig table covers {} symbols + {} sentinels, expected total {}",
                total,
                self.contigs.len(),
                n
            );
        }
        Ok(())
    }

    /// 序列化到索引目录（bincode 单文件）
    pub fn save_to_dir<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .with_context(|| format!("cannot create index directory '{}'", dir.display()))?;
        let path = dir.join(INDEX_FILE_NAME);
        let file = std::fs::File::create(&path)
            .with_context(|| format!("cannot create index file '{}'", path.display()))?;
        let mut writer = std::io::BufWriter::new(file);
        bincode::serialize_into(&mut writer, self)
            .with_context(|| format!("cannot write index to '{}'", path.display()))?;
        Ok(())
    }

    /// 从索引目录加载并校验；任何不一致都是致命错误并指名坏索引路径
    pub fn load_from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let path = dir.as_ref().join(INDEX_FILE_NAME);
        let file = std::fs::File::open(&path)
            .with_context(|| format!("cannot open index file '{}'", path.display()))?;
        let reader = std::io::BufReader::new(file);
        let index: Self = bincode::deserialize_from(reader)
            .with_context(|| format!("index file '{}' is corrupt", path.display()))?;
        index
            .validate()
            .with_context(|| format!("index file '{}' failed validation", path.display()))?;
        Ok(index)
    }
}

/// 把 (名称, ASCII 序列) 清单编码为含分隔符文本与 contig 表。
/// 空参考或空 contig 不报错，得到的只是平凡索引。
pub fn encode_reference<I, S>(records: I, abc: &dna::Alphabet) -> (Vec<u8>, Vec<Contig>)
where
    I: IntoIterator<Item = (S, Vec<u8>)>,
    S: Into<String>,
{
    let mut text = Vec::new();
    let mut contigs = Vec::new();
    for (name, seq) in records {
        let offset = text.len() as u32;
        text.extend(seq.iter().map(|&b| abc.encode(b)));
        contigs.push(Contig {
            name: name.into(),
            len: text.len() as u32 - offset,
            offset,
        });
        text.push(dna::SENTINEL);
    }
    (text, contigs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::dna::Alphabet;

    fn single_contig_index(seq: &[u8], stride: u32) -> FMIndex {
        let abc = Alphabet::new();
        let (text, contigs) = encode_reference([("chr1", seq.to_vec())], &abc);
        FMIndex::from_text(text, contigs, stride)
    }

    fn brute_force_hits(reference: &[u8], pattern: &[u8]) -> Vec<u32> {
        if pattern.is_empty() || pattern.len() > reference.len() {
            return Vec::new();
        }
        (0..=reference.len() - pattern.len())
            .filter(|&i| &reference[i..i + pattern.len()] == pattern)
            .map(|i| i as u32)
            .collect()
    }

    fn lcg_reference(len: usize, seed: u32) -> Vec<u8> {
        let bases = [b'A', b'C', b'G', b'T'];
        let mut x = seed;
        (0..len)
            .map(|_| {
                x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                bases[(x >> 16) as usize % 4]
            })
            .collect()
    }

    #[test]
    fn exact_search_matches_brute_force() {
        let abc = Alphabet::new();
        let reference = lcg_reference(300, 99);
        let fm = single_contig_index(&reference, 8);
        for (start, plen) in [(0usize, 5usize), (17, 8), (123, 12), (290, 10), (0, 1)] {
            let pattern = &reference[start..start + plen];
            let coded = abc.encode_seq(pattern);
            let expected = brute_force_hits(&reference, pattern);
            let (lo, hi) = fm.backward_search(&coded).expect("pattern taken from the reference");
            let mut got = fm.interval_positions(lo, hi);
            got.sort_unstable();
            assert_eq!(got, expected, "pattern at {}..{}", start, start + plen);
        }
    }

    #[test]
    fn absent_pattern_yields_empty_interval() {
        let abc = Alphabet::new();
        let fm = single_contig_index(b"ACGTACGTACGT", 4);
        assert!(fm.backward_search(&abc.encode_seq(b"TTT")).is_none());
        assert!(fm.backward_search(&abc.encode_seq(b"GACA")).is_none());
    }

    #[test]
    fn periodic_reference_hits() {
        // 参考 "ACGTACGTACGT"，查询 "ACGT" 应命中 {0, 4, 8}
        let abc = Alphabet::new();
        let fm = single_contig_index(b"ACGTACGTACGT", 4);
        let (lo, hi) = fm.backward_search(&abc.encode_seq(b"ACGT")).unwrap();
        let mut positions = fm.interval_positions(lo, hi);
        positions.sort_unstable();
        assert_eq!(positions, vec![0, 4, 8]);
    }

    #[test]
    fn occ_agrees_with_direct_scan() {
        let abc = Alphabet::new();
        let reference = lcg_reference(97, 3);
        let (text, contigs) = encode_reference([("c", reference)], &abc);
        let sa_arr = crate::index::sa::build_sa(&text);
        let bwt_arr = crate::index::bwt::build_bwt(&text, &sa_arr);
        let fm = FMIndex::build(text, bwt_arr.clone(), sa_arr, contigs, 7);

        for code in 0..dna::SIGMA as u8 {
            let mut running = 0u32;
            for pos in 0..=bwt_arr.len() {
                assert_eq!(fm.occ(code, pos), running, "code={} pos={}", code, pos);
                if pos < bwt_arr.len() && bwt_arr[pos] == code {
                    running += 1;
                }
            }
        }
    }

    #[test]
    fn sparse_sa_recovers_every_row() {
        let abc = Alphabet::new();
        let reference = lcg_reference(150, 21);
        let (text, contigs) = encode_reference([("c", reference)], &abc);
        let sa_arr = crate::index::sa::build_sa(&text);
        let bwt_arr = crate::index::bwt::build_bwt(&text, &sa_arr);
        let fm = FMIndex::build(text, bwt_arr, sa_arr.clone(), contigs, 16);
        for (row, &expected) in sa_arr.iter().enumerate() {
            assert_eq!(fm.suffix_position(row), expected, "row={}", row);
        }
    }

    #[test]
    fn multi_contig_coordinates() {
        let abc = Alphabet::new();
        let (text, contigs) =
            encode_reference([("chrA", b"ACGTTGCA".to_vec()), ("chrB", b"GGGACGTA".to_vec())], &abc);
        let fm = FMIndex::from_text(text, contigs, 4);

        let (lo, hi) = fm.backward_search(&abc.encode_seq(b"ACGT")).unwrap();
        let mut mapped: Vec<(usize, u32)> = fm
            .interval_positions(lo, hi)
            .into_iter()
            .filter_map(|p| fm.map_text_pos(p))
            .collect();
        mapped.sort_unstable();
        assert_eq!(mapped, vec![(0, 0), (1, 3)]);
        // 分隔符位置不属于任何 contig
        assert_eq!(fm.map_text_pos(8), None);
    }

    #[test]
    fn trivial_reference_builds_without_error() {
        let fm = single_contig_index(b"", 4);
        assert_eq!(fm.len(), 1); // 仅分隔符
        assert!(fm.validate().is_ok());
        let abc = Alphabet::new();
        assert!(fm.backward_search(&abc.encode_seq(b"A")).is_none());

        let (text, contigs) = encode_reference(Vec::<(String, Vec<u8>)>::new(), &abc);
        let empty = FMIndex::from_text(text, contigs, 4);
        assert!(empty.is_empty());
        assert!(empty.validate().is_ok());
        assert!(empty.backward_search(&[1]).is_none());
    }

    #[test]
    fn save_load_round_trip_is_identical() {
        let abc = Alphabet::new();
        let reference = lcg_reference(120, 5);
        let fm = single_contig_index(&reference, 8);
        let dir = tempfile::tempdir().unwrap();
        fm.save_to_dir(dir.path()).unwrap();
        let loaded = FMIndex::load_from_dir(dir.path()).unwrap();

        for (start, plen) in [(0usize, 6usize), (40, 9), (100, 15)] {
            let coded = abc.encode_seq(&reference[start..start + plen]);
            assert_eq!(fm.backward_search(&coded), loaded.backward_search(&coded));
        }
        let (lo, hi) = loaded.backward_search(&abc.encode_seq(&reference[10..20])).unwrap();
        assert_eq!(fm.interval_positions(lo, hi), loaded.interval_positions(lo, hi));
    }

    #[test]
    fn load_rejects_version_mismatch() {
        let fm = single_contig_index(b"ACGTACGT", 4);
        let dir = tempfile::tempdir().unwrap();
        fm.save_to_dir(dir.path()).unwrap();

        // 版本号是 bincode 流的前 4 字节，翻转后加载必须失败
        let path = dir.path().join(INDEX_FILE_NAME);
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[0] ^= 0xff;
        std::fs::write(&path, bytes).unwrap();

        let err = FMIndex::load_from_dir(dir.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("version"), "unexpected error: {:#}", err);
    }

    #[test]
    fn load_rejects_truncated_file() {
        let fm = single_contig_index(b"ACGTACGT", 4);
        let dir = tempfile::tempdir().unwrap();
        fm.save_to_dir(dir.path()).unwrap();

        let path = dir.path().join(INDEX_FILE_NAME);
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
        assert!(FMIndex::load_from_dir(dir.path()).is_err());
    }

    #[test]
    fn validate_rejects_inconsistent_tables() {
        let fm = single_contig_index(b"ACGTACGT", 4);

        let mut bad = fm.clone();
        bad.occ_samples.pop();
        assert!(bad.validate().is_err());

        let mut bad = fm.clone();
        bad.sa_samples.push(0);
        assert!(bad.validate().is_err());

        let mut bad = fm;
        bad.contigs[0].len += 1;
        assert!(bad.validate().is_err());
    }
}
