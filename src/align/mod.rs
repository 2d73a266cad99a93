pub mod region;
pub mod seed;
pub mod sw;

use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{bail, Context, Result};
use rayon::prelude::*;

use crate::collector::SyncAlignmentList;
use crate::index::fm::FMIndex;
use crate::io::fastq::{FastqReader, FastqRecord};
use crate::util::dna::Alphabet;

pub use sw::{banded_edit_align, ops_to_cigar, parse_cigar, EditAln};

/// 比对调参。全部显式暴露，不埋死常量。
#[derive(Debug, Clone)]
pub struct MapOpt {
    /// 种子长度
    pub seed_len: usize,
    /// 允许的最大编辑距离
    pub max_dist: u32,
    /// 种子 SA 区间宽度上限，超过按高重复丢弃
    pub max_interval: usize,
    /// 每条 read 报告的比对数上限
    pub max_hits: usize,
    /// worker 线程数
    pub threads: usize,
}

impl Default for MapOpt {
    fn default() -> Self {
        Self {
            seed_len: 19,
            max_dist: 4,
            max_interval: 64,
            max_hits: 64,
            threads: 1,
        }
    }
}

/// 一条比对记录：read 在参考上的一个放置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alignment {
    pub query_name: String,
    pub sequence: Vec<u8>,
    /// 染色体名
    pub contig: String,
    /// contig 内 0 基起点
    pub pos: u32,
    pub is_rev: bool,
    pub cigar: String,
    /// 编辑距离
    pub nm: u32,
    pub mapq: u8,
}

/// 去重/排序用的中间放置，contig 还是序号形式
struct RawAln {
    contig: usize,
    pos: u32,
    is_rev: bool,
    cigar: String,
    nm: u32,
}

/// 种子-延伸比对器。
///
/// 只读借用共享索引；字母表构造一次后显式传入。
/// 同一个比对器可在任意多线程间共享（索引与配置均不可变）。
pub struct SeedAligner<'a> {
    fm: &'a FMIndex,
    opt: MapOpt,
    abc: Alphabet,
}

impl<'a> SeedAligner<'a> {
    pub fn new(fm: &'a FMIndex, opt: MapOpt, abc: Alphabet) -> Self {
        Self { fm, opt, abc }
    }

    /// 把一条 read 映射为零或多条比对；零结果是正常情形而非错误
    pub fn map(&self, read: &FastqRecord) -> Vec<Alignment> {
        self.map_with_hint(read, None)
    }

    /// 带 CIGAR 提示的映射：同分放置中 CIGAR 与提示一致者优先报告
    pub fn map_with_hint(&self, read: &FastqRecord, cigar_hint: Option<&str>) -> Vec<Alignment> {
        let fwd = self.abc.encode_seq(&read.seq);
        let rev = self.abc.encode_seq(&self.abc.revcomp(&read.seq));

        let mut raw: Vec<RawAln> = Vec::new();
        self.extend_strand(&fwd, false, &mut raw);
        self.extend_strand(&rev, true, &mut raw);

        // 不同种子路径到达的同一放置收敛为一条
        raw.sort_unstable_by(|a, b| {
            (a.contig, a.pos, a.is_rev, &a.cigar).cmp(&(b.contig, b.pos, b.is_rev, &b.cigar))
        });
        raw.dedup_by(|a, b| {
            a.contig == b.contig && a.pos == b.pos && a.is_rev == b.is_rev && a.cigar == b.cigar
        });

        // 最优（编辑距离最小）在前；同分时提示 CIGAR 优先，
        // 再按最左基因组位置，正链先于负链；超出上限的放置截断
        raw.sort_by(|a, b| {
            let a_pref = cigar_hint.is_some_and(|h| h == a.cigar);
            let b_pref = cigar_hint.is_some_and(|h| h == b.cigar);
            (a.nm, !a_pref, a.contig, a.pos, a.is_rev).cmp(&(b.nm, !b_pref, b.contig, b.pos, b.is_rev))
        });
        raw.truncate(self.opt.max_hits);

        let mapq = if raw.len() == 1 { 255 } else { 0 };
        raw.into_iter()
            .map(|r| Alignment {
                query_name: read.id.clone(),
                sequence: read.seq.clone(),
                contig: self.fm.contigs[r.contig].name.clone(),
                pos: r.pos,
                is_rev: r.is_rev,
                cigar: r.cigar,
                nm: r.nm,
                mapq,
            })
            .collect()
    }

    /// 单链流程：种子 -> 候选区域 -> 带状编辑距离延伸
    fn extend_strand(&self, coded: &[u8], is_rev: bool, out: &mut Vec<RawAln>) {
        let hits = seed::collect_seed_hits(self.fm, coded, self.opt.seed_len, self.opt.max_interval);
        if hits.is_empty() {
            return;
        }
        let margin = i64::from(self.opt.max_dist);
        let read_len = coded.len() as i64;
        for reg in region::merge_hits(self.fm, &hits, margin) {
            let (win_start, window) =
                self.fm
                    .contig_window(reg.contig, reg.start - margin, reg.start + read_len + margin);
            if window.is_empty() {
                continue;
            }
            let Some(hit) = sw::banded_edit_align(coded, &window, self.opt.max_dist) else {
                continue;
            };
            out.push(RawAln {
                contig: reg.contig,
                pos: win_start + hit.ref_start as u32,
                is_rev,
                cigar: hit.cigar,
                nm: hit.dist,
            });
        }
    }
}

/// 映射入口：校验 read，比对，把完整结果集追加进收集器，返回追加条数。
///
/// 对 read 与索引而言是纯函数；唯一副作用是向 collector 追加。
/// 整条 read 的结果算完之前不写收集器，任务提前放弃不会留下半截状态。
pub fn map_read(
    read: &FastqRecord,
    cigar_hint: Option<&str>,
    fm: &FMIndex,
    collector: &SyncAlignmentList,
    opt: &MapOpt,
) -> Result<usize> {
    if read.seq.len() != read.qual.len() {
        bail!(
            "read '{}': sequence length {} != quality length {}",
            read.id,
            read.seq.len(),
            read.qual.len()
        );
    }
    let aligner = SeedAligner::new(fm, opt.clone(), Alphabet::new());
    let alignments = aligner.map_with_hint(read, cigar_hint);
    let appended = alignments.len();
    for aln in alignments {
        collector.push(aln);
    }
    Ok(appended)
}

/// 一次映射运行的汇总
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapStats {
    pub reads: usize,
    pub mapped: usize,
    pub alignments: usize,
    pub failed: usize,
}

/// 收集器的默认形状，沿用经典驱动的取值
pub const COLLECTOR_INITIAL_CAPACITY: usize = 100_000;
pub const COLLECTOR_GROWTH: f32 = 0.25;

/// 并行映射驱动：加载索引一次，整批 reads 分发给 worker 池，
/// 结果汇入唯一的同步收集器，最后写出制表符分隔的映射报告。
///
/// 坏 read（解析失败或长度不符）逐条上报并跳过，批次继续；
/// 索引损坏则立即失败。
pub fn map_fastq<P: AsRef<Path>>(
    index_dir: P,
    reads_path: &str,
    out_path: Option<&str>,
    opt: &MapOpt,
) -> Result<MapStats> {
    let fm = FMIndex::load_from_dir(&index_dir)?;
    log::info!(
        "index loaded: {} contigs, {} symbols",
        fm.contigs.len(),
        fm.len()
    );

    let file = std::fs::File::open(reads_path)
        .with_context(|| format!("cannot open reads file '{}'", reads_path))?;
    let mut reads = Vec::new();
    let mut failed = 0usize;
    for record in FastqReader::new(std::io::BufReader::new(file)) {
        match record {
            Ok(r) => reads.push(r),
            Err(e) => {
                failed += 1;
                log::warn!("skipping malformed read: {:#}", e);
            }
        }
    }

    let collector = SyncAlignmentList::with_capacity(COLLECTOR_INITIAL_CAPACITY, COLLECTOR_GROWTH);
    let mapped = AtomicUsize::new(0);
    let rejected = AtomicUsize::new(0);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opt.threads)
        .build()
        .context("cannot build worker thread pool")?;
    pool.install(|| {
        reads.par_iter().for_each(|read| {
            match map_read(read, None, &fm, &collector, opt) {
                Ok(0) => {}
                Ok(_) => {
                    mapped.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    rejected.fetch_add(1, Ordering::Relaxed);
                    log::warn!("read rejected: {:#}", e);
                }
            }
        });
    });

    let results = collector.into_vec();
    let mut out: Box<dyn Write> = match out_path {
        Some(p) => Box::new(std::io::BufWriter::new(
            std::fs::File::create(p).with_context(|| format!("cannot create output '{}'", p))?,
        )),
        None => Box::new(std::io::BufWriter::new(std::io::stdout())),
    };
    for a in &results {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            a.query_name,
            a.contig,
            a.pos + 1, // 报告用 1 基坐标
            if a.is_rev { '-' } else { '+' },
            a.cigar,
            a.nm,
            a.mapq,
            String::from_utf8_lossy(&a.sequence),
        )?;
    }
    out.flush()?;

    let stats = MapStats {
        reads: reads.len(),
        mapped: mapped.load(Ordering::Relaxed),
        alignments: results.len(),
        failed: failed + rejected.load(Ordering::Relaxed),
    };
    log::info!(
        "mapped {}/{} reads, {} alignments, {} failed",
        stats.mapped,
        stats.reads,
        stats.alignments,
        stats.failed
    );
    Ok(stats)
}
