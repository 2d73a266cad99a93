//! # bwt-mapper
//!
//! 基于 BWT / FM 索引的 DNA 短读段比对库。
//!
//! 提供从参考序列到带 CIGAR 比对结果的完整通路：
//!
//! - **索引构建**：参考序列 → 后缀数组 → BWT → FM 索引
//!   （Occ 检查点 + 稀疏 SA 采样 + 染色体坐标表），bincode 落盘、带版本校验
//! - **反向搜索**：逐符号收窄 SA 区间的精确子串定位
//! - **种子-延伸**：分段种子 → 候选区域合并 → 带状编辑距离比对，
//!   正负链统一处理，多重映射去重后按得分报告
//! - **结果收集**：几何增长的比对结果容器，单写者与多写者两种形态，
//!   多写者形态是并行映射时唯一的同步点
//!
//! 索引构建完成后只读，任意多个 worker 可以无锁共享同一份索引。
//!
//! ## 快速示例
//!
//! ```rust,no_run
//! use bwt_mapper::align::{map_read, MapOpt};
//! use bwt_mapper::collector::SyncAlignmentList;
//! use bwt_mapper::index::fm::{encode_reference, FMIndex};
//! use bwt_mapper::io::fastq::FastqRecord;
//! use bwt_mapper::util::dna::Alphabet;
//!
//! let abc = Alphabet::new();
//! let (text, contigs) = encode_reference([("chr1", b"ACGTACGTACGT".to_vec())], &abc);
//! let fm = FMIndex::from_text(text, contigs, 32);
//!
//! let read = FastqRecord::new("read_0", b"ACGTACGT", b"IIIIIIII");
//! let hits = SyncAlignmentList::with_capacity(16, 0.25);
//! let n = map_read(&read, None, &fm, &hits, &MapOpt::default()).unwrap();
//! println!("{} alignments", n);
//! ```
//!
//! ## 模块说明
//!
//! - [`io`] — FASTA / FASTQ 解析（外部协作方接口）
//! - [`index`] — 后缀数组、BWT、FM 索引与持久化
//! - [`align`] — 种子-延伸比对与并行映射驱动
//! - [`collector`] — 比对结果容器
//! - [`util`] — 字母表编码 / 反向互补

pub mod align;
pub mod collector;
pub mod index;
pub mod io;
pub mod util;
