use crate::index::fm::FMIndex;

/// 种子在参考文本上的一次命中
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedHit {
    /// 种子在 read 上的区间 [qb, qe)
    pub qb: usize,
    pub qe: usize,
    /// 种子起点的文本位置
    pub pos: u32,
}

/// 把 read 切成互不重叠的定长种子。
/// 尾部残段不足一个种子时，追加一个锚定 read 末端的种子（允许少量重叠）；
/// read 比种子还短时整条作为一个种子。
pub fn partition_seeds(read_len: usize, seed_len: usize) -> Vec<(usize, usize)> {
    if read_len == 0 || seed_len == 0 {
        return Vec::new();
    }
    if read_len <= seed_len {
        return vec![(0, read_len)];
    }
    let mut spans: Vec<(usize, usize)> = (0..read_len / seed_len)
        .map(|i| (i * seed_len, (i + 1) * seed_len))
        .collect();
    if read_len % seed_len != 0 {
        spans.push((read_len - seed_len, read_len));
    }
    spans
}

/// 逐种子反向搜索并解析命中位置。
/// SA 区间宽度超过 max_interval 的种子落在高重复区，整体丢弃；
/// 全部种子被丢弃只是零命中，不是错误。
pub fn collect_seed_hits(
    fm: &FMIndex,
    coded: &[u8],
    seed_len: usize,
    max_interval: usize,
) -> Vec<SeedHit> {
    let mut hits = Vec::new();
    for (qb, qe) in partition_seeds(coded.len(), seed_len) {
        let Some((lo, hi)) = fm.backward_search(&coded[qb..qe]) else {
            continue;
        };
        if hi - lo > max_interval {
            continue; // 高重复种子
        }
        for pos in fm.interval_positions(lo, hi) {
            hits.push(SeedHit { qb, qe, pos });
        }
    }
    hits
}
