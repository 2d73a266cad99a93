use super::seed::SeedHit;
use crate::index::fm::FMIndex;

/// 候选比对区域：同一 contig 上投影一致的种子命中合并后的放置假设。
/// 生命周期仅限单条 read 的处理过程。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRegion {
    pub contig: usize,
    /// read 起点在 contig 上的投影（可为负，窗口提取时夹取）
    pub start: i64,
    /// 支撑该区域的种子命中数
    pub n_seeds: usize,
}

/// 把种子命中聚成候选区域。
///
/// 每个命中投影回 read 起点（命中位置 - 种子在 read 内的偏移）；
/// 同一 contig 上相邻投影相差不超过 tolerance（由允许的编辑距离推出，
/// 插入缺失最多把对角线挪动这么多）时归入同一区域。
pub fn merge_hits(fm: &FMIndex, hits: &[SeedHit], tolerance: i64) -> Vec<CandidateRegion> {
    let mut projected: Vec<(usize, i64)> = hits
        .iter()
        .filter_map(|h| {
            let (ci, off) = fm.map_text_pos(h.pos)?;
            Some((ci, i64::from(off) - h.qb as i64))
        })
        .collect();
    projected.sort_unstable();

    let mut regions = Vec::new();
    let mut open: Option<(usize, i64, i64, usize)> = None; // (contig, 首投影, 末投影, 命中数)
    for (ci, proj) in projected {
        open = match open {
            Some((c, first, last, n)) if c == ci && proj - last <= tolerance => {
                Some((c, first, proj, n + 1))
            }
            Some((c, first, _, n)) => {
                regions.push(CandidateRegion { contig: c, start: first, n_seeds: n });
                Some((ci, proj, proj, 1))
            }
            None => Some((ci, proj, proj, 1)),
        };
    }
    if let Some((c, first, _, n)) = open {
        regions.push(CandidateRegion { contig: c, start: first, n_seeds: n });
    }
    regions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::fm::{encode_reference, FMIndex};
    use crate::util::dna::Alphabet;

    fn two_contig_index() -> FMIndex {
        let abc = Alphabet::new();
        let (text, contigs) = encode_reference(
            [("chrA", b"ACGTACGTACGT".to_vec()), ("chrB", b"TTTTACGTTTTT".to_vec())],
            &abc,
        );
        FMIndex::from_text(text, contigs, 4)
    }

    #[test]
    fn consistent_hits_merge_into_one_region() {
        let fm = two_contig_index();
        // 两个种子，投影都落在 chrA 起点 0
        let hits = [
            SeedHit { qb: 0, qe: 4, pos: 0 },
            SeedHit { qb: 4, qe: 8, pos: 4 },
        ];
        let regions = merge_hits(&fm, &hits, 2);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0], CandidateRegion { contig: 0, start: 0, n_seeds: 2 });
    }

    #[test]
    fn distant_projections_stay_separate() {
        let fm = two_contig_index();
        let hits = [
            SeedHit { qb: 0, qe: 4, pos: 0 },
            SeedHit { qb: 0, qe: 4, pos: 8 },
        ];
        let regions = merge_hits(&fm, &hits, 2);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].start, 0);
        assert_eq!(regions[1].start, 8);
    }

    #[test]
    fn contig_boundary_splits_regions() {
        let fm = two_contig_index();
        // chrA 末尾与 chrB 开头的投影即便数值接近也不得合并
        // (chrB 的文本偏移为 13：12 个符号 + 1 个分隔符)
        let hits = [
            SeedHit { qb: 0, qe: 4, pos: 8 },
            SeedHit { qb: 0, qe: 4, pos: 17 },
        ];
        let regions = merge_hits(&fm, &hits, 100);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].contig, 0);
        assert_eq!(regions[1].contig, 1);
        assert_eq!(regions[1].start, 4);
    }

    #[test]
    fn indel_shifted_projection_still_merges() {
        let fm = two_contig_index();
        // 第二个种子的投影因缺失挪了 1，容差内仍并入同一区域
        let hits = [
            SeedHit { qb: 0, qe: 4, pos: 0 },
            SeedHit { qb: 4, qe: 8, pos: 5 },
        ];
        let regions = merge_hits(&fm, &hits, 1);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].n_seeds, 2);
    }
}
