/// 后缀数组构建（前缀倍增，O(n log n)）。
/// 输入为数值化文本（0 为分隔符，允许出现多次，用于分隔不同 contig）。
pub fn build_sa(text: &[u8]) -> Vec<u32> {
    let n = text.len();
    if n == 0 {
        return Vec::new();
    }

    let mut sa: Vec<usize> = (0..n).collect();
    let mut rank: Vec<i64> = text.iter().map(|&b| i64::from(b)).collect();
    let mut next_rank: Vec<i64> = vec![0; n];

    let key = |rank: &[i64], i: usize, k: usize| -> (i64, i64) {
        let second = if i + k < n { rank[i + k] } else { -1 };
        (rank[i], second)
    };

    let mut k = 1usize;
    loop {
        sa.sort_unstable_by_key(|&i| key(&rank, i, k));

        next_rank[sa[0]] = 0;
        for w in 1..n {
            let bump = i64::from(key(&rank, sa[w], k) != key(&rank, sa[w - 1], k));
            next_rank[sa[w]] = next_rank[sa[w - 1]] + bump;
        }
        rank.copy_from_slice(&next_rank);

        if rank[sa[n - 1]] as usize == n - 1 || k >= n {
            break;
        }
        k <<= 1;
    }

    sa.into_iter().map(|i| i as u32).collect()
}
