/// 由后缀数组导出 BWT：`bwt[i] = text[sa[i] - 1]`，sa[i] == 0 时回绕到文本末尾。
pub fn build_bwt(text: &[u8], sa: &[u32]) -> Vec<u8> {
    let n = text.len();
    sa.iter()
        .map(|&p| {
            let i = p as usize;
            if i == 0 {
                text[n - 1]
            } else {
                text[i - 1]
            }
        })
        .collect()
}
