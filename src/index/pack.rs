use serde::{Deserialize, Serialize};

/// 4 bit/符号 的紧凑符号流，每字节装两个编码。
///
/// 字母表只有 6 个编码，半字节是最小的按字节对齐单元；
/// BWT 与参考文本落盘时都用这个表示。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackedSeq {
    data: Vec<u8>,
    len: u32,
}

impl PackedSeq {
    pub fn from_codes(codes: &[u8]) -> Self {
        let mut data = vec![0u8; codes.len().div_ceil(2)];
        for (i, &c) in codes.iter().enumerate() {
            debug_assert!(c < 16);
            data[i / 2] |= (c & 0x0f) << ((i % 2) * 4);
        }
        Self {
            data,
            len: codes.len() as u32,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn get(&self, i: usize) -> u8 {
        (self.data[i / 2] >> ((i % 2) * 4)) & 0x0f
    }

    /// 解码 [from, to) 区间
    pub fn slice(&self, from: usize, to: usize) -> Vec<u8> {
        (from..to).map(|i| self.get(i)).collect()
    }

    /// 字节数与声明长度是否自洽（加载校验用）
    pub fn is_consistent(&self) -> bool {
        self.data.len() == (self.len as usize).div_ceil(2)
    }
}
