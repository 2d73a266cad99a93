use std::sync::{Mutex, PoisonError};

use crate::align::Alignment;

/// 单写者结果容器。
///
/// 容量按 `ceil(cap * (1 + growth))` 几何增长，既有元素与顺序保持不变；
/// 只增不减，整体析构是唯一的释放方式。扩容失败（内存耗尽）直接中止
/// 运行，不做局部恢复。
#[derive(Debug)]
pub struct AlignmentList {
    items: Vec<Alignment>,
    growth: f32,
}

impl AlignmentList {
    pub fn with_capacity(initial: usize, growth: f32) -> Self {
        Self {
            items: Vec::with_capacity(initial.max(1)),
            growth: growth.max(0.0),
        }
    }

    pub fn push(&mut self, aln: Alignment) {
        if self.items.len() == self.items.capacity() {
            let cap = self.items.capacity().max(1);
            let target = ((cap as f64) * (1.0 + f64::from(self.growth))).ceil() as usize;
            let target = target.max(cap + 1);
            self.items.reserve_exact(target - self.items.len());
        }
        self.items.push(aln);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    pub fn get(&self, i: usize) -> Option<&Alignment> {
        self.items.get(i)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Alignment> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<Alignment> {
        self.items
    }
}

/// 多写者结果容器：整条流水线里唯一的同步点。
///
/// append 与扩容在同一把锁内完成，任意多个 worker 并发追加
/// 也不会交错出撕裂的扩容；元素一旦写入即不再移动语义上的位置。
#[derive(Debug)]
pub struct SyncAlignmentList {
    inner: Mutex<AlignmentList>,
}

impl SyncAlignmentList {
    pub fn with_capacity(initial: usize, growth: f32) -> Self {
        Self {
            inner: Mutex::new(AlignmentList::with_capacity(initial, growth)),
        }
    }

    // 容器内容只是普通数据，某个 worker panic 不会留下半写状态，
    // 锁中毒时取回内部值继续即可
    fn lock(&self) -> std::sync::MutexGuard<'_, AlignmentList> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, aln: Alignment) {
        self.lock().push(aln);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn get(&self, i: usize) -> Option<Alignment> {
        self.lock().get(i).cloned()
    }

    pub fn into_vec(self) -> Vec<Alignment> {
        self.inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .into_vec()
    }
}
