use itertools::Itertools;
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt::Display;
use std::hash::Hash;

/// 可变归约：创建容器，逐个累积，最后转换为结果。
pub trait Collector<T> {
    type Acc;
    type Output;

    fn supply(&self) -> Self::Acc;

    fn accumulate(&self, acc: &mut Self::Acc, value: T);

    fn finish(&self, acc: Self::Acc) -> Self::Output;
}

/// 收集为`Vec`。
#[derive(Debug, Clone, Copy, Default)]
pub struct ToVec;

impl<T> Collector<T> for ToVec {
    type Acc = Vec<T>;
    type Output = Vec<T>;

    fn supply(&self) -> Vec<T> {
        Vec::new()
    }

    fn accumulate(&self, acc: &mut Vec<T>, value: T) {
        acc.push(value);
    }

    fn finish(&self, acc: Vec<T>) -> Vec<T> {
        acc
    }
}

/// 收集为集合，重复值只保留一个。
#[derive(Debug, Clone, Copy, Default)]
pub struct ToSet;

impl<T: Eq + Hash> Collector<T> for ToSet {
    type Acc = FxHashSet<T>;
    type Output = FxHashSet<T>;

    fn supply(&self) -> FxHashSet<T> {
        FxHashSet::default()
    }

    fn accumulate(&self, acc: &mut FxHashSet<T>, value: T) {
        acc.insert(value);
    }

    fn finish(&self, acc: FxHashSet<T>) -> FxHashSet<T> {
        acc
    }
}

/// 计数。
#[derive(Debug, Clone, Copy, Default)]
pub struct Counting;

impl<T> Collector<T> for Counting {
    type Acc = usize;
    type Output = usize;

    fn supply(&self) -> usize {
        0
    }

    fn accumulate(&self, acc: &mut usize, _value: T) {
        *acc += 1;
    }

    fn finish(&self, acc: usize) -> usize {
        acc
    }
}

/// 以分隔符连接为字符串，并添加前缀和后缀。
#[derive(Debug, PartialEq, Default, Clone)]
pub struct Joining {
    pub(crate) delimiter: String,
    pub(crate) prefix: String,
    pub(crate) postfix: String,
}

impl Joining {
    pub fn new(delimiter: impl Into<String>) -> Joining {
        Joining { delimiter: delimiter.into(), ..Joining::default() }
    }

    pub fn with_affix(delimiter: impl Into<String>, prefix: impl Into<String>, postfix: impl Into<String>) -> Joining {
        Joining { delimiter: delimiter.into(), prefix: prefix.into(), postfix: postfix.into() }
    }
}

impl<T: Display> Collector<T> for Joining {
    type Acc = Vec<String>;
    type Output = String;

    fn supply(&self) -> Vec<String> {
        Vec::new()
    }

    fn accumulate(&self, acc: &mut Vec<String>, value: T) {
        acc.push(value.to_string());
    }

    fn finish(&self, acc: Vec<String>) -> String {
        format!("{}{}{}", self.prefix, acc.iter().join(&self.delimiter), self.postfix)
    }
}

/// 按键分组，每组由下游收集器归约。
#[derive(Debug, Clone)]
pub struct Grouping<F, C> {
    key: F,
    downstream: C,
}

impl<F, C> Grouping<F, C> {
    pub fn new(key: F, downstream: C) -> Grouping<F, C> {
        Grouping { key, downstream }
    }
}

impl<T, K, F, C> Collector<T> for Grouping<F, C>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
    C: Collector<T>,
{
    type Acc = FxHashMap<K, C::Acc>;
    type Output = FxHashMap<K, C::Output>;

    fn supply(&self) -> Self::Acc {
        FxHashMap::default()
    }

    fn accumulate(&self, acc: &mut Self::Acc, value: T) {
        let group = acc.entry((self.key)(&value)).or_insert_with(|| self.downstream.supply());
        self.downstream.accumulate(group, value);
    }

    fn finish(&self, acc: Self::Acc) -> Self::Output {
        acc.into_iter().map(|(key, group)| (key, self.downstream.finish(group))).collect()
    }
}
