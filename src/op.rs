use crate::config::{Config, is_drain_flat_map};
use crate::err::PipeErr;
use crate::sink::{
    BoxSink, DistinctSink, DropWhileSink, FilterSink, FlatMapSink, LimitSink, MapSink, PeekSink, SkipSink,
    TakeWhileSink,
};
use crate::{Integer, PipeRes};
use rustc_hash::FxHashSet;
use std::fmt::{Debug, Formatter};
use std::hash::Hash;
use std::rc::Rc;

pub type Predicate<T> = Rc<dyn Fn(&T) -> bool>;
pub type Action<T> = Rc<dyn Fn(&T)>;
pub type Mapper<S, T> = Rc<dyn Fn(S) -> T>;
pub type Expander<S, T> = Rc<dyn Fn(S) -> Box<dyn Iterator<Item = T>>>;
/// 每次执行创建一个新的去重状态
pub type DistinctFactory<T> = Rc<dyn Fn() -> Box<dyn FnMut(&T) -> bool>>;

/// 元素类型不变的中间操作。
pub enum Op<T> {
    /* **************************************** 访问 **************************************** */
    /// 对每个值执行动作后原样传递。
    Peek(Action<T>),
    /* **************************************** 减少 **************************************** */
    /// 只传递满足条件的值。
    Filter(Predicate<T>),
    /// 传递前N个值，之后通知上游结束，N非负。
    Limit(Integer),
    /// 丢弃前N个值，N非负。
    Skip(Integer),
    /// 持续传递满足条件的值，直到条件首次不满足后结束。
    TakeWhile(Predicate<T>),
    /// 持续丢弃满足条件的值，直到条件首次不满足。
    DropWhile(Predicate<T>),
    /// 去重，保留首次出现的值。
    Distinct(DistinctFactory<T>),
}

impl<T> Op<T> {
    pub fn new_filter(predicate: impl Fn(&T) -> bool + 'static) -> Op<T> {
        Op::Filter(Rc::new(predicate))
    }
    pub fn new_peek(action: impl Fn(&T) + 'static) -> Op<T> {
        Op::Peek(Rc::new(action))
    }
    pub fn new_limit(count: Integer) -> PipeRes<Op<T>> {
        if count < 0 { Err(PipeErr::negative_arg("limit", "count", count)) } else { Ok(Op::Limit(count)) }
    }
    pub fn new_skip(count: Integer) -> PipeRes<Op<T>> {
        if count < 0 { Err(PipeErr::negative_arg("skip", "count", count)) } else { Ok(Op::Skip(count)) }
    }
    pub fn new_take_while(predicate: impl Fn(&T) -> bool + 'static) -> Op<T> {
        Op::TakeWhile(Rc::new(predicate))
    }
    pub fn new_drop_while(predicate: impl Fn(&T) -> bool + 'static) -> Op<T> {
        Op::DropWhile(Rc::new(predicate))
    }
    pub fn new_distinct() -> Op<T>
    where
        T: Eq + Hash + Clone + 'static,
    {
        Op::Distinct(Rc::new(|| -> Box<dyn FnMut(&T) -> bool> {
            let mut seen: FxHashSet<T> = FxHashSet::default();
            Box::new(move |item: &T| seen.insert(item.clone()))
        }))
    }

    /// `Limit`的阈值，其他操作为`None`。
    pub fn limit(&self) -> Option<Integer> {
        if let Op::Limit(count) = self { Some(*count) } else { None }
    }

    /// `Skip`的阈值，其他操作为`None`。
    pub fn skip(&self) -> Option<Integer> {
        if let Op::Skip(count) = self { Some(*count) } else { None }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Op::Peek(_) => "peek",
            Op::Filter(_) => "filter",
            Op::Limit(_) => "limit",
            Op::Skip(_) => "skip",
            Op::TakeWhile(_) => "take_while",
            Op::DropWhile(_) => "drop_while",
            Op::Distinct(_) => "distinct",
        }
    }

    /// 以`next`为下游创建本操作的运行时节点。
    pub(crate) fn wrap<'a>(&self, next: BoxSink<'a, T>) -> BoxSink<'a, T>
    where
        T: 'a,
    {
        match self {
            Op::Peek(action) => Box::new(PeekSink { action: action.clone(), next }),
            Op::Filter(predicate) => Box::new(FilterSink { predicate: predicate.clone(), next }),
            Op::Limit(limit) => Box::new(LimitSink { limit: *limit, count: 0, next }),
            Op::Skip(skip) => Box::new(SkipSink { skip: *skip, count: 0, next }),
            Op::TakeWhile(predicate) => Box::new(TakeWhileSink { predicate: predicate.clone(), done: false, next }),
            Op::DropWhile(predicate) => {
                Box::new(DropWhileSink { predicate: predicate.clone(), dropping: true, next })
            }
            Op::Distinct(factory) => Box::new(DistinctSink { first_seen: factory(), next }),
        }
    }
}

impl<T> Clone for Op<T> {
    fn clone(&self) -> Self {
        match self {
            Op::Peek(action) => Op::Peek(action.clone()),
            Op::Filter(predicate) => Op::Filter(predicate.clone()),
            Op::Limit(count) => Op::Limit(*count),
            Op::Skip(count) => Op::Skip(*count),
            Op::TakeWhile(predicate) => Op::TakeWhile(predicate.clone()),
            Op::DropWhile(predicate) => Op::DropWhile(predicate.clone()),
            Op::Distinct(factory) => Op::Distinct(factory.clone()),
        }
    }
}

impl<T> PartialEq for Op<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Op::Peek(l), Op::Peek(r)) => Rc::ptr_eq(l, r),
            (Op::Filter(l), Op::Filter(r)) => Rc::ptr_eq(l, r),
            (Op::Limit(l), Op::Limit(r)) => l == r,
            (Op::Skip(l), Op::Skip(r)) => l == r,
            (Op::TakeWhile(l), Op::TakeWhile(r)) => Rc::ptr_eq(l, r),
            (Op::DropWhile(l), Op::DropWhile(r)) => Rc::ptr_eq(l, r),
            // 去重状态无参数
            (Op::Distinct(_), Op::Distinct(_)) => true,
            _ => false,
        }
    }
}

impl<T> Debug for Op<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Op::Limit(count) | Op::Skip(count) => write!(f, "{}({})", self.name(), count),
            _ => write!(f, "{}", self.name()),
        }
    }
}

/// 改变元素类型的中间操作。
pub enum Transform<S, T> {
    /// 把每个值映射为一个新值。
    Map(Mapper<S, T>),
    /// 把每个值展开为零到多个新值，按顺序传递。
    FlatMap(Expander<S, T>),
}

impl<S, T> Transform<S, T> {
    pub fn new_map(mapper: impl Fn(S) -> T + 'static) -> Transform<S, T> {
        Transform::Map(Rc::new(mapper))
    }
    pub fn new_flat_map<I>(expander: impl Fn(S) -> I + 'static) -> Transform<S, T>
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: 'static,
    {
        Transform::FlatMap(Rc::new(move |value| -> Box<dyn Iterator<Item = T>> {
            Box::new(expander(value).into_iter())
        }))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Transform::Map(_) => "map",
            Transform::FlatMap(_) => "flat_map",
        }
    }

    pub(crate) fn wrap<'a>(&self, next: BoxSink<'a, T>, configs: &[Config]) -> BoxSink<'a, S>
    where
        S: 'a,
        T: 'a,
    {
        match self {
            Transform::Map(mapper) => Box::new(MapSink { mapper: mapper.clone(), next }),
            Transform::FlatMap(expander) => {
                Box::new(FlatMapSink { expander: expander.clone(), drain: is_drain_flat_map(configs), next })
            }
        }
    }
}

impl<S, T> Clone for Transform<S, T> {
    fn clone(&self) -> Self {
        match self {
            Transform::Map(mapper) => Transform::Map(mapper.clone()),
            Transform::FlatMap(expander) => Transform::FlatMap(expander.clone()),
        }
    }
}

impl<S, T> PartialEq for Transform<S, T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Transform::Map(l), Transform::Map(r)) => Rc::ptr_eq(l, r),
            (Transform::FlatMap(l), Transform::FlatMap(r)) => Rc::ptr_eq(l, r),
            _ => false,
        }
    }
}

impl<S, T> Debug for Transform<S, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::Sink;
    use crate::sink::tests::Recorder;

    #[test]
    fn test_negative_threshold() {
        assert_eq!(
            Op::<i32>::new_limit(-1),
            Err(PipeErr::InvalidArg {
                op: "limit",
                arg: "count",
                arg_value: "-1".to_string(),
                error: "must be non-negative"
            })
        );
        assert!(matches!(Op::<i32>::new_skip(-5), Err(PipeErr::InvalidArg { op: "skip", .. })));
        assert_eq!(Op::<i32>::new_limit(0), Ok(Op::Limit(0)));
    }

    #[test]
    fn test_threshold_accessors() {
        assert_eq!(Op::<i32>::Limit(3).limit(), Some(3));
        assert_eq!(Op::<i32>::Limit(3).skip(), None);
        assert_eq!(Op::<i32>::Skip(4).skip(), Some(4));
        assert_eq!(Op::<i32>::Skip(4).limit(), None);
        assert_eq!(Op::<i32>::new_filter(|_| true).limit(), None);
        assert_eq!(Op::<i32>::new_peek(|_| {}).skip(), None);
    }

    #[test]
    fn test_equality() {
        let filter = Op::<i32>::new_filter(|v| *v > 0);
        assert_eq!(filter, filter.clone());
        assert_ne!(filter, Op::<i32>::new_filter(|v| *v > 0));
        assert_eq!(Op::<i32>::Limit(2), Op::Limit(2));
        assert_ne!(Op::<i32>::Limit(2), Op::Skip(2));
        assert_eq!(Op::<i32>::new_distinct(), Op::new_distinct());
        let map = Transform::<i32, i32>::new_map(|v| v + 1);
        assert_eq!(map, map.clone());
        assert_eq!(format!("{:?}", Op::<i32>::Skip(2)), "skip(2)");
        assert_eq!(format!("{:?}", map), "map");
    }

    #[test]
    fn test_wrap_distinct_uses_fresh_state() {
        let distinct = Op::<i32>::new_distinct();
        for _ in 0..2 {
            let mut recorder: Recorder<i32> = Recorder::new(usize::MAX);
            let mut sink = distinct.wrap(Box::new(&mut recorder));
            for v in [1, 2, 1, 3, 2] {
                sink.accept(v).unwrap();
            }
            drop(sink);
            assert_eq!(recorder.values, vec![1, 2, 3]);
        }
    }

    #[test]
    fn test_wrap_flat_map_honors_config() {
        let pulled = Rc::new(std::cell::Cell::new(0));
        let counter = pulled.clone();
        let flat_map = Transform::<i32, i32>::new_flat_map(move |v| {
            let counter = counter.clone();
            (0..v).inspect(move |_| counter.set(counter.get() + 1))
        });
        let mut recorder: Recorder<i32> = Recorder::new(2);
        let mut sink = flat_map.wrap(Box::new(&mut recorder), &[Config::DrainFlatMap]);
        sink.accept(4).unwrap();
        drop(sink);
        assert_eq!(recorder.values, vec![0, 1]);
        assert_eq!(pulled.get(), 4);
    }
}
