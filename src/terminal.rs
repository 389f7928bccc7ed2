use crate::PipeRes;
use crate::closeable::Closeables;
use crate::collector::Collector;
use crate::err::PipeErr;
use crate::sink::Sink;
use std::cmp::Ordering;
use std::marker::PhantomData;

/// 链尾节点：持有关闭动作登记表并累积结果。
///
/// 一次执行内先关闭，再调用[`Terminal::result`]读取结果。
pub trait Terminal<T>: Sink<T> {
    type Output;

    fn name(&self) -> &'static str;

    fn result(self) -> Self::Output;
}

/// 开启到关闭的单向状态，保证登记表只被执行一次。
#[derive(Debug, Default)]
pub struct CloseOnce {
    closeables: Closeables,
    closed: bool,
}

impl CloseOnce {
    pub fn new(closeables: Closeables) -> CloseOnce {
        CloseOnce { closeables, closed: false }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn close(&mut self) -> PipeRes<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.closeables.close()
    }
}

macro_rules! close_once {
    () => {
        fn close(&mut self) -> PipeRes<()> {
            self.closer.close()
        }
    };
}

pub struct CountSink {
    count: usize,
    closer: CloseOnce,
}

impl CountSink {
    pub fn new(closeables: Closeables) -> CountSink {
        CountSink { count: 0, closer: CloseOnce::new(closeables) }
    }
}

impl<T> Sink<T> for CountSink {
    fn accept(&mut self, _value: T) -> PipeRes<()> {
        self.count += 1;
        Ok(())
    }

    fn is_finished(&self) -> bool {
        false
    }

    close_once!();
}

impl<T> Terminal<T> for CountSink {
    type Output = usize;

    fn name(&self) -> &'static str {
        "count"
    }

    fn result(self) -> usize {
        self.count
    }
}

pub struct ForEachSink<F> {
    action: F,
    closer: CloseOnce,
}

impl<F> ForEachSink<F> {
    pub fn new(action: F, closeables: Closeables) -> ForEachSink<F> {
        ForEachSink { action, closer: CloseOnce::new(closeables) }
    }
}

impl<T, F: FnMut(T)> Sink<T> for ForEachSink<F> {
    fn accept(&mut self, value: T) -> PipeRes<()> {
        (self.action)(value);
        Ok(())
    }

    fn is_finished(&self) -> bool {
        false
    }

    close_once!();
}

impl<T, F: FnMut(T)> Terminal<T> for ForEachSink<F> {
    type Output = ();

    fn name(&self) -> &'static str {
        "for_each"
    }

    fn result(self) {}
}

/// 记录第一个值。
///
/// 自身不结束，由前置的`limit(1)`通知数据源停止；收到第二个值说明数据源违反了约定。
pub struct FindFirstSink<T> {
    value: Option<T>,
    closer: CloseOnce,
}

impl<T> FindFirstSink<T> {
    pub fn new(closeables: Closeables) -> FindFirstSink<T> {
        FindFirstSink { value: None, closer: CloseOnce::new(closeables) }
    }
}

impl<T> Sink<T> for FindFirstSink<T> {
    fn accept(&mut self, value: T) -> PipeRes<()> {
        if self.value.is_some() {
            return Err(PipeErr::protocol("find_first", "duplicate find"));
        }
        self.value = Some(value);
        Ok(())
    }

    fn is_finished(&self) -> bool {
        false
    }

    close_once!();
}

impl<T> Terminal<T> for FindFirstSink<T> {
    type Output = Option<T>;

    fn name(&self) -> &'static str {
        "find_first"
    }

    fn result(self) -> Option<T> {
        self.value
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MatchKind {
    Any,
    All,
    None,
}

pub struct MatchSink<P> {
    kind: MatchKind,
    predicate: P,
    /// any：是否已匹配；all/none：是否仍成立
    flag: bool,
    closer: CloseOnce,
}

impl<P> MatchSink<P> {
    pub fn new(kind: MatchKind, predicate: P, closeables: Closeables) -> MatchSink<P> {
        let flag = kind != MatchKind::Any;
        MatchSink { kind, predicate, flag, closer: CloseOnce::new(closeables) }
    }
}

impl<T, P: FnMut(&T) -> bool> Sink<T> for MatchSink<P> {
    fn accept(&mut self, value: T) -> PipeRes<()> {
        let matched = (self.predicate)(&value);
        match self.kind {
            MatchKind::Any if matched => {
                if self.flag {
                    return Err(PipeErr::protocol("any_match", "second match after the result was decided"));
                }
                self.flag = true;
            }
            MatchKind::All if !matched => {
                if !self.flag {
                    return Err(PipeErr::protocol("all_match", "second mismatch after the result was decided"));
                }
                self.flag = false;
            }
            MatchKind::None if matched => {
                if !self.flag {
                    return Err(PipeErr::protocol("none_match", "second match after the result was decided"));
                }
                self.flag = false;
            }
            _ => {}
        }
        Ok(())
    }

    fn is_finished(&self) -> bool {
        match self.kind {
            MatchKind::Any => self.flag,
            MatchKind::All | MatchKind::None => !self.flag,
        }
    }

    close_once!();
}

impl<T, P: FnMut(&T) -> bool> Terminal<T> for MatchSink<P> {
    type Output = bool;

    fn name(&self) -> &'static str {
        match self.kind {
            MatchKind::Any => "any_match",
            MatchKind::All => "all_match",
            MatchKind::None => "none_match",
        }
    }

    fn result(self) -> bool {
        self.flag
    }
}

/// 按比较器保留最小值或最大值。
///
/// 相等时最小值保留先出现的值，最大值保留后出现的值，与`Iterator::min_by`/`max_by`一致。
pub struct ExtremumSink<T, C> {
    max: bool,
    compare: C,
    best: Option<T>,
    closer: CloseOnce,
}

impl<T, C> ExtremumSink<T, C> {
    pub fn min(compare: C, closeables: Closeables) -> ExtremumSink<T, C> {
        ExtremumSink { max: false, compare, best: None, closer: CloseOnce::new(closeables) }
    }

    pub fn max(compare: C, closeables: Closeables) -> ExtremumSink<T, C> {
        ExtremumSink { max: true, compare, best: None, closer: CloseOnce::new(closeables) }
    }
}

impl<T, C: FnMut(&T, &T) -> Ordering> Sink<T> for ExtremumSink<T, C> {
    fn accept(&mut self, value: T) -> PipeRes<()> {
        let replace = match &self.best {
            None => true,
            Some(best) => {
                let ordering = (self.compare)(&value, best);
                if self.max { ordering != Ordering::Less } else { ordering == Ordering::Less }
            }
        };
        if replace {
            self.best = Some(value);
        }
        Ok(())
    }

    fn is_finished(&self) -> bool {
        false
    }

    close_once!();
}

impl<T, C: FnMut(&T, &T) -> Ordering> Terminal<T> for ExtremumSink<T, C> {
    type Output = Option<T>;

    fn name(&self) -> &'static str {
        if self.max { "max" } else { "min" }
    }

    fn result(self) -> Option<T> {
        self.best
    }
}

/// 无初始值的归约，第一个值作为初始累积值。
pub struct ReduceSink<T, F> {
    reducer: F,
    acc: Option<T>,
    closer: CloseOnce,
}

impl<T, F> ReduceSink<T, F> {
    pub fn new(reducer: F, closeables: Closeables) -> ReduceSink<T, F> {
        ReduceSink { reducer, acc: None, closer: CloseOnce::new(closeables) }
    }
}

impl<T, F: FnMut(T, T) -> T> Sink<T> for ReduceSink<T, F> {
    fn accept(&mut self, value: T) -> PipeRes<()> {
        self.acc = Some(match self.acc.take() {
            Some(acc) => (self.reducer)(acc, value),
            None => value,
        });
        Ok(())
    }

    fn is_finished(&self) -> bool {
        false
    }

    close_once!();
}

impl<T, F: FnMut(T, T) -> T> Terminal<T> for ReduceSink<T, F> {
    type Output = Option<T>;

    fn name(&self) -> &'static str {
        "reduce"
    }

    fn result(self) -> Option<T> {
        self.acc
    }
}

/// 带初始值的归约。
pub struct FoldSink<U, F> {
    folder: F,
    /// 只在`folder`执行期间被取出，`folder`展开后保持为空
    acc: Option<U>,
    closer: CloseOnce,
}

impl<U, F> FoldSink<U, F> {
    pub fn new(seed: U, folder: F, closeables: Closeables) -> FoldSink<U, F> {
        FoldSink { folder, acc: Some(seed), closer: CloseOnce::new(closeables) }
    }
}

impl<T, U, F: FnMut(U, T) -> U> Sink<T> for FoldSink<U, F> {
    fn accept(&mut self, value: T) -> PipeRes<()> {
        if let Some(acc) = self.acc.take() {
            self.acc = Some((self.folder)(acc, value));
        }
        Ok(())
    }

    fn is_finished(&self) -> bool {
        false
    }

    close_once!();
}

impl<T, U, F: FnMut(U, T) -> U> Terminal<T> for FoldSink<U, F> {
    /// `folder`展开后累积值丢失时为`None`
    type Output = Option<U>;

    fn name(&self) -> &'static str {
        "fold"
    }

    fn result(self) -> Option<U> {
        self.acc
    }
}

pub struct CollectSink<T, C: Collector<T>> {
    collector: C,
    acc: C::Acc,
    closer: CloseOnce,
    _marker: PhantomData<fn(T)>,
}

impl<T, C: Collector<T>> CollectSink<T, C> {
    pub fn new(collector: C, closeables: Closeables) -> CollectSink<T, C> {
        let acc = collector.supply();
        CollectSink { collector, acc, closer: CloseOnce::new(closeables), _marker: PhantomData }
    }
}

impl<T, C: Collector<T>> Sink<T> for CollectSink<T, C> {
    fn accept(&mut self, value: T) -> PipeRes<()> {
        self.collector.accumulate(&mut self.acc, value);
        Ok(())
    }

    fn is_finished(&self) -> bool {
        false
    }

    close_once!();
}

impl<T, C: Collector<T>> Terminal<T> for CollectSink<T, C> {
    type Output = C::Output;

    fn name(&self) -> &'static str {
        "collect"
    }

    fn result(self) -> C::Output {
        self.collector.finish(self.acc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::ToVec;
    use std::cell::Cell;
    use std::rc::Rc;

    fn push_all<T, K: Terminal<T>>(mut terminal: K, values: impl IntoIterator<Item = T>) -> PipeRes<K::Output> {
        for value in values {
            terminal.accept(value)?;
        }
        terminal.close()?;
        Ok(terminal.result())
    }

    #[test]
    fn test_count() {
        assert_eq!(push_all(CountSink::new(Closeables::empty()), [1, 2, 3]), Ok(3));
        assert_eq!(push_all(CountSink::new(Closeables::empty()), Vec::<i32>::new()), Ok(0));
    }

    #[test]
    fn test_find_first_duplicate() {
        let mut sink = FindFirstSink::new(Closeables::empty());
        sink.accept(1).unwrap();
        assert!(!Sink::<i32>::is_finished(&sink));
        let err = sink.accept(2).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(sink.result(), Some(1));
    }

    #[test]
    fn test_any_match_second_true_is_violation() {
        let mut sink = MatchSink::new(MatchKind::Any, |v: &bool| *v, Closeables::empty());
        sink.accept(false).unwrap();
        assert!(!Sink::<bool>::is_finished(&sink));
        sink.accept(true).unwrap();
        assert!(Sink::<bool>::is_finished(&sink));
        assert_eq!(sink.accept(true), Err(PipeErr::protocol("any_match", "second match after the result was decided")));
    }

    #[test]
    fn test_all_and_none_match() {
        let mut all = MatchSink::new(MatchKind::All, |v: &i32| *v > 0, Closeables::empty());
        all.accept(1).unwrap();
        assert!(!Sink::<i32>::is_finished(&all));
        all.accept(-1).unwrap();
        assert!(Sink::<i32>::is_finished(&all));
        assert!(all.accept(-2).unwrap_err().is_fatal());
        assert!(!Terminal::<i32>::result(all));

        let mut none = MatchSink::new(MatchKind::None, |v: &i32| *v > 0, Closeables::empty());
        none.accept(-1).unwrap();
        none.accept(1).unwrap();
        assert!(none.accept(2).unwrap_err().is_fatal());

        assert_eq!(push_all(MatchSink::new(MatchKind::All, |v: &i32| *v > 0, Closeables::empty()), [1, 2]), Ok(true));
        assert_eq!(push_all(MatchSink::new(MatchKind::None, |v: &i32| *v > 5, Closeables::empty()), [1, 2]), Ok(true));
        assert_eq!(push_all(MatchSink::new(MatchKind::Any, |v: &i32| *v > 5, Closeables::empty()), [1, 2]), Ok(false));
    }

    #[test]
    fn test_extremum_ties() {
        let by_key = |l: &(i32, char), r: &(i32, char)| l.0.cmp(&r.0);
        let values = [(1, 'a'), (0, 'b'), (0, 'c'), (2, 'd'), (2, 'e')];
        assert_eq!(push_all(ExtremumSink::min(by_key, Closeables::empty()), values), Ok(Some((0, 'b'))));
        assert_eq!(push_all(ExtremumSink::max(by_key, Closeables::empty()), values), Ok(Some((2, 'e'))));
        assert_eq!(push_all(ExtremumSink::min(i32::cmp, Closeables::empty()), Vec::<i32>::new()), Ok(None));
    }

    #[test]
    fn test_reduce_and_fold() {
        assert_eq!(push_all(ReduceSink::new(|a: i32, b: i32| a + b, Closeables::empty()), [1, 2, 3]), Ok(Some(6)));
        assert_eq!(push_all(ReduceSink::new(|a: i32, b: i32| a + b, Closeables::empty()), Vec::new()), Ok(None));
        assert_eq!(push_all(FoldSink::new(10, |a: i32, b: i32| a + b, Closeables::empty()), [1, 2, 3]), Ok(Some(16)));
        assert_eq!(push_all(FoldSink::new(10, |a: i32, b: i32| a + b, Closeables::empty()), Vec::new()), Ok(Some(10)));
    }

    #[test]
    fn test_fold_after_panicking_folder() {
        let mut sink = FoldSink::new(0, |a: i32, b: i32| if b == 2 { panic!("bad value") } else { a + b }, Closeables::empty());
        sink.accept(1).unwrap();
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| sink.accept(2)));
        assert!(res.is_err());
        sink.accept(3).unwrap();
        assert_eq!(Terminal::<i32>::result(sink), None);
    }

    #[test]
    fn test_collect() {
        assert_eq!(push_all(CollectSink::new(ToVec, Closeables::empty()), [3, 2, 1]), Ok(vec![3, 2, 1]));
    }

    #[test]
    fn test_close_drains_registry_once() {
        let count = Rc::new(Cell::new(0));
        let cloned = count.clone();
        let closeables = Closeables::empty().add(move || {
            cloned.set(cloned.get() + 1);
            Ok(())
        });
        let mut sink = CountSink::new(closeables);
        Sink::<i32>::close(&mut sink).unwrap();
        Sink::<i32>::close(&mut sink).unwrap();
        assert_eq!(count.get(), 1);
        assert!(sink.closer.is_closed());
    }
}
