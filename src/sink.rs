use crate::op::{Action, Expander, Mapper, Predicate};
use crate::{Integer, PipeRes};

/// 接收被推送的值。
///
/// 数据源每推送一个值前检查[`Sink::is_finished`]，返回`true`后不应继续推送。
pub trait Sink<T> {
    fn accept(&mut self, value: T) -> PipeRes<()>;

    fn is_finished(&self) -> bool;

    fn close(&mut self) -> PipeRes<()>;
}

pub(crate) type BoxSink<'a, T> = Box<dyn Sink<T> + 'a>;

impl<T, S: Sink<T> + ?Sized> Sink<T> for &mut S {
    fn accept(&mut self, value: T) -> PipeRes<()> {
        (**self).accept(value)
    }

    fn is_finished(&self) -> bool {
        (**self).is_finished()
    }

    fn close(&mut self) -> PipeRes<()> {
        (**self).close()
    }
}

impl<T, S: Sink<T> + ?Sized> Sink<T> for Box<S> {
    fn accept(&mut self, value: T) -> PipeRes<()> {
        (**self).accept(value)
    }

    fn is_finished(&self) -> bool {
        (**self).is_finished()
    }

    fn close(&mut self) -> PipeRes<()> {
        (**self).close()
    }
}

/// 中间节点自身不持有资源，结束状态和关闭都委托给下游。
macro_rules! delegate_to_next {
    () => {
        fn is_finished(&self) -> bool {
            self.next.is_finished()
        }

        fn close(&mut self) -> PipeRes<()> {
            self.next.close()
        }
    };
}

pub(crate) struct FilterSink<'a, T> {
    pub(crate) predicate: Predicate<T>,
    pub(crate) next: BoxSink<'a, T>,
}

impl<T> Sink<T> for FilterSink<'_, T> {
    fn accept(&mut self, value: T) -> PipeRes<()> {
        if (self.predicate)(&value) { self.next.accept(value) } else { Ok(()) }
    }

    delegate_to_next!();
}

pub(crate) struct MapSink<'a, S, T> {
    pub(crate) mapper: Mapper<S, T>,
    pub(crate) next: BoxSink<'a, T>,
}

impl<S, T> Sink<S> for MapSink<'_, S, T> {
    fn accept(&mut self, value: S) -> PipeRes<()> {
        self.next.accept((self.mapper)(value))
    }

    delegate_to_next!();
}

pub(crate) struct FlatMapSink<'a, S, T> {
    pub(crate) expander: Expander<S, T>,
    /// 下游结束后是否继续消费子序列，消费的值不再传递
    pub(crate) drain: bool,
    pub(crate) next: BoxSink<'a, T>,
}

impl<S, T> Sink<S> for FlatMapSink<'_, S, T> {
    fn accept(&mut self, value: S) -> PipeRes<()> {
        for item in (self.expander)(value) {
            if self.next.is_finished() {
                if self.drain {
                    continue;
                }
                break;
            }
            self.next.accept(item)?;
        }
        Ok(())
    }

    delegate_to_next!();
}

pub(crate) struct PeekSink<'a, T> {
    pub(crate) action: Action<T>,
    pub(crate) next: BoxSink<'a, T>,
}

impl<T> Sink<T> for PeekSink<'_, T> {
    fn accept(&mut self, value: T) -> PipeRes<()> {
        (self.action)(&value);
        self.next.accept(value)
    }

    delegate_to_next!();
}

pub(crate) struct LimitSink<'a, T> {
    pub(crate) limit: Integer,
    pub(crate) count: Integer,
    pub(crate) next: BoxSink<'a, T>,
}

impl<T> Sink<T> for LimitSink<'_, T> {
    fn accept(&mut self, value: T) -> PipeRes<()> {
        let res = self.next.accept(value);
        self.count = self.count.saturating_add(1);
        res
    }

    fn is_finished(&self) -> bool {
        self.count >= self.limit || self.next.is_finished()
    }

    fn close(&mut self) -> PipeRes<()> {
        self.next.close()
    }
}

pub(crate) struct SkipSink<'a, T> {
    pub(crate) skip: Integer,
    pub(crate) count: Integer,
    pub(crate) next: BoxSink<'a, T>,
}

impl<T> Sink<T> for SkipSink<'_, T> {
    fn accept(&mut self, value: T) -> PipeRes<()> {
        self.count = self.count.saturating_add(1);
        if self.count > self.skip { self.next.accept(value) } else { Ok(()) }
    }

    delegate_to_next!();
}

pub(crate) struct TakeWhileSink<'a, T> {
    pub(crate) predicate: Predicate<T>,
    pub(crate) done: bool,
    pub(crate) next: BoxSink<'a, T>,
}

impl<T> Sink<T> for TakeWhileSink<'_, T> {
    fn accept(&mut self, value: T) -> PipeRes<()> {
        if self.done {
            return Ok(());
        }
        if (self.predicate)(&value) {
            self.next.accept(value)
        } else {
            self.done = true;
            Ok(())
        }
    }

    fn is_finished(&self) -> bool {
        self.done || self.next.is_finished()
    }

    fn close(&mut self) -> PipeRes<()> {
        self.next.close()
    }
}

pub(crate) struct DropWhileSink<'a, T> {
    pub(crate) predicate: Predicate<T>,
    pub(crate) dropping: bool,
    pub(crate) next: BoxSink<'a, T>,
}

impl<T> Sink<T> for DropWhileSink<'_, T> {
    fn accept(&mut self, value: T) -> PipeRes<()> {
        if self.dropping && (self.predicate)(&value) {
            return Ok(());
        }
        self.dropping = false;
        self.next.accept(value)
    }

    delegate_to_next!();
}

pub(crate) struct DistinctSink<'a, T> {
    /// 首次出现时返回`true`，状态只在本次执行内有效
    pub(crate) first_seen: Box<dyn FnMut(&T) -> bool>,
    pub(crate) next: BoxSink<'a, T>,
}

impl<T> Sink<T> for DistinctSink<'_, T> {
    fn accept(&mut self, value: T) -> PipeRes<()> {
        if (self.first_seen)(&value) { self.next.accept(value) } else { Ok(()) }
    }

    delegate_to_next!();
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::rc::Rc;

    /// 记录收到的值，达到`capacity`后结束。
    pub(crate) struct Recorder<T> {
        pub(crate) values: Vec<T>,
        pub(crate) capacity: usize,
        pub(crate) closed: usize,
    }

    impl<T> Recorder<T> {
        pub(crate) fn new(capacity: usize) -> Recorder<T> {
            Recorder { values: Vec::new(), capacity, closed: 0 }
        }
    }

    impl<T> Sink<T> for Recorder<T> {
        fn accept(&mut self, value: T) -> PipeRes<()> {
            self.values.push(value);
            Ok(())
        }

        fn is_finished(&self) -> bool {
            self.values.len() >= self.capacity
        }

        fn close(&mut self) -> PipeRes<()> {
            self.closed += 1;
            Ok(())
        }
    }

    #[test]
    fn test_filter_sink() {
        let mut recorder: Recorder<i32> = Recorder::new(usize::MAX);
        let mut sink: FilterSink<'_, i32> = FilterSink { predicate: Rc::new(|v: &i32| v % 2 == 0), next: Box::new(&mut recorder) };
        for v in 1..=6 {
            sink.accept(v).unwrap();
        }
        sink.close().unwrap();
        drop(sink);
        assert_eq!(recorder.values, vec![2, 4, 6]);
        assert_eq!(recorder.closed, 1);
    }

    #[test]
    fn test_limit_sink_counts_the_finishing_value() {
        let mut recorder: Recorder<i32> = Recorder::new(usize::MAX);
        let mut sink: LimitSink<'_, i32> = LimitSink { limit: 2, count: 0, next: Box::new(&mut recorder) };
        assert!(!sink.is_finished());
        sink.accept(1).unwrap();
        assert!(!sink.is_finished());
        sink.accept(2).unwrap();
        assert!(sink.is_finished());
        assert_eq!(sink.count, 2);
    }

    #[test]
    fn test_limit_sink_finished_by_downstream() {
        let mut recorder: Recorder<i32> = Recorder::new(1);
        let mut sink: LimitSink<'_, i32> = LimitSink { limit: 10, count: 0, next: Box::new(&mut recorder) };
        sink.accept(1).unwrap();
        assert!(sink.is_finished());
    }

    #[test]
    fn test_skip_sink() {
        let mut recorder: Recorder<i32> = Recorder::new(usize::MAX);
        let mut sink: SkipSink<'_, i32> = SkipSink { skip: 2, count: 0, next: Box::new(&mut recorder) };
        for v in 1..=5 {
            sink.accept(v).unwrap();
        }
        drop(sink);
        assert_eq!(recorder.values, vec![3, 4, 5]);
    }

    #[test]
    fn test_flat_map_sink_stops_when_downstream_finished() {
        let mut recorder: Recorder<i32> = Recorder::new(3);
        let expanded = Rc::new(std::cell::Cell::new(0));
        let counter = expanded.clone();
        let expander: Expander<i32, i32> = Rc::new(move |v| {
            let counter = counter.clone();
            Box::new((0..v).inspect(move |_| counter.set(counter.get() + 1))) as Box<dyn Iterator<Item = i32>>
        });
        let mut sink: FlatMapSink<'_, i32, i32> = FlatMapSink { expander, drain: false, next: Box::new(&mut recorder) };
        sink.accept(10).unwrap();
        drop(sink);
        assert_eq!(recorder.values, vec![0, 1, 2]);
        assert_eq!(expanded.get(), 4);
    }

    #[test]
    fn test_flat_map_sink_drains_without_forwarding() {
        let mut recorder: Recorder<i32> = Recorder::new(3);
        let expanded = Rc::new(std::cell::Cell::new(0));
        let counter = expanded.clone();
        let expander: Expander<i32, i32> = Rc::new(move |v| {
            let counter = counter.clone();
            Box::new((0..v).inspect(move |_| counter.set(counter.get() + 1))) as Box<dyn Iterator<Item = i32>>
        });
        let mut sink: FlatMapSink<'_, i32, i32> = FlatMapSink { expander, drain: true, next: Box::new(&mut recorder) };
        sink.accept(5).unwrap();
        drop(sink);
        assert_eq!(recorder.values, vec![0, 1, 2]);
        assert_eq!(expanded.get(), 5);
    }

    #[test]
    fn test_take_while_and_drop_while_sinks() {
        let mut taken: Recorder<i32> = Recorder::new(usize::MAX);
        let mut take: TakeWhileSink<'_, i32> = TakeWhileSink { predicate: Rc::new(|v: &i32| *v < 3), done: false, next: Box::new(&mut taken) };
        for v in [1, 2, 3, 1] {
            take.accept(v).unwrap();
        }
        assert!(take.is_finished());
        drop(take);
        assert_eq!(taken.values, vec![1, 2]);

        let mut dropped: Recorder<i32> = Recorder::new(usize::MAX);
        let mut drop_while: DropWhileSink<'_, i32> =
            DropWhileSink { predicate: Rc::new(|v: &i32| *v < 3), dropping: true, next: Box::new(&mut dropped) };
        for v in [1, 2, 3, 1] {
            drop_while.accept(v).unwrap();
        }
        drop(drop_while);
        assert_eq!(dropped.values, vec![3, 1]);
    }
}
