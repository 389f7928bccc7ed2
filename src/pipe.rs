use crate::closeable::Closeables;
use crate::collector::{Collector, ToVec};
use crate::config::{Config, is_verbose};
use crate::err::PipeErr;
use crate::input::{Source, push_iter};
use crate::op::{Op, Transform};
use crate::sink::{BoxSink, Sink};
use crate::terminal::{
    CollectSink, CountSink, ExtremumSink, FindFirstSink, FoldSink, ForEachSink, MatchKind, MatchSink, ReduceSink,
    Terminal,
};
use crate::{Integer, PipeRes, UNBOUNDED};
use itertools::Itertools;
use std::cmp::Ordering;
use std::hash::Hash;
use std::rc::Rc;
use tracing::{debug, info, trace, warn};

/// 流水线上游：把值推送给下游节点。
pub(crate) trait Upstream<T> {
    fn push_into(&self, sink: &mut dyn Sink<T>, configs: &[Config]) -> PipeRes<()>;

    fn describe(&self, chain: &mut Vec<String>);
}

struct SourceNode<T> {
    source: Rc<dyn Source<T>>,
}

impl<T> Upstream<T> for SourceNode<T> {
    fn push_into(&self, sink: &mut dyn Sink<T>, _configs: &[Config]) -> PipeRes<()> {
        self.source.push(sink)
    }

    fn describe(&self, chain: &mut Vec<String>) {
        chain.push("source".to_string());
    }
}

struct TransformNode<S, T> {
    parent: Pipe<S>,
    transform: Transform<S, T>,
}

impl<S: 'static, T: 'static> Upstream<T> for TransformNode<S, T> {
    fn push_into(&self, sink: &mut dyn Sink<T>, configs: &[Config]) -> PipeRes<()> {
        let mut head = self.transform.wrap(Box::new(sink), configs);
        self.parent.push_into(&mut *head, configs)
    }

    fn describe(&self, chain: &mut Vec<String>) {
        self.parent.describe_into(chain);
        chain.push(self.transform.name().to_string());
    }
}

/// 排序需要全部值：先把上游完整收集，排序后作为新的数据源重新推送。
struct SortedNode<T> {
    parent: Pipe<T>,
    compare: Rc<dyn Fn(&T, &T) -> Ordering>,
}

impl<T: 'static> Upstream<T> for SortedNode<T> {
    fn push_into(&self, sink: &mut dyn Sink<T>, configs: &[Config]) -> PipeRes<()> {
        let mut buffer: CollectSink<T, ToVec> = CollectSink::new(ToVec, Closeables::empty());
        self.parent.push_into(&mut buffer, configs)?;
        let values: Vec<T> = buffer.result();
        push_iter(values.into_iter().sorted_by(|l, r| (self.compare)(l, r)), sink)
    }

    fn describe(&self, chain: &mut Vec<String>) {
        self.parent.describe_into(chain);
        chain.push("sorted".to_string());
    }
}

/// 持有链头的作用域，正常返回、出错和展开时都只关闭一次。
///
/// 关闭沿链头经过各个中间节点传递到链尾。
struct CloseScope<'a, T> {
    head: BoxSink<'a, T>,
    closed: bool,
}

impl<'a, T> CloseScope<'a, T> {
    fn new(head: BoxSink<'a, T>) -> CloseScope<'a, T> {
        CloseScope { head, closed: false }
    }

    fn head(&mut self) -> &mut dyn Sink<T> {
        &mut *self.head
    }

    fn close(&mut self) -> PipeRes<()> {
        self.closed = true;
        self.head.close()
    }
}

impl<T> Drop for CloseScope<'_, T> {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            if let Err(err) = self.head.close() {
                warn!(error = %err, "close pipe while unwinding failed");
            }
        }
    }
}

/// 惰性流水线。
///
/// 中间操作只记录描述，不执行；每次调用终止操作时重新构建处理链并由数据源推送值。
/// 值不可变，追加操作返回新的流水线，原流水线可继续使用。
pub struct Pipe<T> {
    base: Rc<dyn Upstream<T>>,
    /// `base`之后的同类型操作，按追加顺序
    ops: Rc<[Op<T>]>,
    closeables: Closeables,
    configs: Rc<[Config]>,
}

impl<T> Clone for Pipe<T> {
    fn clone(&self) -> Self {
        Pipe {
            base: self.base.clone(),
            ops: self.ops.clone(),
            closeables: self.closeables.clone(),
            configs: self.configs.clone(),
        }
    }
}

impl<T: 'static> Pipe<T> {
    pub fn from_source(source: impl Source<T> + 'static) -> Pipe<T> {
        Pipe {
            base: Rc::new(SourceNode { source: Rc::new(source) }),
            ops: Rc::new([]),
            closeables: Closeables::empty(),
            configs: Rc::new([]),
        }
    }

    fn rebase<U>(&self, base: Rc<dyn Upstream<U>>) -> Pipe<U> {
        Pipe { base, ops: Rc::new([]), closeables: self.closeables.clone(), configs: self.configs.clone() }
    }

    fn with_op(&self, op: Op<T>) -> Pipe<T> {
        Pipe { ops: self.ops.iter().cloned().chain(std::iter::once(op)).collect(), ..self.clone() }
    }

    fn replace_last_op(&self, op: Op<T>) -> Pipe<T> {
        let kept = self.ops.len().saturating_sub(1);
        Pipe { ops: self.ops[..kept].iter().cloned().chain(std::iter::once(op)).collect(), ..self.clone() }
    }

    /* **************************************** 中间操作 **************************************** */

    pub fn filter(&self, predicate: impl Fn(&T) -> bool + 'static) -> Pipe<T> {
        self.with_op(Op::new_filter(predicate))
    }

    pub fn peek(&self, action: impl Fn(&T) + 'static) -> Pipe<T> {
        self.with_op(Op::new_peek(action))
    }

    pub fn map<U: 'static>(&self, mapper: impl Fn(T) -> U + 'static) -> Pipe<U> {
        self.transform(Transform::new_map(mapper))
    }

    pub fn flat_map<U, I, F>(&self, expander: F) -> Pipe<U>
    where
        U: 'static,
        I: IntoIterator<Item = U>,
        I::IntoIter: 'static,
        F: Fn(T) -> I + 'static,
    {
        self.transform(Transform::new_flat_map(expander))
    }

    pub fn transform<U: 'static>(&self, transform: Transform<T, U>) -> Pipe<U> {
        self.rebase(Rc::new(TransformNode { parent: self.clone(), transform }))
    }

    /// 最多保留前`count`个值。
    ///
    /// 紧邻的`limit`合并为较小值，`limit(UNBOUNDED)`不追加任何操作。
    pub fn limit(&self, count: Integer) -> PipeRes<Pipe<T>> {
        Op::<T>::new_limit(count)?;
        Ok(self.append_limit(count))
    }

    fn append_limit(&self, count: Integer) -> Pipe<T> {
        if count == UNBOUNDED {
            trace!("drop unbounded limit");
            return self.clone();
        }
        match self.ops.last().and_then(Op::limit) {
            Some(prev) => {
                trace!(prev, count, "fuse adjacent limit");
                self.replace_last_op(Op::Limit(prev.min(count)))
            }
            None => self.with_op(Op::Limit(count)),
        }
    }

    /// 丢弃前`count`个值。
    ///
    /// 紧邻的`skip`合并为两者之和，溢出时报错；`skip(0)`不追加任何操作。
    pub fn skip(&self, count: Integer) -> PipeRes<Pipe<T>> {
        Op::<T>::new_skip(count)?;
        if count == 0 {
            trace!("drop zero skip");
            return Ok(self.clone());
        }
        match self.ops.last().and_then(Op::skip) {
            Some(prev) => {
                let fused = prev.checked_add(count).ok_or_else(|| PipeErr::InvalidArg {
                    op: "skip",
                    arg: "count",
                    arg_value: count.to_string(),
                    error: "sum with the adjacent skip overflows",
                })?;
                trace!(prev, count, fused, "fuse adjacent skip");
                Ok(self.replace_last_op(Op::Skip(fused)))
            }
            None => Ok(self.with_op(Op::Skip(count))),
        }
    }

    pub fn take_while(&self, predicate: impl Fn(&T) -> bool + 'static) -> Pipe<T> {
        self.with_op(Op::new_take_while(predicate))
    }

    pub fn drop_while(&self, predicate: impl Fn(&T) -> bool + 'static) -> Pipe<T> {
        self.with_op(Op::new_drop_while(predicate))
    }

    pub fn distinct(&self) -> Pipe<T>
    where
        T: Eq + Hash + Clone,
    {
        self.with_op(Op::new_distinct())
    }

    pub fn sorted(&self) -> Pipe<T>
    where
        T: Ord,
    {
        self.sorted_by(Ord::cmp)
    }

    /// 稳定排序，相等的值保持原有顺序。
    pub fn sorted_by(&self, compare: impl Fn(&T, &T) -> Ordering + 'static) -> Pipe<T> {
        self.rebase(Rc::new(SortedNode { parent: self.clone(), compare: Rc::new(compare) }))
    }

    pub fn sorted_by_key<K: Ord>(&self, key: impl Fn(&T) -> K + 'static) -> Pipe<T> {
        self.sorted_by(move |l, r| key(l).cmp(&key(r)))
    }

    /// 总是顺序执行。
    pub fn sequential(&self) -> Pipe<T> {
        self.clone()
    }

    /// 顺序总是保持。
    pub fn unordered(&self) -> Pipe<T> {
        self.clone()
    }

    pub fn is_parallel(&self) -> bool {
        false
    }

    /* **************************************** 资源 **************************************** */

    /// 登记关闭动作，每次终止操作结束时按登记顺序执行。
    pub fn on_close(&self, action: impl Fn() -> PipeRes<()> + 'static) -> Pipe<T> {
        Pipe { closeables: self.closeables.add(action), ..self.clone() }
    }

    /// 立即执行全部关闭动作。
    pub fn close(&self) -> PipeRes<()> {
        self.closeables.close()
    }

    pub fn with_config(&self, configs: impl IntoIterator<Item = Config>) -> Pipe<T> {
        Pipe { configs: configs.into_iter().collect(), ..self.clone() }
    }

    pub fn ops(&self) -> &[Op<T>] {
        &self.ops
    }

    pub fn closeables(&self) -> &Closeables {
        &self.closeables
    }

    pub fn configs(&self) -> &[Config] {
        &self.configs
    }

    /// 处理链描述，例如`source -> filter -> map -> limit(3)`。
    pub fn describe(&self) -> String {
        let mut chain = Vec::new();
        self.describe_into(&mut chain);
        chain.iter().join(" -> ")
    }

    fn describe_into(&self, chain: &mut Vec<String>) {
        self.base.describe(chain);
        chain.extend(self.ops.iter().map(|op| format!("{:?}", op)));
    }

    /// 从最后一个操作开始逐个包装下游，得到链头。
    fn assemble<'a>(&self, tail: BoxSink<'a, T>) -> BoxSink<'a, T> {
        self.ops.iter().rfold(tail, |next, op| op.wrap(next))
    }

    fn push_into(&self, sink: &mut dyn Sink<T>, configs: &[Config]) -> PipeRes<()> {
        let mut head = self.assemble(Box::new(sink));
        self.base.push_into(&mut *head, configs)
    }

    /* **************************************** 终止操作 **************************************** */

    /// 以`terminal`为链尾执行一次流水线。
    ///
    /// 无论数据源正常结束、提前结束还是出错，都会经链头关闭整条处理链；之后读取结果。
    /// 数据源出错且关闭也出错时，返回数据源的错误并附加关闭错误。
    pub fn evaluate<K: Terminal<T>>(&self, mut terminal: K) -> PipeRes<K::Output> {
        let name = terminal.name();
        if is_verbose(&self.configs) {
            info!(terminal = name, chain = %self.describe(), "evaluate pipe");
        } else {
            debug!(terminal = name, ops = self.ops.len(), "evaluate pipe");
        }
        let mut scope = CloseScope::new(self.assemble(Box::new(&mut terminal)));
        let pushed = self.base.push_into(scope.head(), &self.configs);
        let closed = scope.close();
        drop(scope);
        match (pushed, closed) {
            (Ok(()), Ok(())) => {}
            (Err(err), Ok(())) | (Ok(()), Err(err)) => {
                debug!(terminal = name, error = %err, "pipe failed");
                return Err(err);
            }
            (Err(err), Err(close_err)) => {
                debug!(terminal = name, error = %err, close_error = %close_err, "pipe and close failed");
                return Err(err.suppress(close_err));
            }
        }
        debug!(terminal = name, "pipe finished");
        Ok(terminal.result())
    }

    pub fn count(&self) -> PipeRes<usize> {
        self.evaluate(CountSink::new(self.closeables.clone()))
    }

    pub fn for_each(&self, action: impl FnMut(T)) -> PipeRes<()> {
        self.evaluate(ForEachSink::new(action, self.closeables.clone()))
    }

    /// 与[`Pipe::for_each`]相同，顺序总是保持。
    pub fn for_each_ordered(&self, action: impl FnMut(T)) -> PipeRes<()> {
        self.for_each(action)
    }

    /// 第一个值，通过`limit(1)`让数据源在得到第一个值后停止。
    pub fn find_first(&self) -> PipeRes<Option<T>> {
        self.append_limit(1).evaluate(FindFirstSink::new(self.closeables.clone()))
    }

    /// 与[`Pipe::find_first`]相同。
    pub fn find_any(&self) -> PipeRes<Option<T>> {
        self.find_first()
    }

    pub fn any_match(&self, predicate: impl FnMut(&T) -> bool) -> PipeRes<bool> {
        self.evaluate(MatchSink::new(MatchKind::Any, predicate, self.closeables.clone()))
    }

    pub fn all_match(&self, predicate: impl FnMut(&T) -> bool) -> PipeRes<bool> {
        self.evaluate(MatchSink::new(MatchKind::All, predicate, self.closeables.clone()))
    }

    pub fn none_match(&self, predicate: impl FnMut(&T) -> bool) -> PipeRes<bool> {
        self.evaluate(MatchSink::new(MatchKind::None, predicate, self.closeables.clone()))
    }

    pub fn min_by(&self, compare: impl FnMut(&T, &T) -> Ordering) -> PipeRes<Option<T>> {
        self.evaluate(ExtremumSink::min(compare, self.closeables.clone()))
    }

    pub fn max_by(&self, compare: impl FnMut(&T, &T) -> Ordering) -> PipeRes<Option<T>> {
        self.evaluate(ExtremumSink::max(compare, self.closeables.clone()))
    }

    pub fn min_by_key<K: Ord>(&self, mut key: impl FnMut(&T) -> K) -> PipeRes<Option<T>> {
        self.min_by(move |l, r| key(l).cmp(&key(r)))
    }

    pub fn max_by_key<K: Ord>(&self, mut key: impl FnMut(&T) -> K) -> PipeRes<Option<T>> {
        self.max_by(move |l, r| key(l).cmp(&key(r)))
    }

    pub fn min(&self) -> PipeRes<Option<T>>
    where
        T: Ord,
    {
        self.min_by(Ord::cmp)
    }

    pub fn max(&self) -> PipeRes<Option<T>>
    where
        T: Ord,
    {
        self.max_by(Ord::cmp)
    }

    /// 无初始值的归约，没有值时为`None`。
    pub fn reduce(&self, reducer: impl FnMut(T, T) -> T) -> PipeRes<Option<T>> {
        self.evaluate(ReduceSink::new(reducer, self.closeables.clone()))
    }

    /// 以`seed`为初始值的归约。
    pub fn fold<U>(&self, seed: U, folder: impl FnMut(U, T) -> U) -> PipeRes<U> {
        self.evaluate(FoldSink::new(seed, folder, self.closeables.clone()))?
            .ok_or_else(|| PipeErr::ActionErr("fold accumulator lost after the folder panicked".to_string()))
    }

    pub fn collect<C: Collector<T>>(&self, collector: C) -> PipeRes<C::Output> {
        self.evaluate(CollectSink::new(collector, self.closeables.clone()))
    }

    pub fn to_vec(&self) -> PipeRes<Vec<T>> {
        self.collect(ToVec)
    }

    /// 先完整收集，再返回迭代器。
    pub fn iter(&self) -> PipeRes<std::vec::IntoIter<T>> {
        self.to_vec().map(Vec::into_iter)
    }
}
