use crate::err::PipeErr;
use crate::pipe::Pipe;
use crate::sink::Sink;
use crate::{Integer, PipeRes};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::iter::{repeat, repeat_n};
use std::rc::Rc;

/// 数据源：每次执行时把全部值推送给`sink`。
///
/// 推送每个值前应检查[`Sink::is_finished`]，返回`true`后停止推送并正常返回。
/// 同一数据源可能被多次执行，每次都应从头推送。
pub trait Source<T> {
    fn push(&self, sink: &mut dyn Sink<T>) -> PipeRes<()>;
}

impl<T, F> Source<T> for F
where
    F: Fn(&mut dyn Sink<T>) -> PipeRes<()>,
{
    fn push(&self, sink: &mut dyn Sink<T>) -> PipeRes<()> {
        self(sink)
    }
}

/// 逐个推送迭代器的值，取下一个值前检查下游是否已结束。
pub fn push_iter<T>(values: impl IntoIterator<Item = T>, sink: &mut dyn Sink<T>) -> PipeRes<()> {
    let mut values = values.into_iter();
    while !sink.is_finished() {
        match values.next() {
            Some(value) => sink.accept(value)?,
            None => break,
        }
    }
    Ok(())
}

impl<T: 'static> Pipe<T> {
    pub fn from_fn(source: impl Fn(&mut dyn Sink<T>) -> PipeRes<()> + 'static) -> Pipe<T> {
        Pipe::from_source(source)
    }

    pub fn empty() -> Pipe<T> {
        Pipe::from_fn(|_| Ok(()))
    }

    /// 使用直接字面值，每次执行推送其克隆。
    pub fn of(values: Vec<T>) -> Pipe<T>
    where
        T: Clone,
    {
        let values: Rc<[T]> = values.into();
        Pipe::from_fn(move |sink| push_iter(values.iter().cloned(), sink))
    }

    /// 每次执行从`iterable`的克隆重新迭代。
    pub fn from_iterable<I>(iterable: I) -> Pipe<T>
    where
        I: IntoIterator<Item = T> + Clone + 'static,
    {
        Pipe::from_fn(move |sink| push_iter(iterable.clone(), sink))
    }

    /// 重复`value`，`count`为`None`时无限重复。
    pub fn repeat(value: T, count: Option<usize>) -> Pipe<T>
    where
        T: Clone,
    {
        Pipe::from_fn(move |sink| match count {
            Some(count) => push_iter(repeat_n(value.clone(), count), sink),
            None => push_iter(repeat(value.clone()), sink),
        })
    }
}

impl Pipe<Integer> {
    /// 生成`[start, end]`范围内的整数。
    ///
    /// 步长为正时正序生成，为负时从`end`逆序生成，为0时无限重复`start`；`start > end`时无数据生成。
    pub fn range(start: Integer, end: Integer, step: Integer) -> Pipe<Integer> {
        Pipe::from_fn(move |sink| push_iter(range_to_iter(start, end, step), sink))
    }
}

impl Pipe<String> {
    /// 按`\n`拆分文本，末尾换行符产生一个空行，空文本产生一个空行。
    pub fn lines(text: impl Into<String>) -> Pipe<String> {
        let text: String = text.into();
        let text: Rc<str> = text.into();
        Pipe::from_fn(move |sink| push_iter(SplitLines::new(&text).map(str::to_string), sink))
    }

    /// 每次执行时打开文件并逐行读取。
    pub fn file_lines(file: impl Into<String>) -> Pipe<String> {
        let file: String = file.into();
        let file: Rc<str> = file.into();
        Pipe::from_fn(move |sink| {
            let fin = File::open(&*file).map_err(|err| PipeErr::OpenFileErr { file: file.to_string(), err: err.to_string() })?;
            let mut lines = BufReader::new(fin).lines().enumerate();
            while !sink.is_finished() {
                match lines.next() {
                    Some((_, Ok(line))) => sink.accept(line)?,
                    Some((idx, Err(err))) => {
                        return Err(PipeErr::ReadFromFileErr {
                            file: file.to_string(),
                            line_no: idx + 1,
                            err: err.to_string(),
                        });
                    }
                    None => break,
                }
            }
            Ok(())
        })
    }
}

fn range_to_iter(start: Integer, end: Integer, step: Integer) -> Box<dyn Iterator<Item = Integer>> {
    let iter = RangeIter { step: step.saturating_abs(), next: start, next_back: end, exhausted: false };
    if step < 0 { Box::new(iter.rev()) } else { Box::new(iter) }
}

#[derive(Debug, Eq, PartialEq)]
struct RangeIter {
    step: Integer,
    next: Integer,
    next_back: Integer,
    /// 越过整数边界
    exhausted: bool,
}

impl Iterator for RangeIter {
    type Item = Integer;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted || self.next > self.next_back {
            return None;
        }
        let res = self.next;
        match self.next.checked_add(self.step) {
            Some(next) => self.next = next,
            None => self.exhausted = true,
        }
        Some(res)
    }
}

impl DoubleEndedIterator for RangeIter {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.exhausted || self.next_back < self.next {
            return None;
        }
        let res = self.next_back;
        match self.next_back.checked_sub(self.step) {
            Some(next_back) => self.next_back = next_back,
            None => self.exhausted = true,
        }
        Some(res)
    }
}

#[derive(Debug)]
struct SplitLines<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> SplitLines<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }
}

impl<'a> Iterator for SplitLines<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.text.get(self.pos..)?;
        match rest.find('\n') {
            Some(idx) => {
                self.pos += idx + 1;
                Some(&rest[..idx])
            }
            None => {
                self.pos = self.text.len() + 1;
                Some(rest)
            }
        }
    }
}
