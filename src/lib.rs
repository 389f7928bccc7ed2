//! 推送式惰性流水线。
//!
//! 中间操作只记录描述，终止操作时从链尾向前组装处理节点，再由数据源逐个推送值。
//! 下游满足条件后通过[`Sink::is_finished`]通知数据源提前结束，执行结束时关闭登记的资源。
//!
//! ```
//! use pushpipe::Pipe;
//!
//! let pipe = Pipe::range(1, 10, 1).filter(|v| v % 2 == 0).map(|v| v * v);
//! assert_eq!(pipe.to_vec(), Ok(vec![4, 16, 36, 64, 100]));
//! assert_eq!(pipe.limit(2).unwrap().count(), Ok(2));
//! ```

mod closeable;
mod collector;
mod config;
mod err;
mod input;
mod op;
mod pipe;
mod sink;
mod terminal;

pub use closeable::{Closeable, Closeables};
pub use collector::{Collector, Counting, Grouping, Joining, ToSet, ToVec};
pub use config::Config;
pub use err::PipeErr;
pub use input::{Source, push_iter};
pub use op::{Op, Transform};
pub use pipe::Pipe;
pub use sink::Sink;
pub use terminal::{
    CollectSink, CountSink, ExtremumSink, FindFirstSink, FoldSink, ForEachSink, MatchKind, MatchSink, ReduceSink,
    Terminal,
};

/// 整数类型
pub type Integer = i64;

pub type PipeRes<T> = Result<T, PipeErr>;

/// 不限制数量
pub const UNBOUNDED: Integer = Integer::MAX;
