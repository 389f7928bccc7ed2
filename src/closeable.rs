use crate::PipeRes;
use crate::err::PipeErr;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

/// 关闭动作
pub type Closeable = Rc<dyn Fn() -> PipeRes<()>>;

/// 关闭动作登记表，追加时复制，不修改已有实例。
#[derive(Clone, Default)]
pub enum Closeables {
    #[default]
    Empty,
    NonEmpty(Rc<[Closeable]>),
}

impl Closeables {
    pub fn empty() -> Closeables {
        Closeables::Empty
    }

    /// 返回在末尾追加了`action`的新登记表。
    pub fn add(&self, action: impl Fn() -> PipeRes<()> + 'static) -> Closeables {
        let action: Closeable = Rc::new(action);
        match self {
            Closeables::Empty => Closeables::NonEmpty(Rc::from([action])),
            Closeables::NonEmpty(actions) => {
                Closeables::NonEmpty(actions.iter().cloned().chain(std::iter::once(action)).collect())
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Closeables::Empty => 0,
            Closeables::NonEmpty(actions) => actions.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 按登记顺序执行全部关闭动作。
    ///
    /// 某个动作失败后仍继续执行后续动作，最终返回第一个失败，之后的失败作为被抑制错误附加。
    pub fn close(&self) -> PipeRes<()> {
        let Closeables::NonEmpty(actions) = self else {
            return Ok(());
        };
        let mut first: Option<PipeErr> = None;
        let mut suppressed = Vec::new();
        for action in actions.iter() {
            if let Err(err) = action() {
                if first.is_none() { first = Some(err) } else { suppressed.push(err) }
            }
        }
        match first {
            Some(error) => Err(PipeErr::CloseErr { error: Box::new(error), suppressed }),
            None => Ok(()),
        }
    }
}

impl Debug for Closeables {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Closeables({})", self.len())
    }
}
