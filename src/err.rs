use thiserror::Error;

#[derive(Error, Debug, Eq, PartialEq)]
pub enum PipeErr {
    #[error("[Invalid Arg] Invalid value `{arg_value}` in argument `{arg}` of op `{op}`: {error}")]
    InvalidArg { op: &'static str, arg: &'static str, arg_value: String, error: &'static str },

    #[error("[Protocol Violation] Terminal `{terminal}` received a value after it was finished: {error}")]
    ProtocolViolation { terminal: &'static str, error: &'static str },

    #[error("[Close] {error}{}", fmt_suppressed(.suppressed))]
    CloseErr { error: Box<PipeErr>, suppressed: Vec<PipeErr> },

    /// 主错误保持原样，附带之后发生的错误
    #[error("{error}{}", fmt_suppressed(.suppressed))]
    Suppressed { error: Box<PipeErr>, suppressed: Vec<PipeErr> },

    #[error("[Action] {0}")]
    ActionErr(String),

    #[error("[Input] Open input file `{file}` error: {err}")]
    OpenFileErr { file: String, err: String },

    #[error("[Input] Read line `{line_no}` of input file `{file}` error: {err}")]
    ReadFromFileErr { file: String, line_no: usize, err: String },
}

fn fmt_suppressed(suppressed: &[PipeErr]) -> String {
    if suppressed.is_empty() { String::new() } else { format!(" ({} suppressed)", suppressed.len()) }
}

impl PipeErr {
    pub(crate) fn negative_arg(op: &'static str, arg: &'static str, value: crate::Integer) -> PipeErr {
        PipeErr::InvalidArg { op, arg, arg_value: value.to_string(), error: "must be non-negative" }
    }

    pub(crate) fn protocol(terminal: &'static str, error: &'static str) -> PipeErr {
        PipeErr::ProtocolViolation { terminal, error }
    }

    /// 数据源违反了终止约定，不可恢复。
    pub fn is_fatal(&self) -> bool {
        matches!(self.primary(), PipeErr::ProtocolViolation { .. })
    }

    /// 以当前错误为主错误，附加一个被抑制的错误。
    ///
    /// 当前错误已带有被抑制列表时直接追加，否则包装为[`PipeErr::Suppressed`]；
    /// 被附加的错误如果本身带有被抑制列表，其主错误和被抑制错误会被展开追加。
    pub fn suppress(self, other: PipeErr) -> PipeErr {
        let (error, mut suppressed, on_close) = match self {
            PipeErr::CloseErr { error, suppressed } => (error, suppressed, true),
            PipeErr::Suppressed { error, suppressed } => (error, suppressed, false),
            error => (Box::new(error), Vec::new(), false),
        };
        match other {
            PipeErr::CloseErr { error: other_error, suppressed: other_suppressed }
            | PipeErr::Suppressed { error: other_error, suppressed: other_suppressed } => {
                suppressed.push(*other_error);
                suppressed.extend(other_suppressed);
            }
            other => suppressed.push(other),
        }
        if on_close { PipeErr::CloseErr { error, suppressed } } else { PipeErr::Suppressed { error, suppressed } }
    }

    /// 主错误，对于不带被抑制列表的错误即自身。
    pub fn primary(&self) -> &PipeErr {
        match self {
            PipeErr::CloseErr { error, .. } | PipeErr::Suppressed { error, .. } => error.primary(),
            error => error,
        }
    }

    /// 被抑制的错误。
    pub fn suppressed(&self) -> &[PipeErr] {
        match self {
            PipeErr::CloseErr { suppressed, .. } | PipeErr::Suppressed { suppressed, .. } => suppressed,
            _ => &[],
        }
    }
}
