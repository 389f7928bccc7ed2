#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Config {
    /// 每次执行终止操作时以`info`级别打印流水线信息
    Verbose,
    /// `flat_map`展开的子序列总是完整消费，即使下游已经结束
    DrainFlatMap,
}

#[inline]
pub(crate) fn is_verbose(configs: &[Config]) -> bool {
    configs.contains(&Config::Verbose)
}

#[inline]
pub(crate) fn is_drain_flat_map(configs: &[Config]) -> bool {
    configs.contains(&Config::DrainFlatMap)
}
