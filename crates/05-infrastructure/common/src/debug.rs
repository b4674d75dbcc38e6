//! 进程级调试开关
//!
//! 仅影响日志输出，不改变任何作用域行为。

use std::backtrace::Backtrace;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

static DEBUG_LIFE_CYCLE: AtomicBool = AtomicBool::new(false);
static DEBUG_STACK_TRACES: AtomicBool = AtomicBool::new(false);

/// 作用域调试开关
#[derive(Debug, Clone, Copy)]
pub struct ScopeDebugFlags;

impl ScopeDebugFlags {
    /// 是否以 info 级别记录作用域创建和销毁
    pub fn is_debug_life_cycle_enabled() -> bool {
        DEBUG_LIFE_CYCLE.load(Ordering::Relaxed)
    }

    /// 设置生命周期调试开关
    pub fn set_debug_life_cycle_enabled(enabled: bool) {
        DEBUG_LIFE_CYCLE.store(enabled, Ordering::Relaxed);
    }

    /// 是否在生命周期日志中附带调用栈
    pub fn is_debug_stack_traces_enabled() -> bool {
        DEBUG_STACK_TRACES.load(Ordering::Relaxed)
    }

    /// 设置调用栈调试开关
    pub fn set_debug_stack_traces_enabled(enabled: bool) {
        DEBUG_STACK_TRACES.store(enabled, Ordering::Relaxed);
    }
}

/// 记录作用域生命周期事件
pub fn log_life_cycle(event: &str, kind: &str, scope_id: &str) {
    let backtrace = ScopeDebugFlags::is_debug_stack_traces_enabled()
        .then(|| Backtrace::force_capture().to_string());

    if ScopeDebugFlags::is_debug_life_cycle_enabled() {
        match backtrace {
            Some(trace) => info!(kind, scope_id, "{}\n{}", event, trace),
            None => info!(kind, scope_id, "{}", event),
        }
    } else {
        match backtrace {
            Some(trace) => debug!(kind, scope_id, "{}\n{}", event, trace),
            None => debug!(kind, scope_id, "{}", event),
        }
    }
}
