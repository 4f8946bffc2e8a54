//! 多来源请求ID获取机制
//!
//! [`MultiFetcher`] 维护一组有序的获取策略（fetcher），按注册顺序逐个
//! 尝试，容忍在无效上下文中被调用的策略失败，返回第一个成功的结果。
//! 这使得请求ID的获取在有无活跃请求上下文时都能工作：
//! 「不在请求上下文中」和「请求没有ID」对调用方统一表现为缺失。

use crate::context;
use crate::request_id::RequestId;
use std::sync::{LazyLock, RwLock};

/// 单个fetcher的执行结果
///
/// 用显式的标签区分三种情况，取代异常式的控制流：
/// 命中、未命中、以及在自身有效上下文之外被调用。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// 成功取得请求ID
    Found(RequestId),
    /// 当前上下文中没有请求ID（有效的预期结果，不是错误）
    NotFound,
    /// fetcher在自身有效上下文之外被调用
    OutOfContext,
}

type Fetcher = Box<dyn Fn() -> FetchOutcome + Send + Sync>;

/// 容错的多来源请求ID聚合器
///
/// 按注册顺序依次调用fetcher：命中立即返回；未命中继续下一个；
/// 上下文无效时记录一条日志后继续，失败永远不会传播给调用方。
///
/// ## 生命周期约定
///
/// 注册预期在进程启动阶段、并发请求处理开始之前完成，此后注册表
/// 只读。注册表由读写锁保护，因此晚注册也是安全的，只是不属于
/// 稳态用法。
pub struct MultiFetcher {
    fetchers: RwLock<Vec<Fetcher>>,
}

impl MultiFetcher {
    /// 创建一个没有任何fetcher的聚合器
    pub fn new() -> Self {
        Self {
            fetchers: RwLock::new(Vec::new()),
        }
    }

    /// 注册一个fetcher，追加到列表末尾
    pub fn register_fetcher<F>(&self, fetcher: F)
    where
        F: Fn() -> FetchOutcome + Send + Sync + 'static,
    {
        self.fetchers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Box::new(fetcher));
    }

    /// 按注册顺序尝试所有fetcher，返回第一个命中的请求ID
    ///
    /// 所有fetcher都未命中时返回 `None`。对调用方而言该操作永远
    /// 不会失败。
    pub fn get_request_id(&self) -> Option<RequestId> {
        let fetchers = self
            .fetchers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        for fetcher in fetchers.iter() {
            match fetcher() {
                FetchOutcome::Found(request_id) => return Some(request_id),
                FetchOutcome::NotFound => continue,
                FetchOutcome::OutOfContext => {
                    tracing::warn!(
                        "Request ID fetcher was invoked outside of its context; trying the next one."
                    );
                    continue;
                }
            }
        }
        None
    }
}

impl Default for MultiFetcher {
    fn default() -> Self {
        Self::new()
    }
}

/// 默认fetcher：从当前请求的上下文存储中读取请求ID
///
/// 当前任务不在任何请求上下文中时返回
/// [`FetchOutcome::OutOfContext`]。
pub fn context_store_fetcher() -> FetchOutcome {
    match context::try_with_store(|store| store.request_id().cloned()) {
        Ok(Some(request_id)) => FetchOutcome::Found(request_id),
        Ok(None) => FetchOutcome::NotFound,
        Err(_) => FetchOutcome::OutOfContext,
    }
}

/// 进程级的默认聚合器
///
/// 启动时构造，只注册一个 [`context_store_fetcher`]。运行在其他
/// 执行上下文（如后台任务调度器）中的代码可以在启动阶段注册
/// 额外的fetcher，无需改动本模块。
pub static CURRENT_REQUEST_ID: LazyLock<MultiFetcher> = LazyLock::new(|| {
    let fetcher = MultiFetcher::new();
    fetcher.register_fetcher(context_store_fetcher);
    fetcher
});

/// 获取当前请求的请求ID
///
/// 通过默认聚合器 [`CURRENT_REQUEST_ID`] 获取。不在请求上下文中
/// 或请求没有ID时返回 `None`，永远不会panic。
pub fn current_request_id() -> Option<RequestId> {
    CURRENT_REQUEST_ID.get_request_id()
}
