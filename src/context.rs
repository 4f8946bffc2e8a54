//! 请求ID上下文管理
//!
//! 使用 `tokio::task_local` 提供与Web框架无关的每请求上下文存储。
//! 每个请求持有独立的 [`ContextStore`]，并发请求之间互不可见。

use crate::config::RequestIdConfig;
use crate::parser;
use crate::request_id::RequestId;
use http::HeaderMap;
use tokio::task_local;

/// 在非请求上下文中访问上下文存储时返回的错误
///
/// 可恢复：[`MultiFetcher`](crate::MultiFetcher) 会把它转换为
/// [`FetchOutcome::OutOfContext`](crate::FetchOutcome) 并继续尝试下一个fetcher，
/// 不会传播给最终调用方。
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no active request context is available")]
pub struct ExecutedOutsideContext;

/// 每请求的上下文存储
///
/// 持有解析得到的请求ID（或缺失），以键值形式关联到一个可配置的键名。
/// 构造之后不可变：请求处理期间存储的值不会再改变。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextStore {
    attribute: String,
    request_id: Option<RequestId>,
}

impl ContextStore {
    /// 用给定键名和已解析的请求ID构造存储
    pub fn new(attribute: impl Into<String>, request_id: Option<RequestId>) -> Self {
        Self {
            attribute: attribute.into(),
            request_id,
        }
    }

    /// 请求生命周期钩子：在handler执行之前解析出本请求的ID并构造存储
    ///
    /// 先用回退解析器从请求头提取；没有命中且配置允许时生成一个新的
    /// UUIDv4；否则存储缺失。构造即完成写入，之后不再变更。
    ///
    /// # 参数
    /// * `headers` - 当前请求的头部
    /// * `config` - 解析行为配置
    pub fn for_request(headers: &HeaderMap, config: &RequestIdConfig) -> Self {
        let request_id = parser::auto_parser(headers)
            .or_else(|| config.generate_if_not_found.then(RequestId::new));
        Self::new(config.attribute.clone(), request_id)
    }

    /// 存储使用的键名
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// 按键名读取请求ID
    ///
    /// 键名与存储的键名一致时返回存储的值，否则视为缺失。
    pub fn get(&self, attribute: &str) -> Option<&RequestId> {
        if attribute == self.attribute {
            self.request_id.as_ref()
        } else {
            None
        }
    }

    /// 读取本存储自身键名下的请求ID
    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }
}

// 使用tokio的task_local来保存当前请求的上下文存储
task_local! {
    static CURRENT_STORE: ContextStore;
}

/// 在指定的上下文存储作用域内执行异步操作
///
/// 存储的写入发生在 `future` 执行之前，因此handler及响应后的代码
/// 都能读到已解析的请求ID。作用域结束后上下文随之消失。
///
/// # 参数
/// * `store` - 本请求的上下文存储
/// * `future` - 要执行的异步操作
///
/// # 返回
/// 异步操作的结果
pub async fn with_context_store<F, T>(store: ContextStore, future: F) -> T
where
    F: std::future::Future<Output = T>,
{
    CURRENT_STORE.scope(store, future).await
}

/// 对当前任务的上下文存储执行只读访问
///
/// 当前任务不在任何请求上下文中时返回 [`ExecutedOutsideContext`]。
pub fn try_with_store<F, R>(f: F) -> Result<R, ExecutedOutsideContext>
where
    F: FnOnce(&ContextStore) -> R,
{
    CURRENT_STORE.try_with(f).map_err(|_| ExecutedOutsideContext)
}
