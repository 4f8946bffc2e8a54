//! RequestId 核心结构体定义

use std::fmt;
use uuid::Uuid;

/// 请求ID结构体
///
/// 一个不透明的字符串令牌：要么原样保存上游请求头提供的值，
/// 要么由本进程生成一个标准连字符小写形式的UUIDv4。
/// 除生成路径外不对格式做任何校验，唯一性由生成算法的抗碰撞性
/// 或上游系统自身保证。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    /// 生成新的请求ID
    ///
    /// 使用随机UUIDv4，渲染为标准的连字符小写字符串（36字符）。
    ///
    /// # 返回
    /// 新生成的请求ID
    #[inline]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// 获取请求ID字符串
    ///
    /// # 返回
    /// 请求ID的字符串表示
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 取出内部字符串，消耗自身
    #[inline]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<&str> for RequestId {
    /// 原样包装一个上游提供的ID值，不做格式校验
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}
