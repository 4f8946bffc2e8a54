//! 请求ID解析行为的配置选项

/// 上下文存储中请求ID的默认键名
pub const DEFAULT_ATTRIBUTE: &str = "log_request_id";

/// 请求ID中间件配置选项
#[derive(Clone, Debug)]
pub struct RequestIdConfig {
    /// 请求头中没有找到ID时是否生成一个新的（默认启用）
    pub generate_if_not_found: bool,
    /// 是否为每个请求输出一条访问日志（默认关闭）
    pub log_all_requests: bool,
    /// 上下文存储中保存请求ID使用的键名（默认 `"log_request_id"`）
    pub attribute: String,
}

impl Default for RequestIdConfig {
    fn default() -> Self {
        Self {
            generate_if_not_found: true,
            log_all_requests: false,
            attribute: DEFAULT_ATTRIBUTE.to_string(),
        }
    }
}
