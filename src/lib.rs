//! 轻量级的请求ID解析与传播模块
//!
//! 专注于request_id的提取、生成、传递和获取。
//! 核心功能与Web框架无关，并为Axum提供了开箱即用的中间件支持。
//!
//! 每个入站请求都会得到一个唯一标识：优先从上游请求头
//! （`X-Request-ID`、`X-Correlation-ID`、`X-Amzn-Trace-Id`）中提取，
//! 没有时按配置生成一个新的UUIDv4。解析结果存放在当前请求的上下文中，
//! 之后可以在任意位置（包括日志代码）通过 [`current_request_id`] 获取，
//! 无需在函数签名中层层传递。
//!
//! ## Usage
//!
//! ### 基础用法：解析和获取 RequestId
//! ```
//! use http::HeaderMap;
//! use request_id::{auto_parser, RequestId};
//!
//! // 从请求头中按顺序提取（X-Request-ID → X-Correlation-ID → X-Amzn-Trace-Id）
//! let mut headers = HeaderMap::new();
//! headers.insert("x-request-id", "abc-123".parse().unwrap());
//! assert_eq!(auto_parser(&headers), Some(RequestId::from("abc-123")));
//!
//! // 没有可用请求头时生成新的ID
//! let request_id = RequestId::new();
//! println!("Generated request ID: {}", request_id);
//! ```
//!
//! ### Axum 集成（需要启用 axum feature）
//! ```ignore
//! use axum::{routing::get, Router};
//! use request_id::{RequestId, RequestIdLayer};
//!
//! async fn handler(request_id: RequestId) -> String {
//!     // 直接在函数签名中获取 RequestId
//!     format!("Hello! Your request ID is: {}", request_id)
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::new()
//!         .route("/", get(handler))
//!         .layer(RequestIdLayer::new());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```
//!
//! ### 在请求上下文之外获取
//! ```
//! use request_id::current_request_id;
//!
//! // 不在任何请求上下文中时返回 None，而不是panic或错误
//! assert!(current_request_id().is_none());
//! ```

mod config;
mod context;
mod fetcher;
mod parser;
mod request_id;

pub use config::{RequestIdConfig, DEFAULT_ATTRIBUTE};
pub use context::{try_with_store, with_context_store, ContextStore, ExecutedOutsideContext};
pub use fetcher::{
    context_store_fetcher, current_request_id, FetchOutcome, MultiFetcher, CURRENT_REQUEST_ID,
};
pub use parser::{
    amazon_elb_trace_id, auto_parser, generic_http_header_parser_for, parse_with,
    x_correlation_id, x_request_id, HeaderParserFn, DEFAULT_PARSERS,
};
pub use request_id::RequestId;

/// HTTP 头部中的请求ID字段名
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// HTTP 头部中的关联ID字段名
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Amazon 负载均衡器注入的追踪字段名
pub const AMZN_TRACE_ID_HEADER: &str = "x-amzn-trace-id";

// -- axum feature --
#[cfg(feature = "axum")]
mod integrations;
#[cfg(feature = "axum")]
pub use integrations::axum::RequestIdLayer;
