//! 请求头解析器集合与回退解析策略
//!
//! 每个解析器从 `HeaderMap` 中提取一个候选请求ID，解析失败时一律返回
//! `None`，不会panic也不会返回错误。[`auto_parser`] 按默认顺序逐个尝试，
//! 返回第一个命中的结果。

use crate::request_id::RequestId;
use crate::{AMZN_TRACE_ID_HEADER, CORRELATION_ID_HEADER, REQUEST_ID_HEADER};
use http::HeaderMap;
use std::collections::HashMap;

/// 请求头解析器的函数签名
pub type HeaderParserFn = fn(&HeaderMap) -> Option<RequestId>;

/// 默认解析顺序：X-Request-ID → X-Correlation-ID → X-Amzn-Trace-Id
pub const DEFAULT_PARSERS: &[HeaderParserFn] = &[x_request_id, x_correlation_id, amazon_elb_trace_id];

/// 通用请求头解析器工厂
///
/// 给定头部名称，返回读取该头部的解析器：去除首尾空白，
/// 空值视为缺失。头部值不是合法UTF-8时同样视为缺失。
///
/// # 参数
/// * `header_name` - 要读取的头部名称（不区分大小写）
///
/// # 示例
/// ```
/// use http::HeaderMap;
/// use request_id::generic_http_header_parser_for;
///
/// let parser = generic_http_header_parser_for("x-my-id");
/// let mut headers = HeaderMap::new();
/// headers.insert("x-my-id", "  abc  ".parse().unwrap());
/// assert_eq!(parser(&headers).unwrap().as_str(), "abc");
/// ```
pub fn generic_http_header_parser_for(
    header_name: &'static str,
) -> impl Fn(&HeaderMap) -> Option<RequestId> {
    move |headers: &HeaderMap| {
        headers
            .get(header_name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(RequestId::from)
    }
}

/// `X-Request-ID` 头部解析器
pub fn x_request_id(headers: &HeaderMap) -> Option<RequestId> {
    generic_http_header_parser_for(REQUEST_ID_HEADER)(headers)
}

/// `X-Correlation-ID` 头部解析器
pub fn x_correlation_id(headers: &HeaderMap) -> Option<RequestId> {
    generic_http_header_parser_for(CORRELATION_ID_HEADER)(headers)
}

/// Amazon 负载均衡器追踪头解析器
///
/// `X-Amzn-Trace-Id` 的值是分号分隔的 `key=value`（或裸 `key`）字段列表，
/// 例如 `Self=1-abc;Root=1-def;Sampled=1`。解析规则：
/// - 从左到右写入映射，重复键以最后一次出现为准
/// - 裸键（无 `=`）映射为缺失值，不是错误
/// - 多余的 `=` 归入值部分，空白段直接忽略
///
/// 返回 `Self` 字段的值；`Self` 缺失或为空时返回 `Root` 的值；都没有则缺失。
pub fn amazon_elb_trace_id(headers: &HeaderMap) -> Option<RequestId> {
    let raw = headers.get(AMZN_TRACE_ID_HEADER)?.to_str().ok()?;

    let mut fields: HashMap<&str, Option<&str>> = HashMap::new();
    for segment in raw.split(';') {
        match segment.split_once('=') {
            Some((key, value)) => fields.insert(key, Some(value)),
            None => fields.insert(segment, None),
        };
    }

    let lookup = |key: &str| {
        fields
            .get(key)
            .copied()
            .flatten()
            .filter(|value| !value.is_empty())
    };

    lookup("Self").or_else(|| lookup("Root")).map(RequestId::from)
}

/// 按给定顺序尝试一组解析器，返回第一个非缺失的结果
///
/// 命中即返回，不再调用后续解析器；全部缺失时返回 `None`。
pub fn parse_with(headers: &HeaderMap, parsers: &[HeaderParserFn]) -> Option<RequestId> {
    parsers.iter().find_map(|parser| parser(headers))
}

/// 回退解析器：按默认顺序提取请求ID
///
/// 等价于 `parse_with(headers, DEFAULT_PARSERS)`。
pub fn auto_parser(headers: &HeaderMap) -> Option<RequestId> {
    parse_with(headers, DEFAULT_PARSERS)
}
