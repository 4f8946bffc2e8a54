//! Axum框架的请求ID中间件

use crate::config::RequestIdConfig;
use crate::context::{self, ContextStore};
use crate::fetcher;
use crate::parser::auto_parser;
use crate::request_id::RequestId;
use axum::{
    extract::{ConnectInfo, FromRequestParts, OptionalFromRequestParts, Request},
    http::{request::Parts, HeaderMap},
    response::Response,
};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::{
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::Instrument;

/// 用于生成请求ID的函数签名
type Generator = Arc<dyn Fn() -> RequestId + Send + Sync>;

/// 用于从请求头解析请求ID的函数签名
type Parser = Arc<dyn Fn(&HeaderMap) -> Option<RequestId> + Send + Sync>;

/// 请求ID中间件层
///
/// 在每个请求进入handler之前完成一次解析：先从请求头提取
/// （默认为回退解析器，可用 [`with_parser`](Self::with_parser) 替换），
/// 没有命中且配置允许时生成一个新ID（默认UUIDv4，可用
/// [`with_generator`](Self::with_generator) 替换）。解析结果写入请求
/// 扩展和任务级上下文存储，整个请求期间保持不变。
#[derive(Clone)]
pub struct RequestIdLayer {
    parser: Option<Parser>,
    generator: Option<Generator>,
    config: RequestIdConfig,
}

impl RequestIdLayer {
    /// 创建新的请求ID层，使用默认配置
    pub fn new() -> Self {
        Self {
            parser: None,
            generator: None,
            config: RequestIdConfig::default(),
        }
    }

    /// 使用自定义配置创建请求ID层
    pub fn with_config(config: RequestIdConfig) -> Self {
        Self {
            parser: None,
            generator: None,
            config,
        }
    }

    /// 使用自定义的解析器替换默认的回退解析器
    ///
    /// # 参数
    /// * `parser` - 从请求头中提取候选ID的函数，返回 `None` 表示缺失
    pub fn with_parser<F>(mut self, parser: F) -> Self
    where
        F: Fn(&HeaderMap) -> Option<RequestId> + Send + Sync + 'static,
    {
        self.parser = Some(Arc::new(parser));
        self
    }

    /// 使用自定义的生成器替换默认的UUIDv4生成器
    ///
    /// # 参数
    /// * `generator` - 返回新 [`RequestId`] 的函数
    ///
    /// # 示例
    /// ```
    /// use request_id::{RequestId, RequestIdLayer};
    ///
    /// // 使用无连字符的短格式作为生成器
    /// let layer = RequestIdLayer::new()
    ///     .with_generator(|| RequestId::from(uuid::Uuid::new_v4().simple().to_string()));
    /// ```
    pub fn with_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> RequestId + Send + Sync + 'static,
    {
        self.generator = Some(Arc::new(generator));
        self
    }
}

impl Default for RequestIdLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService {
            inner,
            parser: self.parser.clone(),
            generator: self.generator.clone(),
            config: self.config.clone(),
        }
    }
}

/// 请求ID服务
#[derive(Clone)]
pub struct RequestIdService<S> {
    inner: S,
    parser: Option<Parser>,
    generator: Option<Generator>,
    config: RequestIdConfig,
}

impl<S> Service<Request> for RequestIdService<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        // 解析或生成本请求的ID
        let request_id = resolve_request_id(
            req.headers(),
            self.parser.as_deref(),
            self.generator.as_deref(),
            &self.config,
        );

        // 提取请求信息用于span和访问日志（在req被移动之前）
        let method = req.method().clone();
        let path = req.uri().path().to_owned();
        let remote_addr = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        // 将请求ID添加到请求扩展中，供提取器使用
        if let Some(request_id) = &request_id {
            req.extensions_mut().insert(request_id.clone());
        }

        let store = ContextStore::new(self.config.attribute.clone(), request_id.clone());
        let future = self.inner.call(req);
        let config = self.config.clone();

        Box::pin(async move {
            let id_field = request_id.as_ref().map_or("-", RequestId::as_str).to_owned();
            let span = tracing::info_span!(
                "request",
                request_id = %id_field,
                method = %method,
                path = %path
            );

            // 在span和上下文存储的作用域内执行请求处理
            context::with_context_store(store, async move {
                let response = future.await?;

                if config.log_all_requests {
                    tracing::info!(
                        "{} - - \"{} {} {}\"",
                        remote_addr.as_deref().unwrap_or("-"),
                        method,
                        path,
                        response.status().as_u16()
                    );
                }

                Ok(response)
            })
            .instrument(span)
            .await
        })
    }
}

/// 从请求头解析请求ID，未命中且配置允许时生成一个新的
fn resolve_request_id(
    headers: &HeaderMap,
    parser: Option<&(dyn Fn(&HeaderMap) -> Option<RequestId> + Send + Sync)>,
    generator: Option<&(dyn Fn() -> RequestId + Send + Sync)>,
    config: &RequestIdConfig,
) -> Option<RequestId> {
    let parsed = match parser {
        Some(parse) => parse(headers),
        None => auto_parser(headers),
    };

    parsed.or_else(|| {
        config.generate_if_not_found.then(|| match generator {
            Some(generate) => generate(),
            None => RequestId::new(),
        })
    })
}

// -- RequestId Extractor --

/// Axum 提取器，用于在 handler 函数签名中直接获取 RequestId
///
/// # 示例
/// ```no_run
/// use axum::{routing::get, Router};
/// use request_id::{RequestId, RequestIdLayer};
///
/// async fn my_handler(request_id: RequestId) -> String {
///     tracing::info!(request_id = %request_id, "Handler started");
///     format!("Hello! Your request ID is: {}", request_id)
/// }
///
/// let app: Router = Router::new()
///     .route("/", get(my_handler))
///     .layer(RequestIdLayer::new());
/// ```
impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    /// 从请求中提取 RequestId
    ///
    /// 优先读取中间件写入请求扩展的ID，其次通过默认聚合器从上下文
    /// 存储获取。两者都缺失时（例如关闭了生成且上游没有提供ID）
    /// 记录一条警告并生成一个新ID；需要观察缺失本身的handler应
    /// 使用 `Option<RequestId>`。
    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(request_id) = parts.extensions.get::<RequestId>() {
            return Ok(request_id.clone());
        }

        Ok(fetcher::current_request_id().unwrap_or_else(|| {
            tracing::warn!("RequestId not found in the current request scope. Generating a new one. This might indicate that RequestIdLayer is not installed.");
            RequestId::new()
        }))
    }
}

impl<S> OptionalFromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    /// 以 `Option<RequestId>` 形式提取，缺失保持缺失
    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestId>()
            .cloned()
            .or_else(fetcher::current_request_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AMZN_TRACE_ID_HEADER, CORRELATION_ID_HEADER, REQUEST_ID_HEADER};
    use axum::{
        body::Body,
        http::{HeaderValue, Request, StatusCode},
        routing::get,
        Router,
    };
    use tower::ServiceExt;
    use uuid::Uuid;

    // --- 辅助函数测试 ---
    mod id_resolution {
        use super::*;

        fn resolve_defaults(headers: &HeaderMap, config: &RequestIdConfig) -> Option<RequestId> {
            resolve_request_id(headers, None, None, config)
        }

        #[test]
        fn test_resolve_from_headers() {
            let mut headers = HeaderMap::new();
            headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("upstream-1"));

            let resolved = resolve_defaults(&headers, &RequestIdConfig::default());
            assert_eq!(resolved.unwrap().as_str(), "upstream-1");
        }

        #[test]
        fn test_generate_when_missing() {
            let resolved = resolve_defaults(&HeaderMap::new(), &RequestIdConfig::default());
            let id = resolved.expect("should generate when headers are empty");
            assert!(Uuid::parse_str(id.as_str()).is_ok());
        }

        #[test]
        fn test_absent_when_generation_disabled() {
            let config = RequestIdConfig {
                generate_if_not_found: false,
                ..Default::default()
            };
            assert_eq!(resolve_defaults(&HeaderMap::new(), &config), None);
        }

        #[test]
        fn test_with_custom_parser() {
            let mut headers = HeaderMap::new();
            headers.insert("x-custom-id", HeaderValue::from_static("custom-1"));
            headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("ignored"));

            // 自定义解析器完全替换默认的回退解析器
            let parser = |headers: &HeaderMap| {
                headers
                    .get("x-custom-id")
                    .and_then(|v| v.to_str().ok())
                    .map(RequestId::from)
            };
            let resolved =
                resolve_request_id(&headers, Some(&parser), None, &RequestIdConfig::default());
            assert_eq!(resolved.unwrap().as_str(), "custom-1");
        }

        #[test]
        fn test_with_custom_generator() {
            let generator = || RequestId::from("generated-42");
            let resolved = resolve_request_id(
                &HeaderMap::new(),
                None,
                Some(&generator),
                &RequestIdConfig::default(),
            );
            assert_eq!(resolved.unwrap().as_str(), "generated-42");
        }

        #[test]
        fn test_custom_generator_not_called_when_parsed() {
            let mut headers = HeaderMap::new();
            headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("upstream-1"));

            let generator = || -> RequestId { panic!("generator must not run when a header matched") };
            let resolved = resolve_request_id(
                &headers,
                None,
                Some(&generator),
                &RequestIdConfig::default(),
            );
            assert_eq!(resolved.unwrap().as_str(), "upstream-1");
        }
    }

    // --- 提取器测试 ---
    #[tokio::test]
    async fn test_request_id_extractor_from_extensions() {
        let (mut parts, _body) = Request::builder()
            .uri("/test")
            .body(())
            .unwrap()
            .into_parts();
        let expected = RequestId::new();
        parts.extensions.insert(expected.clone());

        let extracted = <RequestId as FromRequestParts<()>>::from_request_parts(&mut parts, &())
            .await
            .expect("RequestId extraction should never fail");
        assert_eq!(extracted, expected);
    }

    #[tokio::test]
    async fn test_request_id_extractor_from_context() {
        let expected = RequestId::new();
        let store = ContextStore::new("log_request_id", Some(expected.clone()));

        context::with_context_store(store, async move {
            let (mut parts, _body) = Request::builder()
                .uri("/test")
                .body(())
                .unwrap()
                .into_parts();

            let extracted =
                <RequestId as FromRequestParts<()>>::from_request_parts(&mut parts, &())
                    .await
                    .expect("RequestId extraction should never fail");
            assert_eq!(extracted, expected);
        })
        .await;
    }

    #[tokio::test]
    async fn test_optional_extractor_absent_stays_absent() {
        let (mut parts, _body) = Request::builder()
            .uri("/test")
            .body(())
            .unwrap()
            .into_parts();

        let extracted =
            <RequestId as OptionalFromRequestParts<()>>::from_request_parts(&mut parts, &())
                .await
                .unwrap();
        assert_eq!(extracted, None);
    }

    // --- 中间件/服务测试 ---
    mod layer_behavior {
        use super::*;

        async fn handler(request_id: RequestId) -> String {
            request_id.to_string()
        }

        async fn optional_handler(request_id: Option<RequestId>) -> String {
            request_id.map_or_else(|| "none".to_string(), |id| id.to_string())
        }

        #[tokio::test]
        async fn test_end_to_end_flow() {
            let app = Router::new()
                .route("/", get(handler))
                .layer(RequestIdLayer::new());

            // 场景1: 上游提供ID，原样采用
            let request = Request::builder()
                .uri("/")
                .header(REQUEST_ID_HEADER, "upstream-1")
                .body(Body::empty())
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            // 本中间件不负责注入响应头
            assert!(response.headers().get(REQUEST_ID_HEADER).is_none());
            let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            assert_eq!(&body[..], b"upstream-1");

            // 场景2: 不提供ID，生成UUIDv4
            let request = Request::builder().uri("/").body(Body::empty()).unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let generated = std::str::from_utf8(&body).unwrap();
            assert!(Uuid::parse_str(generated).is_ok());
        }

        #[tokio::test]
        async fn test_fallback_order_through_layer() {
            let app = Router::new()
                .route("/", get(handler))
                .layer(RequestIdLayer::new());

            let request = Request::builder()
                .uri("/")
                .header(CORRELATION_ID_HEADER, "c1")
                .header(AMZN_TRACE_ID_HEADER, "Root=r1")
                .body(Body::empty())
                .unwrap();
            let response = app.oneshot(request).await.unwrap();
            let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            assert_eq!(&body[..], b"c1");
        }

        #[tokio::test]
        async fn test_generation_disabled_yields_absent() {
            let config = RequestIdConfig {
                generate_if_not_found: false,
                ..Default::default()
            };
            let app = Router::new()
                .route("/", get(optional_handler))
                .layer(RequestIdLayer::with_config(config));

            let request = Request::builder().uri("/").body(Body::empty()).unwrap();
            let response = app.oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            assert_eq!(&body[..], b"none");
        }

        #[tokio::test]
        async fn test_custom_attribute_consistency() {
            // 存储和读取都使用配置的键名
            async fn attribute_handler() -> String {
                let under_custom = crate::context::try_with_store(|store| {
                    store.get("trace_id").map(|id| id.as_str().to_owned())
                })
                .unwrap();
                let under_default = crate::context::try_with_store(|store| {
                    store.get("log_request_id").map(|id| id.as_str().to_owned())
                })
                .unwrap();

                format!(
                    "{}/{}",
                    under_custom.unwrap_or_else(|| "none".into()),
                    under_default.unwrap_or_else(|| "none".into())
                )
            }

            let config = RequestIdConfig {
                attribute: "trace_id".to_string(),
                ..Default::default()
            };
            let app = Router::new()
                .route("/", get(attribute_handler))
                .layer(RequestIdLayer::with_config(config));

            let request = Request::builder()
                .uri("/")
                .header(REQUEST_ID_HEADER, "abc")
                .body(Body::empty())
                .unwrap();
            let response = app.oneshot(request).await.unwrap();
            let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            assert_eq!(&body[..], b"abc/none");
        }

        #[tokio::test]
        async fn test_identical_value_within_one_request() {
            // 同一请求内多次获取应返回完全相同的值
            async fn double_fetch_handler() -> String {
                let first = fetcher::current_request_id().unwrap();
                let second = fetcher::current_request_id().unwrap();
                assert_eq!(first, second);
                first.to_string()
            }

            let app = Router::new()
                .route("/", get(double_fetch_handler))
                .layer(RequestIdLayer::new());

            let request = Request::builder().uri("/").body(Body::empty()).unwrap();
            let response = app.oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        #[tokio::test]
        async fn test_custom_parser_and_generator_on_layer() {
            let layer = RequestIdLayer::new()
                .with_parser(|headers: &HeaderMap| {
                    headers
                        .get("x-tenant-request")
                        .and_then(|v| v.to_str().ok())
                        .map(RequestId::from)
                })
                .with_generator(|| RequestId::from("fallback-0"));

            let app = Router::new().route("/", get(handler)).layer(layer);

            // 自定义解析器命中
            let request = Request::builder()
                .uri("/")
                .header("x-tenant-request", "tenant-9")
                .body(Body::empty())
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            assert_eq!(&body[..], b"tenant-9");

            // 未命中时走自定义生成器
            let request = Request::builder().uri("/").body(Body::empty()).unwrap();
            let response = app.oneshot(request).await.unwrap();
            let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            assert_eq!(&body[..], b"fallback-0");
        }
    }
}
